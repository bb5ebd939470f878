//! DHCPv4 option tags module.

/// The DHCP option codes the client works with.
///
/// Anything else is parsed as `Unknown` and skipped over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionTag {
    Unknown = -1,
    Pad = 0,

    /*
    RFC 2132
    */
    SubnetMask = 1,
    TimeOffset = 2,
    Routers = 3,
    DomainNameServers = 6,
    Hostname = 12,
    DomainName = 15,
    MtuInterface = 26,
    BroadcastAddress = 28,
    StaticRoutes = 33,
    NtpServers = 42,
    VendorSpecific = 43,
    AddressRequest = 50,
    AddressTime = 51,
    Overload = 52,
    DhcpMessageType = 53,
    DhcpServerId = 54,
    ParameterList = 55,
    DhcpMessage = 56,
    DhcpMaxMessageSize = 57,
    RenewalTime = 58,
    RebindingTime = 59,
    ClassId = 60,
    ClientId = 61,

    /*
    RFC 2563 (Auto-Configuration Option)
    */
    AutoConfigure = 116,

    /*
    RFC 3442 (The Classless Static Route Option)
    */
    ClasslessStaticRoutes = 121,

    End = 255,
}

impl From<u8> for OptionTag {
    fn from(value: u8) -> Self {
        use self::OptionTag::*;
        match value {
            0 => Pad,
            1 => SubnetMask,
            2 => TimeOffset,
            3 => Routers,
            6 => DomainNameServers,
            12 => Hostname,
            15 => DomainName,
            26 => MtuInterface,
            28 => BroadcastAddress,
            33 => StaticRoutes,
            42 => NtpServers,
            43 => VendorSpecific,
            50 => AddressRequest,
            51 => AddressTime,
            52 => Overload,
            53 => DhcpMessageType,
            54 => DhcpServerId,
            55 => ParameterList,
            56 => DhcpMessage,
            57 => DhcpMaxMessageSize,
            58 => RenewalTime,
            59 => RebindingTime,
            60 => ClassId,
            61 => ClientId,

            116 => AutoConfigure,

            121 => ClasslessStaticRoutes,

            255 => End,
            _ => Unknown,
        }
    }
}
