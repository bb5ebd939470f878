//! DHCPv6 option code module.

/// DHCPv6 option code.
///
/// Options a client neither sends nor consumes are left out and fall
/// into `Unknown` on reception, which skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionCode {
    Unknown = -1,

    /* RFC 3315 */
    ClientId = 1,
    ServerId = 2,
    IaNa = 3,
    IaTa = 4,
    IaAddress = 5,
    OptionRequest = 6,
    Preference = 7,
    ElapsedTime = 8,
    Unicast = 12,
    StatusCode = 13,
    RapidCommit = 14,

    /* RFC 3646 */
    DnsServers = 23,
    DomainList = 24,

    /* RFC 3633 */
    IaPd = 25,
    IaPrefix = 26,

    /* RFC 4242 */
    InformationRefreshTime = 32,

    /* RFC 6603 */
    PdExclude = 67,

    /* RFC 7083 */
    SolMaxRt = 82,
    InfMaxRt = 83,
}

impl From<u16> for OptionCode {
    fn from(value: u16) -> Self {
        use self::OptionCode::*;
        match value {
            1 => ClientId,
            2 => ServerId,
            3 => IaNa,
            4 => IaTa,
            5 => IaAddress,
            6 => OptionRequest,
            7 => Preference,
            8 => ElapsedTime,
            12 => Unicast,
            13 => StatusCode,
            14 => RapidCommit,

            23 => DnsServers,
            24 => DomainList,

            25 => IaPd,
            26 => IaPrefix,

            32 => InformationRefreshTime,

            67 => PdExclude,

            82 => SolMaxRt,
            83 => InfMaxRt,

            _ => Unknown,
        }
    }
}
