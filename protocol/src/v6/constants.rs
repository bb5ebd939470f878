//! DHCPv6 message constants.

use std::net::Ipv6Addr;

/// The message type octet and the 24 bit transaction identifier.
pub const SIZE_HEADER: usize = 4;

/// The option code and length octet pairs before each option payload.
pub const SIZE_OPTION_PREFIX: usize = 4;

/// Transaction identifiers are 24 bits wide.
pub const XID_MASK: u32 = 0x00ff_ffff;

/// The port the client listens on.
pub const PORT_CLIENT: u16 = 546;

/// The port servers and relay agents listen on.
pub const PORT_SERVER: u16 = 547;

/// The All_DHCP_Relay_Agents_and_Servers multicast group.
pub const ALL_DHCP_RELAY_AGENTS_AND_SERVERS: Ipv6Addr =
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0x0001, 0x0002);

/// The fixed IAID, T1 and T2 fields of IA_NA and IA_PD.
pub const SIZE_IA_FIXED: usize = 12;

/// The fixed IAID field of IA_TA.
pub const SIZE_IA_TA_FIXED: usize = 4;

/// The fixed address and lifetime fields of IAADDR.
pub const SIZE_IA_ADDRESS_FIXED: usize = 24;

/// The fixed lifetime, length and prefix fields of IAPREFIX.
pub const SIZE_IA_PREFIX_FIXED: usize = 25;

/// The longest label allowed in a DNS encoded domain name.
pub const SIZE_LABEL_MAXIMAL: usize = 63;

/// The hardware type recorded inside link layer DUIDs.
pub const HARDWARE_TYPE_ETHERNET: u16 = 1;

/// The saturation value of the ELAPSED_TIME option, in centiseconds.
pub const ELAPSED_TIME_MAXIMAL: u16 = 0xffff;
