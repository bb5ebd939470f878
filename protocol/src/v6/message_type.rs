//! DHCPv6 message type module.

use std::fmt;

/// DHCPv6 message type.
///
/// Only the client/server exchange types are listed. The relay agent
/// wrappers never reach a client socket bound to the client port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Undefined = 0,

    /* RFC 3315 */
    Solicit,
    Advertise,
    Request,
    Confirm,
    Renew,
    Rebind,
    Reply,
    Release,
    Decline,
    Reconfigure,
    InformationRequest,
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        use self::MessageType::*;
        match value {
            1 => Solicit,
            2 => Advertise,
            3 => Request,
            4 => Confirm,
            5 => Renew,
            6 => Rebind,
            7 => Reply,
            8 => Release,
            9 => Decline,
            10 => Reconfigure,
            11 => InformationRequest,
            _ => Undefined,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::MessageType::*;
        match self {
            Undefined => write!(f, "UNDEFINED"),

            Solicit => write!(f, "SOLICIT"),
            Advertise => write!(f, "ADVERTISE"),
            Request => write!(f, "REQUEST"),
            Confirm => write!(f, "CONFIRM"),
            Renew => write!(f, "RENEW"),
            Rebind => write!(f, "REBIND"),
            Reply => write!(f, "REPLY"),
            Release => write!(f, "RELEASE"),
            Decline => write!(f, "DECLINE"),
            Reconfigure => write!(f, "RECONFIGURE"),
            InformationRequest => write!(f, "INFORMATION-REQUEST"),
        }
    }
}
