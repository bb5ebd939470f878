//! DHCPv6 status code module.

use std::fmt;

/// The code carried by a STATUS_CODE option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Unknown = -1,

    /* RFC 3315 */
    Success = 0,
    UnspecFail = 1,
    NoAddrsAvail = 2,
    NoBinding = 3,
    NotOnLink = 4,
    UseMulticast = 5,

    /* RFC 3633 */
    NoPrefixAvail = 6,
}

impl From<u16> for StatusCode {
    fn from(value: u16) -> Self {
        use self::StatusCode::*;
        match value {
            0 => Success,
            1 => UnspecFail,
            2 => NoAddrsAvail,
            3 => NoBinding,
            4 => NotOnLink,
            5 => UseMulticast,
            6 => NoPrefixAvail,
            _ => Unknown,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::StatusCode::*;
        match self {
            Unknown => write!(f, "Unknown"),

            Success => write!(f, "Success"),
            UnspecFail => write!(f, "UnspecFail"),
            NoAddrsAvail => write!(f, "NoAddrsAvail"),
            NoBinding => write!(f, "NoBinding"),
            NotOnLink => write!(f, "NotOnLink"),
            UseMulticast => write!(f, "UseMulticast"),

            NoPrefixAvail => write!(f, "NoPrefixAvail"),
        }
    }
}
