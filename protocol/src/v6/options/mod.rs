//! DHCPv6 options module.

mod option_code;
mod status_code;

pub use self::{option_code::OptionCode, status_code::StatusCode};

use std::net::Ipv6Addr;

/// DHCPv6 options.
///
/// Scalar options appear at most once and the last occurrence wins.
/// Identity associations may repeat with distinct IAIDs and are
/// collected in order of appearance.
///
/// [RFC 3315](https://tools.ietf.org/html/rfc3315)
/// [RFC 3633](https://tools.ietf.org/html/rfc3633)
/// [RFC 3646](https://tools.ietf.org/html/rfc3646)
#[derive(Default)]
pub struct Options {
    pub client_id: Option<Vec<u8>>,
    pub server_id: Option<Vec<u8>>,
    pub ia_na: Vec<IaNa>,
    pub ia_ta: Vec<IaTa>,
    pub option_request: Option<Vec<u16>>,
    pub preference: Option<u8>,
    pub elapsed_time: Option<u16>,
    pub unicast: Option<Ipv6Addr>,
    pub status: Option<Status>,
    pub rapid_commit: bool,
    pub dns_servers: Option<Vec<Ipv6Addr>>,
    pub domain_list: Option<Vec<String>>,
    pub ia_pd: Vec<IaPd>,
    pub information_refresh_time: Option<u32>,
    pub sol_max_rt: Option<u32>,
    pub inf_max_rt: Option<u32>,
}

/// Identity association for non-temporary addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaNa {
    pub iaid: u32,
    pub t1: u32,
    pub t2: u32,
    pub addresses: Vec<IaAddress>,
    pub status: Option<Status>,
}

/// Identity association for temporary addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaTa {
    pub iaid: u32,
    pub addresses: Vec<IaAddress>,
    pub status: Option<Status>,
}

/// A single address grant inside an identity association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaAddress {
    pub address: Ipv6Addr,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
    pub status: Option<Status>,
}

/// Identity association for prefix delegation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaPd {
    pub iaid: u32,
    pub t1: u32,
    pub t2: u32,
    pub prefixes: Vec<IaPrefix>,
    pub status: Option<Status>,
}

/// A single delegated prefix inside an identity association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaPrefix {
    pub prefix: Ipv6Addr,
    pub prefix_length: u8,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
    pub exclude: Option<ExcludedPrefix>,
    pub status: Option<Status>,
}

/// A prefix the delegating router keeps for itself.
///
/// [RFC 6603](https://tools.ietf.org/html/rfc6603)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedPrefix {
    pub prefix: Ipv6Addr,
    pub prefix_length: u8,
}

/// The STATUS_CODE option payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}
