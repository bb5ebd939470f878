//! DHCPv4 options module.

mod message_type;
mod option_tag;
mod overload;

pub use self::{message_type::MessageType, option_tag::OptionTag, overload::Overload};

use std::net::Ipv4Addr;

/// The DHCP options the client sends or consumes.
///
/// Implemented completely with `Option` for better flexibility and polymorphism.
/// Options the client has no use for are skipped by the parser.
///
/// [RFC 2132](https://tools.ietf.org/html/rfc2132)
/// [RFC 2563](https://tools.ietf.org/html/rfc2563)
/// [RFC 3442](https://tools.ietf.org/html/rfc3442)
#[derive(Default)]
pub struct Options {
    /*
    RFC 2132
    */
    pub subnet_mask: Option<Ipv4Addr>,
    pub time_offset: Option<u32>,
    pub routers: Option<Vec<Ipv4Addr>>,
    pub domain_name_servers: Option<Vec<Ipv4Addr>>,
    pub hostname: Option<String>,
    pub domain_name: Option<String>,
    pub mtu_interface: Option<u16>,
    pub broadcast_address: Option<Ipv4Addr>,
    pub static_routes: Option<Vec<(Ipv4Addr, Ipv4Addr)>>,
    pub ntp_servers: Option<Vec<Ipv4Addr>>,
    pub vendor_specific: Option<Vec<u8>>,
    pub address_request: Option<Ipv4Addr>,
    pub address_time: Option<u32>,
    pub overload: Option<Overload>,
    pub dhcp_message_type: Option<MessageType>,
    pub dhcp_server_id: Option<Ipv4Addr>,
    pub parameter_list: Option<Vec<u8>>,
    pub dhcp_message: Option<String>,
    pub dhcp_max_message_size: Option<u16>,
    pub renewal_time: Option<u32>,
    pub rebinding_time: Option<u32>,
    pub class_id: Option<Vec<u8>>,
    pub client_id: Option<Vec<u8>>,

    /*
    RFC 2563 (Auto-Configuration Option)
    */
    pub auto_configure: Option<u8>,

    /*
    RFC 3442 (The Classless Static Route Option)
    */
    pub classless_static_routes: Option<Vec<(Ipv4Addr, Ipv4Addr, Ipv4Addr)>>,
}
