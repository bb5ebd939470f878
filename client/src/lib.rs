//! The DHCP client daemon engine crate.
//!
//! Four cooperating state machines run on one single threaded reactor:
//! the DHCPv4 and DHCPv6 lease engines, the ARP claim engine probing and
//! defending IPv4 addresses, and the IPv4 link local fallback. The daemon
//! module wires them to the reactor and to the platform collaborators.

#[macro_use]
extern crate log;

pub mod arp;
pub mod config;
pub mod daemon;
pub mod error;
pub mod event;
pub mod ipv4ll;
pub mod v4;
pub mod v6;

pub use self::{
    config::ClientConfig,
    daemon::{Daemon, Env},
    error::Error,
    event::Event,
};
