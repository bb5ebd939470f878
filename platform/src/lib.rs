//! The operating system surface of the DHCP client.
//!
//! The traits describe the sockets, the lease persistence and the
//! network configuration sink the protocol engines run on. The `linux`
//! module implements them with packet and datagram sockets. The `fake`
//! module implements them in memory for tests and demonstrations.

#[macro_use]
extern crate log;

pub mod fake;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod store;

use std::{
    fmt, io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6},
    os::unix::io::AsRawFd,
    time::SystemTime,
};

use eui48::MacAddress;

/// A network interface the client operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub index: u32,
    pub hardware_address: MacAddress,
}

/// The address family a lease belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Family::Ipv4 => write!(f, "v4"),
            Family::Ipv6 => write!(f, "v6"),
        }
    }
}

/// A layer 2 socket bound to one interface and EtherType.
///
/// Payloads are sent with a kernel built Ethernet header and received
/// without one.
pub trait LinkSocket: AsRawFd {
    /// Sends one payload to `destination`.
    fn send(&mut self, destination: MacAddress, payload: &[u8]) -> io::Result<usize>;

    /// Receives one payload, or `None` when the socket would block.
    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<Option<usize>>;
}

/// An IPv4 datagram socket bound to one interface.
pub trait UdpSocket4: AsRawFd {
    fn send_to(&mut self, destination: SocketAddrV4, payload: &[u8]) -> io::Result<usize>;

    /// Receives one datagram, or `None` when the socket would block.
    fn recv_from(&mut self, buffer: &mut [u8]) -> io::Result<Option<(usize, SocketAddrV4)>>;
}

/// An IPv6 datagram socket bound to one interface.
pub trait UdpSocket6: AsRawFd {
    fn send_to(&mut self, destination: SocketAddrV6, payload: &[u8]) -> io::Result<usize>;

    /// Receives one datagram together with the arrival interface index,
    /// or `None` when the socket would block.
    fn recv_from(&mut self, buffer: &mut [u8])
        -> io::Result<Option<(usize, SocketAddrV6, u32)>>;
}

/// Opens the sockets the protocol engines run on.
pub trait SocketFactory {
    /// Opens a layer 2 socket for the given EtherType.
    fn link(&mut self, interface: &Interface, protocol: u16) -> io::Result<Box<dyn LinkSocket>>;

    /// Opens an IPv4 datagram socket bound to `port` on the interface.
    fn udp4(&mut self, interface: &Interface, port: u16) -> io::Result<Box<dyn UdpSocket4>>;

    /// Opens an IPv6 datagram socket bound to `port` on the interface.
    fn udp6(&mut self, interface: &Interface, port: u16) -> io::Result<Box<dyn UdpSocket6>>;
}

/// A lease blob read back from persistent storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLease {
    pub data: Vec<u8>,
    pub written: SystemTime,
}

/// Persists lease blobs between daemon runs.
///
/// The store treats the blobs as opaque. Encoding and staleness checks
/// belong to the protocol engines.
pub trait LeaseStore {
    fn read(&self, interface: &str, family: Family) -> io::Result<Option<StoredLease>>;

    fn write(&mut self, interface: &str, family: Family, data: &[u8]) -> io::Result<()>;

    fn remove(&mut self, interface: &str, family: Family) -> io::Result<()>;
}

/// An IPv4 configuration to be applied to an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding4 {
    pub address: Ipv4Addr,
    pub prefix_length: u8,
    pub broadcast: Option<Ipv4Addr>,
    pub routers: Vec<Ipv4Addr>,
    /// Classless route triplets of subnet number, subnet mask and router.
    pub static_routes: Vec<(Ipv4Addr, Ipv4Addr, Ipv4Addr)>,
    pub dns_servers: Vec<Ipv4Addr>,
    pub mtu: Option<u16>,
}

/// An IPv6 address configuration to be applied to an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding6 {
    pub address: Ipv6Addr,
    pub prefix_length: u8,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
}

/// Applies bindings to the running network stack.
pub trait Configurator {
    /// Brings the link administratively up.
    fn link_up(&mut self, interface: &str) -> io::Result<()>;

    fn apply_v4(&mut self, interface: &str, binding: &Binding4) -> io::Result<()>;

    fn remove_v4(&mut self, interface: &str, binding: &Binding4) -> io::Result<()>;

    fn apply_v6(&mut self, interface: &str, binding: &Binding6) -> io::Result<()>;

    fn remove_v6(&mut self, interface: &str, binding: &Binding6) -> io::Result<()>;
}
