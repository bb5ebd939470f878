//! The Linux implementation on packet and datagram sockets.

use std::{
    io,
    io::IoSliceMut,
    mem,
    net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6},
    os::unix::io::{AsRawFd, RawFd},
    process::Command,
    ptr,
};

use eui48::{MacAddress, EUI48LEN};
use nix::{
    cmsg_space,
    errno::Errno,
    ioctl_read_bad,
    net::if_::if_nametoindex,
    sys::socket::{
        self, recvmsg, sockopt, AddressFamily, ControlMessageOwned, MsgFlags, SockFlag, SockType,
        SockaddrIn, SockaddrIn6,
    },
    unistd,
};

use super::{
    Binding4, Binding6, Configurator, Interface, LinkSocket, SocketFactory, UdpSocket4, UdpSocket6,
};

ioctl_read_bad!(siocgifhwaddr, libc::SIOCGIFHWADDR, libc::ifreq);

/// Looks an interface up by name and reads its hardware address.
///
/// # Errors
/// `io::Error` if the interface does not exist or the hardware address
/// cannot be read.
pub fn interface(name: &str) -> io::Result<Interface> {
    if name.len() >= libc::IFNAMSIZ {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Interface name is overlong",
        ));
    }
    let index = if_nametoindex(name).map_err(io::Error::from)?;

    let mut request: libc::ifreq = unsafe { mem::zeroed() };
    unsafe {
        ptr::copy_nonoverlapping(
            name.as_ptr() as *const libc::c_char,
            request.ifr_name.as_mut_ptr(),
            name.len(),
        );
    }

    let fd = socket::socket(
        AddressFamily::Inet,
        SockType::Datagram,
        SockFlag::empty(),
        None,
    )
    .map_err(io::Error::from)?;
    let result = unsafe { siocgifhwaddr(fd, &mut request) };
    let _ = unistd::close(fd);
    result.map_err(io::Error::from)?;

    let data = unsafe { request.ifr_ifru.ifru_hwaddr.sa_data };
    let mut octets = [0u8; EUI48LEN];
    for (octet, value) in octets.iter_mut().zip(data.iter()) {
        *octet = *value as u8;
    }

    Ok(Interface {
        name: name.to_owned(),
        index,
        hardware_address: MacAddress::new(octets),
    })
}

/// A non-blocking `AF_PACKET` datagram socket.
///
/// The kernel builds and strips the Ethernet header, so the payloads
/// exchanged here start at the EtherType specific protocol data.
pub struct LinuxLink {
    fd: RawFd,
    index: u32,
    protocol: u16,
}

impl LinuxLink {
    pub fn open(interface: &Interface, protocol: u16) -> io::Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_DGRAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                i32::from(protocol.to_be()),
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let socket = Self {
            fd,
            index: interface.index,
            protocol,
        };

        let mut address: libc::sockaddr_ll = unsafe { mem::zeroed() };
        address.sll_family = libc::AF_PACKET as libc::c_ushort;
        address.sll_protocol = protocol.to_be();
        address.sll_ifindex = socket.index as libc::c_int;
        let result = unsafe {
            libc::bind(
                socket.fd,
                &address as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(socket)
    }
}

impl LinkSocket for LinuxLink {
    fn send(&mut self, destination: MacAddress, payload: &[u8]) -> io::Result<usize> {
        let mut address: libc::sockaddr_ll = unsafe { mem::zeroed() };
        address.sll_family = libc::AF_PACKET as libc::c_ushort;
        address.sll_protocol = self.protocol.to_be();
        address.sll_ifindex = self.index as libc::c_int;
        address.sll_halen = EUI48LEN as libc::c_uchar;
        address.sll_addr[..EUI48LEN].copy_from_slice(destination.as_bytes());

        let written = unsafe {
            libc::sendto(
                self.fd,
                payload.as_ptr() as *const libc::c_void,
                payload.len(),
                0,
                &address as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if written < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(written as usize)
    }

    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<Option<usize>> {
        let read = unsafe {
            libc::recv(
                self.fd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                0,
            )
        };
        if read < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::WouldBlock {
                return Ok(None);
            }
            return Err(error);
        }
        Ok(Some(read as usize))
    }
}

impl AsRawFd for LinuxLink {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for LinuxLink {
    fn drop(&mut self) {
        let _ = unistd::close(self.fd);
    }
}

/// A non-blocking IPv4 datagram socket bound to one interface.
pub struct LinuxUdp4 {
    fd: RawFd,
}

impl LinuxUdp4 {
    pub fn open(interface: &Interface, port: u16) -> io::Result<Self> {
        let fd = socket::socket(
            AddressFamily::Inet,
            SockType::Datagram,
            SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
            None,
        )
        .map_err(io::Error::from)?;
        let socket = Self { fd };

        socket::setsockopt(socket.fd, sockopt::ReuseAddr, &true).map_err(io::Error::from)?;
        socket::setsockopt(socket.fd, sockopt::Broadcast, &true).map_err(io::Error::from)?;
        socket::setsockopt(
            socket.fd,
            sockopt::BindToDevice,
            &interface.name.clone().into(),
        )
        .map_err(io::Error::from)?;

        let address = SockaddrIn::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        socket::bind(socket.fd, &address).map_err(io::Error::from)?;

        Ok(socket)
    }
}

impl UdpSocket4 for LinuxUdp4 {
    fn send_to(&mut self, destination: SocketAddrV4, payload: &[u8]) -> io::Result<usize> {
        let address = SockaddrIn::from(destination);
        socket::sendto(self.fd, payload, &address, MsgFlags::empty()).map_err(io::Error::from)
    }

    fn recv_from(&mut self, buffer: &mut [u8]) -> io::Result<Option<(usize, SocketAddrV4)>> {
        match socket::recvfrom::<SockaddrIn>(self.fd, buffer) {
            Ok((size, source)) => {
                let source = source
                    .map(|address| SocketAddrV4::new(Ipv4Addr::from(address.ip()), address.port()))
                    .unwrap_or_else(|| SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
                Ok(Some((size, source)))
            }
            Err(Errno::EAGAIN) => Ok(None),
            Err(error) => Err(io::Error::from(error)),
        }
    }
}

impl AsRawFd for LinuxUdp4 {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for LinuxUdp4 {
    fn drop(&mut self) {
        let _ = unistd::close(self.fd);
    }
}

/// A non-blocking IPv6 datagram socket shared by every interface.
///
/// The socket is not bound to a device. `IPV6_RECVPKTINFO` is enabled so
/// that receptions report the arrival interface index and transmissions
/// are steered by the scope identifier of the destination.
pub struct LinuxUdp6 {
    fd: RawFd,
}

impl LinuxUdp6 {
    pub fn open(port: u16) -> io::Result<Self> {
        let fd = socket::socket(
            AddressFamily::Inet6,
            SockType::Datagram,
            SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
            None,
        )
        .map_err(io::Error::from)?;
        let socket = Self { fd };

        socket::setsockopt(socket.fd, sockopt::ReuseAddr, &true).map_err(io::Error::from)?;
        socket::setsockopt(socket.fd, sockopt::Ipv6V6Only, &true).map_err(io::Error::from)?;
        socket::setsockopt(socket.fd, sockopt::Ipv6RecvPacketInfo, &true)
            .map_err(io::Error::from)?;

        let address = SockaddrIn6::from(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0));
        socket::bind(socket.fd, &address).map_err(io::Error::from)?;

        Ok(socket)
    }
}

impl UdpSocket6 for LinuxUdp6 {
    fn send_to(&mut self, destination: SocketAddrV6, payload: &[u8]) -> io::Result<usize> {
        let address = SockaddrIn6::from(destination);
        socket::sendto(self.fd, payload, &address, MsgFlags::empty()).map_err(io::Error::from)
    }

    fn recv_from(
        &mut self,
        buffer: &mut [u8],
    ) -> io::Result<Option<(usize, SocketAddrV6, u32)>> {
        let mut control = cmsg_space!(libc::in6_pktinfo);
        let mut iov = [IoSliceMut::new(buffer)];
        let message = match recvmsg::<SockaddrIn6>(
            self.fd,
            &mut iov,
            Some(&mut control),
            MsgFlags::empty(),
        ) {
            Ok(message) => message,
            Err(Errno::EAGAIN) => return Ok(None),
            Err(error) => return Err(io::Error::from(error)),
        };

        let source = message
            .address
            .map(|address| {
                SocketAddrV6::new(
                    address.ip(),
                    address.port(),
                    address.flowinfo(),
                    address.scope_id(),
                )
            })
            .unwrap_or_else(|| SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0));

        let mut arrival = 0u32;
        for cmsg in message.cmsgs() {
            if let ControlMessageOwned::Ipv6PacketInfo(info) = cmsg {
                arrival = info.ipi6_ifindex as u32;
            }
        }

        Ok(Some((message.bytes, source, arrival)))
    }
}

impl AsRawFd for LinuxUdp6 {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for LinuxUdp6 {
    fn drop(&mut self) {
        let _ = unistd::close(self.fd);
    }
}

/// The socket factory on the Linux network stack.
pub struct LinuxPlatform;

impl SocketFactory for LinuxPlatform {
    fn link(&mut self, interface: &Interface, protocol: u16) -> io::Result<Box<dyn LinkSocket>> {
        Ok(Box::new(LinuxLink::open(interface, protocol)?))
    }

    fn udp4(&mut self, interface: &Interface, port: u16) -> io::Result<Box<dyn UdpSocket4>> {
        Ok(Box::new(LinuxUdp4::open(interface, port)?))
    }

    fn udp6(&mut self, _interface: &Interface, port: u16) -> io::Result<Box<dyn UdpSocket6>> {
        Ok(Box::new(LinuxUdp6::open(port)?))
    }
}

/// Applies bindings by spawning `ip(8)`.
pub struct ShellConfigurator;

impl ShellConfigurator {
    fn run(program: &str, arguments: &[&str]) -> io::Result<()> {
        debug!("> {} {}", program, arguments.join(" "));
        let status = Command::new(program).args(arguments).status()?;
        if !status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} exited with {}", program, status),
            ));
        }
        Ok(())
    }
}

impl Configurator for ShellConfigurator {
    fn link_up(&mut self, interface: &str) -> io::Result<()> {
        Self::run("ip", &["link", "set", "dev", interface, "up"])
    }

    fn apply_v4(&mut self, interface: &str, binding: &Binding4) -> io::Result<()> {
        let address = format!("{}/{}", binding.address, binding.prefix_length);
        let broadcast = binding.broadcast.map(|broadcast| broadcast.to_string());
        let mut arguments = vec!["address", "replace", &address, "dev", interface];
        if let Some(ref broadcast) = broadcast {
            arguments.push("broadcast");
            arguments.push(broadcast);
        }
        Self::run("ip", &arguments)?;

        if let Some(mtu) = binding.mtu {
            let mtu = mtu.to_string();
            Self::run("ip", &["link", "set", "dev", interface, "mtu", &mtu])?;
        }

        for router in binding.routers.iter() {
            let via = router.to_string();
            Self::run(
                "ip",
                &["route", "replace", "default", "via", &via, "dev", interface],
            )?;
        }

        for (subnet, mask, router) in binding.static_routes.iter() {
            let destination = format!("{}/{}", subnet, u32::from(*mask).leading_ones());
            if router.is_unspecified() {
                Self::run("ip", &["route", "replace", &destination, "dev", interface])?;
            } else {
                let via = router.to_string();
                Self::run(
                    "ip",
                    &["route", "replace", &destination, "via", &via, "dev", interface],
                )?;
            }
        }

        Ok(())
    }

    fn remove_v4(&mut self, interface: &str, binding: &Binding4) -> io::Result<()> {
        let address = format!("{}/{}", binding.address, binding.prefix_length);
        Self::run("ip", &["address", "del", &address, "dev", interface])
    }

    fn apply_v6(&mut self, interface: &str, binding: &Binding6) -> io::Result<()> {
        let address = format!("{}/{}", binding.address, binding.prefix_length);
        let preferred = binding.preferred_lifetime.to_string();
        let valid = binding.valid_lifetime.to_string();
        Self::run(
            "ip",
            &[
                "-6",
                "address",
                "replace",
                &address,
                "dev",
                interface,
                "preferred_lft",
                &preferred,
                "valid_lft",
                &valid,
            ],
        )
    }

    fn remove_v6(&mut self, interface: &str, binding: &Binding6) -> io::Result<()> {
        let address = format!("{}/{}", binding.address, binding.prefix_length);
        Self::run("ip", &["-6", "address", "del", &address, "dev", interface])
    }
}
