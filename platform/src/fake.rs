//! In memory test doubles wired to real pipes.
//!
//! Every fake socket owns the read end of a pipe, so it can be
//! registered with a `poll(2)` based reactor like a real socket.
//! Delivering a datagram enqueues the bytes and writes one byte into
//! the pipe, which makes the descriptor readable. Receiving drains one
//! byte per datagram, so readiness tracks the queue exactly.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    io,
    net::{SocketAddrV4, SocketAddrV6},
    os::unix::io::{AsRawFd, RawFd},
    rc::Rc,
    time::SystemTime,
};

use eui48::MacAddress;
use nix::{fcntl, unistd};

use super::{
    Binding4, Binding6, Configurator, Family, Interface, LeaseStore, LinkSocket, SocketFactory,
    StoredLease, UdpSocket4, UdpSocket6,
};

struct Pipe {
    read: RawFd,
    write: RawFd,
}

impl Pipe {
    fn open() -> io::Result<Self> {
        let (read, write) = unistd::pipe().map_err(io::Error::from)?;
        fcntl::fcntl(read, fcntl::FcntlArg::F_SETFL(fcntl::OFlag::O_NONBLOCK))
            .map_err(io::Error::from)?;
        Ok(Self { read, write })
    }

    fn notify(&self) -> io::Result<()> {
        unistd::write(self.write, &[0u8]).map_err(io::Error::from)?;
        Ok(())
    }

    fn drain_one(&self) {
        let mut byte = [0u8; 1];
        let _ = unistd::read(self.read, &mut byte);
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        let _ = unistd::close(self.read);
        let _ = unistd::close(self.write);
    }
}

struct LinkState {
    pipe: Pipe,
    inbound: RefCell<VecDeque<Vec<u8>>>,
    outbound: RefCell<Vec<(MacAddress, Vec<u8>)>>,
}

struct Udp4State {
    pipe: Pipe,
    inbound: RefCell<VecDeque<(SocketAddrV4, Vec<u8>)>>,
    outbound: RefCell<Vec<(SocketAddrV4, Vec<u8>)>>,
}

struct Udp6State {
    pipe: Pipe,
    inbound: RefCell<VecDeque<(SocketAddrV6, u32, Vec<u8>)>>,
    outbound: RefCell<Vec<(SocketAddrV6, Vec<u8>)>>,
}

#[derive(Default)]
struct NetworkInner {
    links: HashMap<(String, u16), Rc<LinkState>>,
    udp4: HashMap<String, Rc<Udp4State>>,
    udp6: HashMap<String, Rc<Udp6State>>,
}

impl NetworkInner {
    fn link_state(&mut self, interface: &str, protocol: u16) -> io::Result<Rc<LinkState>> {
        let key = (interface.to_owned(), protocol);
        if let Some(state) = self.links.get(&key) {
            return Ok(Rc::clone(state));
        }
        let state = Rc::new(LinkState {
            pipe: Pipe::open()?,
            inbound: RefCell::new(VecDeque::new()),
            outbound: RefCell::new(Vec::new()),
        });
        self.links.insert(key, Rc::clone(&state));
        Ok(state)
    }

    fn udp4_state(&mut self, interface: &str) -> io::Result<Rc<Udp4State>> {
        if let Some(state) = self.udp4.get(interface) {
            return Ok(Rc::clone(state));
        }
        let state = Rc::new(Udp4State {
            pipe: Pipe::open()?,
            inbound: RefCell::new(VecDeque::new()),
            outbound: RefCell::new(Vec::new()),
        });
        self.udp4.insert(interface.to_owned(), Rc::clone(&state));
        Ok(state)
    }

    fn udp6_state(&mut self, interface: &str) -> io::Result<Rc<Udp6State>> {
        if let Some(state) = self.udp6.get(interface) {
            return Ok(Rc::clone(state));
        }
        let state = Rc::new(Udp6State {
            pipe: Pipe::open()?,
            inbound: RefCell::new(VecDeque::new()),
            outbound: RefCell::new(Vec::new()),
        });
        self.udp6.insert(interface.to_owned(), Rc::clone(&state));
        Ok(state)
    }
}

/// A shared in memory network.
///
/// Clones share the same state, so a test can keep one handle while the
/// daemon owns another.
#[derive(Clone, Default)]
pub struct FakeNetwork {
    inner: Rc<RefCell<NetworkInner>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a payload for reception on the layer 2 socket.
    pub fn deliver_link(&self, interface: &str, protocol: u16, payload: &[u8]) -> io::Result<()> {
        let state = self.inner.borrow_mut().link_state(interface, protocol)?;
        state.inbound.borrow_mut().push_back(payload.to_vec());
        state.pipe.notify()
    }

    /// Drains everything sent on the layer 2 socket so far.
    pub fn sent_link(
        &self,
        interface: &str,
        protocol: u16,
    ) -> io::Result<Vec<(MacAddress, Vec<u8>)>> {
        let state = self.inner.borrow_mut().link_state(interface, protocol)?;
        let drained = state.outbound.borrow_mut().drain(..).collect();
        Ok(drained)
    }

    /// Queues a datagram for reception on the IPv4 socket.
    pub fn deliver_udp4(
        &self,
        interface: &str,
        source: SocketAddrV4,
        payload: &[u8],
    ) -> io::Result<()> {
        let state = self.inner.borrow_mut().udp4_state(interface)?;
        state.inbound.borrow_mut().push_back((source, payload.to_vec()));
        state.pipe.notify()
    }

    /// Drains everything sent on the IPv4 socket so far.
    pub fn sent_udp4(&self, interface: &str) -> io::Result<Vec<(SocketAddrV4, Vec<u8>)>> {
        let state = self.inner.borrow_mut().udp4_state(interface)?;
        let drained = state.outbound.borrow_mut().drain(..).collect();
        Ok(drained)
    }

    /// Queues a datagram for reception on the IPv6 socket.
    pub fn deliver_udp6(
        &self,
        interface: &str,
        source: SocketAddrV6,
        arrival: u32,
        payload: &[u8],
    ) -> io::Result<()> {
        let state = self.inner.borrow_mut().udp6_state(interface)?;
        state
            .inbound
            .borrow_mut()
            .push_back((source, arrival, payload.to_vec()));
        state.pipe.notify()
    }

    /// Drains everything sent on the IPv6 socket so far.
    pub fn sent_udp6(&self, interface: &str) -> io::Result<Vec<(SocketAddrV6, Vec<u8>)>> {
        let state = self.inner.borrow_mut().udp6_state(interface)?;
        let drained = state.outbound.borrow_mut().drain(..).collect();
        Ok(drained)
    }
}

impl SocketFactory for FakeNetwork {
    fn link(&mut self, interface: &Interface, protocol: u16) -> io::Result<Box<dyn LinkSocket>> {
        let state = self.inner.borrow_mut().link_state(&interface.name, protocol)?;
        Ok(Box::new(FakeLink { state }))
    }

    fn udp4(&mut self, interface: &Interface, _port: u16) -> io::Result<Box<dyn UdpSocket4>> {
        let state = self.inner.borrow_mut().udp4_state(&interface.name)?;
        Ok(Box::new(FakeUdp4 { state }))
    }

    fn udp6(&mut self, interface: &Interface, _port: u16) -> io::Result<Box<dyn UdpSocket6>> {
        let state = self.inner.borrow_mut().udp6_state(&interface.name)?;
        Ok(Box::new(FakeUdp6 { state }))
    }
}

struct FakeLink {
    state: Rc<LinkState>,
}

impl LinkSocket for FakeLink {
    fn send(&mut self, destination: MacAddress, payload: &[u8]) -> io::Result<usize> {
        self.state
            .outbound
            .borrow_mut()
            .push((destination, payload.to_vec()));
        Ok(payload.len())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<Option<usize>> {
        match self.state.inbound.borrow_mut().pop_front() {
            Some(payload) => {
                self.state.pipe.drain_one();
                let size = payload.len().min(buffer.len());
                buffer[..size].copy_from_slice(&payload[..size]);
                Ok(Some(size))
            }
            None => Ok(None),
        }
    }
}

impl AsRawFd for FakeLink {
    fn as_raw_fd(&self) -> RawFd {
        self.state.pipe.read
    }
}

struct FakeUdp4 {
    state: Rc<Udp4State>,
}

impl UdpSocket4 for FakeUdp4 {
    fn send_to(&mut self, destination: SocketAddrV4, payload: &[u8]) -> io::Result<usize> {
        self.state
            .outbound
            .borrow_mut()
            .push((destination, payload.to_vec()));
        Ok(payload.len())
    }

    fn recv_from(&mut self, buffer: &mut [u8]) -> io::Result<Option<(usize, SocketAddrV4)>> {
        match self.state.inbound.borrow_mut().pop_front() {
            Some((source, payload)) => {
                self.state.pipe.drain_one();
                let size = payload.len().min(buffer.len());
                buffer[..size].copy_from_slice(&payload[..size]);
                Ok(Some((size, source)))
            }
            None => Ok(None),
        }
    }
}

impl AsRawFd for FakeUdp4 {
    fn as_raw_fd(&self) -> RawFd {
        self.state.pipe.read
    }
}

struct FakeUdp6 {
    state: Rc<Udp6State>,
}

impl UdpSocket6 for FakeUdp6 {
    fn send_to(&mut self, destination: SocketAddrV6, payload: &[u8]) -> io::Result<usize> {
        self.state
            .outbound
            .borrow_mut()
            .push((destination, payload.to_vec()));
        Ok(payload.len())
    }

    fn recv_from(
        &mut self,
        buffer: &mut [u8],
    ) -> io::Result<Option<(usize, SocketAddrV6, u32)>> {
        match self.state.inbound.borrow_mut().pop_front() {
            Some((source, arrival, payload)) => {
                self.state.pipe.drain_one();
                let size = payload.len().min(buffer.len());
                buffer[..size].copy_from_slice(&payload[..size]);
                Ok(Some((size, source, arrival)))
            }
            None => Ok(None),
        }
    }
}

impl AsRawFd for FakeUdp6 {
    fn as_raw_fd(&self) -> RawFd {
        self.state.pipe.read
    }
}

/// A shared in memory lease store.
#[derive(Clone, Default)]
pub struct FakeLeaseStore {
    inner: Rc<RefCell<HashMap<(String, Family), StoredLease>>>,
}

impl FakeLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plants a lease with an explicit write timestamp, as if a previous
    /// daemon run had left it behind.
    pub fn seed(&self, interface: &str, family: Family, data: &[u8], written: SystemTime) {
        self.inner.borrow_mut().insert(
            (interface.to_owned(), family),
            StoredLease {
                data: data.to_vec(),
                written,
            },
        );
    }
}

impl LeaseStore for FakeLeaseStore {
    fn read(&self, interface: &str, family: Family) -> io::Result<Option<StoredLease>> {
        Ok(self
            .inner
            .borrow()
            .get(&(interface.to_owned(), family))
            .cloned())
    }

    fn write(&mut self, interface: &str, family: Family, data: &[u8]) -> io::Result<()> {
        self.inner.borrow_mut().insert(
            (interface.to_owned(), family),
            StoredLease {
                data: data.to_vec(),
                written: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn remove(&mut self, interface: &str, family: Family) -> io::Result<()> {
        self.inner.borrow_mut().remove(&(interface.to_owned(), family));
        Ok(())
    }
}

#[derive(Default)]
struct ConfiguratorState {
    up: Vec<String>,
    v4: HashMap<String, Binding4>,
    v6: HashMap<String, Vec<Binding6>>,
}

/// A shared in memory configuration sink.
#[derive(Clone, Default)]
pub struct FakeConfigurator {
    inner: Rc<RefCell<ConfiguratorState>>,
}

impl FakeConfigurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_up(&self, interface: &str) -> bool {
        self.inner.borrow().up.iter().any(|name| name == interface)
    }

    pub fn bound_v4(&self, interface: &str) -> Option<Binding4> {
        self.inner.borrow().v4.get(interface).cloned()
    }

    pub fn bound_v6(&self, interface: &str) -> Vec<Binding6> {
        self.inner
            .borrow()
            .v6
            .get(interface)
            .cloned()
            .unwrap_or_default()
    }
}

impl Configurator for FakeConfigurator {
    fn link_up(&mut self, interface: &str) -> io::Result<()> {
        let mut state = self.inner.borrow_mut();
        if !state.up.iter().any(|name| name == interface) {
            state.up.push(interface.to_owned());
        }
        Ok(())
    }

    fn apply_v4(&mut self, interface: &str, binding: &Binding4) -> io::Result<()> {
        self.inner
            .borrow_mut()
            .v4
            .insert(interface.to_owned(), binding.clone());
        Ok(())
    }

    fn remove_v4(&mut self, interface: &str, _binding: &Binding4) -> io::Result<()> {
        self.inner.borrow_mut().v4.remove(interface);
        Ok(())
    }

    fn apply_v6(&mut self, interface: &str, binding: &Binding6) -> io::Result<()> {
        let mut state = self.inner.borrow_mut();
        let bindings = state.v6.entry(interface.to_owned()).or_default();
        bindings.retain(|existing| existing.address != binding.address);
        bindings.push(binding.clone());
        Ok(())
    }

    fn remove_v6(&mut self, interface: &str, binding: &Binding6) -> io::Result<()> {
        let mut state = self.inner.borrow_mut();
        if let Some(bindings) = state.v6.get_mut(interface) {
            bindings.retain(|existing| existing.address != binding.address);
        }
        Ok(())
    }
}
