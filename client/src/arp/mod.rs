//! The RFC 5227 address claim engine.
//!
//! One engine runs per interface. The DHCPv4 and the link-local state
//! machines each own at most one claim at a time, so the engine tracks
//! up to two claims and shares one raw socket between them. The socket
//! is opened with the first claim and closed with the last one.
//!
//! Probe and announcement packets are transmitted from the claim tick
//! handler. Starting a cycle only schedules an immediate tick, so every
//! transmission goes through the same path.

pub mod packet;

use std::{
    io,
    net::Ipv4Addr,
    os::unix::io::{AsRawFd, RawFd},
    time::{Duration, Instant},
};

use eui48::MacAddress;
use rand::Rng;

use dhcp_eloop::EventLoop;
use dhcp_platform::{Interface, LinkSocket, SocketFactory};

use crate::event::{Event, QUEUE_ARP};

use self::packet::{Packet, ETHERTYPE_ARP, SIZE_PACKET};

/// The RFC 5227 section 1.1 timing constants.
pub const PROBE_WAIT: f64 = 1.0;
pub const PROBE_NUM: u32 = 3;
pub const PROBE_MIN: f64 = 1.0;
pub const PROBE_MAX: f64 = 2.0;
pub const ANNOUNCE_WAIT: u64 = 2;
pub const ANNOUNCE_NUM: u32 = 2;
pub const ANNOUNCE_INTERVAL: u64 = 2;
pub const DEFEND_INTERVAL: u64 = 10;

/// The state machine a claim belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Originator {
    Dhcp,
    LinkLocal,
}

/// An outcome reported back to the claim's originator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimEvent {
    /// The probe cycle saw no conflict. The address may be used.
    Probed(Ipv4Addr),
    /// The announcement cycle has completed. The claim is defended now.
    Announced(Ipv4Addr),
    /// The address is in use elsewhere and the claim was abandoned.
    Conflict {
        address: Ipv4Addr,
        /// The offending sender, or `None` for a duplicate reported
        /// from outside the engine.
        reporter: Option<MacAddress>,
    },
}

#[derive(Debug, Clone, Copy)]
enum ClaimState {
    Probing { sent: u32 },
    /// All probes are out. The quiet period before the probed outcome.
    ProbeWait,
    Announcing { sent: u32 },
    Defending { last_defense: Instant },
}

struct Claim {
    originator: Originator,
    address: Ipv4Addr,
    tick: Event,
    state: ClaimState,
}

/// The claim engine of one interface.
pub struct Arp {
    interface: Interface,
    socket: Option<Box<dyn LinkSocket>>,
    claims: Vec<Claim>,
}

impl Arp {
    pub fn new(interface: Interface) -> Self {
        Self {
            interface,
            socket: None,
            claims: Vec::new(),
        }
    }

    /// The descriptor of the shared raw socket, if one is open.
    pub fn socket_fd(&self) -> Option<RawFd> {
        self.socket.as_ref().map(|socket| socket.as_raw_fd())
    }

    /// Starts a probe cycle for `candidate` on behalf of `originator`.
    ///
    /// A previous claim by the same originator is dropped first.
    ///
    /// # Errors
    /// `io::Error` if the raw socket cannot be opened. No claim is
    /// created and no outcome will be reported. The caller owns the
    /// retry policy.
    pub fn probe(
        &mut self,
        eloop: &mut EventLoop<Event>,
        sockets: &mut dyn SocketFactory,
        originator: Originator,
        candidate: Ipv4Addr,
    ) -> io::Result<()> {
        self.drop_claim(eloop, originator);
        self.ensure_socket(eloop, sockets)?;
        let tick = Self::tick_event(originator);
        self.claims.push(Claim {
            originator,
            address: candidate,
            tick,
            state: ClaimState::Probing { sent: 0 },
        });
        debug!("{}: probing for {}", self.interface.name, candidate);
        eloop.schedule(Duration::ZERO, QUEUE_ARP, tick, self.owner());
        Ok(())
    }

    /// Starts the announcement cycle for the originator's claim.
    ///
    /// Without a preceding probe cycle the claim is created on the
    /// spot, so a revived lease can be announced directly.
    ///
    /// # Errors
    /// `io::Error` if the raw socket cannot be opened.
    pub fn announce(
        &mut self,
        eloop: &mut EventLoop<Event>,
        sockets: &mut dyn SocketFactory,
        originator: Originator,
        address: Ipv4Addr,
    ) -> io::Result<()> {
        self.ensure_socket(eloop, sockets)?;
        let tick = Self::tick_event(originator);
        match self
            .claims
            .iter_mut()
            .find(|claim| claim.originator == originator)
        {
            Some(claim) => {
                claim.address = address;
                claim.state = ClaimState::Announcing { sent: 0 };
            }
            None => self.claims.push(Claim {
                originator,
                address,
                tick,
                state: ClaimState::Announcing { sent: 0 },
            }),
        }
        debug!("{}: announcing {}", self.interface.name, address);
        eloop.schedule(Duration::ZERO, QUEUE_ARP, tick, self.owner());
        Ok(())
    }

    /// Abandons the originator's claim without reporting an outcome.
    pub fn release(&mut self, eloop: &mut EventLoop<Event>, originator: Originator) {
        self.drop_claim(eloop, originator);
        self.close_if_idle(eloop);
    }

    /// Advances a claim cycle after its tick timer has fired.
    pub fn handle_tick(
        &mut self,
        eloop: &mut EventLoop<Event>,
        tick: Event,
    ) -> Option<(Originator, ClaimEvent)> {
        let index = self.claims.iter().position(|claim| claim.tick == tick)?;
        let owner = self.owner();
        let originator = self.claims[index].originator;
        let address = self.claims[index].address;

        match self.claims[index].state {
            ClaimState::Probing { sent } => {
                self.transmit(&Packet::probe(self.interface.hardware_address, address));
                let sent = sent + 1;
                if sent == PROBE_NUM {
                    self.claims[index].state = ClaimState::ProbeWait;
                    eloop.schedule(Duration::from_secs(ANNOUNCE_WAIT), QUEUE_ARP, tick, owner);
                } else {
                    self.claims[index].state = ClaimState::Probing { sent };
                    let delay = rand::thread_rng().gen_range(PROBE_MIN..PROBE_MAX);
                    eloop.schedule(Duration::from_secs_f64(delay), QUEUE_ARP, tick, owner);
                }
                None
            }
            ClaimState::ProbeWait => Some((originator, ClaimEvent::Probed(address))),
            ClaimState::Announcing { sent } => {
                if sent == ANNOUNCE_NUM {
                    self.claims[index].state = ClaimState::Defending {
                        last_defense: Instant::now(),
                    };
                    debug!("{}: {} is defended from now on", self.interface.name, address);
                    Some((originator, ClaimEvent::Announced(address)))
                } else {
                    self.transmit(&Packet::announce(self.interface.hardware_address, address));
                    self.claims[index].state = ClaimState::Announcing { sent: sent + 1 };
                    eloop.schedule(
                        Duration::from_secs(ANNOUNCE_INTERVAL),
                        QUEUE_ARP,
                        tick,
                        owner,
                    );
                    None
                }
            }
            ClaimState::Defending { .. } => None,
        }
    }

    /// Drains the raw socket and checks every frame against the claims.
    ///
    /// A conflicting frame ends the claim it hits, except while the
    /// claim is defending and the previous defense is fresher than
    /// `DEFEND_INTERVAL`. Then the conflict is answered with another
    /// announcement instead.
    pub fn handle_socket(
        &mut self,
        eloop: &mut EventLoop<Event>,
    ) -> Vec<(Originator, ClaimEvent)> {
        let mut outcomes = Vec::new();
        let mut buffer = [0u8; 128];
        loop {
            let amount = match self.socket.as_mut() {
                Some(socket) => match socket.recv(&mut buffer) {
                    Ok(Some(amount)) => amount,
                    Ok(None) => break,
                    Err(error) => {
                        warn!(
                            "{}: unable to receive an ARP packet: {}",
                            self.interface.name, error
                        );
                        break;
                    }
                },
                None => break,
            };
            let packet = match Packet::from_bytes(&buffer[..amount]) {
                Ok(packet) => packet,
                Err(error) => {
                    debug!(
                        "{}: dropping a malformed ARP packet: {}",
                        self.interface.name, error
                    );
                    continue;
                }
            };
            if packet.sender_hardware == self.interface.hardware_address {
                continue;
            }
            self.inspect(eloop, &packet, &mut outcomes);
        }
        self.close_if_idle(eloop);
        outcomes
    }

    /// Handles a duplicate reported from outside the engine, like the
    /// kernel's own duplicate address detection. The claim is always
    /// surrendered, even while defending.
    pub fn external_conflict(
        &mut self,
        eloop: &mut EventLoop<Event>,
        address: Ipv4Addr,
    ) -> Vec<(Originator, ClaimEvent)> {
        let owner = self.owner();
        let mut outcomes = Vec::new();
        let mut index = 0;
        while index < self.claims.len() {
            if self.claims[index].address != address {
                index += 1;
                continue;
            }
            let claim = self.claims.remove(index);
            eloop.cancel(QUEUE_ARP, Some(claim.tick), owner);
            warn!(
                "{}: {} was reported as a duplicate",
                self.interface.name, address
            );
            outcomes.push((
                claim.originator,
                ClaimEvent::Conflict {
                    address,
                    reporter: None,
                },
            ));
        }
        self.close_if_idle(eloop);
        outcomes
    }

    fn inspect(
        &mut self,
        eloop: &mut EventLoop<Event>,
        packet: &Packet,
        outcomes: &mut Vec<(Originator, ClaimEvent)>,
    ) {
        let owner = self.owner();
        let mut index = 0;
        while index < self.claims.len() {
            let address = self.claims[index].address;
            let conflicting = packet.sender_protocol == address
                || (packet.sender_protocol.is_unspecified() && packet.target_protocol == address);
            if !conflicting {
                index += 1;
                continue;
            }
            if let ClaimState::Defending { last_defense } = self.claims[index].state {
                if last_defense.elapsed() < Duration::from_secs(DEFEND_INTERVAL) {
                    info!(
                        "{}: defending {} against {}",
                        self.interface.name, address, packet.sender_hardware
                    );
                    self.claims[index].state = ClaimState::Defending {
                        last_defense: Instant::now(),
                    };
                    self.transmit(&Packet::announce(self.interface.hardware_address, address));
                    index += 1;
                    continue;
                }
            }
            let claim = self.claims.remove(index);
            eloop.cancel(QUEUE_ARP, Some(claim.tick), owner);
            warn!(
                "{}: {} is in use by {}",
                self.interface.name, address, packet.sender_hardware
            );
            outcomes.push((
                claim.originator,
                ClaimEvent::Conflict {
                    address,
                    reporter: Some(packet.sender_hardware),
                },
            ));
        }
    }

    fn transmit(&mut self, packet: &Packet) {
        let mut buffer = [0u8; SIZE_PACKET];
        let result = packet.to_bytes(&mut buffer).and_then(|amount| {
            match self.socket.as_mut() {
                Some(socket) => socket.send(MacAddress::broadcast(), &buffer[..amount]),
                None => Err(io::Error::new(io::ErrorKind::NotConnected, "No raw socket")),
            }
        });
        if let Err(error) = result {
            warn!(
                "{}: unable to send an ARP packet: {}",
                self.interface.name, error
            );
        }
    }

    fn ensure_socket(
        &mut self,
        eloop: &mut EventLoop<Event>,
        sockets: &mut dyn SocketFactory,
    ) -> io::Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = sockets.link(&self.interface, ETHERTYPE_ARP)?;
        eloop
            .register_io(socket.as_raw_fd(), Some(Event::ArpSocket), None)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
        self.socket = Some(socket);
        Ok(())
    }

    fn close_if_idle(&mut self, eloop: &mut EventLoop<Event>) {
        if !self.claims.is_empty() {
            return;
        }
        if let Some(socket) = self.socket.take() {
            eloop.unregister_io(socket.as_raw_fd(), false);
        }
    }

    fn drop_claim(&mut self, eloop: &mut EventLoop<Event>, originator: Originator) {
        let owner = self.owner();
        if let Some(index) = self
            .claims
            .iter()
            .position(|claim| claim.originator == originator)
        {
            let claim = self.claims.remove(index);
            eloop.cancel(QUEUE_ARP, Some(claim.tick), owner);
        }
    }

    fn tick_event(originator: Originator) -> Event {
        match originator {
            Originator::Dhcp => Event::ArpDhcpTick,
            Originator::LinkLocal => Event::ArpLlTick,
        }
    }

    fn owner(&self) -> u64 {
        u64::from(self.interface.index)
    }

    #[cfg(test)]
    fn backdate_defense(&mut self, originator: Originator, by: Duration) {
        if let Some(claim) = self
            .claims
            .iter_mut()
            .find(|claim| claim.originator == originator)
        {
            if let ClaimState::Defending {
                ref mut last_defense,
            } = claim.state
            {
                *last_defense = Instant::now() - by;
            }
        }
    }
}
