//! The DHCPv4 lease engine of one interface.
//!
//! The engine is driven entirely by reactor wakes. Entering a state
//! schedules an immediate send tick, so every transmission and every
//! retransmission goes through the same timer path. Messages sent
//! before an address is bound are broadcast over the link socket with
//! hand built headers. Unicasts go through the UDP socket and fall
//! back to the link socket when the kernel refuses them.

pub mod builder;
pub mod lease;
pub mod rawudp;

use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4},
    os::unix::io::{AsRawFd, RawFd},
    time::{Duration, Instant},
};

use eui48::MacAddress;
use rand::Rng;

use dhcp_eloop::EventLoop;
use dhcp_platform::{Family, Interface, LinkSocket, SocketFactory, UdpSocket4};
use dhcp_protocol::v4::{
    constants::{PORT_CLIENT, PORT_SERVER, SIZE_MESSAGE_MINIMAL},
    Message, MessageType, OperationCode, OptionTag,
};

use crate::arp::{ClaimEvent, Originator};
use crate::config::ClientConfig;
use crate::daemon::Env;
use crate::event::{Event, QUEUE_DHCP4};

use self::builder::MessageBuilder;
use self::lease::Lease4;

/// The EtherType of IPv4 frames sent over the link socket.
const ETHERTYPE_IP: u16 = 0x0800;

/// The first retransmission interval in seconds.
const BACKOFF_INITIAL: u64 = 4;

/// The retransmission interval cap in seconds.
const BACKOFF_MAX: u64 = 64;

/// The retransmission jitter bounds in seconds.
const RAND_MIN: f64 = -1.0;
const RAND_MAX: f64 = 1.0;

/// The cap of the independent backoff applied after a NAK, in seconds.
const NAKOFF_MAX: u64 = 60;

/// The floor of the renew and rebind retry intervals in seconds.
const RETRY_MIN: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    /// Waiting for an offer.
    Discover,
    /// Waiting for an acknowledgement, or probing the acked address.
    Request,
    /// Waiting for an acknowledgement of a revived lease.
    Reboot,
    Bound,
    Renew,
    Rebind,
    /// Waiting for an acknowledgement carrying options only.
    Inform,
    /// The lease was released or the engine stopped.
    Release,
    /// Waiting out the quiet period after declining an address.
    Decline,
}

/// A side effect the daemon settles after an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// DHCP is not answering. Link-local assignment may start.
    LinkLocalStart,
    /// A real lease is bound. Link-local assignment must end.
    LinkLocalStop,
    /// An address in use was lost to a conflict.
    Conflict { address: Ipv4Addr },
}

/// An acknowledged lease waiting out the address probe.
struct Pending {
    message: Message,
    raw: Vec<u8>,
}

/// The DHCPv4 engine of one interface.
pub struct Dhcp4 {
    interface: Interface,
    config: ClientConfig,
    builder: MessageBuilder,
    udp: Box<dyn UdpSocket4>,
    link: Box<dyn LinkSocket>,
    state: State,
    xid: u32,
    /// The base of the `secs` field for the running acquisition.
    started: Instant,
    /// The exponential retransmission interval in whole seconds.
    interval: u64,
    /// The independent backoff applied after a NAK.
    nak_interval: u64,
    /// The accepted offer, address and server, while requesting.
    offer: Option<(Ipv4Addr, Ipv4Addr)>,
    /// The address of a stored lease being reclaimed.
    reclaim: Option<Ipv4Addr>,
    pending: Option<Pending>,
    lease: Option<Lease4>,
}

impl Dhcp4 {
    /// Opens the engine's sockets and registers the UDP one with the
    /// reactor. The link socket is send only.
    pub fn open(
        eloop: &mut EventLoop<Event>,
        sockets: &mut dyn SocketFactory,
        interface: Interface,
        config: ClientConfig,
    ) -> io::Result<Self> {
        let udp = sockets.udp4(&interface, PORT_CLIENT)?;
        let link = sockets.link(&interface, ETHERTYPE_IP)?;
        eloop
            .register_io(udp.as_raw_fd(), Some(Event::Dhcp4Socket), None)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
        let builder = MessageBuilder::new(
            interface.hardware_address,
            config.client_id.clone(),
            config.hostname.clone().or_else(default_hostname),
            config.request.clone(),
        );
        Ok(Self {
            interface,
            config,
            builder,
            udp,
            link,
            state: State::Init,
            xid: 0,
            started: Instant::now(),
            interval: 0,
            nak_interval: 0,
            offer: None,
            reclaim: None,
            pending: None,
            lease: None,
        })
    }

    /// The descriptor the daemon dispatches readability on.
    pub fn socket_fd(&self) -> RawFd {
        self.udp.as_raw_fd()
    }

    /// The persisted form of the bound lease, if any.
    pub fn lease_raw(&self) -> Option<&[u8]> {
        self.lease.as_ref().map(|lease| lease.raw.as_slice())
    }

    /// Begins operation, reclaiming a persisted lease when one is
    /// still worth asking for.
    pub fn start(&mut self, env: &mut Env) -> Vec<Notice> {
        if let Some(address) = self.config.inform_address {
            self.begin_inform(env.eloop, address);
            return Vec::new();
        }
        match self.revive(env) {
            Some(address) => {
                self.begin_reboot(env.eloop, address);
                Vec::new()
            }
            None => self.begin_discover(env.eloop),
        }
    }

    /// Stops the engine, optionally releasing the lease to the server.
    pub fn stop(&mut self, env: &mut Env, release: bool) {
        env.eloop.cancel(QUEUE_DHCP4, None, self.owner());
        if release {
            let bound = self
                .lease
                .as_ref()
                .map(|lease| (lease.address, lease.server_id));
            if let Some((address, server_id)) = bound {
                info!("{}: releasing {}", self.interface.name, address);
                let message = self.builder.release(self.xid, address, server_id, None);
                self.transmit(&message, Some(SocketAddrV4::new(server_id, PORT_SERVER)));
                if let Err(error) = env.store.remove(&self.interface.name, Family::Ipv4) {
                    warn!(
                        "{}: unable to erase the lease: {}",
                        self.interface.name, error
                    );
                }
            }
        }
        self.drop_binding(env);
        self.pending = None;
        self.offer = None;
        self.state = State::Release;
    }

    /// Drops the lease without telling the server and starts over.
    pub fn drop_lease(&mut self, env: &mut Env) -> Vec<Notice> {
        self.drop_binding(env);
        let _ = env.store.remove(&self.interface.name, Family::Ipv4);
        env.eloop.cancel(QUEUE_DHCP4, None, self.owner());
        self.begin_discover(env.eloop)
    }

    /// Routes one of the engine's timers.
    pub fn handle_timer(&mut self, env: &mut Env, event: Event) -> Vec<Notice> {
        match event {
            Event::Dhcp4Send => self.handle_send(env),
            Event::Dhcp4Renew => self.begin_renew(env.eloop),
            Event::Dhcp4Rebind => self.begin_rebind(env.eloop),
            Event::Dhcp4Expire => self.expire(env),
            _ => Vec::new(),
        }
    }

    /// Drains the UDP socket, feeding every datagram to the engine.
    pub fn handle_socket(&mut self, env: &mut Env) -> Vec<Notice> {
        let mut notices = Vec::new();
        let mut buffer = [0u8; 2048];
        loop {
            let (amount, source) = match self.udp.recv_from(&mut buffer) {
                Ok(Some(received)) => received,
                Ok(None) => break,
                Err(error) => {
                    warn!("{}: receive error: {}", self.interface.name, error);
                    break;
                }
            };
            let (message, message_type) = match self.accept(&buffer[..amount], source) {
                Some(accepted) => accepted,
                None => continue,
            };
            notices.extend(self.handle_message(env, message, message_type, &buffer[..amount]));
        }
        notices
    }

    /// Routes a claim outcome from the claim engine.
    pub fn on_claim(&mut self, env: &mut Env, outcome: ClaimEvent) -> Vec<Notice> {
        match outcome {
            ClaimEvent::Probed(_) => match self.pending.take() {
                Some(pending) => self.commit(env, &pending.message, pending.raw),
                None => Vec::new(),
            },
            ClaimEvent::Announced(address) => {
                debug!("{}: finished announcing {}", self.interface.name, address);
                Vec::new()
            }
            ClaimEvent::Conflict { address, .. } => self.conflict(env, address),
        }
    }

    fn handle_send(&mut self, env: &mut Env) -> Vec<Notice> {
        let owner = self.owner();
        let seconds = self.seconds();
        match self.state {
            State::Init | State::Decline => self.begin_discover(env.eloop),
            State::Discover => {
                let mut notices = Vec::new();
                if self.interval != 0 && self.config.ipv4ll {
                    notices.push(Notice::LinkLocalStart);
                }
                let message = self.builder.discover(self.xid, seconds, true, None);
                self.transmit(&message, None);
                let delay = self.next_interval();
                env.eloop
                    .schedule(delay, QUEUE_DHCP4, Event::Dhcp4Send, owner);
                notices
            }
            State::Request => {
                if self.interval >= BACKOFF_MAX {
                    warn!(
                        "{}: no acknowledgement, discovering again",
                        self.interface.name
                    );
                    return self.begin_discover(env.eloop);
                }
                let (address, server_id) = match self.offer {
                    Some(offer) => offer,
                    None => return self.begin_discover(env.eloop),
                };
                let message =
                    self.builder
                        .request_selecting(self.xid, seconds, true, address, server_id);
                self.transmit(&message, None);
                let delay = self.next_interval();
                env.eloop
                    .schedule(delay, QUEUE_DHCP4, Event::Dhcp4Send, owner);
                Vec::new()
            }
            State::Reboot => {
                if self.started.elapsed() >= Duration::from_secs(self.config.reboot_timeout) {
                    info!(
                        "{}: the old lease went unanswered, discovering",
                        self.interface.name
                    );
                    return self.begin_discover(env.eloop);
                }
                let address = match self.reclaim {
                    Some(address) => address,
                    None => return self.begin_discover(env.eloop),
                };
                let message = self.builder.request_init_reboot(self.xid, seconds, address);
                self.transmit(&message, None);
                let delay = self.next_interval();
                env.eloop
                    .schedule(delay, QUEUE_DHCP4, Event::Dhcp4Send, owner);
                Vec::new()
            }
            State::Renew => {
                let (address, server_id, retry) = match self.lease {
                    Some(ref lease) => (
                        lease.address,
                        lease.server_id,
                        (lease.until_rebind() / 2).max(Duration::from_secs(RETRY_MIN)),
                    ),
                    None => return Vec::new(),
                };
                let message = self.builder.request_renew(self.xid, seconds, address);
                self.transmit(&message, Some(SocketAddrV4::new(server_id, PORT_SERVER)));
                env.eloop
                    .schedule(retry, QUEUE_DHCP4, Event::Dhcp4Send, owner);
                Vec::new()
            }
            State::Rebind => {
                let (address, retry) = match self.lease {
                    Some(ref lease) => (
                        lease.address,
                        (lease.until_expiry() / 2).max(Duration::from_secs(RETRY_MIN)),
                    ),
                    None => return Vec::new(),
                };
                let message = self.builder.request_renew(self.xid, seconds, address);
                self.transmit(&message, None);
                env.eloop
                    .schedule(retry, QUEUE_DHCP4, Event::Dhcp4Send, owner);
                Vec::new()
            }
            State::Inform => {
                let address = match self.config.inform_address {
                    Some(address) => address,
                    None => return Vec::new(),
                };
                let message = self.builder.inform(self.xid, address);
                self.transmit(&message, None);
                let delay = self.next_interval();
                env.eloop
                    .schedule(delay, QUEUE_DHCP4, Event::Dhcp4Send, owner);
                Vec::new()
            }
            State::Bound | State::Release => Vec::new(),
        }
    }

    /// Parses and screens one datagram. Replies with a foreign
    /// transaction, another client's hardware address, a missing
    /// required option or a rejected option are dropped here.
    fn accept(&self, data: &[u8], source: SocketAddrV4) -> Option<(Message, MessageType)> {
        let message = match Message::from_bytes(data) {
            Ok(message) => message,
            Err(error) => {
                debug!(
                    "{}: dropping a malformed message from {}: {}",
                    self.interface.name, source, error
                );
                return None;
            }
        };
        if message.operation_code != OperationCode::BootReply {
            return None;
        }
        if message.transaction_id != self.xid {
            debug!(
                "{}: dropping a reply to transaction {:#010x}",
                self.interface.name, message.transaction_id
            );
            return None;
        }
        if message.client_hardware_address != self.interface.hardware_address {
            return None;
        }
        let message_type = match message.validate() {
            Ok(message_type) => message_type,
            Err(error) => {
                warn!(
                    "{}: dropping an invalid message from {}: {}",
                    self.interface.name, source, error
                );
                return None;
            }
        };
        for &tag in self.config.reject.iter() {
            if has_option(&message, tag) {
                warn!(
                    "{}: dropping a message carrying rejected option {}",
                    self.interface.name, tag
                );
                return None;
            }
        }
        if message_type != MessageType::DhcpNak {
            for &tag in self.config.require.iter() {
                if !has_option(&message, tag) {
                    warn!(
                        "{}: dropping a message without required option {}",
                        self.interface.name, tag
                    );
                    return None;
                }
            }
        }
        Some((message, message_type))
    }

    fn handle_message(
        &mut self,
        env: &mut Env,
        message: Message,
        message_type: MessageType,
        raw: &[u8],
    ) -> Vec<Notice> {
        match (message_type, self.state) {
            (MessageType::DhcpOffer, State::Discover) => self.handle_offer(env, &message),
            (MessageType::DhcpAck, State::Request)
            | (MessageType::DhcpAck, State::Reboot)
            | (MessageType::DhcpAck, State::Renew)
            | (MessageType::DhcpAck, State::Rebind) => self.handle_ack(env, message, raw),
            (MessageType::DhcpAck, State::Inform) => {
                self.handle_inform_ack(env.eloop, &message);
                Vec::new()
            }
            (MessageType::DhcpNak, State::Request)
            | (MessageType::DhcpNak, State::Reboot)
            | (MessageType::DhcpNak, State::Renew)
            | (MessageType::DhcpNak, State::Rebind) => self.handle_nak(env, &message),
            _ => {
                debug!(
                    "{}: ignoring a {:?} in state {:?}",
                    self.interface.name, message_type, self.state
                );
                Vec::new()
            }
        }
    }

    fn handle_offer(&mut self, env: &mut Env, message: &Message) -> Vec<Notice> {
        let mut notices = Vec::new();
        let address = message.your_ip_address;
        if address.is_unspecified() {
            // RFC 2563: the server has no address for us.
            info!("{}: the server offers no address", self.interface.name);
            if self.config.ipv4ll {
                notices.push(Notice::LinkLocalStart);
            }
            return notices;
        }
        if address.is_broadcast() {
            warn!(
                "{}: rejecting the offer of {}",
                self.interface.name, address
            );
            return notices;
        }
        let server_id = match message.options.dhcp_server_id {
            Some(server_id) => server_id,
            None => return notices,
        };
        info!(
            "{}: offered {} by {}",
            self.interface.name, address, server_id
        );
        self.offer = Some((address, server_id));
        self.state = State::Request;
        self.interval = 0;
        env.eloop
            .schedule(Duration::ZERO, QUEUE_DHCP4, Event::Dhcp4Send, self.owner());
        notices
    }

    fn handle_ack(&mut self, env: &mut Env, message: Message, raw: &[u8]) -> Vec<Notice> {
        if let Some((_, server_id)) = self.offer {
            match message.options.dhcp_server_id {
                Some(acked) if acked == server_id => {}
                Some(acked) => {
                    debug!(
                        "{}: ignoring an acknowledgement from {}",
                        self.interface.name, acked
                    );
                    return Vec::new();
                }
                None => return Vec::new(),
            }
        }
        let address = message.your_ip_address;
        if address.is_unspecified() || address.is_broadcast() {
            warn!(
                "{}: rejecting the acknowledgement of {}",
                self.interface.name, address
            );
            return Vec::new();
        }

        let probe_needed = self.config.arp_probe
            && self.lease.as_ref().map(|lease| lease.address) != Some(address);
        if probe_needed {
            info!("{}: probing {} before use", self.interface.name, address);
            env.eloop
                .cancel(QUEUE_DHCP4, Some(Event::Dhcp4Send), self.owner());
            match env
                .arp
                .probe(env.eloop, env.sockets, Originator::Dhcp, address)
            {
                Ok(()) => {
                    self.pending = Some(Pending {
                        message,
                        raw: raw.to_vec(),
                    });
                    return Vec::new();
                }
                Err(error) => {
                    warn!(
                        "{}: unable to probe, using {} anyway: {}",
                        self.interface.name, address, error
                    );
                }
            }
        }
        self.commit(env, &message, raw.to_vec())
    }

    /// Persists and applies an acknowledged lease, scheduling its
    /// renewal cycle.
    fn commit(&mut self, env: &mut Env, message: &Message, raw: Vec<u8>) -> Vec<Notice> {
        let owner = self.owner();
        if let Err(error) = env.store.write(&self.interface.name, Family::Ipv4, &raw) {
            warn!(
                "{}: unable to persist the lease: {}",
                self.interface.name, error
            );
        }
        let lease = match Lease4::admit(&self.interface.name, message, raw) {
            Some(lease) => lease,
            None => {
                let _ = env.store.remove(&self.interface.name, Family::Ipv4);
                return self.begin_discover(env.eloop);
            }
        };
        if let Some(old) = self.lease.take() {
            if old.address != lease.address {
                info!(
                    "{}: the server moved us from {} to {}",
                    self.interface.name, old.address, lease.address
                );
                if let Err(error) = env
                    .configurator
                    .remove_v4(&self.interface.name, &old.binding)
                {
                    warn!(
                        "{}: unable to remove {}: {}",
                        self.interface.name, old.address, error
                    );
                }
            }
        }
        if let Err(error) = env
            .configurator
            .apply_v4(&self.interface.name, &lease.binding)
        {
            warn!(
                "{}: unable to configure {}: {}",
                self.interface.name, lease.address, error
            );
        }
        env.eloop.cancel(QUEUE_DHCP4, None, owner);
        if lease.is_infinite() {
            info!(
                "{}: leased {} permanently",
                self.interface.name, lease.address
            );
        } else {
            info!(
                "{}: leased {} for {} seconds",
                self.interface.name, lease.address, lease.lease_time
            );
            env.eloop.schedule(
                Duration::from_secs(u64::from(lease.renewal_time)),
                QUEUE_DHCP4,
                Event::Dhcp4Renew,
                owner,
            );
            env.eloop.schedule(
                Duration::from_secs(u64::from(lease.rebinding_time)),
                QUEUE_DHCP4,
                Event::Dhcp4Rebind,
                owner,
            );
            env.eloop.schedule(
                Duration::from_secs(u64::from(lease.lease_time)),
                QUEUE_DHCP4,
                Event::Dhcp4Expire,
                owner,
            );
        }
        if self.config.arp_probe {
            if let Err(error) =
                env.arp
                    .announce(env.eloop, env.sockets, Originator::Dhcp, lease.address)
            {
                warn!(
                    "{}: unable to announce {}: {}",
                    self.interface.name, lease.address, error
                );
            }
        }
        self.lease = Some(lease);
        self.state = State::Bound;
        self.offer = None;
        self.reclaim = None;
        self.pending = None;
        self.interval = 0;
        self.nak_interval = 0;
        if self.config.ipv4ll {
            vec![Notice::LinkLocalStop]
        } else {
            Vec::new()
        }
    }

    fn handle_inform_ack(&mut self, eloop: &mut EventLoop<Event>, message: &Message) {
        info!(
            "{}: the server supplied configuration options",
            self.interface.name
        );
        if let Some(ref servers) = message.options.domain_name_servers {
            info!("{}: name servers {:?}", self.interface.name, servers);
        }
        if let Some(ref domain) = message.options.domain_name {
            info!("{}: domain {}", self.interface.name, domain);
        }
        eloop.cancel(QUEUE_DHCP4, Some(Event::Dhcp4Send), self.owner());
    }

    fn handle_nak(&mut self, env: &mut Env, message: &Message) -> Vec<Notice> {
        match message.options.dhcp_message {
            Some(ref explanation) => warn!(
                "{}: the server declined the lease: {}",
                self.interface.name, explanation
            ),
            None => warn!("{}: the server declined the lease", self.interface.name),
        }
        self.drop_binding(env);
        let _ = env.store.remove(&self.interface.name, Family::Ipv4);
        self.nak_interval = if self.nak_interval == 0 {
            1
        } else {
            (self.nak_interval * 2).min(NAKOFF_MAX)
        };
        env.eloop.cancel(QUEUE_DHCP4, None, self.owner());
        self.state = State::Init;
        self.offer = None;
        self.reclaim = None;
        env.eloop.schedule(
            Duration::from_secs(self.nak_interval),
            QUEUE_DHCP4,
            Event::Dhcp4Send,
            self.owner(),
        );
        Vec::new()
    }

    /// Declines a conflicted address and schedules a fresh discovery
    /// after a short random pause.
    fn conflict(&mut self, env: &mut Env, address: Ipv4Addr) -> Vec<Notice> {
        let server_id = self
            .pending
            .as_ref()
            .and_then(|pending| pending.message.options.dhcp_server_id)
            .or_else(|| self.lease.as_ref().map(|lease| lease.server_id))
            .or_else(|| self.offer.map(|(_, server_id)| server_id));
        if let Some(server_id) = server_id {
            let message = self.builder.decline(
                self.xid,
                address,
                server_id,
                Some("address conflict detected".to_owned()),
            );
            self.transmit(&message, None);
        }
        self.pending = None;
        self.drop_binding(env);
        let _ = env.store.remove(&self.interface.name, Family::Ipv4);
        env.eloop.cancel(QUEUE_DHCP4, None, self.owner());
        self.state = State::Decline;
        let delay = rand::thread_rng().gen_range(0.0..RAND_MAX);
        env.eloop.schedule(
            Duration::from_secs_f64(delay),
            QUEUE_DHCP4,
            Event::Dhcp4Send,
            self.owner(),
        );
        vec![Notice::Conflict { address }]
    }

    fn expire(&mut self, env: &mut Env) -> Vec<Notice> {
        warn!("{}: the lease has expired", self.interface.name);
        self.drop_binding(env);
        let _ = env.store.remove(&self.interface.name, Family::Ipv4);
        env.eloop.cancel(QUEUE_DHCP4, None, self.owner());
        self.begin_discover(env.eloop)
    }

    /// Reads the persisted lease back, returning its address if it
    /// still has lifetime left to claim.
    fn revive(&mut self, env: &mut Env) -> Option<Ipv4Addr> {
        let stored = match env.store.read(&self.interface.name, Family::Ipv4) {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(error) => {
                warn!(
                    "{}: unable to read the lease: {}",
                    self.interface.name, error
                );
                return None;
            }
        };
        let message = match Message::from_bytes(&stored.data) {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    "{}: dropping an unreadable lease: {}",
                    self.interface.name, error
                );
                let _ = env.store.remove(&self.interface.name, Family::Ipv4);
                return None;
            }
        };
        if message.client_hardware_address != self.interface.hardware_address {
            debug!(
                "{}: the stored lease belongs to another interface",
                self.interface.name
            );
            return None;
        }
        let address = message.your_ip_address;
        if address.is_unspecified() {
            return None;
        }
        let lease_time = message.options.address_time.unwrap_or(0);
        if lease_time != lease::TIME_INFINITE {
            let age = stored.written.elapsed().unwrap_or_default().as_secs();
            if age >= u64::from(lease_time) {
                info!(
                    "{}: the stored lease of {} has expired",
                    self.interface.name, address
                );
                let _ = env.store.remove(&self.interface.name, Family::Ipv4);
                return None;
            }
        }
        Some(address)
    }

    fn begin_discover(&mut self, eloop: &mut EventLoop<Event>) -> Vec<Notice> {
        eloop.cancel(QUEUE_DHCP4, None, self.owner());
        self.xid = rand::thread_rng().gen();
        self.state = State::Discover;
        self.started = Instant::now();
        self.interval = 0;
        self.offer = None;
        self.reclaim = None;
        self.pending = None;
        info!("{}: soliciting an address", self.interface.name);
        eloop.schedule(Duration::ZERO, QUEUE_DHCP4, Event::Dhcp4Send, self.owner());
        Vec::new()
    }

    fn begin_reboot(&mut self, eloop: &mut EventLoop<Event>, address: Ipv4Addr) {
        self.xid = rand::thread_rng().gen();
        self.state = State::Reboot;
        self.started = Instant::now();
        self.interval = 0;
        self.reclaim = Some(address);
        info!(
            "{}: reclaiming the stored lease of {}",
            self.interface.name, address
        );
        eloop.schedule(Duration::ZERO, QUEUE_DHCP4, Event::Dhcp4Send, self.owner());
    }

    fn begin_renew(&mut self, eloop: &mut EventLoop<Event>) -> Vec<Notice> {
        if self.state != State::Bound {
            return Vec::new();
        }
        self.xid = rand::thread_rng().gen();
        self.state = State::Renew;
        self.started = Instant::now();
        self.interval = 0;
        info!("{}: renewing", self.interface.name);
        eloop.schedule(Duration::ZERO, QUEUE_DHCP4, Event::Dhcp4Send, self.owner());
        Vec::new()
    }

    fn begin_rebind(&mut self, eloop: &mut EventLoop<Event>) -> Vec<Notice> {
        if self.state != State::Renew && self.state != State::Bound {
            return Vec::new();
        }
        self.xid = rand::thread_rng().gen();
        self.state = State::Rebind;
        self.started = Instant::now();
        self.interval = 0;
        info!("{}: rebinding to any server", self.interface.name);
        eloop.schedule(Duration::ZERO, QUEUE_DHCP4, Event::Dhcp4Send, self.owner());
        Vec::new()
    }

    fn begin_inform(&mut self, eloop: &mut EventLoop<Event>, address: Ipv4Addr) {
        self.xid = rand::thread_rng().gen();
        self.state = State::Inform;
        self.started = Instant::now();
        self.interval = 0;
        info!(
            "{}: requesting options for {}",
            self.interface.name, address
        );
        eloop.schedule(Duration::ZERO, QUEUE_DHCP4, Event::Dhcp4Send, self.owner());
    }

    /// Removes the applied configuration and the address claim. The
    /// persisted lease is left alone.
    fn drop_binding(&mut self, env: &mut Env) {
        env.arp.release(env.eloop, Originator::Dhcp);
        if let Some(lease) = self.lease.take() {
            if let Err(error) = env
                .configurator
                .remove_v4(&self.interface.name, &lease.binding)
            {
                warn!(
                    "{}: unable to remove {}: {}",
                    self.interface.name, lease.address, error
                );
            }
        }
    }

    /// Sends `message` to `destination`, or broadcasts it over the
    /// link socket when no unicast path exists yet. A failed unicast
    /// falls back to broadcasting.
    fn transmit(&mut self, message: &Message, destination: Option<SocketAddrV4>) {
        let mut buffer = [0u8; SIZE_MESSAGE_MINIMAL];
        let amount = match message.to_bytes(&mut buffer) {
            Ok(amount) => amount,
            Err(error) => {
                error!(
                    "{}: unable to serialize a message: {}",
                    self.interface.name, error
                );
                return;
            }
        };
        let result = match destination {
            Some(destination) => self
                .udp
                .send_to(destination, &buffer[..amount])
                .or_else(|error| {
                    warn!(
                        "{}: unicast to {} failed, broadcasting: {}",
                        self.interface.name, destination, error
                    );
                    self.broadcast_raw(&buffer[..amount])
                }),
            None => self.broadcast_raw(&buffer[..amount]),
        };
        if let Err(error) = result {
            error!(
                "{}: unable to send a message: {}",
                self.interface.name, error
            );
        }
    }

    fn broadcast_raw(&mut self, payload: &[u8]) -> io::Result<usize> {
        let source_ip = self
            .lease
            .as_ref()
            .map(|lease| lease.address)
            .or(self.config.inform_address)
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        let datagram = rawudp::datagram(
            SocketAddrV4::new(source_ip, PORT_CLIENT),
            SocketAddrV4::new(Ipv4Addr::BROADCAST, PORT_SERVER),
            payload,
        );
        self.link.send(MacAddress::broadcast(), &datagram)
    }

    /// The RFC 2131 exponential backoff with a second of jitter.
    fn next_interval(&mut self) -> Duration {
        self.interval = if self.interval == 0 {
            BACKOFF_INITIAL
        } else {
            (self.interval * 2).min(BACKOFF_MAX)
        };
        let jitter = rand::thread_rng().gen_range(RAND_MIN..RAND_MAX);
        Duration::from_secs_f64((self.interval as f64 + jitter).max(0.0))
    }

    fn seconds(&self) -> u16 {
        self.started.elapsed().as_secs().min(u64::from(u16::MAX)) as u16
    }

    fn owner(&self) -> u64 {
        u64::from(self.interface.index)
    }
}

fn default_hostname() -> Option<String> {
    hostname::get().ok().and_then(|name| name.into_string().ok())
}

/// Checks a parsed message for the option with `tag`.
fn has_option(message: &Message, tag: u8) -> bool {
    use dhcp_protocol::v4::OptionTag::*;

    let options = &message.options;
    match OptionTag::from(tag) {
        SubnetMask => options.subnet_mask.is_some(),
        TimeOffset => options.time_offset.is_some(),
        Routers => options.routers.is_some(),
        DomainNameServers => options.domain_name_servers.is_some(),
        Hostname => options.hostname.is_some(),
        DomainName => options.domain_name.is_some(),
        MtuInterface => options.mtu_interface.is_some(),
        BroadcastAddress => options.broadcast_address.is_some(),
        StaticRoutes => options.static_routes.is_some(),
        NtpServers => options.ntp_servers.is_some(),
        VendorSpecific => options.vendor_specific.is_some(),
        AddressRequest => options.address_request.is_some(),
        AddressTime => options.address_time.is_some(),
        Overload => options.overload.is_some(),
        DhcpMessageType => options.dhcp_message_type.is_some(),
        DhcpServerId => options.dhcp_server_id.is_some(),
        ParameterList => options.parameter_list.is_some(),
        DhcpMessage => options.dhcp_message.is_some(),
        DhcpMaxMessageSize => options.dhcp_max_message_size.is_some(),
        RenewalTime => options.renewal_time.is_some(),
        RebindingTime => options.rebinding_time.is_some(),
        ClassId => options.class_id.is_some(),
        ClientId => options.client_id.is_some(),
        AutoConfigure => options.auto_configure.is_some(),
        ClasslessStaticRoutes => options.classless_static_routes.is_some(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use dhcp_protocol::v4::{
        constants::{SIZE_HEADER_IP, SIZE_HEADER_UDP},
        HardwareType, Options,
    };

    use dhcp_eloop::EventLoop;
    use dhcp_platform::fake::{FakeConfigurator, FakeLeaseStore, FakeNetwork};
    use dhcp_platform::LeaseStore;

    use crate::arp::Arp;

    fn interface() -> Interface {
        Interface {
            name: "test0".to_owned(),
            index: 1,
            hardware_address: MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            arp_probe: false,
            ipv4ll: false,
            ..ClientConfig::default()
        }
    }

    fn server() -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 1)
    }

    fn address() -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 40)
    }

    struct Harness {
        eloop: EventLoop<Event>,
        network: FakeNetwork,
        store: FakeLeaseStore,
        configurator: FakeConfigurator,
        arp: Arp,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                eloop: EventLoop::new(),
                network: FakeNetwork::new(),
                store: FakeLeaseStore::new(),
                configurator: FakeConfigurator::new(),
                arp: Arp::new(interface()),
            }
        }

        fn open(&mut self, config: ClientConfig) -> Dhcp4 {
            Dhcp4::open(&mut self.eloop, &mut self.network, interface(), config).unwrap()
        }

        fn deliver(&mut self, payload: &[u8]) {
            self.network
                .deliver_udp4("test0", SocketAddrV4::new(server(), PORT_SERVER), payload)
                .unwrap();
        }

        /// The message inside the last raw frame broadcast so far.
        fn last_broadcast(&mut self) -> Message {
            let sent = self.network.sent_link("test0", ETHERTYPE_IP).unwrap();
            let (destination, payload) = sent.last().expect("nothing was broadcast");
            assert_eq!(*destination, MacAddress::broadcast());
            Message::from_bytes(&payload[SIZE_HEADER_IP + SIZE_HEADER_UDP..]).unwrap()
        }
    }

    /// Borrows the harness parts as one environment for a single call.
    macro_rules! env(
        ($harness:expr) => (
            &mut Env {
                eloop: &mut $harness.eloop,
                sockets: &mut $harness.network,
                store: &mut $harness.store,
                configurator: &mut $harness.configurator,
                arp: &mut $harness.arp,
            }
        )
    );

    fn reply(
        xid: u32,
        message_type: MessageType,
        address: Ipv4Addr,
        lease_time: Option<u32>,
    ) -> Vec<u8> {
        let mut options = Options::default();
        options.dhcp_message_type = Some(message_type);
        options.dhcp_server_id = Some(server());
        options.address_time = lease_time;
        if message_type != MessageType::DhcpNak {
            options.subnet_mask = Some(Ipv4Addr::new(255, 255, 255, 0));
        }
        let message = Message {
            operation_code: OperationCode::BootReply,
            hardware_type: HardwareType::Ethernet,
            hardware_address_length: 6,
            hardware_options: 0,
            transaction_id: xid,
            seconds: 0,
            is_broadcast: false,
            client_ip_address: Ipv4Addr::UNSPECIFIED,
            your_ip_address: address,
            server_ip_address: Ipv4Addr::UNSPECIFIED,
            gateway_ip_address: Ipv4Addr::UNSPECIFIED,
            client_hardware_address: interface().hardware_address,
            server_name: Vec::new(),
            boot_filename: Vec::new(),
            options,
        };
        let mut buffer = [0u8; SIZE_MESSAGE_MINIMAL];
        let amount = message.to_bytes(&mut buffer).unwrap();
        buffer[..amount].to_vec()
    }

    /// Drives a fresh engine to the `Bound` state.
    fn bind(harness: &mut Harness, engine: &mut Dhcp4) {
        engine.start(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        let offer = reply(engine.xid, MessageType::DhcpOffer, address(), Some(1000));
        harness.deliver(&offer);
        engine.handle_socket(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        let ack = reply(engine.xid, MessageType::DhcpAck, address(), Some(1000));
        harness.deliver(&ack);
        engine.handle_socket(env!(harness));
        assert_eq!(engine.state, State::Bound);
    }

    #[test]
    fn discovery_backs_off_exponentially() {
        let mut harness = Harness::new();
        let mut engine = harness.open(config());

        engine.start(env!(harness));
        assert_eq!(engine.state, State::Discover);

        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        let discover = harness.last_broadcast();
        assert_eq!(discover.validate().unwrap(), MessageType::DhcpDiscover);
        assert!(discover.is_broadcast);
        let left = harness.eloop.timeout_left(Event::Dhcp4Send, 1).unwrap();
        assert!(left > Duration::from_secs(2) && left < Duration::from_secs(5));

        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        let left = harness.eloop.timeout_left(Event::Dhcp4Send, 1).unwrap();
        assert!(left > Duration::from_secs(6) && left < Duration::from_secs(9));

        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        let left = harness.eloop.timeout_left(Event::Dhcp4Send, 1).unwrap();
        assert!(left > Duration::from_secs(14) && left < Duration::from_secs(17));
    }

    #[test]
    fn an_offer_is_requested_with_the_same_transaction() {
        let mut harness = Harness::new();
        let mut engine = harness.open(config());

        engine.start(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        let xid = engine.xid;

        harness.deliver(&reply(xid, MessageType::DhcpOffer, address(), Some(1000)));
        engine.handle_socket(env!(harness));
        assert_eq!(engine.state, State::Request);

        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        let request = harness.last_broadcast();
        assert_eq!(request.validate().unwrap(), MessageType::DhcpRequest);
        assert_eq!(request.transaction_id, xid);
        assert_eq!(request.options.address_request, Some(address()));
        assert_eq!(request.options.dhcp_server_id, Some(server()));
    }

    #[test]
    fn an_acknowledgement_binds_and_schedules_renewal() {
        let mut harness = Harness::new();
        let mut engine = harness.open(ClientConfig {
            ipv4ll: true,
            ..config()
        });

        engine.start(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpOffer,
            address(),
            Some(1000),
        ));
        engine.handle_socket(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpAck,
            address(),
            Some(1000),
        ));
        let notices = engine.handle_socket(env!(harness));

        assert_eq!(engine.state, State::Bound);
        assert_eq!(notices, vec![Notice::LinkLocalStop]);
        let bound = harness.configurator.bound_v4("test0").unwrap();
        assert_eq!(bound.address, address());
        assert_eq!(bound.prefix_length, 24);
        assert!(harness
            .store
            .read("test0", Family::Ipv4)
            .unwrap()
            .is_some());

        let renew = harness.eloop.timeout_left(Event::Dhcp4Renew, 1).unwrap();
        assert!(renew > Duration::from_secs(499) && renew <= Duration::from_secs(500));
        let rebind = harness.eloop.timeout_left(Event::Dhcp4Rebind, 1).unwrap();
        assert!(rebind > Duration::from_secs(874) && rebind <= Duration::from_secs(875));
        let expire = harness.eloop.timeout_left(Event::Dhcp4Expire, 1).unwrap();
        assert!(expire > Duration::from_secs(999) && expire <= Duration::from_secs(1000));
    }

    #[test]
    fn a_probe_guards_the_acknowledged_address() {
        let mut harness = Harness::new();
        let mut engine = harness.open(ClientConfig {
            arp_probe: true,
            ipv4ll: false,
            ..ClientConfig::default()
        });

        engine.start(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpOffer,
            address(),
            Some(1000),
        ));
        engine.handle_socket(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpAck,
            address(),
            Some(1000),
        ));
        engine.handle_socket(env!(harness));

        assert_eq!(engine.state, State::Request);
        assert!(engine.pending.is_some());
        assert!(harness.arp.socket_fd().is_some());
        assert_eq!(harness.eloop.timeout_left(Event::Dhcp4Send, 1), None);
        assert_eq!(harness.configurator.bound_v4("test0"), None);

        engine.on_claim(env!(harness), ClaimEvent::Probed(address()));
        assert_eq!(engine.state, State::Bound);
        assert!(harness.configurator.bound_v4("test0").is_some());
    }

    #[test]
    fn a_probe_conflict_is_declined() {
        let mut harness = Harness::new();
        let mut engine = harness.open(ClientConfig {
            arp_probe: true,
            ipv4ll: false,
            ..ClientConfig::default()
        });

        engine.start(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpOffer,
            address(),
            Some(1000),
        ));
        engine.handle_socket(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpAck,
            address(),
            Some(1000),
        ));
        engine.handle_socket(env!(harness));

        let notices = engine.on_claim(
            env!(harness),
            ClaimEvent::Conflict {
                address: address(),
                reporter: None,
            },
        );
        assert_eq!(notices, vec![Notice::Conflict { address: address() }]);
        assert_eq!(engine.state, State::Decline);

        let decline = harness.last_broadcast();
        assert_eq!(decline.validate().unwrap(), MessageType::DhcpDecline);
        assert_eq!(decline.options.address_request, Some(address()));
        assert!(harness.store.read("test0", Family::Ipv4).unwrap().is_none());

        let left = harness.eloop.timeout_left(Event::Dhcp4Send, 1).unwrap();
        assert!(left <= Duration::from_secs(1));
    }

    #[test]
    fn a_nak_backs_off_independently() {
        let mut harness = Harness::new();
        let mut engine = harness.open(config());

        engine.start(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpOffer,
            address(),
            Some(1000),
        ));
        engine.handle_socket(env!(harness));
        harness.deliver(&reply(engine.xid, MessageType::DhcpNak, address(), None));
        engine.handle_socket(env!(harness));

        assert_eq!(engine.state, State::Init);
        assert_eq!(engine.nak_interval, 1);

        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        assert_eq!(engine.state, State::Discover);
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpOffer,
            address(),
            Some(1000),
        ));
        engine.handle_socket(env!(harness));
        harness.deliver(&reply(engine.xid, MessageType::DhcpNak, address(), None));
        engine.handle_socket(env!(harness));

        assert_eq!(engine.nak_interval, 2);
        let left = harness.eloop.timeout_left(Event::Dhcp4Send, 1).unwrap();
        assert!(left > Duration::from_secs(1) && left <= Duration::from_secs(2));
    }

    #[test]
    fn renewal_goes_unicast_then_rebinding_broadcasts() {
        let mut harness = Harness::new();
        let mut engine = harness.open(config());
        bind(&mut harness, &mut engine);
        harness.network.sent_link("test0", ETHERTYPE_IP).unwrap();

        engine.handle_timer(env!(harness), Event::Dhcp4Renew);
        assert_eq!(engine.state, State::Renew);
        engine.handle_timer(env!(harness), Event::Dhcp4Send);

        let sent = harness.network.sent_udp4("test0").unwrap();
        assert_eq!(sent.len(), 1);
        let (destination, payload) = &sent[0];
        assert_eq!(*destination, SocketAddrV4::new(server(), PORT_SERVER));
        let renew = Message::from_bytes(payload).unwrap();
        assert_eq!(renew.validate().unwrap(), MessageType::DhcpRequest);
        assert_eq!(renew.client_ip_address, address());
        assert!(!renew.is_broadcast);
        assert!(harness
            .network
            .sent_link("test0", ETHERTYPE_IP)
            .unwrap()
            .is_empty());

        engine.handle_timer(env!(harness), Event::Dhcp4Rebind);
        assert_eq!(engine.state, State::Rebind);
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        let rebind = harness.last_broadcast();
        assert_eq!(rebind.validate().unwrap(), MessageType::DhcpRequest);
        assert_eq!(rebind.client_ip_address, address());
    }

    #[test]
    fn expiry_discards_everything_and_restarts() {
        let mut harness = Harness::new();
        let mut engine = harness.open(config());
        bind(&mut harness, &mut engine);

        engine.handle_timer(env!(harness), Event::Dhcp4Expire);

        assert_eq!(engine.state, State::Discover);
        assert_eq!(harness.configurator.bound_v4("test0"), None);
        assert!(harness.store.read("test0", Family::Ipv4).unwrap().is_none());
        assert_eq!(harness.eloop.pending_timers(), 1);
        assert!(harness.eloop.timeout_left(Event::Dhcp4Send, 1).is_some());
    }

    #[test]
    fn a_stored_lease_is_reclaimed_on_start() {
        let mut harness = Harness::new();
        let stored = reply(0x0a0b0c0d, MessageType::DhcpAck, address(), Some(1000));
        harness.store.write("test0", Family::Ipv4, &stored).unwrap();
        let mut engine = harness.open(config());

        engine.start(env!(harness));
        assert_eq!(engine.state, State::Reboot);

        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        let request = harness.last_broadcast();
        assert_eq!(request.validate().unwrap(), MessageType::DhcpRequest);
        assert_eq!(request.options.address_request, Some(address()));
        assert_eq!(request.options.dhcp_server_id, None);

        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpAck,
            address(),
            Some(1000),
        ));
        engine.handle_socket(env!(harness));
        assert_eq!(engine.state, State::Bound);
    }

    #[test]
    fn a_stale_stored_lease_is_ignored() {
        use std::time::SystemTime;

        let mut harness = Harness::new();
        let stored = reply(0x0a0b0c0d, MessageType::DhcpAck, address(), Some(1000));
        harness.store.seed(
            "test0",
            Family::Ipv4,
            &stored,
            SystemTime::now() - Duration::from_secs(2000),
        );
        let mut engine = harness.open(config());

        engine.start(env!(harness));
        assert_eq!(engine.state, State::Discover);
        assert!(harness.store.read("test0", Family::Ipv4).unwrap().is_none());
    }

    #[test]
    fn inform_mode_requests_options_only() {
        let mut harness = Harness::new();
        let mut engine = harness.open(ClientConfig {
            inform_address: Some(address()),
            ..config()
        });

        engine.start(env!(harness));
        assert_eq!(engine.state, State::Inform);

        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        let inform = harness.last_broadcast();
        assert_eq!(inform.validate().unwrap(), MessageType::DhcpInform);
        assert_eq!(inform.client_ip_address, address());

        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpAck,
            Ipv4Addr::UNSPECIFIED,
            None,
        ));
        engine.handle_socket(env!(harness));

        assert_eq!(harness.eloop.pending_timers(), 0);
        assert_eq!(harness.configurator.bound_v4("test0"), None);
    }

    #[test]
    fn discover_timeouts_raise_the_link_local_notice() {
        let mut harness = Harness::new();
        let mut engine = harness.open(ClientConfig {
            ipv4ll: true,
            ..config()
        });

        engine.start(env!(harness));
        let first = engine.handle_timer(env!(harness), Event::Dhcp4Send);
        assert!(first.is_empty());
        let second = engine.handle_timer(env!(harness), Event::Dhcp4Send);
        assert_eq!(second, vec![Notice::LinkLocalStart]);
    }

    #[test]
    fn an_offer_without_an_address_starts_link_local() {
        let mut harness = Harness::new();
        let mut engine = harness.open(ClientConfig {
            ipv4ll: true,
            ..config()
        });

        engine.start(env!(harness));
        engine.handle_timer(env!(harness), Event::Dhcp4Send);
        harness.deliver(&reply(
            engine.xid,
            MessageType::DhcpOffer,
            Ipv4Addr::UNSPECIFIED,
            Some(1000),
        ));
        let notices = engine.handle_socket(env!(harness));

        assert_eq!(notices, vec![Notice::LinkLocalStart]);
        assert_eq!(engine.state, State::Discover);
    }

    #[test]
    fn stopping_with_release_notifies_the_server() {
        let mut harness = Harness::new();
        let mut engine = harness.open(config());
        bind(&mut harness, &mut engine);

        engine.stop(env!(harness), true);

        assert_eq!(engine.state, State::Release);
        let sent = harness.network.sent_udp4("test0").unwrap();
        let (destination, payload) = sent.last().expect("no release was sent");
        assert_eq!(*destination, SocketAddrV4::new(server(), PORT_SERVER));
        let release = Message::from_bytes(payload).unwrap();
        assert_eq!(release.validate().unwrap(), MessageType::DhcpRelease);
        assert!(harness.store.read("test0", Family::Ipv4).unwrap().is_none());
        assert_eq!(harness.configurator.bound_v4("test0"), None);
        assert_eq!(harness.eloop.pending_timers(), 0);
    }
}
