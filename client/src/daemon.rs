//! The daemon wiring the engines to the reactor and the platform.
//!
//! One `Slot` holds the engines of one interface. Timer wakes carry the
//! interface index as the owner and readable wakes carry the descriptor,
//! so dispatch is a lookup followed by a method call on the right
//! engine. Engines never talk to each other directly. The DHCPv4 engine
//! returns notices which the daemon routes to the link local engine and
//! to the embedder's conflict callback, and the claim engine returns
//! outcomes which the daemon routes back to the claim's originator.

use std::{
    io,
    net::IpAddr,
    os::unix::io::RawFd,
};

use dhcp_eloop::{EventLoop, Wake};
use dhcp_platform::{Configurator, Family, Interface, LeaseStore, SocketFactory, UdpSocket6};
use dhcp_protocol::v6::constants::PORT_CLIENT;

use crate::arp::{Arp, ClaimEvent, Originator};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::event::{Event, QUEUE_DHCP6};
use crate::ipv4ll::Ipv4ll;
use crate::v4::{Dhcp4, Notice};
use crate::v6::Dhcp6;

/// A duplicate address report to the embedder.
type ConflictHook = Box<dyn FnMut(&str, IpAddr)>;

/// The borrowed collaborators an engine call runs against.
///
/// Engines take the environment instead of owning the platform handles,
/// so one socket factory, lease store and configurator serve every
/// interface, and tests substitute fakes without touching the engines.
pub struct Env<'a> {
    pub eloop: &'a mut EventLoop<Event>,
    pub sockets: &'a mut dyn SocketFactory,
    pub store: &'a mut dyn LeaseStore,
    pub configurator: &'a mut dyn Configurator,
    pub arp: &'a mut Arp,
}

/// The engines of one managed interface.
struct Slot {
    interface: Interface,
    arp: Arp,
    v4: Option<Dhcp4>,
    ipv4ll: Option<Ipv4ll>,
    v6: Option<Dhcp6>,
}

/// The client daemon.
///
/// The embedder owns the reactor and calls [`Daemon::dispatch`] from
/// its run callback, so it can multiplex its own descriptors and wake
/// tokens next to the daemon's.
pub struct Daemon {
    config: ClientConfig,
    sockets: Box<dyn SocketFactory>,
    store: Box<dyn LeaseStore>,
    configurator: Box<dyn Configurator>,
    slots: Vec<Slot>,
    /// The one client socket shared by every DHCPv6 engine.
    udp6: Option<Box<dyn UdpSocket6>>,
    on_conflict: Option<ConflictHook>,
}

impl Daemon {
    /// Creates a daemon over the given platform collaborators.
    ///
    /// # Errors
    /// `Error::Config` if the configuration contradicts itself.
    pub fn new(
        config: ClientConfig,
        sockets: Box<dyn SocketFactory>,
        store: Box<dyn LeaseStore>,
        configurator: Box<dyn Configurator>,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            sockets,
            store,
            configurator,
            slots: Vec::new(),
            udp6: None,
            on_conflict: None,
        })
    }

    /// Installs a callback invoked when a bound address turns out to be
    /// a duplicate, after the engines have already withdrawn it.
    pub fn on_conflict<F>(&mut self, callback: F)
    where
        F: FnMut(&str, IpAddr) + 'static,
    {
        self.on_conflict = Some(Box::new(callback));
    }

    /// Starts the engine of one family on an interface.
    ///
    /// The first family on an interface brings the link up and creates
    /// the slot. Starting a family that is already running does nothing.
    ///
    /// # Errors
    /// `Error::Resource` if a socket cannot be opened or registered.
    pub fn start(
        &mut self,
        eloop: &mut EventLoop<Event>,
        interface: Interface,
        family: Family,
    ) -> Result<(), Error> {
        let position = match self
            .slots
            .iter()
            .position(|slot| slot.interface.index == interface.index)
        {
            Some(position) => position,
            None => {
                if let Err(error) = self.configurator.link_up(&interface.name) {
                    warn!("{}: unable to bring the link up: {}", interface.name, error);
                }
                self.slots.push(Slot {
                    arp: Arp::new(interface.clone()),
                    ipv4ll: if self.config.ipv4ll {
                        Some(Ipv4ll::new(interface.clone()))
                    } else {
                        None
                    },
                    interface: interface.clone(),
                    v4: None,
                    v6: None,
                });
                self.slots.len() - 1
            }
        };
        info!("{}: starting DHCP{}", interface.name, family);
        match family {
            Family::Ipv4 => {
                if self.slots[position].v4.is_some() {
                    debug!("{}: the DHCPv4 engine is already running", interface.name);
                    return Ok(());
                }
                let engine = Dhcp4::open(
                    eloop,
                    self.sockets.as_mut(),
                    interface.clone(),
                    self.config.clone(),
                )
                .map_err(Error::Resource)?;
                self.slots[position].v4 = Some(engine);
                let Slot {
                    interface,
                    arp,
                    v4,
                    ipv4ll,
                    ..
                } = &mut self.slots[position];
                let mut env = Env {
                    eloop,
                    sockets: self.sockets.as_mut(),
                    store: self.store.as_mut(),
                    configurator: self.configurator.as_mut(),
                    arp,
                };
                let notices = match v4.as_mut() {
                    Some(engine) => engine.start(&mut env),
                    None => Vec::new(),
                };
                settle_notices(&mut env, ipv4ll, interface, &mut self.on_conflict, notices);
            }
            Family::Ipv6 => {
                if self.slots[position].v6.is_some() {
                    debug!("{}: the DHCPv6 engine is already running", interface.name);
                    return Ok(());
                }
                if self.udp6.is_none() {
                    let socket = self
                        .sockets
                        .udp6(&interface, PORT_CLIENT)
                        .map_err(Error::Resource)?;
                    eloop
                        .register_io(socket.as_raw_fd(), Some(Event::Dhcp6Socket), None)
                        .map_err(|error| {
                            Error::Resource(io::Error::new(io::ErrorKind::InvalidInput, error))
                        })?;
                    self.udp6 = Some(socket);
                }
                self.slots[position].v6 = Some(Dhcp6::new(interface, self.config.clone()));
                let Slot { arp, v6, .. } = &mut self.slots[position];
                let mut env = Env {
                    eloop,
                    sockets: self.sockets.as_mut(),
                    store: self.store.as_mut(),
                    configurator: self.configurator.as_mut(),
                    arp,
                };
                if let Some(engine) = v6.as_mut() {
                    engine.start(&mut env);
                }
            }
        }
        Ok(())
    }

    /// Stops every engine on an interface and forgets it.
    ///
    /// With `release_on_stop` set, the lease engines notify their
    /// servers on the way out.
    pub fn stop(&mut self, eloop: &mut EventLoop<Event>, name: &str) {
        let position = match self.slots.iter().position(|slot| slot.interface.name == name) {
            Some(position) => position,
            None => return,
        };
        let release = self.config.release_on_stop;
        {
            let Slot {
                arp, v4, ipv4ll, v6, ..
            } = &mut self.slots[position];
            let mut env = Env {
                eloop: &mut *eloop,
                sockets: self.sockets.as_mut(),
                store: self.store.as_mut(),
                configurator: self.configurator.as_mut(),
                arp,
            };
            if let Some(engine) = v4.as_mut() {
                engine.stop(&mut env, release);
            }
            if let Some(engine) = ipv4ll.as_mut() {
                engine.stop(&mut env);
            }
            if let Some(engine) = v6.as_mut() {
                engine.stop(&mut env, release);
                if release {
                    // The release exchange would need further ticks, but
                    // the slot is going away. One transmission goes out.
                    if let Some(socket) = self.udp6.as_mut() {
                        engine.handle_timer(&mut env, socket.as_mut(), Event::Dhcp6Send);
                    }
                }
            }
        }
        let slot = self.slots.remove(position);
        if let Some(engine) = slot.v4.as_ref() {
            eloop.unregister_io(engine.socket_fd(), false);
        }
        eloop.cancel(QUEUE_DHCP6, None, u64::from(slot.interface.index));
        info!("{}: stopped", slot.interface.name);
    }

    /// Drops the lease of one family without notifying the server and
    /// reacquires from scratch.
    pub fn drop_lease(&mut self, eloop: &mut EventLoop<Event>, name: &str, family: Family) {
        let position = match self.slots.iter().position(|slot| slot.interface.name == name) {
            Some(position) => position,
            None => return,
        };
        let Slot {
            interface,
            arp,
            v4,
            ipv4ll,
            v6,
        } = &mut self.slots[position];
        let mut env = Env {
            eloop,
            sockets: self.sockets.as_mut(),
            store: self.store.as_mut(),
            configurator: self.configurator.as_mut(),
            arp,
        };
        match family {
            Family::Ipv4 => {
                if let Some(engine) = v4.as_mut() {
                    let notices = engine.drop_lease(&mut env);
                    settle_notices(&mut env, ipv4ll, interface, &mut self.on_conflict, notices);
                }
            }
            Family::Ipv6 => {
                if let Some(engine) = v6.as_mut() {
                    engine.drop_lease(&mut env);
                }
            }
        }
    }

    /// The persisted form of the bound lease of one family, if any.
    pub fn current_lease(&self, name: &str, family: Family) -> Option<Vec<u8>> {
        let slot = self.slots.iter().find(|slot| slot.interface.name == name)?;
        match family {
            Family::Ipv4 => slot.v4.as_ref().and_then(Dhcp4::lease_raw).map(<[u8]>::to_vec),
            Family::Ipv6 => slot.v6.as_ref().and_then(Dhcp6::lease_raw).map(<[u8]>::to_vec),
        }
    }

    /// Feeds a duplicate address detected outside the engines, like the
    /// kernel's own detection, into the owning engine.
    pub fn report_conflict(&mut self, eloop: &mut EventLoop<Event>, name: &str, address: IpAddr) {
        let position = match self.slots.iter().position(|slot| slot.interface.name == name) {
            Some(position) => position,
            None => return,
        };
        let Slot {
            interface,
            arp,
            v4,
            ipv4ll,
            v6,
        } = &mut self.slots[position];
        let mut env = Env {
            eloop,
            sockets: self.sockets.as_mut(),
            store: self.store.as_mut(),
            configurator: self.configurator.as_mut(),
            arp,
        };
        match address {
            IpAddr::V4(address) => {
                let outcomes = env.arp.external_conflict(env.eloop, address);
                route_claims(&mut env, v4, ipv4ll, interface, &mut self.on_conflict, outcomes);
            }
            IpAddr::V6(address) => {
                if let Some(engine) = v6.as_mut() {
                    engine.address_failed(&mut env, address);
                }
            }
        }
    }

    /// Routes one reactor wake to the engine it belongs to.
    pub fn dispatch(&mut self, eloop: &mut EventLoop<Event>, wake: Wake<Event>) {
        match wake {
            Wake::Timer { event, owner } => self.dispatch_timer(eloop, event, owner),
            Wake::Readable { fd, event } => self.dispatch_readable(eloop, fd, event),
            Wake::Writable { .. } => {}
        }
    }

    fn dispatch_timer(&mut self, eloop: &mut EventLoop<Event>, event: Event, owner: u64) {
        let position = match self
            .slots
            .iter()
            .position(|slot| u64::from(slot.interface.index) == owner)
        {
            Some(position) => position,
            None => return,
        };
        let Slot {
            interface,
            arp,
            v4,
            ipv4ll,
            v6,
        } = &mut self.slots[position];
        let mut env = Env {
            eloop,
            sockets: self.sockets.as_mut(),
            store: self.store.as_mut(),
            configurator: self.configurator.as_mut(),
            arp,
        };
        match event {
            Event::Dhcp4Send | Event::Dhcp4Renew | Event::Dhcp4Rebind | Event::Dhcp4Expire => {
                if let Some(engine) = v4.as_mut() {
                    let notices = engine.handle_timer(&mut env, event);
                    settle_notices(&mut env, ipv4ll, interface, &mut self.on_conflict, notices);
                }
            }
            Event::Dhcp6Send
            | Event::Dhcp6Deadline
            | Event::Dhcp6Renew
            | Event::Dhcp6Rebind
            | Event::Dhcp6Expire => {
                if let (Some(engine), Some(socket)) = (v6.as_mut(), self.udp6.as_mut()) {
                    engine.handle_timer(&mut env, socket.as_mut(), event);
                }
            }
            Event::ArpDhcpTick | Event::ArpLlTick => {
                let outcome = env.arp.handle_tick(env.eloop, event);
                if let Some(outcome) = outcome {
                    route_claims(
                        &mut env,
                        v4,
                        ipv4ll,
                        interface,
                        &mut self.on_conflict,
                        vec![outcome],
                    );
                }
            }
            Event::LlTick => {
                if let Some(engine) = ipv4ll.as_mut() {
                    engine.handle_tick(&mut env);
                }
            }
            _ => {}
        }
    }

    fn dispatch_readable(&mut self, eloop: &mut EventLoop<Event>, fd: RawFd, event: Event) {
        match event {
            Event::Dhcp4Socket => {
                let position = match self.slots.iter().position(|slot| {
                    slot.v4.as_ref().map(|engine| engine.socket_fd()) == Some(fd)
                }) {
                    Some(position) => position,
                    None => return,
                };
                let Slot {
                    interface,
                    arp,
                    v4,
                    ipv4ll,
                    ..
                } = &mut self.slots[position];
                let mut env = Env {
                    eloop,
                    sockets: self.sockets.as_mut(),
                    store: self.store.as_mut(),
                    configurator: self.configurator.as_mut(),
                    arp,
                };
                if let Some(engine) = v4.as_mut() {
                    let notices = engine.handle_socket(&mut env);
                    settle_notices(&mut env, ipv4ll, interface, &mut self.on_conflict, notices);
                }
            }
            Event::ArpSocket => {
                let position = match self
                    .slots
                    .iter()
                    .position(|slot| slot.arp.socket_fd() == Some(fd))
                {
                    Some(position) => position,
                    None => return,
                };
                let Slot {
                    interface,
                    arp,
                    v4,
                    ipv4ll,
                    ..
                } = &mut self.slots[position];
                let mut env = Env {
                    eloop,
                    sockets: self.sockets.as_mut(),
                    store: self.store.as_mut(),
                    configurator: self.configurator.as_mut(),
                    arp,
                };
                let outcomes = env.arp.handle_socket(env.eloop);
                route_claims(&mut env, v4, ipv4ll, interface, &mut self.on_conflict, outcomes);
            }
            Event::Dhcp6Socket => {
                let mut datagrams: Vec<(u32, Vec<u8>)> = Vec::new();
                if let Some(socket) = self.udp6.as_mut() {
                    let mut buffer = [0u8; 2048];
                    loop {
                        match socket.recv_from(&mut buffer) {
                            Ok(Some((amount, _, arrival))) => {
                                datagrams.push((arrival, buffer[..amount].to_vec()))
                            }
                            Ok(None) => break,
                            Err(error) => {
                                warn!("unable to receive a DHCPv6 datagram: {}", error);
                                break;
                            }
                        }
                    }
                }
                for (arrival, data) in datagrams {
                    let position = match self
                        .slots
                        .iter()
                        .position(|slot| slot.interface.index == arrival)
                    {
                        Some(position) => position,
                        None => {
                            debug!("a DHCPv6 datagram arrived on unmanaged interface {}", arrival);
                            continue;
                        }
                    };
                    let Slot { arp, v6, .. } = &mut self.slots[position];
                    let mut env = Env {
                        eloop: &mut *eloop,
                        sockets: self.sockets.as_mut(),
                        store: self.store.as_mut(),
                        configurator: self.configurator.as_mut(),
                        arp,
                    };
                    if let Some(engine) = v6.as_mut() {
                        engine.handle_datagram(&mut env, &data);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Routes claim outcomes back to the engine that ordered the claim.
fn route_claims(
    env: &mut Env,
    v4: &mut Option<Dhcp4>,
    ipv4ll: &mut Option<Ipv4ll>,
    interface: &Interface,
    on_conflict: &mut Option<ConflictHook>,
    outcomes: Vec<(Originator, ClaimEvent)>,
) {
    for (originator, outcome) in outcomes {
        match originator {
            Originator::Dhcp => {
                let notices = match v4.as_mut() {
                    Some(engine) => engine.on_claim(env, outcome),
                    None => Vec::new(),
                };
                settle_notices(env, ipv4ll, interface, on_conflict, notices);
            }
            Originator::LinkLocal => {
                let lost = match ipv4ll.as_mut() {
                    Some(engine) => engine.on_claim(env, outcome),
                    None => None,
                };
                if let Some(address) = lost {
                    report(on_conflict, &interface.name, IpAddr::V4(address));
                }
            }
        }
    }
}

/// Applies the notices a DHCPv4 engine call returned.
fn settle_notices(
    env: &mut Env,
    ipv4ll: &mut Option<Ipv4ll>,
    interface: &Interface,
    on_conflict: &mut Option<ConflictHook>,
    notices: Vec<Notice>,
) {
    for notice in notices {
        match notice {
            Notice::LinkLocalStart => {
                if let Some(engine) = ipv4ll.as_mut() {
                    engine.start(env.eloop);
                }
            }
            Notice::LinkLocalStop => {
                if let Some(engine) = ipv4ll.as_mut() {
                    engine.stop(env);
                }
            }
            Notice::Conflict { address } => {
                report(on_conflict, &interface.name, IpAddr::V4(address));
            }
        }
    }
}

fn report(on_conflict: &mut Option<ConflictHook>, name: &str, address: IpAddr) {
    if let Some(callback) = on_conflict.as_mut() {
        callback(name, address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{cell::RefCell, net::SocketAddrV4, net::SocketAddrV6, rc::Rc};

    use eui48::MacAddress;

    use dhcp_platform::fake::{FakeConfigurator, FakeLeaseStore, FakeNetwork};
    use dhcp_protocol::v4::{
        constants::{
            PORT_SERVER as PORT_SERVER4, SIZE_HEADER_IP, SIZE_HEADER_UDP, SIZE_MESSAGE_MINIMAL,
        },
        HardwareType, Message as Message4, MessageType as MessageType4,
        OperationCode, Options as Options4,
    };
    use dhcp_protocol::v6::{
        constants::PORT_SERVER as PORT_SERVER6, IaAddress, IaNa, Message as Message6,
        MessageType as MessageType6, Options as Options6,
    };

    const ETHERTYPE_IP: u16 = 0x0800;

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

    struct Fixture {
        eloop: EventLoop<Event>,
        network: FakeNetwork,
        store: FakeLeaseStore,
        configurator: FakeConfigurator,
        daemon: Daemon,
    }

    impl Fixture {
        fn new(config: ClientConfig) -> Self {
            let network = FakeNetwork::new();
            let store = FakeLeaseStore::new();
            let configurator = FakeConfigurator::new();
            let daemon = Daemon::new(
                config,
                Box::new(network.clone()),
                Box::new(store.clone()),
                Box::new(configurator.clone()),
            )
            .unwrap();
            Self {
                eloop: EventLoop::new(),
                network,
                store,
                configurator,
                daemon,
            }
        }
    }

    fn boot_reply(xid: u32, message_type: MessageType4) -> Vec<u8> {
        let mut options = Options4::default();
        options.dhcp_message_type = Some(message_type);
        options.dhcp_server_id = Some("192.168.1.1".parse().unwrap());
        options.address_time = Some(1000);
        options.subnet_mask = Some("255.255.255.0".parse().unwrap());
        let message = Message4 {
            operation_code: OperationCode::BootReply,
            hardware_type: HardwareType::Ethernet,
            hardware_address_length: 6,
            hardware_options: 0,
            transaction_id: xid,
            seconds: 0,
            is_broadcast: false,
            client_ip_address: "0.0.0.0".parse().unwrap(),
            your_ip_address: "192.168.1.40".parse().unwrap(),
            server_ip_address: "0.0.0.0".parse().unwrap(),
            gateway_ip_address: "0.0.0.0".parse().unwrap(),
            client_hardware_address: interface().hardware_address,
            server_name: Vec::new(),
            boot_filename: Vec::new(),
            options,
        };
        let mut buffer = [0u8; SIZE_MESSAGE_MINIMAL];
        let amount = message.to_bytes(&mut buffer).unwrap();
        buffer[..amount].to_vec()
    }

    fn answer6(to: &Message6, message_type: MessageType6) -> Vec<u8> {
        let mut options = Options6::default();
        options.client_id = to.options.client_id.clone();
        options.server_id = Some(vec![0x00, 0x01, 0x00, 0x01, 0x09, 0x09, 0x09, 0x09]);
        options.ia_na = vec![IaNa {
            iaid: to.options.ia_na.first().map(|ia| ia.iaid).unwrap_or(1),
            t1: 300,
            t2: 500,
            addresses: vec![IaAddress {
                address: "2001:db8::10".parse().unwrap(),
                preferred_lifetime: 600,
                valid_lifetime: 1000,
                status: None,
            }],
            status: None,
        }];
        let message = Message6 {
            message_type,
            transaction_id: to.transaction_id,
            options,
        };
        let mut buffer = [0u8; 2048];
        let amount = message.to_bytes(&mut buffer).unwrap();
        buffer[..amount].to_vec()
    }

    /// Runs the reactor, playing a DHCPv6 server, until the interface
    /// binds or too many wakes have passed.
    fn serve6(fixture: &mut Fixture) -> i32 {
        let network = fixture.network.clone();
        let daemon = &mut fixture.daemon;
        let mut wakes = 0;
        fixture
            .eloop
            .run(|eloop, wake| {
                daemon.dispatch(eloop, wake);
                wakes += 1;
                if wakes > 50 {
                    eloop.exit(1);
                    return;
                }
                for (_, payload) in network.sent_udp6("test0").unwrap() {
                    let message = Message6::from_bytes(&payload).unwrap();
                    let reply = match message.message_type {
                        MessageType6::Solicit => answer6(&message, MessageType6::Advertise),
                        MessageType6::Request => answer6(&message, MessageType6::Reply),
                        _ => continue,
                    };
                    network
                        .deliver_udp6(
                            "test0",
                            SocketAddrV6::new("fe80::1".parse().unwrap(), PORT_SERVER6, 0, 1),
                            1,
                            &reply,
                        )
                        .unwrap();
                }
                if daemon.current_lease("test0", Family::Ipv6).is_some() {
                    eloop.exit(0);
                }
            })
            .unwrap()
    }

    #[test]
    fn a_discovery_cycle_binds_through_the_reactor() {
        let mut fixture = Fixture::new(config());
        fixture
            .daemon
            .start(&mut fixture.eloop, interface(), Family::Ipv4)
            .unwrap();

        let network = fixture.network.clone();
        let daemon = &mut fixture.daemon;
        let mut wakes = 0;
        let code = fixture
            .eloop
            .run(|eloop, wake| {
                daemon.dispatch(eloop, wake);
                wakes += 1;
                if wakes > 50 {
                    eloop.exit(1);
                    return;
                }
                for (_, frame) in network.sent_link("test0", ETHERTYPE_IP).unwrap() {
                    let message =
                        Message4::from_bytes(&frame[SIZE_HEADER_IP + SIZE_HEADER_UDP..]).unwrap();
                    let reply = match message.options.dhcp_message_type {
                        Some(MessageType4::DhcpDiscover) => {
                            boot_reply(message.transaction_id, MessageType4::DhcpOffer)
                        }
                        Some(MessageType4::DhcpRequest) => {
                            boot_reply(message.transaction_id, MessageType4::DhcpAck)
                        }
                        _ => continue,
                    };
                    network
                        .deliver_udp4(
                            "test0",
                            SocketAddrV4::new("192.168.1.1".parse().unwrap(), PORT_SERVER4),
                            &reply,
                        )
                        .unwrap();
                }
                if daemon.current_lease("test0", Family::Ipv4).is_some() {
                    eloop.exit(0);
                }
            })
            .unwrap();
        assert_eq!(code, 0);

        let bound = fixture.configurator.bound_v4("test0").unwrap();
        assert_eq!(bound.address, "192.168.1.40".parse::<std::net::Ipv4Addr>().unwrap());
        assert_eq!(bound.prefix_length, 24);
        assert!(fixture.store.read("test0", Family::Ipv4).unwrap().is_some());

        fixture.daemon.stop(&mut fixture.eloop, "test0");
        assert!(fixture.configurator.bound_v4("test0").is_none());
        assert!(fixture
            .daemon
            .current_lease("test0", Family::Ipv4)
            .is_none());
        assert_eq!(fixture.eloop.pending_timers(), 0);
    }

    #[test]
    fn a_solicit_cycle_binds_through_the_reactor() {
        let mut fixture = Fixture::new(config());
        fixture
            .daemon
            .start(&mut fixture.eloop, interface(), Family::Ipv6)
            .unwrap();

        let code = serve6(&mut fixture);
        assert_eq!(code, 0);

        let bound = fixture.configurator.bound_v6("test0");
        assert_eq!(bound.len(), 1);
        assert_eq!(
            bound[0].address,
            "2001:db8::10".parse::<std::net::Ipv6Addr>().unwrap()
        );
        assert!(fixture.store.read("test0", Family::Ipv6).unwrap().is_some());
    }

    #[test]
    fn a_reported_duplicate_is_routed_to_the_engine() {
        let mut fixture = Fixture::new(config());
        fixture
            .daemon
            .start(&mut fixture.eloop, interface(), Family::Ipv6)
            .unwrap();
        assert_eq!(serve6(&mut fixture), 0);
        fixture.network.sent_udp6("test0").unwrap();

        let duplicate: std::net::Ipv6Addr = "2001:db8::10".parse().unwrap();
        fixture
            .daemon
            .report_conflict(&mut fixture.eloop, "test0", IpAddr::V6(duplicate));

        assert!(fixture.configurator.bound_v6("test0").is_empty());
        assert!(fixture.store.read("test0", Family::Ipv6).unwrap().is_none());

        fixture.daemon.dispatch(
            &mut fixture.eloop,
            Wake::Timer {
                event: Event::Dhcp6Send,
                owner: 1,
            },
        );
        let sent = fixture.network.sent_udp6("test0").unwrap();
        let message = Message6::from_bytes(&sent[0].1).unwrap();
        assert_eq!(message.message_type, MessageType6::Decline);
        assert_eq!(message.options.ia_na[0].addresses[0].address, duplicate);
    }

    #[test]
    fn a_conflict_notice_reaches_the_callback() {
        let mut eloop = EventLoop::<Event>::new();
        let mut network = FakeNetwork::new();
        let mut store = FakeLeaseStore::new();
        let mut configurator = FakeConfigurator::new();
        let mut arp = Arp::new(interface());
        let hits: Rc<RefCell<Vec<(String, IpAddr)>>> = Rc::new(RefCell::new(Vec::new()));
        let mut on_conflict: Option<ConflictHook> = Some(Box::new({
            let hits = hits.clone();
            move |name: &str, address| hits.borrow_mut().push((name.to_owned(), address))
        }));

        let mut env = Env {
            eloop: &mut eloop,
            sockets: &mut network,
            store: &mut store,
            configurator: &mut configurator,
            arp: &mut arp,
        };
        let address = "192.168.1.40".parse().unwrap();
        settle_notices(
            &mut env,
            &mut None,
            &interface(),
            &mut on_conflict,
            vec![Notice::Conflict { address }],
        );

        assert_eq!(
            hits.borrow().as_slice(),
            &[("test0".to_owned(), IpAddr::V4(address))]
        );
    }
}
