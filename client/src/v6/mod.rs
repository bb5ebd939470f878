//! The DHCPv6 lease engine of one interface.
//!
//! One exchange is in flight at a time. Entering an exchange schedules
//! a send tick, optionally delayed by the initial random wait, and the
//! tick both transmits and schedules the next retransmission, so the
//! RFC 3315 timing rules live in a single place. The engine never owns
//! a socket. All interfaces share one client socket and the daemon
//! routes datagrams here by their arrival interface.

pub mod builder;
pub mod lease;

use std::{
    net::{Ipv6Addr, SocketAddrV6},
    time::{Duration, Instant},
};

use rand::Rng;

use dhcp_eloop::EventLoop;
use dhcp_platform::{Binding6, Family, Interface, UdpSocket6};
use dhcp_protocol::v6::{
    constants::{ALL_DHCP_RELAY_AGENTS_AND_SERVERS, ELAPSED_TIME_MAXIMAL, PORT_SERVER, XID_MASK},
    Duid, IaAddress, IaNa, Message, MessageType, Options, StatusCode,
};

use crate::config::ClientConfig;
use crate::daemon::Env;
use crate::event::{Event, QUEUE_DHCP6};

use self::builder::MessageBuilder;
use self::lease::{BoundPrefix, Lease6, TIME_INFINITE};

/// The default SOL_MAX_RT and INF_MAX_RT, in seconds.
const MAX_RT_DEFAULT: u32 = 120;

/// The range a server supplied MAX_RT override must fall into.
const MAX_RT_MINIMAL: u32 = 60;
const MAX_RT_MAXIMAL: u32 = 86400;

/// Seconds a Confirm is retransmitted before the lease is assumed valid.
const CONFIRM_DEADLINE: u64 = 10;

/// The RFC 4242 bounds of the information refresh interval, in seconds.
const INFORMATION_REFRESH_DEFAULT: u32 = 86400;
const INFORMATION_REFRESH_MINIMAL: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    /// Soliciting advertisements.
    Solicit,
    Request,
    /// Asking whether the stored lease is still on link.
    Confirm,
    Renew,
    Rebind,
    Decline,
    Release,
    /// Asking for configuration without addresses.
    Inform,
    Bound,
    /// Configured through an information exchange only.
    Informed,
}

/// The retransmission context of the exchange in flight.
struct Exchange {
    kind: MessageType,
    xid: u32,
    /// The first transmission, base of the ELAPSED_TIME option.
    first: Option<Instant>,
    /// The current retransmission timeout in seconds. Zero before the
    /// first transmission.
    rt: f64,
    sent: u32,
    irt: f64,
    mrt: f64,
    mrc: u32,
}

/// The DHCPv6 engine of one interface.
pub struct Dhcp6 {
    interface: Interface,
    config: ClientConfig,
    builder: MessageBuilder,
    duid: Duid,
    state: State,
    exchange: Option<Exchange>,
    /// The server selected from the advertisements.
    selected: Option<Vec<u8>>,
    /// The advertised bindings echoed while requesting.
    offered: Option<Lease6>,
    lease: Option<Lease6>,
    /// The bindings echoed while releasing.
    parting: Option<Lease6>,
    /// Duplicate addresses queued for the Decline in flight.
    declining: Vec<(u32, Ipv6Addr)>,
    decline_server: Option<Vec<u8>>,
    /// MAX_RT overrides adopted from the server.
    sol_max_rt: Option<u32>,
    inf_max_rt: Option<u32>,
}

impl Dhcp6 {
    pub fn new(interface: Interface, config: ClientConfig) -> Self {
        let duid = Duid::link_layer(interface.hardware_address);
        let ia_na = if config.ia_na.is_empty() && !config.information_only {
            vec![default_iaid(&interface)]
        } else {
            config.ia_na.clone()
        };
        let builder = MessageBuilder::new(&duid, ia_na, config.ia_pd.clone());
        Self {
            interface,
            config,
            builder,
            duid,
            state: State::Init,
            exchange: None,
            selected: None,
            offered: None,
            lease: None,
            parting: None,
            declining: Vec::new(),
            decline_server: None,
            sol_max_rt: None,
            inf_max_rt: None,
        }
    }

    /// The persisted form of the bound lease, if any.
    pub fn lease_raw(&self) -> Option<&[u8]> {
        self.lease.as_ref().map(|lease| lease.raw.as_slice())
    }

    /// Begins operation, confirming or rebinding a persisted lease
    /// when one is still alive.
    pub fn start(&mut self, env: &mut Env) {
        if self.config.information_only {
            info!("{}: requesting configuration only", self.interface.name);
            self.state = State::Inform;
            self.begin_exchange(env.eloop, MessageType::InformationRequest);
            return;
        }
        match self.revive(env) {
            Some(lease) => {
                // RFC 3633 12.1: a lease holding delegations cannot be
                // confirmed, rebinding covers both.
                let confirm = lease.prefixes.is_empty();
                self.lease = Some(lease);
                if confirm {
                    info!("{}: confirming the stored lease", self.interface.name);
                    self.state = State::Confirm;
                    self.begin_exchange(env.eloop, MessageType::Confirm);
                    env.eloop.schedule(
                        Duration::from_secs(CONFIRM_DEADLINE),
                        QUEUE_DHCP6,
                        Event::Dhcp6Deadline,
                        self.owner(),
                    );
                } else {
                    info!("{}: rebinding the stored delegation", self.interface.name);
                    self.state = State::Rebind;
                    self.begin_exchange(env.eloop, MessageType::Rebind);
                }
            }
            None => self.begin_solicit(env.eloop),
        }
    }

    /// Stops the engine, optionally releasing the lease to the server.
    pub fn stop(&mut self, env: &mut Env, release: bool) {
        env.eloop.cancel(QUEUE_DHCP6, None, self.owner());
        if release && self.lease.is_some() {
            info!("{}: releasing the lease", self.interface.name);
            self.parting = self.lease.clone();
            self.teardown(env);
            let _ = env.store.remove(&self.interface.name, Family::Ipv6);
            self.state = State::Release;
            self.begin_exchange(env.eloop, MessageType::Release);
        } else {
            self.teardown(env);
            self.exchange = None;
            self.state = State::Release;
        }
    }

    /// Drops the lease without telling the server and starts over.
    pub fn drop_lease(&mut self, env: &mut Env) {
        self.teardown(env);
        let _ = env.store.remove(&self.interface.name, Family::Ipv6);
        self.begin_solicit(env.eloop);
    }

    /// Routes one of the engine's timers.
    pub fn handle_timer(&mut self, env: &mut Env, socket: &mut dyn UdpSocket6, event: Event) {
        match event {
            Event::Dhcp6Send => self.handle_send(env, socket),
            Event::Dhcp6Deadline => self.handle_deadline(env),
            Event::Dhcp6Renew => self.handle_renew_timer(env.eloop),
            Event::Dhcp6Rebind => self.handle_rebind_timer(env.eloop),
            Event::Dhcp6Expire => self.expire(env),
            _ => {}
        }
    }

    /// Handles one datagram delivered to this interface.
    pub fn handle_datagram(&mut self, env: &mut Env, data: &[u8]) {
        let message = match Message::from_bytes(data) {
            Ok(message) => message,
            Err(error) => {
                debug!(
                    "{}: dropping a malformed message: {}",
                    self.interface.name, error
                );
                return;
            }
        };
        let message_type = match message.validate() {
            Ok(message_type) => message_type,
            Err(error) => {
                debug!(
                    "{}: dropping an invalid message: {}",
                    self.interface.name, error
                );
                return;
            }
        };
        let (kind, xid) = match self.exchange {
            Some(ref exchange) => (exchange.kind, exchange.xid),
            None => {
                debug!("{}: ignoring an unsolicited {}", self.interface.name, message_type);
                return;
            }
        };
        if message.transaction_id != xid {
            debug!(
                "{}: dropping a reply to transaction {:#08x}",
                self.interface.name, message.transaction_id
            );
            return;
        }
        if message.options.client_id.as_deref() != Some(self.duid.as_bytes()) {
            debug!("{}: dropping a message for another client", self.interface.name);
            return;
        }
        match message_type {
            MessageType::Advertise if kind == MessageType::Solicit => {
                self.handle_advertise(env, &message)
            }
            MessageType::Reply if kind != MessageType::Solicit => {
                self.handle_reply(env, kind, &message, data)
            }
            _ => debug!(
                "{}: ignoring a {} during a {}",
                self.interface.name, message_type, kind
            ),
        }
    }

    /// Withdraws a bound address another node proved a duplicate and
    /// declines it at the server.
    pub fn address_failed(&mut self, env: &mut Env, address: Ipv6Addr) {
        let failed = match self.lease {
            Some(ref lease) => match lease
                .addresses
                .iter()
                .find(|bound| bound.address == address)
            {
                Some(bound) => (bound.iaid, bound.address),
                None => {
                    debug!(
                        "{}: {} is not part of the lease",
                        self.interface.name, address
                    );
                    return;
                }
            },
            None => return,
        };
        warn!(
            "{}: {} is already in use, declining it",
            self.interface.name, address
        );
        if let Some(ref mut lease) = self.lease {
            lease.addresses.retain(|bound| bound.address != address);
        }
        let binding = Binding6 {
            address,
            prefix_length: 128,
            preferred_lifetime: 0,
            valid_lifetime: 0,
        };
        if let Err(error) = env.configurator.remove_v6(&self.interface.name, &binding) {
            warn!(
                "{}: unable to remove {}: {}",
                self.interface.name, address, error
            );
        }
        let _ = env.store.remove(&self.interface.name, Family::Ipv6);
        self.decline_server = self.lease.as_ref().map(|lease| lease.server_id.clone());
        self.declining.push(failed);
        env.eloop.cancel(QUEUE_DHCP6, None, self.owner());
        self.state = State::Decline;
        self.begin_exchange(env.eloop, MessageType::Decline);
    }

    fn handle_send(&mut self, env: &mut Env, socket: &mut dyn UdpSocket6) {
        let (kind, sent, exhausted) = match self.exchange {
            Some(ref exchange) => (
                exchange.kind,
                exchange.sent,
                exchange.mrc != 0 && exchange.sent >= exchange.mrc,
            ),
            None => return,
        };
        if exhausted {
            warn!(
                "{}: {} sent {} times with no reply",
                self.interface.name, kind, sent
            );
            self.exhausted(env, kind);
            return;
        }
        self.transmit(socket);
        let delay = self.next_rt();
        env.eloop
            .schedule(delay, QUEUE_DHCP6, Event::Dhcp6Send, self.owner());
    }

    fn exhausted(&mut self, env: &mut Env, kind: MessageType) {
        match kind {
            MessageType::Request | MessageType::Decline => {
                self.declining.clear();
                self.decline_server = None;
                self.begin_solicit(env.eloop);
            }
            MessageType::Release => self.finish_release(env.eloop),
            _ => {}
        }
    }

    fn handle_advertise(&mut self, env: &mut Env, message: &Message) {
        self.adopt_max_rt(&message.options);
        if let Some(ref status) = message.options.status {
            if status.code != StatusCode::Success {
                info!(
                    "{}: an advertisement was declined: {:?} {}",
                    self.interface.name, status.code, status.message
                );
                return;
            }
        }
        let offered = match Lease6::admit(&self.interface.name, message, Vec::new()) {
            Some(offered) => offered,
            None => {
                info!(
                    "{}: an advertisement carried nothing usable",
                    self.interface.name
                );
                return;
            }
        };
        info!(
            "{}: selecting the server {}",
            self.interface.name,
            Duid::from(offered.server_id.clone())
        );
        self.selected = Some(offered.server_id.clone());
        self.offered = Some(offered);
        self.state = State::Request;
        self.begin_exchange(env.eloop, MessageType::Request);
    }

    fn handle_reply(&mut self, env: &mut Env, kind: MessageType, message: &Message, raw: &[u8]) {
        self.adopt_max_rt(&message.options);

        let expected = match kind {
            MessageType::Request => self.selected.clone(),
            MessageType::Renew => self.lease.as_ref().map(|lease| lease.server_id.clone()),
            MessageType::Release | MessageType::Decline => self
                .parting
                .as_ref()
                .map(|lease| lease.server_id.clone())
                .or_else(|| self.decline_server.clone()),
            _ => None,
        };
        if let Some(expected) = expected {
            if message.options.server_id.as_deref() != Some(expected.as_slice()) {
                debug!(
                    "{}: ignoring a reply from another server",
                    self.interface.name
                );
                return;
            }
        }

        let status_code = message.options.status.as_ref().map(|status| status.code);
        if let Some(ref status) = message.options.status {
            if status.code != StatusCode::Success {
                warn!(
                    "{}: the server answered: {:?} {}",
                    self.interface.name, status.code, status.message
                );
            }
        }

        if kind == MessageType::Release {
            info!("{}: released", self.interface.name);
            self.finish_release(env.eloop);
            return;
        }
        if kind == MessageType::Decline {
            info!("{}: declined, starting over", self.interface.name);
            self.declining.clear();
            self.decline_server = None;
            self.begin_solicit(env.eloop);
            return;
        }

        match status_code {
            Some(StatusCode::Success) | None => {}
            Some(StatusCode::NoBinding) => {
                if kind == MessageType::Renew || kind == MessageType::Rebind {
                    info!(
                        "{}: the server reports no binding, requesting afresh",
                        self.interface.name
                    );
                    self.state = State::Request;
                    self.selected = self.lease.as_ref().map(|lease| lease.server_id.clone());
                    self.begin_exchange(env.eloop, MessageType::Request);
                } else {
                    self.abandon(env);
                }
                return;
            }
            Some(StatusCode::NotOnLink) => {
                warn!(
                    "{}: the bindings are not valid on this link",
                    self.interface.name
                );
                self.abandon(env);
                return;
            }
            Some(_) => {
                if kind == MessageType::Request || kind == MessageType::Confirm {
                    self.abandon(env);
                }
                return;
            }
        }

        if kind == MessageType::Confirm {
            info!("{}: the lease was confirmed on link", self.interface.name);
            env.eloop.cancel(QUEUE_DHCP6, None, self.owner());
            self.exchange = None;
            match self.lease.take() {
                Some(lease) => self.settle(env, lease),
                None => self.begin_solicit(env.eloop),
            }
            return;
        }
        if kind == MessageType::InformationRequest {
            self.finish_inform(env, message);
            return;
        }
        self.commit(env, message, raw.to_vec());
    }

    /// Persists and applies a granting reply, scheduling its renewal
    /// cycle.
    fn commit(&mut self, env: &mut Env, message: &Message, raw: Vec<u8>) {
        if let Err(error) = env.store.write(&self.interface.name, Family::Ipv6, &raw) {
            warn!(
                "{}: unable to persist the lease: {}",
                self.interface.name, error
            );
        }
        let lease = match Lease6::admit(&self.interface.name, message, raw) {
            Some(lease) => lease,
            None => {
                let _ = env.store.remove(&self.interface.name, Family::Ipv6);
                self.begin_solicit(env.eloop);
                return;
            }
        };
        self.settle(env, lease);
    }

    /// Applies a lease to the system and schedules its timers.
    fn settle(&mut self, env: &mut Env, lease: Lease6) {
        let owner = self.owner();
        if let Some(old) = self.lease.take() {
            self.withdraw_missing(env, &old, &lease);
        }
        for address in lease.addresses.iter() {
            let binding = Binding6 {
                address: address.address,
                prefix_length: 128,
                preferred_lifetime: address.preferred_lifetime,
                valid_lifetime: address.valid_lifetime,
            };
            if let Err(error) = env.configurator.apply_v6(&self.interface.name, &binding) {
                warn!(
                    "{}: unable to configure {}: {}",
                    self.interface.name, address.address, error
                );
            }
        }
        for prefix in lease.prefixes.iter() {
            for (child, binding) in self.delegations(prefix) {
                match env.configurator.apply_v6(&child, &binding) {
                    Ok(()) => info!(
                        "{}: delegated {}/{} to {}",
                        self.interface.name, binding.address, binding.prefix_length, child
                    ),
                    Err(error) => warn!(
                        "{}: unable to delegate to {}: {}",
                        self.interface.name, child, error
                    ),
                }
            }
        }
        env.eloop.cancel(QUEUE_DHCP6, None, owner);
        let shortest = lease.shortest_valid();
        if lease.t1 != 0 {
            env.eloop.schedule(
                Duration::from_secs(u64::from(lease.t1)),
                QUEUE_DHCP6,
                Event::Dhcp6Renew,
                owner,
            );
        }
        if lease.t2 != 0 {
            env.eloop.schedule(
                Duration::from_secs(u64::from(lease.t2)),
                QUEUE_DHCP6,
                Event::Dhcp6Rebind,
                owner,
            );
        }
        if shortest != TIME_INFINITE {
            env.eloop.schedule(
                Duration::from_secs(u64::from(shortest)),
                QUEUE_DHCP6,
                Event::Dhcp6Expire,
                owner,
            );
        }
        info!(
            "{}: holding {} addresses and {} prefixes, renewing in {} seconds",
            self.interface.name,
            lease.addresses.len(),
            lease.prefixes.len(),
            lease.t1
        );
        self.lease = Some(lease);
        self.state = State::Bound;
        self.exchange = None;
        self.offered = None;
    }

    fn finish_inform(&mut self, env: &mut Env, message: &Message) {
        if let Some(ref servers) = message.options.dns_servers {
            info!("{}: name servers {:?}", self.interface.name, servers);
        }
        if let Some(ref domains) = message.options.domain_list {
            info!("{}: search domains {:?}", self.interface.name, domains);
        }
        let refresh = message
            .options
            .information_refresh_time
            .unwrap_or(INFORMATION_REFRESH_DEFAULT)
            .max(INFORMATION_REFRESH_MINIMAL);
        env.eloop.cancel(QUEUE_DHCP6, None, self.owner());
        self.exchange = None;
        self.state = State::Informed;
        env.eloop.schedule(
            Duration::from_secs(u64::from(refresh)),
            QUEUE_DHCP6,
            Event::Dhcp6Renew,
            self.owner(),
        );
        info!(
            "{}: configuration refreshes in {} seconds",
            self.interface.name, refresh
        );
    }

    fn finish_release(&mut self, eloop: &mut EventLoop<Event>) {
        eloop.cancel(QUEUE_DHCP6, None, self.owner());
        self.exchange = None;
        self.parting = None;
    }

    fn handle_deadline(&mut self, env: &mut Env) {
        if self.state != State::Confirm {
            return;
        }
        info!(
            "{}: no answer to the confirmation, keeping the lease",
            self.interface.name
        );
        env.eloop.cancel(QUEUE_DHCP6, None, self.owner());
        self.exchange = None;
        match self.lease.take() {
            Some(lease) => self.settle(env, lease),
            None => self.begin_solicit(env.eloop),
        }
    }

    fn handle_renew_timer(&mut self, eloop: &mut EventLoop<Event>) {
        match self.state {
            State::Bound => {
                info!("{}: renewing", self.interface.name);
                self.state = State::Renew;
                self.begin_exchange(eloop, MessageType::Renew);
            }
            State::Informed => {
                self.state = State::Inform;
                self.begin_exchange(eloop, MessageType::InformationRequest);
            }
            _ => {}
        }
    }

    fn handle_rebind_timer(&mut self, eloop: &mut EventLoop<Event>) {
        if self.state != State::Bound && self.state != State::Renew {
            return;
        }
        info!("{}: rebinding to any server", self.interface.name);
        self.state = State::Rebind;
        self.begin_exchange(eloop, MessageType::Rebind);
    }

    fn expire(&mut self, env: &mut Env) {
        warn!("{}: the lease has expired", self.interface.name);
        self.teardown(env);
        let _ = env.store.remove(&self.interface.name, Family::Ipv6);
        self.begin_solicit(env.eloop);
    }

    /// Drops everything and returns to soliciting.
    fn abandon(&mut self, env: &mut Env) {
        self.teardown(env);
        let _ = env.store.remove(&self.interface.name, Family::Ipv6);
        self.begin_solicit(env.eloop);
    }

    /// Removes every applied binding of the current lease.
    fn teardown(&mut self, env: &mut Env) {
        if let Some(lease) = self.lease.take() {
            for address in lease.addresses.iter() {
                let binding = Binding6 {
                    address: address.address,
                    prefix_length: 128,
                    preferred_lifetime: 0,
                    valid_lifetime: 0,
                };
                if let Err(error) = env.configurator.remove_v6(&self.interface.name, &binding) {
                    warn!(
                        "{}: unable to remove {}: {}",
                        self.interface.name, address.address, error
                    );
                }
            }
            for prefix in lease.prefixes.iter() {
                self.withdraw_delegation(env, prefix);
            }
        }
    }

    /// Withdraws bindings of `old` that `new` no longer grants.
    fn withdraw_missing(&self, env: &mut Env, old: &Lease6, new: &Lease6) {
        for address in old.addresses.iter() {
            if new.addresses.iter().any(|kept| kept.address == address.address) {
                continue;
            }
            info!(
                "{}: the server withdrew {}",
                self.interface.name, address.address
            );
            let binding = Binding6 {
                address: address.address,
                prefix_length: 128,
                preferred_lifetime: 0,
                valid_lifetime: 0,
            };
            if let Err(error) = env.configurator.remove_v6(&self.interface.name, &binding) {
                warn!(
                    "{}: unable to remove {}: {}",
                    self.interface.name, address.address, error
                );
            }
        }
        for prefix in old.prefixes.iter() {
            let kept = new.prefixes.iter().any(|kept| {
                kept.prefix == prefix.prefix && kept.prefix_length == prefix.prefix_length
            });
            if kept {
                continue;
            }
            info!(
                "{}: the server withdrew {}/{}",
                self.interface.name, prefix.prefix, prefix.prefix_length
            );
            self.withdraw_delegation(env, prefix);
        }
    }

    fn withdraw_delegation(&self, env: &mut Env, prefix: &BoundPrefix) {
        for (child, binding) in self.delegations(prefix) {
            if let Err(error) = env.configurator.remove_v6(&child, &binding) {
                warn!(
                    "{}: unable to remove {} from {}: {}",
                    self.interface.name, binding.address, child, error
                );
            }
        }
    }

    /// The child bindings a delegated prefix expands to, following the
    /// sub delegation table of its association.
    fn delegations(&self, prefix: &BoundPrefix) -> Vec<(String, Binding6)> {
        let mut bindings = Vec::new();
        let request = match self
            .config
            .ia_pd
            .iter()
            .find(|request| request.iaid == prefix.iaid)
        {
            Some(request) => request,
            None => return bindings,
        };
        for sla in request.sla.iter() {
            let child = match carve(prefix, sla.index, sla.length) {
                Some(child) => child,
                None => {
                    warn!(
                        "{}: slice {} does not fit into {}/{}",
                        self.interface.name, sla.index, prefix.prefix, prefix.prefix_length
                    );
                    continue;
                }
            };
            if let Some(ref excluded) = prefix.exclude {
                if sla.length == excluded.prefix_length && child == excluded.prefix {
                    warn!(
                        "{}: slice {}/{} is withheld by the delegating router",
                        self.interface.name, child, sla.length
                    );
                    continue;
                }
            }
            bindings.push((
                sla.interface.clone(),
                Binding6 {
                    address: host_one(child),
                    prefix_length: sla.length,
                    preferred_lifetime: prefix.preferred_lifetime,
                    valid_lifetime: prefix.valid_lifetime,
                },
            ));
        }
        bindings
    }

    /// Reads the persisted lease back if it still has lifetime left.
    fn revive(&mut self, env: &mut Env) -> Option<Lease6> {
        let stored = match env.store.read(&self.interface.name, Family::Ipv6) {
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
        let written = stored.written;
        let message = match Message::from_bytes(&stored.data) {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    "{}: dropping an unreadable lease: {}",
                    self.interface.name, error
                );
                let _ = env.store.remove(&self.interface.name, Family::Ipv6);
                return None;
            }
        };
        if message.options.client_id.as_deref() != Some(self.duid.as_bytes()) {
            debug!(
                "{}: the stored lease belongs to another client",
                self.interface.name
            );
            return None;
        }
        let lease = Lease6::admit(&self.interface.name, &message, stored.data)?;
        let shortest = lease.shortest_valid();
        if shortest != TIME_INFINITE {
            let age = written.elapsed().unwrap_or_default().as_secs();
            if age >= u64::from(shortest) {
                info!("{}: the stored lease has expired", self.interface.name);
                let _ = env.store.remove(&self.interface.name, Family::Ipv6);
                return None;
            }
        }
        Some(lease)
    }

    fn begin_solicit(&mut self, eloop: &mut EventLoop<Event>) {
        eloop.cancel(QUEUE_DHCP6, None, self.owner());
        self.state = State::Solicit;
        self.selected = None;
        self.offered = None;
        self.parting = None;
        self.declining.clear();
        self.decline_server = None;
        info!("{}: soliciting", self.interface.name);
        self.begin_exchange(eloop, MessageType::Solicit);
    }

    /// Opens a fresh exchange and schedules its first transmission,
    /// delayed by the initial random wait where the RFC requires one.
    fn begin_exchange(&mut self, eloop: &mut EventLoop<Event>, kind: MessageType) {
        let (imd, irt, mrt, mrc) = self.timing(kind);
        let xid = rand::thread_rng().gen::<u32>() & XID_MASK;
        self.exchange = Some(Exchange {
            kind,
            xid,
            first: None,
            rt: 0.0,
            sent: 0,
            irt,
            mrt,
            mrc,
        });
        eloop.cancel(QUEUE_DHCP6, Some(Event::Dhcp6Send), self.owner());
        let delay = if imd > 0.0 {
            Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..imd))
        } else {
            Duration::ZERO
        };
        eloop.schedule(delay, QUEUE_DHCP6, Event::Dhcp6Send, self.owner());
    }

    /// The RFC 3315 timing parameters of an exchange. IMD, IRT and MRT
    /// in seconds, MRC as a count, zero meaning unlimited.
    fn timing(&self, kind: MessageType) -> (f64, f64, f64, u32) {
        match kind {
            MessageType::Solicit => (
                1.0,
                1.0,
                f64::from(self.sol_max_rt.unwrap_or(MAX_RT_DEFAULT)),
                0,
            ),
            MessageType::Request => (0.0, 1.0, 30.0, 10),
            MessageType::Confirm => (1.0, 1.0, 4.0, 0),
            MessageType::Renew => (0.0, 10.0, 600.0, 0),
            MessageType::Rebind => (0.0, 10.0, 600.0, 0),
            MessageType::Release => (0.0, 1.0, 0.0, 5),
            MessageType::Decline => (0.0, 1.0, 0.0, 5),
            MessageType::InformationRequest => (
                1.0,
                1.0,
                f64::from(self.inf_max_rt.unwrap_or(MAX_RT_DEFAULT)),
                0,
            ),
            _ => (0.0, 1.0, 120.0, 0),
        }
    }

    /// Doubles the retransmission timeout, randomized by a tenth and
    /// bounded by MRT.
    fn next_rt(&mut self) -> Duration {
        let exchange = match self.exchange {
            Some(ref mut exchange) => exchange,
            None => return Duration::ZERO,
        };
        let factor = rand::thread_rng().gen_range(-0.1..0.1);
        let mut rt = if exchange.rt == 0.0 {
            exchange.irt * (1.0 + factor)
        } else {
            exchange.rt * (2.0 + factor)
        };
        if exchange.mrt != 0.0 && rt > exchange.mrt {
            rt = exchange.mrt * (1.0 + factor);
        }
        exchange.rt = rt;
        Duration::from_secs_f64(rt.max(0.0))
    }

    fn transmit(&mut self, socket: &mut dyn UdpSocket6) {
        let (kind, xid, elapsed) = match self.exchange {
            Some(ref mut exchange) => {
                let elapsed = match exchange.first {
                    Some(first) => centiseconds(first.elapsed()),
                    None => {
                        exchange.first = Some(Instant::now());
                        0
                    }
                };
                exchange.sent += 1;
                (exchange.kind, exchange.xid, elapsed)
            }
            None => return,
        };
        let message = match self.compose(kind, xid, elapsed) {
            Some(message) => message,
            None => {
                error!(
                    "{}: nothing to compose a {} from",
                    self.interface.name, kind
                );
                return;
            }
        };
        let mut buffer = [0u8; 2048];
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
        let destination = SocketAddrV6::new(
            ALL_DHCP_RELAY_AGENTS_AND_SERVERS,
            PORT_SERVER,
            0,
            self.interface.index,
        );
        if let Err(error) = socket.send_to(destination, &buffer[..amount]) {
            warn!(
                "{}: unable to send a {}: {}",
                self.interface.name, kind, error
            );
        }
    }

    fn compose(&self, kind: MessageType, xid: u32, elapsed: u16) -> Option<Message> {
        match kind {
            MessageType::Solicit => Some(self.builder.solicit(xid, elapsed)),
            MessageType::Request => {
                let server = self.selected.as_ref()?;
                let template = self.offered.as_ref().or(self.lease.as_ref())?;
                Some(self.builder.to_server(
                    kind,
                    xid,
                    elapsed,
                    server,
                    template.to_ia_na(),
                    template.to_ia_pd(),
                ))
            }
            MessageType::Renew => {
                let lease = self.lease.as_ref()?;
                Some(self.builder.to_server(
                    kind,
                    xid,
                    elapsed,
                    &lease.server_id,
                    lease.to_ia_na(),
                    lease.to_ia_pd(),
                ))
            }
            MessageType::Rebind => {
                let lease = self.lease.as_ref()?;
                Some(self.builder.rebind(xid, elapsed, lease.to_ia_na(), lease.to_ia_pd()))
            }
            MessageType::Confirm => {
                let lease = self.lease.as_ref()?;
                Some(self.builder.confirm(xid, elapsed, lease.to_ia_na()))
            }
            MessageType::Release => {
                let lease = self.parting.as_ref()?;
                Some(self.builder.to_server(
                    kind,
                    xid,
                    elapsed,
                    &lease.server_id,
                    lease.to_ia_na(),
                    lease.to_ia_pd(),
                ))
            }
            MessageType::Decline => {
                let server = self.decline_server.as_ref()?;
                Some(self.builder.to_server(
                    kind,
                    xid,
                    elapsed,
                    server,
                    declined(&self.declining),
                    Vec::new(),
                ))
            }
            MessageType::InformationRequest => Some(self.builder.information_request(xid, elapsed)),
            _ => None,
        }
    }

    /// Adopts the RFC 7083 retransmission overrides when they fall
    /// into the allowed range.
    fn adopt_max_rt(&mut self, options: &Options) {
        if let Some(value) = options.sol_max_rt {
            if (MAX_RT_MINIMAL..=MAX_RT_MAXIMAL).contains(&value) {
                self.sol_max_rt = Some(value);
            }
        }
        if let Some(value) = options.inf_max_rt {
            if (MAX_RT_MINIMAL..=MAX_RT_MAXIMAL).contains(&value) {
                self.inf_max_rt = Some(value);
            }
        }
    }

    fn owner(&self) -> u64 {
        u64::from(self.interface.index)
    }
}

/// An IAID derived from the low four octets of the hardware address.
fn default_iaid(interface: &Interface) -> u32 {
    let octets = interface.hardware_address.as_bytes();
    u32::from_be_bytes([octets[2], octets[3], octets[4], octets[5]])
}

fn centiseconds(elapsed: Duration) -> u16 {
    (elapsed.as_millis() / 10).min(u128::from(ELAPSED_TIME_MAXIMAL)) as u16
}

/// Regroups the queued duplicates into associations for a Decline.
fn declined(addresses: &[(u32, Ipv6Addr)]) -> Vec<IaNa> {
    let mut associations: Vec<IaNa> = Vec::new();
    for &(iaid, address) in addresses.iter() {
        let grant = IaAddress {
            address,
            preferred_lifetime: 0,
            valid_lifetime: 0,
            status: None,
        };
        match associations.iter_mut().find(|ia| ia.iaid == iaid) {
            Some(ia) => ia.addresses.push(grant),
            None => associations.push(IaNa {
                iaid,
                t1: 0,
                t2: 0,
                addresses: vec![grant],
                status: None,
            }),
        }
    }
    associations
}

/// Writes `index` into the bits between the delegated length and the
/// slice length, returning `None` when it does not fit.
fn carve(prefix: &BoundPrefix, index: u32, length: u8) -> Option<Ipv6Addr> {
    if length < prefix.prefix_length || length > 128 {
        return None;
    }
    let room = u32::from(length - prefix.prefix_length);
    if room < 32 && u64::from(index) >= (1u64 << room) {
        return None;
    }
    let base = u128::from(prefix.prefix);
    let slot = u128::from(index) << (128 - u32::from(length));
    Some(Ipv6Addr::from(base | slot))
}

/// The conventional router address inside a sub delegated prefix.
fn host_one(prefix: Ipv6Addr) -> Ipv6Addr {
    Ipv6Addr::from(u128::from(prefix) | 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    use eui48::MacAddress;

    use dhcp_eloop::EventLoop;
    use dhcp_platform::fake::{FakeConfigurator, FakeLeaseStore, FakeNetwork};
    use dhcp_platform::{LeaseStore, SocketFactory};
    use dhcp_protocol::v6::constants::PORT_CLIENT;
    use dhcp_protocol::v6::{IaPd, IaPrefix, Status};

    use crate::arp::Arp;
    use crate::config::{PdRequest, Sla};

    fn interface() -> Interface {
        Interface {
            name: "test0".to_owned(),
            index: 1,
            hardware_address: MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
        }
    }

    fn one() -> Ipv6Addr {
        "2001:db8::10".parse().unwrap()
    }

    fn two() -> Ipv6Addr {
        "2001:db8::20".parse().unwrap()
    }

    fn server_id() -> Vec<u8> {
        vec![0x00, 0x01, 0x00, 0x01, 0xaa, 0xbb, 0xcc, 0xdd]
    }

    fn grant(address: Ipv6Addr) -> IaAddress {
        IaAddress {
            address,
            preferred_lifetime: 600,
            valid_lifetime: 1000,
            status: None,
        }
    }

    fn association(addresses: Vec<IaAddress>) -> IaNa {
        IaNa {
            iaid: 1,
            t1: 300,
            t2: 500,
            addresses,
            status: None,
        }
    }

    fn delegation(prefix: &str, length: u8) -> IaPd {
        IaPd {
            iaid: 2,
            t1: 300,
            t2: 500,
            prefixes: vec![IaPrefix {
                prefix: prefix.parse().unwrap(),
                prefix_length: length,
                preferred_lifetime: 600,
                valid_lifetime: 1000,
                exclude: None,
                status: None,
            }],
            status: None,
        }
    }

    struct Harness {
        eloop: EventLoop<Event>,
        network: FakeNetwork,
        store: FakeLeaseStore,
        configurator: FakeConfigurator,
        arp: Arp,
        socket: Box<dyn UdpSocket6>,
    }

    impl Harness {
        fn new() -> Self {
            let mut network = FakeNetwork::new();
            let socket = network.udp6(&interface(), PORT_CLIENT).unwrap();
            Self {
                eloop: EventLoop::new(),
                network,
                store: FakeLeaseStore::new(),
                configurator: FakeConfigurator::new(),
                arp: Arp::new(interface()),
                socket,
            }
        }

        /// The messages multicast so far, drained.
        fn sent(&mut self) -> Vec<Message> {
            self.network
                .sent_udp6("test0")
                .unwrap()
                .into_iter()
                .map(|(destination, payload)| {
                    assert_eq!(destination.port(), PORT_SERVER);
                    assert_eq!(*destination.ip(), ALL_DHCP_RELAY_AGENTS_AND_SERVERS);
                    Message::from_bytes(&payload).unwrap()
                })
                .collect()
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

    fn encode(message: &Message) -> Vec<u8> {
        let mut buffer = [0u8; 2048];
        let amount = message.to_bytes(&mut buffer).unwrap();
        buffer[..amount].to_vec()
    }

    /// A server message answering the exchange in flight.
    fn answer(
        engine: &Dhcp6,
        message_type: MessageType,
        ia_na: Vec<IaNa>,
        ia_pd: Vec<IaPd>,
    ) -> Message {
        let mut options = Options::default();
        options.client_id = Some(engine.duid.as_bytes().to_vec());
        options.server_id = Some(server_id());
        options.ia_na = ia_na;
        options.ia_pd = ia_pd;
        Message {
            message_type,
            transaction_id: engine.exchange.as_ref().unwrap().xid,
            options,
        }
    }

    /// Drives a fresh engine through Solicit and Request to `Bound`.
    fn bind(harness: &mut Harness, engine: &mut Dhcp6, ia_na: Vec<IaNa>, ia_pd: Vec<IaPd>) {
        engine.start(env!(harness));
        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Send);
        let advertise = answer(engine, MessageType::Advertise, ia_na.clone(), ia_pd.clone());
        engine.handle_datagram(env!(harness), &encode(&advertise));
        assert_eq!(engine.state, State::Request);
        let reply = answer(engine, MessageType::Reply, ia_na, ia_pd);
        engine.handle_datagram(env!(harness), &encode(&reply));
        assert_eq!(engine.state, State::Bound);
    }

    #[test]
    fn retransmission_doubles_with_jitter() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());

        engine.start(env!(harness));
        assert_eq!(engine.state, State::Solicit);
        let first_wait = harness.eloop.timeout_left(Event::Dhcp6Send, 1).unwrap();
        assert!(first_wait <= Duration::from_secs(1));

        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Send);
        let left = harness.eloop.timeout_left(Event::Dhcp6Send, 1).unwrap();
        assert!(left > Duration::from_secs_f64(0.85) && left < Duration::from_secs_f64(1.15));

        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Send);
        let left = harness.eloop.timeout_left(Event::Dhcp6Send, 1).unwrap();
        assert!(left > Duration::from_secs_f64(1.6) && left < Duration::from_secs_f64(2.4));

        let sent = harness.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].message_type, MessageType::Solicit);
        assert_eq!(sent[0].options.elapsed_time, Some(0));
        assert_eq!(sent[0].transaction_id, sent[1].transaction_id);
    }

    #[test]
    fn the_retransmission_cap_holds() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());
        engine.sol_max_rt = Some(60);

        engine.start(env!(harness));
        for _ in 0..8 {
            engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Send);
        }
        let left = harness.eloop.timeout_left(Event::Dhcp6Send, 1).unwrap();
        assert!(left > Duration::from_secs(53) && left < Duration::from_secs(67));
    }

    #[test]
    fn max_rt_overrides_are_adopted_in_range() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());

        engine.start(env!(harness));
        let mut advertise = answer(&engine, MessageType::Advertise, Vec::new(), Vec::new());
        advertise.options.sol_max_rt = Some(90);
        advertise.options.inf_max_rt = Some(30);
        engine.handle_datagram(env!(harness), &encode(&advertise));

        assert_eq!(engine.sol_max_rt, Some(90));
        assert_eq!(engine.inf_max_rt, None);
        // nothing usable was advertised, so the engine keeps soliciting
        assert_eq!(engine.state, State::Solicit);
    }

    #[test]
    fn an_advertisement_selects_the_server() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());

        engine.start(env!(harness));
        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Send);
        let advertise = answer(
            &engine,
            MessageType::Advertise,
            vec![association(vec![grant(one())])],
            Vec::new(),
        );
        engine.handle_datagram(env!(harness), &encode(&advertise));

        assert_eq!(engine.state, State::Request);
        assert_eq!(engine.selected, Some(server_id()));

        harness.sent();
        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Send);
        let sent = harness.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type, MessageType::Request);
        assert_eq!(sent[0].options.server_id, Some(server_id()));
        assert_eq!(sent[0].options.ia_na[0].addresses[0].address, one());
    }

    #[test]
    fn a_refusing_advertisement_is_passed_over() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());

        engine.start(env!(harness));
        let mut refusal = answer(
            &engine,
            MessageType::Advertise,
            vec![association(vec![grant(one())])],
            Vec::new(),
        );
        refusal.options.status = Some(Status {
            code: StatusCode::NoAddrsAvail,
            message: "pool empty".to_owned(),
        });
        engine.handle_datagram(env!(harness), &encode(&refusal));
        assert_eq!(engine.state, State::Solicit);

        let advertise = answer(
            &engine,
            MessageType::Advertise,
            vec![association(vec![grant(one())])],
            Vec::new(),
        );
        engine.handle_datagram(env!(harness), &encode(&advertise));
        assert_eq!(engine.state, State::Request);
    }

    #[test]
    fn a_reply_binds_and_schedules_the_timers() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());
        bind(
            &mut harness,
            &mut engine,
            vec![association(vec![grant(one())])],
            Vec::new(),
        );

        let bound = harness.configurator.bound_v6("test0");
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].address, one());
        assert_eq!(bound[0].prefix_length, 128);
        assert!(harness
            .store
            .read("test0", Family::Ipv6)
            .unwrap()
            .is_some());

        let renew = harness.eloop.timeout_left(Event::Dhcp6Renew, 1).unwrap();
        assert!(renew > Duration::from_secs(299) && renew <= Duration::from_secs(300));
        let rebind = harness.eloop.timeout_left(Event::Dhcp6Rebind, 1).unwrap();
        assert!(rebind > Duration::from_secs(499) && rebind <= Duration::from_secs(500));
        let expire = harness.eloop.timeout_left(Event::Dhcp6Expire, 1).unwrap();
        assert!(expire > Duration::from_secs(999) && expire <= Duration::from_secs(1000));
    }

    #[test]
    fn a_withdrawn_address_is_removed() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());
        bind(
            &mut harness,
            &mut engine,
            vec![association(vec![grant(one()), grant(two())])],
            Vec::new(),
        );
        assert_eq!(harness.configurator.bound_v6("test0").len(), 2);

        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Renew);
        assert_eq!(engine.state, State::Renew);
        let reply = answer(
            &engine,
            MessageType::Reply,
            vec![association(vec![grant(one())])],
            Vec::new(),
        );
        engine.handle_datagram(env!(harness), &encode(&reply));

        let bound = harness.configurator.bound_v6("test0");
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].address, one());
    }

    #[test]
    fn a_delegated_prefix_is_sliced_for_the_lan() {
        let mut harness = Harness::new();
        let config = ClientConfig {
            ia_pd: vec![PdRequest {
                iaid: 2,
                length_hint: Some(56),
                sla: vec![Sla {
                    index: 1,
                    interface: "lan0".to_owned(),
                    length: 64,
                }],
            }],
            ..ClientConfig::default()
        };
        let mut engine = Dhcp6::new(interface(), config);
        bind(
            &mut harness,
            &mut engine,
            Vec::new(),
            vec![delegation("2001:db8:100::", 56)],
        );

        let bound = harness.configurator.bound_v6("lan0");
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].address, "2001:db8:100:1::1".parse::<Ipv6Addr>().unwrap());
        assert_eq!(bound[0].prefix_length, 64);
    }

    #[test]
    fn an_excluded_slice_is_withheld() {
        let mut harness = Harness::new();
        let config = ClientConfig {
            ia_pd: vec![PdRequest {
                iaid: 2,
                length_hint: Some(56),
                sla: vec![Sla {
                    index: 1,
                    interface: "lan0".to_owned(),
                    length: 64,
                }],
            }],
            ..ClientConfig::default()
        };
        let mut engine = Dhcp6::new(interface(), config);
        let mut ia_pd = delegation("2001:db8:100::", 56);
        ia_pd.prefixes[0].exclude = Some(dhcp_protocol::v6::ExcludedPrefix {
            prefix: "2001:db8:100:1::".parse().unwrap(),
            prefix_length: 64,
        });
        bind(&mut harness, &mut engine, Vec::new(), vec![ia_pd]);

        assert!(harness.configurator.bound_v6("lan0").is_empty());
    }

    #[test]
    fn confirmation_revives_a_stored_lease() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());
        let mut options = Options::default();
        options.client_id = Some(engine.duid.as_bytes().to_vec());
        options.server_id = Some(server_id());
        options.ia_na = vec![association(vec![grant(one())])];
        let stored = Message {
            message_type: MessageType::Reply,
            transaction_id: 1,
            options,
        };
        harness
            .store
            .write("test0", Family::Ipv6, &encode(&stored))
            .unwrap();

        engine.start(env!(harness));
        assert_eq!(engine.state, State::Confirm);
        assert!(harness.eloop.timeout_left(Event::Dhcp6Deadline, 1).is_some());

        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Send);
        let sent = harness.sent();
        assert_eq!(sent.last().unwrap().message_type, MessageType::Confirm);
        assert_eq!(sent.last().unwrap().options.ia_na[0].addresses[0].address, one());

        // no server answers, the deadline assumes the lease is valid
        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Deadline);
        assert_eq!(engine.state, State::Bound);
        assert_eq!(harness.configurator.bound_v6("test0").len(), 1);
    }

    #[test]
    fn a_stored_delegation_rebinds_instead() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());
        let mut options = Options::default();
        options.client_id = Some(engine.duid.as_bytes().to_vec());
        options.server_id = Some(server_id());
        options.ia_pd = vec![delegation("2001:db8:100::", 56)];
        let stored = Message {
            message_type: MessageType::Reply,
            transaction_id: 1,
            options,
        };
        harness
            .store
            .write("test0", Family::Ipv6, &encode(&stored))
            .unwrap();

        engine.start(env!(harness));
        assert_eq!(engine.state, State::Rebind);
        assert_eq!(
            engine.exchange.as_ref().unwrap().kind,
            MessageType::Rebind
        );
    }

    #[test]
    fn a_no_binding_answer_triggers_a_fresh_request() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());
        bind(
            &mut harness,
            &mut engine,
            vec![association(vec![grant(one())])],
            Vec::new(),
        );

        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Renew);
        let mut reply = answer(&engine, MessageType::Reply, Vec::new(), Vec::new());
        reply.options.status = Some(Status {
            code: StatusCode::NoBinding,
            message: String::new(),
        });
        engine.handle_datagram(env!(harness), &encode(&reply));

        assert_eq!(engine.state, State::Request);
        assert_eq!(
            engine.exchange.as_ref().unwrap().kind,
            MessageType::Request
        );
    }

    #[test]
    fn information_only_asks_and_reschedules() {
        let mut harness = Harness::new();
        let config = ClientConfig {
            information_only: true,
            ..ClientConfig::default()
        };
        let mut engine = Dhcp6::new(interface(), config);

        engine.start(env!(harness));
        assert_eq!(engine.state, State::Inform);
        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Send);
        let sent = harness.sent();
        assert_eq!(sent[0].message_type, MessageType::InformationRequest);
        assert!(sent[0].options.ia_na.is_empty());

        let mut reply = answer(&engine, MessageType::Reply, Vec::new(), Vec::new());
        reply.options.dns_servers = Some(vec!["2001:db8::53".parse().unwrap()]);
        reply.options.information_refresh_time = Some(1200);
        engine.handle_datagram(env!(harness), &encode(&reply));

        assert_eq!(engine.state, State::Informed);
        let refresh = harness.eloop.timeout_left(Event::Dhcp6Renew, 1).unwrap();
        assert!(refresh > Duration::from_secs(1199) && refresh <= Duration::from_secs(1200));

        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Renew);
        assert_eq!(engine.state, State::Inform);
        assert_eq!(
            engine.exchange.as_ref().unwrap().kind,
            MessageType::InformationRequest
        );
    }

    #[test]
    fn a_duplicate_address_is_declined() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());
        bind(
            &mut harness,
            &mut engine,
            vec![association(vec![grant(one()), grant(two())])],
            Vec::new(),
        );
        harness.sent();

        engine.address_failed(env!(harness), one());
        assert_eq!(engine.state, State::Decline);
        let bound = harness.configurator.bound_v6("test0");
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].address, two());

        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Send);
        let sent = harness.sent();
        assert_eq!(sent[0].message_type, MessageType::Decline);
        assert_eq!(sent[0].options.server_id, Some(server_id()));
        assert_eq!(sent[0].options.ia_na[0].addresses[0].address, one());
        assert_eq!(sent[0].options.ia_na[0].addresses[0].valid_lifetime, 0);

        let reply = answer(&engine, MessageType::Reply, Vec::new(), Vec::new());
        engine.handle_datagram(env!(harness), &encode(&reply));
        assert_eq!(engine.state, State::Solicit);
    }

    #[test]
    fn stopping_with_release_echoes_the_bindings() {
        let mut harness = Harness::new();
        let mut engine = Dhcp6::new(interface(), ClientConfig::default());
        bind(
            &mut harness,
            &mut engine,
            vec![association(vec![grant(one())])],
            Vec::new(),
        );
        harness.sent();

        engine.stop(env!(harness), true);
        assert_eq!(engine.state, State::Release);
        assert!(harness.configurator.bound_v6("test0").is_empty());
        assert!(harness.store.read("test0", Family::Ipv6).unwrap().is_none());

        engine.handle_timer(env!(harness), &mut *harness.socket, Event::Dhcp6Send);
        let sent = harness.sent();
        assert_eq!(sent[0].message_type, MessageType::Release);
        assert_eq!(sent[0].options.ia_na[0].addresses[0].address, one());

        let reply = answer(&engine, MessageType::Reply, Vec::new(), Vec::new());
        engine.handle_datagram(env!(harness), &encode(&reply));
        assert!(engine.exchange.is_none());
        assert_eq!(harness.eloop.pending_timers(), 0);
    }
}
