//! RFC 3927 IPv4 link-local self assignment.
//!
//! The engine picks candidates from `169.254.0.0/16`, drives the claim
//! engine's probe and announcement cycles on them, and configures the
//! first candidate that survives. It backs off to one attempt per
//! minute after too many conflicts in a row.

use std::{net::Ipv4Addr, time::Duration};

use rand::Rng;

use dhcp_eloop::EventLoop;
use dhcp_platform::{Binding4, Interface};

use crate::arp::{self, ClaimEvent, Originator};
use crate::daemon::Env;
use crate::event::{Event, QUEUE_IPV4LL};

/// The conflict count after which claiming is rate limited.
pub const MAX_CONFLICTS: u32 = 10;

/// The enforced wait between claim attempts once rate limited.
pub const RATE_LIMIT_INTERVAL: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// The random wait before the next probe cycle.
    Waiting,
    Probing,
    Bound,
}

/// The link-local assignment engine of one interface.
pub struct Ipv4ll {
    interface: Interface,
    state: State,
    bound: Option<Ipv4Addr>,
    last_conflict: Option<Ipv4Addr>,
    conflicts: u32,
}

impl Ipv4ll {
    pub fn new(interface: Interface) -> Self {
        Self {
            interface,
            state: State::Idle,
            bound: None,
            last_conflict: None,
            conflicts: 0,
        }
    }

    /// Begins self assignment. Calling while already active does
    /// nothing, so the DHCP engine may request it on every timeout.
    pub fn start(&mut self, eloop: &mut EventLoop<Event>) {
        if self.state != State::Idle {
            return;
        }
        info!("{}: starting link-local assignment", self.interface.name);
        self.state = State::Waiting;
        let delay = rand::thread_rng().gen_range(0.0..arp::PROBE_WAIT);
        eloop.schedule(
            Duration::from_secs_f64(delay),
            QUEUE_IPV4LL,
            Event::LlTick,
            self.owner(),
        );
    }

    /// Tears the assignment down, removing a configured address.
    pub fn stop(&mut self, env: &mut Env) {
        if self.state == State::Idle {
            return;
        }
        env.eloop.cancel(QUEUE_IPV4LL, None, self.owner());
        env.arp.release(env.eloop, Originator::LinkLocal);
        if let Some(address) = self.bound.take() {
            info!("{}: removing link-local {}", self.interface.name, address);
            if let Err(error) = env
                .configurator
                .remove_v4(&self.interface.name, &binding(address))
            {
                warn!(
                    "{}: unable to remove {}: {}",
                    self.interface.name, address, error
                );
            }
        }
        self.state = State::Idle;
        self.conflicts = 0;
    }

    /// The wait before a probe cycle has elapsed.
    pub fn handle_tick(&mut self, env: &mut Env) {
        if self.state != State::Waiting {
            return;
        }
        let candidate = self.pick();
        match env
            .arp
            .probe(env.eloop, env.sockets, Originator::LinkLocal, candidate)
        {
            Ok(()) => self.state = State::Probing,
            Err(error) => {
                warn!(
                    "{}: unable to probe for {}: {}",
                    self.interface.name, candidate, error
                );
                env.eloop.schedule(
                    Duration::from_secs(RATE_LIMIT_INTERVAL),
                    QUEUE_IPV4LL,
                    Event::LlTick,
                    self.owner(),
                );
            }
        }
    }

    /// Routes a claim outcome from the claim engine.
    ///
    /// Returns the lost address when a configured address had to be
    /// surrendered, so the daemon can report the conflict upwards.
    pub fn on_claim(&mut self, env: &mut Env, outcome: ClaimEvent) -> Option<Ipv4Addr> {
        match outcome {
            ClaimEvent::Probed(address) => {
                info!("{}: using link-local {}", self.interface.name, address);
                if let Err(error) = env
                    .configurator
                    .apply_v4(&self.interface.name, &binding(address))
                {
                    warn!(
                        "{}: unable to configure {}: {}",
                        self.interface.name, address, error
                    );
                }
                self.bound = Some(address);
                if let Err(error) =
                    env.arp
                        .announce(env.eloop, env.sockets, Originator::LinkLocal, address)
                {
                    warn!(
                        "{}: unable to announce {}: {}",
                        self.interface.name, address, error
                    );
                }
                None
            }
            ClaimEvent::Announced(_) => {
                self.state = State::Bound;
                self.conflicts = 0;
                None
            }
            ClaimEvent::Conflict { address, .. } => {
                self.conflicts += 1;
                self.last_conflict = Some(address);
                let lost = self.bound.take();
                if let Some(bound) = lost {
                    if let Err(error) = env
                        .configurator
                        .remove_v4(&self.interface.name, &binding(bound))
                    {
                        warn!(
                            "{}: unable to remove {}: {}",
                            self.interface.name, bound, error
                        );
                    }
                }
                self.state = State::Waiting;
                let delay = if self.conflicts >= MAX_CONFLICTS {
                    warn!(
                        "{}: {} conflicts in a row, rate limiting",
                        self.interface.name, self.conflicts
                    );
                    Duration::from_secs(RATE_LIMIT_INTERVAL)
                } else {
                    Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..arp::PROBE_WAIT))
                };
                env.eloop
                    .schedule(delay, QUEUE_IPV4LL, Event::LlTick, self.owner());
                lost
            }
        }
    }

    /// Picks a candidate from `169.254.1.0` to `169.254.254.255`,
    /// avoiding the last conflicted and the currently bound address.
    fn pick(&self) -> Ipv4Addr {
        let mut rng = rand::thread_rng();
        loop {
            let index: u32 = rng.gen_range(0..254 * 256);
            let candidate =
                Ipv4Addr::new(169, 254, (1 + index / 256) as u8, (index % 256) as u8);
            if Some(candidate) == self.last_conflict || Some(candidate) == self.bound {
                continue;
            }
            return candidate;
        }
    }

    fn owner(&self) -> u64 {
        u64::from(self.interface.index)
    }
}

/// The /16 binding of a link-local address.
fn binding(address: Ipv4Addr) -> Binding4 {
    Binding4 {
        address,
        prefix_length: 16,
        broadcast: Some(Ipv4Addr::new(169, 254, 255, 255)),
        routers: Vec::new(),
        static_routes: Vec::new(),
        dns_servers: Vec::new(),
        mtu: None,
    }
}
