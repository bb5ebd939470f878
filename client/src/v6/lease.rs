//! DHCPv6 lease admission.
//!
//! A Reply may grant several associations at once and refuse others in
//! the same breath. Admission keeps the usable grants, flattens them
//! into bound addresses and prefixes, and derives one renewal schedule
//! for the whole lease from the shortest lifetimes involved.

use std::{net::Ipv6Addr, time::Instant};

use dhcp_protocol::v6::{ExcludedPrefix, IaAddress, IaNa, IaPd, IaPrefix, Message, Status, StatusCode};

/// The lifetime value that never expires.
pub const TIME_INFINITE: u32 = 0xffff_ffff;

/// An address grant held by the lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundAddress {
    pub iaid: u32,
    pub address: Ipv6Addr,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
}

/// A delegated prefix held by the lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundPrefix {
    pub iaid: u32,
    pub prefix: Ipv6Addr,
    pub prefix_length: u8,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
    pub exclude: Option<ExcludedPrefix>,
}

/// An admitted DHCPv6 lease.
#[derive(Debug, Clone)]
pub struct Lease6 {
    /// The identifier of the granting server.
    pub server_id: Vec<u8>,
    pub addresses: Vec<BoundAddress>,
    pub prefixes: Vec<BoundPrefix>,
    /// Seconds until the lease is renewed at its server.
    pub t1: u32,
    /// Seconds until any server is asked to extend the lease.
    pub t2: u32,
    pub acquired: Instant,
    /// The reply as received, for persistence.
    pub raw: Vec<u8>,
}

impl Lease6 {
    /// Admits the usable bindings of a Reply. Returns `None` when
    /// nothing in it can be used.
    pub fn admit(interface: &str, message: &Message, raw: Vec<u8>) -> Option<Self> {
        let server_id = match message.options.server_id {
            Some(ref server_id) => server_id.clone(),
            None => {
                warn!(
                    "{}: a lease without a server identifier is unusable",
                    interface
                );
                return None;
            }
        };

        let mut addresses = Vec::new();
        let mut prefixes = Vec::new();
        let mut t1 = 0u32;
        let mut t2 = 0u32;

        for ia in message.options.ia_na.iter() {
            if refused(interface, ia.iaid, ia.status.as_ref()) {
                continue;
            }
            let (ia_t1, ia_t2) = sanitize_times(interface, ia.iaid, ia.t1, ia.t2);
            let mut kept = 0usize;
            for address in ia.addresses.iter() {
                if !usable(
                    interface,
                    address.status.as_ref(),
                    address.preferred_lifetime,
                    address.valid_lifetime,
                ) {
                    continue;
                }
                addresses.push(BoundAddress {
                    iaid: ia.iaid,
                    address: address.address,
                    preferred_lifetime: address.preferred_lifetime,
                    valid_lifetime: address.valid_lifetime,
                });
                kept += 1;
            }
            if kept > 0 {
                merge_times(&mut t1, &mut t2, ia_t1, ia_t2);
            }
        }

        for ia in message.options.ia_pd.iter() {
            if refused(interface, ia.iaid, ia.status.as_ref()) {
                continue;
            }
            let (ia_t1, ia_t2) = sanitize_times(interface, ia.iaid, ia.t1, ia.t2);
            let mut kept = 0usize;
            for prefix in ia.prefixes.iter() {
                if !usable(
                    interface,
                    prefix.status.as_ref(),
                    prefix.preferred_lifetime,
                    prefix.valid_lifetime,
                ) {
                    continue;
                }
                prefixes.push(BoundPrefix {
                    iaid: ia.iaid,
                    prefix: prefix.prefix,
                    prefix_length: prefix.prefix_length,
                    preferred_lifetime: prefix.preferred_lifetime,
                    valid_lifetime: prefix.valid_lifetime,
                    exclude: prefix.exclude.clone(),
                });
                kept += 1;
            }
            if kept > 0 {
                merge_times(&mut t1, &mut t2, ia_t1, ia_t2);
            }
        }

        if addresses.is_empty() && prefixes.is_empty() {
            warn!("{}: the reply carried no usable bindings", interface);
            return None;
        }

        let mut lease = Self {
            server_id,
            addresses,
            prefixes,
            t1,
            t2,
            acquired: Instant::now(),
            raw,
        };
        let shortest = lease.shortest_valid();
        if shortest != TIME_INFINITE {
            if lease.t1 == 0 {
                lease.t1 = shortest / 2;
            }
            if lease.t2 == 0 {
                lease.t2 = (u64::from(shortest) * 4 / 5) as u32;
            }
        }
        if lease.t1 != 0 && lease.t2 != 0 && lease.t1 >= lease.t2 {
            lease.t1 = lease.t2 / 2;
        }
        Some(lease)
    }

    /// The shortest valid lifetime across every binding.
    pub fn shortest_valid(&self) -> u32 {
        let mut shortest = TIME_INFINITE;
        for address in self.addresses.iter() {
            shortest = shortest.min(address.valid_lifetime);
        }
        for prefix in self.prefixes.iter() {
            shortest = shortest.min(prefix.valid_lifetime);
        }
        shortest
    }

    pub fn is_infinite(&self) -> bool {
        self.t2 == 0 && self.shortest_valid() == TIME_INFINITE
    }

    /// The address associations regrouped by IAID for the next exchange.
    pub fn to_ia_na(&self) -> Vec<IaNa> {
        let mut associations: Vec<IaNa> = Vec::new();
        for bound in self.addresses.iter() {
            let address = IaAddress {
                address: bound.address,
                preferred_lifetime: bound.preferred_lifetime,
                valid_lifetime: bound.valid_lifetime,
                status: None,
            };
            match associations.iter_mut().find(|ia| ia.iaid == bound.iaid) {
                Some(ia) => ia.addresses.push(address),
                None => associations.push(IaNa {
                    iaid: bound.iaid,
                    t1: 0,
                    t2: 0,
                    addresses: vec![address],
                    status: None,
                }),
            }
        }
        associations
    }

    /// The prefix associations regrouped by IAID for the next exchange.
    pub fn to_ia_pd(&self) -> Vec<IaPd> {
        let mut associations: Vec<IaPd> = Vec::new();
        for bound in self.prefixes.iter() {
            let prefix = IaPrefix {
                prefix: bound.prefix,
                prefix_length: bound.prefix_length,
                preferred_lifetime: bound.preferred_lifetime,
                valid_lifetime: bound.valid_lifetime,
                exclude: None,
                status: None,
            };
            match associations.iter_mut().find(|ia| ia.iaid == bound.iaid) {
                Some(ia) => ia.prefixes.push(prefix),
                None => associations.push(IaPd {
                    iaid: bound.iaid,
                    t1: 0,
                    t2: 0,
                    prefixes: vec![prefix],
                    status: None,
                }),
            }
        }
        associations
    }
}

fn refused(interface: &str, iaid: u32, status: Option<&Status>) -> bool {
    if let Some(status) = status {
        if status.code != StatusCode::Success {
            warn!(
                "{}: association {} was refused: {:?} {}",
                interface, iaid, status.code, status.message
            );
            return true;
        }
    }
    false
}

fn usable(interface: &str, status: Option<&Status>, preferred: u32, valid: u32) -> bool {
    if let Some(status) = status {
        if status.code != StatusCode::Success {
            warn!(
                "{}: a grant was refused: {:?} {}",
                interface, status.code, status.message
            );
            return false;
        }
    }
    if valid == 0 {
        return false;
    }
    if preferred > valid {
        warn!(
            "{}: a grant prefers {}s beyond its {}s validity",
            interface, preferred, valid
        );
        return false;
    }
    true
}

/// Drops a T1 above T2. The server contradicted itself, so both
/// values fall back to the derived defaults.
fn sanitize_times(interface: &str, iaid: u32, t1: u32, t2: u32) -> (u32, u32) {
    if t1 != 0 && t2 != 0 && t1 > t2 {
        warn!(
            "{}: association {} has T1 {} above T2 {}, ignoring both",
            interface, iaid, t1, t2
        );
        (0, 0)
    } else {
        (t1, t2)
    }
}

/// Keeps the shortest nonzero T1 and T2 seen so far.
fn merge_times(t1: &mut u32, t2: &mut u32, ia_t1: u32, ia_t2: u32) {
    if ia_t1 != 0 && (*t1 == 0 || ia_t1 < *t1) {
        *t1 = ia_t1;
    }
    if ia_t2 != 0 && (*t2 == 0 || ia_t2 < *t2) {
        *t2 = ia_t2;
    }
}
