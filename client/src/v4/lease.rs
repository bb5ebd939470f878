//! DHCPv4 lease admission and timing.
//!
//! Admission turns an acknowledged message into the timers and the
//! interface configuration the engine runs with. Server supplied
//! timing outside `renewal <= rebinding < lease` is clamped here, so
//! the rest of the engine can rely on the ordering.

use std::{
    net::Ipv4Addr,
    time::{Duration, Instant},
};

use dhcp_platform::Binding4;
use dhcp_protocol::v4::Message;

/// The lease time value meaning the lease never expires.
pub const TIME_INFINITE: u32 = 0xffff_ffff;

const LEASE_TIME_MINIMAL: u32 = 20;
const LEASE_TIME_DEFAULT: u32 = 3600;

/// An admitted DHCPv4 lease.
#[derive(Debug, Clone)]
pub struct Lease4 {
    pub address: Ipv4Addr,
    pub server_id: Ipv4Addr,
    pub binding: Binding4,
    pub lease_time: u32,
    pub renewal_time: u32,
    pub rebinding_time: u32,
    pub acquired: Instant,
    /// The acknowledged message bytes as persisted.
    pub raw: Vec<u8>,
}

impl Lease4 {
    /// Admits an acknowledged lease, clamping out of range timing.
    ///
    /// Returns `None` if the message carries no server identifier.
    pub fn admit(interface: &str, message: &Message, raw: Vec<u8>) -> Option<Self> {
        let server_id = match message.options.dhcp_server_id {
            Some(server_id) => server_id,
            None => {
                warn!("{}: the lease carries no server identifier", interface);
                return None;
            }
        };
        let address = message.your_ip_address;

        let mut lease_time = match message.options.address_time {
            Some(address_time) => address_time,
            None => {
                warn!(
                    "{}: no lease time, assuming {} seconds",
                    interface, LEASE_TIME_DEFAULT
                );
                LEASE_TIME_DEFAULT
            }
        };
        if lease_time != TIME_INFINITE && lease_time < LEASE_TIME_MINIMAL {
            warn!(
                "{}: lease time {} is too short, raising to {} seconds",
                interface, lease_time, LEASE_TIME_MINIMAL
            );
            lease_time = LEASE_TIME_MINIMAL;
        }

        let (renewal_time, rebinding_time) = if lease_time == TIME_INFINITE {
            (0, 0)
        } else {
            let seven_eighths = (u64::from(lease_time) * 7 / 8) as u32;
            let rebinding_time = match message.options.rebinding_time.filter(|&time| time != 0) {
                Some(time) if time >= lease_time => {
                    warn!(
                        "{}: rebinding time {} exceeds the lease time {}, clamping",
                        interface, time, lease_time
                    );
                    seven_eighths
                }
                Some(time) => time,
                None => seven_eighths,
            };
            let renewal_time = match message.options.renewal_time.filter(|&time| time != 0) {
                Some(time) if time > rebinding_time => {
                    warn!(
                        "{}: renewal time {} exceeds the rebinding time {}, clamping",
                        interface, time, rebinding_time
                    );
                    lease_time / 2
                }
                Some(time) => time,
                None => lease_time / 2,
            };
            (renewal_time, rebinding_time)
        };

        Some(Self {
            address,
            server_id,
            binding: derive_binding(interface, address, message),
            lease_time,
            renewal_time,
            rebinding_time,
            acquired: Instant::now(),
            raw,
        })
    }

    pub fn is_infinite(&self) -> bool {
        self.lease_time == TIME_INFINITE
    }

    /// The time left until the rebinding threshold.
    pub fn until_rebind(&self) -> Duration {
        (self.acquired + Duration::from_secs(u64::from(self.rebinding_time)))
            .saturating_duration_since(Instant::now())
    }

    /// The time left until the lease expires.
    pub fn until_expiry(&self) -> Duration {
        (self.acquired + Duration::from_secs(u64::from(self.lease_time)))
            .saturating_duration_since(Instant::now())
    }
}

/// Derives the interface configuration from the lease options.
///
/// RFC 3442 classless routes, when present, supersede both the router
/// list and the historic static route pairs.
fn derive_binding(interface: &str, address: Ipv4Addr, message: &Message) -> Binding4 {
    let mask = match message.options.subnet_mask {
        Some(mask) => mask,
        None => {
            let classful = classful_mask(address);
            warn!("{}: no subnet mask, assuming {}", interface, classful);
            classful
        }
    };
    let prefix_length = u32::from(mask).count_ones() as u8;
    let broadcast = message
        .options
        .broadcast_address
        .or_else(|| Some(Ipv4Addr::from(u32::from(address) | !u32::from(mask))));

    let (routers, static_routes) = match message.options.classless_static_routes {
        Some(ref routes) => (Vec::new(), routes.clone()),
        None => (
            message.options.routers.clone().unwrap_or_default(),
            message
                .options
                .static_routes
                .as_ref()
                .map(|pairs| {
                    pairs
                        .iter()
                        .map(|&(destination, router)| {
                            (destination, classful_mask(destination), router)
                        })
                        .collect()
                })
                .unwrap_or_default(),
        ),
    };

    Binding4 {
        address,
        prefix_length,
        broadcast,
        routers,
        static_routes,
        dns_servers: message
            .options
            .domain_name_servers
            .clone()
            .unwrap_or_default(),
        mtu: message.options.mtu_interface,
    }
}

fn classful_mask(address: Ipv4Addr) -> Ipv4Addr {
    let first = address.octets()[0];
    if first < 128 {
        Ipv4Addr::new(255, 0, 0, 0)
    } else if first < 192 {
        Ipv4Addr::new(255, 255, 0, 0)
    } else {
        Ipv4Addr::new(255, 255, 255, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use eui48::MacAddress;

    use dhcp_protocol::v4::{HardwareType, MessageType, OperationCode, Options};

    fn ack(address: Ipv4Addr, options: Options) -> Message {
        Message {
            operation_code: OperationCode::BootReply,
            hardware_type: HardwareType::Ethernet,
            hardware_address_length: 6,
            hardware_options: 0,
            transaction_id: 0x01020304,
            seconds: 0,
            is_broadcast: false,
            client_ip_address: Ipv4Addr::UNSPECIFIED,
            your_ip_address: address,
            server_ip_address: Ipv4Addr::UNSPECIFIED,
            gateway_ip_address: Ipv4Addr::UNSPECIFIED,
            client_hardware_address: MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            server_name: Vec::new(),
            boot_filename: Vec::new(),
            options,
        }
    }

    fn base_options() -> Options {
        let mut options = Options::default();
        options.dhcp_message_type = Some(MessageType::DhcpAck);
        options.dhcp_server_id = Some(Ipv4Addr::new(192, 168, 1, 1));
        options.address_time = Some(1000);
        options.subnet_mask = Some(Ipv4Addr::new(255, 255, 255, 0));
        options
    }

    #[test]
    fn timing_defaults_follow_the_halves() {
        let message = ack(Ipv4Addr::new(192, 168, 1, 40), base_options());
        let lease = Lease4::admit("test0", &message, Vec::new()).unwrap();

        assert_eq!(lease.lease_time, 1000);
        assert_eq!(lease.renewal_time, 500);
        assert_eq!(lease.rebinding_time, 875);
        assert_eq!(lease.binding.prefix_length, 24);
        assert_eq!(lease.binding.broadcast, Some(Ipv4Addr::new(192, 168, 1, 255)));
    }

    #[test]
    fn server_timing_out_of_range_is_clamped() {
        let mut options = base_options();
        options.renewal_time = Some(950);
        options.rebinding_time = Some(2000);
        let message = ack(Ipv4Addr::new(192, 168, 1, 40), options);
        let lease = Lease4::admit("test0", &message, Vec::new()).unwrap();

        assert_eq!(lease.rebinding_time, 875);
        assert_eq!(lease.renewal_time, 500);
    }

    #[test]
    fn a_short_lease_is_raised_to_the_minimum() {
        let mut options = base_options();
        options.address_time = Some(5);
        let message = ack(Ipv4Addr::new(192, 168, 1, 40), options);
        let lease = Lease4::admit("test0", &message, Vec::new()).unwrap();

        assert_eq!(lease.lease_time, LEASE_TIME_MINIMAL);
    }

    #[test]
    fn an_infinite_lease_never_renews() {
        let mut options = base_options();
        options.address_time = Some(TIME_INFINITE);
        let message = ack(Ipv4Addr::new(192, 168, 1, 40), options);
        let lease = Lease4::admit("test0", &message, Vec::new()).unwrap();

        assert!(lease.is_infinite());
        assert_eq!(lease.renewal_time, 0);
        assert_eq!(lease.rebinding_time, 0);
    }

    #[test]
    fn a_missing_server_identifier_is_refused() {
        let mut options = base_options();
        options.dhcp_server_id = None;
        let message = ack(Ipv4Addr::new(192, 168, 1, 40), options);

        assert!(Lease4::admit("test0", &message, Vec::new()).is_none());
    }

    #[test]
    fn classless_routes_supersede_the_router_list() {
        let mut options = base_options();
        options.routers = Some(vec![Ipv4Addr::new(192, 168, 1, 1)]);
        options.static_routes = Some(vec![(
            Ipv4Addr::new(10, 0, 0, 0),
            Ipv4Addr::new(10, 0, 0, 1),
        )]);
        let route = (
            Ipv4Addr::new(172, 16, 0, 0),
            Ipv4Addr::new(255, 240, 0, 0),
            Ipv4Addr::new(192, 168, 1, 254),
        );
        options.classless_static_routes = Some(vec![route]);
        let message = ack(Ipv4Addr::new(192, 168, 1, 40), options);
        let lease = Lease4::admit("test0", &message, Vec::new()).unwrap();

        assert!(lease.binding.routers.is_empty());
        assert_eq!(lease.binding.static_routes, vec![route]);
    }

    #[test]
    fn historic_route_pairs_get_classful_masks() {
        let mut options = base_options();
        options.static_routes = Some(vec![(
            Ipv4Addr::new(10, 0, 0, 0),
            Ipv4Addr::new(192, 168, 1, 254),
        )]);
        let message = ack(Ipv4Addr::new(192, 168, 1, 40), options);
        let lease = Lease4::admit("test0", &message, Vec::new()).unwrap();

        assert_eq!(
            lease.binding.static_routes,
            vec![(
                Ipv4Addr::new(10, 0, 0, 0),
                Ipv4Addr::new(255, 0, 0, 0),
                Ipv4Addr::new(192, 168, 1, 254),
            )]
        );
    }

    #[test]
    fn a_missing_mask_falls_back_to_the_class() {
        let mut options = base_options();
        options.subnet_mask = None;
        let message = ack(Ipv4Addr::new(10, 1, 2, 3), options);
        let lease = Lease4::admit("test0", &message, Vec::new()).unwrap();

        assert_eq!(lease.binding.prefix_length, 8);
    }
}
