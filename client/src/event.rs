//! The reactor wake tokens and timer queues.

/// The timer queue of the DHCPv4 engine.
pub const QUEUE_DHCP4: u32 = 1;

/// The timer queue of the DHCPv6 engine.
pub const QUEUE_DHCP6: u32 = 2;

/// The timer queue of the address claim engine.
pub const QUEUE_ARP: u32 = 3;

/// The timer queue of the link local engine.
pub const QUEUE_IPV4LL: u32 = 4;

/// The wake tokens dispatched by the reactor.
///
/// Timer wakes carry the interface index as the owner, so every engine
/// schedules against its own interface without disturbing the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A DHCPv4 retransmission or delayed restart is due.
    Dhcp4Send,
    /// The DHCPv4 renewal time T1 passed.
    Dhcp4Renew,
    /// The DHCPv4 rebinding time T2 passed.
    Dhcp4Rebind,
    /// The DHCPv4 lease ran out.
    Dhcp4Expire,
    /// The DHCPv4 socket of an interface is readable.
    Dhcp4Socket,

    /// A DHCPv6 transmission is due.
    Dhcp6Send,
    /// The duration bound of the running DHCPv6 exchange passed.
    Dhcp6Deadline,
    /// The DHCPv6 renewal time T1 passed.
    Dhcp6Renew,
    /// The DHCPv6 rebinding time T2 passed.
    Dhcp6Rebind,
    /// The shortest DHCPv6 valid lifetime ran out.
    Dhcp6Expire,
    /// The shared DHCPv6 socket is readable.
    Dhcp6Socket,

    /// A probe or announcement of the claim ordered by DHCPv4 is due.
    ArpDhcpTick,
    /// A probe or announcement of the claim ordered by IPv4LL is due.
    ArpLlTick,
    /// The ARP socket of an interface is readable.
    ArpSocket,

    /// A link local candidate selection or rate limited retry is due.
    LlTick,

    /// Reserved for embedders waking the loop from the outside, like a
    /// signal handler pipe. Never dispatched by the daemon itself.
    Signal,
}
