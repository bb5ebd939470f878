//! The DHCP wire format crate shared by the v4 and v6 protocol engines.

pub mod v4;
pub mod v6;
