//! DHCP unique identifier module.

use std::fmt;

use bytes::BufMut;
use eui48::MacAddress;

use super::constants::HARDWARE_TYPE_ETHERNET;

/// The DUID-LL type tag.
pub const DUID_TYPE_LINK_LAYER: u16 = 3;

/// A DHCP unique identifier in wire representation.
///
/// The client always generates the link layer flavor so that the
/// identifier is stable across restarts without stable storage.
/// Identifiers received from the wire are kept verbatim and compared
/// as opaque byte strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duid(Vec<u8>);

impl Duid {
    /// Builds a DUID-LL from an Ethernet address.
    pub fn link_layer(address: MacAddress) -> Self {
        let mut data = Vec::with_capacity(4 + address.as_bytes().len());
        data.put_u16(DUID_TYPE_LINK_LAYER);
        data.put_u16(HARDWARE_TYPE_ETHERNET);
        data.put_slice(address.as_bytes());
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Duid {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl fmt::Display for Duid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, octet) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", octet)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_link_layer_identifier_embeds_the_hardware_address() {
        let duid = Duid::link_layer(MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]));

        assert_eq!(
            duid.as_bytes(),
            &[0x00, 0x03, 0x00, 0x01, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55]
        );
        assert_eq!(duid.to_string(), "00:03:00:01:00:11:22:33:44:55");
    }
}
