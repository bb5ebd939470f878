//! The client configuration module.

use std::net::Ipv4Addr;

use dhcp_protocol::v4::OptionTag;

use crate::error::Error;

/// A slice of a delegated prefix handed to another interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sla {
    /// The index written between the delegated length and `length`,
    /// right aligned at `length`.
    pub index: u32,
    /// The interface the sub prefix is assigned to.
    pub interface: String,
    /// The prefix length of the sub prefix.
    pub length: u8,
}

/// A prefix delegation request with its sub delegation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdRequest {
    /// The identity association identifier the prefix is requested under.
    pub iaid: u32,
    /// The prefix length hinted to the server.
    pub length_hint: Option<u8>,
    /// The slices carved out of the delegated prefix.
    pub sla: Vec<Sla>,
}

/// The per interface client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Overrides the client identifier derived from the hardware address.
    pub client_id: Option<Vec<u8>>,
    /// Overrides the hostname reported to the server.
    pub hostname: Option<String>,
    /// The DHCPv4 option tags asked from the server.
    pub request: Vec<u8>,
    /// Option tags a reply must carry to be accepted.
    pub require: Vec<u8>,
    /// Option tags poisoning any reply that carries them.
    pub reject: Vec<u8>,
    /// Probes an acknowledged address over ARP before binding it.
    pub arp_probe: bool,
    /// Falls back to a link local address while no server answers.
    pub ipv4ll: bool,
    /// Sends a release to the server when the interface is stopped.
    pub release_on_stop: bool,
    /// A statically configured address to query option data for. When set,
    /// the DHCPv4 engine only informs and never acquires a lease.
    pub inform_address: Option<Ipv4Addr>,
    /// Seconds an old address is confirmed after a restart before falling
    /// back to discovery.
    pub reboot_timeout: u64,
    /// The IAID of every requested non temporary association. An empty list
    /// requests a single association with an identifier derived from the
    /// hardware address.
    pub ia_na: Vec<u32>,
    /// The requested prefix delegations.
    pub ia_pd: Vec<PdRequest>,
    /// Asks only for configuration options over DHCPv6, never addresses.
    pub information_only: bool,
    /// Requires RFC 3118 authenticated messages.
    pub auth: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            hostname: None,
            request: vec![
                OptionTag::SubnetMask as u8,
                OptionTag::Routers as u8,
                OptionTag::DomainNameServers as u8,
                OptionTag::DomainName as u8,
                OptionTag::MtuInterface as u8,
                OptionTag::BroadcastAddress as u8,
                OptionTag::StaticRoutes as u8,
                OptionTag::NtpServers as u8,
                OptionTag::AddressTime as u8,
                OptionTag::RenewalTime as u8,
                OptionTag::RebindingTime as u8,
                OptionTag::ClasslessStaticRoutes as u8,
            ],
            require: Vec::new(),
            reject: Vec::new(),
            arp_probe: true,
            ipv4ll: true,
            release_on_stop: false,
            inform_address: None,
            reboot_timeout: 5,
            ia_na: Vec::new(),
            ia_pd: Vec::new(),
            information_only: false,
            auth: false,
        }
    }
}

impl ClientConfig {
    /// Checks the configuration for contradictions.
    ///
    /// # Errors
    /// `Error::Config` describing the first contradiction found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.auth {
            return Err(Error::Config("message authentication is not supported"));
        }
        for request in &self.ia_pd {
            let mut indexes = Vec::with_capacity(request.sla.len());
            for sla in &request.sla {
                if sla.length == 0 || sla.length > 128 {
                    return Err(Error::Config("a slice length must be between 1 and 128"));
                }
                if indexes.contains(&sla.index) {
                    return Err(if sla.index == 0 {
                        Error::Config("only one slice may use index 0")
                    } else {
                        Error::Config("slice indexes must be distinct")
                    });
                }
                indexes.push(sla.index);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(index: u32, length: u8) -> Sla {
        Sla {
            index,
            interface: format!("lan{}", index),
            length,
        }
    }

    #[test]
    fn distinct_slice_indexes_pass() {
        let mut config = ClientConfig::default();
        config.ia_pd = vec![PdRequest {
            iaid: 1,
            length_hint: Some(56),
            sla: vec![slice(0, 64), slice(1, 64), slice(2, 60)],
        }];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn a_duplicate_slice_index_is_rejected() {
        let mut config = ClientConfig::default();
        config.ia_pd = vec![PdRequest {
            iaid: 1,
            length_hint: None,
            sla: vec![slice(3, 64), slice(3, 62)],
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn two_zero_slices_are_rejected() {
        let mut config = ClientConfig::default();
        config.ia_pd = vec![PdRequest {
            iaid: 1,
            length_hint: None,
            sla: vec![
                Sla {
                    index: 0,
                    interface: "lan0".to_owned(),
                    length: 64,
                },
                Sla {
                    index: 0,
                    interface: "lan1".to_owned(),
                    length: 64,
                },
            ],
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn authentication_is_refused() {
        let mut config = ClientConfig::default();
        config.auth = true;
        assert!(config.validate().is_err());
    }
}
