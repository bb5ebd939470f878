//! The DHCPv6 message composer.

use std::net::Ipv6Addr;

use dhcp_protocol::v6::{Duid, IaNa, IaPd, IaPrefix, Message, MessageType, OptionCode, Options};

use crate::config::PdRequest;

/// Composes the client side of every DHCPv6 exchange.
///
/// A Solicit requests the associations named in the configuration.
/// Every later exchange echoes the associations of the current lease,
/// which the caller passes in regrouped by IAID.
pub struct MessageBuilder {
    client_id: Vec<u8>,
    ia_na: Vec<u32>,
    ia_pd: Vec<PdRequest>,
}

impl MessageBuilder {
    pub fn new(duid: &Duid, ia_na: Vec<u32>, ia_pd: Vec<PdRequest>) -> Self {
        Self {
            client_id: duid.as_bytes().to_vec(),
            ia_na,
            ia_pd,
        }
    }

    /// A Solicit asking for fresh associations.
    pub fn solicit(&self, xid: u32, elapsed: u16) -> Message {
        let mut options = self.base(elapsed);
        options.option_request = Some(oro(false));
        options.ia_na = self
            .ia_na
            .iter()
            .map(|&iaid| IaNa {
                iaid,
                t1: 0,
                t2: 0,
                addresses: Vec::new(),
                status: None,
            })
            .collect();
        options.ia_pd = self
            .ia_pd
            .iter()
            .map(|request| IaPd {
                iaid: request.iaid,
                t1: 0,
                t2: 0,
                prefixes: hint(request.length_hint),
                status: None,
            })
            .collect();
        Message {
            message_type: MessageType::Solicit,
            transaction_id: xid,
            options,
        }
    }

    /// A Request, Renew, Release or Decline directed at one server.
    pub fn to_server(
        &self,
        message_type: MessageType,
        xid: u32,
        elapsed: u16,
        server_id: &[u8],
        ia_na: Vec<IaNa>,
        ia_pd: Vec<IaPd>,
    ) -> Message {
        let mut options = self.base(elapsed);
        options.server_id = Some(server_id.to_vec());
        if message_type == MessageType::Request || message_type == MessageType::Renew {
            options.option_request = Some(oro(false));
        }
        options.ia_na = ia_na;
        options.ia_pd = ia_pd;
        Message {
            message_type,
            transaction_id: xid,
            options,
        }
    }

    /// A Rebind addressed to any server still aware of the lease.
    pub fn rebind(&self, xid: u32, elapsed: u16, ia_na: Vec<IaNa>, ia_pd: Vec<IaPd>) -> Message {
        let mut options = self.base(elapsed);
        options.option_request = Some(oro(false));
        options.ia_na = ia_na;
        options.ia_pd = ia_pd;
        Message {
            message_type: MessageType::Rebind,
            transaction_id: xid,
            options,
        }
    }

    /// A Confirm asking whether the bound addresses are still on link.
    pub fn confirm(&self, xid: u32, elapsed: u16, ia_na: Vec<IaNa>) -> Message {
        let mut options = self.base(elapsed);
        options.ia_na = ia_na;
        Message {
            message_type: MessageType::Confirm,
            transaction_id: xid,
            options,
        }
    }

    /// An Information-request asking for configuration only.
    pub fn information_request(&self, xid: u32, elapsed: u16) -> Message {
        let mut options = self.base(elapsed);
        options.option_request = Some(oro(true));
        Message {
            message_type: MessageType::InformationRequest,
            transaction_id: xid,
            options,
        }
    }

    fn base(&self, elapsed: u16) -> Options {
        let mut options = Options::default();
        options.client_id = Some(self.client_id.clone());
        options.elapsed_time = Some(elapsed);
        options
    }
}

fn oro(information: bool) -> Vec<u16> {
    let mut codes = vec![
        OptionCode::DnsServers as u16,
        OptionCode::DomainList as u16,
        OptionCode::SolMaxRt as u16,
        OptionCode::InfMaxRt as u16,
    ];
    if information {
        codes.push(OptionCode::InformationRefreshTime as u16);
    }
    codes
}

fn hint(length: Option<u8>) -> Vec<IaPrefix> {
    match length {
        Some(length) => vec![IaPrefix {
            prefix: Ipv6Addr::UNSPECIFIED,
            prefix_length: length,
            preferred_lifetime: 0,
            valid_lifetime: 0,
            exclude: None,
            status: None,
        }],
        None => Vec::new(),
    }
}
