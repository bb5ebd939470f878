//! DHCPv4 message validation module.

use thiserror::Error;

use super::{options::MessageType, Message};

/// The error type returned by `Message::validate`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(&'static str),
}

macro_rules! must_set_option (
    ($name:expr, $error:expr) => ( if $name.is_none() { return Err(Error::Validation($error)); } );
);

impl Message {
    /// DHCPv4 message validation.
    ///
    /// Returns the DHCP message type on successful validation.
    ///
    /// # Errors
    /// Returns `Error::Validation` if a required option is missing.
    pub fn validate(&self) -> Result<MessageType, Error> {
        let dhcp_message_type = match self.options.dhcp_message_type {
            Some(MessageType::Undefined) | None => {
                return Err(Error::Validation("dhcp_message_type"))
            }
            Some(dhcp_message_type) => dhcp_message_type,
        };

        match dhcp_message_type {
            // client generated packets section
            MessageType::DhcpDiscover => {}
            MessageType::DhcpRequest => {
                if self.options.dhcp_server_id.is_some() {
                    must_set_option!(self.options.address_request, "address_request");
                }
                if self.client_ip_address.is_unspecified() {
                    must_set_option!(self.options.address_request, "address_request");
                }
            }
            MessageType::DhcpInform => {}
            MessageType::DhcpRelease => {
                must_set_option!(self.options.dhcp_server_id, "dhcp_server_id");
            }
            MessageType::DhcpDecline => {
                must_set_option!(self.options.address_request, "address_request");
                must_set_option!(self.options.dhcp_server_id, "dhcp_server_id");
            }

            // server generated packets section
            MessageType::DhcpOffer => {
                must_set_option!(self.options.address_time, "address_time");
                must_set_option!(self.options.dhcp_server_id, "dhcp_server_id");
            }
            MessageType::DhcpAck => {
                must_set_option!(self.options.dhcp_server_id, "dhcp_server_id");
            }
            MessageType::DhcpNak => {
                must_set_option!(self.options.dhcp_server_id, "dhcp_server_id");
            }
            MessageType::Undefined => return Err(Error::Validation("dhcp_message_type")),
        }

        Ok(dhcp_message_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v4::{constants::*, HardwareType, OperationCode, Options};

    use std::net::Ipv4Addr;

    use eui48::{MacAddress, EUI48LEN};

    fn message(message_type: MessageType) -> Message {
        let mut options = Options::default();
        options.dhcp_message_type = Some(message_type);
        Message {
            operation_code: OperationCode::BootReply,
            hardware_type: HardwareType::Ethernet,
            hardware_address_length: EUI48LEN as u8,
            hardware_options: 0,
            transaction_id: 1,
            seconds: 0,
            is_broadcast: false,
            client_ip_address: Ipv4Addr::new(0, 0, 0, 0),
            your_ip_address: Ipv4Addr::new(0, 0, 0, 0),
            server_ip_address: Ipv4Addr::new(0, 0, 0, 0),
            gateway_ip_address: Ipv4Addr::new(0, 0, 0, 0),
            client_hardware_address: MacAddress::nil(),
            server_name: vec![0u8; SIZE_SERVER_NAME],
            boot_filename: vec![0u8; SIZE_BOOT_FILENAME],
            options,
        }
    }

    #[test]
    fn an_offer_requires_a_lease_time_and_a_server_id() {
        let mut offer = message(MessageType::DhcpOffer);
        assert!(offer.validate().is_err());

        offer.options.address_time = Some(3600);
        offer.options.dhcp_server_id = Some(Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(offer.validate().unwrap(), MessageType::DhcpOffer);
    }

    #[test]
    fn an_acknowledgment_passes_without_a_lease_time() {
        let mut ack = message(MessageType::DhcpAck);
        ack.options.dhcp_server_id = Some(Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(ack.validate().unwrap(), MessageType::DhcpAck);
    }

    #[test]
    fn a_message_without_a_type_is_rejected() {
        let mut nak = message(MessageType::DhcpNak);
        nak.options.dhcp_message_type = None;
        assert!(nak.validate().is_err());
    }
}
