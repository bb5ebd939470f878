//! DHCPv6 message validation module.

use thiserror::Error;

use super::{message_type::MessageType, Message};

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
    /// DHCPv6 message validation.
    ///
    /// Returns the message type on successful validation.
    ///
    /// # Errors
    /// Returns `Error::Validation` if a required option is missing or the
    /// message type is not usable by a client.
    pub fn validate(&self) -> Result<MessageType, Error> {
        match self.message_type {
            // client generated packets section
            MessageType::Solicit
            | MessageType::Confirm
            | MessageType::Rebind
            | MessageType::InformationRequest => {
                must_set_option!(self.options.client_id, "client_id");
            }
            MessageType::Request
            | MessageType::Renew
            | MessageType::Release
            | MessageType::Decline => {
                must_set_option!(self.options.client_id, "client_id");
                must_set_option!(self.options.server_id, "server_id");
            }

            // server generated packets section
            MessageType::Advertise | MessageType::Reply => {
                must_set_option!(self.options.client_id, "client_id");
                must_set_option!(self.options.server_id, "server_id");
            }

            // reconfiguration is not supported and must not be accepted unauthenticated
            MessageType::Reconfigure => return Err(Error::Validation("message_type")),
            MessageType::Undefined => return Err(Error::Validation("message_type")),
        }

        Ok(self.message_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v6::Options;

    fn reply() -> Message {
        let mut message = Message {
            message_type: MessageType::Reply,
            transaction_id: 0x000001,
            options: Options::default(),
        };
        message.options.client_id = Some(vec![0x00, 0x03, 0x00, 0x01, 0, 1, 2, 3, 4, 5]);
        message.options.server_id = Some(vec![0xde, 0xad, 0xbe, 0xef]);
        message
    }

    #[test]
    fn a_reply_requires_both_identifiers() {
        let mut message = reply();
        assert!(message.validate().is_ok());

        message.options.server_id = None;
        assert!(message.validate().is_err());
    }

    #[test]
    fn a_reconfigure_is_rejected() {
        let mut message = reply();
        message.message_type = MessageType::Reconfigure;

        assert!(message.validate().is_err());
    }

    #[test]
    fn a_solicit_needs_no_server_identifier() {
        let mut message = reply();
        message.message_type = MessageType::Solicit;
        message.options.server_id = None;

        assert!(message.validate().is_ok());
    }
}
