//! The DHCPv4 message building module.

use std::net::Ipv4Addr;

use eui48::{MacAddress, EUI48LEN};

use dhcp_protocol::v4::{HardwareType, Message, MessageType, OperationCode, Options};

/// Builds the client to server messages.
///
/// The fields invariant across an interface's lifetime are set once at
/// construction.
pub struct MessageBuilder {
    /// The interface hardware address.
    client_hardware_address: MacAddress,
    /// The RFC 2132 client identifier, a hardware type octet followed
    /// by the hardware address unless overridden.
    client_id: Vec<u8>,
    /// The hostname reported to the server.
    hostname: Option<String>,
    /// The option tags requested from the server.
    parameter_list: Vec<u8>,
}

impl MessageBuilder {
    pub fn new(
        client_hardware_address: MacAddress,
        client_id: Option<Vec<u8>>,
        hostname: Option<String>,
        parameter_list: Vec<u8>,
    ) -> Self {
        let client_id = client_id.unwrap_or_else(|| {
            let mut id = Vec::with_capacity(EUI48LEN + 1);
            id.push(HardwareType::Ethernet as u8);
            id.extend_from_slice(client_hardware_address.as_bytes());
            id
        });
        Self {
            client_hardware_address,
            client_id,
            hostname,
            parameter_list,
        }
    }

    /// Creates a `DHCPDISCOVER` message.
    pub fn discover(
        &self,
        transaction_id: u32,
        seconds: u16,
        is_broadcast: bool,
        address_request: Option<Ipv4Addr>,
    ) -> Message {
        let mut options = Options::default();
        self.append_identity(&mut options);
        options.address_request = address_request;
        options.parameter_list = Some(self.parameter_list.clone());
        options.dhcp_message_type = Some(MessageType::DhcpDiscover);

        self.message(transaction_id, seconds, is_broadcast, Ipv4Addr::UNSPECIFIED, options)
    }

    /// Creates a `DHCPREQUEST` message in the `SELECTING` state.
    pub fn request_selecting(
        &self,
        transaction_id: u32,
        seconds: u16,
        is_broadcast: bool,
        address_request: Ipv4Addr,
        dhcp_server_id: Ipv4Addr,
    ) -> Message {
        let mut options = Options::default();
        self.append_identity(&mut options);
        options.address_request = Some(address_request);
        options.dhcp_server_id = Some(dhcp_server_id);
        options.parameter_list = Some(self.parameter_list.clone());
        options.dhcp_message_type = Some(MessageType::DhcpRequest);

        self.message(transaction_id, seconds, is_broadcast, Ipv4Addr::UNSPECIFIED, options)
    }

    /// Creates a `DHCPREQUEST` message in the `INIT-REBOOT` state.
    pub fn request_init_reboot(
        &self,
        transaction_id: u32,
        seconds: u16,
        address_request: Ipv4Addr,
    ) -> Message {
        let mut options = Options::default();
        self.append_identity(&mut options);
        options.address_request = Some(address_request);
        options.parameter_list = Some(self.parameter_list.clone());
        options.dhcp_message_type = Some(MessageType::DhcpRequest);

        self.message(transaction_id, seconds, true, Ipv4Addr::UNSPECIFIED, options)
    }

    /// Creates a `DHCPREQUEST` message in the `RENEWING` or `REBINDING`
    /// state. The bound address goes into `ciaddr`, so the broadcast
    /// flag stays clear.
    pub fn request_renew(
        &self,
        transaction_id: u32,
        seconds: u16,
        client_ip_address: Ipv4Addr,
    ) -> Message {
        let mut options = Options::default();
        self.append_identity(&mut options);
        options.parameter_list = Some(self.parameter_list.clone());
        options.dhcp_message_type = Some(MessageType::DhcpRequest);

        self.message(transaction_id, seconds, false, client_ip_address, options)
    }

    /// Creates a `DHCPDECLINE` message.
    pub fn decline(
        &self,
        transaction_id: u32,
        address_request: Ipv4Addr,
        dhcp_server_id: Ipv4Addr,
        dhcp_message: Option<String>,
    ) -> Message {
        let mut options = Options::default();
        self.append_identity(&mut options);
        options.address_request = Some(address_request);
        options.dhcp_server_id = Some(dhcp_server_id);
        options.dhcp_message = dhcp_message;
        options.dhcp_message_type = Some(MessageType::DhcpDecline);

        self.message(transaction_id, 0, false, Ipv4Addr::UNSPECIFIED, options)
    }

    /// Creates a `DHCPRELEASE` message.
    pub fn release(
        &self,
        transaction_id: u32,
        client_ip_address: Ipv4Addr,
        dhcp_server_id: Ipv4Addr,
        dhcp_message: Option<String>,
    ) -> Message {
        let mut options = Options::default();
        self.append_identity(&mut options);
        options.dhcp_server_id = Some(dhcp_server_id);
        options.dhcp_message = dhcp_message;
        options.dhcp_message_type = Some(MessageType::DhcpRelease);

        self.message(transaction_id, 0, false, client_ip_address, options)
    }

    /// Creates a `DHCPINFORM` message.
    pub fn inform(&self, transaction_id: u32, client_ip_address: Ipv4Addr) -> Message {
        let mut options = Options::default();
        self.append_identity(&mut options);
        options.parameter_list = Some(self.parameter_list.clone());
        options.dhcp_message_type = Some(MessageType::DhcpInform);

        self.message(transaction_id, 0, false, client_ip_address, options)
    }

    fn append_identity(&self, options: &mut Options) {
        options.client_id = Some(self.client_id.clone());
        options.hostname = self.hostname.clone();
    }

    fn message(
        &self,
        transaction_id: u32,
        seconds: u16,
        is_broadcast: bool,
        client_ip_address: Ipv4Addr,
        options: Options,
    ) -> Message {
        Message {
            operation_code: OperationCode::BootRequest,
            hardware_type: HardwareType::Ethernet,
            hardware_address_length: EUI48LEN as u8,
            hardware_options: 0,
            transaction_id,
            seconds,
            is_broadcast,
            client_ip_address,
            your_ip_address: Ipv4Addr::UNSPECIFIED,
            server_ip_address: Ipv4Addr::UNSPECIFIED,
            gateway_ip_address: Ipv4Addr::UNSPECIFIED,
            client_hardware_address: self.client_hardware_address,
            server_name: Vec::new(),
            boot_filename: Vec::new(),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use dhcp_protocol::v4::constants::SIZE_MESSAGE_MINIMAL;

    fn builder() -> MessageBuilder {
        MessageBuilder::new(
            MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            None,
            Some("testhost".to_owned()),
            vec![1, 3, 6],
        )
    }

    #[test]
    fn a_discover_round_trips_and_validates() {
        let message = builder().discover(0x1234_5678, 0, true, None);

        let mut buffer = [0u8; SIZE_MESSAGE_MINIMAL];
        let amount = message.to_bytes(&mut buffer).unwrap();
        let parsed = Message::from_bytes(&buffer[..amount]).unwrap();

        assert_eq!(parsed.validate().unwrap(), MessageType::DhcpDiscover);
        assert_eq!(parsed.transaction_id, 0x1234_5678);
        assert!(parsed.is_broadcast);
        assert_eq!(
            parsed.options.client_id,
            Some(vec![1, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
        );
        assert_eq!(parsed.options.hostname, Some("testhost".to_owned()));
    }

    #[test]
    fn requests_carry_the_lease_identity() {
        let address = Ipv4Addr::new(192, 168, 1, 40);
        let server = Ipv4Addr::new(192, 168, 1, 1);

        let selecting = builder().request_selecting(1, 4, true, address, server);
        assert_eq!(selecting.options.address_request, Some(address));
        assert_eq!(selecting.options.dhcp_server_id, Some(server));
        assert!(selecting.client_ip_address.is_unspecified());
        assert!(selecting.validate().is_ok());

        let renewing = builder().request_renew(2, 0, address);
        assert_eq!(renewing.client_ip_address, address);
        assert_eq!(renewing.options.address_request, None);
        assert!(!renewing.is_broadcast);
        assert!(renewing.validate().is_ok());

        let rebooting = builder().request_init_reboot(3, 0, address);
        assert_eq!(rebooting.options.address_request, Some(address));
        assert_eq!(rebooting.options.dhcp_server_id, None);
        assert!(rebooting.is_broadcast);
        assert!(rebooting.validate().is_ok());
    }

    #[test]
    fn maintenance_messages_skip_the_parameter_list() {
        let address = Ipv4Addr::new(192, 168, 1, 40);
        let server = Ipv4Addr::new(192, 168, 1, 1);

        let decline = builder().decline(1, address, server, None);
        assert_eq!(decline.options.parameter_list, None);
        assert!(decline.validate().is_ok());

        let release = builder().release(2, address, server, None);
        assert_eq!(release.options.parameter_list, None);
        assert_eq!(release.client_ip_address, address);
        assert!(release.validate().is_ok());

        let inform = builder().inform(3, address);
        assert!(inform.options.parameter_list.is_some());
        assert!(inform.validate().is_ok());
    }
}
