//! The DHCPv4 message module.

pub mod constants;
pub mod hardware_type;
pub mod operation_code;
pub mod options;

mod deserializer;
mod serializer;
mod validator;

use std::{fmt, net::Ipv4Addr};

use eui48::MacAddress;

pub use self::{
    hardware_type::HardwareType,
    operation_code::OperationCode,
    options::{MessageType, OptionTag, Options, Overload},
    validator::Error as ValidationError,
};

/// DHCPv4 message.
pub struct Message {
    pub operation_code: OperationCode,
    pub hardware_type: HardwareType,
    pub hardware_address_length: u8,
    pub hardware_options: u8,
    pub transaction_id: u32,
    pub seconds: u16,
    pub is_broadcast: bool,
    pub client_ip_address: Ipv4Addr,
    pub your_ip_address: Ipv4Addr,
    pub server_ip_address: Ipv4Addr,
    pub gateway_ip_address: Ipv4Addr,
    pub client_hardware_address: MacAddress,
    pub server_name: Vec<u8>,
    pub boot_filename: Vec<u8>,
    pub options: Options,
}

/// Prints an option with `Debug`.
macro_rules! dbg_opt (
    ($f:expr, $options:expr, $field:ident, $tag:expr) => (
        if let Some(ref v) = $options.$field {
            writeln!($f, "[{:03}] {:027}| {:?}", $tag as u8, stringify!($field), v)?;
        }
    );
);

/// Prints an option with `Display`.
macro_rules! dsp_opt (
    ($f:expr, $options:expr, $field:ident, $tag:expr) => (
        if let Some(ref v) = $options.$field {
            writeln!($f, "[{:03}] {:027}| {}", $tag as u8, stringify!($field), v)?;
        }
    );
);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::OptionTag::*;

        writeln!(f)?;

        let server_name_last = self
            .server_name
            .iter()
            .rposition(|&octet| octet != 0)
            .map_or(0, |index| index + 1);
        let boot_filename_last = self
            .boot_filename
            .iter()
            .rposition(|&octet| octet != 0)
            .map_or(0, |index| index + 1);

        writeln!(f, "{}HEADER{}", "_".repeat(30), "_".repeat(39))?;
        writeln!(f, "{:32} | {}", "Operation code", self.operation_code)?;
        writeln!(f, "{:32} | {}", "Hardware type", self.hardware_type)?;
        writeln!(
            f,
            "{:32} | {}",
            "Hardware address length", self.hardware_address_length
        )?;
        writeln!(f, "{:32} | {}", "Hardware options", self.hardware_options)?;
        writeln!(f, "{:32} | {}", "Transaction ID", self.transaction_id)?;
        writeln!(f, "{:32} | {}", "Seconds", self.seconds)?;
        writeln!(f, "{:32} | {}", "Broadcast flag", self.is_broadcast)?;
        writeln!(f, "{:32} | {}", "Client IP address", self.client_ip_address)?;
        writeln!(f, "{:32} | {}", "Your IP address", self.your_ip_address)?;
        writeln!(f, "{:32} | {}", "Server IP address", self.server_ip_address)?;
        writeln!(
            f,
            "{:32} | {}",
            "Gateway IP address", self.gateway_ip_address
        )?;
        writeln!(
            f,
            "{:32} | {}",
            "Client hardware address", self.client_hardware_address
        )?;
        writeln!(
            f,
            "{:32} | {:?}",
            "Server name",
            &self.server_name[0..server_name_last]
        )?;
        writeln!(
            f,
            "{:32} | {:?}",
            "Boot filename",
            &self.boot_filename[0..boot_filename_last]
        )?;

        writeln!(f, "{}OPTIONS{}", "_".repeat(30), "_".repeat(38))?;
        dbg_opt!(f, self.options, subnet_mask, SubnetMask);
        dbg_opt!(f, self.options, time_offset, TimeOffset);
        dbg_opt!(f, self.options, routers, Routers);
        dbg_opt!(f, self.options, domain_name_servers, DomainNameServers);
        dbg_opt!(f, self.options, hostname, Hostname);
        dbg_opt!(f, self.options, domain_name, DomainName);
        dbg_opt!(f, self.options, mtu_interface, MtuInterface);
        dbg_opt!(f, self.options, broadcast_address, BroadcastAddress);
        dbg_opt!(f, self.options, static_routes, StaticRoutes);
        dbg_opt!(f, self.options, ntp_servers, NtpServers);
        dbg_opt!(f, self.options, vendor_specific, VendorSpecific);
        dbg_opt!(f, self.options, address_request, AddressRequest);
        dbg_opt!(f, self.options, address_time, AddressTime);
        dsp_opt!(f, self.options, overload, Overload);
        dsp_opt!(f, self.options, dhcp_message_type, DhcpMessageType);
        dbg_opt!(f, self.options, dhcp_server_id, DhcpServerId);
        dbg_opt!(f, self.options, parameter_list, ParameterList);
        dbg_opt!(f, self.options, dhcp_message, DhcpMessage);
        dbg_opt!(f, self.options, dhcp_max_message_size, DhcpMaxMessageSize);
        dbg_opt!(f, self.options, renewal_time, RenewalTime);
        dbg_opt!(f, self.options, rebinding_time, RebindingTime);
        dbg_opt!(f, self.options, class_id, ClassId);
        dbg_opt!(f, self.options, client_id, ClientId);
        dbg_opt!(f, self.options, auto_configure, AutoConfigure);
        dbg_opt!(
            f,
            self.options,
            classless_static_routes,
            ClasslessStaticRoutes
        );

        writeln!(f, "{}", "_".repeat(75))?;
        Ok(())
    }
}
