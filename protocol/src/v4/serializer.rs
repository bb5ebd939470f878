//! DHCPv4 message serialization module.

use std::{io, mem, net::Ipv4Addr};

use bytes::BufMut;

use super::{
    constants::*,
    options::{MessageType, OptionTag},
    Message,
};

/// Checks if there is enough space in buffer to put a value.
macro_rules! check_remaining(
    ($cursor:expr, $distance:expr) => (
        if $cursor.remaining_mut() < $distance {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Buffer is too small"));
        }
    )
);

impl Message {
    /// DHCPv4 message serialization.
    ///
    /// Client messages are padded with zeroes to the historic BOOTP minimum
    /// of `SIZE_MESSAGE_PADDED` bytes.
    ///
    /// # Errors
    /// `io::Error` if the buffer is too small or a BOOTP name field is overlong.
    pub fn to_bytes(&self, dst: &mut [u8]) -> io::Result<usize> {
        use self::OptionTag::*;

        if self.server_name.len() > SIZE_SERVER_NAME
            || self.boot_filename.len() > SIZE_BOOT_FILENAME
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "BOOTP name field is overlong",
            ));
        }

        let capacity = dst.len();
        let mut cursor = dst;
        check_remaining!(cursor, OFFSET_OPTIONS);
        cursor.put_u8(self.operation_code as u8);
        cursor.put_u8(self.hardware_type as u8);
        cursor.put_u8(self.hardware_address_length);
        cursor.put_u8(self.hardware_options);
        cursor.put_u32(self.transaction_id);
        cursor.put_u16(self.seconds);
        cursor.put_u16(if self.is_broadcast { FLAG_BROADCAST } else { 0 });
        cursor.put_u32(u32::from(self.client_ip_address));
        cursor.put_u32(u32::from(self.your_ip_address));
        cursor.put_u32(u32::from(self.server_ip_address));
        cursor.put_u32(u32::from(self.gateway_ip_address));
        cursor.put_slice(self.client_hardware_address.as_bytes());
        cursor.put_bytes(
            0,
            SIZE_HARDWARE_ADDRESS - self.client_hardware_address.as_bytes().len(),
        );
        cursor.put_slice(&self.server_name);
        cursor.put_bytes(0, SIZE_SERVER_NAME - self.server_name.len());
        cursor.put_slice(&self.boot_filename);
        cursor.put_bytes(0, SIZE_BOOT_FILENAME - self.boot_filename.len());
        cursor.put_u32(MAGIC_COOKIE);

        Self::put_ipv4(&mut cursor, SubnetMask, &self.options.subnet_mask)?;
        Self::put_u32(&mut cursor, TimeOffset, &self.options.time_offset)?;
        Self::put_vec_ipv4(&mut cursor, Routers, &self.options.routers)?;
        Self::put_vec_ipv4(
            &mut cursor,
            DomainNameServers,
            &self.options.domain_name_servers,
        )?;
        Self::put_string(&mut cursor, Hostname, &self.options.hostname)?;
        Self::put_string(&mut cursor, DomainName, &self.options.domain_name)?;
        Self::put_u16(&mut cursor, MtuInterface, &self.options.mtu_interface)?;
        Self::put_ipv4(
            &mut cursor,
            BroadcastAddress,
            &self.options.broadcast_address,
        )?;
        Self::put_vec_ipv4_pairs(&mut cursor, StaticRoutes, &self.options.static_routes)?;
        Self::put_vec_ipv4(&mut cursor, NtpServers, &self.options.ntp_servers)?;
        Self::put_vec(&mut cursor, VendorSpecific, &self.options.vendor_specific)?;
        Self::put_ipv4(&mut cursor, AddressRequest, &self.options.address_request)?;
        Self::put_u32(&mut cursor, AddressTime, &self.options.address_time)?;
        Self::put_message_type(
            &mut cursor,
            DhcpMessageType,
            &self.options.dhcp_message_type,
        )?;
        Self::put_ipv4(&mut cursor, DhcpServerId, &self.options.dhcp_server_id)?;
        Self::put_vec(&mut cursor, ParameterList, &self.options.parameter_list)?;
        Self::put_string(&mut cursor, DhcpMessage, &self.options.dhcp_message)?;
        Self::put_u16(
            &mut cursor,
            DhcpMaxMessageSize,
            &self.options.dhcp_max_message_size,
        )?;
        Self::put_u32(&mut cursor, RenewalTime, &self.options.renewal_time)?;
        Self::put_u32(&mut cursor, RebindingTime, &self.options.rebinding_time)?;
        Self::put_vec(&mut cursor, ClassId, &self.options.class_id)?;
        Self::put_vec(&mut cursor, ClientId, &self.options.client_id)?;
        Self::put_u8(&mut cursor, AutoConfigure, &self.options.auto_configure)?;
        Self::put_classless_static_routes(
            &mut cursor,
            ClasslessStaticRoutes,
            &self.options.classless_static_routes,
        )?;

        check_remaining!(cursor, mem::size_of::<u8>());
        cursor.put_u8(End as u8);

        let mut written = capacity - cursor.remaining_mut();
        if written < SIZE_MESSAGE_PADDED {
            check_remaining!(cursor, SIZE_MESSAGE_PADDED - written);
            cursor.put_bytes(Pad as u8, SIZE_MESSAGE_PADDED - written);
            written = SIZE_MESSAGE_PADDED;
        }
        Ok(written)
    }

    fn put_message_type(
        cursor: &mut &mut [u8],
        tag: OptionTag,
        value: &Option<MessageType>,
    ) -> io::Result<()> {
        if let Some(value) = value {
            let size = mem::size_of::<u8>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u8(tag as u8);
            cursor.put_u8(size as u8);
            cursor.put_u8(*value as u8);
        }
        Ok(())
    }

    fn put_u8(cursor: &mut &mut [u8], tag: OptionTag, value: &Option<u8>) -> io::Result<()> {
        if let Some(value) = value {
            let size = mem::size_of::<u8>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u8(tag as u8);
            cursor.put_u8(size as u8);
            cursor.put_u8(*value);
        }
        Ok(())
    }

    fn put_u16(cursor: &mut &mut [u8], tag: OptionTag, value: &Option<u16>) -> io::Result<()> {
        if let Some(value) = value {
            let size = mem::size_of::<u16>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u8(tag as u8);
            cursor.put_u8(size as u8);
            cursor.put_u16(*value);
        }
        Ok(())
    }

    fn put_u32(cursor: &mut &mut [u8], tag: OptionTag, value: &Option<u32>) -> io::Result<()> {
        if let Some(value) = value {
            let size = mem::size_of::<u32>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u8(tag as u8);
            cursor.put_u8(size as u8);
            cursor.put_u32(*value);
        }
        Ok(())
    }

    fn put_ipv4(
        cursor: &mut &mut [u8],
        tag: OptionTag,
        value: &Option<Ipv4Addr>,
    ) -> io::Result<()> {
        if let Some(value) = value {
            let size = mem::size_of::<u32>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u8(tag as u8);
            cursor.put_u8(size as u8);
            cursor.put_u32(u32::from(*value));
        }
        Ok(())
    }

    /// Overlong values are split into several options with the same tag.
    fn put_string(
        cursor: &mut &mut [u8],
        tag: OptionTag,
        value: &Option<String>,
    ) -> io::Result<()> {
        if let Some(value) = value {
            for chunk in value.as_bytes().chunks(SIZE_OPTION_MAXIMAL) {
                Self::put_raw(cursor, tag, chunk)?;
            }
        }
        Ok(())
    }

    /// Overlong values are split into several options with the same tag.
    fn put_vec(cursor: &mut &mut [u8], tag: OptionTag, value: &Option<Vec<u8>>) -> io::Result<()> {
        if let Some(value) = value {
            for chunk in value.chunks(SIZE_OPTION_MAXIMAL) {
                Self::put_raw(cursor, tag, chunk)?;
            }
        }
        Ok(())
    }

    /// Overlong values are split into several options with the same tag.
    fn put_vec_ipv4(
        cursor: &mut &mut [u8],
        tag: OptionTag,
        value: &Option<Vec<Ipv4Addr>>,
    ) -> io::Result<()> {
        const PER_OPTION: usize = SIZE_OPTION_MAXIMAL / mem::size_of::<u32>();

        if let Some(value) = value {
            for chunk in value.chunks(PER_OPTION) {
                let size = chunk.len() * mem::size_of::<u32>();
                check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
                cursor.put_u8(tag as u8);
                cursor.put_u8(size as u8);
                for element in chunk.iter() {
                    cursor.put_u32(u32::from(*element));
                }
            }
        }
        Ok(())
    }

    /// Overlong values are split into several options with the same tag.
    fn put_vec_ipv4_pairs(
        cursor: &mut &mut [u8],
        tag: OptionTag,
        value: &Option<Vec<(Ipv4Addr, Ipv4Addr)>>,
    ) -> io::Result<()> {
        const PER_OPTION: usize = SIZE_OPTION_MAXIMAL / (mem::size_of::<u32>() * 2);

        if let Some(value) = value {
            for chunk in value.chunks(PER_OPTION) {
                let size = chunk.len() * mem::size_of::<u32>() * 2;
                check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
                cursor.put_u8(tag as u8);
                cursor.put_u8(size as u8);
                for element in chunk.iter() {
                    cursor.put_u32(u32::from(element.0));
                    cursor.put_u32(u32::from(element.1));
                }
            }
        }
        Ok(())
    }

    /// The encoding algorithm explained at [RFC 3442](https://tools.ietf.org/html/rfc3442).
    ///
    /// Descriptors never cross an option boundary, so the payload is packed
    /// descriptor by descriptor.
    fn put_classless_static_routes(
        cursor: &mut &mut [u8],
        tag: OptionTag,
        value: &Option<Vec<(Ipv4Addr, Ipv4Addr, Ipv4Addr)>>,
    ) -> io::Result<()> {
        const BITS_IN_BYTE: usize = 8;

        if let Some(value) = value {
            let mut pending: Vec<u8> = Vec::new();
            for (subnet_number, subnet_mask, router) in value.iter() {
                let subnet_mask_len = u32::from(*subnet_mask).leading_ones() as usize;
                let subnet_number_len = (subnet_mask_len + BITS_IN_BYTE - 1) / BITS_IN_BYTE;

                let mut descriptor = Vec::with_capacity(1 + subnet_number_len + 4);
                descriptor.put_u8(subnet_mask_len as u8);
                descriptor.put_slice(&subnet_number.octets()[..subnet_number_len]);
                descriptor.put_slice(&router.octets());

                if pending.len() + descriptor.len() > SIZE_OPTION_MAXIMAL {
                    Self::put_raw(cursor, tag, &pending)?;
                    pending.clear();
                }
                pending.extend_from_slice(&descriptor);
            }
            if !pending.is_empty() {
                Self::put_raw(cursor, tag, &pending)?;
            }
        }
        Ok(())
    }

    fn put_raw(cursor: &mut &mut [u8], tag: OptionTag, payload: &[u8]) -> io::Result<()> {
        check_remaining!(cursor, SIZE_OPTION_PREFIX + payload.len());
        cursor.put_u8(tag as u8);
        cursor.put_u8(payload.len() as u8);
        cursor.put_slice(payload);
        Ok(())
    }
}
