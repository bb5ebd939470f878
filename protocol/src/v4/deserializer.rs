//! DHCPv4 message deserialization module.

use std::{io, mem, net::Ipv4Addr};

use bytes::Buf;
use eui48::{MacAddress, EUI48LEN};

use super::{
    constants::*,
    options::{OptionTag::*, Options, Overload},
    Message,
};

/// Checks if there is enough space in buffer to get a value.
macro_rules! check_remaining(
    ($cursor:expr, $length:expr) => (
        if $cursor.remaining() < $length {
            return Err(
                io::Error::new(io::ErrorKind::UnexpectedEof,
                "Buffer is too small or packet has invalid length octets",
            ));
        }
    );
);

/// Checks if the length octet contains correct length for each type and is not zero.
macro_rules! check_length(
    ($len:expr) => (
        if $len == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Length octet is zero"));
        }
    );
    ($len:expr, $correct:expr) => (
        if $len != $correct {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Length octet is invalid"));
        }
    );
);

/// Checks if the vector size in bytes is divisible by the length of its element.
macro_rules! check_divisibility(
    ($len:expr, $divider:expr) => (
        if $len % $divider != 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Divisibility check failed"));
        }
    );
);

/// A range from the current cursor position to the specified distance.
macro_rules! distance(
    ($cursor:expr, $distance:expr) => (
        ($cursor.position() as usize)..(($cursor.position() as usize) + $distance)
    );
);

impl Message {
    /// DHCPv4 message deserialization.
    ///
    /// # Errors
    /// `io::Error` if the packet is abrupted, too small or contains invalid length octets.
    pub fn from_bytes(src: &[u8]) -> io::Result<Self> {
        let mut cursor = ::std::io::Cursor::new(src);
        check_remaining!(cursor, OFFSET_OPTIONS);

        let mut message = Message {
            operation_code: cursor.get_u8().into(),
            hardware_type: cursor.get_u8().into(),
            hardware_address_length: cursor.get_u8(),
            hardware_options: cursor.get_u8(),
            transaction_id: cursor.get_u32(),
            seconds: cursor.get_u16(),
            // https://tools.ietf.org/html/rfc2131#section-2
            // Leftmost bit (0 bit) is most significant
            is_broadcast: cursor.get_u16() & FLAG_BROADCAST != 0,
            client_ip_address: Ipv4Addr::from(cursor.get_u32()),
            your_ip_address: Ipv4Addr::from(cursor.get_u32()),
            server_ip_address: Ipv4Addr::from(cursor.get_u32()),
            gateway_ip_address: Ipv4Addr::from(cursor.get_u32()),
            client_hardware_address: {
                let address = MacAddress::from_bytes(&src[distance!(cursor, EUI48LEN)])
                    .map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "Malformed hardware address")
                    })?;
                cursor.advance(SIZE_HARDWARE_ADDRESS);
                address
            },
            server_name: {
                let vec = Vec::from(&src[distance!(cursor, SIZE_SERVER_NAME)]);
                cursor.advance(SIZE_SERVER_NAME);
                vec
            },
            boot_filename: {
                let vec = Vec::from(&src[distance!(cursor, SIZE_BOOT_FILENAME)]);
                cursor.advance(SIZE_BOOT_FILENAME);
                vec
            },
            options: Options::default(),
        };

        if cursor.get_u32() != MAGIC_COOKIE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "MAGIC_COOKIE"));
        }

        Self::append_options(&mut cursor, &mut message.options)?;
        match message.options.overload {
            Some(Overload::File) => {
                let mut cursor =
                    ::std::io::Cursor::new(&src[OFFSET_BOOT_FILENAME..OFFSET_MAGIC_COOKIE]);
                Self::append_options(&mut cursor, &mut message.options)?;
            }
            Some(Overload::Sname) => {
                let mut cursor =
                    ::std::io::Cursor::new(&src[OFFSET_SERVER_NAME..OFFSET_BOOT_FILENAME]);
                Self::append_options(&mut cursor, &mut message.options)?;
            }
            Some(Overload::Both) => {
                let mut cursor =
                    ::std::io::Cursor::new(&src[OFFSET_BOOT_FILENAME..OFFSET_MAGIC_COOKIE]);
                Self::append_options(&mut cursor, &mut message.options)?;
                let mut cursor =
                    ::std::io::Cursor::new(&src[OFFSET_SERVER_NAME..OFFSET_BOOT_FILENAME]);
                Self::append_options(&mut cursor, &mut message.options)?;
            }
            _ => {}
        }

        Ok(message)
    }

    fn append_options(mut cursor: &mut io::Cursor<&[u8]>, options: &mut Options) -> io::Result<()> {
        while cursor.remaining() > 0 {
            check_remaining!(cursor, mem::size_of::<u8>());
            let tag = cursor.get_u8();
            match tag.into() {
                // unsplittable options
                SubnetMask => options.subnet_mask = Some(Self::get_opt_ipv4(&mut cursor)?),
                TimeOffset => options.time_offset = Some(Self::get_opt_u32(&mut cursor)?),
                MtuInterface => options.mtu_interface = Some(Self::get_opt_u16(&mut cursor)?),
                BroadcastAddress => {
                    options.broadcast_address = Some(Self::get_opt_ipv4(&mut cursor)?)
                }
                AddressRequest => options.address_request = Some(Self::get_opt_ipv4(&mut cursor)?),
                AddressTime => options.address_time = Some(Self::get_opt_u32(&mut cursor)?),
                Overload => options.overload = Some(Self::get_opt_u8(&mut cursor)?.into()),
                DhcpMessageType => {
                    options.dhcp_message_type = Some(Self::get_opt_u8(&mut cursor)?.into())
                }
                DhcpServerId => options.dhcp_server_id = Some(Self::get_opt_ipv4(&mut cursor)?),
                DhcpMaxMessageSize => {
                    options.dhcp_max_message_size = Some(Self::get_opt_u16(&mut cursor)?)
                }
                RenewalTime => options.renewal_time = Some(Self::get_opt_u32(&mut cursor)?),
                RebindingTime => options.rebinding_time = Some(Self::get_opt_u32(&mut cursor)?),
                AutoConfigure => options.auto_configure = Some(Self::get_opt_u8(&mut cursor)?),

                // splittable options
                Routers => {
                    options.routers =
                        Some(Self::get_opt_vec_ipv4(&mut cursor, &mut options.routers)?)
                }
                DomainNameServers => {
                    options.domain_name_servers = Some(Self::get_opt_vec_ipv4(
                        &mut cursor,
                        &mut options.domain_name_servers,
                    )?)
                }
                Hostname => {
                    options.hostname =
                        Some(Self::get_opt_string(&mut cursor, &mut options.hostname)?)
                }
                DomainName => {
                    options.domain_name =
                        Some(Self::get_opt_string(&mut cursor, &mut options.domain_name)?)
                }
                StaticRoutes => {
                    options.static_routes = Some(Self::get_opt_vec_ipv4_pairs(
                        &mut cursor,
                        &mut options.static_routes,
                    )?)
                }
                NtpServers => {
                    options.ntp_servers = Some(Self::get_opt_vec_ipv4(
                        &mut cursor,
                        &mut options.ntp_servers,
                    )?)
                }
                VendorSpecific => {
                    options.vendor_specific = Some(Self::get_opt_vec(
                        &mut cursor,
                        &mut options.vendor_specific,
                    )?)
                }
                ParameterList => {
                    options.parameter_list =
                        Some(Self::get_opt_vec(&mut cursor, &mut options.parameter_list)?)
                }
                DhcpMessage => {
                    options.dhcp_message = Some(Self::get_opt_string(
                        &mut cursor,
                        &mut options.dhcp_message,
                    )?)
                }
                ClassId => {
                    options.class_id = Some(Self::get_opt_vec(&mut cursor, &mut options.class_id)?)
                }
                ClientId => {
                    options.client_id =
                        Some(Self::get_opt_vec(&mut cursor, &mut options.client_id)?)
                }
                ClasslessStaticRoutes => {
                    options.classless_static_routes = Some(Self::get_opt_classless_static_routes(
                        &mut cursor,
                        &mut options.classless_static_routes,
                    )?)
                }

                End => break,
                Pad => continue,
                Unknown => Self::skip(&mut cursor)?,
            }
        }
        Ok(())
    }

    /// Cannot be splitted so reassembling not required.
    fn get_opt_u8(cursor: &mut io::Cursor<&[u8]>) -> io::Result<u8> {
        check_remaining!(cursor, mem::size_of::<u8>());
        let len = cursor.get_u8() as usize;
        check_length!(len, mem::size_of::<u8>());
        check_remaining!(cursor, len);
        let value = cursor.get_u8();
        Ok(value)
    }

    /// Cannot be splitted so reassembling not required.
    fn get_opt_u16(cursor: &mut io::Cursor<&[u8]>) -> io::Result<u16> {
        check_remaining!(cursor, mem::size_of::<u8>());
        let len = cursor.get_u8() as usize;
        check_length!(len, mem::size_of::<u16>());
        check_remaining!(cursor, len);
        let value = cursor.get_u16();
        Ok(value)
    }

    /// Cannot be splitted so reassembling not required.
    fn get_opt_u32(cursor: &mut io::Cursor<&[u8]>) -> io::Result<u32> {
        check_remaining!(cursor, mem::size_of::<u8>());
        let len = cursor.get_u8() as usize;
        check_length!(len, mem::size_of::<u32>());
        check_remaining!(cursor, len);
        let value = cursor.get_u32();
        Ok(value)
    }

    /// Cannot be splitted so reassembling not required.
    fn get_opt_ipv4(cursor: &mut io::Cursor<&[u8]>) -> io::Result<Ipv4Addr> {
        check_remaining!(cursor, mem::size_of::<u8>());
        let len = cursor.get_u8() as usize;
        check_length!(len, mem::size_of::<u32>());
        check_remaining!(cursor, len);
        let value = cursor.get_u32();
        Ok(Ipv4Addr::from(value))
    }

    /// Can be splitted so values are appended if an option already contains some data.
    fn get_opt_string(
        cursor: &mut io::Cursor<&[u8]>,
        option: &mut Option<String>,
    ) -> io::Result<String> {
        check_remaining!(cursor, mem::size_of::<u8>());
        let len = cursor.get_u8() as usize;
        check_length!(len);
        check_remaining!(cursor, len);
        let value = String::from_utf8_lossy(&cursor.chunk()[..len]).to_string();
        cursor.advance(len);
        if let Some(ref mut data) = option {
            Ok(data.to_owned() + value.as_ref())
        } else {
            Ok(value)
        }
    }

    /// Can be splitted so values are appended if an option already contains some data.
    fn get_opt_vec(
        cursor: &mut io::Cursor<&[u8]>,
        option: &mut Option<Vec<u8>>,
    ) -> io::Result<Vec<u8>> {
        check_remaining!(cursor, mem::size_of::<u8>());
        let len = cursor.get_u8() as usize;
        check_length!(len);
        check_remaining!(cursor, len);
        let mut value: Vec<u8> = cursor.chunk()[..len].to_vec();
        cursor.advance(len);
        if let Some(ref mut data) = option {
            data.append(value.as_mut());
            Ok(data.to_owned())
        } else {
            Ok(value)
        }
    }

    /// Can be splitted so values are appended if an option already contains some data.
    fn get_opt_vec_ipv4(
        cursor: &mut io::Cursor<&[u8]>,
        option: &mut Option<Vec<Ipv4Addr>>,
    ) -> io::Result<Vec<Ipv4Addr>> {
        check_remaining!(cursor, mem::size_of::<u8>());
        let len = cursor.get_u8() as usize;
        check_length!(len);
        let element_size = mem::size_of::<u32>();
        check_divisibility!(len, element_size);
        check_remaining!(cursor, len);
        let amount = len / element_size;
        let mut value = Vec::with_capacity(amount);
        for _ in 0..amount {
            value.push(Ipv4Addr::from(cursor.get_u32()))
        }
        if let Some(ref mut data) = option {
            data.append(value.as_mut());
            Ok(data.to_owned())
        } else {
            Ok(value)
        }
    }

    /// Can be splitted so values are appended if an option already contains some data.
    fn get_opt_vec_ipv4_pairs(
        cursor: &mut io::Cursor<&[u8]>,
        option: &mut Option<Vec<(Ipv4Addr, Ipv4Addr)>>,
    ) -> io::Result<Vec<(Ipv4Addr, Ipv4Addr)>> {
        check_remaining!(cursor, mem::size_of::<u8>());
        let len = cursor.get_u8() as usize;
        check_length!(len);
        let element_size = mem::size_of::<u32>() * 2;
        check_divisibility!(len, element_size);
        check_remaining!(cursor, len);
        let amount = len / element_size;
        let mut value = Vec::with_capacity(amount);
        for _ in 0..amount {
            value.push((
                Ipv4Addr::from(cursor.get_u32()),
                Ipv4Addr::from(cursor.get_u32()),
            ))
        }
        if let Some(ref mut data) = option {
            data.append(value.as_mut());
            Ok(data.to_owned())
        } else {
            Ok(value)
        }
    }

    /// Can be splitted so values are appended if an option already contains some data.
    /// The encoding algorithm explained at [RFC 3442](https://tools.ietf.org/html/rfc3442).
    fn get_opt_classless_static_routes(
        cursor: &mut io::Cursor<&[u8]>,
        option: &mut Option<Vec<(Ipv4Addr, Ipv4Addr, Ipv4Addr)>>,
    ) -> io::Result<Vec<(Ipv4Addr, Ipv4Addr, Ipv4Addr)>> {
        const BITS_IN_BYTE: usize = 8;
        const IPV4_BYTESIZE: usize = mem::size_of::<u32>();
        const IPV4_BITSIZE: usize = IPV4_BYTESIZE * BITS_IN_BYTE;
        const MIN_ELEMENT_SIZE: usize = 1 + IPV4_BYTESIZE;

        check_remaining!(cursor, mem::size_of::<u8>());
        let mut len = cursor.get_u8() as usize;
        check_length!(len);
        check_remaining!(cursor, len);
        let mut value = Vec::with_capacity(len / MIN_ELEMENT_SIZE);
        while len > 0 {
            if len < MIN_ELEMENT_SIZE {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Route descriptor is truncated",
                ));
            }
            let subnet_mask_len = cursor.get_u8() as usize;
            if subnet_mask_len > IPV4_BITSIZE {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Subnet mask width is above 32",
                ));
            }
            let subnet_number_len = (subnet_mask_len + BITS_IN_BYTE - 1) / BITS_IN_BYTE;
            if len < MIN_ELEMENT_SIZE + subnet_number_len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Route descriptor is truncated",
                ));
            }
            let mut subnet_number = [0u8; IPV4_BYTESIZE];
            for octet in subnet_number.iter_mut().take(subnet_number_len) {
                *octet = cursor.get_u8();
            }
            len -= MIN_ELEMENT_SIZE + subnet_number_len;

            let subnet_mask = if subnet_mask_len == 0 {
                0u32
            } else {
                !0u32 << (IPV4_BITSIZE - subnet_mask_len)
            };
            value.push((
                Ipv4Addr::from(subnet_number),
                Ipv4Addr::from(subnet_mask),
                Ipv4Addr::from(cursor.get_u32()),
            ));
        }
        if let Some(ref mut data) = option {
            data.append(value.as_mut());
            Ok(data.to_owned())
        } else {
            Ok(value)
        }
    }

    fn skip(cursor: &mut io::Cursor<&[u8]>) -> io::Result<()> {
        check_remaining!(cursor, mem::size_of::<u8>());
        let len = cursor.get_u8() as usize;
        check_length!(len);
        check_remaining!(cursor, len);
        cursor.advance(len);
        Ok(())
    }
}
