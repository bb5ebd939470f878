//! DHCPv6 message deserialization module.

use std::{io, mem, net::Ipv6Addr};

use bytes::Buf;

use super::{
    constants::*,
    options::{ExcludedPrefix, IaAddress, IaNa, IaPd, IaPrefix, IaTa, OptionCode, Options, Status},
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

/// Checks if the length octets contain correct length for each type.
macro_rules! check_length(
    ($len:expr, $correct:expr) => (
        if $len != $correct {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Length octets are invalid"));
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

impl Message {
    /// DHCPv6 message deserialization.
    ///
    /// Unknown options and options a client never consumes at top level
    /// are skipped using their length octets.
    ///
    /// # Errors
    /// `io::Error` if the packet is abrupted or contains invalid length octets.
    pub fn from_bytes(src: &[u8]) -> io::Result<Self> {
        let mut cursor = ::std::io::Cursor::new(src);

        check_remaining!(cursor, SIZE_HEADER);
        let head = cursor.get_u32();
        let mut message = Message {
            message_type: ((head >> 24) as u8).into(),
            transaction_id: head & XID_MASK,
            options: Options::default(),
        };
        Self::append_options(&mut cursor, &mut message.options)?;

        Ok(message)
    }

    /// Collects the top level options into `options`.
    fn append_options(cursor: &mut io::Cursor<&[u8]>, options: &mut Options) -> io::Result<()> {
        use self::OptionCode::*;

        while cursor.remaining() > 0 {
            check_remaining!(cursor, SIZE_OPTION_PREFIX);
            let code = cursor.get_u16();
            let len = cursor.get_u16() as usize;
            check_remaining!(cursor, len);
            let payload = &cursor.chunk()[..len];

            match code.into() {
                ClientId => options.client_id = Some(payload.to_vec()),
                ServerId => options.server_id = Some(payload.to_vec()),
                IaNa => options.ia_na.push(Self::get_opt_ia_na(payload)?),
                IaTa => options.ia_ta.push(Self::get_opt_ia_ta(payload)?),
                OptionRequest => options.option_request = Some(Self::get_opt_vec_u16(payload)?),
                Preference => options.preference = Some(Self::get_opt_u8(payload)?),
                ElapsedTime => options.elapsed_time = Some(Self::get_opt_u16(payload)?),
                Unicast => options.unicast = Some(Self::get_opt_ipv6(payload)?),
                StatusCode => options.status = Some(Self::get_opt_status(payload)?),
                RapidCommit => {
                    check_length!(len, 0);
                    options.rapid_commit = true;
                }
                DnsServers => options.dns_servers = Some(Self::get_opt_vec_ipv6(payload)?),
                DomainList => options.domain_list = Some(Self::get_opt_domain_list(payload)?),
                IaPd => options.ia_pd.push(Self::get_opt_ia_pd(payload)?),
                InformationRefreshTime => {
                    options.information_refresh_time = Some(Self::get_opt_u32(payload)?)
                }
                SolMaxRt => options.sol_max_rt = Some(Self::get_opt_u32(payload)?),
                InfMaxRt => options.inf_max_rt = Some(Self::get_opt_u32(payload)?),

                // valid only inside an identity association
                IaAddress | IaPrefix | PdExclude => {}
                Unknown => {}
            }
            cursor.advance(len);
        }

        Ok(())
    }

    fn get_opt_u8(payload: &[u8]) -> io::Result<u8> {
        check_length!(payload.len(), mem::size_of::<u8>());
        Ok(payload[0])
    }

    fn get_opt_u16(payload: &[u8]) -> io::Result<u16> {
        check_length!(payload.len(), mem::size_of::<u16>());
        Ok(u16::from_be_bytes([payload[0], payload[1]]))
    }

    fn get_opt_u32(payload: &[u8]) -> io::Result<u32> {
        check_length!(payload.len(), mem::size_of::<u32>());
        Ok(u32::from_be_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ]))
    }

    fn get_opt_ipv6(payload: &[u8]) -> io::Result<Ipv6Addr> {
        check_length!(payload.len(), mem::size_of::<u128>());
        let mut octets = [0u8; mem::size_of::<u128>()];
        octets.copy_from_slice(payload);
        Ok(Ipv6Addr::from(octets))
    }

    fn get_opt_vec_u16(payload: &[u8]) -> io::Result<Vec<u16>> {
        check_divisibility!(payload.len(), mem::size_of::<u16>());
        Ok(payload
            .chunks(mem::size_of::<u16>())
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect())
    }

    fn get_opt_vec_ipv6(payload: &[u8]) -> io::Result<Vec<Ipv6Addr>> {
        check_divisibility!(payload.len(), mem::size_of::<u128>());
        let mut value = Vec::with_capacity(payload.len() / mem::size_of::<u128>());
        for chunk in payload.chunks(mem::size_of::<u128>()) {
            let mut octets = [0u8; mem::size_of::<u128>()];
            octets.copy_from_slice(chunk);
            value.push(Ipv6Addr::from(octets));
        }
        Ok(value)
    }

    fn get_opt_status(payload: &[u8]) -> io::Result<Status> {
        if payload.len() < mem::size_of::<u16>() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Status code is truncated",
            ));
        }
        Ok(Status {
            code: u16::from_be_bytes([payload[0], payload[1]]).into(),
            message: String::from_utf8_lossy(&payload[mem::size_of::<u16>()..]).to_string(),
        })
    }

    /// The search list is a sequence of uncompressed DNS encoded domain names.
    ///
    /// [RFC 3646](https://tools.ietf.org/html/rfc3646)
    fn get_opt_domain_list(payload: &[u8]) -> io::Result<Vec<String>> {
        let mut domains = Vec::new();
        let mut labels: Vec<String> = Vec::new();
        let mut cursor = ::std::io::Cursor::new(payload);
        while cursor.remaining() > 0 {
            let len = cursor.get_u8() as usize;
            if len == 0 {
                if !labels.is_empty() {
                    domains.push(labels.join("."));
                    labels.clear();
                }
                continue;
            }
            if len > SIZE_LABEL_MAXIMAL {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Domain label is overlong",
                ));
            }
            check_remaining!(cursor, len);
            labels.push(String::from_utf8_lossy(&cursor.chunk()[..len]).to_string());
            cursor.advance(len);
        }
        // tolerate a missing terminal root label
        if !labels.is_empty() {
            domains.push(labels.join("."));
        }
        Ok(domains)
    }

    fn get_opt_ia_na(payload: &[u8]) -> io::Result<IaNa> {
        let mut cursor = ::std::io::Cursor::new(payload);
        check_remaining!(cursor, SIZE_IA_FIXED);
        let mut ia = IaNa {
            iaid: cursor.get_u32(),
            t1: cursor.get_u32(),
            t2: cursor.get_u32(),
            addresses: Vec::new(),
            status: None,
        };
        while cursor.remaining() > 0 {
            check_remaining!(cursor, SIZE_OPTION_PREFIX);
            let code = cursor.get_u16();
            let len = cursor.get_u16() as usize;
            check_remaining!(cursor, len);
            let option = &cursor.chunk()[..len];
            match code.into() {
                OptionCode::IaAddress => ia.addresses.push(Self::get_opt_ia_address(option)?),
                OptionCode::StatusCode => ia.status = Some(Self::get_opt_status(option)?),
                _ => {}
            }
            cursor.advance(len);
        }
        Ok(ia)
    }

    fn get_opt_ia_ta(payload: &[u8]) -> io::Result<IaTa> {
        let mut cursor = ::std::io::Cursor::new(payload);
        check_remaining!(cursor, SIZE_IA_TA_FIXED);
        let mut ia = IaTa {
            iaid: cursor.get_u32(),
            addresses: Vec::new(),
            status: None,
        };
        while cursor.remaining() > 0 {
            check_remaining!(cursor, SIZE_OPTION_PREFIX);
            let code = cursor.get_u16();
            let len = cursor.get_u16() as usize;
            check_remaining!(cursor, len);
            let option = &cursor.chunk()[..len];
            match code.into() {
                OptionCode::IaAddress => ia.addresses.push(Self::get_opt_ia_address(option)?),
                OptionCode::StatusCode => ia.status = Some(Self::get_opt_status(option)?),
                _ => {}
            }
            cursor.advance(len);
        }
        Ok(ia)
    }

    fn get_opt_ia_address(payload: &[u8]) -> io::Result<IaAddress> {
        let mut cursor = ::std::io::Cursor::new(payload);
        check_remaining!(cursor, SIZE_IA_ADDRESS_FIXED);
        let mut ia = IaAddress {
            address: Self::get_ipv6(&mut cursor),
            preferred_lifetime: cursor.get_u32(),
            valid_lifetime: cursor.get_u32(),
            status: None,
        };
        while cursor.remaining() > 0 {
            check_remaining!(cursor, SIZE_OPTION_PREFIX);
            let code = cursor.get_u16();
            let len = cursor.get_u16() as usize;
            check_remaining!(cursor, len);
            let option = &cursor.chunk()[..len];
            if let OptionCode::StatusCode = code.into() {
                ia.status = Some(Self::get_opt_status(option)?);
            }
            cursor.advance(len);
        }
        Ok(ia)
    }

    fn get_opt_ia_pd(payload: &[u8]) -> io::Result<IaPd> {
        let mut cursor = ::std::io::Cursor::new(payload);
        check_remaining!(cursor, SIZE_IA_FIXED);
        let mut ia = IaPd {
            iaid: cursor.get_u32(),
            t1: cursor.get_u32(),
            t2: cursor.get_u32(),
            prefixes: Vec::new(),
            status: None,
        };
        while cursor.remaining() > 0 {
            check_remaining!(cursor, SIZE_OPTION_PREFIX);
            let code = cursor.get_u16();
            let len = cursor.get_u16() as usize;
            check_remaining!(cursor, len);
            let option = &cursor.chunk()[..len];
            match code.into() {
                OptionCode::IaPrefix => ia.prefixes.push(Self::get_opt_ia_prefix(option)?),
                OptionCode::StatusCode => ia.status = Some(Self::get_opt_status(option)?),
                _ => {}
            }
            cursor.advance(len);
        }
        Ok(ia)
    }

    fn get_opt_ia_prefix(payload: &[u8]) -> io::Result<IaPrefix> {
        let mut cursor = ::std::io::Cursor::new(payload);
        check_remaining!(cursor, SIZE_IA_PREFIX_FIXED);
        let preferred_lifetime = cursor.get_u32();
        let valid_lifetime = cursor.get_u32();
        let prefix_length = cursor.get_u8();
        let prefix = Self::get_ipv6(&mut cursor);
        if prefix_length > 128 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Prefix length is above 128",
            ));
        }
        let mut ia = IaPrefix {
            prefix,
            prefix_length,
            preferred_lifetime,
            valid_lifetime,
            exclude: None,
            status: None,
        };
        while cursor.remaining() > 0 {
            check_remaining!(cursor, SIZE_OPTION_PREFIX);
            let code = cursor.get_u16();
            let len = cursor.get_u16() as usize;
            check_remaining!(cursor, len);
            let option = &cursor.chunk()[..len];
            match code.into() {
                OptionCode::PdExclude => {
                    ia.exclude = Self::get_opt_pd_exclude(option, ia.prefix, ia.prefix_length)
                }
                OptionCode::StatusCode => ia.status = Some(Self::get_opt_status(option)?),
                _ => {}
            }
            cursor.advance(len);
        }
        Ok(ia)
    }

    /// Reassembles the excluded prefix from the subnet identifier bits.
    ///
    /// The identifier covers the bits between the delegated length and
    /// the excluded length and is left aligned in the option payload.
    /// A malformed exclusion is ignored, as RFC 6603 section 4.2 requires.
    fn get_opt_pd_exclude(
        payload: &[u8],
        delegated: Ipv6Addr,
        delegated_length: u8,
    ) -> Option<ExcludedPrefix> {
        const BITS_IN_BYTE: usize = 8;

        let (&prefix_length, id) = payload.split_first()?;
        if prefix_length <= delegated_length || prefix_length > 128 {
            return None;
        }
        let id_bits = (prefix_length - delegated_length) as usize;
        if id.len() != (id_bits + BITS_IN_BYTE - 1) / BITS_IN_BYTE {
            return None;
        }

        let mut subnet_id = 0u128;
        for (index, octet) in id.iter().enumerate() {
            subnet_id |= u128::from(*octet) << (120 - BITS_IN_BYTE * index);
        }

        let mut bits = u128::from_be_bytes(delegated.octets());
        bits |= subnet_id >> delegated_length;
        bits &= !0u128 << (128 - u32::from(prefix_length));

        Some(ExcludedPrefix {
            prefix: Ipv6Addr::from(bits.to_be_bytes()),
            prefix_length,
        })
    }

    fn get_ipv6(cursor: &mut io::Cursor<&[u8]>) -> Ipv6Addr {
        let mut octets = [0u8; mem::size_of::<u128>()];
        octets.copy_from_slice(&cursor.chunk()[..mem::size_of::<u128>()]);
        cursor.advance(mem::size_of::<u128>());
        Ipv6Addr::from(octets)
    }
}
