//! DHCPv6 message serialization module.

use std::{io, mem, net::Ipv6Addr};

use bytes::BufMut;

use super::{
    constants::*,
    options::{ExcludedPrefix, IaAddress, IaNa, IaPd, IaPrefix, IaTa, OptionCode, Status},
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
    /// DHCPv6 message serialization.
    ///
    /// Identity associations are assembled into intermediate buffers so
    /// that the nested option lengths can be written in one pass.
    ///
    /// # Errors
    /// `io::Error` if the buffer is too small or an option payload cannot be encoded.
    pub fn to_bytes(&self, dst: &mut [u8]) -> io::Result<usize> {
        use self::OptionCode::*;

        let capacity = dst.len();
        let mut cursor = dst;
        check_remaining!(cursor, SIZE_HEADER);
        cursor.put_u32(((self.message_type as u32) << 24) | (self.transaction_id & XID_MASK));

        Self::put_vec(&mut cursor, ClientId, &self.options.client_id)?;
        Self::put_vec(&mut cursor, ServerId, &self.options.server_id)?;
        for ia in self.options.ia_na.iter() {
            Self::put_raw(&mut cursor, IaNa, &Self::encode_ia_na(ia)?)?;
        }
        for ia in self.options.ia_ta.iter() {
            Self::put_raw(&mut cursor, IaTa, &Self::encode_ia_ta(ia)?)?;
        }
        Self::put_vec_u16(&mut cursor, OptionRequest, &self.options.option_request)?;
        Self::put_u8(&mut cursor, Preference, &self.options.preference)?;
        Self::put_u16(&mut cursor, ElapsedTime, &self.options.elapsed_time)?;
        Self::put_ipv6(&mut cursor, Unicast, &self.options.unicast)?;
        if let Some(ref status) = self.options.status {
            Self::put_raw(&mut cursor, StatusCode, &Self::encode_status(status))?;
        }
        if self.options.rapid_commit {
            Self::put_raw(&mut cursor, RapidCommit, &[])?;
        }
        Self::put_vec_ipv6(&mut cursor, DnsServers, &self.options.dns_servers)?;
        Self::put_domain_list(&mut cursor, DomainList, &self.options.domain_list)?;
        for ia in self.options.ia_pd.iter() {
            Self::put_raw(&mut cursor, IaPd, &Self::encode_ia_pd(ia)?)?;
        }
        Self::put_u32(
            &mut cursor,
            InformationRefreshTime,
            &self.options.information_refresh_time,
        )?;
        Self::put_u32(&mut cursor, SolMaxRt, &self.options.sol_max_rt)?;
        Self::put_u32(&mut cursor, InfMaxRt, &self.options.inf_max_rt)?;

        Ok(capacity - cursor.remaining_mut())
    }

    fn put_u8(cursor: &mut &mut [u8], code: OptionCode, value: &Option<u8>) -> io::Result<()> {
        if let Some(value) = value {
            let size = mem::size_of::<u8>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u16(code as u16);
            cursor.put_u16(size as u16);
            cursor.put_u8(*value);
        }
        Ok(())
    }

    fn put_u16(cursor: &mut &mut [u8], code: OptionCode, value: &Option<u16>) -> io::Result<()> {
        if let Some(value) = value {
            let size = mem::size_of::<u16>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u16(code as u16);
            cursor.put_u16(size as u16);
            cursor.put_u16(*value);
        }
        Ok(())
    }

    fn put_u32(cursor: &mut &mut [u8], code: OptionCode, value: &Option<u32>) -> io::Result<()> {
        if let Some(value) = value {
            let size = mem::size_of::<u32>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u16(code as u16);
            cursor.put_u16(size as u16);
            cursor.put_u32(*value);
        }
        Ok(())
    }

    fn put_ipv6(
        cursor: &mut &mut [u8],
        code: OptionCode,
        value: &Option<Ipv6Addr>,
    ) -> io::Result<()> {
        if let Some(value) = value {
            let size = mem::size_of::<u128>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u16(code as u16);
            cursor.put_u16(size as u16);
            cursor.put_slice(&value.octets());
        }
        Ok(())
    }

    fn put_vec(cursor: &mut &mut [u8], code: OptionCode, value: &Option<Vec<u8>>) -> io::Result<()> {
        if let Some(value) = value {
            Self::put_raw(cursor, code, value)?;
        }
        Ok(())
    }

    fn put_vec_u16(
        cursor: &mut &mut [u8],
        code: OptionCode,
        value: &Option<Vec<u16>>,
    ) -> io::Result<()> {
        if let Some(value) = value {
            let size = value.len() * mem::size_of::<u16>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u16(code as u16);
            cursor.put_u16(size as u16);
            for element in value.iter() {
                cursor.put_u16(*element);
            }
        }
        Ok(())
    }

    fn put_vec_ipv6(
        cursor: &mut &mut [u8],
        code: OptionCode,
        value: &Option<Vec<Ipv6Addr>>,
    ) -> io::Result<()> {
        if let Some(value) = value {
            let size = value.len() * mem::size_of::<u128>();
            check_remaining!(cursor, SIZE_OPTION_PREFIX + size);
            cursor.put_u16(code as u16);
            cursor.put_u16(size as u16);
            for element in value.iter() {
                cursor.put_slice(&element.octets());
            }
        }
        Ok(())
    }

    /// Each domain is written as an uncompressed DNS encoded name with
    /// a terminal root label.
    fn put_domain_list(
        cursor: &mut &mut [u8],
        code: OptionCode,
        value: &Option<Vec<String>>,
    ) -> io::Result<()> {
        if let Some(value) = value {
            let mut payload = Vec::new();
            for domain in value.iter() {
                for label in domain.split('.').filter(|label| !label.is_empty()) {
                    if label.len() > SIZE_LABEL_MAXIMAL {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "Domain label is overlong",
                        ));
                    }
                    payload.put_u8(label.len() as u8);
                    payload.put_slice(label.as_bytes());
                }
                payload.put_u8(0);
            }
            Self::put_raw(cursor, code, &payload)?;
        }
        Ok(())
    }

    fn encode_ia_na(ia: &IaNa) -> io::Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(SIZE_IA_FIXED);
        payload.put_u32(ia.iaid);
        payload.put_u32(ia.t1);
        payload.put_u32(ia.t2);
        for address in ia.addresses.iter() {
            Self::append_raw(
                &mut payload,
                OptionCode::IaAddress,
                &Self::encode_ia_address(address)?,
            )?;
        }
        if let Some(ref status) = ia.status {
            Self::append_raw(&mut payload, OptionCode::StatusCode, &Self::encode_status(status))?;
        }
        Ok(payload)
    }

    fn encode_ia_ta(ia: &IaTa) -> io::Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(SIZE_IA_TA_FIXED);
        payload.put_u32(ia.iaid);
        for address in ia.addresses.iter() {
            Self::append_raw(
                &mut payload,
                OptionCode::IaAddress,
                &Self::encode_ia_address(address)?,
            )?;
        }
        if let Some(ref status) = ia.status {
            Self::append_raw(&mut payload, OptionCode::StatusCode, &Self::encode_status(status))?;
        }
        Ok(payload)
    }

    fn encode_ia_address(address: &IaAddress) -> io::Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(SIZE_IA_ADDRESS_FIXED);
        payload.put_slice(&address.address.octets());
        payload.put_u32(address.preferred_lifetime);
        payload.put_u32(address.valid_lifetime);
        if let Some(ref status) = address.status {
            Self::append_raw(&mut payload, OptionCode::StatusCode, &Self::encode_status(status))?;
        }
        Ok(payload)
    }

    fn encode_ia_pd(ia: &IaPd) -> io::Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(SIZE_IA_FIXED);
        payload.put_u32(ia.iaid);
        payload.put_u32(ia.t1);
        payload.put_u32(ia.t2);
        for prefix in ia.prefixes.iter() {
            Self::append_raw(
                &mut payload,
                OptionCode::IaPrefix,
                &Self::encode_ia_prefix(prefix)?,
            )?;
        }
        if let Some(ref status) = ia.status {
            Self::append_raw(&mut payload, OptionCode::StatusCode, &Self::encode_status(status))?;
        }
        Ok(payload)
    }

    fn encode_ia_prefix(prefix: &IaPrefix) -> io::Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(SIZE_IA_PREFIX_FIXED);
        payload.put_u32(prefix.preferred_lifetime);
        payload.put_u32(prefix.valid_lifetime);
        payload.put_u8(prefix.prefix_length);
        payload.put_slice(&prefix.prefix.octets());
        if let Some(ref exclude) = prefix.exclude {
            Self::append_raw(
                &mut payload,
                OptionCode::PdExclude,
                &Self::encode_pd_exclude(exclude, prefix.prefix_length)?,
            )?;
        }
        if let Some(ref status) = prefix.status {
            Self::append_raw(&mut payload, OptionCode::StatusCode, &Self::encode_status(status))?;
        }
        Ok(payload)
    }

    /// The subnet identifier bits between the delegated length and the
    /// excluded length are written left aligned.
    ///
    /// [RFC 6603](https://tools.ietf.org/html/rfc6603)
    fn encode_pd_exclude(exclude: &ExcludedPrefix, delegated_length: u8) -> io::Result<Vec<u8>> {
        const BITS_IN_BYTE: usize = 8;

        if exclude.prefix_length <= delegated_length || exclude.prefix_length > 128 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Excluded prefix does not extend the delegation",
            ));
        }
        let id_bits = (exclude.prefix_length - delegated_length) as usize;
        let id_octets = (id_bits + BITS_IN_BYTE - 1) / BITS_IN_BYTE;

        let bits = u128::from_be_bytes(exclude.prefix.octets()) << delegated_length;
        let mut payload = Vec::with_capacity(1 + id_octets);
        payload.put_u8(exclude.prefix_length);
        for index in 0..id_octets {
            payload.put_u8((bits >> (120 - BITS_IN_BYTE * index)) as u8);
        }
        Ok(payload)
    }

    fn encode_status(status: &Status) -> Vec<u8> {
        let mut payload = Vec::with_capacity(mem::size_of::<u16>() + status.message.len());
        payload.put_u16(status.code as u16);
        payload.put_slice(status.message.as_bytes());
        payload
    }

    fn append_raw(payload: &mut Vec<u8>, code: OptionCode, body: &[u8]) -> io::Result<()> {
        if body.len() > usize::from(u16::MAX) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Option payload is overlong",
            ));
        }
        payload.put_u16(code as u16);
        payload.put_u16(body.len() as u16);
        payload.put_slice(body);
        Ok(())
    }

    fn put_raw(cursor: &mut &mut [u8], code: OptionCode, payload: &[u8]) -> io::Result<()> {
        if payload.len() > usize::from(u16::MAX) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Option payload is overlong",
            ));
        }
        check_remaining!(cursor, SIZE_OPTION_PREFIX + payload.len());
        cursor.put_u16(code as u16);
        cursor.put_u16(payload.len() as u16);
        cursor.put_slice(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v6::{MessageType, Options};

    #[test]
    fn encodes_the_header_and_masks_the_transaction_id() {
        let message = Message {
            message_type: MessageType::Solicit,
            transaction_id: 0xffab_cdef,
            options: Options::default(),
        };

        let mut buffer = [0u8; 64];
        let written = message.to_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..written], &[0x01, 0xab, 0xcd, 0xef]);
    }

    #[test]
    fn writes_an_empty_rapid_commit_option() {
        let mut message = Message {
            message_type: MessageType::Solicit,
            transaction_id: 0x000001,
            options: Options::default(),
        };
        message.options.rapid_commit = true;

        let mut buffer = [0u8; 64];
        let written = message.to_bytes(&mut buffer).unwrap();
        assert_eq!(
            &buffer[..written],
            &[0x01, 0x00, 0x00, 0x01, 0x00, 0x0e, 0x00, 0x00]
        );
    }

    #[test]
    fn builds_the_rfc_6603_exclusion() {
        let delegated: Ipv6Addr = "2001:db8:dead:bee0::".parse().unwrap();
        let excluded: Ipv6Addr = "2001:db8:dead:beef::".parse().unwrap();

        let mut message = Message {
            message_type: MessageType::Reply,
            transaction_id: 0x000001,
            options: Options::default(),
        };
        message.options.ia_pd.push(IaPd {
            iaid: 1,
            t1: 1000,
            t2: 1600,
            prefixes: vec![IaPrefix {
                prefix: delegated,
                prefix_length: 59,
                preferred_lifetime: 3000,
                valid_lifetime: 4000,
                exclude: Some(ExcludedPrefix {
                    prefix: excluded,
                    prefix_length: 64,
                }),
                status: None,
            }],
            status: None,
        });

        let mut buffer = [0u8; 128];
        let written = message.to_bytes(&mut buffer).unwrap();
        assert!(buffer[..written]
            .windows(6)
            .any(|window| window == [0x00, 0x43, 0x00, 0x02, 64, 0x78]));

        let parsed = Message::from_bytes(&buffer[..written]).unwrap();
        assert_eq!(
            parsed.options.ia_pd[0].prefixes[0].exclude,
            Some(ExcludedPrefix {
                prefix: excluded,
                prefix_length: 64,
            })
        );
    }

    #[test]
    fn a_request_round_trips() {
        let mut message = Message {
            message_type: MessageType::Request,
            transaction_id: 0x00fa_ce01,
            options: Options::default(),
        };
        message.options.client_id = Some(vec![0x00, 0x03, 0x00, 0x01, 0, 1, 2, 3, 4, 5]);
        message.options.server_id = Some(vec![0xde, 0xad, 0xbe, 0xef]);
        message.options.ia_na.push(IaNa {
            iaid: 42,
            t1: 0,
            t2: 0,
            addresses: vec![IaAddress {
                address: "2001:db8::42".parse().unwrap(),
                preferred_lifetime: 3600,
                valid_lifetime: 7200,
                status: None,
            }],
            status: None,
        });
        message.options.option_request = Some(vec![23, 24, 82]);
        message.options.elapsed_time = Some(100);

        let mut buffer = [0u8; 256];
        let written = message.to_bytes(&mut buffer).unwrap();
        let parsed = Message::from_bytes(&buffer[..written]).unwrap();

        assert_eq!(parsed.message_type, MessageType::Request);
        assert_eq!(parsed.transaction_id, 0x00fa_ce01);
        assert_eq!(parsed.options.client_id, message.options.client_id);
        assert_eq!(parsed.options.server_id, message.options.server_id);
        assert_eq!(parsed.options.ia_na, message.options.ia_na);
        assert_eq!(parsed.options.option_request, Some(vec![23, 24, 82]));
        assert_eq!(parsed.options.elapsed_time, Some(100));
    }

    #[test]
    fn rejects_a_small_buffer() {
        let mut message = Message {
            message_type: MessageType::Solicit,
            transaction_id: 0x000001,
            options: Options::default(),
        };
        message.options.client_id = Some(vec![0u8; 10]);

        let mut buffer = [0u8; 8];
        assert!(message.to_bytes(&mut buffer).is_err());
    }
}
