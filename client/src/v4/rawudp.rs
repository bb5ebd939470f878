//! IPv4 and UDP encapsulation for messages sent over the raw socket.
//!
//! Before an address is bound the kernel UDP stack cannot source
//! packets from `0.0.0.0`, so those messages go out over the link
//! socket with hand built headers.

use std::net::SocketAddrV4;

use bytes::BufMut;

use dhcp_protocol::v4::constants::{SIZE_HEADER_IP, SIZE_HEADER_UDP};

const VERSION_AND_HEADER_LENGTH: u8 = 0x45;
const TIME_TO_LIVE: u8 = 64;
const PROTOCOL_UDP: u8 = 17;

/// Wraps `payload` into UDP and IPv4 headers with valid checksums.
pub fn datagram(source: SocketAddrV4, destination: SocketAddrV4, payload: &[u8]) -> Vec<u8> {
    let total = SIZE_HEADER_IP + SIZE_HEADER_UDP + payload.len();
    let mut buffer = Vec::with_capacity(total);

    buffer.put_u8(VERSION_AND_HEADER_LENGTH);
    buffer.put_u8(0);
    buffer.put_u16(total as u16);
    buffer.put_u32(0);
    buffer.put_u8(TIME_TO_LIVE);
    buffer.put_u8(PROTOCOL_UDP);
    buffer.put_u16(0);
    buffer.put_slice(&source.ip().octets());
    buffer.put_slice(&destination.ip().octets());
    let header_checksum = checksum(&buffer[..SIZE_HEADER_IP]);
    buffer[10..12].copy_from_slice(&header_checksum.to_be_bytes());

    buffer.put_u16(source.port());
    buffer.put_u16(destination.port());
    buffer.put_u16((SIZE_HEADER_UDP + payload.len()) as u16);
    buffer.put_u16(0);
    buffer.put_slice(payload);
    let segment_checksum = udp_checksum(&source, &destination, &buffer[SIZE_HEADER_IP..]);
    buffer[SIZE_HEADER_IP + 6..SIZE_HEADER_IP + 8]
        .copy_from_slice(&segment_checksum.to_be_bytes());

    buffer
}

/// The UDP checksum over the RFC 768 pseudo header and the segment.
/// A computed zero is transmitted as all ones.
fn udp_checksum(source: &SocketAddrV4, destination: &SocketAddrV4, segment: &[u8]) -> u16 {
    let mut pseudo = Vec::with_capacity(12 + segment.len());
    pseudo.put_slice(&source.ip().octets());
    pseudo.put_slice(&destination.ip().octets());
    pseudo.put_u8(0);
    pseudo.put_u8(PROTOCOL_UDP);
    pseudo.put_u16(segment.len() as u16);
    pseudo.put_slice(segment);
    match checksum(&pseudo) {
        0 => 0xFFFF,
        value => value,
    }
}

/// The RFC 1071 ones' complement sum. An odd trailing octet is padded
/// with zero.
fn checksum(data: &[u8]) -> u16 {
    let mut sum = 0u32;
    for chunk in data.chunks(2) {
        let word = if chunk.len() == 2 {
            u16::from_be_bytes([chunk[0], chunk[1]])
        } else {
            u16::from_be_bytes([chunk[0], 0])
        };
        sum += u32::from(word);
    }
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    #[test]
    fn the_reference_sum_matches() {
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum(&data), 0x220d);
    }

    #[test]
    fn a_datagram_verifies_itself() {
        let source = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 68);
        let destination = SocketAddrV4::new(Ipv4Addr::BROADCAST, 67);
        let datagram = datagram(source, destination, &[0xde, 0xad, 0xbe, 0xef, 0x01]);

        assert_eq!(checksum(&datagram[..SIZE_HEADER_IP]), 0);
        assert_eq!(
            udp_checksum(&source, &destination, &datagram[SIZE_HEADER_IP..]),
            0xFFFF
        );
    }

    #[test]
    fn headers_carry_lengths_and_ports() {
        let source = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 40), 68);
        let destination = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 67);
        let payload = [0u8; 300];
        let datagram = datagram(source, destination, &payload);

        assert_eq!(datagram.len(), SIZE_HEADER_IP + SIZE_HEADER_UDP + 300);
        assert_eq!(
            u16::from_be_bytes([datagram[2], datagram[3]]) as usize,
            datagram.len()
        );
        assert_eq!(datagram[8], TIME_TO_LIVE);
        assert_eq!(datagram[9], PROTOCOL_UDP);
        assert_eq!(u16::from_be_bytes([datagram[20], datagram[21]]), 68);
        assert_eq!(u16::from_be_bytes([datagram[22], datagram[23]]), 67);
        assert_eq!(
            u16::from_be_bytes([datagram[24], datagram[25]]) as usize,
            SIZE_HEADER_UDP + 300
        );
    }
}
