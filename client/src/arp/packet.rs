//! The Ethernet IPv4 ARP packet codec.

use std::io;
use std::net::Ipv4Addr;

use bytes::{Buf, BufMut};
use eui48::{MacAddress, EUI48LEN};

/// The EtherType carried by ARP frames.
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// The size of an Ethernet IPv4 ARP packet in bytes.
pub const SIZE_PACKET: usize = 28;

const HARDWARE_TYPE_ETHERNET: u16 = 1;
const PROTOCOL_TYPE_IPV4: u16 = 0x0800;
const SIZE_PROTOCOL_ADDRESS: u8 = 4;

/// Checks if there is enough data in the buffer.
macro_rules! check_remaining(
    ($cursor:expr, $distance:expr) => (
        if $cursor.remaining() < $distance {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Packet is truncated"));
        }
    )
);

/// ARP operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Unknown = -1,
    Request = 1,
    Reply = 2,
}

impl From<u16> for Operation {
    fn from(value: u16) -> Self {
        use self::Operation::*;
        match value {
            1 => Request,
            2 => Reply,
            _ => Unknown,
        }
    }
}

/// An Ethernet IPv4 ARP packet without its frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub operation: Operation,
    pub sender_hardware: MacAddress,
    pub sender_protocol: Ipv4Addr,
    pub target_hardware: MacAddress,
    pub target_protocol: Ipv4Addr,
}

impl Packet {
    /// A probe asks for `candidate` with an unspecified sender address, so
    /// it never pollutes neighbor caches.
    pub fn probe(sender: MacAddress, candidate: Ipv4Addr) -> Self {
        Self {
            operation: Operation::Request,
            sender_hardware: sender,
            sender_protocol: Ipv4Addr::UNSPECIFIED,
            target_hardware: MacAddress::nil(),
            target_protocol: candidate,
        }
    }

    /// An announcement claims `address` as both sender and target.
    pub fn announce(sender: MacAddress, address: Ipv4Addr) -> Self {
        Self {
            operation: Operation::Request,
            sender_hardware: sender,
            sender_protocol: address,
            target_hardware: MacAddress::nil(),
            target_protocol: address,
        }
    }

    /// ARP packet deserialization.
    ///
    /// # Errors
    /// `io::Error` if the packet is truncated or not an Ethernet IPv4 one.
    pub fn from_bytes(src: &[u8]) -> io::Result<Self> {
        let mut cursor = io::Cursor::new(src);
        check_remaining!(cursor, SIZE_PACKET);

        if cursor.get_u16() != HARDWARE_TYPE_ETHERNET || cursor.get_u16() != PROTOCOL_TYPE_IPV4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Not an Ethernet IPv4 packet",
            ));
        }
        if cursor.get_u8() != EUI48LEN as u8 || cursor.get_u8() != SIZE_PROTOCOL_ADDRESS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Address length octets are invalid",
            ));
        }
        let operation = cursor.get_u16().into();

        let mut hardware = [0u8; EUI48LEN];
        cursor.copy_to_slice(&mut hardware);
        let sender_hardware = MacAddress::new(hardware);
        let sender_protocol = Ipv4Addr::from(cursor.get_u32());
        let mut hardware = [0u8; EUI48LEN];
        cursor.copy_to_slice(&mut hardware);
        let target_hardware = MacAddress::new(hardware);
        let target_protocol = Ipv4Addr::from(cursor.get_u32());

        Ok(Self {
            operation,
            sender_hardware,
            sender_protocol,
            target_hardware,
            target_protocol,
        })
    }

    /// ARP packet serialization.
    ///
    /// # Errors
    /// `io::Error` if the buffer is too small.
    pub fn to_bytes(&self, dst: &mut [u8]) -> io::Result<usize> {
        let mut cursor = dst;
        if cursor.remaining_mut() < SIZE_PACKET {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Buffer is too small",
            ));
        }
        cursor.put_u16(HARDWARE_TYPE_ETHERNET);
        cursor.put_u16(PROTOCOL_TYPE_IPV4);
        cursor.put_u8(EUI48LEN as u8);
        cursor.put_u8(SIZE_PROTOCOL_ADDRESS);
        cursor.put_u16(self.operation as u16);
        cursor.put_slice(self.sender_hardware.as_bytes());
        cursor.put_u32(u32::from(self.sender_protocol));
        cursor.put_slice(self.target_hardware.as_bytes());
        cursor.put_u32(u32::from(self.target_protocol));
        Ok(SIZE_PACKET)
    }
}
