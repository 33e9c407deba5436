use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::{fmt_payload, IpProtocol};
use std::fmt::{Debug, Formatter};
use std::net::Ipv4Addr;

const VERSION_IHL_OFFSET: usize = 0;
const TOS_OFFSET: usize = 1;
const TOTAL_LENGTH_OFFSET: usize = 2;
const IDENTIFICATION_OFFSET: usize = 4;
const FLAGS_AND_FRAGMENT_OFFSET_OFFSET: usize = 6;
const TIME_TO_LIVE_OFFSET: usize = 8;
const PROTOCOL_OFFSET: usize = 9;
const CHECKSUM_OFFSET: usize = 10;
const SOURCE_OFFSET: usize = 12;
const DESTINATION_OFFSET: usize = 16;

/// Represents an `IPv4` packet.
///
/// Raw `ICMP` sockets deliver the `IPv4` header in front of every received `ICMP` message; this
/// is how the reply TTL and the quoted datagram inside `ICMP` error messages are read.
///
/// Only read access is provided. The internal representation is held in network byte order
/// (big-endian) and all accessor methods return data in host byte order.
pub struct Ipv4Packet<'a> {
    buf: Buffer<'a>,
}

impl<'a> Ipv4Packet<'a> {
    /// A read-only view over a received packet.
    ///
    /// Fails if the buffer is shorter than the header length the packet declares.
    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        check_size(packet.len())?;
        let header_len = usize::from(packet[VERSION_IHL_OFFSET] & 0xf) * 4;
        if header_len > packet.len() {
            return Err(Error::InvalidHeaderLength(header_len, packet.len()));
        }
        Ok(Self {
            buf: Buffer::Immutable(packet),
        })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        20
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        self.buf.read(VERSION_IHL_OFFSET) >> 4
    }

    /// The header length in 32-bit words.
    #[must_use]
    pub fn get_header_length(&self) -> u8 {
        self.buf.read(VERSION_IHL_OFFSET) & 0xf
    }

    #[must_use]
    pub fn get_tos(&self) -> u8 {
        self.buf.read(TOS_OFFSET)
    }

    #[must_use]
    pub fn get_total_length(&self) -> u16 {
        u16::from_be_bytes(self.buf.get_bytes(TOTAL_LENGTH_OFFSET))
    }

    #[must_use]
    pub fn get_identification(&self) -> u16 {
        u16::from_be_bytes(self.buf.get_bytes(IDENTIFICATION_OFFSET))
    }

    #[must_use]
    pub fn get_flags_and_fragment_offset(&self) -> u16 {
        u16::from_be_bytes(self.buf.get_bytes(FLAGS_AND_FRAGMENT_OFFSET_OFFSET))
    }

    #[must_use]
    pub fn get_ttl(&self) -> u8 {
        self.buf.read(TIME_TO_LIVE_OFFSET)
    }

    #[must_use]
    pub fn get_protocol(&self) -> IpProtocol {
        IpProtocol::from(self.buf.read(PROTOCOL_OFFSET))
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        u16::from_be_bytes(self.buf.get_bytes(CHECKSUM_OFFSET))
    }

    #[must_use]
    pub fn get_source(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes::<4>(SOURCE_OFFSET))
    }

    #[must_use]
    pub fn get_destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes::<4>(DESTINATION_OFFSET))
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// The header bytes, including any options.
    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.buf.as_slice()[..self.header_len()]
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_slice()[self.header_len()..]
    }

    fn header_len(&self) -> usize {
        (usize::from(self.get_header_length()) * 4)
            .clamp(Self::minimum_packet_size(), self.buf.as_slice().len())
    }
}

fn check_size(len: usize) -> Result<()> {
    if len >= Ipv4Packet::minimum_packet_size() {
        Ok(())
    } else {
        Err(Error::InsufficientPacketBuffer(
            String::from("Ipv4Packet"),
            Ipv4Packet::minimum_packet_size(),
            len,
        ))
    }
}

impl Debug for Ipv4Packet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv4Packet")
            .field("version", &self.get_version())
            .field("header_length", &self.get_header_length())
            .field("tos", &self.get_tos())
            .field("total_length", &self.get_total_length())
            .field("identification", &self.get_identification())
            .field(
                "flags_and_fragment_offset",
                &self.get_flags_and_fragment_offset(),
            )
            .field("ttl", &self.get_ttl())
            .field("protocol", &self.get_protocol())
            .field("checksum", &self.get_checksum())
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_echo_reply_view() -> anyhow::Result<()> {
        let buf = hex!(
            "45 00 00 1c 9b 2e 00 00 37 01 6c 8d 08 08 08 08 c0 a8 01 15
             00 00 fb 23 04 d2 00 0a"
        );
        let packet = Ipv4Packet::new_view(&buf)?;
        assert_eq!(4, packet.get_version());
        assert_eq!(5, packet.get_header_length());
        assert_eq!(0, packet.get_tos());
        assert_eq!(28, packet.get_total_length());
        assert_eq!(0x9b2e, packet.get_identification());
        assert_eq!(0, packet.get_flags_and_fragment_offset());
        assert_eq!(55, packet.get_ttl());
        assert_eq!(IpProtocol::Icmp, packet.get_protocol());
        assert_eq!(0x6c8d, packet.get_checksum());
        assert_eq!(Ipv4Addr::new(8, 8, 8, 8), packet.get_source());
        assert_eq!(Ipv4Addr::new(192, 168, 1, 21), packet.get_destination());
        assert_eq!(20, packet.header().len());
        assert_eq!(&hex!("00 00 fb 23 04 d2 00 0a"), packet.payload());
        Ok(())
    }

    #[test]
    fn test_header_with_options() -> anyhow::Result<()> {
        let mut buf = [0_u8; 28];
        buf[0] = 0x46;
        buf[24..].copy_from_slice(&[0xDA; 4]);
        let packet = Ipv4Packet::new_view(&buf)?;
        assert_eq!(6, packet.get_header_length());
        assert_eq!(24, packet.header().len());
        assert_eq!(&[0xDA; 4], packet.payload());
        Ok(())
    }

    #[test]
    fn test_new_view_insufficient_buffer() {
        const SIZE: usize = Ipv4Packet::minimum_packet_size();
        let buf = [0x45_u8; SIZE - 1];
        let err = Ipv4Packet::new_view(&buf).unwrap_err();
        assert_eq!(
            Error::InsufficientPacketBuffer(String::from("Ipv4Packet"), SIZE, SIZE - 1),
            err
        );
    }

    #[test]
    fn test_new_view_truncated_options() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        buf[0] = 0x4f;
        let err = Ipv4Packet::new_view(&buf).unwrap_err();
        assert_eq!(Error::InvalidHeaderLength(60, 20), err);
    }
}
