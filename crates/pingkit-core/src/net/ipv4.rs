use crate::config::PrivilegeMode;
use crate::constants::{ICMP_HEADER_SIZE, MAX_PACKET_SIZE, RECV_BUFFER_SIZE};
use crate::error::{Error, ErrorKind, Result};
use crate::net::common::ErrorMapper;
use crate::net::socket::Socket;
use crate::probe::{Probe, Response, ResponseData};
use crate::types::{PacketSize, PayloadPattern, Sequence, TraceId};
use pingkit_packet::checksum::icmp_ipv4_checksum;
use pingkit_packet::icmpv4::destination_unreachable::DestinationUnreachablePacket;
use pingkit_packet::icmpv4::echo_reply::EchoReplyPacket;
use pingkit_packet::icmpv4::echo_request::EchoRequestPacket;
use pingkit_packet::icmpv4::time_exceeded::TimeExceededPacket;
use pingkit_packet::icmpv4::{IcmpCode, IcmpPacket, IcmpTimeExceededCode, IcmpType};
use pingkit_packet::ipv4::Ipv4Packet;
use pingkit_packet::IpProtocol;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;
use tracing::instrument;

/// The `IPv4` version nibble which starts every `IPv4` header.
const IPV4_VERSION: u8 = 4;

/// `IPv4` `ICMP` echo probing.
#[derive(Debug)]
pub struct Ipv4 {
    pub dest_addr: Ipv4Addr,
    pub identifier: TraceId,
    pub data_size: PacketSize,
    pub payload_pattern: PayloadPattern,
    pub privilege_mode: PrivilegeMode,
}

impl Ipv4 {
    /// Send an `ICMP` echo request.
    ///
    /// Host and network unreachable send failures are reported as [`Error::ProbeFailed`].
    #[instrument(skip(self, socket), level = "trace")]
    pub fn dispatch_icmp_probe<S: Socket>(&self, socket: &mut S, probe: Probe) -> Result<()> {
        let mut buf = [0_u8; MAX_PACKET_SIZE];
        let echo_request = self.make_echo_request_icmp_packet(&mut buf, probe.sequence)?;
        let remote_addr = SocketAddr::new(IpAddr::V4(self.dest_addr), 0);
        socket.set_ttl(u32::from(probe.ttl.0))?;
        socket
            .send_to(echo_request.packet(), remote_addr)
            .map_err(Error::IoError)
            .map_err(|err| ErrorMapper::probe_failed(err, ErrorKind::HostUnreachable))
            .map_err(|err| ErrorMapper::probe_failed(err, ErrorKind::NetUnreachable))?;
        Ok(())
    }

    /// Receive the next response to one of our echo requests.
    ///
    /// Packets which are malformed, or which are not a response to an echo request we sent, are
    /// skipped.  Returns `None` once no more packets are available to read.
    #[instrument(skip(self, socket), level = "trace")]
    pub fn recv_icmp_probe<S: Socket>(&self, socket: &mut S) -> Result<Option<Response>> {
        let mut buf = [0_u8; RECV_BUFFER_SIZE];
        loop {
            match socket.recv_from(&mut buf) {
                Ok((bytes_read, addr)) => {
                    let recv = Instant::now();
                    match self.extract_probe_resp(&buf[..bytes_read], addr, recv) {
                        Ok(Some(resp)) => return Ok(Some(resp)),
                        Ok(None) => {}
                        Err(err) => tracing::trace!(%err, "skipping malformed packet"),
                    }
                }
                Err(err) => match err.kind() {
                    ErrorKind::Std(io::ErrorKind::WouldBlock) => return Ok(None),
                    ErrorKind::Std(io::ErrorKind::Interrupted) => {}
                    _ => return Err(Error::IoError(err)),
                },
            }
        }
    }

    fn make_echo_request_icmp_packet<'a>(
        &self,
        buf: &'a mut [u8],
        sequence: Sequence,
    ) -> Result<EchoRequestPacket<'a>> {
        let data_size = usize::from(self.data_size.0);
        let packet_size = ICMP_HEADER_SIZE + data_size;
        if packet_size > MAX_PACKET_SIZE {
            return Err(Error::InvalidPacketSize(packet_size));
        }
        let payload = [self.payload_pattern.0; MAX_PACKET_SIZE];
        let mut icmp = EchoRequestPacket::new(&mut buf[..packet_size])?;
        icmp.set_icmp_type(IcmpType::EchoRequest);
        icmp.set_icmp_code(IcmpCode(0));
        icmp.set_identifier(self.identifier.0);
        icmp.set_sequence(sequence.0);
        icmp.set_payload(&payload[..data_size]);
        icmp.set_checksum(icmp_ipv4_checksum(icmp.packet()));
        Ok(icmp)
    }

    /// Raw sockets deliver the `IPv4` header whereas datagram sockets may not, depending on the
    /// platform.  None of the `ICMP` types we accept can be mistaken for the `IPv4` version nibble.
    fn extract_probe_resp(
        &self,
        bytes: &[u8],
        addr: Option<SocketAddr>,
        recv: Instant,
    ) -> Result<Option<Response>> {
        if bytes.first().is_some_and(|b| b >> 4 == IPV4_VERSION) {
            let ipv4 = Ipv4Packet::new_view(bytes)?;
            if ipv4.get_protocol() != IpProtocol::Icmp {
                return Ok(None);
            }
            self.extract_icmp_resp(ipv4.payload(), ipv4.get_source(), Some(ipv4.get_ttl()), recv)
        } else {
            let src = match addr {
                Some(SocketAddr::V4(addr)) => *addr.ip(),
                _ => self.dest_addr,
            };
            self.extract_icmp_resp(bytes, src, None, recv)
        }
    }

    fn extract_icmp_resp(
        &self,
        bytes: &[u8],
        src: Ipv4Addr,
        ttl: Option<u8>,
        recv: Instant,
    ) -> Result<Option<Response>> {
        let icmp_v4 = IcmpPacket::new_view(bytes)?;
        let icmp_type = icmp_v4.get_icmp_type();
        let icmp_code = icmp_v4.get_icmp_code();
        Ok(match icmp_type {
            IcmpType::EchoReply => {
                let packet = EchoReplyPacket::new_view(icmp_v4.packet())?;
                self.check_identifier(packet.get_identifier()).then(|| {
                    let seq = Sequence(packet.get_sequence());
                    Response::EchoReply(ResponseData::new(recv, src, seq, ttl))
                })
            }
            IcmpType::TimeExceeded => {
                if IcmpTimeExceededCode::from(icmp_code) == IcmpTimeExceededCode::TtlExpired {
                    let packet = TimeExceededPacket::new_view(icmp_v4.packet())?;
                    self.extract_echo_request(packet.payload())?.map(|seq| {
                        Response::TimeExceeded(ResponseData::new(recv, src, seq, ttl), icmp_code)
                    })
                } else {
                    None
                }
            }
            IcmpType::DestinationUnreachable => {
                let packet = DestinationUnreachablePacket::new_view(icmp_v4.packet())?;
                self.extract_echo_request(packet.payload())?.map(|seq| {
                    Response::DestinationUnreachable(
                        ResponseData::new(recv, src, seq, ttl),
                        icmp_code,
                    )
                })
            }
            IcmpType::EchoRequest | IcmpType::Other(_) => None,
        })
    }

    /// Extract the sequence of our echo request quoted by an `ICMP` error message.
    fn extract_echo_request(&self, quoted: &[u8]) -> Result<Option<Sequence>> {
        let nested_ipv4 = Ipv4Packet::new_view(quoted)?;
        if nested_ipv4.get_protocol() != IpProtocol::Icmp {
            return Ok(None);
        }
        let nested_icmp = EchoRequestPacket::new_view(nested_ipv4.payload())?;
        if nested_icmp.get_icmp_type() != IcmpType::EchoRequest {
            return Ok(None);
        }
        Ok(self
            .check_identifier(nested_icmp.get_identifier())
            .then_some(Sequence(nested_icmp.get_sequence())))
    }

    /// The kernel assigns the identifier of datagram `ICMP` sockets and only delivers matching
    /// replies, so it is only checked for raw sockets.
    fn check_identifier(&self, identifier: u16) -> bool {
        match self.privilege_mode {
            PrivilegeMode::Privileged => identifier == self.identifier.0,
            PrivilegeMode::Unprivileged => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IoError, IoOperation, IoResult};
    use crate::mocket_recv_from;
    use crate::net::socket::MockSocket;
    use crate::types::TimeToLive;
    use hex_literal::hex;
    use mockall::predicate;
    use std::net::SocketAddrV4;

    const TARGET: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const TARGET_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(TARGET, 0));
    const HOP_ADDR: SocketAddr =
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(172, 16, 0, 254), 0));

    fn ipv4(privilege_mode: PrivilegeMode) -> Ipv4 {
        Ipv4 {
            dest_addr: TARGET,
            identifier: TraceId(1234),
            data_size: PacketSize(4),
            payload_pattern: PayloadPattern(0xDA),
            privilege_mode,
        }
    }

    fn would_block() -> IoResult<(usize, Option<SocketAddr>)> {
        Err(IoError::Other(
            io::Error::from(io::ErrorKind::WouldBlock),
            IoOperation::RecvFrom,
        ))
    }

    #[test]
    fn test_dispatch_icmp_probe() -> anyhow::Result<()> {
        let expected_send_to_buf = hex!("08 00 3d 6e 04 d2 00 0a da da da da");
        let mut mocket = MockSocket::new();
        mocket
            .expect_set_ttl()
            .with(predicate::eq(64))
            .times(1)
            .returning(|_| Ok(()));
        mocket
            .expect_send_to()
            .with(
                predicate::eq(expected_send_to_buf),
                predicate::eq(TARGET_ADDR),
            )
            .times(1)
            .returning(|_, _| Ok(()));
        let probe = Probe::new(Sequence(10), TimeToLive(64));
        ipv4(PrivilegeMode::Privileged).dispatch_icmp_probe(&mut mocket, probe)?;
        Ok(())
    }

    #[test]
    fn test_dispatch_icmp_probe_no_data() -> anyhow::Result<()> {
        let expected_send_to_buf = hex!("08 00 f3 23 04 d2 00 0a");
        let mut mocket = MockSocket::new();
        mocket.expect_set_ttl().times(1).returning(|_| Ok(()));
        mocket
            .expect_send_to()
            .with(
                predicate::eq(expected_send_to_buf),
                predicate::eq(TARGET_ADDR),
            )
            .times(1)
            .returning(|_, _| Ok(()));
        let ipv4 = Ipv4 {
            data_size: PacketSize(0),
            ..ipv4(PrivilegeMode::Privileged)
        };
        ipv4.dispatch_icmp_probe(&mut mocket, Probe::new(Sequence(10), TimeToLive(128)))?;
        Ok(())
    }

    #[test]
    fn test_dispatch_icmp_probe_invalid_packet_size() {
        let mut mocket = MockSocket::new();
        mocket.expect_send_to().never();
        let ipv4 = Ipv4 {
            data_size: PacketSize(505),
            ..ipv4(PrivilegeMode::Privileged)
        };
        let err = ipv4
            .dispatch_icmp_probe(&mut mocket, Probe::new(Sequence(0), TimeToLive(64)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPacketSize(513)));
    }

    #[test]
    fn test_dispatch_icmp_probe_host_unreachable() {
        let mut mocket = MockSocket::new();
        mocket.expect_set_ttl().returning(|_| Ok(()));
        mocket.expect_send_to().times(1).returning(|_, addr| {
            Err(IoError::SendTo(
                io::Error::from(ErrorKind::HostUnreachable),
                addr,
            ))
        });
        let err = ipv4(PrivilegeMode::Privileged)
            .dispatch_icmp_probe(&mut mocket, Probe::new(Sequence(0), TimeToLive(64)))
            .unwrap_err();
        assert!(matches!(err, Error::ProbeFailed(_)));
    }

    #[test]
    fn test_dispatch_icmp_probe_permission_denied() {
        let mut mocket = MockSocket::new();
        mocket.expect_set_ttl().returning(|_| Ok(()));
        mocket.expect_send_to().times(1).returning(|_, addr| {
            Err(IoError::SendTo(
                io::Error::from(io::ErrorKind::PermissionDenied),
                addr,
            ))
        });
        let err = ipv4(PrivilegeMode::Privileged)
            .dispatch_icmp_probe(&mut mocket, Probe::new(Sequence(0), TimeToLive(64)))
            .unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }

    #[test]
    fn test_recv_echo_reply_raw() -> anyhow::Result<()> {
        let expected_recv_from_buf = hex!(
            "
            45 00 00 20 12 34 00 00 39 01 a3 fe 0a 00 00 01
            c0 a8 01 02 00 00 45 6e 04 d2 00 0a da da da da
            "
        );
        let mut mocket = MockSocket::new();
        mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(expected_recv_from_buf, TARGET_ADDR));
        let resp = ipv4(PrivilegeMode::Privileged)
            .recv_icmp_probe(&mut mocket)?
            .ok_or_else(|| anyhow::anyhow!("missing response"))?;
        let Response::EchoReply(data) = resp else {
            panic!("expected EchoReply")
        };
        assert_eq!(TARGET, data.addr);
        assert_eq!(Sequence(10), data.sequence);
        assert_eq!(Some(57), data.ttl);
        Ok(())
    }

    #[test]
    fn test_recv_echo_reply_dgram() -> anyhow::Result<()> {
        let expected_recv_from_buf = hex!("00 00 45 6e 04 d2 00 0a da da da da");
        let mut mocket = MockSocket::new();
        mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(expected_recv_from_buf, TARGET_ADDR));
        let resp = ipv4(PrivilegeMode::Unprivileged)
            .recv_icmp_probe(&mut mocket)?
            .ok_or_else(|| anyhow::anyhow!("missing response"))?;
        let Response::EchoReply(data) = resp else {
            panic!("expected EchoReply")
        };
        assert_eq!(TARGET, data.addr);
        assert_eq!(Sequence(10), data.sequence);
        assert_eq!(None, data.ttl);
        Ok(())
    }

    #[test]
    fn test_recv_echo_reply_dgram_ignores_identifier() -> anyhow::Result<()> {
        let expected_recv_from_buf = hex!("00 00 34 12 16 2e 00 0a da da da da");
        let mut mocket = MockSocket::new();
        mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(expected_recv_from_buf, TARGET_ADDR));
        let resp = ipv4(PrivilegeMode::Unprivileged).recv_icmp_probe(&mut mocket)?;
        assert!(matches!(resp, Some(Response::EchoReply(_))));
        Ok(())
    }

    #[test]
    fn test_recv_skips_foreign_identifier() -> anyhow::Result<()> {
        let foreign = hex!(
            "
            45 00 00 20 12 34 00 00 39 01 a3 fe 0a 00 00 01
            c0 a8 01 02 00 00 34 12 16 2e 00 0a da da da da
            "
        );
        let mut seq = mockall::Sequence::new();
        let mut mocket = MockSocket::new();
        mocket
            .expect_recv_from()
            .times(1)
            .in_sequence(&mut seq)
            .returning(mocket_recv_from!(foreign, TARGET_ADDR));
        mocket
            .expect_recv_from()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| would_block());
        let resp = ipv4(PrivilegeMode::Privileged).recv_icmp_probe(&mut mocket)?;
        assert_eq!(None, resp);
        Ok(())
    }

    #[test]
    fn test_recv_skips_malformed_packet() -> anyhow::Result<()> {
        let truncated = hex!("45 00 00 20 12 34 00 00 39 01 a3 fe");
        let reply = hex!("00 00 45 6e 04 d2 00 0a da da da da");
        let mut seq = mockall::Sequence::new();
        let mut mocket = MockSocket::new();
        mocket
            .expect_recv_from()
            .times(1)
            .in_sequence(&mut seq)
            .returning(mocket_recv_from!(truncated, TARGET_ADDR));
        mocket
            .expect_recv_from()
            .times(1)
            .in_sequence(&mut seq)
            .returning(mocket_recv_from!(reply, TARGET_ADDR));
        let resp = ipv4(PrivilegeMode::Privileged).recv_icmp_probe(&mut mocket)?;
        assert!(matches!(resp, Some(Response::EchoReply(_))));
        Ok(())
    }

    #[test]
    fn test_recv_skips_own_echo_request() -> anyhow::Result<()> {
        let request = hex!(
            "
            45 00 00 20 12 34 00 00 40 01 00 00 c0 a8 01 02
            0a 00 00 01 08 00 3d 6e 04 d2 00 0a da da da da
            "
        );
        let mut seq = mockall::Sequence::new();
        let mut mocket = MockSocket::new();
        mocket
            .expect_recv_from()
            .times(1)
            .in_sequence(&mut seq)
            .returning(mocket_recv_from!(request, TARGET_ADDR));
        mocket
            .expect_recv_from()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| would_block());
        let resp = ipv4(PrivilegeMode::Privileged).recv_icmp_probe(&mut mocket)?;
        assert_eq!(None, resp);
        Ok(())
    }

    #[test]
    fn test_recv_time_exceeded() -> anyhow::Result<()> {
        let expected_recv_from_buf = hex!(
            "
            45 00 00 38 12 34 00 00 fe 01 3b d8 ac 10 00 fe
            c0 a8 01 02 0b 00 aa b5 00 00 00 00 45 00 00 1c
            43 21 00 00 01 01 ab 15 c0 a8 01 02 0a 00 00 01
            08 00 3d 6e 04 d2 00 0a
            "
        );
        let mut mocket = MockSocket::new();
        mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(expected_recv_from_buf, HOP_ADDR));
        let resp = ipv4(PrivilegeMode::Privileged)
            .recv_icmp_probe(&mut mocket)?
            .ok_or_else(|| anyhow::anyhow!("missing response"))?;
        let Response::TimeExceeded(data, code) = resp else {
            panic!("expected TimeExceeded")
        };
        assert_eq!(Ipv4Addr::new(172, 16, 0, 254), data.addr);
        assert_eq!(Sequence(10), data.sequence);
        assert_eq!(Some(254), data.ttl);
        assert_eq!(IcmpCode(0), code);
        Ok(())
    }

    #[test]
    fn test_recv_destination_unreachable() -> anyhow::Result<()> {
        let expected_recv_from_buf = hex!(
            "
            45 00 00 38 12 34 00 00 fe 01 3b d8 ac 10 00 fe
            c0 a8 01 02 03 01 b2 b4 00 00 00 00 45 00 00 1c
            43 21 00 00 3c 01 70 15 c0 a8 01 02 0a 00 00 01
            08 00 3d 6e 04 d2 00 0a
            "
        );
        let mut mocket = MockSocket::new();
        mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(expected_recv_from_buf, HOP_ADDR));
        let resp = ipv4(PrivilegeMode::Privileged)
            .recv_icmp_probe(&mut mocket)?
            .ok_or_else(|| anyhow::anyhow!("missing response"))?;
        let Response::DestinationUnreachable(data, code) = resp else {
            panic!("expected DestinationUnreachable")
        };
        assert_eq!(Sequence(10), data.sequence);
        assert_eq!(IcmpCode(1), code);
        Ok(())
    }

    #[test]
    fn test_recv_would_block() -> anyhow::Result<()> {
        let mut mocket = MockSocket::new();
        mocket
            .expect_recv_from()
            .times(1)
            .returning(|_| would_block());
        let resp = ipv4(PrivilegeMode::Privileged).recv_icmp_probe(&mut mocket)?;
        assert_eq!(None, resp);
        Ok(())
    }

    #[test]
    fn test_recv_error() {
        let mut mocket = MockSocket::new();
        mocket.expect_recv_from().times(1).returning(|_| {
            Err(IoError::Other(
                io::Error::from(io::ErrorKind::ConnectionReset),
                IoOperation::RecvFrom,
            ))
        });
        let resp = ipv4(PrivilegeMode::Privileged).recv_icmp_probe(&mut mocket);
        assert!(matches!(resp, Err(Error::IoError(_))));
    }
}
