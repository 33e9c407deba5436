use crate::config::ChannelConfig;
use crate::constants::{ICMP_HEADER_SIZE, MAX_PACKET_SIZE};
use crate::error::{Error, Result};
use crate::net::ipv4::Ipv4;
use crate::net::socket::Socket;
use crate::net::Network;
use crate::probe::{Probe, Response};
use tracing::instrument;

/// A channel for sending and receiving `ICMP` echo probes for a single job.
pub struct Channel<S: Socket> {
    socket: S,
    ipv4: Ipv4,
}

impl<S: Socket> Channel<S> {
    /// Create a `Channel`.
    ///
    /// In privileged mode this operation requires the `CAP_NET_RAW` capability on Linux.
    #[instrument(skip_all, level = "trace")]
    pub fn connect(config: &ChannelConfig) -> Result<Self> {
        tracing::debug!(?config);
        let packet_size = ICMP_HEADER_SIZE + usize::from(config.data_size.0);
        if packet_size > MAX_PACKET_SIZE {
            return Err(Error::InvalidPacketSize(packet_size));
        }
        let raw = !config.privilege_mode.is_unprivileged();
        let socket = S::new_icmp_socket_ipv4(raw)?;
        Ok(Self::new(socket, config))
    }

    fn new(socket: S, config: &ChannelConfig) -> Self {
        Self {
            socket,
            ipv4: Ipv4 {
                dest_addr: config.target_addr,
                identifier: config.identifier,
                data_size: config.data_size,
                payload_pattern: config.payload_pattern,
                privilege_mode: config.privilege_mode,
            },
        }
    }
}

impl<S: Socket> Network for Channel<S> {
    fn send_probe(&mut self, probe: Probe) -> Result<()> {
        self.ipv4.dispatch_icmp_probe(&mut self.socket, probe)
    }

    fn recv_probe(&mut self) -> Result<Option<Response>> {
        self.ipv4.recv_icmp_probe(&mut self.socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PingConfig, PrivilegeMode};
    use crate::error::{IoError, IoOperation, IoResult};
    use crate::mocket_recv_from;
    use crate::net::socket::MockSocket;
    use crate::types::{PacketSize, Sequence, TimeToLive, TraceId};
    use hex_literal::hex;
    use std::io;
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    const TARGET: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

    fn config(data_size: u16) -> ChannelConfig {
        let config = PingConfig {
            data_size: PacketSize(data_size),
            ..PingConfig::default()
        };
        ChannelConfig::new(PrivilegeMode::Privileged, TARGET, TraceId(1234), &config)
    }

    #[test]
    fn test_connect_invalid_packet_size() {
        let channel = Channel::<MockSocket>::connect(&config(505));
        assert!(matches!(channel, Err(Error::InvalidPacketSize(513))));
    }

    #[test]
    fn test_send_and_recv() -> anyhow::Result<()> {
        let addr = SocketAddr::V4(SocketAddrV4::new(TARGET, 0));
        let mut mocket = MockSocket::new();
        mocket.expect_set_ttl().times(1).returning(|_| Ok(()));
        mocket
            .expect_send_to()
            .times(1)
            .returning(|buf: &[u8], _| {
                assert_eq!(8 + 4, buf.len());
                Ok(())
            });
        let mut seq = mockall::Sequence::new();
        mocket
            .expect_recv_from()
            .times(1)
            .in_sequence(&mut seq)
            .returning(mocket_recv_from!(
                hex!("00 00 45 6e 04 d2 00 0a da da da da"),
                addr
            ));
        mocket
            .expect_recv_from()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| -> IoResult<(usize, Option<SocketAddr>)> {
                Err(IoError::Other(
                    io::Error::from(io::ErrorKind::WouldBlock),
                    IoOperation::RecvFrom,
                ))
            });
        let mut channel = Channel::new(mocket, &config(4));
        channel.send_probe(Probe::new(Sequence(10), TimeToLive(64)))?;
        let resp = channel.recv_probe()?;
        assert!(matches!(resp, Some(Response::EchoReply(data)) if data.sequence == Sequence(10)));
        assert_eq!(None, channel.recv_probe()?);
        Ok(())
    }
}
