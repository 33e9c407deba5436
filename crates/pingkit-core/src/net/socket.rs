use crate::error::IoResult as Result;
use std::net::SocketAddr;

/// A non-blocking `IPv4` `ICMP` socket.
#[cfg_attr(test, mockall::automock)]
pub trait Socket
where
    Self: Sized,
{
    /// Create an `IPv4` socket for sending and receiving `ICMP` echo messages.
    ///
    /// A raw socket receives every `ICMP` message delivered to the host, including the `IPv4`
    /// header, whereas a datagram socket only receives messages for its own echo identifier.
    fn new_icmp_socket_ipv4(raw: bool) -> Result<Self>;
    fn set_ttl(&mut self, ttl: u32) -> Result<()>;
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<()>;
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, Option<SocketAddr>)>;
}
