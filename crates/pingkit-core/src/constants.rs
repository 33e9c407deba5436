/// The maximum size of the `ICMP` echo request message (header and data) we send.
pub const MAX_PACKET_SIZE: usize = 512;

/// The size of the `ICMP` echo header.
pub const ICMP_HEADER_SIZE: usize = 8;

/// The maximum size of the echo data, such that the message fits in [`MAX_PACKET_SIZE`].
pub const MAX_DATA_SIZE: u16 = (MAX_PACKET_SIZE - ICMP_HEADER_SIZE) as u16;

/// The size of the buffer used to receive replies.
///
/// Large enough for an `IPv4` header with options followed by an `ICMP` error message quoting the
/// largest probe we send.
pub const RECV_BUFFER_SIZE: usize = 1024;
