use crate::types::{Sequence, TimeToLive};
use pingkit_packet::icmpv4::IcmpCode;
use std::net::Ipv4Addr;
use std::time::Instant;

/// An echo request to be sent.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Probe {
    pub sequence: Sequence,
    pub ttl: TimeToLive,
}

impl Probe {
    #[must_use]
    pub const fn new(sequence: Sequence, ttl: TimeToLive) -> Self {
        Self { sequence, ttl }
    }
}

/// A response to an echo request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Response {
    EchoReply(ResponseData),
    TimeExceeded(ResponseData, IcmpCode),
    DestinationUnreachable(ResponseData, IcmpCode),
}

impl Response {
    #[must_use]
    pub const fn data(&self) -> &ResponseData {
        match self {
            Self::EchoReply(data)
            | Self::TimeExceeded(data, _)
            | Self::DestinationUnreachable(data, _) => data,
        }
    }
}

/// The data common to all responses.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResponseData {
    /// The time the response was read.
    pub recv: Instant,
    /// The address which sent the response.
    pub addr: Ipv4Addr,
    /// The sequence number of the echo request this responds to.
    pub sequence: Sequence,
    /// The ttl of the response, if the `IPv4` header was available.
    pub ttl: Option<u8>,
}

impl ResponseData {
    #[must_use]
    pub const fn new(recv: Instant, addr: Ipv4Addr, sequence: Sequence, ttl: Option<u8>) -> Self {
        Self {
            recv,
            addr,
            sequence,
            ttl,
        }
    }
}
