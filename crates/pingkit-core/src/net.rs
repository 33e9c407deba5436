use crate::config::ChannelConfig;
use crate::error::Result;
use crate::probe::{Probe, Response};

/// Common types and helper functions.
mod common;

/// IPv4 implementation.
mod ipv4;

/// Platform specific network code.
mod platform;

/// A network socket.
mod socket;

/// A channel for sending and receiving probes.
pub mod channel;

/// The platform specific socket type.
pub use platform::SocketImpl;

/// An abstraction over a network interface for pinging.
#[cfg_attr(test, mockall::automock)]
pub trait Network {
    /// Send a `Probe`.
    fn send_probe(&mut self, probe: Probe) -> Result<()>;

    /// Receive the next `Response` to a `Probe` sent on this network.
    ///
    /// Returns `None` when no more responses are currently available.
    fn recv_probe(&mut self) -> Result<Option<Response>>;
}

/// Open a [`Network`] for a job.
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ChannelConfig) -> Result<Box<dyn Network + Send>>;
}

/// A [`Connector`] which opens a [`channel::Channel`] on a platform socket.
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketConnector;

impl Connector for SocketConnector {
    fn connect(&self, config: &ChannelConfig) -> Result<Box<dyn Network + Send>> {
        Ok(Box::new(channel::Channel::<SocketImpl>::connect(config)?))
    }
}
