//! Pingkit - A concurrent ICMP echo (ping) engine.
//!
//! This crate provides the engine behind the `pingkit` command line tool and
//! the `pingkit-ffi` C ABI library.
//!
//! An [`Engine`] owns a table of ping jobs, each of which sends a fixed number
//! of `ICMP` echo requests to a single `IPv4` host.  Jobs are created
//! immediately and driven to completion in the background by a single
//! scheduler thread, callers poll a job by its [`JobHandle`] to obtain a
//! [`Snapshot`] of its status and statistics.
//!
//! # Example
//!
//! The following example pings a host four times and prints the statistics
//! once the job has finished:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # use std::thread::sleep;
//! # use std::time::Duration;
//! use pingkit_core::{Engine, EngineConfigBuilder, PingConfigBuilder};
//!
//! let engine = Engine::new(EngineConfigBuilder::new().build()?)?;
//! let config = PingConfigBuilder::new()
//!     .num_requests(4)
//!     .interval(Duration::from_millis(250))
//!     .build();
//! let handle = engine.create("example.com", config)?;
//! loop {
//!     let (finished, snapshot) = engine.poll(handle)?;
//!     if finished {
//!         println!("{}: {:?}", snapshot.status, snapshot.stats);
//!         break;
//!     }
//!     sleep(Duration::from_millis(16));
//! }
//! engine.discard(handle);
//! # Ok(())
//! # }
//! ```
//!
//! # See Also
//!
//! - [`Engine::create`] - Create a ping job.
//! - [`Engine::poll`] - Poll the status and statistics of a job.
//! - [`Engine::discard`] - Discard a job.
mod config;
mod constants;
mod engine;
mod error;
mod net;
mod probe;
mod resolver;
mod sequencer;
mod stats;
mod table;
mod types;

pub use config::{
    defaults, ChannelConfig, EngineConfig, EngineConfigBuilder, PingConfig, PingConfigBuilder,
    PrivilegeMode,
};
pub use constants::{MAX_DATA_SIZE, MAX_PACKET_SIZE};
pub use engine::Engine;
pub use error::{Error, ErrorKind, IoError, IoOperation, Result};
pub use net::{Connector, Network, SocketConnector};
pub use probe::{Probe, Response, ResponseData};
pub use resolver::HostResolver;
pub use sequencer::estimate_hops;
pub use stats::{Snapshot, Stats};
pub use types::{
    JobHandle, JobStatus, PacketSize, PayloadPattern, Sequence, TimeToLive, TraceId,
};
