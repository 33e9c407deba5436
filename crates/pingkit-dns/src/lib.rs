//! This crate provides a cheaply cloneable, non-blocking, caching forward DNS
//! resolver for `IPv4` addresses.
//!
//! A hostname is resolved at most once (lazily) no matter how often it is
//! looked up unless:
//! - the previous lookup failed with `DnsEntry::Timeout(_)`
//! - the previous lookup is older than the configured time-to-live (TTL)
//!
//! Hostnames which are already dotted-quad `IPv4` literals are returned as
//! `DnsEntry::Resolved` immediately without a query.
//!
//! # Example
//!
//! The following example looks up a hostname and loops until it is resolved
//! or fails.  The lookup uses the Cloudflare 1.1.1.1 public DNS service.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # use std::thread::sleep;
//! # use std::time::Duration;
//! use pingkit_dns::{Builder, DnsEntry, DnsResolver, ResolveMethod, Resolver};
//!
//! let config = Builder::new()
//!     .resolve_method(ResolveMethod::Cloudflare)
//!     .timeout(Duration::from_secs(2))
//!     .build();
//! let resolver = DnsResolver::start(config)?;
//! loop {
//!     match resolver.lazy_lookup("example.com") {
//!         DnsEntry::Pending(host) => {
//!             println!("lookup of {host} is pending");
//!             sleep(Duration::from_millis(50));
//!         }
//!         DnsEntry::Resolved(host, addrs) => {
//!             println!("{host} resolved to {addrs:?}");
//!             return Ok(());
//!         }
//!         entry => {
//!             println!("lookup did not resolve: {entry}");
//!             return Ok(());
//!         }
//!     }
//! }
//! # }
//! ```
#![forbid(unsafe_code)]

mod config;
mod lazy_resolver;
mod resolver;

pub use config::{Builder, Config};
pub use lazy_resolver::{DnsResolver, ResolveMethod};
pub use resolver::{DnsEntry, Error, ResolvedIpAddrs, Resolver, Result};
