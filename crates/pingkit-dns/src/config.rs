use crate::ResolveMethod;
use std::time::Duration;

/// A builder for DNS `Config`.
///
/// # Example
///
/// Build a DNS `Config` which uses the Google public DNS service.
///
/// ```
/// use pingkit_dns::{Builder, ResolveMethod};
///
/// let config = Builder::new().resolve_method(ResolveMethod::Google).build();
/// assert_eq!(ResolveMethod::Google, config.resolve_method);
/// ```
pub struct Builder {
    resolve_method: ResolveMethod,
    timeout: Duration,
    ttl: Duration,
    workers: usize,
}

impl Builder {
    /// Create a new `Builder`.
    #[must_use]
    pub fn new() -> Self {
        let config = Config::default();
        Self {
            resolve_method: config.resolve_method,
            timeout: config.timeout,
            ttl: config.ttl,
            workers: config.workers,
        }
    }

    /// Set the method to use for DNS resolution.
    #[must_use]
    pub const fn resolve_method(self, resolve_method: ResolveMethod) -> Self {
        Self {
            resolve_method,
            ..self
        }
    }

    /// Set the timeout for DNS resolution.
    ///
    /// Only honoured by the non-system resolve methods; the system resolver applies its own.
    #[must_use]
    pub const fn timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Set the time-to-live (TTL) for DNS cache entries.
    #[must_use]
    pub const fn ttl(self, ttl: Duration) -> Self {
        Self { ttl, ..self }
    }

    /// Set the number of background resolver threads.
    #[must_use]
    pub const fn workers(self, workers: usize) -> Self {
        Self { workers, ..self }
    }

    /// Build the DNS `Config`.
    ///
    /// At least one resolver thread is always started.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            resolve_method: self.resolve_method,
            timeout: self.timeout,
            ttl: self.ttl,
            workers: self.workers.max(1),
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the `DnsResolver`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Config {
    /// The method to use for DNS resolution.
    pub resolve_method: ResolveMethod,
    /// The timeout for DNS resolution.
    pub timeout: Duration,
    /// The time-to-live (TTL) for DNS cache entries.
    pub ttl: Duration,
    /// The number of background resolver threads.
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolve_method: ResolveMethod::System,
            timeout: Duration::from_millis(5000),
            ttl: Duration::from_secs(300),
            workers: 2,
        }
    }
}
