use crate::constants::MAX_DATA_SIZE;
use crate::error::{Error, Result};
use crate::types::{PacketSize, PayloadPattern, TimeToLive, TraceId};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default values for configuration.
pub mod defaults {
    use std::time::Duration;

    /// The default number of echo requests sent by a job.
    pub const DEFAULT_NUM_REQUESTS: u16 = 1;

    /// The default size of the echo data.
    pub const DEFAULT_DATA_SIZE: u16 = 32;

    /// The default time-to-live of echo requests.
    pub const DEFAULT_TTL: u8 = 128;

    /// The default time to wait for an echo reply.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

    /// The default time between echo requests.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(16);

    /// The default byte used to fill the echo data.
    pub const DEFAULT_PAYLOAD_PATTERN: u8 = 0xDA;

    /// The default maximum number of jobs held by the engine.
    pub const DEFAULT_MAX_JOBS: usize = 64;

    /// The default time the scheduler waits with no work before it exits.
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

    /// The default time between scheduler ticks.
    pub const DEFAULT_TICK_RESOLUTION: Duration = Duration::from_millis(1);

    /// The default lower bound on the time allowed to resolve a host.
    pub const DEFAULT_MIN_RESOLVE_TIMEOUT: Duration = Duration::from_millis(5000);
}

/// The privilege mode.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PrivilegeMode {
    /// Send and receive with raw `ICMP` sockets.
    Privileged,
    /// Send and receive with datagram `ICMP` sockets.
    Unprivileged,
}

impl PrivilegeMode {
    #[must_use]
    pub const fn is_unprivileged(self) -> bool {
        match self {
            Self::Privileged => false,
            Self::Unprivileged => true,
        }
    }
}

/// The configuration of a single ping job.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PingConfig {
    pub num_requests: u16,
    pub data_size: PacketSize,
    pub ttl: TimeToLive,
    pub timeout: Duration,
    pub interval: Duration,
    pub payload_pattern: PayloadPattern,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            num_requests: defaults::DEFAULT_NUM_REQUESTS,
            data_size: PacketSize(defaults::DEFAULT_DATA_SIZE),
            ttl: TimeToLive(defaults::DEFAULT_TTL),
            timeout: defaults::DEFAULT_TIMEOUT,
            interval: defaults::DEFAULT_INTERVAL,
            payload_pattern: PayloadPattern(defaults::DEFAULT_PAYLOAD_PATTERN),
        }
    }
}

impl PingConfig {
    /// Clamp degenerate values rather than reject them.
    ///
    /// At least one request is sent, the ttl is at least 1, the timeout is at least 1ms and the
    /// echo data is at most [`MAX_DATA_SIZE`] bytes.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            num_requests: self.num_requests.max(1),
            data_size: PacketSize(self.data_size.0.min(MAX_DATA_SIZE)),
            ttl: TimeToLive(self.ttl.0.max(1)),
            timeout: self.timeout.max(Duration::from_millis(1)),
            ..self
        }
    }
}

/// Build a [`PingConfig`].
///
/// # Example
///
/// ```
/// use pingkit_core::PingConfigBuilder;
/// use std::time::Duration;
///
/// let config = PingConfigBuilder::new()
///     .num_requests(4)
///     .ttl(64)
///     .timeout(Duration::ZERO)
///     .build();
/// assert_eq!(4, config.num_requests);
/// assert_eq!(Duration::from_millis(1), config.timeout);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PingConfigBuilder {
    config: PingConfig,
}

impl PingConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of echo requests to send.
    #[must_use]
    pub const fn num_requests(self, num_requests: u16) -> Self {
        Self {
            config: PingConfig {
                num_requests,
                ..self.config
            },
        }
    }

    /// Set the size of the echo data.
    #[must_use]
    pub const fn data_size(self, data_size: u16) -> Self {
        Self {
            config: PingConfig {
                data_size: PacketSize(data_size),
                ..self.config
            },
        }
    }

    /// Set the time-to-live of each echo request.
    #[must_use]
    pub const fn ttl(self, ttl: u8) -> Self {
        Self {
            config: PingConfig {
                ttl: TimeToLive(ttl),
                ..self.config
            },
        }
    }

    /// Set the time to wait for each echo reply.
    #[must_use]
    pub const fn timeout(self, timeout: Duration) -> Self {
        Self {
            config: PingConfig {
                timeout,
                ..self.config
            },
        }
    }

    /// Set the time between echo requests.
    #[must_use]
    pub const fn interval(self, interval: Duration) -> Self {
        Self {
            config: PingConfig {
                interval,
                ..self.config
            },
        }
    }

    /// Set the byte used to fill the echo data.
    #[must_use]
    pub const fn payload_pattern(self, payload_pattern: u8) -> Self {
        Self {
            config: PingConfig {
                payload_pattern: PayloadPattern(payload_pattern),
                ..self.config
            },
        }
    }

    /// Build the [`PingConfig`], see [`PingConfig::clamped`].
    #[must_use]
    pub fn build(self) -> PingConfig {
        self.config.clamped()
    }
}

/// The process wide configuration of the [`Engine`](crate::Engine).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EngineConfig {
    pub max_jobs: usize,
    pub idle_timeout: Duration,
    pub tick_resolution: Duration,
    pub min_resolve_timeout: Duration,
    /// The privilege mode to use, or `None` to discover it.
    pub privilege_mode: Option<PrivilegeMode>,
    pub dns: pingkit_dns::Config,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_jobs: defaults::DEFAULT_MAX_JOBS,
            idle_timeout: defaults::DEFAULT_IDLE_TIMEOUT,
            tick_resolution: defaults::DEFAULT_TICK_RESOLUTION,
            min_resolve_timeout: defaults::DEFAULT_MIN_RESOLVE_TIMEOUT,
            privilege_mode: None,
            dns: pingkit_dns::Config::default(),
        }
    }
}

/// Build an [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of jobs held at once.
    #[must_use]
    pub const fn max_jobs(self, max_jobs: usize) -> Self {
        Self {
            config: EngineConfig {
                max_jobs,
                ..self.config
            },
        }
    }

    /// Set how long the scheduler lingers with no work before it exits.
    #[must_use]
    pub const fn idle_timeout(self, idle_timeout: Duration) -> Self {
        Self {
            config: EngineConfig {
                idle_timeout,
                ..self.config
            },
        }
    }

    /// Set the time between scheduler ticks.
    #[must_use]
    pub const fn tick_resolution(self, tick_resolution: Duration) -> Self {
        Self {
            config: EngineConfig {
                tick_resolution,
                ..self.config
            },
        }
    }

    /// Set the lower bound on the time allowed to resolve a host.
    #[must_use]
    pub const fn min_resolve_timeout(self, min_resolve_timeout: Duration) -> Self {
        Self {
            config: EngineConfig {
                min_resolve_timeout,
                ..self.config
            },
        }
    }

    /// Force a privilege mode rather than discovering it.
    #[must_use]
    pub const fn privilege_mode(self, privilege_mode: Option<PrivilegeMode>) -> Self {
        Self {
            config: EngineConfig {
                privilege_mode,
                ..self.config
            },
        }
    }

    /// Set the DNS resolver configuration.
    #[must_use]
    pub const fn dns(self, dns: pingkit_dns::Config) -> Self {
        Self {
            config: EngineConfig { dns, ..self.config },
        }
    }

    /// Build the [`EngineConfig`].
    pub fn build(self) -> Result<EngineConfig> {
        let config = self.config;
        if config.max_jobs == 0 {
            return Err(Error::BadConfig(String::from(
                "max_jobs must be greater than zero",
            )));
        }
        if config.tick_resolution.is_zero() {
            return Err(Error::BadConfig(String::from(
                "tick_resolution must be greater than zero",
            )));
        }
        if config.idle_timeout < config.tick_resolution {
            return Err(Error::BadConfig(format!(
                "idle_timeout ({:?}) must not be shorter than tick_resolution ({:?})",
                config.idle_timeout, config.tick_resolution
            )));
        }
        Ok(config)
    }
}

/// Ping network channel configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChannelConfig {
    pub privilege_mode: PrivilegeMode,
    pub target_addr: Ipv4Addr,
    pub identifier: TraceId,
    pub data_size: PacketSize,
    pub payload_pattern: PayloadPattern,
}

impl ChannelConfig {
    #[must_use]
    pub const fn new(
        privilege_mode: PrivilegeMode,
        target_addr: Ipv4Addr,
        identifier: TraceId,
        config: &PingConfig,
    ) -> Self {
        Self {
            privilege_mode,
            target_addr,
            identifier,
            data_size: config.data_size,
            payload_pattern: config.payload_pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_ping_config_defaults() {
        let config = PingConfigBuilder::new().build();
        assert_eq!(1, config.num_requests);
        assert_eq!(PacketSize(32), config.data_size);
        assert_eq!(TimeToLive(128), config.ttl);
        assert_eq!(Duration::from_millis(1000), config.timeout);
        assert_eq!(Duration::from_millis(16), config.interval);
        assert_eq!(PayloadPattern(0xDA), config.payload_pattern);
        assert_eq!(PingConfig::default(), config);
    }

    #[test]
    fn test_ping_config_clamps_degenerate_values() {
        let config = PingConfigBuilder::new()
            .num_requests(0)
            .data_size(u16::MAX)
            .ttl(0)
            .timeout(Duration::ZERO)
            .interval(Duration::ZERO)
            .build();
        assert_eq!(1, config.num_requests);
        assert_eq!(PacketSize(504), config.data_size);
        assert_eq!(TimeToLive(1), config.ttl);
        assert_eq!(Duration::from_millis(1), config.timeout);
        assert_eq!(Duration::ZERO, config.interval);
    }

    #[test]
    fn test_ping_config_clamped_from_fields() {
        let config = PingConfig {
            num_requests: 0,
            data_size: PacketSize(600),
            ttl: TimeToLive(0),
            timeout: Duration::ZERO,
            ..PingConfig::default()
        }
        .clamped();
        assert_eq!(1, config.num_requests);
        assert_eq!(PacketSize(504), config.data_size);
        assert_eq!(TimeToLive(1), config.ttl);
        assert_eq!(Duration::from_millis(1), config.timeout);
        assert_eq!(PingConfig::default(), PingConfig::default().clamped());
    }

    #[test]
    fn test_ping_config_keeps_valid_values() {
        let config = PingConfigBuilder::new()
            .num_requests(10)
            .data_size(504)
            .ttl(255)
            .timeout(Duration::from_millis(250))
            .interval(Duration::from_millis(100))
            .payload_pattern(0)
            .build();
        assert_eq!(10, config.num_requests);
        assert_eq!(PacketSize(504), config.data_size);
        assert_eq!(TimeToLive(255), config.ttl);
        assert_eq!(Duration::from_millis(250), config.timeout);
        assert_eq!(Duration::from_millis(100), config.interval);
        assert_eq!(PayloadPattern(0), config.payload_pattern);
    }

    #[test]
    fn test_engine_config_defaults() -> anyhow::Result<()> {
        let config = EngineConfigBuilder::new().build()?;
        assert_eq!(EngineConfig::default(), config);
        assert_eq!(64, config.max_jobs);
        assert_eq!(Duration::from_secs(1), config.idle_timeout);
        assert_eq!(None, config.privilege_mode);
        Ok(())
    }

    #[test_case(0, Duration::from_millis(1), Duration::from_secs(1); "no jobs")]
    #[test_case(64, Duration::ZERO, Duration::from_secs(1); "zero tick")]
    #[test_case(64, Duration::from_millis(10), Duration::from_millis(5); "idle shorter than tick")]
    fn test_engine_config_invalid(max_jobs: usize, tick: Duration, idle: Duration) {
        let config = EngineConfigBuilder::new()
            .max_jobs(max_jobs)
            .tick_resolution(tick)
            .idle_timeout(idle)
            .build();
        assert!(matches!(config, Err(Error::BadConfig(_))));
    }

    #[test]
    fn test_privilege_mode() {
        assert!(!PrivilegeMode::Privileged.is_unprivileged());
        assert!(PrivilegeMode::Unprivileged.is_unprivileged());
    }
}
