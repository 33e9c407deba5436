use clap::{Parser, ValueEnum};
use pingkit_core::{
    defaults, EngineConfig, EngineConfigBuilder, PingConfig, PingConfigBuilder, PrivilegeMode,
};
use pingkit_dns::ResolveMethod;
use std::time::Duration;

/// Send ICMP echo requests to one or more hosts concurrently
#[derive(Parser, Debug)]
#[command(name = "pingkit", author, version, about, long_about = None, arg_required_else_help(true))]
pub struct Args {
    /// A space delimited list of hostnames and IPs to ping
    #[arg(required = true)]
    pub hosts: Vec<String>,

    /// The number of echo requests to send to each host [default: 1]
    #[arg(short = 'c', long)]
    pub count: Option<u16>,

    /// The size of the echo data in bytes [default: 32]
    #[arg(short = 's', long)]
    pub size: Option<u16>,

    /// The time-to-live of the echo requests [default: 128]
    #[arg(short = 't', long)]
    pub ttl: Option<u8>,

    /// The time to wait for each reply in milliseconds [default: 1000]
    #[arg(short = 'W', long)]
    pub timeout: Option<u16>,

    /// The time between echo requests in milliseconds [default: 16]
    #[arg(short = 'i', long)]
    pub interval: Option<u16>,

    /// Ping without requiring elevated privileges on supported platforms [default: false]
    #[arg(short = 'u', long)]
    pub unprivileged: bool,

    /// How to perform DNS queries [default: system]
    #[arg(value_enum, short = 'r', long)]
    pub dns_resolve_method: Option<DnsResolveMethodConfig>,

    /// The debug log format [default: pretty]
    #[arg(value_enum, long)]
    pub log_format: Option<LogFormat>,

    /// The debug log filter [default: pingkit=debug]
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Enable verbose debug logging
    #[arg(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

/// How DNS queries will be resolved.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum DnsResolveMethodConfig {
    /// Resolve using the OS resolver.
    System,
    /// Resolve using the `/etc/resolv.conf` DNS configuration.
    Resolv,
    /// Resolve using the Google `8.8.8.8` DNS service.
    Google,
    /// Resolve using the Cloudflare `1.1.1.1` DNS service.
    Cloudflare,
}

impl From<DnsResolveMethodConfig> for ResolveMethod {
    fn from(value: DnsResolveMethodConfig) -> Self {
        match value {
            DnsResolveMethodConfig::System => Self::System,
            DnsResolveMethodConfig::Resolv => Self::Resolv,
            DnsResolveMethodConfig::Google => Self::Google,
            DnsResolveMethodConfig::Cloudflare => Self::Cloudflare,
        }
    }
}

/// How to format log data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    /// Display log data in a compact format.
    Compact,
    /// Display log data in a pretty format.
    Pretty,
    /// Display log data in a json format.
    Json,
}

const DEFAULT_LOG_FILTER: &str = "pingkit=debug";

/// The fully resolved configuration of the tool.
#[derive(Debug, Clone)]
pub struct PingkitConfig {
    pub hosts: Vec<String>,
    pub ping: PingConfig,
    pub engine: EngineConfig,
    pub log_format: LogFormat,
    pub log_filter: String,
    pub verbose: bool,
}

impl TryFrom<Args> for PingkitConfig {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> anyhow::Result<Self> {
        let ping = PingConfigBuilder::new()
            .num_requests(args.count.unwrap_or(defaults::DEFAULT_NUM_REQUESTS))
            .data_size(args.size.unwrap_or(defaults::DEFAULT_DATA_SIZE))
            .ttl(args.ttl.unwrap_or(defaults::DEFAULT_TTL))
            .timeout(args.timeout.map_or(defaults::DEFAULT_TIMEOUT, |ms| {
                Duration::from_millis(u64::from(ms))
            }))
            .interval(args.interval.map_or(defaults::DEFAULT_INTERVAL, |ms| {
                Duration::from_millis(u64::from(ms))
            }))
            .build();
        let dns = pingkit_dns::Builder::new()
            .resolve_method(
                args.dns_resolve_method
                    .map_or(ResolveMethod::System, ResolveMethod::from),
            )
            .build();
        let privilege_mode = args.unprivileged.then_some(PrivilegeMode::Unprivileged);
        let engine = EngineConfigBuilder::new()
            .max_jobs(args.hosts.len().max(defaults::DEFAULT_MAX_JOBS))
            .privilege_mode(privilege_mode)
            .dns(dns)
            .build()?;
        Ok(Self {
            hosts: args.hosts,
            ping,
            engine,
            log_format: args.log_format.unwrap_or(LogFormat::Pretty),
            log_filter: args
                .log_filter
                .unwrap_or_else(|| String::from(DEFAULT_LOG_FILTER)),
            verbose: args.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn parse(cmd: &str) -> anyhow::Result<PingkitConfig> {
        let args = Args::try_parse_from(cmd.split_whitespace())?;
        PingkitConfig::try_from(args)
    }

    #[test]
    fn test_defaults() -> anyhow::Result<()> {
        let cfg = parse("pingkit example.com")?;
        assert_eq!(vec![String::from("example.com")], cfg.hosts);
        assert_eq!(PingConfig::default(), cfg.ping);
        assert_eq!(None, cfg.engine.privilege_mode);
        assert_eq!(ResolveMethod::System, cfg.engine.dns.resolve_method);
        assert_eq!(LogFormat::Pretty, cfg.log_format);
        assert_eq!(DEFAULT_LOG_FILTER, cfg.log_filter);
        assert!(!cfg.verbose);
        Ok(())
    }

    #[test]
    fn test_ping_options() -> anyhow::Result<()> {
        let cfg = parse("pingkit a b --count 4 --size 56 --ttl 64 --timeout 250 --interval 100")?;
        assert_eq!(2, cfg.hosts.len());
        assert_eq!(4, cfg.ping.num_requests);
        assert_eq!(56, cfg.ping.data_size.0);
        assert_eq!(64, cfg.ping.ttl.0);
        assert_eq!(Duration::from_millis(250), cfg.ping.timeout);
        assert_eq!(Duration::from_millis(100), cfg.ping.interval);
        Ok(())
    }

    #[test_case("pingkit a --count 0", 1, 32; "zero count clamped")]
    #[test_case("pingkit a --size 2000", 1, 504; "oversize data clamped")]
    fn test_clamped(cmd: &str, count: u16, size: u16) -> anyhow::Result<()> {
        let cfg = parse(cmd)?;
        assert_eq!(count, cfg.ping.num_requests);
        assert_eq!(size, cfg.ping.data_size.0);
        Ok(())
    }

    #[test_case("pingkit a -u", Some(PrivilegeMode::Unprivileged); "unprivileged")]
    #[test_case("pingkit a", None; "discover")]
    fn test_privilege_mode(cmd: &str, expected: Option<PrivilegeMode>) -> anyhow::Result<()> {
        assert_eq!(expected, parse(cmd)?.engine.privilege_mode);
        Ok(())
    }

    #[test_case("system", ResolveMethod::System; "system")]
    #[test_case("resolv", ResolveMethod::Resolv; "resolv")]
    #[test_case("google", ResolveMethod::Google; "google")]
    #[test_case("cloudflare", ResolveMethod::Cloudflare; "cloudflare")]
    fn test_dns_resolve_method(method: &str, expected: ResolveMethod) -> anyhow::Result<()> {
        let cfg = parse(&format!("pingkit a --dns-resolve-method {method}"))?;
        assert_eq!(expected, cfg.engine.dns.resolve_method);
        Ok(())
    }

    #[test_case("compact", LogFormat::Compact; "compact")]
    #[test_case("pretty", LogFormat::Pretty; "pretty")]
    #[test_case("json", LogFormat::Json; "json")]
    fn test_log_format(format: &str, expected: LogFormat) -> anyhow::Result<()> {
        let cfg = parse(&format!("pingkit a -v --log-format {format} --log-filter pingkit=trace"))?;
        assert_eq!(expected, cfg.log_format);
        assert_eq!("pingkit=trace", cfg.log_filter);
        assert!(cfg.verbose);
        Ok(())
    }

    #[test]
    fn test_many_hosts_grow_table() -> anyhow::Result<()> {
        let hosts = (0..100).map(|i| format!("h{i}")).collect::<Vec<_>>().join(" ");
        let cfg = parse(&format!("pingkit {hosts}"))?;
        assert_eq!(100, cfg.engine.max_jobs);
        Ok(())
    }

    #[test]
    fn test_missing_host() {
        assert!(parse("pingkit --count 2").is_err());
    }
}
