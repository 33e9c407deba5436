use crate::config::Config;
use crate::resolver::{DnsEntry, ResolvedIpAddrs, Resolver, Result};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// How DNS queries will be resolved.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResolveMethod {
    /// Resolve using the OS resolver.
    System,
    /// Resolve using the `/etc/resolv.conf` DNS configuration.
    Resolv,
    /// Resolve using the Google `8.8.8.8` DNS service.
    Google,
    /// Resolve using the Cloudflare `1.1.1.1` DNS service.
    Cloudflare,
}

impl Display for ResolveMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Resolv => write!(f, "resolv"),
            Self::Google => write!(f, "google"),
            Self::Cloudflare => write!(f, "cloudflare"),
        }
    }
}

/// A cheaply cloneable, non-blocking, caching, forward DNS resolver.
///
/// Clones share the same cache and background resolver threads, which stop once the last clone
/// is dropped.
#[derive(Clone)]
pub struct DnsResolver {
    inner: Arc<inner::DnsResolver>,
}

impl DnsResolver {
    /// Create and start a new `DnsResolver`.
    pub fn start(config: Config) -> std::io::Result<Self> {
        Ok(Self {
            inner: Arc::new(inner::DnsResolver::start(config)?),
        })
    }

    /// Get the `Config`.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.inner.config()
    }

    /// Flush the cache of responses.
    pub fn flush(&self) {
        self.inner.flush();
    }
}

impl Resolver for DnsResolver {
    fn lookup(&self, hostname: impl AsRef<str>) -> Result<ResolvedIpAddrs> {
        self.inner.lookup(hostname.as_ref())
    }

    fn lazy_lookup(&self, hostname: impl AsRef<str>) -> DnsEntry {
        self.inner.lazy_lookup(hostname.as_ref())
    }
}

/// Private impl of resolver.
mod inner {
    use super::{Config, ResolveMethod};
    use crate::resolver::{DnsEntry, Error, ResolvedIpAddrs, Result};
    use crossbeam::channel::{bounded, Receiver, Sender};
    use hickory_resolver::config::{LookupIpStrategy, ResolverConfig, ResolverOpts};
    use hickory_resolver::error::ResolveErrorKind;
    use hickory_resolver::system_conf::read_system_conf;
    use hickory_resolver::Resolver;
    use itertools::Itertools;
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};
    use std::str::FromStr;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, SystemTime};

    /// The maximum number of in-flight DNS resolutions.
    const RESOLVER_MAX_QUEUE_SIZE: usize = 100;

    /// The duration wait to enqueue a `DnsEntry::Pending` to the resolver before returning
    /// `DnsEntry::Timeout`.
    const RESOLVER_QUEUE_TIMEOUT: Duration = Duration::from_millis(10);

    /// Alias for a cache of hostname lookup entries.
    type Cache = Arc<RwLock<HashMap<String, CacheEntry>>>;

    /// A cache entry for a hostname lookup.
    #[derive(Debug, Clone)]
    struct CacheEntry {
        entry: DnsEntry,
        timestamp: SystemTime,
    }

    impl CacheEntry {
        const fn new(entry: DnsEntry, timestamp: SystemTime) -> Self {
            Self { entry, timestamp }
        }
    }

    #[derive(Clone)]
    enum DnsProvider {
        Hickory(Arc<Resolver>),
        DnsLookup,
    }

    /// Resolver implementation.
    pub(super) struct DnsResolver {
        config: Config,
        provider: DnsProvider,
        tx: Sender<String>,
        cache: Cache,
    }

    impl DnsResolver {
        pub(super) fn start(config: Config) -> std::io::Result<Self> {
            let (tx, rx) = bounded(RESOLVER_MAX_QUEUE_SIZE);
            let cache = Arc::new(RwLock::new(HashMap::new()));
            let provider = make_provider(&config)?;
            for i in 0..config.workers {
                let rx = rx.clone();
                let cache = cache.clone();
                let provider = provider.clone();
                thread::Builder::new()
                    .name(format!("dns-resolver-{i}"))
                    .spawn(move || resolver_queue_processor(&rx, &provider, &cache))?;
            }
            Ok(Self {
                config,
                provider,
                tx,
                cache,
            })
        }

        pub(super) const fn config(&self) -> &Config {
            &self.config
        }

        pub(super) fn lookup(&self, hostname: &str) -> Result<ResolvedIpAddrs> {
            if let Ok(addr) = Ipv4Addr::from_str(hostname) {
                return Ok(ResolvedIpAddrs(vec![addr]));
            }
            match forward_lookup(&self.provider, hostname).entry {
                DnsEntry::Resolved(_, addrs) => Ok(ResolvedIpAddrs(addrs)),
                DnsEntry::Timeout(host) => Err(Error::Timeout(host)),
                DnsEntry::Pending(host) | DnsEntry::NotFound(host) | DnsEntry::Failed(host) => {
                    Err(Error::NotFound(host))
                }
            }
        }

        pub(super) fn lazy_lookup(&self, hostname: &str) -> DnsEntry {
            if let Ok(addr) = Ipv4Addr::from_str(hostname) {
                return DnsEntry::Resolved(hostname.to_string(), vec![addr]);
            }
            let mut enqueue = false;
            let now = SystemTime::now();

            // Return the current entry if we have already attempted to resolve this hostname,
            // otherwise add it in a state of `DnsEntry::Pending`.
            let mut cache_entry = self
                .cache
                .write()
                .entry(hostname.to_string())
                .or_insert_with(|| {
                    enqueue = true;
                    CacheEntry::new(DnsEntry::Pending(hostname.to_string()), now)
                })
                .clone();

            // A stale entry is enqueued again but keeps being returned until it is refreshed.  The
            // timestamp is bumped so it is only enqueued once.
            match &cache_entry.entry {
                DnsEntry::Resolved(..) | DnsEntry::NotFound(_) | DnsEntry::Failed(_) => {
                    let age = now
                        .duration_since(cache_entry.timestamp)
                        .unwrap_or_default();
                    if age > self.config.ttl {
                        if let Some(entry) = self.cache.write().get_mut(hostname) {
                            entry.timestamp = now;
                        }
                        enqueue = true;
                    }
                }
                DnsEntry::Timeout(_) => {
                    cache_entry = CacheEntry::new(DnsEntry::Pending(hostname.to_string()), now);
                    self.cache
                        .write()
                        .insert(hostname.to_string(), cache_entry.clone());
                    enqueue = true;
                }
                DnsEntry::Pending(_) => {}
            }

            // Enqueue only after the cache lock above is released, the resolver threads take it
            // to publish results.
            if !enqueue {
                return cache_entry.entry;
            }
            if self
                .tx
                .send_timeout(hostname.to_string(), RESOLVER_QUEUE_TIMEOUT)
                .is_ok()
            {
                cache_entry.entry
            } else {
                tracing::warn!(hostname, "DNS resolver queue full");
                let timeout = CacheEntry::new(DnsEntry::Timeout(hostname.to_string()), now);
                self.cache
                    .write()
                    .insert(hostname.to_string(), timeout.clone());
                timeout.entry
            }
        }

        pub(super) fn flush(&self) {
            self.cache.write().clear();
        }
    }

    fn make_provider(config: &Config) -> std::io::Result<DnsProvider> {
        let hickory = |resolver_config: ResolverConfig, mut options: ResolverOpts| {
            options.timeout = config.timeout;
            options.ip_strategy = LookupIpStrategy::Ipv4Only;
            Resolver::new(resolver_config, options)
                .map(|resolver| DnsProvider::Hickory(Arc::new(resolver)))
        };
        match config.resolve_method {
            ResolveMethod::System => Ok(DnsProvider::DnsLookup),
            ResolveMethod::Resolv => {
                let (resolver_config, options) = read_system_conf()?;
                hickory(resolver_config, options)
            }
            ResolveMethod::Google => hickory(ResolverConfig::google(), ResolverOpts::default()),
            ResolveMethod::Cloudflare => {
                hickory(ResolverConfig::cloudflare(), ResolverOpts::default())
            }
        }
    }

    /// Process each hostname from the resolver queue and perform the forward DNS lookup.
    ///
    /// Runs until every `Sender` has been dropped.
    fn resolver_queue_processor(rx: &Receiver<String>, provider: &DnsProvider, cache: &Cache) {
        for hostname in rx {
            let entry = forward_lookup(provider, &hostname);
            tracing::debug!(entry = %entry.entry, "resolved");
            cache.write().insert(hostname, entry);
        }
    }

    fn forward_lookup(provider: &DnsProvider, hostname: &str) -> CacheEntry {
        let now = SystemTime::now();
        let entry = match provider {
            // The system resolver does not let us tell a missing record apart from a failure, so
            // every error is `DnsEntry::NotFound`.
            DnsProvider::DnsLookup => match dns_lookup::lookup_host(hostname) {
                Ok(addrs) => ipv4_entry(hostname, addrs),
                Err(_) => DnsEntry::NotFound(hostname.to_string()),
            },
            DnsProvider::Hickory(resolver) => match resolver.lookup_ip(hostname) {
                Ok(lookup) => ipv4_entry(hostname, lookup.iter().collect()),
                Err(err) => match err.kind() {
                    ResolveErrorKind::NoRecordsFound { .. } => {
                        DnsEntry::NotFound(hostname.to_string())
                    }
                    ResolveErrorKind::Timeout => DnsEntry::Timeout(hostname.to_string()),
                    _ => DnsEntry::Failed(hostname.to_string()),
                },
            },
        };
        CacheEntry::new(entry, now)
    }

    /// Keep the distinct `IPv4` addresses, in the order returned.
    pub(super) fn ipv4_entry(hostname: &str, addrs: Vec<IpAddr>) -> DnsEntry {
        let ipv4 = addrs
            .into_iter()
            .filter_map(|addr| match addr {
                IpAddr::V4(addr) => Some(addr),
                IpAddr::V6(_) => None,
            })
            .unique()
            .collect::<Vec<_>>();
        if ipv4.is_empty() {
            DnsEntry::NotFound(hostname.to_string())
        } else {
            DnsEntry::Resolved(hostname.to_string(), ipv4)
        }
    }
}
