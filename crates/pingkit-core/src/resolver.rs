use pingkit_dns::{DnsEntry, DnsResolver, Resolver};

/// Resolve a host to an `IPv4` address without blocking.
#[cfg_attr(test, mockall::automock)]
pub trait HostResolver: Send + Sync {
    /// Return the current [`DnsEntry`] for the host, starting a resolution if needed.
    fn lazy_resolve(&self, host: &str) -> DnsEntry;
}

impl HostResolver for DnsResolver {
    fn lazy_resolve(&self, host: &str) -> DnsEntry {
        self.lazy_lookup(host)
    }
}
