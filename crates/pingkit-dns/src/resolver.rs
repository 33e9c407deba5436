use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use thiserror::Error;

/// A forward DNS resolver.
pub trait Resolver {
    /// Perform a blocking DNS hostname lookup and return the resolved `IPv4` addresses.
    fn lookup(&self, hostname: impl AsRef<str>) -> Result<ResolvedIpAddrs>;

    /// Perform a lazy DNS hostname lookup and return a `DnsEntry`.
    ///
    /// If the hostname has already been resolved then the cached `DnsEntry` is returned
    /// immediately.
    ///
    /// Otherwise, the hostname is enqueued to be resolved in the background and a
    /// `DnsEntry::Pending` is returned.
    ///
    /// If the entry exists but is `DnsEntry::Timeout` then it is changed to be `DnsEntry::Pending`
    /// and enqueued.
    ///
    /// If enqueuing times out then the entry is changed to be `DnsEntry::Timeout` and returned.
    #[must_use]
    fn lazy_lookup(&self, hostname: impl AsRef<str>) -> DnsEntry;
}

/// A DNS resolver error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A DNS resolver error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("DNS lookup failed")]
    LookupFailed(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("no IPv4 address found for {0}")]
    NotFound(String),
    #[error("DNS lookup timed out for {0}")]
    Timeout(String),
}

/// The `IPv4` addresses of a successful DNS lookup.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResolvedIpAddrs(pub(super) Vec<Ipv4Addr>);

impl ResolvedIpAddrs {
    pub fn iter(&self) -> impl Iterator<Item = &'_ Ipv4Addr> {
        self.0.iter()
    }

    /// The first resolved address.
    #[must_use]
    pub fn first(&self) -> Option<Ipv4Addr> {
        self.0.first().copied()
    }
}

impl IntoIterator for ResolvedIpAddrs {
    type Item = Ipv4Addr;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The state of a forward DNS resolution of a hostname.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DnsEntry {
    /// The resolution of the hostname is pending.
    Pending(String),
    /// The hostname resolved to one or more `IPv4` addresses.
    Resolved(String, Vec<Ipv4Addr>),
    /// The hostname has no `IPv4` address.
    NotFound(String),
    /// The resolution of the hostname failed.
    Failed(String),
    /// The resolution of the hostname timed out.
    Timeout(String),
}

impl DnsEntry {
    /// The hostname this entry is for.
    #[must_use]
    pub fn hostname(&self) -> &str {
        match self {
            Self::Pending(host)
            | Self::Resolved(host, _)
            | Self::NotFound(host)
            | Self::Failed(host)
            | Self::Timeout(host) => host,
        }
    }

    /// The first resolved address, if any.
    #[must_use]
    pub fn addr(&self) -> Option<Ipv4Addr> {
        match self {
            Self::Resolved(_, addrs) => addrs.first().copied(),
            Self::Pending(_) | Self::NotFound(_) | Self::Failed(_) | Self::Timeout(_) => None,
        }
    }

    /// Is the resolution still in progress?
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl Display for DnsEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved(host, addrs) => {
                use itertools::Itertools as _;
                write!(f, "{host} ({})", addrs.iter().format(", "))
            }
            Self::Pending(host) => write!(f, "Pending: {host}"),
            Self::NotFound(host) => write!(f, "Not found: {host}"),
            Self::Timeout(host) => write!(f, "Timeout: {host}"),
            Self::Failed(host) => write!(f, "Failed: {host}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_resolved_addrs() {
        let addrs = ResolvedIpAddrs(vec![Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(1, 0, 0, 1)]);
        assert_eq!(Some(Ipv4Addr::new(1, 1, 1, 1)), addrs.first());
        assert_eq!(2, addrs.iter().count());
        assert_eq!(
            vec![Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(1, 0, 0, 1)],
            addrs.into_iter().collect::<Vec<_>>()
        );
    }

    #[test_case(DnsEntry::Resolved(String::from("one.one"), vec![Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(1, 0, 0, 1)]), "one.one (1.1.1.1, 1.0.0.1)")]
    #[test_case(DnsEntry::Pending(String::from("a.b")), "Pending: a.b")]
    #[test_case(DnsEntry::NotFound(String::from("a.b")), "Not found: a.b")]
    #[test_case(DnsEntry::Timeout(String::from("a.b")), "Timeout: a.b")]
    #[test_case(DnsEntry::Failed(String::from("a.b")), "Failed: a.b")]
    fn test_display(entry: DnsEntry, expected: &str) {
        assert_eq!(expected, entry.to_string());
    }

    #[test]
    fn test_accessors() {
        let resolved = DnsEntry::Resolved(String::from("host"), vec![Ipv4Addr::LOCALHOST]);
        assert_eq!("host", resolved.hostname());
        assert_eq!(Some(Ipv4Addr::LOCALHOST), resolved.addr());
        assert!(!resolved.is_pending());
        let pending = DnsEntry::Pending(String::from("host"));
        assert_eq!(None, pending.addr());
        assert!(pending.is_pending());
    }
}
