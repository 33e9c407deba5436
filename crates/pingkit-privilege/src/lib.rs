//! Discover platform privileges.
//!
//! Discover and manage the platform privileges needed for sending `ICMP` echo
//! requests via raw (`SOCK_RAW`) or datagram (`SOCK_DGRAM` with `IPPROTO_ICMP`)
//! sockets.
//!
//! [`Privilege::acquire_privileges`]:
//!
//! - On Linux we check if `CAP_NET_RAW` is in the permitted set and if so raise it to the effective
//!   set
//! - On other Unix platforms this is a no-op
//!
//! [`Privilege::has_privileges`] (obtained via [`Privilege::discover`]):
//!
//! - On Linux we check if `CAP_NET_RAW` is in the effective set
//! - On other Unix platforms we check that the effective user is root
//!
//! [`Privilege::supports_unprivileged`] (obtained via [`Privilege::discover`]):
//!
//! - On Linux datagram `ICMP` sockets are allowed for groups within the `net.ipv4.ping_group_range`
//!   sysctl, so we check the effective group id against it
//! - On macOS datagram `ICMP` sockets are always allowed
//! - Other Unix platforms do not support datagram `ICMP` sockets
//!
//! [`Privilege::drop_privileges`]:
//!
//! - On Linux we clear the effective set
//! - On other Unix platforms this is a no-op
//!
//! # Examples
//!
//! Acquire the required privileges if we can:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! # use pingkit_privilege::Privilege;
//! let privilege = Privilege::acquire_privileges()?;
//! if privilege.has_privileges() {
//!     println!("raw ICMP sockets are available");
//! } else if privilege.supports_unprivileged() {
//!     println!("datagram ICMP sockets are available");
//! } else {
//!     println!("ICMP echo requests cannot be sent");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Drop all privileges:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! # use pingkit_privilege::Privilege;
//! Privilege::drop_privileges()?;
//! # Ok(())
//! # }
//! ```

/// A privilege error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A privilege error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[cfg(target_os = "linux")]
    #[error("caps error: {0}")]
    CapsError(#[from] caps::errors::CapsError),
}

/// Run-time platform privilege information.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Privilege {
    has_privileges: bool,
    supports_unprivileged: bool,
}

impl Privilege {
    /// Discover information about the platform privileges.
    pub fn discover() -> Result<Self> {
        Ok(Self {
            has_privileges: Self::check_has_privileges()?,
            supports_unprivileged: Self::check_supports_unprivileged(),
        })
    }

    /// Create a new Privilege instance.
    #[must_use]
    pub const fn new(has_privileges: bool, supports_unprivileged: bool) -> Self {
        Self {
            has_privileges,
            supports_unprivileged,
        }
    }

    /// Are we running with the privileges required for raw sockets?
    #[must_use]
    pub const fn has_privileges(&self) -> bool {
        self.has_privileges
    }

    /// Can this process open a datagram `ICMP` socket without privileges?
    #[must_use]
    pub const fn supports_unprivileged(&self) -> bool {
        self.supports_unprivileged
    }

    // Linux

    #[cfg(target_os = "linux")]
    /// Acquire privileges, if possible.
    ///
    /// Check if `CAP_NET_RAW` is in the permitted set and if so raise it to the effective set.
    pub fn acquire_privileges() -> Result<Self> {
        if caps::has_cap(None, caps::CapSet::Permitted, caps::Capability::CAP_NET_RAW)? {
            caps::raise(None, caps::CapSet::Effective, caps::Capability::CAP_NET_RAW)?;
        }
        Self::discover()
    }

    #[cfg(target_os = "linux")]
    fn check_has_privileges() -> Result<bool> {
        Ok(caps::has_cap(
            None,
            caps::CapSet::Effective,
            caps::Capability::CAP_NET_RAW,
        )?)
    }

    #[cfg(target_os = "linux")]
    /// Drop all privileges.
    ///
    /// Clears the effective set.
    pub fn drop_privileges() -> Result<()> {
        caps::clear(None, caps::CapSet::Effective)?;
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn check_supports_unprivileged() -> bool {
        let gid = nix::unistd::Gid::effective().as_raw();
        std::fs::read_to_string("/proc/sys/net/ipv4/ping_group_range")
            .ok()
            .and_then(|range| parse_ping_group_range(&range))
            .is_some_and(|(low, high)| (low..=high).contains(&gid))
    }

    // Unix (excl. Linux)

    #[cfg(all(unix, not(target_os = "linux")))]
    /// Acquire privileges, if possible.
    ///
    /// This is a no-op on non-Linux unix systems.
    pub fn acquire_privileges() -> Result<Self> {
        Self::discover()
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    #[allow(clippy::unnecessary_wraps)]
    fn check_has_privileges() -> Result<bool> {
        Ok(nix::unistd::Uid::effective().is_root())
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    /// Drop all privileges.
    ///
    /// This is a no-op on non-Linux unix systems.
    pub const fn drop_privileges() -> Result<()> {
        Ok(())
    }

    #[cfg(target_os = "macos")]
    const fn check_supports_unprivileged() -> bool {
        true
    }

    #[cfg(all(unix, not(any(target_os = "linux", target_os = "macos"))))]
    const fn check_supports_unprivileged() -> bool {
        false
    }
}

/// Parse the `net.ipv4.ping_group_range` sysctl, two whitespace separated group ids.
///
/// The kernel default of `1 0` is an empty range.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_ping_group_range(range: &str) -> Option<(u32, u32)> {
    let mut ids = range.split_whitespace().map(str::parse::<u32>);
    match (ids.next(), ids.next()) {
        (Some(Ok(low)), Some(Ok(high))) => Some((low, high)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("0\t2147483647\n", Some((0, 2_147_483_647)); "all groups")]
    #[test_case("1\t0\n", Some((1, 0)); "kernel default")]
    #[test_case("100 200", Some((100, 200)); "space separated")]
    #[test_case("", None; "empty")]
    #[test_case("1", None; "missing upper bound")]
    #[test_case("a b", None; "not numeric")]
    fn test_parse_ping_group_range(range: &str, expected: Option<(u32, u32)>) {
        assert_eq!(expected, parse_ping_group_range(range));
    }

    #[test]
    fn test_new() {
        let privilege = Privilege::new(false, true);
        assert!(!privilege.has_privileges());
        assert!(privilege.supports_unprivileged());
    }

    #[test]
    fn test_discover() -> anyhow::Result<()> {
        let privilege = Privilege::discover()?;
        if cfg!(target_os = "macos") {
            assert!(privilege.supports_unprivileged());
        }
        Ok(())
    }
}
