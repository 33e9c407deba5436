use derive_more::{Add, AddAssign};
use std::fmt::{Display, Formatter};

/// `JobHandle` newtype.
///
/// Handles are allocated from `1` upwards and never reused, `0` is never a valid handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct JobHandle(pub u32);

impl JobHandle {
    /// The handle reported when a job could not be created.
    pub const INVALID: Self = Self(0);

    /// Is this a handle which may refer to a job?
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Display for JobHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `TimeToLive` (ttl) newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct TimeToLive(pub u8);

/// `Sequence` number newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Add, AddAssign)]
pub struct Sequence(pub u16);

/// `TraceId` newtype, the `ICMP` echo identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct TraceId(pub u16);

/// `PacketSize` newtype, the size of the `ICMP` echo data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct PacketSize(pub u16);

/// `PayloadPattern` newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct PayloadPattern(pub u8);

/// The status of a ping job.
///
/// The discriminants are the values reported over the C ABI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum JobStatus {
    /// The job has been created and is resolving its host.
    #[default]
    Inactive = 0,
    /// Probes are being sent.
    Running = 1,
    /// All probes have completed.
    Finished = 2,
    /// The job failed, see [`Error`](crate::Error) for the causes.
    Error = 3,
}

impl JobStatus {
    /// Has the job reached a status it will never leave?
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

impl From<JobStatus> for u32 {
    fn from(status: JobStatus) -> Self {
        status as Self
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Error => write!(f, "error"),
        }
    }
}
