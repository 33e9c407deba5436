use crate::types::JobStatus;
use std::time::Duration;

/// The outcome of a single echo probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// An echo reply was received within the timeout.
    Reply(Duration),
    /// No reply was received within the timeout.
    Timeout,
    /// The probe could not be sent or an `ICMP` error was received for it.
    Error,
}

/// Aggregate statistics of the probes of a job.
///
/// Round trip times are in milliseconds and are `0` when no reply has been received.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub sent: u32,
    pub received: u32,
    pub lost: u32,
    pub pct_lost: f32,
    pub min_rtt: f32,
    pub max_rtt: f32,
    pub avg_rtt: f32,
    pub std_dev_rtt: f32,
}

/// An immutable copy of the status and statistics of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    pub status: JobStatus,
    pub stats: Stats,
}

impl Snapshot {
    #[must_use]
    pub const fn new(status: JobStatus, stats: Stats) -> Self {
        Self { status, stats }
    }

    /// Has the job reached a terminal status?
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Incrementally aggregate probe outcomes into [`Stats`] without retaining samples.
///
/// The mean and variance are maintained with Welford's online algorithm.
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    sent: u32,
    received: u32,
    lost: u32,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl StatsAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the outcome of a probe into the statistics.
    pub fn on_probe_outcome(&mut self, outcome: ProbeOutcome) {
        self.sent = self.sent.saturating_add(1);
        match outcome {
            ProbeOutcome::Reply(rtt) => {
                let rtt = rtt.as_secs_f64() * 1000_f64;
                self.received = self.received.saturating_add(1);
                if self.received == 1 {
                    self.min = rtt;
                    self.max = rtt;
                } else {
                    self.min = self.min.min(rtt);
                    self.max = self.max.max(rtt);
                }
                let delta = rtt - self.mean;
                self.mean += delta / f64::from(self.received);
                self.m2 += delta * (rtt - self.mean);
            }
            ProbeOutcome::Timeout | ProbeOutcome::Error => {
                self.lost = self.lost.saturating_add(1);
            }
        }
    }

    /// The current statistics.
    #[must_use]
    pub fn stats(&self) -> Stats {
        let pct_lost = if self.sent == 0 {
            0_f32
        } else {
            (f64::from(self.lost) / f64::from(self.sent) * 100_f64) as f32
        };
        if self.received == 0 {
            return Stats {
                sent: self.sent,
                received: self.received,
                lost: self.lost,
                pct_lost,
                ..Stats::default()
            };
        }
        let min_rtt = self.min as f32;
        let max_rtt = self.max as f32;
        let variance = self.m2 / f64::from(self.received);
        Stats {
            sent: self.sent,
            received: self.received,
            lost: self.lost,
            pct_lost,
            min_rtt,
            max_rtt,
            // rounding may push the mean a hair outside the observed range
            avg_rtt: (self.mean as f32).clamp(min_rtt, max_rtt),
            std_dev_rtt: variance.max(0_f64).sqrt() as f32,
        }
    }
}
