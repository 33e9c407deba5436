use crate::config::PingConfig;
use crate::error::Error;
use crate::net::Network;
use crate::probe::{Probe, Response, ResponseData};
use crate::stats::{ProbeOutcome, Snapshot, StatsAccumulator};
use crate::types::{JobStatus, Sequence};
use indexmap::IndexMap;
use pingkit_packet::icmpv4::{control_message_name, IcmpType};
use std::time::Instant;
use tracing::instrument;

/// The per job echo probe state machine.
///
/// Each [`Sequencer::tick`] drains the responses available on the [`Network`], expires probes
/// which have waited longer than the timeout, sends the next probe if it is due and finally
/// checks whether the job has completed.
#[derive(Debug)]
pub struct Sequencer {
    config: PingConfig,
    status: JobStatus,
    next_sequence: Sequence,
    issued: u16,
    send_failures: u16,
    next_send: Option<Instant>,
    in_flight: IndexMap<Sequence, Instant>,
    stats: StatsAccumulator,
}

impl Sequencer {
    /// Create a `Sequencer` in the [`JobStatus::Running`] state, the first probe is sent on the
    /// first tick.
    #[must_use]
    pub fn new(config: PingConfig) -> Self {
        Self {
            config: config.clamped(),
            status: JobStatus::Running,
            next_sequence: Sequence(0),
            issued: 0,
            send_failures: 0,
            next_send: None,
            in_flight: IndexMap::new(),
            stats: StatsAccumulator::new(),
        }
    }

    /// The current status and statistics.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.status, self.stats.stats())
    }

    /// Advance the state machine, a no-op once a terminal status has been reached.
    #[instrument(skip_all, level = "trace")]
    pub fn tick<N: Network + ?Sized>(&mut self, network: &mut N, now: Instant) -> JobStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        self.drain_responses(network);
        self.expire(now);
        self.send_due(network, now);
        self.update_status();
        self.status
    }

    fn drain_responses<N: Network + ?Sized>(&mut self, network: &mut N) {
        loop {
            match network.recv_probe() {
                Ok(Some(resp)) => self.on_response(&resp),
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%err, "failed to receive");
                    break;
                }
            }
        }
    }

    fn on_response(&mut self, resp: &Response) {
        let data = resp.data();
        let Some(sent) = self.in_flight.shift_remove(&data.sequence) else {
            tracing::trace!(sequence = data.sequence.0, "discarding stale response");
            return;
        };
        let outcome = match resp {
            Response::EchoReply(data) => self.echo_reply_outcome(data, sent),
            Response::TimeExceeded(data, code) => {
                tracing::debug!(
                    sequence = data.sequence.0,
                    addr = %data.addr,
                    icmp = control_message_name(IcmpType::TimeExceeded, *code),
                    "echo request expired"
                );
                ProbeOutcome::Error
            }
            Response::DestinationUnreachable(data, code) => {
                tracing::debug!(
                    sequence = data.sequence.0,
                    addr = %data.addr,
                    icmp = control_message_name(IcmpType::DestinationUnreachable, *code),
                    "echo request undeliverable"
                );
                ProbeOutcome::Error
            }
        };
        self.stats.on_probe_outcome(outcome);
    }

    fn echo_reply_outcome(&self, data: &ResponseData, sent: Instant) -> ProbeOutcome {
        let rtt = data.recv.saturating_duration_since(sent);
        if rtt > self.config.timeout {
            tracing::debug!(sequence = data.sequence.0, ?rtt, "late echo reply");
            return ProbeOutcome::Timeout;
        }
        match data.ttl {
            Some(ttl) => tracing::debug!(
                sequence = data.sequence.0,
                addr = %data.addr,
                ?rtt,
                ttl,
                hops = estimate_hops(ttl),
                "echo reply"
            ),
            None => tracing::debug!(
                sequence = data.sequence.0,
                addr = %data.addr,
                ?rtt,
                "echo reply"
            ),
        }
        ProbeOutcome::Reply(rtt)
    }

    fn expire(&mut self, now: Instant) {
        let timeout = self.config.timeout;
        let stats = &mut self.stats;
        self.in_flight.retain(|sequence, sent| {
            let expired = now.saturating_duration_since(*sent) >= timeout;
            if expired {
                tracing::debug!(sequence = sequence.0, "echo request timed out");
                stats.on_probe_outcome(ProbeOutcome::Timeout);
            }
            !expired
        });
    }

    fn send_due<N: Network + ?Sized>(&mut self, network: &mut N, now: Instant) {
        if self.issued >= self.config.num_requests {
            return;
        }
        if self.next_send.is_some_and(|next_send| now < next_send) {
            return;
        }
        let sequence = self.next_sequence;
        match network.send_probe(Probe::new(sequence, self.config.ttl)) {
            Ok(()) => {
                tracing::trace!(sequence = sequence.0, "sent echo request");
                self.in_flight.insert(sequence, now);
            }
            Err(err) => {
                match err {
                    Error::ProbeFailed(_) => tracing::debug!(%err, sequence = sequence.0),
                    _ => tracing::warn!(%err, sequence = sequence.0, "failed to send"),
                }
                self.send_failures += 1;
                self.stats.on_probe_outcome(ProbeOutcome::Error);
            }
        }
        self.issued += 1;
        self.next_sequence += Sequence(1);
        self.next_send = Some(now + self.config.interval);
    }

    fn update_status(&mut self) {
        if self.issued < self.config.num_requests || !self.in_flight.is_empty() {
            return;
        }
        self.status = if self.send_failures == self.issued {
            JobStatus::Error
        } else {
            JobStatus::Finished
        };
        tracing::debug!(status = %self.status, stats = ?self.stats.stats(), "job complete");
    }
}

/// Estimate the number of hops a reply has traversed from its remaining ttl.
///
/// The estimate assumes an initial ttl of 256, except that a remaining ttl of 64 (a typical
/// initial ttl on the local network) is a single hop and a remaining ttl of 128 is the local host.
#[must_use]
pub const fn estimate_hops(ttl: u8) -> u16 {
    match 256 - ttl as u16 {
        192 => 1,
        128 => 0,
        hops => hops,
    }
}
