//! A C ABI for the `pingkit` ICMP echo engine.
//!
//! The library exposes a single process wide [`Engine`] through four entry
//! points:
//!
//! - [`CreatePing`] - create a job and return its [`PingJob`] record by value.
//! - [`PollPingResult`] - refresh a [`PingJob`] record in place.
//! - [`DiscardPing`] - discard a job and clear the handle of its record.
//! - [`ShutdownPing`] - stop the scheduler and discard every job.
//!
//! The engine is created on first use.  No error or panic crosses the
//! boundary, failures are reported through the `status` field of the record.
#![allow(unsafe_code, non_snake_case)]

use parking_lot::Mutex;
use pingkit_core::{
    Engine, EngineConfig, JobHandle, JobStatus, PingConfig, PingConfigBuilder, Snapshot,
};
use std::ffi::{c_char, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

/// The aggregate statistics of a job.
///
/// Round trip times are in milliseconds.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub sent: u32,
    pub received: u32,
    pub lost: u32,
    pub pct_lost: f32,
    pub min_round_trip: f32,
    pub max_round_trip: f32,
    pub avg_round_trip: f32,
    pub std_dev_round_trip: f32,
}

/// The record of a job shared with the caller.
///
/// A `handle` of `0` denotes a job which could not be created.  The `status` is one of `0`
/// (inactive), `1` (running), `2` (finished) or `3` (error).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PingJob {
    pub handle: u32,
    pub status: u32,
    pub stats: Stats,
}

impl PingJob {
    const fn failed() -> Self {
        Self {
            handle: JobHandle::INVALID.0,
            status: JobStatus::Error as u32,
            stats: Stats {
                sent: 0,
                received: 0,
                lost: 0,
                pct_lost: 0_f32,
                min_round_trip: 0_f32,
                max_round_trip: 0_f32,
                avg_round_trip: 0_f32,
                std_dev_round_trip: 0_f32,
            },
        }
    }

    fn update(&mut self, snapshot: &Snapshot) {
        self.status = u32::from(snapshot.status);
        self.stats = Stats::from(&snapshot.stats);
    }

    fn is_terminal(&self) -> bool {
        self.status == u32::from(JobStatus::Finished) || self.status == u32::from(JobStatus::Error)
    }
}

impl From<&pingkit_core::Stats> for Stats {
    fn from(value: &pingkit_core::Stats) -> Self {
        Self {
            sent: value.sent,
            received: value.received,
            lost: value.lost,
            pct_lost: value.pct_lost,
            min_round_trip: value.min_rtt,
            max_round_trip: value.max_rtt,
            avg_round_trip: value.avg_rtt,
            std_dev_round_trip: value.std_dev_rtt,
        }
    }
}

static ENGINE: Mutex<Option<Engine>> = Mutex::new(None);

/// The process wide engine, created on first use.
fn engine() -> pingkit_core::Result<Engine> {
    get_or_create(&ENGINE, || Engine::new(EngineConfig::default()))
}

/// The engine in `slot`, or a new one from `create`.
///
/// `create` runs without the lock held, so polls of an existing engine never wait behind
/// privilege discovery or resolver startup.  If another caller fills `slot` first, its engine
/// wins and the new one is dropped.
fn get_or_create(
    slot: &Mutex<Option<Engine>>,
    create: impl FnOnce() -> pingkit_core::Result<Engine>,
) -> pingkit_core::Result<Engine> {
    let existing = slot.lock().clone();
    if let Some(engine) = existing {
        return Ok(engine);
    }
    let created = create()?;
    let mut slot = slot.lock();
    if let Some(engine) = slot.as_ref() {
        tracing::debug!("engine created concurrently, keeping the first");
        return Ok(engine.clone());
    }
    *slot = Some(created.clone());
    Ok(created)
}

/// The process wide engine, if one has been created.
fn existing_engine() -> Option<Engine> {
    ENGINE.lock().clone()
}

/// Run `f`, returning `fallback` if it panics.
fn guard<T>(name: &str, fallback: T, f: impl FnOnce() -> T) -> T {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        tracing::error!(name, "panic caught at the C boundary");
        fallback
    })
}

/// Read a nul terminated UTF-8 host name.
///
/// # Safety
///
/// `host` must be null or point to a nul terminated string which remains valid for `'a`.
unsafe fn host_str<'a>(host: *const c_char) -> Option<&'a str> {
    if host.is_null() {
        return None;
    }
    CStr::from_ptr(host).to_str().ok()
}

fn create_ping(host: Option<&str>, config: PingConfig) -> PingJob {
    let Some(host) = host else {
        tracing::warn!("host is null or not valid UTF-8");
        return PingJob::failed();
    };
    match engine().and_then(|engine| engine.create(host, config)) {
        Ok(handle) => PingJob {
            handle: handle.0,
            status: u32::from(JobStatus::Inactive),
            stats: Stats::default(),
        },
        Err(err) => {
            tracing::warn!(host, %err, "failed to create ping job");
            PingJob::failed()
        }
    }
}

fn poll_ping_result(job: &mut PingJob) -> bool {
    let handle = JobHandle(job.handle);
    if !handle.is_valid() {
        return job.is_terminal();
    }
    match existing_engine().map(|engine| engine.poll(handle)) {
        Some(Ok((finished, snapshot))) => {
            job.update(&snapshot);
            finished
        }
        Some(Err(err)) => {
            tracing::debug!(%handle, %err, "poll failed");
            job.status = u32::from(JobStatus::Error);
            true
        }
        None => {
            tracing::debug!(%handle, "poll before any job was created");
            job.status = u32::from(JobStatus::Error);
            true
        }
    }
}

fn discard_ping(job: &mut PingJob) {
    if let Some(engine) = existing_engine() {
        engine.discard(JobHandle(job.handle));
    }
    job.handle = JobHandle::INVALID.0;
}

/// Create a job which pings `host` and return its record.
///
/// Out of range arguments are clamped.  If the job cannot be created the record has a `handle`
/// of `0` and an error `status`.
///
/// # Safety
///
/// `host` must be null or point to a nul terminated string which is valid for the duration of
/// the call.
#[no_mangle]
pub unsafe extern "C" fn CreatePing(
    host: *const c_char,
    num_requests: u16,
    data_size: u16,
    ttl: u8,
    timeout_ms: u16,
    interval_ms: u16,
) -> PingJob {
    let config = PingConfigBuilder::new()
        .num_requests(num_requests)
        .data_size(data_size)
        .ttl(ttl)
        .timeout(Duration::from_millis(u64::from(timeout_ms)))
        .interval(Duration::from_millis(u64::from(interval_ms)))
        .build();
    let host = host_str(host);
    guard("CreatePing", PingJob::failed(), || create_ping(host, config))
}

/// Refresh the record of a job in place.
///
/// Returns `true` if the job has finished, successfully or not, and `false` if it is still in
/// progress or `job` is null.
///
/// # Safety
///
/// `job` must be null or point to a valid, writable [`PingJob`].
#[no_mangle]
pub unsafe extern "C" fn PollPingResult(job: *mut PingJob) -> bool {
    let Some(job) = job.as_mut() else {
        return false;
    };
    guard("PollPingResult", true, || poll_ping_result(job))
}

/// Discard a job and clear the handle of its record.
///
/// # Safety
///
/// `job` must be null or point to a valid, writable [`PingJob`].
#[no_mangle]
pub unsafe extern "C" fn DiscardPing(job: *mut PingJob) {
    if let Some(job) = job.as_mut() {
        guard("DiscardPing", (), || discard_ping(job));
    }
}

/// Stop the scheduler and discard every job.
///
/// The engine remains usable, the next [`CreatePing`] restarts the scheduler.
#[no_mangle]
pub extern "C" fn ShutdownPing() {
    guard("ShutdownPing", (), || {
        if let Some(engine) = existing_engine() {
            engine.shutdown();
        }
    });
}
