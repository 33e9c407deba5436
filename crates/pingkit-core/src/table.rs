use crate::config::PingConfig;
use crate::error::{Error, Result};
use crate::stats::Snapshot;
use crate::types::JobHandle;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// The record of a job shared between the [`JobTable`] and the scheduler.
#[derive(Debug)]
pub struct JobSlot {
    handle: JobHandle,
    host: String,
    config: PingConfig,
    snapshot: RwLock<Snapshot>,
}

impl JobSlot {
    fn new(handle: JobHandle, host: String, config: PingConfig) -> Self {
        Self {
            handle,
            host,
            config,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    #[must_use]
    pub const fn handle(&self) -> JobHandle {
        self.handle
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn config(&self) -> &PingConfig {
        &self.config
    }

    /// A copy of the most recently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshot.read()
    }

    /// Replace the snapshot as a single value.
    pub fn publish(&self, snapshot: Snapshot) {
        *self.snapshot.write() = snapshot;
    }
}

/// Owns every job, keyed by an opaque handle.
#[derive(Debug)]
pub struct JobTable {
    capacity: usize,
    next_handle: AtomicU32,
    jobs: RwLock<HashMap<JobHandle, Arc<JobSlot>>>,
}

impl JobTable {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_handle: AtomicU32::new(1),
            jobs: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Add a job in the [`JobStatus::Inactive`](crate::JobStatus::Inactive) state.
    pub fn create(&self, host: impl Into<String>, config: PingConfig) -> Result<Arc<JobSlot>> {
        let mut jobs = self.jobs.write();
        if jobs.len() >= self.capacity {
            return Err(Error::JobTableFull(self.capacity));
        }
        let handle = self
            .next_handle
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |handle| {
                handle.checked_add(1)
            })
            .map(JobHandle)
            .map_err(|_| Error::Other(String::from("job handles exhausted")))?;
        let slot = Arc::new(JobSlot::new(handle, host.into(), config));
        jobs.insert(handle, slot.clone());
        Ok(slot)
    }

    /// A copy of the current snapshot of a job.
    #[must_use]
    pub fn poll(&self, handle: JobHandle) -> Option<Snapshot> {
        self.jobs.read().get(&handle).map(|slot| slot.snapshot())
    }

    #[must_use]
    pub fn is_valid(&self, handle: JobHandle) -> bool {
        self.jobs.read().contains_key(&handle)
    }

    /// Remove a job, returning `true` if it existed.
    pub fn discard(&self, handle: JobHandle) -> bool {
        self.jobs.write().remove(&handle).is_some()
    }

    /// Remove every job.
    pub fn clear(&self) {
        self.jobs.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Stats;
    use crate::types::JobStatus;
    use std::thread;

    #[test]
    fn test_create_and_poll() -> anyhow::Result<()> {
        let table = JobTable::new(4);
        let slot = table.create("localhost", PingConfig::default())?;
        assert_eq!(JobHandle(1), slot.handle());
        assert_eq!("localhost", slot.host());
        assert_eq!(&PingConfig::default(), slot.config());
        assert!(table.is_valid(slot.handle()));
        assert_eq!(Some(Snapshot::default()), table.poll(slot.handle()));
        assert_eq!(
            Some(JobStatus::Inactive),
            table.poll(slot.handle()).map(|s| s.status)
        );
        Ok(())
    }

    #[test]
    fn test_publish() -> anyhow::Result<()> {
        let table = JobTable::new(4);
        let slot = table.create("localhost", PingConfig::default())?;
        let stats = Stats {
            sent: 2,
            received: 1,
            lost: 1,
            pct_lost: 50_f32,
            ..Stats::default()
        };
        slot.publish(Snapshot::new(JobStatus::Running, stats));
        let snapshot = table.poll(slot.handle()).ok_or_else(|| anyhow::anyhow!("missing"))?;
        assert_eq!(JobStatus::Running, snapshot.status);
        assert_eq!(stats, snapshot.stats);
        Ok(())
    }

    #[test]
    fn test_handles_are_never_reused() -> anyhow::Result<()> {
        let table = JobTable::new(1);
        let first = table.create("a", PingConfig::default())?.handle();
        assert!(table.discard(first));
        let second = table.create("b", PingConfig::default())?.handle();
        assert_ne!(first, second);
        assert_eq!(JobHandle(2), second);
        assert!(!table.is_valid(first));
        assert_eq!(None, table.poll(first));
        Ok(())
    }

    #[test]
    fn test_full() -> anyhow::Result<()> {
        let table = JobTable::new(2);
        table.create("a", PingConfig::default())?;
        table.create("b", PingConfig::default())?;
        let err = table.create("c", PingConfig::default()).unwrap_err();
        assert!(matches!(err, Error::JobTableFull(2)));
        assert_eq!(2, table.len());
        Ok(())
    }

    #[test]
    fn test_discard_unknown() {
        let table = JobTable::new(2);
        assert!(!table.discard(JobHandle(7)));
        assert!(!table.discard(JobHandle::INVALID));
    }

    #[test]
    fn test_clear() -> anyhow::Result<()> {
        let table = JobTable::new(2);
        let slot = table.create("a", PingConfig::default())?;
        table.clear();
        assert!(table.is_empty());
        assert!(!table.is_valid(slot.handle()));
        Ok(())
    }

    #[test]
    fn test_concurrent_create() {
        let table = Arc::new(JobTable::new(64));
        let threads = (0..8)
            .map(|i| {
                let table = table.clone();
                thread::spawn(move || {
                    (0..8)
                        .map(|j| {
                            table
                                .create(format!("host-{i}-{j}"), PingConfig::default())
                                .map(|slot| slot.handle())
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        let mut handles = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect::<Result<Vec<_>>>()
            .unwrap();
        handles.sort_unstable();
        handles.dedup();
        assert_eq!(64, handles.len());
        assert_eq!(64, table.len());
        assert!(matches!(
            table.create("extra", PingConfig::default()),
            Err(Error::JobTableFull(64))
        ));
    }
}
