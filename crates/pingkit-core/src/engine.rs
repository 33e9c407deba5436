use crate::config::{EngineConfig, PingConfig, PrivilegeMode};
use crate::error::{Error, Result};
use crate::net::{Connector, SocketConnector};
use crate::resolver::HostResolver;
use crate::stats::Snapshot;
use crate::types::JobHandle;
use pingkit_dns::DnsResolver;
use pingkit_privilege::Privilege;
use std::sync::Arc;
use tracing::instrument;

/// A concurrent ping engine.
///
/// The engine owns a table of jobs and a single scheduler thread which drives every job.  The
/// scheduler is started on demand by [`Engine::create`] and exits on its own once it has had
/// no jobs to drive for the configured idle timeout.
///
/// `Engine` is cheap to clone, all clones share the same jobs and scheduler.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<inner::EngineInner>,
}

impl Engine {
    /// Create an engine with a system DNS resolver and platform sockets.
    ///
    /// If the privilege mode is not configured it is discovered from the capabilities of the
    /// current process.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let privilege_mode = discover_privilege_mode(config.privilege_mode)?;
        let resolver =
            DnsResolver::start(config.dns).map_err(|err| Error::Other(err.to_string()))?;
        tracing::debug!(?config, ?privilege_mode, "engine created");
        Ok(Self::with_components(
            config,
            privilege_mode,
            Arc::new(resolver),
            Arc::new(SocketConnector),
        ))
    }

    /// Create an engine from explicit components.
    #[must_use]
    pub fn with_components(
        config: EngineConfig,
        privilege_mode: PrivilegeMode,
        resolver: Arc<dyn HostResolver>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            inner: Arc::new(inner::EngineInner::new(
                config,
                privilege_mode,
                resolver,
                connector,
            )),
        }
    }

    /// Start the scheduler if it is not already running.
    pub fn start(&self) -> Result<()> {
        self.inner.start()
    }

    /// Stop the scheduler and discard every job.
    ///
    /// The engine may be used again afterwards, the scheduler is restarted by the next
    /// [`Engine::create`].
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Create a job to ping `host` and return its handle.
    ///
    /// The job starts in [`JobStatus::Inactive`](crate::JobStatus::Inactive) and is driven to
    /// completion by the scheduler.
    #[instrument(skip(self), level = "debug")]
    pub fn create(&self, host: &str, config: PingConfig) -> Result<JobHandle> {
        self.inner.create(host, config)
    }

    /// Return whether the job has finished together with a copy of its current snapshot.
    ///
    /// Polling has no side effects and may be repeated any number of times.
    pub fn poll(&self, handle: JobHandle) -> Result<(bool, Snapshot)> {
        let snapshot = self.inner.poll(handle).ok_or(Error::UnknownJob(handle))?;
        Ok((snapshot.is_finished(), snapshot))
    }

    #[must_use]
    pub fn is_valid(&self, handle: JobHandle) -> bool {
        self.inner.is_valid(handle)
    }

    /// Discard a job, cancelling it if it is still in progress.
    ///
    /// Returns `true` if the job existed.
    pub fn discard(&self, handle: JobHandle) -> bool {
        self.inner.discard(handle)
    }

    /// Is the scheduler currently running?
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// The number of jobs in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.inner.config()
    }

    #[must_use]
    pub fn privilege_mode(&self) -> PrivilegeMode {
        self.inner.privilege_mode()
    }
}

/// Determine the privilege mode to use, preferring an explicitly configured mode.
fn discover_privilege_mode(requested: Option<PrivilegeMode>) -> Result<PrivilegeMode> {
    match requested {
        Some(mode) => Ok(mode),
        None => Ok(select_privilege_mode(&Privilege::acquire_privileges()?)),
    }
}

/// Use raw sockets when privileged or when unprivileged sockets are not supported.
const fn select_privilege_mode(privilege: &Privilege) -> PrivilegeMode {
    if !privilege.has_privileges() && privilege.supports_unprivileged() {
        PrivilegeMode::Unprivileged
    } else {
        PrivilegeMode::Privileged
    }
}

mod inner {
    use crate::config::{ChannelConfig, EngineConfig, PingConfig, PrivilegeMode};
    use crate::error::{Error, Result};
    use crate::net::{Connector, Network};
    use crate::resolver::HostResolver;
    use crate::sequencer::Sequencer;
    use crate::stats::{Snapshot, Stats};
    use crate::table::{JobSlot, JobTable};
    use crate::types::{JobHandle, JobStatus, TraceId};
    use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, SendError, Sender};
    use indexmap::IndexMap;
    use parking_lot::Mutex;
    use pingkit_dns::DnsEntry;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::{Duration, Instant};

    pub(super) struct EngineInner {
        config: EngineConfig,
        table: JobTable,
        context: Arc<Context>,
        scheduler: Arc<Mutex<SchedulerState>>,
    }

    impl EngineInner {
        pub(super) fn new(
            config: EngineConfig,
            privilege_mode: PrivilegeMode,
            resolver: Arc<dyn HostResolver>,
            connector: Arc<dyn Connector>,
        ) -> Self {
            let context = Context {
                privilege_mode,
                identifier_base: identifier_base(),
                min_resolve_timeout: config.min_resolve_timeout,
                resolver,
                connector,
            };
            Self {
                table: JobTable::new(config.max_jobs),
                config,
                context: Arc::new(context),
                scheduler: Arc::new(Mutex::new(SchedulerState::default())),
            }
        }

        pub(super) fn start(&self) -> Result<()> {
            let mut state = self.scheduler.lock();
            self.ensure_running(&mut state).map(|_| ())
        }

        /// The table is cleared under the scheduler lock so that a concurrent `create` either
        /// precedes the shutdown or is driven by the next scheduler.
        pub(super) fn shutdown(&self) {
            let handle = {
                let mut state = self.scheduler.lock();
                if let Some(tx) = state.tx.take() {
                    if tx.send(Command::Shutdown).is_err() {
                        tracing::debug!("scheduler already stopped");
                    }
                }
                self.table.clear();
                state.handle.take()
            };
            if let Some(handle) = handle {
                join(handle);
            }
            tracing::debug!("engine shutdown");
        }

        pub(super) fn create(&self, host: &str, config: PingConfig) -> Result<JobHandle> {
            let mut state = self.scheduler.lock();
            let slot = self.table.create(host, config.clamped())?;
            let handle = slot.handle();
            if let Err(err) = self.send(&mut state, Command::Start(slot, Instant::now())) {
                self.table.discard(handle);
                return Err(err);
            }
            tracing::debug!(%handle, host, "job created");
            Ok(handle)
        }

        pub(super) fn poll(&self, handle: JobHandle) -> Option<Snapshot> {
            self.table.poll(handle)
        }

        pub(super) fn is_valid(&self, handle: JobHandle) -> bool {
            self.table.is_valid(handle)
        }

        pub(super) fn discard(&self, handle: JobHandle) -> bool {
            let state = self.scheduler.lock();
            let existed = self.table.discard(handle);
            if existed {
                if let Some(tx) = &state.tx {
                    if tx.send(Command::Discard(handle)).is_err() {
                        tracing::debug!(%handle, "scheduler stopped before discard");
                    }
                }
                tracing::debug!(%handle, "job discarded");
            }
            existed
        }

        pub(super) fn is_running(&self) -> bool {
            self.scheduler.lock().tx.is_some()
        }

        pub(super) fn len(&self) -> usize {
            self.table.len()
        }

        pub(super) fn is_empty(&self) -> bool {
            self.table.is_empty()
        }

        pub(super) const fn config(&self) -> &EngineConfig {
            &self.config
        }

        pub(super) fn privilege_mode(&self) -> PrivilegeMode {
            self.context.privilege_mode
        }

        /// Send a command to the scheduler, restarting it if it has stopped.
        fn send(&self, state: &mut SchedulerState, command: Command) -> Result<()> {
            let sent = self.ensure_running(state)?.send(command);
            match sent {
                Ok(()) => Ok(()),
                Err(SendError(command)) => {
                    tracing::warn!("scheduler stopped unexpectedly, restarting");
                    state.tx = None;
                    self.ensure_running(state)?
                        .send(command)
                        .map_err(|err| Error::Other(err.to_string()))
                }
            }
        }

        fn ensure_running<'a>(&self, state: &'a mut SchedulerState) -> Result<&'a Sender<Command>> {
            if state.tx.is_none() {
                if let Some(handle) = state.handle.take() {
                    join(handle);
                }
                state.generation = state.generation.wrapping_add(1);
                let (tx, rx) = unbounded();
                let scheduler = Scheduler {
                    generation: state.generation,
                    idle_timeout: self.config.idle_timeout,
                    tick_resolution: self.config.tick_resolution,
                    context: self.context.clone(),
                    state: self.scheduler.clone(),
                    jobs: IndexMap::new(),
                };
                let handle = thread::Builder::new()
                    .name(String::from("ping-scheduler"))
                    .spawn(move || scheduler.run(&rx))
                    .map_err(|err| Error::Other(err.to_string()))?;
                state.handle = Some(handle);
                state.tx = Some(tx);
            }
            state
                .tx
                .as_ref()
                .ok_or_else(|| Error::Other(String::from("scheduler not running")))
        }
    }

    impl Drop for EngineInner {
        fn drop(&mut self) {
            self.shutdown();
        }
    }

    fn join(handle: JoinHandle<()>) {
        if handle.join().is_err() {
            tracing::error!("scheduler panicked");
        }
    }

    fn identifier_base() -> u16 {
        std::process::id() as u16
    }

    #[derive(Debug, Default)]
    struct SchedulerState {
        generation: u64,
        tx: Option<Sender<Command>>,
        handle: Option<JoinHandle<()>>,
    }

    enum Command {
        Start(Arc<JobSlot>, Instant),
        Discard(JobHandle),
        Shutdown,
    }

    /// Shared by every job driven by a scheduler.
    struct Context {
        privilege_mode: PrivilegeMode,
        identifier_base: u16,
        min_resolve_timeout: Duration,
        resolver: Arc<dyn HostResolver>,
        connector: Arc<dyn Connector>,
    }

    impl Context {
        const fn identifier(&self, handle: JobHandle) -> TraceId {
            TraceId(self.identifier_base.wrapping_add(handle.0 as u16))
        }
    }

    struct Scheduler {
        generation: u64,
        idle_timeout: Duration,
        tick_resolution: Duration,
        context: Arc<Context>,
        state: Arc<Mutex<SchedulerState>>,
        jobs: IndexMap<JobHandle, Job>,
    }

    impl Scheduler {
        fn run(mut self, rx: &Receiver<Command>) {
            tracing::debug!(generation = self.generation, "scheduler started");
            let mut idle_since = Instant::now();
            loop {
                let now = Instant::now();
                for job in self.jobs.values_mut() {
                    job.tick(now, &self.context);
                }
                self.jobs.retain(|_, job| !job.is_done());
                let wait = if self.jobs.is_empty() {
                    let idle = now.saturating_duration_since(idle_since);
                    if idle >= self.idle_timeout && self.try_exit(rx) {
                        tracing::debug!(generation = self.generation, "scheduler idle");
                        return;
                    }
                    self.idle_timeout.saturating_sub(idle).max(self.tick_resolution)
                } else {
                    idle_since = now;
                    self.tick_resolution
                };
                match rx.recv_timeout(wait) {
                    Ok(command) => {
                        let commands = std::iter::once(command).chain(rx.try_iter());
                        for command in commands {
                            if !self.handle_command(command) {
                                tracing::debug!(generation = self.generation, "scheduler stopped");
                                return;
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        }

        /// Returns `false` if the scheduler must stop.
        fn handle_command(&mut self, command: Command) -> bool {
            match command {
                Command::Start(slot, created) => {
                    let timeout = slot.config().timeout.max(self.context.min_resolve_timeout);
                    let job = Job::new(slot, created + timeout);
                    self.jobs.insert(job.slot.handle(), job);
                    true
                }
                Command::Discard(handle) => {
                    self.jobs.shift_remove(&handle);
                    true
                }
                Command::Shutdown => false,
            }
        }

        /// Stop accepting commands unless one arrived while deciding to exit.
        fn try_exit(&self, rx: &Receiver<Command>) -> bool {
            let mut state = self.state.lock();
            if !rx.is_empty() {
                return false;
            }
            if state.generation == self.generation {
                state.tx = None;
            }
            true
        }
    }

    enum JobState {
        Resolving {
            deadline: Instant,
        },
        Running {
            network: Box<dyn Network + Send>,
            sequencer: Sequencer,
        },
        Done,
    }

    struct Job {
        slot: Arc<JobSlot>,
        published: Snapshot,
        state: JobState,
    }

    impl Job {
        fn new(slot: Arc<JobSlot>, deadline: Instant) -> Self {
            Self {
                slot,
                published: Snapshot::default(),
                state: JobState::Resolving { deadline },
            }
        }

        const fn is_done(&self) -> bool {
            matches!(self.state, JobState::Done)
        }

        fn tick(&mut self, now: Instant, context: &Context) {
            if let JobState::Resolving { deadline } = self.state {
                self.resolve(now, deadline, context);
            }
            if let JobState::Running { network, sequencer } = &mut self.state {
                let status = sequencer.tick(network.as_mut(), now);
                let snapshot = sequencer.snapshot();
                self.publish(snapshot);
                if status.is_terminal() {
                    tracing::debug!(handle = %self.slot.handle(), %status, stats = ?snapshot.stats, "job completed");
                    self.state = JobState::Done;
                }
            }
        }

        fn resolve(&mut self, now: Instant, deadline: Instant, context: &Context) {
            let host = self.slot.host();
            let entry = context.resolver.lazy_resolve(host);
            match (&entry, entry.addr()) {
                (DnsEntry::Resolved(..), Some(addr)) => self.connect(addr, context),
                (DnsEntry::Pending(_) | DnsEntry::Timeout(_), _) if now < deadline => {}
                (DnsEntry::Pending(_) | DnsEntry::Timeout(_), _) => {
                    let err = Error::ResolutionFailed(format!("{host}: timed out"));
                    self.fail(&err);
                }
                _ => {
                    let err = Error::ResolutionFailed(entry.to_string());
                    self.fail(&err);
                }
            }
        }

        fn connect(&mut self, addr: Ipv4Addr, context: &Context) {
            let handle = self.slot.handle();
            let config = ChannelConfig::new(
                context.privilege_mode,
                addr,
                context.identifier(handle),
                self.slot.config(),
            );
            match context.connector.connect(&config) {
                Ok(network) => {
                    tracing::debug!(%handle, %addr, identifier = config.identifier.0, "job running");
                    self.publish(Snapshot::new(JobStatus::Running, Stats::default()));
                    self.state = JobState::Running {
                        network,
                        sequencer: Sequencer::new(*self.slot.config()),
                    };
                }
                Err(err) => self.fail(&err),
            }
        }

        fn fail(&mut self, err: &Error) {
            tracing::warn!(handle = %self.slot.handle(), host = self.slot.host(), %err, "job failed");
            self.publish(Snapshot::new(JobStatus::Error, Stats::default()));
            self.state = JobState::Done;
        }

        fn publish(&mut self, snapshot: Snapshot) {
            if snapshot != self.published {
                self.slot.publish(snapshot);
                self.published = snapshot;
            }
        }
    }
}
