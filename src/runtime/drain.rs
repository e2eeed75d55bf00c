//! Orphan drain service.
//!
//! Once an engine closes its dispatch queue, continuations that still arrive
//! for it are handed here. The service owns one thread that runs every entry
//! it receives exactly once, in arrival order per owner. Entries are filed in
//! a table keyed by the owning engine; when the owner's thread exits its
//! remaining entries are re-filed under [`OwnerKey::Unowned`].
//!
//! A process-lifetime instance is available through [`DrainService::process`].
//! Services created with [`DrainService::start`] drain their remaining work,
//! then stop their thread when the last handle is dropped.

use crate::error::Error;
use crate::runtime::config::DrainConfig;
use crate::runtime::continuation::Continuation;
use crate::runtime::env_config::apply_drain_env_overrides;
use crate::runtime::sink::{invoke_reported, ErrorSink, FaultOrigin};
use crate::tracing_compat::{debug, trace, warn};
use crate::types::EngineId;
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Mailbox key in the drain table.
///
/// `Unowned` orders first, so re-filed entries of an exited engine always run
/// before anything filed later under that engine's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OwnerKey {
    /// Entries whose owner is unknown or has exited.
    Unowned,
    /// Entries owned by a live (or recently live) engine.
    Engine(EngineId),
}

impl OwnerKey {
    fn engine(self) -> Option<EngineId> {
        match self {
            Self::Unowned => None,
            Self::Engine(id) => Some(id),
        }
    }
}

impl From<Option<EngineId>> for OwnerKey {
    fn from(owner: Option<EngineId>) -> Self {
        owner.map_or(Self::Unowned, Self::Engine)
    }
}

#[derive(Default)]
struct DrainTable {
    owners: BTreeMap<OwnerKey, VecDeque<Continuation>>,
    /// Queued plus in-flight entries.
    pending: usize,
    shutdown: bool,
}

struct DrainInner {
    table: Mutex<DrainTable>,
    work: Condvar,
    idle: Condvar,
    sink: Arc<dyn ErrorSink>,
    executed: AtomicU64,
}

/// Process-wide runner of continuations whose engine no longer accepts work.
pub struct DrainService {
    inner: Arc<DrainInner>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    name: String,
}

static PROCESS: Mutex<Option<Arc<DrainService>>> = parking_lot::const_mutex(None);

impl DrainService {
    /// Starts a drain service with its own thread.
    pub fn start(mut config: DrainConfig) -> Result<Arc<Self>, Error> {
        config.normalize();
        let inner = Arc::new(DrainInner {
            table: Mutex::new(DrainTable::default()),
            work: Condvar::new(),
            idle: Condvar::new(),
            sink: Arc::clone(&config.error_sink),
            executed: AtomicU64::new(0),
        });
        let worker = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .stack_size(config.thread_stack_size)
            .spawn(move || drain_loop(&worker))
            .map_err(Error::spawn_failed)?;
        let thread_id = handle.thread().id();
        debug!(thread = %config.thread_name, "drain service started");
        Ok(Arc::new(Self {
            inner,
            thread: Mutex::new(Some(handle)),
            thread_id,
            name: config.thread_name,
        }))
    }

    /// Returns the process-lifetime drain service, starting it on first use.
    ///
    /// The instance honours the `TASKHOST_DRAIN_*` environment variables and
    /// is never torn down.
    pub fn process() -> Result<Arc<Self>, Error> {
        let mut slot = PROCESS.lock();
        if let Some(service) = slot.as_ref() {
            return Ok(Arc::clone(service));
        }
        let mut config = DrainConfig::default();
        if let Err(err) = apply_drain_env_overrides(&mut config) {
            warn!(error = %err, "ignoring invalid drain service environment override");
            config = DrainConfig::default();
        }
        let service = Self::start(config)?;
        *slot = Some(Arc::clone(&service));
        drop(slot);
        Ok(service)
    }

    /// Files a continuation under `owner` and wakes the drain thread.
    pub fn schedule(&self, owner: Option<EngineId>, continuation: Continuation) {
        let key = OwnerKey::from(owner);
        let mut table = self.inner.table.lock();
        table.owners.entry(key).or_default().push_back(continuation);
        table.pending += 1;
        let pending = table.pending;
        drop(table);
        self.inner.work.notify_one();
        trace!(owner = ?key, pending, "continuation handed to drain service");
    }

    /// Re-files every entry still queued under `owner` as unowned.
    ///
    /// Entries keep their relative order and are appended after any entries
    /// already unowned.
    pub fn remove_owner(&self, owner: EngineId) {
        let mut table = self.inner.table.lock();
        let Some(mut entries) = table.owners.remove(&OwnerKey::Engine(owner)) else {
            return;
        };
        let moved = entries.len();
        table
            .owners
            .entry(OwnerKey::Unowned)
            .or_default()
            .append(&mut entries);
        drop(table);
        if moved > 0 {
            trace!(owner = %owner, moved, "re-filed exited owner's entries as unowned");
        }
    }

    /// Number of entries queued or currently running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.table.lock().pending
    }

    /// Number of entries queued under `owner` and not yet taken by the drain thread.
    #[must_use]
    pub fn pending_for(&self, owner: Option<EngineId>) -> usize {
        self.inner
            .table
            .lock()
            .owners
            .get(&OwnerKey::from(owner))
            .map_or(0, VecDeque::len)
    }

    /// Total number of entries run since the service started.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.inner.executed.load(Ordering::Acquire)
    }

    /// Blocks until no entry is queued or running, or `timeout` elapses.
    ///
    /// Returns `true` if the service was idle on return.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut table = self.inner.table.lock();
        while table.pending > 0 {
            match deadline {
                Some(deadline) => {
                    if self.inner.idle.wait_until(&mut table, deadline).timed_out() {
                        return table.pending == 0;
                    }
                }
                None => self.inner.idle.wait(&mut table),
            }
        }
        true
    }

    /// Returns true if called from the drain thread.
    #[must_use]
    pub fn is_drain_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }
}

fn drain_loop(inner: &DrainInner) {
    loop {
        let batch = {
            let mut table = inner.table.lock();
            while table.owners.is_empty() && !table.shutdown {
                inner.work.wait(&mut table);
            }
            if table.owners.is_empty() {
                break;
            }
            std::mem::take(&mut table.owners)
        };

        let mut ran = 0usize;
        for (owner, entries) in batch {
            for continuation in entries {
                invoke_reported(
                    continuation,
                    FaultOrigin::DrainService,
                    owner.engine(),
                    inner.sink.as_ref(),
                );
                ran += 1;
                inner.executed.fetch_add(1, Ordering::AcqRel);
            }
        }

        let mut table = inner.table.lock();
        table.pending = table.pending.saturating_sub(ran);
        if table.pending == 0 {
            inner.idle.notify_all();
        }
    }
    debug!("drain service stopped");
}

impl Drop for DrainService {
    fn drop(&mut self) {
        self.inner.table.lock().shutdown = true;
        self.inner.work.notify_all();
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        if self.is_drain_thread() {
            // The last handle died inside a drained continuation; the loop
            // exits on its own once the table is empty.
            return;
        }
        if handle.join().is_err() {
            warn!(thread = %self.name, "drain thread panicked during shutdown");
        }
    }
}

impl fmt::Debug for DrainService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.inner.table.lock();
        f.debug_struct("DrainService")
            .field("thread", &self.name)
            .field("owners", &table.owners.len())
            .field("pending", &table.pending)
            .field("executed", &self.inner.executed.load(Ordering::Relaxed))
            .finish()
    }
}
