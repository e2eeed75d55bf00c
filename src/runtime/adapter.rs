//! Context adapter: the resumption target installed on an engine's thread.
//!
//! Work that wants to continue "on the engine" goes through the adapter. While
//! the dispatch queue is open, [`ContextAdapter::schedule`] enqueues and wakes
//! the loop; once it is closed, the continuation is forwarded to the orphan
//! drain service under the engine's id. Wakes of the root computation arrive
//! through [`ContextAdapter::resume`], which enqueues a deduplicated resume.
//!
//! The adapter is also the thread's ambient context: while the dedicated
//! thread runs, [`ContextAdapter::current`] returns it.

use crate::runtime::continuation::Continuation;
use crate::runtime::drain::DrainService;
use crate::runtime::queue::{DispatchQueue, Entry};
use crate::runtime::sink::ErrorSink;
use crate::tracing_compat::trace;
use crate::types::{CancelReason, EngineId};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

thread_local! {
    static CURRENT_ADAPTER: RefCell<Option<Arc<ContextAdapter>>> = const { RefCell::new(None) };
}

/// Snapshot of the diagnostic operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationStats {
    /// Operations reported as started.
    pub started: u64,
    /// Operations reported as completed.
    pub completed: u64,
    /// `started - completed`, saturating at zero.
    pub outstanding: u64,
}

/// Per-engine scheduling target.
///
/// One adapter belongs to exactly one engine and is never shared between
/// engines.
pub struct ContextAdapter {
    id: EngineId,
    queue: DispatchQueue,
    abort_requested: AtomicBool,
    abort_reason: Mutex<Option<CancelReason>>,
    drain: Arc<DrainService>,
    sink: Arc<dyn ErrorSink>,
    track_operations: bool,
    started: AtomicU64,
    completed: AtomicU64,
    forwarded: AtomicU64,
}

impl ContextAdapter {
    pub(crate) fn new(
        id: EngineId,
        drain: Arc<DrainService>,
        sink: Arc<dyn ErrorSink>,
        track_operations: bool,
    ) -> Self {
        Self {
            id,
            queue: DispatchQueue::new(),
            abort_requested: AtomicBool::new(false),
            abort_reason: Mutex::new(None),
            drain,
            sink,
            track_operations,
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
        }
    }

    /// Returns the adapter installed on the current thread, if any.
    #[must_use]
    pub fn current() -> Option<Arc<Self>> {
        CURRENT_ADAPTER.with(|slot| slot.borrow().clone())
    }

    /// Installs `adapter` as the current thread's ambient adapter.
    pub(crate) fn enter(adapter: Arc<Self>) -> AdapterGuard {
        let prev = CURRENT_ADAPTER.with(|slot| slot.borrow_mut().replace(adapter));
        AdapterGuard { prev }
    }

    /// The owning engine's id.
    #[must_use]
    pub fn engine_id(&self) -> EngineId {
        self.id
    }

    /// Runs `continuation` on the engine thread, or on the drain service if
    /// the engine no longer accepts work.
    pub fn schedule(&self, continuation: Continuation) {
        self.operation_started();
        match self.queue.push(continuation) {
            Ok(depth) => {
                trace!(engine = %self.id, depth, "continuation enqueued");
            }
            Err(continuation) => {
                // Queue lock is already released here.
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                self.drain.schedule(Some(self.id), continuation);
                self.operation_completed();
            }
        }
    }

    /// Requests another poll of the root computation.
    ///
    /// No-op once the engine has stopped accepting work.
    pub fn resume(&self) {
        if self.queue.push_resume() {
            trace!(engine = %self.id, "root resume enqueued");
        }
    }

    /// Records the start of an outstanding operation.
    pub fn operation_started(&self) {
        if self.track_operations {
            self.started.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Records the completion of an outstanding operation.
    pub fn operation_completed(&self) {
        if self.track_operations {
            self.completed.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Returns the operation counters. All zero unless tracking is enabled.
    #[must_use]
    pub fn operations(&self) -> OperationStats {
        let started = self.started.load(Ordering::Acquire);
        let completed = self.completed.load(Ordering::Acquire);
        OperationStats {
            started,
            completed,
            outstanding: started.saturating_sub(completed),
        }
    }

    /// Returns true if no tracked operation is outstanding.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.operations().outstanding == 0
    }

    /// Number of continuations forwarded to the drain service.
    #[must_use]
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Returns true if the engine no longer accepts work on its own queue.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Number of entries waiting in the dispatch queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Returns true once an abort has been requested.
    #[must_use]
    pub fn is_abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::Acquire)
    }

    /// The reason recorded by the first abort request.
    #[must_use]
    pub fn abort_reason(&self) -> Option<CancelReason> {
        self.abort_reason.lock().clone()
    }

    /// Sets the abort flag and wakes the loop. Returns `true` on the first request.
    pub(crate) fn request_abort(&self, reason: CancelReason) -> bool {
        let first = {
            let mut slot = self.abort_reason.lock();
            match slot.as_mut() {
                Some(existing) => {
                    existing.strengthen(&reason);
                    false
                }
                None => {
                    *slot = Some(reason);
                    true
                }
            }
        };
        self.abort_requested.store(true, Ordering::Release);
        self.queue.wake();
        first
    }

    pub(crate) fn drain(&self) -> &Arc<DrainService> {
        &self.drain
    }

    pub(crate) fn sink(&self) -> &dyn ErrorSink {
        self.sink.as_ref()
    }

    pub(crate) fn wait_for_work(&self) {
        self.queue.wait_for_work(&self.abort_requested);
    }

    pub(crate) fn next_entry(&self) -> Option<Entry> {
        self.queue.pop()
    }

    pub(crate) fn close(&self) -> std::collections::VecDeque<Entry> {
        self.queue.close()
    }
}

impl fmt::Debug for ContextAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextAdapter")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("abort_requested", &self.is_abort_requested())
            .field("operations", &self.operations())
            .finish_non_exhaustive()
    }
}

/// Restores the previously installed adapter on drop.
pub(crate) struct AdapterGuard {
    prev: Option<Arc<ContextAdapter>>,
}

impl Drop for AdapterGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT_ADAPTER.with(|slot| *slot.borrow_mut() = prev);
    }
}
