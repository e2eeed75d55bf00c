//! Per-engine dispatch queue.
//!
//! An ordered, thread-safe mailbox of pending work for one engine. Entries
//! are either a resume of the root computation or an explicit continuation.
//! The queue can be closed while entries still drain; after that, pushes are
//! refused and the caller forwards the continuation elsewhere.
//!
//! The queue lock guards the entries, the closed flag, and the pending-resume
//! marker. It is never held while a continuation runs or while handing work
//! to the drain service.

use crate::runtime::continuation::Continuation;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// One unit of work in the dispatch queue.
#[derive(Debug)]
pub(crate) enum Entry {
    /// Poll the root computation again.
    Resume,
    /// Invoke an explicit continuation.
    Run(Continuation),
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<Entry>,
    closed: bool,
    resume_pending: bool,
}

/// FIFO mailbox with a wake signal.
#[derive(Debug, Default)]
pub(crate) struct DispatchQueue {
    state: Mutex<QueueState>,
    wake: Condvar,
}

impl DispatchQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a continuation and wakes the dispatch loop.
    ///
    /// Returns the continuation back if the queue is closed.
    pub(crate) fn push(&self, continuation: Continuation) -> Result<usize, Continuation> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(continuation);
        }
        state.entries.push_back(Entry::Run(continuation));
        let depth = state.entries.len();
        drop(state);
        self.wake.notify_one();
        Ok(depth)
    }

    /// Appends a resume of the root computation unless one is already queued.
    ///
    /// Returns `false` if the queue is closed or a resume was already pending.
    pub(crate) fn push_resume(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed || state.resume_pending {
            return false;
        }
        state.resume_pending = true;
        state.entries.push_back(Entry::Resume);
        drop(state);
        self.wake.notify_one();
        true
    }

    /// Pops the head entry.
    pub(crate) fn pop(&self) -> Option<Entry> {
        let mut state = self.state.lock();
        let entry = state.entries.pop_front();
        if matches!(entry, Some(Entry::Resume)) {
            state.resume_pending = false;
        }
        entry
    }

    /// Blocks until an entry is available or `interrupt` is set.
    pub(crate) fn wait_for_work(&self, interrupt: &AtomicBool) {
        let mut state = self.state.lock();
        while state.entries.is_empty() && !interrupt.load(Ordering::Acquire) {
            self.wake.wait(&mut state);
        }
    }

    /// Wakes the dispatch loop without enqueuing anything.
    ///
    /// Taking the lock orders this wake after any flag the caller just set,
    /// so a loop about to sleep cannot miss it.
    pub(crate) fn wake(&self) {
        let _state = self.state.lock();
        self.wake.notify_all();
    }

    /// Closes the queue and returns whatever was still queued.
    pub(crate) fn close(&self) -> VecDeque<Entry> {
        let mut state = self.state.lock();
        state.closed = true;
        state.resume_pending = false;
        std::mem::take(&mut state.entries)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }
}
