//! The engine context type.
//!
//! `EngineCx` is handed to the root computation when its engine starts:
//! - Querying identity (engine id)
//! - Checking graceful cancellation and abort status
//! - Cooperative checkpoints for use with `?`
//! - Scheduling continuations onto the engine's dispatch queue
//! - Yielding back to the dispatch loop
//!
//! # Cancellation Tiers
//!
//! Graceful cancellation is advisory: the engine loop never inspects the
//! graceful token, so the computation decides when to stop. Abort is forced:
//! the engine records `Aborted` immediately and drops the computation at its
//! next suspension point. Both are visible here so cooperative code can stop
//! early.
//!
//! # Thread Safety
//!
//! `EngineCx` is `Send + Sync` and cheap to clone. Continuations scheduled
//! through any clone run on the owning engine's thread, or on the drain service
//! once the engine has stopped accepting work.

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::runtime::adapter::ContextAdapter;
use crate::runtime::continuation::Continuation;
use crate::types::{CancelReason, EngineId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Context handed to an engine's root computation.
#[derive(Clone)]
pub struct EngineCx {
    adapter: Arc<ContextAdapter>,
    cancel: CancelToken,
}

impl EngineCx {
    pub(crate) fn new(adapter: Arc<ContextAdapter>, cancel: CancelToken) -> Self {
        Self { adapter, cancel }
    }

    /// The hosting engine's id.
    #[must_use]
    pub fn engine_id(&self) -> EngineId {
        self.adapter.engine_id()
    }

    /// Returns true if graceful cancellation was requested.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns true if the engine is being forced to stop.
    #[must_use]
    pub fn is_abort_requested(&self) -> bool {
        self.adapter.is_abort_requested()
    }

    /// Checks both cancellation tiers and returns an error if either fired.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::Aborted` if an abort was requested, otherwise
    /// `ErrorKind::Cancelled` if graceful cancellation was requested.
    #[allow(clippy::result_large_err)]
    pub fn checkpoint(&self) -> Result<(), Error> {
        if self.adapter.is_abort_requested() {
            let reason = self.adapter.abort_reason().unwrap_or_else(CancelReason::abort);
            return Err(Error::aborted(&reason).with_engine(self.engine_id()));
        }
        if let Some(reason) = self.cancel.reason() {
            return Err(Error::cancelled(&reason).with_engine(self.engine_id()));
        }
        Ok(())
    }

    /// The graceful cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Schedules `f` to run on the engine's thread.
    pub fn schedule<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.adapter.schedule(Continuation::new(f));
    }

    /// Schedules a prepared continuation.
    pub fn schedule_continuation(&self, continuation: Continuation) {
        self.adapter.schedule(continuation);
    }

    /// Suspends once, letting queued continuations run before resuming.
    #[must_use]
    pub fn yield_now(&self) -> YieldNow {
        YieldNow { yielded: false }
    }

    /// The engine's context adapter.
    #[must_use]
    pub fn adapter(&self) -> &Arc<ContextAdapter> {
        &self.adapter
    }
}

impl std::fmt::Debug for EngineCx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCx")
            .field("engine", &self.engine_id())
            .field("cancel_requested", &self.is_cancel_requested())
            .field("abort_requested", &self.is_abort_requested())
            .finish()
    }
}

/// Future returned by [`EngineCx::yield_now`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
