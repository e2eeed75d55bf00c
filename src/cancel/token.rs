//! Shareable one-shot cancellation token.

use crate::types::CancelReason;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

type Listener = Box<dyn FnOnce(&CancelReason) + Send>;

struct TokenState {
    reason: Option<CancelReason>,
    listeners: Vec<(u64, Listener)>,
    next_listener: u64,
}

struct TokenInner {
    cancelled: AtomicBool,
    state: Mutex<TokenState>,
}

/// A cancellation signal that can be cloned and shared across threads.
///
/// Cancelling is one-shot: the first [`cancel_with`](Self::cancel_with) wins and
/// later calls are ignored. Listeners registered with
/// [`on_cancel`](Self::on_cancel) run exactly once, on the cancelling thread,
/// after the token's lock has been released.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                state: Mutex::new(TokenState {
                    reason: None,
                    listeners: Vec::new(),
                    next_listener: 0,
                }),
            }),
        }
    }

    /// Requests cancellation with the default (graceful) reason.
    ///
    /// Returns `true` if this call performed the cancellation.
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::default())
    }

    /// Requests cancellation with an explicit reason.
    ///
    /// Returns `true` if this call performed the cancellation.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        let listeners = {
            let mut state = self.inner.state.lock();
            if state.reason.is_some() {
                return false;
            }
            state.reason = Some(reason.clone());
            self.inner.cancelled.store(true, Ordering::Release);
            std::mem::take(&mut state.listeners)
        };
        for (_, listener) in listeners {
            listener(&reason);
        }
        true
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns the reason recorded by the winning cancel call.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        self.inner.state.lock().reason.clone()
    }

    /// Registers a listener that runs once when the token is cancelled.
    ///
    /// If the token is already cancelled the listener runs immediately on the
    /// calling thread. Dropping the returned registration removes a listener
    /// that has not fired yet.
    pub fn on_cancel<F>(&self, listener: F) -> CancelRegistration
    where
        F: FnOnce(&CancelReason) + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if let Some(reason) = state.reason.clone() {
            drop(state);
            listener(&reason);
            return CancelRegistration {
                token: Weak::new(),
                id: None,
            };
        }
        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.push((id, Box::new(listener)));
        CancelRegistration {
            token: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Returns the number of listeners still waiting for cancellation.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Handle for a listener registered with [`CancelToken::on_cancel`].
///
/// Dropping it deregisters the listener if it has not fired.
#[must_use = "dropping the registration removes the listener"]
pub struct CancelRegistration {
    token: Weak<TokenInner>,
    id: Option<u64>,
}

impl CancelRegistration {
    /// Keeps the listener registered for the token's whole lifetime.
    pub fn forget(mut self) {
        self.id = None;
    }
}

impl Drop for CancelRegistration {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(inner) = self.token.upgrade() {
            inner.state.lock().listeners.retain(|(lid, _)| *lid != id);
        }
    }
}

impl fmt::Debug for CancelRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelRegistration")
            .field("id", &self.id)
            .finish()
    }
}
