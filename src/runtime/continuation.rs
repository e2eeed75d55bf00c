//! Continuation entries.
//!
//! A [`Continuation`] is a deferred callback representing "resume here". It is
//! immutable once enqueued and owned by whichever mailbox accepted it: the
//! engine's own dispatch queue or the orphan drain service.

use crate::types::PanicPayload;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A deferred callback plus its captured state.
pub struct Continuation {
    callback: Box<dyn FnOnce() + Send + 'static>,
    label: Option<&'static str>,
}

impl Continuation {
    /// Wraps a closure as a continuation.
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            callback: Box::new(callback),
            label: None,
        }
    }

    /// Builds a continuation from a callback and the opaque state it receives.
    pub fn with_state<S, F>(callback: F, state: S) -> Self
    where
        S: Send + 'static,
        F: FnOnce(S) + Send + 'static,
    {
        Self::new(move || callback(state))
    }

    /// Attaches a static label used in diagnostics.
    #[must_use]
    pub fn labeled(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// Returns the diagnostic label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&'static str> {
        self.label
    }

    /// Runs the callback, converting a panic into a payload.
    pub(crate) fn invoke(self) -> Result<(), PanicPayload> {
        let callback = self.callback;
        catch_unwind(AssertUnwindSafe(callback)).map_err(|p| PanicPayload::from_any(p.as_ref()))
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
