//! Terminal state of a hosted computation.
//!
//! An engine's state is one of:
//!
//! - `Running`: no outcome recorded yet
//! - `Completed(T)`: the root computation resolved with a value
//! - `Failed(Error)`: the root computation returned an error or panicked
//! - `Aborted(Error)`: the engine was forced to stop
//!
//! The three non-running variants are absorbing. The transition out of
//! `Running` happens exactly once; see [`TerminalCell`](crate::runtime::state::TerminalCell).

use crate::error::Error;
use core::fmt;
use std::any::Any;

/// Payload from a caught panic.
///
/// This wraps the panic value for safe transport across thread boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicPayload {
    message: String,
}

impl PanicPayload {
    /// Creates a new panic payload with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Extracts a message from the value returned by `catch_unwind`.
    #[must_use]
    pub fn from_any(payload: &(dyn Any + Send)) -> Self {
        if let Some(s) = payload.downcast_ref::<&str>() {
            Self::new(*s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            Self::new(s.clone())
        } else {
            Self::new("unknown panic")
        }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

/// Value-free discriminant of a [`TerminalState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    /// No outcome recorded yet.
    Running,
    /// The root computation produced a value.
    Completed,
    /// The root computation produced an error.
    Failed,
    /// The engine was forced to stop.
    Aborted,
}

impl StateKind {
    /// Returns true for every variant except `Running`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// The state of an engine's root computation.
#[derive(Debug, Clone)]
pub enum TerminalState<T> {
    /// No outcome recorded yet.
    Running,
    /// Success with a value.
    Completed(T),
    /// The computation returned an error or panicked.
    Failed(Error),
    /// The engine was aborted before the computation finished.
    Aborted(Error),
}

impl<T> TerminalState<T> {
    /// Returns the discriminant of this state.
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::Running => StateKind::Running,
            Self::Completed(_) => StateKind::Completed,
            Self::Failed(_) => StateKind::Failed,
            Self::Aborted(_) => StateKind::Aborted,
        }
    }

    /// Returns true if an outcome has been recorded.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// Returns true if this state is `Aborted`.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// Returns the captured error for `Failed` and `Aborted`.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(e) | Self::Aborted(e) => Some(e),
            _ => None,
        }
    }

    /// Converts a terminal state into a `Result`.
    ///
    /// Returns `None` while the state is still `Running`.
    pub fn into_result(self) -> Option<Result<T, Error>> {
        match self {
            Self::Running => None,
            Self::Completed(v) => Some(Ok(v)),
            Self::Failed(e) | Self::Aborted(e) => Some(Err(e)),
        }
    }
}

impl<T> Default for TerminalState<T> {
    fn default() -> Self {
        Self::Running
    }
}
