//! Error types and error handling strategy for the task host.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Computation errors are captured once and rethrown only at observation sites
//! - Abort is a distinguished kind, never confused with an ordinary failure
//! - Panics are isolated and converted to [`ErrorKind::Panicked`]
//!
//! # Error Categories
//!
//! - **Computation**: the hosted root computation returned an error or panicked
//! - **Cancellation**: forced abort or an observed graceful cancel
//! - **Continuation**: a queued continuation panicked (reported, never propagated)
//! - **Lifecycle**: thread creation and configuration failures
//! - **Internal**: invariant violations
//!
//! Timeouts are not errors. `wait` and `get_result` report them as a plain
//! boolean outcome and leave engine state untouched.

use core::fmt;
use std::sync::Arc;

use crate::types::{CancelReason, EngineId, PanicPayload};

/// Boxed error accepted from hosted computations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Computation ===
    /// The root computation returned an error.
    Failed,
    /// The root computation panicked.
    Panicked,

    // === Cancellation ===
    /// The engine was forced to stop.
    Aborted,
    /// Graceful cancellation was observed at a checkpoint.
    Cancelled,

    // === Continuation ===
    /// A queued continuation panicked while being invoked.
    ContinuationPanicked,

    // === Lifecycle ===
    /// The dedicated thread could not be created.
    SpawnFailed,
    /// A configuration value could not be parsed or applied.
    Config,

    // === Internal ===
    /// Internal invariant violation (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Failed | Self::Panicked => ErrorCategory::Computation,
            Self::Aborted | Self::Cancelled => ErrorCategory::Cancellation,
            Self::ContinuationPanicked => ErrorCategory::Continuation,
            Self::SpawnFailed | Self::Config => ErrorCategory::Lifecycle,
            Self::Internal => ErrorCategory::Internal,
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Failures produced by the hosted computation.
    Computation,
    /// Abort and graceful cancellation.
    Cancellation,
    /// Failures inside queued continuations.
    Continuation,
    /// Thread and configuration failures.
    Lifecycle,
    /// Internal errors.
    Internal,
}

/// The main error type for task host operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    engine: Option<EngineId>,
    reason: Option<CancelReason>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            engine: None,
            reason: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns true if the engine was forced to stop.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self.kind, ErrorKind::Aborted)
    }

    /// Returns true if this error reports an observed graceful cancel.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if the hosted computation itself failed.
    #[must_use]
    pub const fn is_computation_failure(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Computation)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Attributes the error to an engine.
    #[must_use]
    pub const fn with_engine(mut self, engine: EngineId) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the engine this error is attributed to, if any.
    #[must_use]
    pub const fn engine(&self) -> Option<EngineId> {
        self.engine
    }

    /// Returns the cancellation reason for `Aborted` and `Cancelled` errors.
    #[must_use]
    pub const fn cancel_reason(&self) -> Option<&CancelReason> {
        self.reason.as_ref()
    }

    /// Captures an error returned by a hosted computation.
    ///
    /// The computation's own error becomes the source and its text the message.
    #[must_use]
    pub fn failed(source: BoxError) -> Self {
        let message = source.to_string();
        Self {
            kind: ErrorKind::Failed,
            message: Some(message),
            source: Some(Arc::from(source)),
            engine: None,
            reason: None,
        }
    }

    /// Converts an error returned by a hosted computation.
    ///
    /// An [`Error`] produced by this crate (for example by a cancellation
    /// checkpoint) keeps its kind; anything else becomes [`ErrorKind::Failed`].
    #[must_use]
    pub fn from_computation(source: BoxError) -> Self {
        match source.downcast::<Self>() {
            Ok(err) => *err,
            Err(other) => Self::failed(other),
        }
    }

    /// Captures a panic raised by a hosted computation.
    #[must_use]
    pub fn panicked(payload: &PanicPayload) -> Self {
        Self::new(ErrorKind::Panicked).with_message(payload.message())
    }

    /// Creates a forced-abort error from a structured reason.
    #[must_use]
    pub fn aborted(reason: &CancelReason) -> Self {
        let mut err = Self::new(ErrorKind::Aborted).with_message(format!("{reason}"));
        err.reason = Some(reason.clone());
        err
    }

    /// Creates a graceful-cancellation error from a structured reason.
    #[must_use]
    pub fn cancelled(reason: &CancelReason) -> Self {
        let mut err = Self::new(ErrorKind::Cancelled).with_message(format!("{reason}"));
        err.reason = Some(reason.clone());
        err
    }

    /// Creates a thread spawn error.
    #[must_use]
    pub fn spawn_failed(source: std::io::Error) -> Self {
        Self::new(ErrorKind::SpawnFailed)
            .with_message(format!("failed to spawn dedicated thread: {source}"))
            .with_source(source)
    }

    /// Creates an internal error (bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// A specialized Result type for task host operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
