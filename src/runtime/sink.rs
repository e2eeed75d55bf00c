//! Error sink for faults that must not propagate.
//!
//! Continuation panics are caught where they are invoked (engine loop or drain
//! thread), turned into a [`Fault`], handed to the configured [`ErrorSink`],
//! and swallowed. The default sink logs through `tracing`.

use crate::error::{Error, ErrorKind};
use crate::runtime::continuation::Continuation;
use crate::tracing_compat::{error, warn};
use crate::types::{EngineId, PanicPayload};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Where a fault was caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultOrigin {
    /// A continuation invoked by an engine's dispatch loop.
    EngineLoop,
    /// A continuation invoked by the orphan drain service.
    DrainService,
    /// Dropping an abandoned root computation.
    RootTeardown,
    /// An `on_thread_stop` hook.
    ThreadHook,
}

impl fmt::Display for FaultOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EngineLoop => write!(f, "engine loop"),
            Self::DrainService => write!(f, "drain service"),
            Self::RootTeardown => write!(f, "root teardown"),
            Self::ThreadHook => write!(f, "thread hook"),
        }
    }
}

/// An unexpected error reported to an [`ErrorSink`].
#[derive(Debug, Clone)]
pub struct Fault {
    /// Where the fault was caught.
    pub origin: FaultOrigin,
    /// The engine the failing work belonged to, if known.
    pub owner: Option<EngineId>,
    /// Diagnostic label of the failing continuation, if any.
    pub label: Option<&'static str>,
    /// The captured error.
    pub error: Error,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.origin)?;
        if let Some(owner) = self.owner {
            write!(f, " [{owner}]")?;
        }
        if let Some(label) = self.label {
            write!(f, " ({label})")?;
        }
        write!(f, ": {}", self.error)
    }
}

/// Receiver for faults that are contained rather than propagated.
pub trait ErrorSink: Send + Sync {
    /// Called once per fault, on the thread that caught it.
    fn report(&self, fault: &Fault);
}

impl<F> ErrorSink for F
where
    F: Fn(&Fault) + Send + Sync,
{
    fn report(&self, fault: &Fault) {
        self(fault);
    }
}

/// Default sink: emits an error-level `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, fault: &Fault) {
        error!(
            origin = %fault.origin,
            owner = ?fault.owner,
            label = ?fault.label,
            error = %fault.error,
            "unexpected fault contained"
        );
        #[cfg(not(feature = "tracing-integration"))]
        let _ = fault;
    }
}

/// Hands `fault` to `sink`, falling back to [`LogSink`] if the sink panics.
///
/// The loops that call this must survive a misbehaving sink.
pub(crate) fn report_contained(sink: &dyn ErrorSink, fault: &Fault) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| sink.report(fault))) {
        let payload = PanicPayload::from_any(payload.as_ref());
        warn!(panic = %payload, "error sink panicked, falling back to log sink");
        #[cfg(not(feature = "tracing-integration"))]
        let _ = payload;
        LogSink.report(fault);
    }
}

/// Invokes a continuation, reporting a panic to `sink` instead of unwinding.
///
/// Returns `true` if the continuation completed normally.
pub(crate) fn invoke_reported(
    continuation: Continuation,
    origin: FaultOrigin,
    owner: Option<EngineId>,
    sink: &dyn ErrorSink,
) -> bool {
    let label = continuation.label();
    match continuation.invoke() {
        Ok(()) => true,
        Err(payload) => {
            let mut err = Error::new(ErrorKind::ContinuationPanicked).with_message(payload.message());
            if let Some(owner) = owner {
                err = err.with_engine(owner);
            }
            report_contained(
                sink,
                &Fault {
                    origin,
                    owner,
                    label,
                    error: err,
                },
            );
            false
        }
    }
}
