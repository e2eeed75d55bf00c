//! Taskhost: single-computation task hosting on dedicated threads.
//!
//! # Overview
//!
//! An [`Engine`] runs exactly one root asynchronous computation to a single
//! terminal outcome on a private OS thread with its own FIFO continuation
//! queue. Callers observe completion, failure or abort, and may stop the
//! engine cooperatively (graceful cancel) or forcibly (abort). A companion
//! [`DrainService`] guarantees that continuations arriving after an engine
//! stops accepting work still run exactly once.
//!
//! # Core Guarantees
//!
//! - **One outcome**: the first terminal state recorded wins; later ones are discarded
//! - **FIFO**: continuations of one engine run in order and never concurrently
//! - **No lost continuations**: late work is forwarded to the drain service
//! - **Contained faults**: continuation panics are reported, never propagated
//! - **Immediate abort**: observers see `Aborted` as soon as abort is requested
//!
//! # Module Structure
//!
//! - [`types`]: Core types (identifiers, outcomes, cancel reasons)
//! - [`runtime`]: Engine, context adapter, drain service, configuration
//! - [`cx`]: Context handed to the root computation
//! - [`cancel`]: Cancellation tokens
//! - [`error`]: Error types
//! - [`tracing_compat`]: Logging shim over `tracing`

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]

pub mod cancel;
pub mod cx;
pub mod error;
pub mod runtime;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod tracing_compat;
pub mod types;

// Re-exports for convenient access to core types
pub use cancel::{CancelRegistration, CancelToken};
pub use cx::EngineCx;
pub use error::{BoxError, Error, ErrorCategory, ErrorKind, Result};
pub use runtime::{
    ConfigError, ContextAdapter, Continuation, DrainConfig, DrainService, Engine, EngineBuilder,
    EngineConfig, ErrorSink, Fault, FaultOrigin, Fetched, LogSink, OperationStats,
};
pub use types::{CancelKind, CancelReason, EngineId, PanicPayload, StateKind, TerminalState};
