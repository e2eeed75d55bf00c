//! Core types for the task host.
//!
//! - [`id`]: Engine identifiers
//! - [`outcome`]: Terminal state of a hosted computation and panic payloads
//! - [`cancel`]: Cancellation reason and kind types

pub mod cancel;
pub mod id;
pub mod outcome;

pub use cancel::{CancelKind, CancelReason};
pub use id::EngineId;
pub use outcome::{PanicPayload, StateKind, TerminalState};
