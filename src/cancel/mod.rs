//! Cancellation signals.
//!
//! A [`CancelToken`] is a shareable, one-shot cancellation flag. Engines use
//! two of them: a graceful token that the hosted computation may observe, and
//! an abort token whose firing forces the engine to `Aborted`. Callers also
//! pass tokens to `wait`/`get_result` to stop blocking early.

pub mod token;

pub use token::{CancelRegistration, CancelToken};
