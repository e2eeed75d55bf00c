//! Computation context.
//!
//! The [`EngineCx`] type is the handle a hosted root computation receives. It
//! exposes the engine's identity, both cancellation tiers, cooperative
//! checkpoints, and scheduling of continuations back onto the engine.
//!
//! # For Code Running On An Engine
//!
//! ```ignore
//! use taskhost::EngineCx;
//!
//! async fn work(items: Vec<u32>, cx: EngineCx) -> Result<u32, taskhost::Error> {
//!     let mut total = 0;
//!     for item in items {
//!         cx.checkpoint()?;
//!         total += item;
//!         cx.yield_now().await;
//!     }
//!     Ok(total)
//! }
//! ```

pub mod cx;

pub use cx::{EngineCx, YieldNow};
