//! Engine runtime.
//!
//! This module contains the task-hosting machinery:
//!
//! - [`config`]: Engine and drain-service configuration types
//! - [`env_config`]: `TASKHOST_*` environment and TOML overrides
//! - [`builder`]: Fluent engine builder
//! - [`engine`]: Engine core, dedicated thread and dispatch loop
//! - [`adapter`]: Context adapter (scheduling target and ambient context)
//! - [`continuation`]: Deferred callbacks
//! - [`drain`]: Orphan drain service
//! - [`sink`]: Error sink for contained faults
//!
//! Internal pieces: the dispatch queue, the first-writer-wins terminal cell,
//! and the waker bridge that turns wakes into resumes.
//!
//! # Engine Builder
//!
//! Engines are configured with a fluent, move-based builder. Each builder
//! method consumes `self` and returns an updated builder.
//!
//! ## Quick Start
//!
//! ```ignore
//! use taskhost::runtime::{DrainService, Engine};
//!
//! let engine = Engine::start(DrainService::process()?, |n: u32, cx| async move {
//!     cx.yield_now().await;
//!     Ok::<_, taskhost::Error>(n * 2)
//! }, 21)?;
//! assert_eq!(engine.result()?, 42);
//! ```
//!
//! ## Cancellation
//!
//! ```ignore
//! use taskhost::{CancelToken, EngineBuilder};
//!
//! let graceful = CancelToken::new();
//! let abort = CancelToken::new();
//! let engine = EngineBuilder::new(drain)
//!     .cancel_token(graceful.clone())
//!     .abort_token(abort.clone())
//!     .spawn(root, input)?;
//! abort.cancel(); // engine is Aborted from here on
//! ```
//!
//! ## Environment Overrides
//!
//! ```ignore
//! let engine = EngineBuilder::from_env(drain)?
//!     .thread_name_prefix("explicit-wins")
//!     .spawn(root, input)?;
//! ```
//!
//! # Error Handling
//!
//! Root errors and panics are captured as `Failed`; abort as `Aborted`. They
//! surface only through [`Engine::get_result`], [`Engine::result`] and
//! [`Engine::join`]. Panicking continuations are reported to the configured
//! [`ErrorSink`] and never stop a loop.

pub mod adapter;
pub mod builder;
pub mod config;
pub mod continuation;
pub mod drain;
pub mod engine;
pub mod env_config;
pub(crate) mod queue;
pub mod sink;
pub(crate) mod state;
pub(crate) mod waker;

pub use adapter::{ContextAdapter, OperationStats};
pub use builder::EngineBuilder;
pub use config::{DrainConfig, EngineConfig};
pub use continuation::Continuation;
pub use drain::{DrainService, OwnerKey};
pub use engine::{Engine, Fetched};
pub use env_config::ConfigError;
pub use sink::{ErrorSink, Fault, FaultOrigin, LogSink};
