//! Engine and drain-service configuration types.
//!
//! These types hold the concrete values that drive thread creation and
//! diagnostics. In most cases you should use
//! [`EngineBuilder`](super::builder::EngineBuilder) to configure an engine
//! rather than creating an [`EngineConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `thread_name_prefix` | `"taskhost-engine"` |
//! | `thread_stack_size` | 2 MiB |
//! | `track_operations` | false |
//! | `DrainConfig::thread_name` | `"taskhost-drain"` |
//! | `DrainConfig::thread_stack_size` | 2 MiB |

use crate::runtime::sink::{ErrorSink, LogSink};
use std::fmt;
use std::sync::Arc;

/// Default stack size for dedicated threads.
pub const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
/// Default name prefix for engine threads.
pub const DEFAULT_ENGINE_THREAD_PREFIX: &str = "taskhost-engine";
/// Default name of the drain thread.
pub const DEFAULT_DRAIN_THREAD_NAME: &str = "taskhost-drain";

/// Callback run on a dedicated thread.
pub type ThreadHook = Arc<dyn Fn() + Send + Sync>;

/// Per-engine configuration.
#[derive(Clone)]
pub struct EngineConfig {
    /// Name prefix for the dedicated thread; the engine id is appended.
    pub thread_name_prefix: String,
    /// Stack size of the dedicated thread.
    pub thread_stack_size: usize,
    /// Maintain started/completed operation counters.
    pub track_operations: bool,
    /// Receiver for continuation panics caught by the dispatch loop.
    pub error_sink: Arc<dyn ErrorSink>,
    /// Callback executed when the dedicated thread starts.
    pub on_thread_start: Option<ThreadHook>,
    /// Callback executed when the dedicated thread stops.
    pub on_thread_stop: Option<ThreadHook>,
}

impl EngineConfig {
    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.thread_stack_size == 0 {
            self.thread_stack_size = DEFAULT_STACK_SIZE;
        }
        if self.thread_name_prefix.is_empty() {
            self.thread_name_prefix = DEFAULT_ENGINE_THREAD_PREFIX.to_string();
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: DEFAULT_ENGINE_THREAD_PREFIX.to_string(),
            thread_stack_size: DEFAULT_STACK_SIZE,
            track_operations: false,
            error_sink: Arc::new(LogSink),
            on_thread_start: None,
            on_thread_stop: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("thread_stack_size", &self.thread_stack_size)
            .field("track_operations", &self.track_operations)
            .field("on_thread_start", &self.on_thread_start.is_some())
            .field("on_thread_stop", &self.on_thread_stop.is_some())
            .finish_non_exhaustive()
    }
}

/// Configuration of an orphan drain service.
#[derive(Clone)]
pub struct DrainConfig {
    /// Name of the drain thread.
    pub thread_name: String,
    /// Stack size of the drain thread.
    pub thread_stack_size: usize,
    /// Receiver for continuation panics caught on the drain thread.
    pub error_sink: Arc<dyn ErrorSink>,
}

impl DrainConfig {
    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.thread_stack_size == 0 {
            self.thread_stack_size = DEFAULT_STACK_SIZE;
        }
        if self.thread_name.is_empty() {
            self.thread_name = DEFAULT_DRAIN_THREAD_NAME.to_string();
        }
    }

    /// Replaces the error sink.
    #[must_use]
    pub fn with_error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.error_sink = Arc::new(sink);
        self
    }

    /// Replaces the thread name.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_DRAIN_THREAD_NAME.to_string(),
            thread_stack_size: DEFAULT_STACK_SIZE,
            error_sink: Arc::new(LogSink),
        }
    }
}

impl fmt::Debug for DrainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrainConfig")
            .field("thread_name", &self.thread_name)
            .field("thread_stack_size", &self.thread_stack_size)
            .finish_non_exhaustive()
    }
}
