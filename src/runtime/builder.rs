//! Engine builder.
//!
//! ```ignore
//! use taskhost::{DrainService, EngineBuilder};
//!
//! let drain = DrainService::process()?;
//! let engine = EngineBuilder::new(drain)
//!     .thread_name_prefix("ingest")
//!     .track_operations(true)
//!     .spawn(|path: String, cx| async move { load(path, cx).await }, input)?;
//! ```

use crate::cancel::CancelToken;
use crate::cx::EngineCx;
use crate::error::{BoxError, Error};
use crate::runtime::config::EngineConfig;
use crate::runtime::drain::DrainService;
use crate::runtime::engine::{spawn_engine, Engine};
use crate::runtime::env_config::apply_env_overrides;
use crate::runtime::sink::ErrorSink;
use std::future::Future;
use std::sync::Arc;

/// Builder for starting an engine with custom configuration.
#[derive(Clone)]
pub struct EngineBuilder {
    config: EngineConfig,
    drain: Arc<DrainService>,
    cancel: Option<CancelToken>,
    abort: Option<CancelToken>,
}

impl EngineBuilder {
    /// Create a new builder with default configuration.
    ///
    /// Late continuations of the engine go to `drain`.
    #[must_use]
    pub fn new(drain: Arc<DrainService>) -> Self {
        Self {
            config: EngineConfig::default(),
            drain,
            cancel: None,
            abort: None,
        }
    }

    /// Create a builder from defaults overridden by `TASKHOST_*` variables.
    ///
    /// Builder methods called afterwards take precedence over the environment.
    pub fn from_env(drain: Arc<DrainService>) -> Result<Self, Error> {
        let mut builder = Self::new(drain);
        apply_env_overrides(&mut builder.config)?;
        Ok(builder)
    }

    /// Create a builder from a TOML file, then environment overrides.
    #[cfg(feature = "config-file")]
    pub fn from_config_file(
        drain: Arc<DrainService>,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, Error> {
        use crate::runtime::env_config::{apply_toml_config, parse_toml_file};

        let toml = parse_toml_file(path.as_ref())?;
        let mut builder = Self::new(drain);
        apply_toml_config(&mut builder.config, &toml);
        apply_env_overrides(&mut builder.config)?;
        Ok(builder)
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the dedicated thread's stack size.
    #[must_use]
    pub fn thread_stack_size(mut self, size: usize) -> Self {
        self.config.thread_stack_size = size;
        self
    }

    /// Set the dedicated thread's name prefix.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Enable or disable the diagnostic operation counters.
    #[must_use]
    pub fn track_operations(mut self, enable: bool) -> Self {
        self.config.track_operations = enable;
        self
    }

    /// Set the sink receiving continuation panics caught by the loop.
    #[must_use]
    pub fn error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.config.error_sink = Arc::new(sink);
        self
    }

    /// Use `token` as the graceful (advisory) cancellation token.
    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Abort the engine when `token` is cancelled.
    #[must_use]
    pub fn abort_token(mut self, token: CancelToken) -> Self {
        self.abort = Some(token);
        self
    }

    /// Register a callback to run when the dedicated thread starts.
    #[must_use]
    pub fn on_thread_start<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.config.on_thread_start = Some(Arc::new(f));
        self
    }

    /// Register a callback to run when the dedicated thread stops.
    #[must_use]
    pub fn on_thread_stop<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.config.on_thread_stop = Some(Arc::new(f));
        self
    }

    /// Returns the configuration the engine would start with.
    #[must_use]
    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start `root(input, cx)` on a new dedicated thread.
    ///
    /// Returns as soon as the thread is created.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::SpawnFailed` if the OS refuses the thread.
    pub fn spawn<I, T, E, F, Fut>(self, root: F, input: I) -> Result<Engine<T>, Error>
    where
        I: Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + 'static,
        F: FnOnce(I, EngineCx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut config = self.config;
        config.normalize();
        spawn_engine(
            config,
            self.drain,
            self.cancel.unwrap_or_default(),
            self.abort,
            root,
            input,
        )
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("cancel_token", &self.cancel.is_some())
            .field("abort_token", &self.abort.is_some())
            .finish_non_exhaustive()
    }
}
