//! Test utilities for the task host.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - A collecting error sink for asserting on reported faults
//! - A manually opened gate future for driving suspensions
//!
//! # Example
//! ```ignore
//! use taskhost::test_utils::init_test_logging;
//!
//! fn my_test() {
//!     init_test_logging();
//!     taskhost::test_phase!("my_test");
//! }
//! ```

use crate::runtime::sink::{ErrorSink, Fault};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Once};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Serializes tests that mutate process environment variables.
pub fn env_lock() -> parking_lot::MutexGuard<'static, ()> {
    ENV_LOCK.lock()
}

/// Polls `condition` until it holds or `timeout` elapses.
///
/// Returns the final value of the condition.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Error sink that records every fault it receives.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    faults: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rendered faults received so far.
    #[must_use]
    pub fn faults(&self) -> Vec<String> {
        self.faults.lock().clone()
    }

    /// Returns how many faults were reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.faults.lock().len()
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faults.lock().is_empty()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, fault: &Fault) {
        tracing::debug!(fault = %fault, "collecting sink received fault");
        self.faults.lock().push(fault.to_string());
    }
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    waker: Option<Waker>,
}

/// A future that stays pending until [`Gate::open`] is called.
///
/// Clones share state, so a test can hand one clone to a hosted computation
/// and open it from the test thread.
#[derive(Debug, Default, Clone)]
pub struct Gate {
    state: Arc<Mutex<GateState>>,
}

impl Gate {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the gate and wakes the waiting computation, if any.
    pub fn open(&self) {
        let waker = {
            let mut state = self.state.lock();
            state.open = true;
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Returns true once the gate has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Returns true while a computation is parked on the gate.
    #[must_use]
    pub fn has_waiter(&self) -> bool {
        self.state.lock().waker.is_some()
    }
}

impl Future for Gate {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.state.lock();
        if state.open {
            Poll::Ready(())
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that a terminal state is `Completed` with a specific value.
#[macro_export]
macro_rules! assert_completed {
    ($state:expr, $expected:expr) => {
        match $state {
            $crate::types::TerminalState::Completed(v) => assert_eq!(v, $expected),
            other => unreachable!("expected Completed({:?}), got {:?}", $expected, other),
        }
    };
}

/// Assert that a terminal state is `Aborted`.
#[macro_export]
macro_rules! assert_aborted {
    ($state:expr) => {
        match $state {
            $crate::types::TerminalState::Aborted(_) => {}
            other => unreachable!("expected Aborted, got {:?}", other),
        }
    };
}

/// Assert that a terminal state is `Failed`.
#[macro_export]
macro_rules! assert_failed {
    ($state:expr) => {
        match $state {
            $crate::types::TerminalState::Failed(_) => {}
            other => unreachable!("expected Failed, got {:?}", other),
        }
    };
}
