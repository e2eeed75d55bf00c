//! Engine core: one root computation on one dedicated thread.
//!
//! An [`Engine`] owns a private OS thread that runs a FIFO dispatch loop. The
//! root computation is a future created and polled only on that thread; every
//! wake enqueues a resume, and user code may schedule explicit continuations
//! through the [`ContextAdapter`]. The first terminal outcome recorded wins.
//!
//! # Lifecycle
//!
//! ```text
//! spawn ──► thread start ──► root(input, cx) ──► Resume ─► poll ─┐
//!                                                  ▲             │ Pending
//!                                                  └── wake ◄────┘
//!                            Ready / panic / abort ──► terminal ──► close queue
//!                            ──► drain leftovers ──► remove owner ──► exit
//! ```
//!
//! Once the queue is closed, late continuations go to the [`DrainService`]
//! under this engine's id, so none is ever dropped.

use crate::cancel::{CancelRegistration, CancelToken};
use crate::cx::EngineCx;
use crate::error::{BoxError, Error};
use crate::runtime::adapter::{ContextAdapter, OperationStats};
use crate::runtime::config::EngineConfig;
use crate::runtime::drain::DrainService;
use crate::runtime::queue::Entry;
use crate::runtime::sink::{invoke_reported, report_contained, Fault, FaultOrigin};
use crate::runtime::state::TerminalCell;
use crate::runtime::waker::resume_waker;
use crate::tracing_compat::{debug, debug_span, trace};
use crate::types::{CancelReason, EngineId, PanicPayload, StateKind, TerminalState};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

/// Value returned by [`Engine::get_result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched<T> {
    /// The completed value, or `T::default()` on timeout or ignored error.
    pub value: T,
    /// False if the engine had not reached a terminal state in time.
    pub completed: bool,
}

#[derive(Debug, Default)]
struct ExitSignal {
    exited: Mutex<bool>,
    cond: Condvar,
}

impl ExitSignal {
    fn signal(&self) {
        *self.exited.lock() = true;
        self.cond.notify_all();
    }

    fn is_set(&self) -> bool {
        *self.exited.lock()
    }

    fn wait(&self) {
        let mut exited = self.exited.lock();
        while !*exited {
            self.cond.wait(&mut exited);
        }
    }
}

/// Signals thread exit even if a hook panics.
struct ExitGuard(Arc<ExitSignal>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.signal();
    }
}

/// Handle to a hosted root computation.
///
/// Dropping the handle never blocks; the dedicated thread keeps running until
/// the computation reaches a terminal state and its queue is drained.
pub struct Engine<T> {
    id: EngineId,
    adapter: Arc<ContextAdapter>,
    terminal: Arc<TerminalCell<T>>,
    exit: Arc<ExitSignal>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    cancel: CancelToken,
}

impl<T: Send + 'static> Engine<T> {
    /// Starts `root(input, cx)` on a new engine with default configuration.
    ///
    /// Shorthand for `EngineBuilder::new(drain).spawn(root, input)`.
    pub fn start<I, E, F, Fut>(drain: Arc<DrainService>, root: F, input: I) -> Result<Self, Error>
    where
        I: Send + 'static,
        E: Into<BoxError> + 'static,
        F: FnOnce(I, EngineCx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>>,
    {
        crate::runtime::builder::EngineBuilder::new(drain).spawn(root, input)
    }

    /// Blocks until the engine is terminal, `timeout` elapses, or `cancel` fires.
    ///
    /// Returns `true` if the engine did **not** reach a terminal state (timed
    /// out or cancelled). Never blocks when called from the engine's own
    /// thread. Does not affect engine state.
    pub fn wait(&self, timeout: Option<Duration>, cancel: Option<&CancelToken>) -> bool {
        !self.wait_terminal(timeout, cancel)
    }

    /// Waits like [`wait`](Self::wait), then returns the outcome.
    ///
    /// On `Failed` or `Aborted` the captured error is returned, unless
    /// `ignore_error` is set, in which case `T::default()` is returned. On
    /// timeout `T::default()` is returned with `completed == false`.
    pub fn get_result(
        &self,
        ignore_error: bool,
        timeout: Option<Duration>,
        cancel: Option<&CancelToken>,
    ) -> Result<Fetched<T>, Error>
    where
        T: Clone + Default,
    {
        if !self.wait_terminal(timeout, cancel) {
            return Ok(Fetched {
                value: T::default(),
                completed: false,
            });
        }
        match self.terminal.snapshot() {
            TerminalState::Completed(value) => Ok(Fetched {
                value,
                completed: true,
            }),
            TerminalState::Failed(err) | TerminalState::Aborted(err) => {
                if ignore_error {
                    Ok(Fetched {
                        value: T::default(),
                        completed: true,
                    })
                } else {
                    Err(err)
                }
            }
            TerminalState::Running => Err(Error::internal("terminal wait returned while running")),
        }
    }

    /// Blocks until terminal and returns a copy of the outcome.
    pub fn result(&self) -> Result<T, Error>
    where
        T: Clone,
    {
        if !self.wait_terminal(None, None) {
            return Err(self.own_thread_error());
        }
        self.terminal
            .snapshot()
            .into_result()
            .unwrap_or_else(|| Err(Error::internal("terminal wait returned while running")))
    }

    /// Returns the outcome if already terminal, without blocking.
    pub fn try_result(&self) -> Option<Result<T, Error>>
    where
        T: Clone,
    {
        self.terminal.snapshot().into_result()
    }

    /// Consumes the handle, waits for the outcome and moves the value out.
    pub fn join(self) -> Result<T, Error> {
        if !self.wait_terminal(None, None) {
            return Err(self.own_thread_error());
        }
        self.terminal
            .take()
            .into_result()
            .unwrap_or_else(|| Err(Error::internal("terminal wait returned while running")))
    }

    /// Forces the engine to stop.
    ///
    /// Records `Aborted` immediately if the engine is still running, wakes the
    /// dispatch loop, and unless `no_wait` is set blocks until the dedicated
    /// thread has exited (never when called from that thread). Idempotent.
    ///
    /// Returns `true` if the terminal state is `Aborted`.
    pub fn abort(&self, no_wait: bool) -> bool {
        abort_engine(&self.adapter, &self.terminal, CancelReason::abort());
        if !no_wait && !self.is_engine_thread() {
            self.exit.wait();
            let handle = self.thread.lock().take();
            if let Some(handle) = handle {
                // The exit signal is the last thing the thread does.
                let _ = handle.join();
            }
        }
        self.terminal.kind() == StateKind::Aborted
    }

    fn wait_terminal(&self, timeout: Option<Duration>, cancel: Option<&CancelToken>) -> bool {
        if self.is_engine_thread() {
            return self.terminal.is_terminal();
        }
        self.terminal.wait(timeout, cancel)
    }

    fn own_thread_error(&self) -> Error {
        Error::internal("blocking wait on the engine's own thread before completion")
            .with_engine(self.id)
    }
}

impl<T> Engine<T> {
    /// The engine's process-unique id.
    #[must_use]
    pub fn id(&self) -> EngineId {
        self.id
    }

    /// Current state kind.
    #[must_use]
    pub fn state(&self) -> StateKind {
        self.terminal.kind()
    }

    /// Returns true once an outcome has been recorded.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_terminal()
    }

    /// Returns true if the recorded outcome is `Aborted`.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.terminal.kind() == StateKind::Aborted
    }

    /// Returns true once the dedicated thread has finished draining and exited.
    #[must_use]
    pub fn is_thread_exited(&self) -> bool {
        self.exit.is_set()
    }

    /// Returns true if called from the engine's dedicated thread.
    #[must_use]
    pub fn is_engine_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// The engine's scheduling target.
    #[must_use]
    pub fn adapter(&self) -> Arc<ContextAdapter> {
        Arc::clone(&self.adapter)
    }

    /// Operation counters (all zero unless tracking is enabled).
    #[must_use]
    pub fn operations(&self) -> OperationStats {
        self.adapter.operations()
    }

    /// The graceful cancellation token observed by the computation.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Requests graceful cancellation. Advisory only.
    pub fn request_cancel(&self) -> bool {
        self.cancel
            .cancel_with(CancelReason::graceful("engine cancel requested"))
    }
}

impl<T> fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("state", &self.terminal.kind())
            .field("thread_exited", &self.exit.is_set())
            .finish_non_exhaustive()
    }
}

/// Sets the abort flag and records `Aborted` if nothing was recorded yet.
fn abort_engine<T>(adapter: &ContextAdapter, terminal: &TerminalCell<T>, reason: CancelReason) {
    if adapter.request_abort(reason.clone()) {
        debug!(engine = %adapter.engine_id(), reason = %reason, "abort requested");
    }
    commit_abort(adapter, terminal);
}

fn commit_abort<T>(adapter: &ContextAdapter, terminal: &TerminalCell<T>) {
    let reason = adapter.abort_reason().unwrap_or_else(CancelReason::abort);
    let err = Error::aborted(&reason).with_engine(adapter.engine_id());
    if terminal.commit(TerminalState::Aborted(err)) {
        debug!(engine = %adapter.engine_id(), "engine aborted");
    }
}

/// Builds the engine and starts its dedicated thread.
pub(crate) fn spawn_engine<I, T, E, F, Fut>(
    config: EngineConfig,
    drain: Arc<DrainService>,
    cancel: CancelToken,
    abort_token: Option<CancelToken>,
    root: F,
    input: I,
) -> Result<Engine<T>, Error>
where
    I: Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + 'static,
    F: FnOnce(I, EngineCx) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>>,
{
    let id = EngineId::next();
    let adapter = Arc::new(ContextAdapter::new(
        id,
        drain,
        Arc::clone(&config.error_sink),
        config.track_operations,
    ));
    let terminal = Arc::new(TerminalCell::new());
    let exit = Arc::new(ExitSignal::default());

    let registration = abort_token.map(|token| {
        let adapter = Arc::clone(&adapter);
        let terminal = Arc::clone(&terminal);
        token.on_cancel(move |_| abort_engine(&adapter, &terminal, CancelReason::abort_token()))
    });

    let host = Host {
        id,
        adapter: Arc::clone(&adapter),
        terminal: Arc::clone(&terminal),
        exit: Arc::clone(&exit),
        cancel: cancel.clone(),
        on_thread_start: config.on_thread_start.clone(),
        on_thread_stop: config.on_thread_stop.clone(),
        registration,
    };

    let name = format!("{}-{}", config.thread_name_prefix, id.as_u64());
    let handle = std::thread::Builder::new()
        .name(name)
        .stack_size(config.thread_stack_size)
        .spawn(move || host.run(root, input))
        .map_err(|e| Error::spawn_failed(e).with_engine(id))?;
    let thread_id = handle.thread().id();
    debug!(engine = %id, "engine spawned");

    Ok(Engine {
        id,
        adapter,
        terminal,
        exit,
        thread: Mutex::new(Some(handle)),
        thread_id,
        cancel,
    })
}

/// Closes the queue if the thread unwinds before the normal teardown.
///
/// Queued continuations are handed to the drain service and the engine is
/// marked failed, so neither work nor waiters are stranded.
struct UnwindGuard<T> {
    id: EngineId,
    adapter: Arc<ContextAdapter>,
    terminal: Arc<TerminalCell<T>>,
}

impl<T> Drop for UnwindGuard<T> {
    fn drop(&mut self) {
        if self.adapter.is_closed() {
            return;
        }
        let err = Error::internal("engine thread unwound").with_engine(self.id);
        if self.terminal.commit(TerminalState::Failed(err)) {
            debug!(engine = %self.id, "engine thread unwound before recording an outcome");
        }
        let drain = self.adapter.drain();
        for entry in self.adapter.close() {
            if let Entry::Run(continuation) = entry {
                drain.schedule(Some(self.id), continuation);
                self.adapter.operation_completed();
            }
        }
        drain.remove_owner(self.id);
    }
}

/// Everything the dedicated thread owns.
struct Host<T> {
    id: EngineId,
    adapter: Arc<ContextAdapter>,
    terminal: Arc<TerminalCell<T>>,
    exit: Arc<ExitSignal>,
    cancel: CancelToken,
    on_thread_start: Option<crate::runtime::config::ThreadHook>,
    on_thread_stop: Option<crate::runtime::config::ThreadHook>,
    registration: Option<CancelRegistration>,
}

type RootFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + 'a>>;

impl<T: Send + 'static> Host<T> {
    fn run<I, E, F, Fut>(mut self, root: F, input: I)
    where
        E: Into<BoxError> + 'static,
        F: FnOnce(I, EngineCx) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _exit = ExitGuard(Arc::clone(&self.exit));
        // Released before the exit signal.
        let _registration = self.registration.take();
        let _unwind = UnwindGuard {
            id: self.id,
            adapter: Arc::clone(&self.adapter),
            terminal: Arc::clone(&self.terminal),
        };
        let _span = debug_span!("engine", id = %self.id).entered();
        if let Some(hook) = &self.on_thread_start {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook())) {
                let payload = PanicPayload::from_any(payload.as_ref());
                self.commit(TerminalState::Failed(
                    Error::panicked(&payload).with_engine(self.id),
                ));
            }
        }

        {
            let _ambient = ContextAdapter::enter(Arc::clone(&self.adapter));
            let mut root_future = self.build_root(root, input);
            if root_future.is_some() {
                self.adapter.resume();
            }
            let waker = resume_waker(&self.adapter);
            self.dispatch(&mut root_future, &waker);
            self.finish(root_future);
        }

        if let Some(hook) = &self.on_thread_stop {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook())) {
                let payload = PanicPayload::from_any(payload.as_ref());
                report_contained(
                    self.adapter.sink(),
                    &Fault {
                        origin: FaultOrigin::ThreadHook,
                        owner: Some(self.id),
                        label: Some("on_thread_stop"),
                        error: Error::panicked(&payload).with_engine(self.id),
                    },
                );
            }
        }
        self.adapter.drain().remove_owner(self.id);
        debug!(engine = %self.id, state = %self.terminal.kind(), "engine thread exiting");
    }

    fn build_root<'a, I, E, F, Fut>(&self, root: F, input: I) -> Option<RootFuture<'a, T>>
    where
        E: Into<BoxError> + 'static,
        F: FnOnce(I, EngineCx) -> Fut,
        Fut: Future<Output = Result<T, E>> + 'a,
    {
        if self.terminal.is_terminal() {
            return None;
        }
        let cx = EngineCx::new(Arc::clone(&self.adapter), self.cancel.clone());
        match catch_unwind(AssertUnwindSafe(move || root(input, cx))) {
            Ok(fut) => Some(Box::pin(async move { fut.await.map_err(Into::into) })),
            Err(payload) => {
                let payload = PanicPayload::from_any(payload.as_ref());
                self.commit(TerminalState::Failed(
                    Error::panicked(&payload).with_engine(self.id),
                ));
                None
            }
        }
    }

    fn dispatch(&self, root: &mut Option<RootFuture<'_, T>>, waker: &Waker) {
        while !self.terminal.is_terminal() {
            self.adapter.wait_for_work();
            self.check_abort();
            while let Some(entry) = self.adapter.next_entry() {
                self.run_entry(entry, root, waker);
                self.check_abort();
                if self.terminal.is_terminal() {
                    break;
                }
            }
        }
    }

    fn run_entry(&self, entry: Entry, root: &mut Option<RootFuture<'_, T>>, waker: &Waker) {
        match entry {
            Entry::Resume => self.poll_root(root, waker),
            Entry::Run(continuation) => {
                invoke_reported(
                    continuation,
                    FaultOrigin::EngineLoop,
                    Some(self.id),
                    self.adapter.sink(),
                );
                self.adapter.operation_completed();
            }
        }
    }

    fn poll_root(&self, root: &mut Option<RootFuture<'_, T>>, waker: &Waker) {
        let Some(fut) = root.as_mut() else {
            return;
        };
        let mut cx = Context::from_waker(waker);
        let outcome = match catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(&mut cx))) {
            Ok(Poll::Pending) => {
                trace!(engine = %self.id, "root suspended");
                return;
            }
            Ok(Poll::Ready(Ok(value))) => TerminalState::Completed(value),
            Ok(Poll::Ready(Err(err))) => {
                TerminalState::Failed(Error::from_computation(err).with_engine(self.id))
            }
            Err(payload) => {
                let payload = PanicPayload::from_any(payload.as_ref());
                TerminalState::Failed(Error::panicked(&payload).with_engine(self.id))
            }
        };
        *root = None;
        self.commit(outcome);
    }

    fn check_abort(&self) {
        if self.adapter.is_abort_requested() {
            commit_abort(&self.adapter, &self.terminal);
        }
    }

    fn commit(&self, outcome: TerminalState<T>) {
        let kind = outcome.kind();
        if self.terminal.commit(outcome) {
            debug!(engine = %self.id, state = %kind, "engine reached terminal state");
        } else {
            trace!(engine = %self.id, state = %kind, "late outcome discarded");
        }
    }

    /// Drops the abandoned root, closes the queue and drains leftovers.
    fn finish(&self, root: Option<RootFuture<'_, T>>) {
        if let Some(fut) = root {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(move || drop(fut))) {
                let payload = PanicPayload::from_any(payload.as_ref());
                report_contained(
                    self.adapter.sink(),
                    &Fault {
                        origin: FaultOrigin::RootTeardown,
                        owner: Some(self.id),
                        label: None,
                        error: Error::panicked(&payload).with_engine(self.id),
                    },
                );
            }
        }

        let leftovers = self.adapter.close();
        let count = leftovers.len();
        for entry in leftovers {
            if let Entry::Run(continuation) = entry {
                invoke_reported(
                    continuation,
                    FaultOrigin::EngineLoop,
                    Some(self.id),
                    self.adapter.sink(),
                );
                self.adapter.operation_completed();
            }
        }
        if count > 0 {
            trace!(engine = %self.id, count, "drained leftovers after close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::builder::EngineBuilder;
    use crate::runtime::config::DrainConfig;
    use crate::runtime::continuation::Continuation;
    use crate::test_utils::{wait_until, CollectingSink, Gate};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::types::StateKind;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn drain() -> Arc<DrainService> {
        DrainService::start(DrainConfig::default()).unwrap()
    }

    #[test]
    fn completes_after_two_suspensions() {
        init_test("completes_after_two_suspensions");
        let engine = Engine::start(
            drain(),
            |base: i32, cx: EngineCx| async move {
                cx.yield_now().await;
                cx.yield_now().await;
                Ok::<_, Error>(base * 2)
            },
            21,
        )
        .unwrap();
        let fetched = engine.get_result(false, None, None).unwrap();
        crate::assert_with_log!(fetched.value == 42, "value", 42, fetched.value);
        assert!(fetched.completed);
        assert_eq!(engine.state(), StateKind::Completed);
        crate::test_complete!("completes_after_two_suspensions");
    }

    #[test]
    fn failure_is_captured_not_rethrown() {
        init_test("failure_is_captured_not_rethrown");
        let engine = Engine::start(
            drain(),
            |(), _cx| async move { Err::<i32, _>("boom") },
            (),
        )
        .unwrap();
        let err = engine.get_result(false, None, None).unwrap_err();
        crate::assert_failed!(engine.terminal.snapshot());
        assert!(err.to_string().contains("boom"));
        assert_eq!(err.engine(), Some(engine.id()));
        let fetched = engine.get_result(true, None, None).unwrap();
        assert_eq!(fetched.value, 0);
        assert!(fetched.completed);
        crate::test_complete!("failure_is_captured_not_rethrown");
    }

    #[test]
    fn root_panic_becomes_failed() {
        init_test("root_panic_becomes_failed");
        let engine: Engine<i32> = Engine::start(
            drain(),
            |(), _cx| async move {
                if true {
                    panic!("root went down");
                }
                Ok::<i32, Error>(0)
            },
            (),
        )
        .unwrap();
        let err = engine.result().unwrap_err();
        crate::assert_failed!(engine.terminal.snapshot());
        assert_eq!(err.kind(), crate::error::ErrorKind::Panicked);
        assert!(err.to_string().contains("root went down"));
        crate::test_complete!("root_panic_becomes_failed");
    }

    #[test]
    fn timeout_leaves_state_untouched() {
        init_test("timeout_leaves_state_untouched");
        let gate = Gate::new();
        let g = gate.clone();
        let engine = Engine::start(
            drain(),
            move |(), _cx| async move {
                g.await;
                Ok::<_, Error>(5u8)
            },
            (),
        )
        .unwrap();
        assert!(engine.wait(Some(Duration::from_millis(100)), None));
        assert_eq!(engine.state(), StateKind::Running);
        let fetched = engine
            .get_result(false, Some(Duration::from_millis(10)), None)
            .unwrap();
        assert!(!fetched.completed);
        assert!(!gate.is_open());
        gate.open();
        assert!(gate.is_open());
        assert!(!engine.wait(None, None));
        assert_eq!(engine.join().unwrap(), 5);
        crate::test_complete!("timeout_leaves_state_untouched");
    }

    #[test]
    fn abort_stops_suspended_root() {
        init_test("abort_stops_suspended_root");
        let gate = Gate::new();
        let g = gate.clone();
        let engine = Engine::start(
            drain(),
            move |(), _cx| async move {
                g.await;
                Ok::<_, Error>(1u32)
            },
            (),
        )
        .unwrap();
        assert!(wait_until(Duration::from_secs(5), || gate.has_waiter()));
        crate::test_section!("abort");
        assert!(engine.abort(false));
        assert!(engine.is_thread_exited());
        assert!(engine.is_aborted());
        crate::assert_aborted!(engine.terminal.snapshot());
        assert!(!gate.is_open());
        let err = engine.result().unwrap_err();
        assert!(err.is_aborted());
        // Idempotent.
        assert!(engine.abort(false));
        crate::test_complete!("abort_stops_suspended_root");
    }

    #[test]
    fn abort_after_completion_reports_false() {
        init_test("abort_after_completion_reports_false");
        let engine = Engine::start(drain(), |(), _cx| async { Ok::<_, Error>(3i64) }, ()).unwrap();
        assert_eq!(engine.result().unwrap(), 3);
        assert!(!engine.abort(false));
        assert_eq!(engine.state(), StateKind::Completed);
        crate::test_complete!("abort_after_completion_reports_false");
    }

    #[test]
    fn continuation_panic_is_reported_and_loop_survives() {
        init_test("continuation_panic_is_reported_and_loop_survives");
        let sink = CollectingSink::new();
        let engine = crate::runtime::builder::EngineBuilder::new(drain())
            .error_sink(sink.clone())
            .spawn(
                |(), cx: EngineCx| async move {
                    cx.schedule(|| panic!("continuation exploded"));
                    cx.yield_now().await;
                    cx.yield_now().await;
                    Ok::<_, Error>("alive")
                },
                (),
            )
            .unwrap();
        assert_eq!(engine.result().unwrap(), "alive");
        let faults = sink.faults();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].contains("continuation exploded"));
        crate::test_complete!("continuation_panic_is_reported_and_loop_survives");
    }

    #[test]
    fn wait_on_engine_thread_never_blocks() {
        init_test("wait_on_engine_thread_never_blocks");
        let slot: Arc<Mutex<Option<Arc<Engine<u8>>>>> = Arc::new(Mutex::new(None));
        let observed = Arc::new(Mutex::new(None));
        let gate = Gate::new();
        let (s, o, g) = (Arc::clone(&slot), Arc::clone(&observed), gate.clone());
        let engine = Arc::new(
            Engine::start(
                drain(),
                move |(), _cx| async move {
                    g.await;
                    if let Some(me) = s.lock().as_ref() {
                        let timed_out = me.wait(None, None);
                        let aborted = me.abort(false);
                        *o.lock() = Some((timed_out, aborted));
                    }
                    Ok::<_, Error>(9u8)
                },
                (),
            )
            .unwrap(),
        );
        *slot.lock() = Some(Arc::clone(&engine));
        gate.open();
        assert!(wait_until(Duration::from_secs(5), || engine.is_thread_exited()));
        assert_eq!(*observed.lock(), Some((true, true)));
        assert!(engine.is_aborted());
        slot.lock().take();
        crate::test_complete!("wait_on_engine_thread_never_blocks");
    }

    #[test]
    fn thread_hooks_run_and_name_applies() {
        init_test("thread_hooks_run_and_name_applies");
        let events = Arc::new(Mutex::new(Vec::new()));
        let (start, stop) = (Arc::clone(&events), Arc::clone(&events));
        let engine = crate::runtime::builder::EngineBuilder::new(drain())
            .thread_name_prefix("hooked")
            .on_thread_start(move || start.lock().push("start"))
            .on_thread_stop(move || stop.lock().push("stop"))
            .spawn(
                |(), _cx| async move {
                    let name = std::thread::current().name().map(str::to_owned);
                    Ok::<_, Error>(name)
                },
                (),
            )
            .unwrap();
        let id = engine.id();
        let name = engine.result().unwrap().unwrap_or_default();
        assert!(wait_until(Duration::from_secs(5), || engine.is_thread_exited()));
        assert_eq!(*events.lock(), vec!["start", "stop"]);
        assert_eq!(name, format!("hooked-{}", id.as_u64()));
        crate::test_complete!("thread_hooks_run_and_name_applies");
    }
    #[test]
    fn panicking_sink_does_not_stop_the_loop() {
        init_test("panicking_sink_does_not_stop_the_loop");
        let engine = EngineBuilder::new(drain())
            .error_sink(|_: &Fault| panic!("sink down"))
            .spawn(
                |(), cx: EngineCx| async move {
                    cx.schedule(|| panic!("continuation exploded"));
                    cx.yield_now().await;
                    cx.yield_now().await;
                    Ok::<_, Error>(7u8)
                },
                (),
            )
            .unwrap();
        let fetched = engine
            .get_result(false, Some(Duration::from_secs(5)), None)
            .unwrap();
        crate::assert_with_log!(fetched.completed, "completed", true, fetched.completed);
        assert_eq!(fetched.value, 7);
        assert!(wait_until(Duration::from_secs(5), || engine.is_thread_exited()));
        crate::test_complete!("panicking_sink_does_not_stop_the_loop");
    }

    #[test]
    fn start_hook_panic_fails_engine_and_closes_queue() {
        init_test("start_hook_panic_fails_engine_and_closes_queue");
        let drain = drain();
        let engine: Engine<u8> = EngineBuilder::new(Arc::clone(&drain))
            .on_thread_start(|| panic!("hook down"))
            .spawn(|(), _cx| async { Ok::<_, Error>(1u8) }, ())
            .unwrap();

        crate::test_section!("terminal state");
        assert!(!engine.wait(Some(Duration::from_secs(5)), None));
        let err = engine.result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Panicked);
        assert!(err.to_string().contains("hook down"));
        assert!(wait_until(Duration::from_secs(5), || engine.is_thread_exited()));

        crate::test_section!("late continuation");
        assert!(engine.adapter().is_closed());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        engine.adapter().schedule(Continuation::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(drain.wait_idle(Duration::from_secs(5)));
        let count = hits.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 1, "late continuation ran", 1, count);
        assert_eq!(engine.adapter().queued(), 0);
        crate::test_complete!("start_hook_panic_fails_engine_and_closes_queue");
    }

    #[test]
    fn stop_hook_panic_is_reported() {
        init_test("stop_hook_panic_is_reported");
        let sink = CollectingSink::new();
        let engine = EngineBuilder::new(drain())
            .error_sink(sink.clone())
            .on_thread_stop(|| panic!("stop down"))
            .spawn(|(), _cx| async { Ok::<_, Error>(2u8) }, ())
            .unwrap();
        assert_eq!(engine.result().unwrap(), 2);
        assert!(wait_until(Duration::from_secs(5), || engine.is_thread_exited()));
        let faults = sink.faults();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].contains("thread hook"));
        assert!(faults[0].contains("stop down"));
        crate::test_complete!("stop_hook_panic_is_reported");
    }

}
