//! Terminal-state cell.
//!
//! Holds an engine's [`TerminalState`] behind its own lock, separate from the
//! dispatch queue lock. The transition out of `Running` happens exactly once:
//! the first committer wins and every later commit is discarded. Waiters block
//! on a condition variable that is notified when the transition happens.

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::types::{StateKind, TerminalState};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// First-writer-wins holder of an engine's outcome.
///
/// The completed value is stored as `Option<T>` so it can be moved out once by
/// [`take`](Self::take) while the recorded kind stays `Completed`.
#[derive(Debug)]
pub(crate) struct TerminalCell<T> {
    slot: Mutex<TerminalState<Option<T>>>,
    done: Condvar,
}

impl<T> TerminalCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(TerminalState::Running),
            done: Condvar::new(),
        }
    }

    /// Records `next` if no outcome has been recorded yet.
    ///
    /// Returns `true` if this call made the transition.
    pub(crate) fn commit(&self, next: TerminalState<T>) -> bool {
        let next = match next {
            TerminalState::Running => return false,
            TerminalState::Completed(v) => TerminalState::Completed(Some(v)),
            TerminalState::Failed(e) => TerminalState::Failed(e),
            TerminalState::Aborted(e) => TerminalState::Aborted(e),
        };
        let mut slot = self.slot.lock();
        if slot.is_terminal() {
            return false;
        }
        *slot = next;
        drop(slot);
        self.done.notify_all();
        true
    }

    pub(crate) fn kind(&self) -> StateKind {
        self.slot.lock().kind()
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// Returns a copy of the current state.
    pub(crate) fn snapshot(&self) -> TerminalState<T>
    where
        T: Clone,
    {
        match &*self.slot.lock() {
            TerminalState::Running => TerminalState::Running,
            TerminalState::Completed(Some(v)) => TerminalState::Completed(v.clone()),
            TerminalState::Completed(None) => {
                TerminalState::Failed(Error::internal("completed value already taken"))
            }
            TerminalState::Failed(e) => TerminalState::Failed(e.clone()),
            TerminalState::Aborted(e) => TerminalState::Aborted(e.clone()),
        }
    }

    /// Moves the completed value out, leaving the recorded kind intact.
    pub(crate) fn take(&self) -> TerminalState<T> {
        match &mut *self.slot.lock() {
            TerminalState::Running => TerminalState::Running,
            TerminalState::Completed(v) => v.take().map_or_else(
                || TerminalState::Failed(Error::internal("completed value already taken")),
                TerminalState::Completed,
            ),
            TerminalState::Failed(e) => TerminalState::Failed(e.clone()),
            TerminalState::Aborted(e) => TerminalState::Aborted(e.clone()),
        }
    }

    /// Wakes waiters without changing state (used by external cancel tokens).
    fn nudge(&self) {
        let _slot = self.slot.lock();
        self.done.notify_all();
    }
}

impl<T: Send + 'static> TerminalCell<T> {
    /// Blocks until the state is terminal, `timeout` elapses, or `cancel` fires.
    ///
    /// Returns `true` if the state is terminal on return.
    pub(crate) fn wait(
        self: &Arc<Self>,
        timeout: Option<Duration>,
        cancel: Option<&CancelToken>,
    ) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let _registration = cancel.map(|token| {
            let cell = Arc::clone(self);
            token.on_cancel(move |_| cell.nudge())
        });

        let mut slot = self.slot.lock();
        loop {
            if slot.is_terminal() {
                return true;
            }
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return false;
            }
            // A deadline that overflows `Instant` is treated as unbounded.
            match deadline {
                None => self.done.wait(&mut slot),
                Some(deadline) => {
                    if self.done.wait_until(&mut slot, deadline).timed_out() {
                        return slot.is_terminal();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::CancelReason;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn first_writer_wins() {
        init_test("first_writer_wins");
        let cell: TerminalCell<i32> = TerminalCell::new();
        assert_eq!(cell.kind(), StateKind::Running);
        assert!(cell.commit(TerminalState::Completed(1)));
        assert!(!cell.commit(TerminalState::Aborted(Error::aborted(&CancelReason::abort()))));
        assert!(!cell.commit(TerminalState::Completed(2)));
        crate::assert_completed!(cell.snapshot(), 1);
        crate::test_complete!("first_writer_wins");
    }

    #[test]
    fn running_commit_is_ignored() {
        init_test("running_commit_is_ignored");
        let cell: TerminalCell<i32> = TerminalCell::new();
        assert!(!cell.commit(TerminalState::Running));
        assert!(!cell.is_terminal());
        crate::test_complete!("running_commit_is_ignored");
    }

    #[test]
    fn take_moves_value_once() {
        init_test("take_moves_value_once");
        let cell: TerminalCell<String> = TerminalCell::new();
        cell.commit(TerminalState::Completed("done".to_string()));
        crate::assert_completed!(cell.take(), "done".to_string());
        assert_eq!(cell.kind(), StateKind::Completed);
        match cell.take() {
            TerminalState::Failed(e) => assert_eq!(e.kind(), ErrorKind::Internal),
            other => panic!("expected internal failure, got {other:?}"),
        }
        crate::test_complete!("take_moves_value_once");
    }

    #[test]
    fn wait_times_out_without_changing_state() {
        init_test("wait_times_out_without_changing_state");
        let cell: Arc<TerminalCell<i32>> = Arc::new(TerminalCell::new());
        let completed = cell.wait(Some(Duration::from_millis(30)), None);
        assert!(!completed);
        assert_eq!(cell.kind(), StateKind::Running);
        crate::test_complete!("wait_times_out_without_changing_state");
    }

    #[test]
    fn wait_observes_commit_from_other_thread() {
        init_test("wait_observes_commit_from_other_thread");
        let cell: Arc<TerminalCell<i32>> = Arc::new(TerminalCell::new());
        let writer = Arc::clone(&cell);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            writer.commit(TerminalState::Completed(7));
        });
        assert!(cell.wait(None, None));
        handle.join().expect("writer panicked");
        crate::assert_completed!(cell.snapshot(), 7);
        crate::test_complete!("wait_observes_commit_from_other_thread");
    }

    #[test]
    fn wait_returns_early_on_external_cancel() {
        init_test("wait_returns_early_on_external_cancel");
        let cell: Arc<TerminalCell<i32>> = Arc::new(TerminalCell::new());
        let token = CancelToken::new();
        let trigger = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trigger.cancel();
        });
        let started = Instant::now();
        let completed = cell.wait(Some(Duration::from_secs(10)), Some(&token));
        handle.join().expect("canceller panicked");
        assert!(!completed);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(token.listener_count(), 0);
        crate::test_complete!("wait_returns_early_on_external_cancel");
    }
}
