//! Waker bridge from `std::task` to the context adapter.
//!
//! The root computation is polled with a waker whose wake enqueues a resume on
//! the engine's dispatch queue. Multiple wakes before the next poll collapse
//! into one resume entry. The waker holds the adapter weakly so a stray waker
//! kept alive by user code does not keep the engine's state around.
//!
//! Note: This implementation uses safe Rust only (no unsafe).

use crate::runtime::adapter::ContextAdapter;
use std::sync::{Arc, Weak};
use std::task::{Wake, Waker};

/// Creates a waker that resumes the root computation hosted by `adapter`.
#[must_use]
pub(crate) fn resume_waker(adapter: &Arc<ContextAdapter>) -> Waker {
    Waker::from(Arc::new(ResumeWaker {
        adapter: Arc::downgrade(adapter),
    }))
}

struct ResumeWaker {
    adapter: Weak<ContextAdapter>,
}

impl ResumeWaker {
    fn resume(&self) {
        if let Some(adapter) = self.adapter.upgrade() {
            adapter.resume();
        }
    }
}

impl Wake for ResumeWaker {
    fn wake(self: Arc<Self>) {
        self.resume();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.resume();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::config::DrainConfig;
    use crate::runtime::drain::DrainService;
    use crate::runtime::sink::LogSink;
    use crate::types::EngineId;

    fn adapter() -> Arc<ContextAdapter> {
        let drain = DrainService::start(DrainConfig::default()).unwrap();
        Arc::new(ContextAdapter::new(
            EngineId::new_for_test(5),
            drain,
            Arc::new(LogSink),
            false,
        ))
    }

    #[test]
    fn wake_enqueues_resume() {
        let adapter = adapter();
        let waker = resume_waker(&adapter);
        waker.wake_by_ref();
        assert_eq!(adapter.queued(), 1);
    }

    #[test]
    fn dedup_multiple_wakes() {
        let adapter = adapter();
        let waker = resume_waker(&adapter);
        waker.wake_by_ref();
        waker.wake_by_ref();
        waker.clone().wake();
        assert_eq!(adapter.queued(), 1);
    }

    #[test]
    fn wake_after_adapter_dropped_is_noop() {
        let adapter = adapter();
        let waker = resume_waker(&adapter);
        drop(adapter);
        waker.wake();
    }
}
