//! Identifier types for engine instances.
//!
//! Every engine gets a process-unique [`EngineId`] at construction. The id is
//! also the mailbox key the orphan drain service files late continuations under.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique identifier for an engine instance.
///
/// Ids are allocated monotonically and never reused within a process.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineId(u64);

impl EngineId {
    /// Allocates the next engine id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Creates an engine ID for testing/benchmarking purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineId({})", self.0)
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = EngineId::next();
        let b = EngineId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn display_and_debug() {
        let id = EngineId::new_for_test(7);
        assert_eq!(format!("{id}"), "E7");
        assert_eq!(format!("{id:?}"), "EngineId(7)");
        assert_eq!(id.as_u64(), 7);
    }
}
