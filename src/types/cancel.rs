//! Cancellation reason and kind types.
//!
//! An engine has two cancellation tiers. Graceful cancellation is advisory and
//! only observed by the hosted computation; abort is forced and always drives
//! the engine to a terminal `Aborted` state. This module defines the types that
//! describe why and how cancellation occurred.

use core::fmt;

/// The kind of cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CancelKind {
    /// Cooperative cancellation requested through the graceful token.
    Graceful,
    /// Abort requested through [`Engine::abort`](crate::runtime::Engine::abort).
    Abort,
    /// Abort requested by an external abort token firing.
    AbortToken,
    /// Cancellation due to shutdown of the owning process or service.
    Shutdown,
}

impl CancelKind {
    /// Returns the severity of this cancellation kind.
    ///
    /// Higher severity cancellations take precedence when strengthening.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Graceful => 0,
            Self::Abort | Self::AbortToken => 1,
            Self::Shutdown => 2,
        }
    }

    /// Returns true if this kind forces the engine to `Aborted`.
    #[must_use]
    pub const fn is_forced(self) -> bool {
        !matches!(self, Self::Graceful)
    }
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graceful => write!(f, "graceful"),
            Self::Abort => write!(f, "abort"),
            Self::AbortToken => write!(f, "abort token"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// The reason for a cancellation, including kind and optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReason {
    /// The kind of cancellation.
    pub kind: CancelKind,
    /// Optional human-readable message.
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// Creates a new cancellation reason with the given kind.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a graceful cancellation reason with a message.
    #[must_use]
    pub const fn graceful(message: &'static str) -> Self {
        Self {
            kind: CancelKind::Graceful,
            message: Some(message),
        }
    }

    /// Creates a forced abort reason.
    #[must_use]
    pub const fn abort() -> Self {
        Self::new(CancelKind::Abort)
    }

    /// Creates an abort reason attributed to an external abort token.
    #[must_use]
    pub const fn abort_token() -> Self {
        Self::new(CancelKind::AbortToken)
    }

    /// Creates a shutdown cancellation reason.
    #[must_use]
    pub const fn shutdown() -> Self {
        Self::new(CancelKind::Shutdown)
    }

    /// Attaches a message to this reason.
    #[must_use]
    pub const fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    /// Strengthens this reason with another, keeping the more severe one.
    ///
    /// Returns `true` if the reason was changed.
    pub fn strengthen(&mut self, other: &Self) -> bool {
        if other.kind.severity() > self.kind.severity() {
            self.kind = other.kind;
            self.message = other.message;
            return true;
        }
        if other.kind.severity() == self.kind.severity() && self.message.is_none() {
            if let Some(msg) = other.message {
                self.message = Some(msg);
                return true;
            }
        }
        false
    }

    /// Returns the kind of this cancellation reason.
    #[must_use]
    pub const fn kind(&self) -> CancelKind {
        self.kind
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::new(CancelKind::Graceful)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}
