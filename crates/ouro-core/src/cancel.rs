//! Cooperative cancellation token
//!
//! An explicit token with single-writer semantics: the first caller to
//! `cancel` wins and its reason sticks. The engine polls this at every
//! phase boundary; nothing is preempted mid-call. Once observed, the
//! current phase finishes only its already-issued work.

use std::sync::Arc;
use std::sync::OnceLock;

/// Cheaply cloneable cancellation handle shared between the controller
/// and the cycle engine.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    reason: Arc<OnceLock<String>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns true if this call set the reason,
    /// false if the token was already cancelled (the earlier reason wins).
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.reason.set(reason.into()).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason.get().is_some()
    }

    /// The reason recorded by the winning `cancel` call, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(|s| s.as_str())
    }
}
