//! Error types for the keyed blocking stores.
//!
//! These are concurrency-primitive errors: they are returned
//! synchronously to the caller and handled locally. A failure on one
//! agent's key never blocks or fails another agent's path through the
//! same store.

use std::error::Error;
use std::fmt;

use crate::id::AgentKey;

/// Errors from a `Warden` (keyed blocking store) operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WardenError {
    /// The key was never registered, or has been retired.
    /// A programmer / configuration error; never retried.
    UnknownKey(AgentKey),
    /// The key is already registered. Surfaced at setup time.
    AlreadyRegistered(AgentKey),
    /// The store has been stopped. Expected during teardown.
    StoreStopped,
    /// A bounded await elapsed without a write to the key.
    TimedOut,
}

impl WardenError {
    /// Whether this error is the expected teardown signal.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::StoreStopped)
    }
}

impl fmt::Display for WardenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey(k) => write!(f, "unknown key '{k}'"),
            Self::AlreadyRegistered(k) => write!(f, "key '{k}' already registered"),
            Self::StoreStopped => write!(f, "store stopped"),
            Self::TimedOut => write!(f, "timed out waiting for a write"),
        }
    }
}

impl Error for WardenError {}
