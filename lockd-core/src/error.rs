//! Error taxonomy for the lock-service state machine.
//!
//! One variant per distinguishable failure kind, each carrying the
//! context fields callers need to render a human-readable message. These
//! are returned as data from `StateMachine::apply` — never unwound.

use thiserror::Error;

/// Errors produced by applying a command to the state machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    /// The named session does not exist.
    #[error("Session {session_id} does not exist")]
    SessionNotFound {
        /// The session id that was looked up.
        session_id: String,
    },

    /// The named session exists but its keepalive window has lapsed.
    #[error("Session {session_id} has expired")]
    SessionExpired {
        /// The session id that was looked up.
        session_id: String,
    },

    /// No lock is currently held on the resource.
    #[error("No lock exists on resource {resource}")]
    LockNotFound {
        /// The resource that was looked up.
        resource: String,
    },

    /// Another session already holds the lock.
    #[error("Resource {resource} already locked by another session")]
    LockAlreadyHeld {
        /// The contended resource.
        resource: String,
    },

    /// The calling session is not the current holder.
    #[error("Session {session_id} does not own this resource {resource}")]
    LockNotOwned {
        /// The calling session id.
        session_id: String,
        /// The resource in question.
        resource: String,
    },

    /// The fence token supplied does not match the current lock's token.
    #[error("Fence token {fence_token} mismatch")]
    InvalidFenceToken {
        /// The token the caller supplied.
        fence_token: u64,
    },

    /// A request-body or query-parameter field failed validation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable explanation of what failed validation.
        message: String,
    },
}

/// Result alias used throughout the state-machine layer.
pub type Result<T> = std::result::Result<T, LockError>;
