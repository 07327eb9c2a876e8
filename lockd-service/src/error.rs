//! The combined error type the Service facade returns: validation
//! failures, state-machine rejections, and replicator-level failures,
//! unified so the HTTP boundary can map any of them to a status code in
//! one place.

use thiserror::Error;

use lockd_core::{LockError, ReplicatorError};

/// Everything a `Service` method can fail with.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    /// A request-body or query-parameter field failed validation before
    /// any command was ever built — never enters the log.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The command committed and `apply` rejected it deterministically.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The command never reached commit (or its fate is unknown).
    #[error(transparent)]
    Replicator(#[from] ReplicatorError),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidArgument(message.into())
    }
}
