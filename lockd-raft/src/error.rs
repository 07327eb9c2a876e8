//! Error types for the Raft-backed `Replicator` implementations.

use thiserror::Error;

use crate::kv::StoreError;

/// Failure modes specific to running raft-rs and its storage.
///
/// Distinct from [`lockd_core::ReplicatorError`], which is the narrower
/// contract the state-machine layer consumes — this type carries the
/// lower-level detail (storage, wire, protocol) that a `Replicator`
/// implementation maps down to that contract at its boundary.
#[derive(Debug, Error)]
pub enum RaftError {
    /// The embedded log/state store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// raft-rs itself returned an error (propose, step, conf change).
    #[error("raft error: {0}")]
    Raft(String),

    /// This node is not the leader.
    #[error("not leader, leader hint: {leader_hint:?}")]
    NotLeader {
        /// Address of the node this replica believes leads, if known.
        leader_hint: Option<String>,
    },

    /// The actor channel was closed (driver task gone).
    #[error("raft driver channel closed")]
    ChannelClosed,

    /// A proposal's oneshot was dropped before it resolved.
    #[error("proposal dropped before commit")]
    ProposalDropped,

    /// A proposal did not commit within its deadline.
    #[error("proposal timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A value failed to (de)serialize crossing the log or wire boundary.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A peer address did not parse as `host:port`.
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    /// Transport-level failure talking to a peer.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<StoreError> for RaftError {
    fn from(e: StoreError) -> Self {
        RaftError::Storage(e.to_string())
    }
}

impl From<bincode::Error> for RaftError {
    fn from(e: bincode::Error) -> Self {
        RaftError::Serialization(e.to_string())
    }
}

/// Result alias for the Raft-backed replicator layer.
pub type Result<T> = std::result::Result<T, RaftError>;

impl From<RaftError> for lockd_core::ReplicatorError {
    fn from(e: RaftError) -> Self {
        match e {
            RaftError::NotLeader { leader_hint } => {
                lockd_core::ReplicatorError::NotLeader { leader: leader_hint }
            }
            RaftError::Timeout(_) => lockd_core::ReplicatorError::Timeout,
            RaftError::ChannelClosed | RaftError::ProposalDropped => {
                lockd_core::ReplicatorError::NoQuorum
            }
            other => {
                tracing::error!(error = %other, "raft replicator error mapped to NoQuorum");
                lockd_core::ReplicatorError::NoQuorum
            }
        }
    }
}
