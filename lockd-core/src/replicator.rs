//! The consensus collaborator contract.
//!
//! `Replicator` is deliberately minimal: it only has to get a `Command`
//! committed in the same order on every replica and report leadership.
//! How it does that — in-process for a single node, or over Raft for a
//! cluster — is `lockd-raft`'s concern, not `lockd-core`'s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::{Command, CommandResult};
use crate::error::LockError;

/// Failure modes a `Replicator` can report back to the service facade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplicatorError {
    /// This replica is not the leader and cannot accept mutations.
    /// Carries the current leader's address, when known, so the caller
    /// can surface it as a hint. The HTTP boundary does NOT forward the
    /// request itself — it only reports the hint in the response body.
    #[error("not leader{}", .leader.as_deref().map(|l| format!(", current leader is {l}")).unwrap_or_default())]
    NotLeader {
        /// Best-known current leader address, if any.
        leader: Option<String>,
    },

    /// A quorum of replicas did not acknowledge the proposal in time.
    #[error("no quorum available to commit the proposal")]
    NoQuorum,

    /// The proposal was submitted but commit confirmation timed out.
    #[error("timed out waiting for proposal to commit")]
    Timeout,
}

/// This replica's believed role in the consensus protocol.
///
/// Three values, matching spec's `Status() → {role ∈
/// {FOLLOWER,CANDIDATE,LEADER}, ...}` exactly — a Raft implementation's
/// internal pre-vote phase (if it has one) collapses into `Candidate` at
/// this boundary rather than adding a fourth wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

impl Role {
    /// The wire representation used by `/admin/cluster` and `/health`.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Follower => "FOLLOWER",
            Role::Candidate => "CANDIDATE",
            Role::Leader => "LEADER",
        }
    }
}

/// A point-in-time view of cluster health, surfaced by `GetClusterStatus`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterStatus {
    /// This replica's believed role (`FOLLOWER`/`CANDIDATE`/`LEADER`).
    pub role: Role,
    /// Whether this replica currently believes itself to be the leader.
    /// Always `role == Role::Leader` — kept as its own field since
    /// callers (e.g. `/health`) want a plain boolean without matching on
    /// `role`.
    pub is_leader: bool,
    /// Whether enough of the fixed replica set is known to be
    /// participating to commit proposals (a leader is elected and
    /// known). Not derived from `peers.is_empty()` — a lone single-node
    /// cluster and a multi-node cluster that has lost quorum both have a
    /// non-empty `peers` list.
    pub has_quorum: bool,
    /// The address of the replica this node believes leads the cluster.
    pub leader: Option<String>,
    /// Addresses of every replica in the fixed membership set.
    pub peers: Vec<String>,
    /// Current Raft term (or an analogous epoch for a single-node cluster).
    pub term: u64,
    /// Index of the last log entry applied to the state machine.
    pub last_applied_index: u64,
    /// Seconds since this replicator started.
    pub uptime: f64,
}

/// The consensus collaborator a `Service` submits commands through.
///
/// Implementations own a fixed replica set for the lifetime of a process
/// — there is no `ConfChange`/membership-change support. The cluster's
/// membership is decided once at startup from configuration and never
/// changes while the process runs.
#[async_trait]
pub trait Replicator: Send + Sync {
    /// Propose `cmd` for replication and block until it has been applied
    /// to this replica's state machine.
    ///
    /// The outer `Result` reports whether the command was committed at
    /// all (`ReplicatorError::NotLeader`/`NoQuorum`/`Timeout` mean it was
    /// not, or its fate is unknown). The inner `Result` is the
    /// `StateMachine::apply` outcome for a command that *did* commit —
    /// conflicting mutations (e.g. `LOCK_ALREADY_HELD`) are resolved by
    /// commit order and are themselves part of the deterministic,
    /// replicated result, not a replication failure. Returns
    /// `ReplicatorError::NotLeader` immediately if this replica is not
    /// the leader — never silently forwards.
    async fn submit(
        &self,
        cmd: Command,
    ) -> Result<std::result::Result<CommandResult, LockError>, ReplicatorError>;

    /// Whether this replica currently believes itself to be the leader.
    fn is_leader(&self) -> bool;

    /// The address of the replica this node believes leads the cluster,
    /// if known.
    fn leader(&self) -> Option<String>;

    /// A snapshot of cluster health for `GetClusterStatus`.
    fn status(&self) -> ClusterStatus;

    /// Whether this replicator has applied enough of the log to safely
    /// serve reads (used to gate startup readiness, not every read).
    fn is_ready(&self) -> bool;
}
