//! Commands replicated through the consensus log, and their results.
//!
//! Mirrors the shape of a Raft-style command/result pair: `Command` is
//! what gets serialized into the log, `CommandResult` is what `apply`
//! hands back to the caller that proposed it. Every field that would
//! otherwise vary per-replica (`fresh_session_id`, `now`) is captured by
//! the leader before submission, so `apply` stays a pure function of
//! `(State, Command)`.

use serde::{Deserialize, Serialize};

use crate::model::Session;

/// A command to be replicated through the consensus log and applied to
/// every replica's `State` in identical commit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Create a new session. `session_id` is generated by the leader's
    /// `IdGen` before submission so every replica applies the same id.
    CreateSession {
        /// Freshly generated, cluster-unique session id.
        session_id: String,
        /// Trimmed, non-empty, ≤255 chars.
        client_id: String,
        /// Seconds, 5..=3600.
        timeout_secs: u32,
        /// Sampled by the leader before submission.
        now: f64,
    },

    /// Refresh a session's keepalive timestamp.
    Keepalive {
        /// The session to touch.
        session_id: String,
        /// Sampled by the leader before submission.
        now: f64,
    },

    /// Delete a session and release every lock it holds.
    DeleteSession {
        /// The session to remove.
        session_id: String,
    },

    /// Acquire an exclusive lock on `resource` on behalf of `session_id`.
    AcquireLock {
        /// The acquiring session.
        session_id: String,
        /// The resource to lock.
        resource: String,
        /// Sampled by the leader before submission.
        now: f64,
    },

    /// Release a previously acquired lock, validating ownership and fence.
    ReleaseLock {
        /// The releasing session.
        session_id: String,
        /// The resource to unlock.
        resource: String,
        /// Must match the lock's current fence token.
        fence_token: u64,
    },

    /// Garbage-collect every session whose keepalive window has lapsed,
    /// releasing their locks. `now` is sampled once by the leader (or the
    /// periodic sweep) so every replica evaluates expiry identically.
    CleanupExpired {
        /// Sampled once, before submission.
        now: f64,
    },
}

/// What `apply` returns for a successfully-applied command.
///
/// `GetSession` / `GetStats` / `LockStatus` / `GetClusterStatus` are
/// read-only and do not go through this enum — they read `State`
/// directly, bypassing the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CommandResult {
    /// `CreateSession` succeeded; carries the new session id.
    SessionCreated(String),
    /// `Keepalive` succeeded.
    KeepaliveOk,
    /// `DeleteSession` succeeded.
    SessionDeleted,
    /// `AcquireLock` succeeded (including the idempotent same-owner case);
    /// carries the fence token.
    LockAcquired(u64),
    /// `ReleaseLock` succeeded.
    LockReleased,
    /// `CleanupExpired` succeeded; carries the number of sessions removed.
    CleanedUp(usize),
}

/// A point-in-time snapshot of a `Session`, augmented with the
/// `is_expired` bit the caller cannot compute without `now`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionView {
    /// The underlying session.
    #[serde(flatten)]
    pub session: Session,
    /// Whether `now − last_keepalive > timeout` at snapshot time.
    pub is_expired: bool,
}

/// Aggregate counters returned by `GetStats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    /// Total sessions currently tracked (live + expired-but-not-GC'd).
    pub total_sessions: usize,
    /// Sessions for which `is_expired` is false.
    pub active_sessions: usize,
    /// Sessions for which `is_expired` is true.
    pub expired_sessions: usize,
    /// Total locks currently held.
    pub total_locks: usize,
    /// Current value of the fence counter.
    pub fence_counter: u64,
    /// Snapshot timestamp (seconds since the Unix epoch).
    pub timestamp: f64,
}
