//! Sessions, locks, and the fence counter — the data State owns exclusively.
//!
//! Entities reference each other only by string key (`session_id` /
//! `resource`), resolved under `State`'s own bookkeeping. There are no
//! direct pointer links between a `Lock` and its owning `Session`, which
//! keeps `State` plain-`serde`-derivable with no `Rc`/`RefCell` cycle.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A bounded-lifetime client identity, heartbeat-extended by keepalives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Opaque 36-char identifier, unique within a cluster lifetime.
    pub session_id: String,
    /// Caller-supplied label (trimmed, 1..255 chars).
    pub client_id: String,
    /// Keepalive window in seconds (5..3600 inclusive).
    pub timeout_secs: u32,
    /// Seconds since the Unix epoch, set once at creation.
    pub created_at: f64,
    /// Seconds since the Unix epoch, refreshed by `Keepalive`.
    pub last_keepalive: f64,
    /// Resources this session currently holds a lock on.
    pub locks_held: BTreeSet<String>,
}

impl Session {
    /// `is_expired(s) ≡ now − s.last_keepalive > s.timeout`.
    pub fn is_expired(&self, now: f64) -> bool {
        now - self.last_keepalive > self.timeout_secs as f64
    }
}

/// An exclusive claim on a named resource, parameterized by a fence token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lock {
    /// Opaque resource name (trimmed, 1..255 chars).
    pub resource: String,
    /// The owning session.
    pub session_id: String,
    /// Cluster-wide monotonically increasing token issued at acquisition.
    pub fence_token: u64,
    /// Seconds since the Unix epoch.
    pub acquired_at: f64,
}

/// The full replicated state: sessions, locks, and the fence counter.
///
/// Owned exclusively by the state machine. Every replica that has applied
/// the same command sequence holds a byte-identical `State`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct State {
    /// Sessions by id.
    pub sessions: HashMap<String, Session>,
    /// Locks by resource.
    pub locks: HashMap<String, Lock>,
    /// Cluster-wide non-negative integer, strictly increasing across
    /// successful acquisitions in commit order (Invariant F1).
    pub fence_counter: u64,
}

impl State {
    /// Construct an empty state (a fresh cluster).
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of sessions for which `is_expired` is false.
    pub fn active_session_count(&self, now: f64) -> usize {
        self.sessions
            .values()
            .filter(|s| !s.is_expired(now))
            .count()
    }

    /// Count of sessions for which `is_expired` is true.
    pub fn expired_session_count(&self, now: f64) -> usize {
        self.sessions.values().filter(|s| s.is_expired(now)).count()
    }
}
