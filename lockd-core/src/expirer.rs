//! Periodic expired-session detection.
//!
//! The expirer only *observes* — it has no mutable access to `State`. It
//! decides *when* a `CleanupExpired` command is worth proposing and lets
//! the caller (the `lockd` binary's sweep task, via the `Replicator`)
//! submit it through the log like any other mutation, so the actual
//! removal stays ordered and deterministic across replicas.

use crate::command::Stats;
use crate::model::State;

/// Read-only scanner over `State`, used by the periodic sweep task to
/// decide whether a `CleanupExpired` proposal is worth making.
#[derive(Debug, Default, Clone, Copy)]
pub struct Expirer;

impl Expirer {
    /// Construct an expirer. Stateless — kept as a type for symmetry with
    /// `Clock`/`IdGen` and to give the sweep task somewhere to hang
    /// future heuristics (e.g. backoff when nothing is expiring).
    pub fn new() -> Self {
        Self
    }

    /// Whether at least one session in `state` has lapsed its keepalive
    /// window as of `now`. The sweep task skips proposing `CleanupExpired`
    /// when this is false, to avoid spamming the log with no-op commands.
    pub fn has_expired_sessions(&self, state: &State, now: f64) -> bool {
        state.sessions.values().any(|s| s.is_expired(now))
    }

    /// Ids of every session expired as of `now`, in the same sorted order
    /// `apply_cleanup_expired` uses, so callers that want to log or
    /// report which sessions are about to be swept see a stable list.
    pub fn expired_session_ids(&self, state: &State, now: f64) -> Vec<String> {
        let mut ids: Vec<String> = state
            .sessions
            .iter()
            .filter(|(_, s)| s.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Convenience snapshot for logging/metrics around a sweep.
    pub fn stats(&self, state: &State, now: f64) -> Stats {
        Stats {
            total_sessions: state.sessions.len(),
            active_sessions: state.active_session_count(now),
            expired_sessions: state.expired_session_count(now),
            total_locks: state.locks.len(),
            fence_counter: state.fence_counter,
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Session;
    use std::collections::BTreeSet;

    fn session(id: &str, timeout_secs: u32, last_keepalive: f64) -> Session {
        Session {
            session_id: id.to_string(),
            client_id: "c".to_string(),
            timeout_secs,
            created_at: 0.0,
            last_keepalive,
            locks_held: BTreeSet::new(),
        }
    }

    #[test]
    fn detects_expired_sessions_without_mutating_state() {
        let mut state = State::new();
        state
            .sessions
            .insert("a".to_string(), session("a", 5, 0.0));
        state
            .sessions
            .insert("b".to_string(), session("b", 500, 0.0));

        let expirer = Expirer::new();
        assert!(expirer.has_expired_sessions(&state, 10.0));
        assert_eq!(expirer.expired_session_ids(&state, 10.0), vec!["a"]);
        assert_eq!(state.sessions.len(), 2, "expirer must not mutate state");
    }

    #[test]
    fn no_expired_sessions_is_false() {
        let mut state = State::new();
        state
            .sessions
            .insert("a".to_string(), session("a", 500, 0.0));
        let expirer = Expirer::new();
        assert!(!expirer.has_expired_sessions(&state, 10.0));
        assert!(expirer.expired_session_ids(&state, 10.0).is_empty());
    }
}
