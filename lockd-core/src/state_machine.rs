//! The command executor — the heart of the design.
//!
//! `apply` is a pure function of `(State, cmd)`: given the same state and
//! the same command (with its `now`/`session_id` already resolved by the
//! leader), every replica produces the same new state and the same
//! result. This is what lets the Replicator apply committed entries on
//! each replica independently and still guarantee convergence.

use crate::command::{Command, CommandResult, SessionView, Stats};
use crate::error::{LockError, Result};
use crate::model::{Lock, Session, State};

/// Applies committed commands to `State` and serves read-only queries.
///
/// A concrete type rather than a generic trait: every replica stores the
/// same session and lock state, so there is no vote-only, no-state-machine
/// role to plug in behind a trait object.
#[derive(Debug, Default)]
pub struct LockStateMachine {
    state: State,
}

impl LockStateMachine {
    /// Construct a state machine over a fresh, empty state.
    pub fn new() -> Self {
        Self {
            state: State::new(),
        }
    }

    /// Restore a state machine from a previously snapshotted state
    /// (used by the Replicator when installing a snapshot on a lagging
    /// or restarting replica).
    pub fn from_state(state: State) -> Self {
        Self { state }
    }

    /// Read-only access to the underlying state, for snapshotting.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Apply a committed command, mutating `State` and returning the
    /// outcome. Called by the Replicator on every replica, in commit
    /// order.
    pub fn apply(&mut self, cmd: &Command) -> Result<CommandResult> {
        match cmd {
            Command::CreateSession {
                session_id,
                client_id,
                timeout_secs,
                now,
            } => self.apply_create_session(session_id, client_id, *timeout_secs, *now),
            Command::Keepalive { session_id, now } => self.apply_keepalive(session_id, *now),
            Command::DeleteSession { session_id } => self.apply_delete_session(session_id),
            Command::AcquireLock {
                session_id,
                resource,
                now,
            } => self.apply_acquire_lock(session_id, resource, *now),
            Command::ReleaseLock {
                session_id,
                resource,
                fence_token,
            } => self.apply_release_lock(session_id, resource, *fence_token),
            Command::CleanupExpired { now } => self.apply_cleanup_expired(*now),
        }
    }

    fn apply_create_session(
        &mut self,
        session_id: &str,
        client_id: &str,
        timeout_secs: u32,
        now: f64,
    ) -> Result<CommandResult> {
        let session = Session {
            session_id: session_id.to_string(),
            client_id: client_id.to_string(),
            timeout_secs,
            created_at: now,
            last_keepalive: now,
            locks_held: Default::default(),
        };
        tracing::info!(session_id, client_id, timeout_secs, "session created");
        self.state.sessions.insert(session_id.to_string(), session);
        Ok(CommandResult::SessionCreated(session_id.to_string()))
    }

    fn apply_keepalive(&mut self, session_id: &str, now: f64) -> Result<CommandResult> {
        let session = self.require_session(session_id)?;
        if session.is_expired(now) {
            tracing::info!(session_id, "keepalive rejected: session expired");
            return Err(LockError::SessionExpired {
                session_id: session_id.to_string(),
            });
        }
        session.last_keepalive = now;
        tracing::debug!(session_id, "keepalive applied");
        Ok(CommandResult::KeepaliveOk)
    }

    fn apply_delete_session(&mut self, session_id: &str) -> Result<CommandResult> {
        let session = self
            .state
            .sessions
            .remove(session_id)
            .ok_or_else(|| LockError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        for resource in &session.locks_held {
            self.state.locks.remove(resource);
        }
        tracing::info!(
            session_id,
            released = session.locks_held.len(),
            "session deleted"
        );
        Ok(CommandResult::SessionDeleted)
    }

    fn apply_acquire_lock(
        &mut self,
        session_id: &str,
        resource: &str,
        now: f64,
    ) -> Result<CommandResult> {
        {
            let session = self.require_session(session_id)?;
            if session.is_expired(now) {
                return Err(LockError::SessionExpired {
                    session_id: session_id.to_string(),
                });
            }
        }

        if let Some(existing) = self.state.locks.get(resource) {
            if existing.session_id == session_id {
                // Idempotent re-acquisition by the current owner: no new token.
                return Ok(CommandResult::LockAcquired(existing.fence_token));
            }
            tracing::info!(resource, session_id, "acquire rejected: already held");
            return Err(LockError::LockAlreadyHeld {
                resource: resource.to_string(),
            });
        }

        self.state.fence_counter += 1;
        let fence_token = self.state.fence_counter;
        self.state.locks.insert(
            resource.to_string(),
            Lock {
                resource: resource.to_string(),
                session_id: session_id.to_string(),
                fence_token,
                acquired_at: now,
            },
        );
        // Session existence was already validated above; re-borrow to mutate.
        if let Some(session) = self.state.sessions.get_mut(session_id) {
            session.locks_held.insert(resource.to_string());
        }
        tracing::info!(resource, session_id, fence_token, "lock acquired");
        Ok(CommandResult::LockAcquired(fence_token))
    }

    fn apply_release_lock(
        &mut self,
        session_id: &str,
        resource: &str,
        fence_token: u64,
    ) -> Result<CommandResult> {
        // Check order matters: not-found, then fence mismatch, then ownership.
        let lock = self
            .state
            .locks
            .get(resource)
            .ok_or_else(|| LockError::LockNotFound {
                resource: resource.to_string(),
            })?;

        if lock.fence_token != fence_token {
            return Err(LockError::InvalidFenceToken { fence_token });
        }

        if lock.session_id != session_id {
            return Err(LockError::LockNotOwned {
                session_id: session_id.to_string(),
                resource: resource.to_string(),
            });
        }

        self.state.locks.remove(resource);
        if let Some(session) = self.state.sessions.get_mut(session_id) {
            session.locks_held.remove(resource);
        }
        tracing::info!(resource, session_id, "lock released");
        Ok(CommandResult::LockReleased)
    }

    fn apply_cleanup_expired(&mut self, now: f64) -> Result<CommandResult> {
        // Deterministic ordering across replicas: sort by session_id.
        let mut expired: Vec<String> = self
            .state
            .sessions
            .iter()
            .filter(|(_, s)| s.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();

        for session_id in &expired {
            if let Some(session) = self.state.sessions.remove(session_id) {
                for resource in &session.locks_held {
                    self.state.locks.remove(resource);
                }
            }
        }
        tracing::info!(count = expired.len(), "expired sessions cleaned up");
        Ok(CommandResult::CleanedUp(expired.len()))
    }

    fn require_session(&mut self, session_id: &str) -> Result<&mut Session> {
        self.state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| LockError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    // --- read-only queries; bypass the log entirely ---

    /// `GetSession`: snapshot augmented with `is_expired`.
    pub fn get_session(&self, session_id: &str, now: f64) -> Result<SessionView> {
        let session =
            self.state
                .sessions
                .get(session_id)
                .ok_or_else(|| LockError::SessionNotFound {
                    session_id: session_id.to_string(),
                })?;
        Ok(SessionView {
            session: session.clone(),
            is_expired: session.is_expired(now),
        })
    }

    /// `LockStatus`: the owning session id, or `None`.
    pub fn lock_status(&self, resource: &str) -> Option<String> {
        self.state.locks.get(resource).map(|l| l.session_id.clone())
    }

    /// Full lock detail for a resource, if held.
    pub fn lock_info(&self, resource: &str) -> Option<Lock> {
        self.state.locks.get(resource).cloned()
    }

    /// `GetStats`.
    pub fn stats(&self, now: f64) -> Stats {
        Stats {
            total_sessions: self.state.sessions.len(),
            active_sessions: self.state.active_session_count(now),
            expired_sessions: self.state.expired_session_count(now),
            total_locks: self.state.locks.len(),
            fence_counter: self.state.fence_counter,
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandResult as R;

    fn create(sm: &mut LockStateMachine, client_id: &str, timeout_secs: u32, now: f64) -> String {
        match sm
            .apply(&Command::CreateSession {
                session_id: format!("s-{client_id}"),
                client_id: client_id.to_string(),
                timeout_secs,
                now,
            })
            .unwrap()
        {
            R::SessionCreated(id) => id,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn create_session_then_get_reports_keepalive_interval_inputs() {
        let mut sm = LockStateMachine::new();
        let id = create(&mut sm, "test-client-1", 60, 1000.0);
        let view = sm.get_session(&id, 1000.0).unwrap();
        assert!(!view.is_expired);
        assert_eq!(view.session.timeout_secs, 60);
    }

    #[test]
    fn acquire_conflict_then_release_then_reacquire_bumps_fence() {
        let mut sm = LockStateMachine::new();
        let s1 = create(&mut sm, "c1", 60, 0.0);
        let s2 = create(&mut sm, "c2", 60, 0.0);

        let token = match sm
            .apply(&Command::AcquireLock {
                session_id: s1.clone(),
                resource: "R".into(),
                now: 1.0,
            })
            .unwrap()
        {
            R::LockAcquired(t) => t,
            other => panic!("{other:?}"),
        };
        assert_eq!(token, 1);

        let err = sm
            .apply(&Command::AcquireLock {
                session_id: s2.clone(),
                resource: "R".into(),
                now: 1.0,
            })
            .unwrap_err();
        assert_eq!(
            err,
            LockError::LockAlreadyHeld {
                resource: "R".into()
            }
        );

        sm.apply(&Command::ReleaseLock {
            session_id: s1,
            resource: "R".into(),
            fence_token: token,
        })
        .unwrap();

        let token2 = match sm
            .apply(&Command::AcquireLock {
                session_id: s2,
                resource: "R".into(),
                now: 2.0,
            })
            .unwrap()
        {
            R::LockAcquired(t) => t,
            other => panic!("{other:?}"),
        };
        assert!(token2 > token);
    }

    #[test]
    fn acquire_same_session_is_idempotent() {
        let mut sm = LockStateMachine::new();
        let s1 = create(&mut sm, "c1", 60, 0.0);
        let t1 = match sm
            .apply(&Command::AcquireLock {
                session_id: s1.clone(),
                resource: "R".into(),
                now: 1.0,
            })
            .unwrap()
        {
            R::LockAcquired(t) => t,
            other => panic!("{other:?}"),
        };
        let t2 = match sm
            .apply(&Command::AcquireLock {
                session_id: s1,
                resource: "R".into(),
                now: 2.0,
            })
            .unwrap()
        {
            R::LockAcquired(t) => t,
            other => panic!("{other:?}"),
        };
        assert_eq!(t1, t2);
        assert_eq!(sm.stats(2.0).fence_counter, 1);
    }

    #[test]
    fn release_error_precedence_is_not_found_then_fence_then_ownership() {
        let mut sm = LockStateMachine::new();
        let s1 = create(&mut sm, "c1", 60, 0.0);
        let s2 = create(&mut sm, "c2", 60, 0.0);

        let err = sm
            .apply(&Command::ReleaseLock {
                session_id: s1.clone(),
                resource: "missing".into(),
                fence_token: 1,
            })
            .unwrap_err();
        assert_eq!(
            err,
            LockError::LockNotFound {
                resource: "missing".into()
            }
        );

        let token = match sm
            .apply(&Command::AcquireLock {
                session_id: s1.clone(),
                resource: "R".into(),
                now: 1.0,
            })
            .unwrap()
        {
            R::LockAcquired(t) => t,
            other => panic!("{other:?}"),
        };

        let err = sm
            .apply(&Command::ReleaseLock {
                session_id: s1.clone(),
                resource: "R".into(),
                fence_token: token + 99,
            })
            .unwrap_err();
        assert_eq!(
            err,
            LockError::InvalidFenceToken {
                fence_token: token + 99
            }
        );

        let err = sm
            .apply(&Command::ReleaseLock {
                session_id: s2,
                resource: "R".into(),
                fence_token: token,
            })
            .unwrap_err();
        assert_eq!(
            err,
            LockError::LockNotOwned {
                session_id: "s-c2".into(),
                resource: "R".into()
            }
        );
        let _ = s1;
    }

    #[test]
    fn keepalive_on_expired_session_fails_and_does_not_delete() {
        let mut sm = LockStateMachine::new();
        let id = create(&mut sm, "c1", 5, 0.0);
        let err = sm
            .apply(&Command::Keepalive {
                session_id: id.clone(),
                now: 6.5,
            })
            .unwrap_err();
        assert_eq!(
            err,
            LockError::SessionExpired {
                session_id: id.clone()
            }
        );
        // Still readable — deletion only happens via DeleteSession/CleanupExpired.
        let view = sm.get_session(&id, 6.5).unwrap();
        assert!(view.is_expired);
    }

    #[test]
    fn delete_session_is_permitted_even_when_expired_and_then_idempotent() {
        let mut sm = LockStateMachine::new();
        let id = create(&mut sm, "c1", 5, 0.0);
        sm.apply(&Command::AcquireLock {
            session_id: id.clone(),
            resource: "R".into(),
            now: 0.0,
        })
        .unwrap();

        sm.apply(&Command::DeleteSession {
            session_id: id.clone(),
        })
        .unwrap();
        assert!(sm.lock_status("R").is_none());

        let err = sm
            .apply(&Command::DeleteSession { session_id: id })
            .unwrap_err();
        assert!(matches!(err, LockError::SessionNotFound { .. }));
    }

    #[test]
    fn cleanup_expired_releases_locks_and_is_deterministic() {
        let mut sm = LockStateMachine::new();
        let s1 = create(&mut sm, "c1", 1, 0.0);
        sm.apply(&Command::AcquireLock {
            session_id: s1.clone(),
            resource: "R".into(),
            now: 0.0,
        })
        .unwrap();

        let cleaned = match sm.apply(&Command::CleanupExpired { now: 5.0 }).unwrap() {
            R::CleanedUp(n) => n,
            other => panic!("{other:?}"),
        };
        assert_eq!(cleaned, 1);
        assert!(sm.lock_status("R").is_none());
        assert!(sm.get_session(&s1, 5.0).is_err());
    }
}
