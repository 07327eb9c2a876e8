//! The Service facade: validates inputs, builds `Command`s, submits them
//! through the `Replicator`, and maps results to caller-visible outcomes.
//! Read operations bypass `submit` and read the state machine directly.

use std::sync::{Arc, RwLock};

use lockd_core::{
    Clock, Command, CommandResult, IdGen, Lock, LockError, LockStateMachine, Replicator,
    SessionView, Stats,
};

use crate::error::ServiceError;

/// Thin, clonable adapter the HTTP boundary talks to. Cheap to clone:
/// every field is an `Arc`.
#[derive(Clone)]
pub struct Service {
    replicator: Arc<dyn Replicator>,
    state: Arc<RwLock<LockStateMachine>>,
    clock: Arc<dyn Clock>,
    idgen: Arc<dyn IdGen>,
}

/// What `create_session` hands back to the HTTP boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSession {
    pub session_id: String,
    pub client_id: String,
    pub timeout_secs: u32,
}

impl Service {
    pub fn new(
        replicator: Arc<dyn Replicator>,
        state: Arc<RwLock<LockStateMachine>>,
        clock: Arc<dyn Clock>,
        idgen: Arc<dyn IdGen>,
    ) -> Self {
        Self {
            replicator,
            state,
            clock,
            idgen,
        }
    }

    /// Current wall-clock reading, for the `/health` timestamp.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    fn read<R>(&self, f: impl FnOnce(&LockStateMachine) -> R) -> R {
        let guard = self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    async fn submit(&self, cmd: Command) -> Result<CommandResult, ServiceError> {
        match self.replicator.submit(cmd).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(lock_err)) => Err(ServiceError::Lock(lock_err)),
            Err(repl_err) => Err(ServiceError::Replicator(repl_err)),
        }
    }

    /// Validate and submit `CreateSession`. `client_id` trimmed
    /// non-empty ≤255 chars; `timeout_secs` in `5..=3600`.
    pub async fn create_session(
        &self,
        client_id: &str,
        timeout_secs: u32,
    ) -> Result<CreatedSession, ServiceError> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(ServiceError::invalid("client_id must not be empty"));
        }
        if client_id.chars().count() > 255 {
            return Err(ServiceError::invalid(
                "client_id must not exceed 255 characters",
            ));
        }
        if !(5..=3600).contains(&timeout_secs) {
            return Err(ServiceError::invalid(
                "timeout must be between 5 and 3600 seconds",
            ));
        }

        let session_id = self.idgen.new_session_id();
        let now = self.now();
        let result = self
            .submit(Command::CreateSession {
                session_id: session_id.clone(),
                client_id: client_id.to_string(),
                timeout_secs,
                now,
            })
            .await?;
        match result {
            CommandResult::SessionCreated(session_id) => Ok(CreatedSession {
                session_id,
                client_id: client_id.to_string(),
                timeout_secs,
            }),
            other => unreachable!("CreateSession produced {other:?}"),
        }
    }

    /// `GetSession` — read-only, bypasses the log.
    pub fn get_session(&self, session_id: &str) -> Result<SessionView, ServiceError> {
        let now = self.now();
        self.read(|sm| sm.get_session(session_id, now))
            .map_err(ServiceError::Lock)
    }

    /// `Keepalive`.
    pub async fn keepalive(&self, session_id: &str) -> Result<(), ServiceError> {
        let now = self.now();
        self.submit(Command::Keepalive {
            session_id: session_id.to_string(),
            now,
        })
        .await?;
        Ok(())
    }

    /// `DeleteSession`.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), ServiceError> {
        self.submit(Command::DeleteSession {
            session_id: session_id.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Validate and submit `AcquireLock`. `resource` trimmed 1..255 chars.
    pub async fn acquire_lock(
        &self,
        session_id: &str,
        resource: &str,
    ) -> Result<u64, ServiceError> {
        let resource = validate_resource(resource)?;
        let now = self.now();
        let result = self
            .submit(Command::AcquireLock {
                session_id: session_id.to_string(),
                resource,
                now,
            })
            .await?;
        match result {
            CommandResult::LockAcquired(token) => Ok(token),
            other => unreachable!("AcquireLock produced {other:?}"),
        }
    }

    /// Validate and submit `ReleaseLock`. `fence_token` must be positive.
    pub async fn release_lock(
        &self,
        session_id: &str,
        resource: &str,
        fence_token: u64,
    ) -> Result<(), ServiceError> {
        let resource = validate_resource(resource)?;
        if fence_token == 0 {
            return Err(ServiceError::invalid("fence_token must be a positive integer"));
        }
        self.submit(Command::ReleaseLock {
            session_id: session_id.to_string(),
            resource,
            fence_token,
        })
        .await?;
        Ok(())
    }

    /// `CleanupExpired`, invoked by `/admin/cleanup` or the periodic sweep.
    pub async fn cleanup_expired(&self) -> Result<usize, ServiceError> {
        let now = self.now();
        let result = self.submit(Command::CleanupExpired { now }).await?;
        match result {
            CommandResult::CleanedUp(count) => Ok(count),
            other => unreachable!("CleanupExpired produced {other:?}"),
        }
    }

    /// `GetStats` — read-only.
    pub fn stats(&self) -> Stats {
        let now = self.now();
        self.read(|sm| sm.stats(now))
    }

    /// `LockStatus` — read-only.
    pub fn lock_status(&self, resource: &str) -> Option<String> {
        self.read(|sm| sm.lock_status(resource))
    }

    /// Full lock detail for `/locks/{resource}` — read-only, additive
    /// over `LockStatus`'s bare owner-id string.
    pub fn lock_info(&self, resource: &str) -> Option<Lock> {
        self.read(|sm| sm.lock_info(resource))
    }

    /// `GetClusterStatus` — joins `Replicator::status()` with `GetStats`.
    pub fn cluster_status(&self) -> (lockd_core::ClusterStatus, Stats) {
        (self.replicator.status(), self.stats())
    }

    /// Whether this replica believes itself the leader.
    pub fn is_leader(&self) -> bool {
        self.replicator.is_leader()
    }

    /// Best-known current leader address.
    pub fn leader(&self) -> Option<String> {
        self.replicator.leader()
    }

    /// Whether this replicator has caught up enough to serve reads.
    pub fn is_ready(&self) -> bool {
        self.replicator.is_ready()
    }

    /// Whether at least one session has lapsed, used by the periodic
    /// sweep to skip proposing `CleanupExpired` when there is nothing to
    /// collect.
    pub fn has_expired_sessions(&self) -> bool {
        let now = self.now();
        let expirer = lockd_core::Expirer::new();
        self.read(|sm| expirer.has_expired_sessions(sm.state(), now))
    }
}

fn validate_resource(resource: &str) -> Result<String, ServiceError> {
    let trimmed = resource.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid("resource must not be empty"));
    }
    if trimmed.chars().count() > 255 {
        return Err(ServiceError::invalid(
            "resource must not exceed 255 characters",
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockd_core::{IdGen, SystemClock, UuidGen};
    use lockd_raft::SingleNodeReplicator;

    fn service() -> Service {
        let replicator = Arc::new(SingleNodeReplicator::new("127.0.0.1:7000".into()));
        let state = replicator.state_machine();
        Service::new(replicator, state, Arc::new(SystemClock), Arc::new(UuidGen))
    }

    #[tokio::test]
    async fn create_session_rejects_out_of_range_timeout() {
        let svc = service();
        let err = svc.create_session("client-a", 4).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
        let err = svc.create_session("client-a", 3601).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_session_rejects_blank_client_id() {
        let svc = service();
        let err = svc.create_session("   ", 60).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn acquire_conflict_and_reacquire_bumps_fence() {
        let svc = service();
        let s1 = svc.create_session("c1", 60).await.unwrap().session_id;
        let s2 = svc.create_session("c2", 60).await.unwrap().session_id;

        let token = svc.acquire_lock(&s1, "R").await.unwrap();
        let err = svc.acquire_lock(&s2, "R").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Lock(LockError::LockAlreadyHeld { .. })
        ));

        svc.release_lock(&s1, "R", token).await.unwrap();
        let token2 = svc.acquire_lock(&s2, "R").await.unwrap();
        assert!(token2 > token);
    }

    #[tokio::test]
    async fn get_session_reports_is_expired() {
        let svc = service();
        let s1 = svc.create_session("c1", 60).await.unwrap().session_id;
        let view = svc.get_session(&s1).unwrap();
        assert!(!view.is_expired);
    }
}
