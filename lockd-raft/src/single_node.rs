//! The single-node fast path: always leader, commits synchronously.
//!
//! Used whenever `PARTNER_ADDRESSES` is empty, to avoid paying for full
//! Raft replication overhead when there is only one replica to agree
//! with.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use lockd_core::{ClusterStatus, Command, CommandResult, LockStateMachine, Replicator, ReplicatorError};

/// A `Replicator` for a cluster of one. Every `submit` applies directly
/// to the local state machine and returns immediately — there is no
/// quorum to wait for.
pub struct SingleNodeReplicator {
    state_machine: Arc<RwLock<LockStateMachine>>,
    self_address: String,
    started_at: std::time::Instant,
}

impl SingleNodeReplicator {
    /// Build a single-node replicator over a fresh state machine.
    pub fn new(self_address: String) -> Self {
        Self {
            state_machine: Arc::new(RwLock::new(LockStateMachine::new())),
            self_address,
            started_at: std::time::Instant::now(),
        }
    }

    /// Shared handle to the underlying state machine, for read-only
    /// queries (`GetSession`, `GetStats`, `LockStatus`, ...) that bypass
    /// `submit` entirely.
    pub fn state_machine(&self) -> Arc<RwLock<LockStateMachine>> {
        Arc::clone(&self.state_machine)
    }
}

#[async_trait]
impl Replicator for SingleNodeReplicator {
    async fn submit(
        &self,
        cmd: Command,
    ) -> Result<Result<CommandResult, lockd_core::LockError>, ReplicatorError> {
        let mut sm = self
            .state_machine
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(sm.apply(&cmd))
    }

    fn is_leader(&self) -> bool {
        true
    }

    fn leader(&self) -> Option<String> {
        Some(self.self_address.clone())
    }

    fn status(&self) -> ClusterStatus {
        ClusterStatus {
            role: lockd_core::Role::Leader,
            is_leader: true,
            has_quorum: true,
            leader: Some(self.self_address.clone()),
            peers: vec![self.self_address.clone()],
            term: 1,
            last_applied_index: 0,
            uptime: self.started_at.elapsed().as_secs_f64(),
        }
    }

    fn is_ready(&self) -> bool {
        true
    }
}
