//! JSON response bodies, bit-exact with the HTTP contract's table.

use serde::Serialize;

use lockd_core::{ClusterStatus, Lock, SessionView, Stats};

/// `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub timestamp: f64,
    pub is_leader: bool,
    pub leader: Option<String>,
    pub is_ready: bool,
}

/// `POST /sessions`.
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub client_id: String,
    pub timeout: u32,
    pub keepalive_interval: u32,
}

/// `GET /sessions/{id}`.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub client_id: String,
    pub timeout: u32,
    pub created_at: f64,
    pub last_keepalive: f64,
    pub locks_held: Vec<String>,
    pub is_expired: bool,
    pub keepalive_interval: u32,
}

impl From<SessionView> for SessionResponse {
    fn from(view: SessionView) -> Self {
        let timeout = view.session.timeout_secs;
        SessionResponse {
            session_id: view.session.session_id,
            client_id: view.session.client_id,
            timeout,
            created_at: view.session.created_at,
            last_keepalive: view.session.last_keepalive,
            locks_held: view.session.locks_held.into_iter().collect(),
            is_expired: view.is_expired,
            keepalive_interval: timeout / 3,
        }
    }
}

/// `POST /sessions/{id}/keepalive`.
#[derive(Debug, Serialize)]
pub struct KeepaliveResponse {
    pub updated: bool,
    pub session_id: String,
}

/// `DELETE /sessions/{id}`.
#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub deleted: bool,
    pub session_id: String,
}

/// `POST /sessions/{id}/locks/{resource}`.
#[derive(Debug, Serialize)]
pub struct AcquireLockResponse {
    pub session_id: String,
    pub resource: String,
    pub fence_token: u64,
    pub acquired: bool,
}

/// `DELETE /sessions/{id}/locks/{resource}`.
#[derive(Debug, Serialize)]
pub struct ReleaseLockResponse {
    pub session_id: String,
    pub resource: String,
    pub fence_token: u64,
    pub released: bool,
}

/// `GET /locks/{resource}` — additive read-only superset of `LockStatus`,
/// exposing the full lock record rather than just the owner id.
#[derive(Debug, Serialize)]
pub struct LockInfoResponse {
    pub resource: String,
    pub locked: bool,
    pub session_id: Option<String>,
    pub fence_token: Option<u64>,
    pub acquired_at: Option<f64>,
}

impl LockInfoResponse {
    pub fn from_lock(resource: &str, lock: Option<Lock>) -> Self {
        match lock {
            Some(l) => LockInfoResponse {
                resource: resource.to_string(),
                locked: true,
                session_id: Some(l.session_id),
                fence_token: Some(l.fence_token),
                acquired_at: Some(l.acquired_at),
            },
            None => LockInfoResponse {
                resource: resource.to_string(),
                locked: false,
                session_id: None,
                fence_token: None,
                acquired_at: None,
            },
        }
    }
}

/// `GET /admin/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub expired_sessions: usize,
    pub total_locks: usize,
    pub fence_counter: u64,
    pub timestamp: f64,
}

impl From<Stats> for StatsResponse {
    fn from(s: Stats) -> Self {
        StatsResponse {
            total_sessions: s.total_sessions,
            active_sessions: s.active_sessions,
            expired_sessions: s.expired_sessions,
            total_locks: s.total_locks,
            fence_counter: s.fence_counter,
            timestamp: s.timestamp,
        }
    }
}

/// `GET /admin/cluster` — `GetClusterStatus`: a `ClusterStatus` joined
/// with `Stats`.
#[derive(Debug, Serialize)]
pub struct ClusterStatusResponse {
    pub role: &'static str,
    pub is_leader: bool,
    pub leader_address: Option<String>,
    pub has_quorum: bool,
    pub term: u64,
    pub uptime: f64,
    pub peer_count: usize,
    #[serde(flatten)]
    pub stats: StatsResponse,
}

impl ClusterStatusResponse {
    pub fn new(status: ClusterStatus, stats: Stats) -> Self {
        ClusterStatusResponse {
            role: status.role.as_str(),
            is_leader: status.is_leader,
            leader_address: status.leader,
            has_quorum: status.has_quorum,
            term: status.term,
            uptime: status.uptime,
            peer_count: status.peers.len(),
            stats: stats.into(),
        }
    }
}

/// A validation or state-machine error: a human-readable `error` field
/// plus contextual fields.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fence_token: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorResponse {
            error: message.into(),
            session_id: None,
            resource: None,
            fence_token: None,
            leader: None,
        }
    }
}
