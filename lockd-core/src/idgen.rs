//! Session id generation.
//!
//! Generated on the leader *before* a `CreateSession` command is
//! submitted, so the command stays a pure function of `(State, cmd)` on
//! every replica.

use uuid::Uuid;

/// Generates fresh, cluster-unique session identifiers.
pub trait IdGen: Send + Sync {
    /// Produce a new 36-char session id.
    fn new_session_id(&self) -> String;
}

/// UUID-v4-backed generator, the production implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGen;

impl IdGen for UuidGen {
    fn new_session_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
