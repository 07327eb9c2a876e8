//! In-memory data model and deterministic state machine for the lock
//! service.
//!
//! This crate holds everything that must behave identically on every
//! replica: `State` (sessions, locks, the fence counter), the `Command`
//! log entries replicas exchange, `LockStateMachine::apply`, the
//! `Replicator` trait those commands are submitted through, and the
//! read-only `Expirer` that decides when a sweep is worth proposing.
//!
//! Nothing in this crate talks to the network or the filesystem — that's
//! `lockd-raft`'s job. Nothing in this crate knows about HTTP — that's
//! `lockd-http`'s job. Keeping the state machine free of both is what
//! makes `apply` testable as a pure function of `(State, Command)`.

pub mod clock;
pub mod command;
pub mod error;
pub mod expirer;
pub mod idgen;
pub mod model;
pub mod replicator;
pub mod state_machine;

pub use clock::{Clock, SystemClock};
pub use command::{Command, CommandResult, SessionView, Stats};
pub use error::{LockError, Result};
pub use expirer::Expirer;
pub use idgen::{IdGen, UuidGen};
pub use model::{Lock, Session, State};
pub use replicator::{ClusterStatus, Replicator, ReplicatorError, Role};
pub use state_machine::LockStateMachine;
