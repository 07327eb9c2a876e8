//! Service facade and configuration loading.
//!
//! This crate is the seam between the replicated state machine
//! (`lockd-core`/`lockd-raft`) and the HTTP boundary (`lockd-http`): it
//! validates inputs, builds commands, submits them through whichever
//! `Replicator` the binary wired up, and maps the result to a type the
//! HTTP layer can serialize without knowing about `Command`/`LockError`.

pub mod config;
pub mod error;
pub mod facade;
pub mod sweep;

pub use config::{Config, ConfigError};
pub use error::ServiceError;
pub use facade::{CreatedSession, Service};
