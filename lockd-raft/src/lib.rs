//! Raft-backed `Replicator` implementations and embedded log storage.
//!
//! Two implementations of `lockd_core::Replicator` live here:
//!
//! - [`single_node::SingleNodeReplicator`]: always-leader, commits
//!   synchronously in-process. Used when `PARTNER_ADDRESSES` is empty.
//! - [`node::RaftReplicator`]: a `Clone + Send + Sync` handle backed by an
//!   mpsc channel to a single-owner driver task that exclusively holds
//!   raft-rs's `RawNode`.
//!
//! Cluster membership is fixed at startup: every replica bootstraps the
//! same static voter set from its `self`+`partners` address list and
//! never proposes a `ConfChange`.

pub mod error;
pub mod kv;
pub mod node;
pub mod single_node;
pub mod storage;
pub mod transport;

pub use error::{RaftError, Result};
pub use node::{RaftConfig, RaftReplicator, ReplicatorDriver};
pub use single_node::SingleNodeReplicator;
pub use storage::RaftLogStorage;

/// Generated `StepMessage` gRPC service, carrying opaque raft-rs protobuf
/// bytes between replicas (the same multiplexing pattern etcd and tikv
/// use for peer transport).
pub mod proto {
    #![allow(clippy::all)]
    tonic::include_proto!("lockd.raft");
}

/// Derive each replica's numeric Raft id from its position in the sorted,
/// deduplicated address list — every replica computes the same mapping
/// locally from the same fixed membership set, so no id needs to be
/// negotiated or persisted separately from the `SELF_ADDRESS`/
/// `PARTNER_ADDRESSES` configuration.
pub fn assign_node_ids(addresses: &[String]) -> Vec<(u64, String)> {
    let mut sorted: Vec<String> = addresses.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, addr)| (i as u64 + 1, addr))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_node_ids_is_stable_regardless_of_input_order() {
        let a = assign_node_ids(&[
            "b:2".to_string(),
            "a:1".to_string(),
            "c:3".to_string(),
        ]);
        let b = assign_node_ids(&[
            "c:3".to_string(),
            "b:2".to_string(),
            "a:1".to_string(),
        ]);
        assert_eq!(a, b);
        assert_eq!(a[0], (1, "a:1".to_string()));
        assert_eq!(a[2], (3, "c:3".to_string()));
    }
}
