//! `raft::Storage` backed by redb — persistent log entries, hard state, and
//! conf state for one replica. The snapshot path is kept (raft-rs always
//! calls `Storage::snapshot`) even though this service does not yet
//! implement log compaction.

use raft::eraftpb::{ConfState, Entry, HardState, Snapshot};
use raft::{Error as RaftCoreError, RaftState, Storage, StorageError as RaftStorageError};

use crate::error::{RaftError, Result};
use crate::kv::{KvStore, KvTree};

const TREE_ENTRIES: &str = "raft_entries";
const TREE_STATE: &str = "raft_state";

const KEY_HARD_STATE: &[u8] = b"hard_state";
const KEY_CONF_STATE: &[u8] = b"conf_state";
const KEY_SNAPSHOT: &[u8] = b"snapshot";
const KEY_FIRST_INDEX: &[u8] = b"first_index";

/// Raft log storage for one replica, backed by a redb database file.
pub struct RaftLogStorage {
    entries: KvTree,
    state: KvTree,
}

impl RaftLogStorage {
    pub fn new(store: KvStore) -> Result<Self> {
        let entries = store.tree(TREE_ENTRIES)?;
        let state = store.tree(TREE_STATE)?;
        let storage = Self { entries, state };
        if storage.state.get(KEY_FIRST_INDEX)?.is_none() {
            storage.state.set(KEY_FIRST_INDEX, &1u64.to_be_bytes())?;
        }
        Ok(storage)
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let store = KvStore::open(path.as_ref())?;
        Self::new(store)
    }

    pub fn open_temporary() -> Result<Self> {
        Self::new(KvStore::open_temporary()?)
    }

    fn first_index_impl(&self) -> Result<u64> {
        match self.state.get(KEY_FIRST_INDEX)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| RaftError::Storage("invalid first_index".into()))?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(1),
        }
    }

    fn last_index_impl(&self) -> Result<u64> {
        let first = self.first_index_impl()?;
        if self.entries.is_empty() {
            return Ok(first.saturating_sub(1));
        }
        let last_key = self
            .entries
            .last()?
            .map(|(k, _)| -> Result<u64> {
                let arr: [u8; 8] = k
                    .as_slice()
                    .try_into()
                    .map_err(|_| RaftError::Storage("invalid entry key".into()))?;
                Ok(u64::from_be_bytes(arr))
            })
            .transpose()?
            .unwrap_or(first.saturating_sub(1));
        Ok(last_key)
    }

    fn get_entry(&self, index: u64) -> Result<Option<Entry>> {
        match self.entries.get(&index.to_be_bytes())? {
            Some(bytes) => {
                let entry: Entry = protobuf::Message::parse_from_bytes(&bytes)
                    .map_err(|e| RaftError::Serialization(e.to_string()))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    pub fn append(&self, entries: &[Entry]) -> Result<()> {
        let mut batch = self.entries.batch();
        for entry in entries {
            let key = entry.index.to_be_bytes();
            let value = protobuf::Message::write_to_bytes(entry)
                .map_err(|e| RaftError::Serialization(e.to_string()))?;
            batch.insert(&key, &value);
        }
        batch.apply()?;
        Ok(())
    }

    pub fn set_hard_state(&self, hs: &HardState) -> Result<()> {
        let value = protobuf::Message::write_to_bytes(hs)
            .map_err(|e| RaftError::Serialization(e.to_string()))?;
        self.state.set(KEY_HARD_STATE, &value)?;
        Ok(())
    }

    pub fn set_conf_state(&self, cs: &ConfState) -> Result<()> {
        let value = protobuf::Message::write_to_bytes(cs)
            .map_err(|e| RaftError::Serialization(e.to_string()))?;
        self.state.set(KEY_CONF_STATE, &value)?;
        Ok(())
    }

    pub fn apply_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let meta = snapshot.get_metadata();
        let new_first = meta.index + 1;
        self.state.set(KEY_FIRST_INDEX, &new_first.to_be_bytes())?;
        self.entries.clear()?;
        let value = protobuf::Message::write_to_bytes(snapshot)
            .map_err(|e| RaftError::Serialization(e.to_string()))?;
        self.state.set(KEY_SNAPSHOT, &value)?;
        self.set_conf_state(meta.get_conf_state())?;
        Ok(())
    }
}

impl Storage for RaftLogStorage {
    fn initial_state(&self) -> raft::Result<RaftState> {
        let hard_state = match self.state.get(KEY_HARD_STATE).map_err(to_raft_error)? {
            Some(bytes) => protobuf::Message::parse_from_bytes(&bytes)
                .map_err(|e| RaftCoreError::Store(RaftStorageError::Other(Box::new(e))))?,
            None => HardState::default(),
        };
        let conf_state = match self.state.get(KEY_CONF_STATE).map_err(to_raft_error)? {
            Some(bytes) => protobuf::Message::parse_from_bytes(&bytes)
                .map_err(|e| RaftCoreError::Store(RaftStorageError::Other(Box::new(e))))?,
            None => ConfState::default(),
        };
        Ok(RaftState {
            hard_state,
            conf_state,
        })
    }

    fn entries(
        &self,
        low: u64,
        high: u64,
        max_size: impl Into<Option<u64>>,
        _context: raft::GetEntriesContext,
    ) -> raft::Result<Vec<Entry>> {
        let first = self.first_index_impl().map_err(to_raft_error)?;
        let last = self.last_index_impl().map_err(to_raft_error)?;

        if low < first {
            return Err(RaftCoreError::Store(RaftStorageError::Compacted));
        }
        if high > last + 1 {
            return Err(RaftCoreError::Store(RaftStorageError::Unavailable));
        }

        let max_size = max_size.into().unwrap_or(u64::MAX);
        let mut entries = Vec::new();
        let mut size: u64 = 0;
        for idx in low..high {
            if let Some(entry) = self.get_entry(idx).map_err(to_raft_error)? {
                let entry_size = protobuf::Message::compute_size(&entry) as u64;
                if !entries.is_empty() && size + entry_size > max_size {
                    break;
                }
                size += entry_size;
                entries.push(entry);
            } else {
                return Err(RaftCoreError::Store(RaftStorageError::Unavailable));
            }
        }
        Ok(entries)
    }

    fn term(&self, idx: u64) -> raft::Result<u64> {
        let first = self.first_index_impl().map_err(to_raft_error)?;
        if idx < first {
            if let Ok(snap) = self.snapshot(0, 0) {
                if snap.get_metadata().index == idx {
                    return Ok(snap.get_metadata().term);
                }
            }
            return Err(RaftCoreError::Store(RaftStorageError::Compacted));
        }
        match self.get_entry(idx).map_err(to_raft_error)? {
            Some(entry) => Ok(entry.term),
            None => Err(RaftCoreError::Store(RaftStorageError::Unavailable)),
        }
    }

    fn first_index(&self) -> raft::Result<u64> {
        self.first_index_impl().map_err(to_raft_error)
    }

    fn last_index(&self) -> raft::Result<u64> {
        self.last_index_impl().map_err(to_raft_error)
    }

    fn snapshot(&self, _request_index: u64, _to: u64) -> raft::Result<Snapshot> {
        match self.state.get(KEY_SNAPSHOT).map_err(to_raft_error)? {
            Some(bytes) => {
                let snapshot: Snapshot = protobuf::Message::parse_from_bytes(&bytes)
                    .map_err(|e| RaftCoreError::Store(RaftStorageError::Other(Box::new(e))))?;
                Ok(snapshot)
            }
            None => Ok(Snapshot::default()),
        }
    }
}

fn to_raft_error(e: impl std::error::Error + Send + Sync + 'static) -> RaftCoreError {
    RaftCoreError::Store(RaftStorageError::Other(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> RaftLogStorage {
        RaftLogStorage::open_temporary().unwrap()
    }

    #[test]
    fn first_last_index_empty() {
        let s = storage();
        assert_eq!(s.first_index().unwrap(), 1);
        assert_eq!(s.last_index().unwrap(), 0);
    }

    #[test]
    fn append_and_retrieve() {
        let s = storage();
        let mut entries = vec![];
        for i in 1..=5 {
            let mut entry = Entry::default();
            entry.index = i;
            entry.term = 1;
            entry.data = format!("data-{i}").into_bytes().into();
            entries.push(entry);
        }
        s.append(&entries).unwrap();
        assert_eq!(s.last_index().unwrap(), 5);
        let retrieved = s
            .entries(1, 6, None, raft::GetEntriesContext::empty(false))
            .unwrap();
        assert_eq!(retrieved.len(), 5);
    }

    #[test]
    fn hard_state_round_trips() {
        let s = storage();
        let mut hs = HardState::default();
        hs.term = 5;
        hs.vote = 2;
        hs.commit = 10;
        s.set_hard_state(&hs).unwrap();
        let state = s.initial_state().unwrap();
        assert_eq!(state.hard_state.term, 5);
    }
}
