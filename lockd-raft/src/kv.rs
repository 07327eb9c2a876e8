//! Minimal embedded key-value storage on top of redb.
//!
//! Covers exactly what the Raft log storage needs: named trees,
//! get/set/append, and a batch for atomic multi-key writes. No
//! revision-counter table, JSON helpers, CAS, or prefix scans — those
//! have no use case here.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A redb database, opened once per replica, holding one tree per
/// logical dataset (currently just the Raft log and Raft hard/conf state).
#[derive(Clone)]
pub struct KvStore {
    db: Arc<Database>,
}

impl KvStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::create(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn open_temporary() -> Result<Self> {
        let tmpfile = tempfile::NamedTempFile::new()
            .map_err(|e| StoreError::Storage(redb::StorageError::Io(e)))?;
        let db = Database::create(tmpfile.path())?;
        std::mem::forget(tmpfile);
        Ok(Self { db: Arc::new(db) })
    }

    /// Open (creating if necessary) a named tree.
    pub fn tree(&self, name: &str) -> Result<KvTree> {
        let table_name = Box::leak(name.to_owned().into_boxed_str());
        let table_def = TableDefinition::<&[u8], &[u8]>::new(table_name);
        let write_txn = self.db.begin_write()?;
        let _ = write_txn.open_table(table_def)?;
        write_txn.commit()?;
        Ok(KvTree {
            db: Arc::clone(&self.db),
            table_name,
        })
    }
}

/// A named tree within a [`KvStore`].
#[derive(Clone)]
pub struct KvTree {
    db: Arc<Database>,
    table_name: &'static str,
}

impl KvTree {
    fn table_def(&self) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
        TableDefinition::new(self.table_name)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        match read_txn.open_table(self.table_def()) {
            Ok(table) => Ok(table.get(key)?.map(|v| v.value().to_vec())),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(self.table_def())?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        let read_txn = match self.db.begin_read() {
            Ok(txn) => txn,
            Err(_) => return true,
        };
        match read_txn.open_table(self.table_def()) {
            Ok(table) => table.is_empty().unwrap_or(true),
            Err(_) => true,
        }
    }

    pub fn last(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        match read_txn.open_table(self.table_def()) {
            Ok(table) => {
                let mut iter = table.iter()?;
                match iter.next_back() {
                    Some(Ok(entry)) => {
                        let (k, v) = entry;
                        Ok(Some((k.value().to_vec(), v.value().to_vec())))
                    }
                    Some(Err(e)) => Err(StoreError::Storage(e)),
                    None => Ok(None),
                }
            }
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn batch(&self) -> KvBatch {
        KvBatch {
            db: Arc::clone(&self.db),
            table_name: self.table_name,
            inserts: Vec::new(),
            removes: Vec::new(),
        }
    }

    pub fn clear(&self) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.delete_table(self.table_def())?;
            write_txn.open_table(self.table_def())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn remove_range(&self, keys: impl Iterator<Item = Vec<u8>>) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(self.table_def())?;
            for key in keys {
                table.remove(key.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

pub struct KvBatch {
    db: Arc<Database>,
    table_name: &'static str,
    inserts: Vec<(Vec<u8>, Vec<u8>)>,
    removes: Vec<Vec<u8>>,
}

impl KvBatch {
    pub fn insert(&mut self, key: &[u8], value: &[u8]) {
        self.inserts.push((key.to_vec(), value.to_vec()));
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.removes.push(key.to_vec());
    }

    pub fn apply(self) -> Result<()> {
        let table_def = TableDefinition::<&[u8], &[u8]>::new(self.table_name);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table_def)?;
            for (k, v) in &self.inserts {
                table.insert(k.as_slice(), v.as_slice())?;
            }
            for k in &self.removes {
                table.remove(k.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}
