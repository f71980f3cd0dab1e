use super::record::{apply, Record};
use super::{Batch, Store};
use crate::error::{Error, Result};
use crate::keys::{glob_match, literal_prefix};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::collections::BTreeSet;
use std::path::Path;

const TREE: &str = "webindex";

/// Embedded on-disk store.
///
/// Each key maps to a bincode-encoded set or hash. Batches run as a sled
/// transaction on one tree: sled detects conflicting concurrent transactions
/// and re-runs them, so the result is serializable and a batch is never
/// partially visible.
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that is removed when dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let tree = db.open_tree(TREE)?;
        Ok(Self { db, tree })
    }

    /// Block until written data is durable.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Record>> {
        match self.tree.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Record::decode(key, &raw)?)),
            None => Ok(None),
        }
    }
}

impl Store for SledStore {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.tree.contains_key(key.as_bytes())?)
    }

    fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut batch = Batch::new();
        batch.set_add(key, member);
        self.commit(batch)
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        match self.get(key)? {
            Some(record) => record.into_set(key),
            None => Ok(BTreeSet::new()),
        }
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        match self.get(key)? {
            Some(record) => record.field(key, field),
            None => Ok(None),
        }
    }

    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>> {
        let mut keys = BTreeSet::new();
        for entry in self.tree.scan_prefix(literal_prefix(pattern).as_bytes()) {
            let (raw, _) = entry?;
            let key = String::from_utf8(raw.to_vec())
                .map_err(|e| Error::malformed(&String::from_utf8_lossy(&raw), e.to_string()))?;
            if glob_match(pattern, &key) {
                keys.insert(key);
            }
        }
        Ok(keys)
    }

    fn commit(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let result = self.tree.transaction(|tx| {
            for op in batch.ops() {
                let key = op.key();
                let mut slot = match tx.get(key.as_bytes())? {
                    Some(raw) => Some(Record::decode(key, &raw).map_err(ConflictableTransactionError::Abort)?),
                    None => None,
                };
                apply(&mut slot, op).map_err(ConflictableTransactionError::Abort)?;
                match slot {
                    Some(record) => {
                        let raw = record.encode().map_err(ConflictableTransactionError::Abort)?;
                        tx.insert(key.as_bytes(), raw)?;
                    }
                    None => {
                        tx.remove(key.as_bytes())?;
                    }
                }
            }
            Ok(())
        });
        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }
}
