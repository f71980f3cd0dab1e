use super::record::{apply, Record};
use super::{Batch, Op, Store};
use crate::error::{Error, Result};
use crate::keys::glob_match;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};

/// In-process store.
///
/// A batch is staged against the keys it touches while the write lock is held
/// and published only when every op has applied, so readers see it entirely
/// or not at all. Failures can be injected for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Record>>,
    faults: Mutex<Faults>,
}

#[derive(Debug, Default)]
struct Faults {
    offline: bool,
    fail_commit_after: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first commit that gets past staging `ops` of its operations.
    /// Smaller batches commit normally and leave the fault armed; it is
    /// cleared once it fires.
    pub fn fail_commit_after(&self, ops: usize) {
        self.faults.lock().fail_commit_after = Some(ops);
    }

    /// While offline every call fails with `StoreUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.faults.lock().offline = offline;
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Raw write of a hash field, bypassing batches. Lets tests plant records
    /// the index itself would never produce.
    pub fn put_raw_field(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let op = Op::HashSet { key: key.into(), field: field.into(), value: value.into() };
        let mut data = self.data.write();
        let mut slot = data.get(key).cloned();
        apply(&mut slot, &op)?;
        if let Some(record) = slot {
            data.insert(key.to_string(), record);
        }
        Ok(())
    }

    fn check_online(&self) -> Result<()> {
        if self.faults.lock().offline {
            return Err(Error::unavailable("memory store is offline"));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn exists(&self, key: &str) -> Result<bool> {
        self.check_online()?;
        Ok(self.data.read().contains_key(key))
    }

    fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut batch = Batch::new();
        batch.set_add(key, member);
        self.commit(batch)
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        self.check_online()?;
        match self.data.read().get(key) {
            Some(record) => record.clone().into_set(key),
            None => Ok(BTreeSet::new()),
        }
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.check_online()?;
        match self.data.read().get(key) {
            Some(record) => record.field(key, field),
            None => Ok(None),
        }
    }

    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>> {
        self.check_online()?;
        Ok(self
            .data
            .read()
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }

    fn commit(&self, batch: Batch) -> Result<()> {
        self.check_online()?;
        let mut data = self.data.write();
        let fail_at = self.faults.lock().fail_commit_after.filter(|n| *n < batch.len());

        let mut staged: HashMap<&str, Option<Record>> = HashMap::new();
        for (applied, op) in batch.ops().iter().enumerate() {
            if fail_at == Some(applied) {
                self.faults.lock().fail_commit_after = None;
                return Err(Error::unavailable(format!("commit aborted after {applied} ops")));
            }
            let key = op.key();
            let slot = staged.entry(key).or_insert_with(|| data.get(key).cloned());
            apply(slot, op)?;
        }

        for (key, value) in staged {
            match value {
                Some(record) => {
                    data.insert(key.to_string(), record);
                }
                None => {
                    data.remove(key);
                }
            }
        }
        Ok(())
    }
}
