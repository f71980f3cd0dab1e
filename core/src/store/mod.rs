//! Key-value store seam.
//!
//! The index speaks to its backend only through [`Store`]: single-key reads,
//! a non-transactional set-add, pattern scans, and [`Store::commit`] for a
//! [`Batch`] of writes that must apply as one unit.
//!
//! Every adapter guarantees that a committed batch is all-or-nothing and that
//! two batches never interleave, including batches touching the same keys:
//!
//! * [`MemoryStore`] applies the batch under one exclusive lock.
//! * [`SledStore`] runs it as a serializable sled transaction.
//! * [`RedisStore`] sends it as `MULTI`/`EXEC`.

use crate::error::Result;
use std::collections::BTreeSet;
use std::sync::Arc;

mod memory;
mod record;
mod redis_store;
mod sled_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use sled_store::SledStore;

/// One queued write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Delete { key: String },
    SetAdd { key: String, member: String },
    HashSet { key: String, field: String, value: String },
}

impl Op {
    pub fn key(&self) -> &str {
        match self {
            Op::Delete { key } | Op::SetAdd { key, .. } | Op::HashSet { key, .. } => key,
        }
    }
}

/// Writes queued for a single atomic commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<Op>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(Op::Delete { key: key.into() });
        self
    }

    pub fn set_add(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.ops.push(Op::SetAdd { key: key.into(), member: member.into() });
        self
    }

    pub fn hash_set(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(Op::HashSet { key: key.into(), field: field.into(), value: value.into() });
        self
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

pub trait Store: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool>;

    /// Add `member` to the set at `key` outside of any batch.
    fn set_add(&self, key: &str, member: &str) -> Result<()>;

    /// Members of the set at `key`; empty when the key does not exist.
    fn set_members(&self, key: &str) -> Result<BTreeSet<String>>;

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Keys matching a `KEYS`-style glob (`*`, `?`, `\` escapes).
    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>>;

    /// Apply every op of `batch` atomically. On error nothing was applied.
    fn commit(&self, batch: Batch) -> Result<()>;
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }
    fn set_add(&self, key: &str, member: &str) -> Result<()> {
        (**self).set_add(key, member)
    }
    fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        (**self).set_members(key)
    }
    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        (**self).hash_get(key, field)
    }
    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>> {
        (**self).keys_matching(pattern)
    }
    fn commit(&self, batch: Batch) -> Result<()> {
        (**self).commit(batch)
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }
    fn set_add(&self, key: &str, member: &str) -> Result<()> {
        (**self).set_add(key, member)
    }
    fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        (**self).set_members(key)
    }
    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        (**self).hash_get(key, field)
    }
    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>> {
        (**self).keys_matching(pattern)
    }
    fn commit(&self, batch: Batch) -> Result<()> {
        (**self).commit(batch)
    }
}
