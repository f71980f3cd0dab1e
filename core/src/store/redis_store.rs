use super::{Batch, Op, Store};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use redis::Commands;
use std::collections::BTreeSet;

/// Redis-backed store over one blocking connection.
///
/// Batches are sent as a `MULTI`/`EXEC` pipeline. Redis runs the queued
/// commands back to back without serving other clients in between, which
/// gives whole-batch exclusion for concurrent batches on the same keys. If the
/// connection drops before `EXEC` nothing is applied. Redis does not roll back
/// a command that fails inside `EXEC` (e.g. `WRONGTYPE` on a corrupted key);
/// the error is reported but earlier commands of the batch stay applied.
pub struct RedisStore {
    conn: Mutex<redis::Connection>,
}

impl RedisStore {
    pub fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection()?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection the caller has already opened.
    pub fn from_connection(conn: redis::Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }
}

impl Store for RedisStore {
    fn exists(&self, key: &str) -> Result<bool> {
        self.conn.lock().exists(key).map_err(|e| Error::from_redis(key, e))
    }

    fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let _: i64 = self.conn.lock().sadd(key, member).map_err(|e| Error::from_redis(key, e))?;
        Ok(())
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        self.conn.lock().smembers(key).map_err(|e| Error::from_redis(key, e))
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.conn.lock().hget(key, field).map_err(|e| Error::from_redis(key, e))
    }

    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>> {
        let mut conn = self.conn.lock();
        let keys: BTreeSet<String> = conn.scan_match::<_, String>(pattern)?.collect();
        Ok(keys)
    }

    fn commit(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch.ops() {
            match op {
                Op::Delete { key } => pipe.del(key).ignore(),
                Op::SetAdd { key, member } => pipe.sadd(key, member).ignore(),
                Op::HashSet { key, field, value } => pipe.hset(key, field, value).ignore(),
            };
        }
        let mut conn = self.conn.lock();
        pipe.query::<()>(&mut *conn).map_err(|e| Error::from_redis(&batch_keys(&batch), e))?;
        tracing::trace!(ops = batch.len(), "redis batch committed");
        Ok(())
    }
}

/// The keys a batch touches, for error reports. EXEC does not say which
/// queued command failed.
fn batch_keys(batch: &Batch) -> String {
    let keys: BTreeSet<&str> = batch.ops().iter().map(Op::key).collect();
    keys.into_iter().collect::<Vec<_>>().join(" ")
}
