use super::Op;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Value held under one key by the adapters that keep their own encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Record {
    Set(BTreeSet<String>),
    Hash(BTreeMap<String, String>),
}

impl Record {
    pub(crate) fn into_set(self, key: &str) -> Result<BTreeSet<String>> {
        match self {
            Record::Set(s) => Ok(s),
            Record::Hash(_) => Err(Error::wrong_kind(key, "set")),
        }
    }

    pub(crate) fn field(&self, key: &str, field: &str) -> Result<Option<String>> {
        match self {
            Record::Hash(h) => Ok(h.get(field).cloned()),
            Record::Set(_) => Err(Error::wrong_kind(key, "hash")),
        }
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub(crate) fn decode(key: &str, raw: &[u8]) -> Result<Self> {
        bincode::deserialize(raw).map_err(|e| Error::malformed(key, e.to_string()))
    }
}

/// Apply `op` to the current value of its key. `None` means the key is absent.
pub(crate) fn apply(slot: &mut Option<Record>, op: &Op) -> Result<()> {
    match op {
        Op::Delete { .. } => *slot = None,
        Op::SetAdd { key, member } => match slot {
            None => *slot = Some(Record::Set(BTreeSet::from([member.clone()]))),
            Some(Record::Set(s)) => {
                s.insert(member.clone());
            }
            Some(Record::Hash(_)) => return Err(Error::wrong_kind(key, "set")),
        },
        Op::HashSet { key, field, value } => match slot {
            None => *slot = Some(Record::Hash(BTreeMap::from([(field.clone(), value.clone())]))),
            Some(Record::Hash(h)) => {
                h.insert(field.clone(), value.clone());
            }
            Some(Record::Set(_)) => return Err(Error::wrong_kind(key, "hash")),
        },
    }
    Ok(())
}
