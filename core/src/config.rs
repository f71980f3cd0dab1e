use crate::error::{Error, Result};
use crate::store::{MemoryStore, RedisStore, SledStore, Store};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable consulted when no store is given on the command line.
pub const STORE_ENV: &str = "INDEX_STORE";

pub const DEFAULT_STORE: &str = "sled:./index";

/// Which backend an index runs on.
///
/// Parsed from a locator string: `memory`, `sled:<path>`, or a
/// `redis://` / `rediss://` connection url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    Sled { path: PathBuf },
    Redis { url: String },
}

impl StoreConfig {
    /// Explicit locator if given, else `INDEX_STORE`, else [`DEFAULT_STORE`].
    pub fn resolve(explicit: Option<&str>) -> Result<Self> {
        match explicit {
            Some(s) => s.parse(),
            None => match std::env::var(STORE_ENV) {
                Ok(s) if !s.trim().is_empty() => s.parse(),
                _ => DEFAULT_STORE.parse(),
            },
        }
    }

    /// Open a session on the configured backend. The caller owns it and
    /// hands it to [`crate::Index::new`].
    pub fn open(&self) -> Result<Box<dyn Store>> {
        tracing::info!(store = %self, "opening store");
        Ok(match self {
            StoreConfig::Memory => Box::new(MemoryStore::new()),
            StoreConfig::Sled { path } => Box::new(SledStore::open(path)?),
            StoreConfig::Redis { url } => Box::new(RedisStore::connect(url)?),
        })
    }
}

impl FromStr for StoreConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "memory" || s == "memory:" {
            return Ok(StoreConfig::Memory);
        }
        if let Some(path) = s.strip_prefix("sled:") {
            if path.is_empty() {
                return Err(Error::InvalidConfig("sled store needs a path, e.g. sled:./index".into()));
            }
            return Ok(StoreConfig::Sled { path: PathBuf::from(path) });
        }
        if s.starts_with("redis://") || s.starts_with("rediss://") {
            return Ok(StoreConfig::Redis { url: s.to_string() });
        }
        Err(Error::InvalidConfig(format!("unrecognised store locator {s:?}")))
    }
}

impl fmt::Display for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreConfig::Memory => write!(f, "memory"),
            StoreConfig::Sled { path } => write!(f, "sled:{}", path.display()),
            // credentials may be embedded in the url
            StoreConfig::Redis { url } => match url.rsplit_once('@') {
                Some((scheme_and_auth, host)) => {
                    let scheme = scheme_and_auth.split("://").next().unwrap_or("redis");
                    write!(f, "{scheme}://***@{host}")
                }
                None => write!(f, "{url}"),
            },
        }
    }
}
