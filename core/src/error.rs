use thiserror::Error;

/// Errors surfaced by the index and its store adapters.
///
/// Nothing in this crate recovers from these: missing counts are never
/// replaced by zero and failed commits are never retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure talking to the store, or the store rejected a batch.
    /// A batch that fails this way has not been applied.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The url was never indexed, or its record has no field for the term.
    #[error("term {term:?} not found for {url}")]
    TermNotFound { url: String, term: String },

    /// A stored value that cannot be read back: an unparsable count, or a key
    /// holding the wrong kind of record.
    #[error("malformed record at {key:?}: {detail}")]
    MalformedRecord { key: String, detail: String },

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("writing output: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Error::StoreUnavailable(msg.into())
    }

    pub fn malformed(key: &str, detail: impl Into<String>) -> Self {
        Error::MalformedRecord { key: key.to_string(), detail: detail.into() }
    }

    pub(crate) fn wrong_kind(key: &str, expected: &str) -> Self {
        Error::malformed(key, format!("expected a {expected} record"))
    }
}

impl Error {
    /// Classify a Redis reply error for the record at `key`: a key holding the
    /// wrong type is malformed, anything else is the store being unreachable.
    pub(crate) fn from_redis(key: &str, err: redis::RedisError) -> Self {
        let wrong_type = err.kind() == redis::ErrorKind::TypeError || err.code() == Some("WRONGTYPE");
        if wrong_type {
            Error::malformed(key, err.to_string())
        } else {
            Error::StoreUnavailable(err.to_string())
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::MalformedRecord { key: String::new(), detail: err.to_string() }
    }
}
