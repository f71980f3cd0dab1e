//! Inverted page index kept in a key-value store.
//!
//! Pages are reduced to a [`TermCounter`] and stored twice: as a per-page
//! `TermCounter:<url>` hash of term counts and as one `URLSet:<term>` set per
//! term. [`Index`] writes both in a single store transaction and answers
//! lookups in either direction.

pub mod config;
pub mod error;
pub mod index;
pub mod keys;
pub mod store;
pub mod termcounter;
pub mod tokenizer;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use index::{Index, UrlSet};
pub use store::{Batch, MemoryStore, RedisStore, SledStore, Store};
pub use termcounter::TermCounter;
