use crate::error::{Error, Result};
use crate::keys::{
    term_counter_key, term_from_url_set_key, url_set_key, ALL_KEYS_PATTERN, TERM_COUNTER_PATTERN, URL_SET_PATTERN,
};
use crate::store::{Batch, Store};
use crate::termcounter::TermCounter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::ops::Deref;

/// The urls known to contain one term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlSet(BTreeSet<String>);

impl UrlSet {
    pub fn into_inner(self) -> BTreeSet<String> {
        self.0
    }
}

impl Deref for UrlSet {
    type Target = BTreeSet<String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for UrlSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<S: Into<String>> FromIterator<S> for UrlSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        UrlSet(iter.into_iter().map(Into::into).collect())
    }
}

/// Inverted index over a [`Store`].
///
/// Keeps `URLSet:<term>` and `TermCounter:<url>` in step: a url is in a term's
/// set exactly when its counter has a positive count for the term. Nothing is
/// cached; every call goes to the store.
///
/// Re-indexing a page replaces its counter but leaves the page in the sets of
/// terms it no longer contains. Those memberships are only removed by the
/// bulk `clear_*` operations.
pub struct Index<S: Store> {
    store: S,
}

impl<S: Store> Index<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn is_indexed(&self, url: &str) -> Result<bool> {
        self.store.exists(&term_counter_key(url))
    }

    /// Add the counter's url to the set for `term`.
    ///
    /// Touches only the term's set, not the page's counter; [`Index::index_page`]
    /// is the call that keeps both sides consistent.
    pub fn add(&self, term: &str, tc: &TermCounter) -> Result<()> {
        self.store.set_add(&url_set_key(term), tc.label())
    }

    pub fn urls_for_term(&self, term: &str) -> Result<UrlSet> {
        Ok(UrlSet(self.store.set_members(&url_set_key(term))?))
    }

    /// Occurrences of `term` at `url`. A url that was never indexed, or whose
    /// counter lacks the term, is `TermNotFound`, never zero.
    pub fn count_at(&self, url: &str, term: &str) -> Result<u64> {
        let key = term_counter_key(url);
        let raw = self
            .store
            .hash_get(&key, term)?
            .ok_or_else(|| Error::TermNotFound { url: url.to_string(), term: term.to_string() })?;
        raw.parse::<u64>()
            .map_err(|e| Error::malformed(&key, format!("count for {term:?} is {raw:?}: {e}")))
    }

    /// Count of `term` at every url in its set, one read per url.
    pub fn counts_for_term(&self, term: &str) -> Result<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for url in self.urls_for_term(term)? {
            let count = self.count_at(&url, term)?;
            counts.insert(url, count);
        }
        Ok(counts)
    }

    /// Replace the stored counter of `url` with `terms` and add `url` to the
    /// set of every term, in one atomic commit. Terms with a zero count are
    /// skipped. On failure the index is as it was before the call.
    pub fn index_page(&self, url: &str, terms: &TermCounter) -> Result<()> {
        let tc_key = term_counter_key(url);
        let mut batch = Batch::new();
        batch.delete(tc_key.as_str());
        for (term, count) in terms.iter().filter(|(_, c)| *c > 0) {
            batch.set_add(url_set_key(term), url);
            batch.hash_set(tc_key.as_str(), term, count.to_string());
        }
        let ops = batch.len();
        match self.store.commit(batch) {
            Ok(()) => {
                tracing::debug!(url, terms = terms.len(), ops, "indexed page");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "index commit failed");
                Err(e)
            }
        }
    }

    /// Every term with a url set. Scans the whole key space.
    pub fn indexed_terms(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .url_set_keys()?
            .iter()
            .filter_map(|k| term_from_url_set_key(k))
            .map(str::to_string)
            .collect())
    }

    pub fn url_set_keys(&self) -> Result<BTreeSet<String>> {
        self.store.keys_matching(URL_SET_PATTERN)
    }

    pub fn term_counter_keys(&self) -> Result<BTreeSet<String>> {
        self.store.keys_matching(TERM_COUNTER_PATTERN)
    }

    /// Delete every url set. Irreversible; meant for tests and resets.
    pub fn clear_url_sets(&self) -> Result<usize> {
        self.delete_matching(URL_SET_PATTERN)
    }

    /// Delete every term counter. Irreversible; meant for tests and resets.
    pub fn clear_term_counters(&self) -> Result<usize> {
        self.delete_matching(TERM_COUNTER_PATTERN)
    }

    /// Delete every key in the store, index or not.
    pub fn clear_all(&self) -> Result<usize> {
        self.delete_matching(ALL_KEYS_PATTERN)
    }

    fn delete_matching(&self, pattern: &str) -> Result<usize> {
        let found = self.store.keys_matching(pattern)?;
        if found.is_empty() {
            return Ok(0);
        }
        let mut batch = Batch::new();
        for key in &found {
            batch.delete(key.as_str());
        }
        self.store.commit(batch)?;
        tracing::info!(pattern, deleted = found.len(), "cleared keys");
        Ok(found.len())
    }

    /// Write each term followed by indented `url count` lines.
    pub fn dump<W: Write>(&self, out: &mut W) -> Result<()> {
        for term in self.indexed_terms()? {
            let counts = self.counts_for_term(&term)?;
            writeln!(out, "{term}")?;
            for (url, count) in counts {
                writeln!(out, "    {url} {count}")?;
            }
        }
        Ok(())
    }
}
