use crate::tokenizer::Analyzer;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Per-page term frequencies, labelled with the page url.
///
/// Only positive counts are stored: putting a count of zero removes the term,
/// so a term is either present with a count of at least one or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCounter {
    label: String,
    counts: BTreeMap<String, u64>,
}

impl TermCounter {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), counts: BTreeMap::new() }
    }

    /// Count the terms of `text` with the default analyzer.
    pub fn from_text(label: impl Into<String>, text: &str) -> Self {
        let mut tc = Self::new(label);
        tc.process_text(text, &Analyzer::default());
        tc
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Occurrences of `term`, 0 when absent.
    pub fn get(&self, term: &str) -> u64 {
        self.counts.get(term).copied().unwrap_or(0)
    }

    pub fn put(&mut self, term: impl Into<String>, count: u64) {
        let term = term.into();
        if count == 0 {
            self.counts.remove(&term);
        } else {
            self.counts.insert(term, count);
        }
    }

    pub fn increment(&mut self, term: impl Into<String>, by: u64) {
        if by == 0 {
            return;
        }
        *self.counts.entry(term.into()).or_insert(0) += by;
    }

    pub fn process_text(&mut self, text: &str, analyzer: &Analyzer) {
        for term in analyzer.terms(text) {
            self.increment(term, 1);
        }
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(t, c)| (t.as_str(), *c))
    }

    /// Write `term count` lines followed by the total.
    pub fn print_counts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (term, count) in self.iter() {
            writeln!(out, "{term}, {count}")?;
        }
        writeln!(out, "Total of all counts = {}", self.total())
    }
}

impl<S: Into<String>> Extend<(S, u64)> for TermCounter {
    fn extend<I: IntoIterator<Item = (S, u64)>>(&mut self, iter: I) {
        for (term, count) in iter {
            self.increment(term, count);
        }
    }
}

impl<'a> IntoIterator for &'a TermCounter {
    type Item = (&'a String, &'a u64);
    type IntoIter = btree_map::Iter<'a, String, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.iter()
    }
}
