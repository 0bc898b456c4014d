//! Record sets: the full collection of quotes held by one side.

use crate::{error::Result, Error, Quote, QuoteKey, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An ordered collection of quotes.
///
/// Order carries no meaning for reconciliation, but sets produced by the
/// engine are sorted by key so that results are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    quotes: Vec<Quote>,
}

/// Canonical, order-independent fingerprint of a record set.
///
/// Two sets with equal signatures hold the same quotes with the same
/// content, regardless of the order they were listed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<(QuoteKey, String, String, Option<Timestamp>)>);

impl Signature {
    /// Number of entries in the fingerprint.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the fingerprint is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl RecordSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self { quotes: Vec::new() }
    }

    /// Number of quotes.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Check if the set has no quotes.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Iterate over the quotes in their current order.
    pub fn iter(&self) -> std::slice::Iter<'_, Quote> {
        self.quotes.iter()
    }

    /// Borrow the quotes as a slice.
    pub fn as_slice(&self) -> &[Quote] {
        &self.quotes
    }

    /// Append a quote without checking for key collisions.
    pub fn push(&mut self, quote: Quote) {
        self.quotes.push(quote);
    }

    /// Find the quote with the given key.
    pub fn get(&self, key: &QuoteKey) -> Option<&Quote> {
        self.quotes.iter().find(|q| &q.key() == key)
    }

    /// Check if a quote with the given key exists.
    pub fn contains_key(&self, key: &QuoteKey) -> bool {
        self.get(key).is_some()
    }

    /// All keys, in set order.
    pub fn keys(&self) -> Vec<QuoteKey> {
        self.quotes.iter().map(Quote::key).collect()
    }

    /// Highest explicit id in the set.
    pub fn max_id(&self) -> Option<u64> {
        self.quotes.iter().filter_map(|q| q.id).max()
    }

    /// Unique categories in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.quotes
            .iter()
            .filter(|q| seen.insert(q.category.as_str()))
            .map(|q| q.category.clone())
            .collect()
    }

    /// Compute the canonical signature.
    pub fn signature(&self) -> Signature {
        let mut entries: Vec<_> = self
            .quotes
            .iter()
            .map(|q| (q.key(), q.text.clone(), q.category.clone(), q.updated_at))
            .collect();
        entries.sort();
        Signature(entries)
    }

    /// Fail if two quotes share a key.
    pub fn ensure_unique_keys(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.quotes.len());
        for quote in &self.quotes {
            let key = quote.key();
            if !seen.insert(key.clone()) {
                return Err(Error::DuplicateKey(key.to_string()));
            }
        }
        Ok(())
    }

    /// Drop every quote whose key was already seen earlier in the set.
    pub fn dedup_by_key(&mut self) {
        let mut seen = HashSet::with_capacity(self.quotes.len());
        self.quotes.retain(|q| seen.insert(q.key()));
    }

    /// Stable sort by key.
    pub fn sort_by_key(&mut self) {
        self.quotes.sort_by_key(Quote::key);
    }

    /// Consume the set and return the quotes.
    pub fn into_vec(self) -> Vec<Quote> {
        self.quotes
    }
}

impl From<Vec<Quote>> for RecordSet {
    fn from(quotes: Vec<Quote>) -> Self {
        Self { quotes }
    }
}

impl FromIterator<Quote> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Quote>>(iter: I) -> Self {
        Self {
            quotes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for RecordSet {
    type Item = Quote;
    type IntoIter = std::vec::IntoIter<Quote>;

    fn into_iter(self) -> Self::IntoIter {
        self.quotes.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Quote;
    type IntoIter = std::slice::Iter<'a, Quote>;

    fn into_iter(self) -> Self::IntoIter {
        self.quotes.iter()
    }
}
