//! In-memory quote repository.
//!
//! Quotes are keyed the same way the engine keys them: by id when they carry
//! one, by `(text, category)` otherwise. A pushed quote is stored exactly as
//! received, so the next list returns it unchanged.

use std::sync::Arc;

use dashmap::DashMap;
use quotesync_engine::{Quote, QuoteId, QuoteKey};

/// Quotes stored by key.
#[derive(Debug, Default)]
pub struct QuoteRepository {
    quotes: DashMap<QuoteKey, Quote>,
}

impl QuoteRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
        }
    }

    /// Create an empty repository wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert a handful of demo quotes.
    pub fn seed_demo(&self) {
        let demo = [
            (1, "The only way to do great work is to love what you do.", "Inspiration"),
            (2, "Simplicity is the soul of efficiency.", "Programming"),
            (3, "Well begun is half done.", "Motivation"),
        ];
        for (id, text, category) in demo {
            self.upsert(Quote::new(text, category).with_id(id));
        }
    }

    /// All quotes, sorted by key (ids first, ascending).
    pub fn list(&self) -> Vec<Quote> {
        let mut quotes: Vec<Quote> = self.quotes.iter().map(|e| e.value().clone()).collect();
        quotes.sort_by_key(Quote::key);
        quotes
    }

    /// Look up a quote by id.
    pub fn get(&self, id: QuoteId) -> Option<Quote> {
        self.quotes
            .get(&QuoteKey::Id(id))
            .map(|e| e.value().clone())
    }

    /// Number of stored quotes.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Store a quote, replacing any quote with the same key.
    ///
    /// Returns whether the key was new.
    pub fn upsert(&self, quote: Quote) -> bool {
        self.quotes.insert(quote.key(), quote).is_none()
    }
}
