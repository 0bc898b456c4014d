//! Quote book - the local state container.
//!
//! The book owns the local record set, the selected category filter, the
//! backup ledger and the merge policy. It applies fetched server snapshots
//! and tracks what can be reverted.

use crate::{
    error::Result, Backup, BackupLedger, Conflict, Error, MergePolicy, Quote, Reconciler,
    RecordSet, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Category selection for listing quotes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CategoryFilter {
    /// Every quote matches
    #[default]
    All,
    /// Only quotes in this category match
    Category(String),
}

impl CategoryFilter {
    /// Check if a quote passes the filter.
    pub fn matches(&self, quote: &Quote) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Category(category) => &quote.category == category,
        }
    }
}

impl From<String> for CategoryFilter {
    fn from(value: String) -> Self {
        if value == "all" {
            CategoryFilter::All
        } else {
            CategoryFilter::Category(value)
        }
    }
}

impl From<CategoryFilter> for String {
    fn from(filter: CategoryFilter) -> Self {
        match filter {
            CategoryFilter::All => "all".to_string(),
            CategoryFilter::Category(category) => category,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Category(category) => f.write_str(category),
        }
    }
}

/// What started a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    /// The user asked for a sync
    Manual,
    /// The polling timer fired
    Periodic,
}

/// Outcome of one sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncOutcome {
    NoChange,
    Merged,
    MergedWithConflict,
    FetchFailed,
}

impl SyncOutcome {
    /// Whether the surrounding UI should hear about this outcome.
    pub fn is_notable(&self) -> bool {
        !matches!(self, SyncOutcome::NoChange)
    }

    /// Human-readable banner text.
    pub fn message(&self) -> &'static str {
        match self {
            SyncOutcome::NoChange => "No changes from server.",
            SyncOutcome::Merged => "Quotes synced with server.",
            SyncOutcome::MergedWithConflict => "Conflicts resolved (server data applied).",
            SyncOutcome::FetchFailed => "Could not reach the server; keeping local quotes.",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncOutcome::NoChange => "no-change",
            SyncOutcome::Merged => "merged",
            SyncOutcome::MergedWithConflict => "merged-with-conflict",
            SyncOutcome::FetchFailed => "fetch-failed",
        };
        f.write_str(name)
    }
}

/// Result of applying a server snapshot to the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Classified outcome
    pub outcome: SyncOutcome,
    /// What started the attempt
    pub trigger: SyncTrigger,
    /// Shared keys whose revisions differed
    pub conflicts: Vec<Conflict>,
    /// Local-only quotes to send to the server
    pub push_back: Vec<Quote>,
    /// Whether a backup was taken before committing
    pub backup_taken: bool,
}

impl SyncReport {
    /// Report for an attempt whose fetch never produced a server snapshot.
    pub fn fetch_failed(trigger: SyncTrigger) -> Self {
        Self {
            outcome: SyncOutcome::FetchFailed,
            trigger,
            conflicts: Vec::new(),
            push_back: Vec::new(),
            backup_taken: false,
        }
    }

    /// Whether the local record set was replaced.
    pub fn committed(&self) -> bool {
        matches!(
            self.outcome,
            SyncOutcome::Merged | SyncOutcome::MergedWithConflict
        )
    }
}

/// Counts from a JSON import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Quotes appended to the book
    pub added: usize,
    /// Quotes skipped because their key already existed
    pub skipped: usize,
}

/// The quotes a fresh book starts with when storage is empty.
pub fn default_quotes() -> RecordSet {
    RecordSet::from(vec![
        Quote::new(
            "The best way to predict the future is to create it.",
            "Motivation",
        ),
        Quote::new(
            "Code is like humor. When you have to explain it, it's bad.",
            "Programming",
        ),
        Quote::new(
            "Do what you can, with what you have, where you are.",
            "Life",
        ),
    ])
}

/// The local quote collection with its filter and backup ledger.
#[derive(Debug, Clone, Default)]
pub struct QuoteBook {
    quotes: RecordSet,
    filter: CategoryFilter,
    ledger: BackupLedger,
    policy: MergePolicy,
    last_shown: Option<Quote>,
}

impl QuoteBook {
    /// Create an empty book using the given merge policy.
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            quotes: RecordSet::new(),
            filter: CategoryFilter::All,
            ledger: BackupLedger::new(),
            policy,
            last_shown: None,
        }
    }

    /// Create a book holding `quotes`.
    pub fn with_quotes(quotes: RecordSet, policy: MergePolicy) -> Self {
        Self {
            quotes,
            ..Self::new(policy)
        }
    }

    /// The local record set.
    pub fn quotes(&self) -> &RecordSet {
        &self.quotes
    }

    /// Number of local quotes.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Check if the book holds no quotes.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// The merge policy used by [`QuoteBook::apply_server_snapshot`].
    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Change the merge policy.
    pub fn set_policy(&mut self, policy: MergePolicy) {
        self.policy = policy;
    }

    /// The latest backup, if a merge has been committed since the last revert.
    pub fn backup(&self) -> Option<&Backup> {
        self.ledger.latest()
    }

    /// Check if a revert is possible.
    pub fn has_backup(&self) -> bool {
        self.ledger.has_backup()
    }

    /// Add a quote typed in by the user.
    ///
    /// Both fields are trimmed. The new quote gets an id derived from `now`,
    /// bumped past the highest existing id so that ids stay unique.
    pub fn add_quote(&mut self, text: &str, category: &str, now: Timestamp) -> Result<Quote> {
        let draft = Quote::new(text.trim(), category.trim());
        draft.validate()?;

        let id = match self.quotes.max_id() {
            Some(max) => now.max(max.saturating_add(1)),
            None => now,
        };
        let quote = draft.with_id(id).with_updated_at(now);
        if self.quotes.contains_key(&quote.key()) {
            return Err(Error::DuplicateKey(quote.key().to_string()));
        }

        self.quotes.push(quote.clone());
        Ok(quote)
    }

    /// Append quotes from a JSON array.
    ///
    /// Every entry must be a valid quote or nothing is imported. Entries whose
    /// key is already present are skipped.
    pub fn import_json(&mut self, json: &str) -> Result<ImportSummary> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::InvalidImport(e.to_string()))?;
        if !value.is_array() {
            return Err(Error::InvalidImport(
                "expected a JSON array of quotes".to_string(),
            ));
        }

        let incoming: Vec<Quote> =
            serde_json::from_value(value).map_err(|e| Error::InvalidImport(e.to_string()))?;
        for (index, quote) in incoming.iter().enumerate() {
            quote
                .validate()
                .map_err(|e| Error::InvalidImport(format!("entry {}: {}", index, e)))?;
        }

        let mut seen: HashSet<_> = self.quotes.keys().into_iter().collect();
        let mut summary = ImportSummary::default();
        for quote in incoming {
            if seen.insert(quote.key()) {
                self.quotes.push(quote);
                summary.added += 1;
            } else {
                summary.skipped += 1;
            }
        }

        Ok(summary)
    }

    /// Export the local quotes as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.quotes)
            .map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Unique categories in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        self.quotes.categories()
    }

    /// The selected category filter.
    pub fn filter(&self) -> &CategoryFilter {
        &self.filter
    }

    /// Select a category filter.
    pub fn set_filter(&mut self, filter: CategoryFilter) {
        self.filter = filter;
    }

    /// Quotes matching the selected filter.
    pub fn filtered(&self) -> Vec<&Quote> {
        self.quotes.iter().filter(|q| self.filter.matches(q)).collect()
    }

    /// Show a random quote from the filtered set.
    ///
    /// `pick` receives the number of matching quotes and returns an index;
    /// out-of-range indices wrap. Returns `None` without calling `pick` when
    /// no quote matches the filter. The shown quote is remembered until the
    /// book is reloaded.
    pub fn random_quote(&mut self, pick: impl FnOnce(usize) -> usize) -> Option<&Quote> {
        let candidates = self.filtered();
        if candidates.is_empty() {
            return None;
        }
        let chosen = candidates[pick(candidates.len()) % candidates.len()].clone();
        self.last_shown = Some(chosen);
        self.last_shown.as_ref()
    }

    /// The quote most recently returned by [`QuoteBook::random_quote`].
    pub fn last_shown(&self) -> Option<&Quote> {
        self.last_shown.as_ref()
    }

    /// Reconcile the local quotes against a fetched server snapshot.
    ///
    /// A periodic attempt whose inputs already match stops with
    /// [`SyncOutcome::NoChange`] and leaves everything untouched. Any other
    /// attempt backs up the current quotes, then commits the merged set.
    pub fn apply_server_snapshot(
        &mut self,
        server: &RecordSet,
        trigger: SyncTrigger,
        now: Timestamp,
    ) -> SyncReport {
        let result = Reconciler::new(self.policy).reconcile(&self.quotes, server);

        if !result.changed && trigger != SyncTrigger::Manual {
            return SyncReport {
                outcome: SyncOutcome::NoChange,
                trigger,
                conflicts: Vec::new(),
                push_back: Vec::new(),
                backup_taken: false,
            };
        }

        let previous = std::mem::replace(&mut self.quotes, result.merged);
        self.ledger.retain(previous, now);

        let outcome = if result.conflicted {
            SyncOutcome::MergedWithConflict
        } else {
            SyncOutcome::Merged
        };

        SyncReport {
            outcome,
            trigger,
            conflicts: result.conflicts,
            push_back: result.push_back,
            backup_taken: true,
        }
    }

    /// Restore the quotes as they were before the latest merge.
    ///
    /// The backup is consumed, so a second revert fails until another merge
    /// has been committed.
    pub fn revert(&mut self) -> Result<RecordSet> {
        let backup = self.ledger.take()?;
        self.quotes = backup.records;
        Ok(self.quotes.clone())
    }

    /// Export the persistent part of the book as a snapshot.
    ///
    /// The backup is session state and is not included.
    pub fn export_state(&self) -> crate::snapshot::BookSnapshot {
        crate::snapshot::BookSnapshot::new(self.quotes.clone(), self.filter.clone(), self.policy)
    }

    /// Replace the book's contents with a snapshot.
    ///
    /// Any backup taken against the previous contents is dropped, as is the
    /// last shown quote.
    pub fn import_state(&mut self, snapshot: crate::snapshot::BookSnapshot) -> Result<()> {
        snapshot.validate()?;

        self.quotes = snapshot.quotes;
        self.filter = snapshot.selected_category;
        self.policy = snapshot.policy;
        self.ledger.clear();
        self.last_shown = None;

        Ok(())
    }

    /// Build a book from a snapshot.
    pub fn from_snapshot(snapshot: crate::snapshot::BookSnapshot) -> Result<Self> {
        let mut book = Self::new(snapshot.policy);
        book.import_state(snapshot)?;
        Ok(book)
    }
}
