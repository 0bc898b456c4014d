//! # quotesync engine
//!
//! A deterministic reconciliation core for local-first quote collections.
//!
//! A host keeps a local list of quotes, periodically fetches the server's
//! list, and needs to combine the two without losing or duplicating quotes,
//! while still being able to undo a merge it did not like. This crate is the
//! part of that loop that has to be right: everything else (rendering,
//! HTTP, storage) happens around it.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches files, network or clocks; callers
//!   pass timestamps in
//! - **Pure reconciliation**: [`Reconciler::reconcile`] borrows its inputs and
//!   returns a new set
//! - **Deterministic**: merged sets are sorted by key
//!
//! ## Core Concepts
//!
//! ### Quotes and keys
//!
//! A [`Quote`] is identified by its explicit id when it has one, otherwise by
//! its `(text, category)` pair. See [`QuoteKey`].
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] merges a local and a server [`RecordSet`]:
//! - [`MergePolicy::ServerWins`] - the server version replaces the local one (default)
//! - [`MergePolicy::TimestampWins`] - the later `updatedAt` wins
//!
//! Inputs with equal [`Signature`]s produce an unchanged result so that
//! polling does not churn storage or the UI.
//!
//! ### Quote book and backups
//!
//! [`QuoteBook`] owns the local set and a [`BackupLedger`]. Committing a merge
//! retains the previous set; [`QuoteBook::revert`] restores it.
//!
//! ## Quick Start
//!
//! ```rust
//! use quotesync_engine::{MergePolicy, Quote, QuoteBook, RecordSet, SyncOutcome, SyncTrigger};
//!
//! let mut book = QuoteBook::new(MergePolicy::ServerWins);
//! book.add_quote("Stay positive.", "Motivation", 1706745600000).unwrap();
//!
//! let server = RecordSet::from(vec![
//!     Quote::new("Learn from failure.", "Inspiration").with_id(2),
//! ]);
//! let report = book.apply_server_snapshot(&server, SyncTrigger::Periodic, 1706745601000);
//!
//! assert_eq!(report.outcome, SyncOutcome::Merged);
//! assert_eq!(book.len(), 2);
//! assert_eq!(report.push_back.len(), 1); // our quote is not on the server yet
//!
//! book.revert().unwrap();
//! assert_eq!(book.len(), 1);
//! ```
//!
//! ## FFI
//!
//! The [`ffi`] module provides C-compatible functions for UI hosts. All data
//! is exchanged as JSON strings.
//!
//! ## Persistence
//!
//! Use [`QuoteBook::export_state`] and [`QuoteBook::import_state`] with
//! [`BookSnapshot`].

pub mod backup;
pub mod book;
pub mod error;
pub mod ffi;
pub mod reconcile;
pub mod record;
pub mod record_set;
pub mod snapshot;

// Re-export main types at crate root
pub use backup::{Backup, BackupLedger};
pub use book::{
    default_quotes, CategoryFilter, ImportSummary, QuoteBook, SyncOutcome, SyncReport,
    SyncTrigger,
};
pub use error::Error;
pub use reconcile::{
    reconcile, Conflict, ConflictResolution, MergePolicy, ReconcileResult, Reconciler,
};
pub use record::{Quote, QuoteKey};
pub use record_set::{RecordSet, Signature};
pub use snapshot::{BookSnapshot, SnapshotMetadata, SNAPSHOT_FORMAT_VERSION};

/// Type aliases for clarity
pub type QuoteId = u64;
pub type Timestamp = u64;
