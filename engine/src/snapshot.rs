//! Snapshot types for persisting and restoring a quote book.
//!
//! Snapshots are the bridge between the in-memory [`QuoteBook`] and whatever
//! storage the host uses. The backup ledger is session state and never part
//! of a snapshot.
//!
//! [`QuoteBook`]: crate::QuoteBook

use crate::{error::Result, CategoryFilter, Error, MergePolicy, RecordSet};
use serde::{Deserialize, Serialize};

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of the quote book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Local quotes
    pub quotes: RecordSet,
    /// Last selected category filter
    #[serde(default)]
    pub selected_category: CategoryFilter,
    /// Merge policy in effect
    #[serde(default)]
    pub policy: MergePolicy,
}

impl BookSnapshot {
    /// Create a snapshot at the current format version.
    pub fn new(quotes: RecordSet, selected_category: CategoryFilter, policy: MergePolicy) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            quotes,
            selected_category,
            policy,
        }
    }

    /// Check format version and key uniqueness.
    pub fn validate(&self) -> Result<()> {
        if self.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        self.quotes
            .ensure_unique_keys()
            .map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

/// Metadata about a snapshot (without the full data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Snapshot format version
    pub format_version: u32,
    /// Number of quotes
    pub quote_count: usize,
    /// Number of distinct categories
    pub category_count: usize,
    /// Selected category filter
    pub selected_category: CategoryFilter,
}

impl From<&BookSnapshot> for SnapshotMetadata {
    fn from(snapshot: &BookSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            quote_count: snapshot.quotes.len(),
            category_count: snapshot.quotes.categories().len(),
            selected_category: snapshot.selected_category.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Quote, QuoteBook};

    fn sample() -> BookSnapshot {
        BookSnapshot::new(
            RecordSet::from(vec![
                Quote::new("A", "Life").with_id(1).with_updated_at(1000),
                Quote::new("B", "Work"),
            ]),
            CategoryFilter::Category("Life".into()),
            MergePolicy::TimestampWins,
        )
    }

    #[test]
    fn json_roundtrip_restores_book() {
        let json = sample().to_json().unwrap();
        let restored = BookSnapshot::from_json(&json).unwrap();

        let book = QuoteBook::from_snapshot(restored).unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.filter(), &CategoryFilter::Category("Life".into()));
        assert_eq!(book.policy(), MergePolicy::TimestampWins);
        assert!(!book.has_backup());
    }

    #[test]
    fn wire_format() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"formatVersion\":1"));
        assert!(json.contains("\"selectedCategory\":\"Life\""));
        assert!(json.contains("\"policy\":\"timestamp-wins\""));
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let json = r#"{"formatVersion": 1, "quotes": [{"text": "A", "category": "x"}]}"#;
        let snapshot = BookSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.selected_category, CategoryFilter::All);
        assert_eq!(snapshot.policy, MergePolicy::ServerWins);
    }

    #[test]
    fn reject_future_format_version() {
        let json = r#"{"formatVersion": 999, "quotes": []}"#;
        let result = BookSnapshot::from_json(json);
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn reject_duplicate_keys() {
        let json = r#"{
            "formatVersion": 1,
            "quotes": [
                {"id": 1, "text": "A", "category": "x"},
                {"id": 1, "text": "B", "category": "y"}
            ]
        }"#;
        let result = BookSnapshot::from_json(json);
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn snapshot_metadata() {
        let snapshot = sample();
        let metadata: SnapshotMetadata = (&snapshot).into();

        assert_eq!(metadata.format_version, SNAPSHOT_FORMAT_VERSION);
        assert_eq!(metadata.quote_count, 2);
        assert_eq!(metadata.category_count, 2);
        assert_eq!(
            metadata.selected_category,
            CategoryFilter::Category("Life".into())
        );
    }

    #[test]
    fn export_import_keeps_quotes_and_drops_backup() {
        let mut book = QuoteBook::from_snapshot(sample()).unwrap();
        book.apply_server_snapshot(&RecordSet::new(), crate::SyncTrigger::Manual, 5);
        assert!(book.has_backup());

        let exported = book.export_state();
        let mut other = QuoteBook::default();
        other.import_state(exported).unwrap();

        assert_eq!(other.quotes(), book.quotes());
        assert!(!other.has_backup());
    }
}
