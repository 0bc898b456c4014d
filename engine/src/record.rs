//! Quote records and their derived identity.

use crate::{error::Result, Error, QuoteId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a quote within a record set.
///
/// Quotes created by this engine carry an explicit numeric id. Quotes that
/// arrive without one (older local data, id-less server payloads) are
/// identified by their `(text, category)` pair instead.
///
/// Ordering: every `Id` key sorts before every `Content` key; ids compare
/// numerically, content compares by text then category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QuoteKey {
    Id(QuoteId),
    Content { text: String, category: String },
}

impl fmt::Display for QuoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteKey::Id(id) => write!(f, "#{}", id),
            QuoteKey::Content { text, category } => write!(f, "{:?} ({})", text, category),
        }
    }
}

/// A single quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Explicit identifier, if the quote has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<QuoteId>,
    /// The quote itself
    pub text: String,
    /// Category used for filtering
    pub category: String,
    /// Last modification time (milliseconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Quote {
    /// Create a quote without id or timestamp.
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            category: category.into(),
            updated_at: None,
        }
    }

    /// Set the explicit id.
    pub fn with_id(mut self, id: QuoteId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the modification timestamp.
    pub fn with_updated_at(mut self, updated_at: Timestamp) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Derive the identity of this quote.
    pub fn key(&self) -> QuoteKey {
        match self.id {
            Some(id) => QuoteKey::Id(id),
            None => QuoteKey::Content {
                text: self.text.clone(),
                category: self.category.clone(),
            },
        }
    }

    /// Revision used by timestamp ordering. Missing timestamps count as 0.
    pub fn revision(&self) -> Timestamp {
        self.updated_at.unwrap_or(0)
    }

    /// Check that text and category are both non-blank.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidQuote("text must not be empty".into()));
        }
        if self.category.trim().is_empty() {
            return Err(Error::InvalidQuote("category must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_prefers_explicit_id() {
        let quote = Quote::new("Stay positive.", "Motivation").with_id(1);
        assert_eq!(quote.key(), QuoteKey::Id(1));
    }

    #[test]
    fn key_falls_back_to_content() {
        let quote = Quote::new("Start strong!", "Motivation");
        assert_eq!(
            quote.key(),
            QuoteKey::Content {
                text: "Start strong!".into(),
                category: "Motivation".into(),
            }
        );
    }

    #[test]
    fn id_keys_sort_before_content_keys() {
        let by_id = QuoteKey::Id(u64::MAX);
        let by_content = QuoteKey::Content {
            text: "A".into(),
            category: "a".into(),
        };
        assert!(by_id < by_content);
        assert!(QuoteKey::Id(2) < QuoteKey::Id(10));
    }

    #[test]
    fn revision_defaults_to_zero() {
        assert_eq!(Quote::new("a", "b").revision(), 0);
        assert_eq!(Quote::new("a", "b").with_updated_at(42).revision(), 42);
    }

    #[test]
    fn validate_rejects_blank_fields() {
        assert!(Quote::new("text", "cat").validate().is_ok());
        assert!(matches!(
            Quote::new("   ", "cat").validate(),
            Err(Error::InvalidQuote(_))
        ));
        assert!(matches!(
            Quote::new("text", "").validate(),
            Err(Error::InvalidQuote(_))
        ));
    }

    #[test]
    fn key_display() {
        assert_eq!(QuoteKey::Id(7).to_string(), "#7");
        assert_eq!(
            Quote::new("Hi", "Greeting").key().to_string(),
            "\"Hi\" (Greeting)"
        );
    }

    #[test]
    fn serialization_format() {
        let quote = Quote::new("Learn from failure.", "Inspiration")
            .with_id(2)
            .with_updated_at(1000);
        let json = serde_json::to_string(&quote).unwrap();
        assert!(json.contains("updatedAt")); // camelCase

        let bare = serde_json::to_string(&Quote::new("a", "b")).unwrap();
        assert_eq!(bare, r#"{"text":"a","category":"b"}"#);

        let parsed: Quote = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, quote);
    }
}
