//! Quote handlers - list, look up and upsert quotes.

use crate::error::{AppError, Result};
use crate::repo::QuoteRepository;
use quotesync_engine::{Quote, QuoteId};
use serde::Deserialize;

/// Query parameters for listing quotes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Only quotes in this category
    pub category: Option<String>,
    /// Maximum number of quotes to return
    pub limit: Option<usize>,
}

/// Maximum limit for list requests.
const MAX_LIMIT: usize = 1000;

/// List quotes sorted by key.
pub fn handle_list(repo: &QuoteRepository, query: ListQuery) -> Vec<Quote> {
    let limit = query.limit.map(|l| l.clamp(1, MAX_LIMIT)).unwrap_or(MAX_LIMIT);

    repo.list()
        .into_iter()
        .filter(|q| query.category.as_ref().map_or(true, |c| &q.category == c))
        .take(limit)
        .collect()
}

/// Look up one quote.
pub fn handle_get(repo: &QuoteRepository, id: QuoteId) -> Result<Quote> {
    repo.get(id)
        .ok_or_else(|| AppError::NotFound(format!("quote {}", id)))
}

/// Validate and store a posted quote.
///
/// The quote is stored as received. Returns whether its key was new.
pub fn handle_upsert(repo: &QuoteRepository, quote: Quote) -> Result<bool> {
    quote.validate()?;

    let key = quote.key();
    let created = repo.upsert(quote);

    tracing::info!(%key, created, "Stored quote");
    Ok(created)
}
