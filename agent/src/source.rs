//! Server-side quote sources.
//!
//! A [`QuoteSource`] is the agent's view of the server: it fetches the full
//! server record set and accepts local-only quotes pushed back after a merge.

use crate::error::{Result, SyncError};
use quotesync_engine::{Quote, QuoteId, RecordSet};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Server acknowledgement of a pushed quote.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAck {
    /// Id the server stored the quote under, when it reports one
    pub id: Option<QuoteId>,
}

/// Fetch and push-back collaborator.
pub trait QuoteSource: Send + Sync + 'static {
    /// Retrieve the server's current record set.
    fn fetch(&self) -> impl Future<Output = Result<RecordSet>> + Send;

    /// Send one local-only quote to the server.
    fn push(&self, quote: &Quote) -> impl Future<Output = Result<PushAck>> + Send;
}

#[derive(Debug, Default)]
struct MemoryState {
    quotes: RecordSet,
    pushed: Vec<Quote>,
    failing: bool,
    push_failing: bool,
    push_attempts: usize,
    latency: Duration,
    fetches: usize,
}

/// In-memory quote source.
///
/// Clones share state, so a test can keep one handle while the agent owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySource {
    /// Create a source serving `quotes`.
    pub fn new(quotes: RecordSet) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                quotes,
                ..MemoryState::default()
            })),
        }
    }

    /// Replace the served record set.
    pub async fn set_quotes(&self, quotes: RecordSet) {
        self.state.lock().await.quotes = quotes;
    }

    /// The record set currently served.
    pub async fn quotes(&self) -> RecordSet {
        self.state.lock().await.quotes.clone()
    }

    /// Make every fetch and push fail with a network error.
    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }

    /// Make every push fail with a network error while fetches succeed.
    pub async fn set_push_failing(&self, failing: bool) {
        self.state.lock().await.push_failing = failing;
    }

    /// Delay every fetch and push by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    /// Quotes received through [`QuoteSource::push`], in arrival order.
    pub async fn pushed(&self) -> Vec<Quote> {
        self.state.lock().await.pushed.clone()
    }

    /// Number of pushes that reached the source, failed ones included.
    pub async fn push_attempts(&self) -> usize {
        self.state.lock().await.push_attempts
    }

    /// Number of fetches served or attempted.
    pub async fn fetch_count(&self) -> usize {
        self.state.lock().await.fetches
    }

    async fn delay(&self) -> bool {
        let (latency, failing) = {
            let state = self.state.lock().await;
            (state.latency, state.failing)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        failing
    }
}

impl QuoteSource for MemorySource {
    async fn fetch(&self) -> Result<RecordSet> {
        self.state.lock().await.fetches += 1;
        if self.delay().await {
            return Err(SyncError::Network("memory source is offline".into()));
        }
        Ok(self.state.lock().await.quotes.clone())
    }

    async fn push(&self, quote: &Quote) -> Result<PushAck> {
        if self.delay().await {
            return Err(SyncError::Network("memory source is offline".into()));
        }

        let mut state = self.state.lock().await;
        state.push_attempts += 1;
        if state.push_failing {
            return Err(SyncError::Network("push rejected".into()));
        }

        let key = quote.key();
        let mut quotes: Vec<Quote> = state
            .quotes
            .iter()
            .filter(|q| q.key() != key)
            .cloned()
            .collect();
        quotes.push(quote.clone());
        state.quotes = RecordSet::from(quotes);
        state.pushed.push(quote.clone());

        Ok(PushAck { id: quote.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_upserts_by_key() {
        let source = MemorySource::new(RecordSet::from(vec![
            Quote::new("A", "x").with_id(1),
        ]));

        source.push(&Quote::new("A2", "x").with_id(1)).await.unwrap();
        source.push(&Quote::new("B", "y")).await.unwrap();

        let served = source.fetch().await.unwrap();
        assert_eq!(served.len(), 2);
        assert_eq!(source.pushed().await.len(), 2);
        assert_eq!(source.fetch_count().await, 1);
    }

    #[tokio::test]
    async fn failing_source_reports_network_error() {
        let source = MemorySource::default();
        source.set_failing(true).await;

        let err = source.fetch().await.unwrap_err();
        assert!(err.is_fetch_failure());
        assert!(source.push(&Quote::new("A", "x")).await.is_err());
        assert!(source.pushed().await.is_empty());
    }

    #[tokio::test]
    async fn push_failure_leaves_fetch_working() {
        let source = MemorySource::new(RecordSet::from(vec![Quote::new("A", "x")]));
        source.set_push_failing(true).await;

        assert!(source.push(&Quote::new("B", "y")).await.is_err());
        assert_eq!(source.fetch().await.unwrap().len(), 1);
        assert_eq!(source.push_attempts().await, 1);
        assert!(source.pushed().await.is_empty());
    }
}
