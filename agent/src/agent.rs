//! The sync agent: one task that owns the quote book.
//!
//! Sync cycles, user edits, reverts and reads are all handled by a single
//! task, one command at a time. A fetch result can therefore never be
//! applied over an edit made while the fetch was in flight: the edit waits
//! in the command queue and runs after the cycle commits.
//!
//! # Cycle
//!
//! 1. Fetch the server set, bounded by the fetch timeout
//! 2. Apply it to the book (reconcile, back up, commit)
//! 3. Persist the book when it changed
//! 4. Notify about notable outcomes
//! 5. Push local-only quotes back to the server
//!
//! Shutting down while a fetch or push is outstanding drops it; nothing from
//! that cycle reaches the book.

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::notify::{Notifier, SyncEvent};
use crate::source::QuoteSource;
use crate::storage::QuoteStorage;
use chrono::Utc;
use futures::future::join_all;
use rand::Rng;
use quotesync_engine::{
    default_quotes, BookSnapshot, CategoryFilter, ImportSummary, Quote, QuoteBook, RecordSet,
    SyncReport, SyncTrigger, Timestamp,
};
use std::future::Future;
use std::ops::ControlFlow;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

/// Capacity of the command queue.
const COMMAND_BUFFER: usize = 32;

/// Current wall-clock time in milliseconds since epoch.
pub fn now_millis() -> Timestamp {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Owns a [`QuoteBook`] and keeps it in sync with a [`QuoteSource`].
pub struct SyncAgent<S, St, N> {
    book: QuoteBook,
    source: S,
    storage: St,
    notifier: N,
    config: Config,
}

impl<S, St, N> SyncAgent<S, St, N>
where
    S: QuoteSource,
    St: QuoteStorage,
    N: Notifier,
{
    /// Create an agent around an existing book.
    ///
    /// The book's merge policy is replaced by the configured one.
    pub fn new(mut book: QuoteBook, source: S, storage: St, notifier: N, config: Config) -> Self {
        book.set_policy(config.policy);
        Self {
            book,
            source,
            storage,
            notifier,
            config,
        }
    }

    /// Create an agent from whatever `storage` holds.
    ///
    /// An empty store starts the book with [`default_quotes`].
    pub async fn load(source: S, storage: St, notifier: N, config: Config) -> Result<Self> {
        let book = match storage.load().await? {
            Some(snapshot) => QuoteBook::from_snapshot(snapshot)?,
            None => {
                tracing::info!("No stored quotes, starting with defaults");
                QuoteBook::with_quotes(default_quotes(), config.policy)
            }
        };

        tracing::info!(quotes = book.len(), policy = ?config.policy, "Loaded quote book");
        Ok(Self::new(book, source, storage, notifier, config))
    }

    /// The owned quote book.
    pub fn book(&self) -> &QuoteBook {
        &self.book
    }

    /// The configuration the agent was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one sync cycle to completion.
    pub async fn sync(&mut self, trigger: SyncTrigger) -> SyncReport {
        self.sync_until(trigger, std::future::pending())
            .await
            .unwrap_or_else(|| SyncReport::fetch_failed(trigger))
    }

    /// Run one sync cycle, abandoning it if `cancel` completes first.
    ///
    /// Returns `None` when the cycle was abandoned before committing.
    pub async fn sync_until<C>(&mut self, trigger: SyncTrigger, cancel: C) -> Option<SyncReport>
    where
        C: Future<Output = ()>,
    {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("sync", cycle = %cycle_id, trigger = ?trigger);

        async move {
            tokio::pin!(cancel);

            let fetched = tokio::select! {
                biased;
                _ = &mut cancel => {
                    tracing::debug!("Cancelled during fetch, discarding result");
                    return None;
                }
                fetched = self.fetch() => fetched,
            };

            let report = match fetched {
                Ok(server) => {
                    self.book
                        .apply_server_snapshot(&server, trigger, now_millis())
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Fetch failed, keeping local quotes");
                    SyncReport::fetch_failed(trigger)
                }
            };

            if report.committed() {
                self.persist().await;
            }

            if report.outcome.is_notable() {
                self.notifier
                    .on_outcome(&SyncEvent::from_report(cycle_id, &report, Utc::now()));
            }

            tracing::info!(
                outcome = %report.outcome,
                conflicts = report.conflicts.len(),
                push_back = report.push_back.len(),
                quotes = self.book.len(),
                "Sync cycle finished"
            );

            if self.config.push_local_only && !report.push_back.is_empty() {
                tokio::select! {
                    biased;
                    _ = &mut cancel => {
                        tracing::debug!("Cancelled during push-back");
                    }
                    _ = self.push_back(&report.push_back) => {}
                }
            }

            Some(report)
        }
        .instrument(span)
        .await
    }

    /// Add a quote typed in by the user.
    ///
    /// The quote is persisted, then posted to the server right away when
    /// push-back is enabled. A failed post is only logged; the next cycle
    /// reports the quote as local-only and pushes it again.
    pub async fn add_quote(&mut self, text: &str, category: &str) -> Result<Quote> {
        let quote = self.book.add_quote(text, category, now_millis())?;
        tracing::info!(id = ?quote.id, category = %quote.category, "Added quote");
        self.persist().await;
        if self.config.push_local_only {
            self.push_one(&quote).await;
        }
        Ok(quote)
    }

    /// Pick a random quote from the filtered set and remember it as shown.
    ///
    /// `None` means no quote matches the selected category.
    pub fn random_quote(&mut self) -> Option<Quote> {
        let shown = self
            .book
            .random_quote(|len| rand::thread_rng().gen_range(0..len))
            .cloned();
        if shown.is_none() {
            tracing::debug!(
                filter = %self.book.filter(),
                "No quotes available for this category"
            );
        }
        shown
    }

    /// Undo the latest merge.
    pub async fn revert(&mut self) -> Result<RecordSet> {
        let restored = self.book.revert()?;
        tracing::info!(quotes = restored.len(), "Reverted to pre-sync quotes");
        self.persist().await;
        Ok(restored)
    }

    /// Select a category filter and remember it.
    pub async fn set_filter(&mut self, filter: CategoryFilter) {
        self.book.set_filter(filter);
        self.persist().await;
    }

    /// Append quotes from a JSON array.
    pub async fn import_json(&mut self, json: &str) -> Result<ImportSummary> {
        let summary = self.book.import_json(json)?;
        tracing::info!(added = summary.added, skipped = summary.skipped, "Imported quotes");
        if summary.added > 0 {
            self.persist().await;
        }
        Ok(summary)
    }

    /// Export the local quotes as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String> {
        Ok(self.book.export_json()?)
    }

    async fn fetch(&self) -> Result<RecordSet> {
        let timeout = self.config.fetch_timeout;
        match tokio::time::timeout(timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(timeout)),
        }
    }

    async fn push_back(&self, quotes: &[Quote]) {
        join_all(quotes.iter().map(|quote| self.push_one(quote))).await;
    }

    async fn push_one(&self, quote: &Quote) {
        let timeout = self.config.fetch_timeout;
        match tokio::time::timeout(timeout, self.source.push(quote)).await {
            Ok(Ok(ack)) => {
                tracing::debug!(key = %quote.key(), server_id = ?ack.id, "Pushed quote")
            }
            Ok(Err(e)) => tracing::warn!(key = %quote.key(), error = %e, "Push failed"),
            Err(_) => tracing::warn!(key = %quote.key(), ?timeout, "Push timed out"),
        }
    }

    async fn persist(&self) {
        if let Err(e) = self.storage.save(&self.book.export_state()).await {
            tracing::error!(error = %e, "Failed to persist quote book");
        }
    }

    /// Move the agent onto its own task and start the periodic timer.
    pub fn spawn(self) -> AgentHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx, shutdown_rx));

        AgentHandle {
            tx,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) -> QuoteBook {
        let period = self.config.sync_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(interval = ?period, "Sync agent started");

        loop {
            let flow = tokio::select! {
                biased;
                _ = shutdown_signalled(&mut shutdown) => ControlFlow::Break(()),
                command = commands.recv() => match command {
                    Some(command) => self.handle(command, &mut shutdown).await,
                    None => ControlFlow::Break(()),
                },
                _ = ticker.tick() => {
                    match self.sync_until(SyncTrigger::Periodic, shutdown_signalled(&mut shutdown)).await {
                        Some(_) => ControlFlow::Continue(()),
                        None => ControlFlow::Break(()),
                    }
                }
            };

            if flow.is_break() {
                break;
            }
        }

        tracing::info!("Sync agent stopped");
        self.book
    }

    async fn handle(
        &mut self,
        command: Command,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ControlFlow<()> {
        match command {
            Command::Sync { reply } => {
                let cancel = shutdown_signalled(shutdown);
                match self.sync_until(SyncTrigger::Manual, cancel).await {
                    Some(report) => {
                        let _ = reply.send(report);
                    }
                    // Dropping the reply tells the caller the agent stopped
                    None => return ControlFlow::Break(()),
                }
            }
            Command::AddQuote {
                text,
                category,
                reply,
            } => {
                let _ = reply.send(self.add_quote(&text, &category).await);
            }
            Command::Revert { reply } => {
                let _ = reply.send(self.revert().await);
            }
            Command::SetFilter { filter, reply } => {
                self.set_filter(filter).await;
                let _ = reply.send(());
            }
            Command::Import { json, reply } => {
                let _ = reply.send(self.import_json(&json).await);
            }
            Command::Export { reply } => {
                let _ = reply.send(self.export_json());
            }
            Command::RandomQuote { reply } => {
                let _ = reply.send(self.random_quote());
            }
            Command::Filtered { reply } => {
                let quotes = self.book.filtered().into_iter().cloned().collect();
                let _ = reply.send(quotes);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.book.export_state());
            }
        }
        ControlFlow::Continue(())
    }
}

/// Completes once shutdown was requested or every handle is gone.
async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

enum Command {
    Sync {
        reply: oneshot::Sender<SyncReport>,
    },
    AddQuote {
        text: String,
        category: String,
        reply: oneshot::Sender<Result<Quote>>,
    },
    Revert {
        reply: oneshot::Sender<Result<RecordSet>>,
    },
    SetFilter {
        filter: CategoryFilter,
        reply: oneshot::Sender<()>,
    },
    Import {
        json: String,
        reply: oneshot::Sender<Result<ImportSummary>>,
    },
    Export {
        reply: oneshot::Sender<Result<String>>,
    },
    RandomQuote {
        reply: oneshot::Sender<Option<Quote>>,
    },
    Filtered {
        reply: oneshot::Sender<Vec<Quote>>,
    },
    Snapshot {
        reply: oneshot::Sender<BookSnapshot>,
    },
}

/// Handle to a spawned [`SyncAgent`].
///
/// Dropping the handle stops the agent and discards any in-flight cycle.
pub struct AgentHandle {
    tx: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<QuoteBook>,
}

impl AgentHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SyncError::AgentStopped)?;
        rx.await.map_err(|_| SyncError::AgentStopped)
    }

    /// Run a manual sync after everything already queued.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        self.request(|reply| Command::Sync { reply }).await
    }

    /// Add a quote typed in by the user.
    pub async fn add_quote(
        &self,
        text: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Quote> {
        let (text, category) = (text.into(), category.into());
        self.request(|reply| Command::AddQuote {
            text,
            category,
            reply,
        })
        .await?
    }

    /// Undo the latest merge.
    pub async fn revert(&self) -> Result<RecordSet> {
        self.request(|reply| Command::Revert { reply }).await?
    }

    /// Select a category filter.
    pub async fn set_filter(&self, filter: CategoryFilter) -> Result<()> {
        self.request(|reply| Command::SetFilter { filter, reply })
            .await
    }

    /// Append quotes from a JSON array.
    pub async fn import_json(&self, json: impl Into<String>) -> Result<ImportSummary> {
        let json = json.into();
        self.request(|reply| Command::Import { json, reply }).await?
    }

    /// Export the local quotes as pretty-printed JSON.
    pub async fn export_json(&self) -> Result<String> {
        self.request(|reply| Command::Export { reply }).await?
    }

    /// Quotes matching the selected filter.
    pub async fn filtered(&self) -> Result<Vec<Quote>> {
        self.request(|reply| Command::Filtered { reply }).await
    }

    /// A random quote from the filtered set, `None` when nothing matches.
    pub async fn random_quote(&self) -> Result<Option<Quote>> {
        self.request(|reply| Command::RandomQuote { reply }).await
    }

    /// Snapshot of the persistent book state.
    pub async fn snapshot(&self) -> Result<BookSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stop the agent and hand back its book.
    ///
    /// An in-flight cycle is abandoned; queued commands are dropped.
    pub async fn shutdown(self) -> Result<QuoteBook> {
        let _ = self.shutdown.send(true);
        self.task.await.map_err(|_| SyncError::AgentStopped)
    }
}
