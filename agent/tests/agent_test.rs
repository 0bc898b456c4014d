//! Integration tests for the sync agent.
//!
//! The agent runs against an in-memory source and store, so every cycle can
//! be inspected from both ends.

use quotesync_agent::{
    ChannelNotifier, Config, MemorySource, MemoryStorage, SyncAgent, SyncError, SyncEvent,
};
use quotesync_engine::{
    CategoryFilter, Error, MergePolicy, Quote, QuoteBook, RecordSet, SyncOutcome, SyncTrigger,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

type TestAgent = SyncAgent<MemorySource, MemoryStorage, ChannelNotifier>;

fn quote(id: u64, text: &str, category: &str) -> Quote {
    Quote::new(text, category).with_id(id)
}

fn test_config() -> Config {
    Config {
        sync_interval: Duration::from_secs(3600),
        fetch_timeout: Duration::from_millis(500),
        ..Config::default()
    }
}

struct Fixture {
    agent: TestAgent,
    source: MemorySource,
    storage: MemoryStorage,
    events: UnboundedReceiver<SyncEvent>,
}

fn fixture(local: Vec<Quote>, server: Vec<Quote>, config: Config) -> Fixture {
    let source = MemorySource::new(RecordSet::from(server));
    let storage = MemoryStorage::new();
    let (notifier, events) = ChannelNotifier::new();
    let book = QuoteBook::with_quotes(RecordSet::from(local), MergePolicy::ServerWins);
    let agent = SyncAgent::new(book, source.clone(), storage.clone(), notifier, config);

    Fixture {
        agent,
        source,
        storage,
        events,
    }
}

// ============================================================================
// Sync Cycles
// ============================================================================

#[tokio::test]
async fn server_update_and_addition_is_committed() {
    let mut f = fixture(
        vec![quote(1, "A", "x")],
        vec![quote(1, "A-updated", "x"), quote(2, "B", "y")],
        test_config(),
    );

    let report = f.agent.sync(SyncTrigger::Periodic).await;

    assert_eq!(report.outcome, SyncOutcome::MergedWithConflict);
    assert_eq!(
        f.agent.book().quotes().as_slice(),
        &[quote(1, "A-updated", "x"), quote(2, "B", "y")]
    );
    assert!(f.agent.book().has_backup());

    // Persisted and notified
    let stored = f.storage.snapshot().await.unwrap();
    assert_eq!(stored.quotes.len(), 2);
    let event = f.events.try_recv().unwrap();
    assert_eq!(event.outcome, SyncOutcome::MergedWithConflict);
    assert_eq!(event.trigger, SyncTrigger::Periodic);
    assert_eq!(event.conflicts, 1);
}

#[tokio::test]
async fn local_only_quote_is_pushed_once() {
    let mut f = fixture(vec![quote(3, "C", "z")], vec![], test_config());

    let report = f.agent.sync(SyncTrigger::Periodic).await;

    assert_eq!(report.outcome, SyncOutcome::Merged);
    assert_eq!(f.agent.book().quotes().as_slice(), &[quote(3, "C", "z")]);
    assert_eq!(f.source.pushed().await, vec![quote(3, "C", "z")]);

    // The server now lists it, so the next cycle is a no-op
    let report = f.agent.sync(SyncTrigger::Periodic).await;
    assert_eq!(report.outcome, SyncOutcome::NoChange);
    assert_eq!(f.source.pushed().await.len(), 1);
}

#[tokio::test]
async fn push_back_can_be_disabled() {
    let config = Config {
        push_local_only: false,
        ..test_config()
    };
    let mut f = fixture(vec![quote(3, "C", "z")], vec![], config);

    let report = f.agent.sync(SyncTrigger::Periodic).await;

    assert_eq!(report.push_back.len(), 1);
    assert!(f.source.pushed().await.is_empty());
}

#[tokio::test]
async fn identical_sets_do_nothing() {
    let quotes = vec![quote(1, "A", "x"), quote(2, "B", "y")];
    let mut f = fixture(quotes.clone(), quotes, test_config());

    let report = f.agent.sync(SyncTrigger::Periodic).await;

    assert_eq!(report.outcome, SyncOutcome::NoChange);
    assert!(!f.agent.book().has_backup());
    assert_eq!(f.storage.save_count().await, 0);
    assert!(f.events.try_recv().is_err());
}

#[tokio::test]
async fn manual_sync_without_changes_still_commits() {
    let quotes = vec![quote(1, "A", "x")];
    let mut f = fixture(quotes.clone(), quotes, test_config());

    let report = f.agent.sync(SyncTrigger::Manual).await;

    assert_eq!(report.outcome, SyncOutcome::Merged);
    assert!(f.agent.book().has_backup());
    assert_eq!(f.storage.save_count().await, 1);
    assert_eq!(f.events.try_recv().unwrap().trigger, SyncTrigger::Manual);
}

#[tokio::test]
async fn push_failure_keeps_outcome_and_retries_next_cycle() {
    let mut f = fixture(vec![quote(3, "C", "z")], vec![], test_config());
    f.source.set_push_failing(true).await;

    let report = f.agent.sync(SyncTrigger::Periodic).await;

    assert_eq!(report.outcome, SyncOutcome::Merged);
    assert_eq!(report.push_back, vec![quote(3, "C", "z")]);
    assert_eq!(f.agent.book().quotes().as_slice(), &[quote(3, "C", "z")]);
    assert!(f.agent.book().has_backup());
    assert_eq!(f.storage.save_count().await, 1);
    assert_eq!(f.events.try_recv().unwrap().outcome, SyncOutcome::Merged);
    assert_eq!(f.source.push_attempts().await, 1);
    assert!(f.source.pushed().await.is_empty());

    // The server still lacks the quote, so the next cycle pushes it again
    f.source.set_push_failing(false).await;
    let report = f.agent.sync(SyncTrigger::Periodic).await;

    assert_eq!(report.outcome, SyncOutcome::Merged);
    assert_eq!(f.source.push_attempts().await, 2);
    assert_eq!(f.source.pushed().await, vec![quote(3, "C", "z")]);

    let report = f.agent.sync(SyncTrigger::Periodic).await;
    assert_eq!(report.outcome, SyncOutcome::NoChange);
}

#[tokio::test]
async fn fetch_failure_keeps_local_state() {
    let mut f = fixture(vec![quote(1, "A", "x")], vec![], test_config());
    f.source.set_failing(true).await;

    let report = f.agent.sync(SyncTrigger::Manual).await;

    assert_eq!(report.outcome, SyncOutcome::FetchFailed);
    assert_eq!(f.agent.book().quotes().as_slice(), &[quote(1, "A", "x")]);
    assert!(!f.agent.book().has_backup());
    assert_eq!(f.storage.save_count().await, 0);
    assert_eq!(f.events.try_recv().unwrap().outcome, SyncOutcome::FetchFailed);
}

#[tokio::test]
async fn slow_fetch_times_out() {
    let config = Config {
        fetch_timeout: Duration::from_millis(20),
        ..test_config()
    };
    let mut f = fixture(vec![quote(1, "A", "x")], vec![quote(2, "B", "y")], config);
    f.source.set_latency(Duration::from_millis(500)).await;

    let report = f.agent.sync(SyncTrigger::Periodic).await;

    assert_eq!(report.outcome, SyncOutcome::FetchFailed);
    assert_eq!(f.agent.book().len(), 1);
}

#[tokio::test]
async fn cancelled_cycle_commits_nothing() {
    let mut f = fixture(vec![quote(1, "A", "x")], vec![quote(2, "B", "y")], test_config());
    f.source.set_latency(Duration::from_millis(300)).await;

    let cancel = tokio::time::sleep(Duration::from_millis(20));
    let report = f.agent.sync_until(SyncTrigger::Manual, cancel).await;

    assert!(report.is_none());
    assert_eq!(f.agent.book().len(), 1);
    assert!(!f.agent.book().has_backup());
    assert_eq!(f.storage.save_count().await, 0);
    assert!(f.events.try_recv().is_err());
}

// ============================================================================
// Local Edits
// ============================================================================

#[tokio::test]
async fn revert_restores_and_persists() {
    let mut f = fixture(
        vec![quote(1, "A", "x")],
        vec![quote(1, "A-updated", "x"), quote(2, "B", "y")],
        test_config(),
    );
    f.agent.sync(SyncTrigger::Periodic).await;

    let restored = f.agent.revert().await.unwrap();

    assert_eq!(restored.as_slice(), &[quote(1, "A", "x")]);
    let stored = f.storage.snapshot().await.unwrap();
    assert_eq!(stored.quotes.as_slice(), &[quote(1, "A", "x")]);

    let err = f.agent.revert().await.unwrap_err();
    assert!(matches!(err, SyncError::Engine(Error::NoBackupAvailable)));
}

#[tokio::test]
async fn add_import_and_filter_are_persisted() {
    let mut f = fixture(vec![], vec![], test_config());

    let added = f.agent.add_quote("Stay positive.", "Motivation").await.unwrap();
    assert!(added.id.is_some());

    let summary = f
        .agent
        .import_json(r#"[{"text": "Keep going.", "category": "Life"}]"#)
        .await
        .unwrap();
    assert_eq!(summary.added, 1);

    f.agent
        .set_filter(CategoryFilter::Category("Life".into()))
        .await;

    let stored = f.storage.snapshot().await.unwrap();
    assert_eq!(stored.quotes.len(), 2);
    assert_eq!(stored.selected_category, CategoryFilter::Category("Life".into()));
    assert_eq!(f.storage.save_count().await, 3);

    let exported = f.agent.export_json().unwrap();
    assert!(exported.contains("Keep going."));
}

#[tokio::test]
async fn added_quote_is_posted_immediately() {
    let mut f = fixture(vec![], vec![], test_config());

    let added = f.agent.add_quote("Stay positive.", "Motivation").await.unwrap();

    assert_eq!(f.source.pushed().await, vec![added.clone()]);
    assert_eq!(f.storage.save_count().await, 1);

    // Already on the server, so the next cycle has nothing to do
    let report = f.agent.sync(SyncTrigger::Periodic).await;
    assert_eq!(report.outcome, SyncOutcome::NoChange);
    assert_eq!(f.source.pushed().await.len(), 1);
}

#[tokio::test]
async fn failed_post_on_add_is_pushed_by_next_cycle() {
    let mut f = fixture(vec![], vec![], test_config());
    f.source.set_push_failing(true).await;

    let added = f.agent.add_quote("Stay positive.", "Motivation").await.unwrap();
    assert_eq!(f.agent.book().len(), 1);
    assert!(f.source.pushed().await.is_empty());

    f.source.set_push_failing(false).await;
    let report = f.agent.sync(SyncTrigger::Periodic).await;

    assert_eq!(report.push_back, vec![added.clone()]);
    assert_eq!(f.source.pushed().await, vec![added]);
}

#[tokio::test]
async fn added_quote_stays_local_when_push_disabled() {
    let config = Config {
        push_local_only: false,
        ..test_config()
    };
    let mut f = fixture(vec![], vec![], config);

    f.agent.add_quote("Mine", "Me").await.unwrap();

    assert_eq!(f.source.push_attempts().await, 0);
}

#[tokio::test]
async fn random_quote_follows_filter() {
    let mut f = fixture(
        vec![quote(1, "A", "Life"), quote(2, "B", "Work")],
        vec![],
        test_config(),
    );

    f.agent
        .set_filter(CategoryFilter::Category("Work".into()))
        .await;
    let shown = f.agent.random_quote();
    assert_eq!(shown, Some(quote(2, "B", "Work")));
    assert_eq!(f.agent.book().last_shown(), Some(&quote(2, "B", "Work")));

    f.agent
        .set_filter(CategoryFilter::Category("Nothing".into()))
        .await;
    assert_eq!(f.agent.random_quote(), None);

    // The shown quote is session state only
    let stored = f.storage.snapshot().await.unwrap();
    assert!(!stored.to_json().unwrap().contains("lastShown"));
}

#[tokio::test]
async fn load_from_empty_storage_uses_defaults() {
    let (notifier, _events) = ChannelNotifier::new();
    let agent = SyncAgent::load(
        MemorySource::default(),
        MemoryStorage::new(),
        notifier,
        test_config(),
    )
    .await
    .unwrap();

    assert_eq!(agent.book().len(), 3);
}

#[tokio::test]
async fn load_applies_configured_policy() {
    let book = QuoteBook::with_quotes(
        RecordSet::from(vec![quote(1, "A", "x")]),
        MergePolicy::ServerWins,
    );
    let storage = MemoryStorage::with_snapshot(book.export_state());
    let (notifier, _events) = ChannelNotifier::new();
    let config = Config {
        policy: MergePolicy::TimestampWins,
        ..test_config()
    };

    let agent = SyncAgent::load(MemorySource::default(), storage, notifier, config)
        .await
        .unwrap();

    assert_eq!(agent.book().len(), 1);
    assert_eq!(agent.book().policy(), MergePolicy::TimestampWins);
}

// ============================================================================
// Spawned Agent
// ============================================================================

#[tokio::test]
async fn handle_drives_the_agent() {
    let f = fixture(vec![quote(1, "A", "x")], vec![quote(2, "B", "y")], test_config());
    let handle = f.agent.spawn();

    // The new quote is posted on add, so only the pre-existing one is pushed back
    let added = handle.add_quote("Mine", "Me").await.unwrap();
    let report = handle.sync_now().await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Merged);
    assert_eq!(report.push_back, vec![quote(1, "A", "x")]);

    let listed = handle.filtered().await.unwrap();
    assert_eq!(listed.len(), 3);
    assert!(listed.contains(&added));

    let shown = handle.random_quote().await.unwrap().unwrap();
    assert!(listed.contains(&shown));

    handle
        .set_filter(CategoryFilter::Category("Nothing".into()))
        .await
        .unwrap();
    assert_eq!(handle.random_quote().await.unwrap(), None);

    let restored = handle.revert().await.unwrap();
    assert_eq!(restored.len(), 2);

    let book = handle.shutdown().await.unwrap();
    assert_eq!(book.len(), 2);
}

#[tokio::test]
async fn edits_queue_behind_running_cycle() {
    let f = fixture(vec![quote(1, "A", "x")], vec![quote(2, "B", "y")], test_config());
    f.source.set_latency(Duration::from_millis(100)).await;
    let handle = Arc::new(f.agent.spawn());

    let syncing = {
        let handle = Arc::clone(&handle);
        tokio::spawn(async move { handle.sync_now().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Submitted while the fetch is in flight
    let added = handle.add_quote("Late", "x").await.unwrap();

    let report = syncing.await.unwrap().unwrap();
    assert_eq!(report.outcome, SyncOutcome::Merged);

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.quotes.len(), 3);
    assert!(snapshot.quotes.contains_key(&added.key()));
}

#[tokio::test]
async fn periodic_timer_runs_cycles() {
    let config = Config {
        sync_interval: Duration::from_millis(50),
        ..test_config()
    };
    let mut f = fixture(vec![], vec![quote(1, "A", "x")], config);
    let handle = f.agent.spawn();

    let event = tokio::time::timeout(Duration::from_secs(5), f.events.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(event.trigger, SyncTrigger::Periodic);
    assert_eq!(event.outcome, SyncOutcome::Merged);

    let book = handle.shutdown().await.unwrap();
    assert_eq!(book.quotes().as_slice(), &[quote(1, "A", "x")]);
    assert!(f.source.fetch_count().await >= 1);
}

#[tokio::test]
async fn shutdown_discards_in_flight_fetch() {
    let f = fixture(vec![quote(1, "A", "x")], vec![quote(2, "B", "y")], test_config());
    f.source.set_latency(Duration::from_millis(300)).await;
    let handle = f.agent.spawn();

    // The request is abandoned, the cycle keeps running inside the agent
    let pending = tokio::time::timeout(Duration::from_millis(30), handle.sync_now()).await;
    assert!(pending.is_err());

    let book = handle.shutdown().await.unwrap();

    assert_eq!(book.quotes().as_slice(), &[quote(1, "A", "x")]);
    assert!(!book.has_backup());
    assert_eq!(f.storage.save_count().await, 0);
}
