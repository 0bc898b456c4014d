//! Notification of sync outcomes.

use chrono::{DateTime, Utc};
use quotesync_engine::{SyncOutcome, SyncReport, SyncTrigger};
use tokio::sync::mpsc;
use uuid::Uuid;

/// A notable sync outcome, as seen by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    /// Identifier of the sync cycle, shared with its log lines
    pub cycle_id: Uuid,
    pub trigger: SyncTrigger,
    pub outcome: SyncOutcome,
    /// Number of shared keys whose revisions differed
    pub conflicts: usize,
    /// Number of local-only quotes reported for push-back
    pub push_back: usize,
    pub at: DateTime<Utc>,
}

impl SyncEvent {
    pub fn from_report(cycle_id: Uuid, report: &SyncReport, at: DateTime<Utc>) -> Self {
        Self {
            cycle_id,
            trigger: report.trigger,
            outcome: report.outcome,
            conflicts: report.conflicts.len(),
            push_back: report.push_back.len(),
            at,
        }
    }

    /// Banner text for the outcome.
    pub fn message(&self) -> &'static str {
        self.outcome.message()
    }
}

/// Receives notable sync outcomes. `no-change` is never delivered.
pub trait Notifier: Send + Sync + 'static {
    fn on_outcome(&self, event: &SyncEvent);
}

/// Writes outcomes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn on_outcome(&self, event: &SyncEvent) {
        match event.outcome {
            SyncOutcome::FetchFailed => tracing::warn!(
                cycle = %event.cycle_id,
                trigger = ?event.trigger,
                "{}",
                event.message()
            ),
            _ => tracing::info!(
                cycle = %event.cycle_id,
                trigger = ?event.trigger,
                outcome = %event.outcome,
                conflicts = event.conflicts,
                push_back = event.push_back,
                "{}",
                event.message()
            ),
        }
    }
}

/// Forwards outcomes to a channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn on_outcome(&self, event: &SyncEvent) {
        // Receiver gone means nobody is listening anymore
        let _ = self.tx.send(event.clone());
    }
}
