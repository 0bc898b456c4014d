//! Reconciliation of a local record set against a server record set.
//!
//! The reconciler is a pure function of its two inputs: it borrows both sets,
//! never mutates them, and returns a freshly built merged set together with a
//! classification of what happened.
//!
//! # Algorithm
//!
//! 1. Compare the canonical signatures of both sets. Equal signatures mean
//!    there is nothing to do: `merged` is the local set, unchanged.
//! 2. Otherwise combine the sets under the configured [`MergePolicy`].
//! 3. Drop later-seen duplicate keys, then sort by key.
//! 4. Report conflicts and the local-only quotes that the server lacks.

use crate::{Quote, QuoteKey, RecordSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Precedence rule for quotes present on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// The server version always replaces the local one (default)
    #[default]
    ServerWins,
    /// The version with the later `updatedAt` wins, ties keep local
    TimestampWins,
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server-wins" => Ok(MergePolicy::ServerWins),
            "timestamp-wins" => Ok(MergePolicy::TimestampWins),
            other => Err(format!("unknown merge policy: {}", other)),
        }
    }
}

/// Which side a conflict was resolved in favour of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    LocalWins,
    ServerWins,
}

/// A key present on both sides with differing content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// The local revision
    pub local: Quote,
    /// The server revision
    pub server: Quote,
    /// How the conflict was resolved
    pub resolution: ConflictResolution,
}

impl Conflict {
    /// Key shared by both revisions.
    pub fn key(&self) -> QuoteKey {
        self.server.key()
    }
}

/// Result of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    /// The reconciled record set
    pub merged: RecordSet,
    /// False when both inputs had the same signature
    pub changed: bool,
    /// True when the server overwrote a differing local revision
    pub conflicted: bool,
    /// Every shared key whose revisions differed
    pub conflicts: Vec<Conflict>,
    /// Local-only quotes that the server does not have
    pub push_back: Vec<Quote>,
}

impl ReconcileResult {
    fn unchanged(local: &RecordSet) -> Self {
        Self {
            merged: local.clone(),
            changed: false,
            conflicted: false,
            conflicts: Vec::new(),
            push_back: Vec::new(),
        }
    }
}

/// Merges local and server record sets under a [`MergePolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    policy: MergePolicy,
}

impl Reconciler {
    /// Create a reconciler for the given policy.
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    /// The policy this reconciler applies.
    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Reconcile `local` against `server`.
    pub fn reconcile(&self, local: &RecordSet, server: &RecordSet) -> ReconcileResult {
        if local.signature() == server.signature() {
            return ReconcileResult::unchanged(local);
        }

        let local_by_key = index_first_seen(local);
        let server_by_key = index_first_seen(server);

        let mut merged = match self.policy {
            MergePolicy::ServerWins => server_wins(local, server, &server_by_key),
            MergePolicy::TimestampWins => {
                timestamp_wins(local, server, &local_by_key, &server_by_key)
            }
        };
        merged.dedup_by_key();
        merged.sort_by_key();

        let conflicts = self.conflicts(&local_by_key, &server_by_key);
        let conflicted = conflicts
            .iter()
            .any(|c| c.resolution == ConflictResolution::ServerWins);

        let push_back = local_only(local, &server_by_key);

        ReconcileResult {
            merged,
            changed: true,
            conflicted,
            conflicts,
            push_back,
        }
    }

    fn conflicts(
        &self,
        local_by_key: &HashMap<QuoteKey, &Quote>,
        server_by_key: &HashMap<QuoteKey, &Quote>,
    ) -> Vec<Conflict> {
        let mut conflicts: Vec<Conflict> = local_by_key
            .iter()
            .filter_map(|(key, local)| {
                let server = server_by_key.get(key)?;
                if *local == *server {
                    return None;
                }
                let resolution = match self.policy {
                    MergePolicy::ServerWins => ConflictResolution::ServerWins,
                    MergePolicy::TimestampWins if server.revision() > local.revision() => {
                        ConflictResolution::ServerWins
                    }
                    MergePolicy::TimestampWins => ConflictResolution::LocalWins,
                };
                Some(Conflict {
                    local: (*local).clone(),
                    server: (*server).clone(),
                    resolution,
                })
            })
            .collect();
        conflicts.sort_by_key(Conflict::key);
        conflicts
    }
}

/// Convenience wrapper around [`Reconciler::reconcile`].
pub fn reconcile(local: &RecordSet, server: &RecordSet, policy: MergePolicy) -> ReconcileResult {
    Reconciler::new(policy).reconcile(local, server)
}

/// Map each key to its first occurrence in the set.
fn index_first_seen(set: &RecordSet) -> HashMap<QuoteKey, &Quote> {
    let mut index = HashMap::with_capacity(set.len());
    for quote in set {
        index.entry(quote.key()).or_insert(quote);
    }
    index
}

/// Server copy first, then every local quote whose key the server lacks.
fn server_wins(
    local: &RecordSet,
    server: &RecordSet,
    server_by_key: &HashMap<QuoteKey, &Quote>,
) -> RecordSet {
    let mut merged: RecordSet = server.iter().cloned().collect();
    for quote in local {
        if !server_by_key.contains_key(&quote.key()) {
            merged.push(quote.clone());
        }
    }
    merged
}

/// Local copy, with shared keys replaced where the server revision is newer,
/// followed by server-only quotes.
fn timestamp_wins(
    local: &RecordSet,
    server: &RecordSet,
    local_by_key: &HashMap<QuoteKey, &Quote>,
    server_by_key: &HashMap<QuoteKey, &Quote>,
) -> RecordSet {
    let mut merged = RecordSet::new();
    for quote in local {
        match server_by_key.get(&quote.key()) {
            Some(remote) if remote.revision() > quote.revision() => merged.push((*remote).clone()),
            _ => merged.push(quote.clone()),
        }
    }
    for quote in server {
        if !local_by_key.contains_key(&quote.key()) {
            merged.push(quote.clone());
        }
    }
    merged
}

fn local_only(local: &RecordSet, server_by_key: &HashMap<QuoteKey, &Quote>) -> Vec<Quote> {
    let mut seen = HashSet::new();
    local
        .iter()
        .filter(|q| {
            let key = q.key();
            !server_by_key.contains_key(&key) && seen.insert(key)
        })
        .cloned()
        .collect()
}
