//! Persistence of the quote book between runs.

use crate::error::{Result, SyncError};
use quotesync_engine::BookSnapshot;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Persistence collaborator.
pub trait QuoteStorage: Send + Sync + 'static {
    /// Load the stored snapshot, `None` when nothing was stored yet.
    fn load(&self) -> impl Future<Output = Result<Option<BookSnapshot>>> + Send;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &BookSnapshot) -> impl Future<Output = Result<()>> + Send;
}

/// Stores the snapshot as a JSON file.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl QuoteStorage for JsonFileStorage {
    async fn load(&self) -> Result<Option<BookSnapshot>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if json.trim().is_empty() {
            return Ok(None);
        }

        BookSnapshot::from_json(&json)
            .map(Some)
            .map_err(|e| SyncError::Storage(format!("{}: {}", self.path.display(), e)))
    }

    async fn save(&self, snapshot: &BookSnapshot) -> Result<()> {
        let json = snapshot.to_json_pretty()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            quotes = snapshot.quotes.len(),
            "Saved quote book"
        );
        Ok(())
    }
}

/// Keeps the snapshot in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<BookSnapshot>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that already holds `snapshot`.
    pub fn with_snapshot(snapshot: BookSnapshot) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(snapshot))),
            saves: Arc::new(Mutex::new(0)),
        }
    }

    /// The stored snapshot, if any.
    pub async fn snapshot(&self) -> Option<BookSnapshot> {
        self.slot.lock().await.clone()
    }

    /// Number of completed saves.
    pub async fn save_count(&self) -> usize {
        *self.saves.lock().await
    }
}

impl QuoteStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<BookSnapshot>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, snapshot: &BookSnapshot) -> Result<()> {
        *self.slot.lock().await = Some(snapshot.clone());
        *self.saves.lock().await += 1;
        Ok(())
    }
}
