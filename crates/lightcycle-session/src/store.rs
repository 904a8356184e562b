//! Persistence of player records.
//!
//! The server loads every record once at startup and writes the whole map
//! back after each match. The on-disk shape is a single JSON object keyed
//! by username:
//!
//! ```json
//! {
//!   "alice": {
//!     "password": "hunter2",
//!     "scoreHistory": [{ "type": "win", "time": 1700000000000 }],
//!     "rating": 1016.0
//!   }
//! }
//! ```
//!
//! Older files that call the rating `eloScore` load as well.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::StoreError;

/// Rating a brand-new player starts with.
pub const INITIAL_RATING: f64 = 1000.0;

/// Result of one match for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
}

/// One entry of a player's score history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    #[serde(rename = "type")]
    pub outcome: Outcome,
    /// Milliseconds since the Unix epoch.
    pub time: u64,
}

/// Everything persisted about one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub password: String,
    #[serde(default)]
    pub score_history: Vec<ScoreEntry>,
    #[serde(default = "initial_rating", alias = "eloScore")]
    pub rating: f64,
}

fn initial_rating() -> f64 {
    INITIAL_RATING
}

/// All records, keyed by username.
pub type PlayerRecords = BTreeMap<String, PlayerRecord>;

/// Loads and saves player records.
///
/// Implementations must be cheap to call from the matchmaker task: `save`
/// runs after every match.
pub trait PlayerStore: Send + Sync + 'static {
    /// Reads every stored record. A store that has never been written
    /// returns an empty map.
    fn load(&self) -> impl Future<Output = Result<PlayerRecords, StoreError>> + Send;

    /// Replaces the stored records with `records`.
    fn save(
        &self,
        records: &PlayerRecords,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Stores records in one JSON file.
///
/// Saves go through a sibling temp file and a rename, so a crash mid-write
/// leaves the previous file intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PlayerStore for JsonFileStore {
    async fn load(&self) -> Result<PlayerRecords, StoreError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no player data yet");
                return Ok(PlayerRecords::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        let records: PlayerRecords = serde_json::from_slice(&data)?;
        debug!(path = %self.path.display(), players = records.len(), "player data loaded");
        Ok(records)
    }

    async fn save(&self, records: &PlayerRecords) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), players = records.len(), "player data saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Keeps records in memory. Used in tests and for throwaway servers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<PlayerRecords>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `records`.
    pub fn with_records(records: PlayerRecords) -> Self {
        Self {
            records: Mutex::new(records),
            saves: Mutex::new(0),
        }
    }

    /// A copy of what is currently stored.
    pub fn records(&self) -> PlayerRecords {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// How many times [`PlayerStore::save`] has been called.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlayerStore for MemoryStore {
    async fn load(&self) -> Result<PlayerRecords, StoreError> {
        Ok(self.records())
    }

    async fn save(&self, records: &PlayerRecords) -> Result<(), StoreError> {
        *self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = records.clone();
        *self.saves.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        Ok(())
    }
}

impl<S: PlayerStore> PlayerStore for std::sync::Arc<S> {
    async fn load(&self) -> Result<PlayerRecords, StoreError> {
        self.as_ref().load().await
    }

    async fn save(&self, records: &PlayerRecords) -> Result<(), StoreError> {
        self.as_ref().save(records).await
    }
}
