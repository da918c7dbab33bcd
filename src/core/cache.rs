use crate::domain::model::GeocodeResult;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Entries older than 30 days are re-fetched; provider data drifts.
const CACHE_TTL_MS: i64 = 30 * 24 * 3600 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    result: GeocodeResult,
    timestamp: i64,
}

/// JSON file cache keyed by the raw address string.
///
/// Saved every `checkpoint_interval` new entries so an interrupted batch
/// resumes where it left off. Persistence failures are logged, never fatal:
/// losing a checkpoint must not kill a multi-hour run.
#[derive(Debug)]
pub struct GeocodeCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
    checkpoint_interval: usize,
    pending: usize,
}

impl GeocodeCache {
    pub fn load(path: impl Into<PathBuf>, checkpoint_interval: usize) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&data) {
                Ok(entries) => {
                    tracing::info!("Loaded {} cached geocoding results", entries.len());
                    entries
                }
                Err(e) => {
                    tracing::warn!("Failed to parse cache file: {}. Starting empty.", e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            entries,
            checkpoint_interval: checkpoint_interval.max(1),
            pending: 0,
        }
    }

    pub fn get(&self, address: &str) -> Option<GeocodeResult> {
        let entry = self.entries.get(address)?;
        let now = chrono::Utc::now().timestamp_millis();
        if now - entry.timestamp > CACHE_TTL_MS {
            return None;
        }
        Some(entry.result.clone())
    }

    pub fn put(&mut self, address: &str, result: &GeocodeResult) {
        self.entries.insert(
            address.to_string(),
            CacheEntry {
                result: result.clone(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        );
        self.pending += 1;
        if self.pending >= self.checkpoint_interval {
            match self.save() {
                Ok(()) => tracing::info!(
                    "Checkpoint: saved cache with {} entries",
                    self.entries.len()
                ),
                Err(e) => tracing::warn!("Checkpoint save failed: {}", e),
            }
            self.pending = 0;
        }
    }

    pub fn remove(&mut self, address: &str) -> bool {
        self.entries.remove(address).is_some()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, data)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
