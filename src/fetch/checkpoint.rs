//! Per-source fetch checkpoints
//!
//! A small JSON sidecar remembers the last successful fetch time for each
//! source label so the next session can issue conditional requests. Writes
//! go through a temp file and an atomic rename, so a crash mid-write never
//! corrupts the previous state.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Checkpoint entry for one source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_fetch: DateTime<Utc>,
}

/// Key-value persistence for fetch checkpoints
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load all checkpoints. A missing or unreadable file yields an empty
    /// map: losing a checkpoint only costs one unconditional re-fetch.
    pub fn load(&self) -> HashMap<String, Checkpoint> {
        if !self.path.exists() {
            return HashMap::new();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Ignoring corrupt checkpoint file {:?}: {}", self.path, e);
                    HashMap::new()
                }
            },
            Err(e) => {
                warn!("Failed to read checkpoint file {:?}: {}", self.path, e);
                HashMap::new()
            }
        }
    }

    /// Persist all checkpoints atomically (write temp, then rename)
    pub fn save(&self, checkpoints: &HashMap<String, Checkpoint>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(checkpoints)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!("Saved {} checkpoints to {:?}", checkpoints.len(), self.path);
        Ok(())
    }
}
