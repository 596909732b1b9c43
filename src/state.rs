//! # Run State Module
//!
//! Persisted path->mtime state enabling incremental "skip unchanged" runs.
//!
//! ## Responsibilities:
//! - Loads, merges and persists the mapping from absolute path to the file's
//!   last-observed modification time
//! - Filters a candidate list down to files changed since the prior run
//! - Treats a missing or undecodable state file as empty state, never as an
//!   error
//!
//! ## Persistence strategy:
//! - Binary serialization via `bincode` (opaque format, exact round-trip)
//! - Saving merges into whatever is currently persisted: entries for paths
//!   not seen this run survive untouched, new observations win on collision
//!
//! ## Change detection:
//! - A candidate is kept when its current mtime differs from the recorded
//!   one; unrecorded paths compare against a sentinel that never equals a
//!   real mtime, so they always count as changed

use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, warn};

/// Recorded mtime for paths with no state entry. Never equals a real mtime.
const UNSEEN_MTIME: u64 = u64::MAX;

/// Persisted mapping from absolute file path to last-observed modification
/// time (seconds since the epoch).
#[derive(Debug, Default, Clone)]
pub struct RunState {
    entries: HashMap<String, u64>,
}

impl RunState {
    /// Load persisted state. A missing or malformed file yields empty state.
    pub async fn load(path: &Path) -> Self {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("No prior state at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match bincode::serde::decode_from_slice::<HashMap<String, u64>, _>(
            &bytes,
            bincode::config::standard(),
        ) {
            Ok((entries, _)) => Self { entries },
            Err(e) => {
                warn!("Ignoring malformed state file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Record the current modification time for a file.
    pub fn record(&mut self, path: &Path, mtime: u64) {
        self.entries.insert(path.to_string_lossy().to_string(), mtime);
    }

    /// Recorded mtime for a path, or the unseen sentinel.
    pub fn recorded_mtime(&self, path: &Path) -> u64 {
        self.entries
            .get(path.to_string_lossy().as_ref())
            .copied()
            .unwrap_or(UNSEEN_MTIME)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist this run's observations, merged into whatever is already on
    /// disk: the union of both maps, with this run's values winning on key
    /// collision. Paths unseen this run are never dropped.
    pub async fn save_merged(&self, path: &Path) -> Result<()> {
        let mut merged = Self::load(path).await.entries;
        merged.extend(self.entries.iter().map(|(k, v)| (k.clone(), *v)));

        let bytes = bincode::serde::encode_to_vec(&merged, bincode::config::standard())?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(path, bytes).await?;
        debug!("Saved run state ({} entries) to {}", merged.len(), path.display());
        Ok(())
    }

    /// Drop candidates whose current mtime matches the recorded one. With no
    /// recorded state every candidate passes through.
    pub async fn filter_changed(&self, candidates: Vec<PathBuf>) -> Vec<PathBuf> {
        if self.entries.is_empty() {
            return candidates;
        }

        let mut changed = Vec::new();
        for path in candidates {
            match file_mtime(&path).await {
                Ok(mtime) if mtime == self.recorded_mtime(&path) => {
                    debug!("Skipping unchanged file: {}", path.display());
                }
                Ok(_) => changed.push(path),
                Err(e) => {
                    // Unreadable metadata: let the pass deal with the file.
                    warn!("Could not stat {}: {}", path.display(), e);
                    changed.push(path);
                }
            }
        }
        changed
    }
}

/// Modification time of a file in seconds since the epoch.
pub async fn file_mtime(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).await?;
    let modified = metadata
        .modified()?
        .duration_since(SystemTime::UNIX_EPOCH)?
        .as_secs();
    Ok(modified)
}
