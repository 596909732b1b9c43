//! # Run Lock Module
//!
//! Advisory exclusive lock preventing two optimizer instances from working
//! on the same assets root concurrently.
//!
//! ## Responsibilities:
//! - Derives the lock file name from a SHA-256 hash of the assets root
//!   path, so different roots never contend
//! - Acquires an exclusive `fs2` file lock at process start; acquisition
//!   failure is fatal before any file is touched
//! - Releases the lock and removes the lock file on drop
//!
//! ## Lock file location:
//! `~/.asset-optimizer/run_<hash16>.lock` (falls back to the system temp
//! directory when no home directory is available)

use crate::error::OptimizeError;
use anyhow::Result;
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Held for the lifetime of a run; dropping releases the lock.
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Directory holding the lock files.
    fn lock_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".asset-optimizer"))
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Lock file path for an assets root.
    pub fn lock_path_for(assets_path: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(assets_path.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize())[..16].to_string();
        Self::lock_dir().join(format!("run_{}.lock", hash))
    }

    /// Acquire the exclusive lock for an assets root, or fail when another
    /// instance already holds it.
    pub fn acquire(assets_path: &Path) -> Result<Self> {
        let path = Self::lock_path_for(assets_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        file.try_lock_exclusive().map_err(|_| {
            OptimizeError::Lock(format!(
                "another instance is already optimizing {}",
                assets_path.display()
            ))
        })?;

        debug!("Acquired run lock at {}", path.display());
        Ok(Self { file, path })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
        debug!("Released run lock at {}", self.path.display());
    }
}
