//! # Staging Module
//!
//! Isolated temporary holders for documents and extracted fragments.
//!
//! ## Responsibilities:
//! - Owns one pass-private temporary directory (`tempfile::TempDir`)
//! - Hands out uniquely named staging units keyed by a monotonically
//!   assigned index, never by basename or content, so duplicate basenames
//!   from different directories and byte-identical fragments can never
//!   collide
//! - Remembers each staged document's original directory so the spliced
//!   result can be relocated afterwards
//! - Cleanup is guaranteed on every exit path by `TempDir`'s drop

use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

/// A document copied into the staging area under an index-prefixed name.
#[derive(Debug, Clone)]
pub struct StagedDocument {
    /// Path of the staged copy (`<index>.<basename>` inside the area)
    pub staged_path: PathBuf,
    /// Directory the original document lives in
    pub original_dir: PathBuf,
}

/// Pass-private arena of uniquely named temporary units.
pub struct StagingArea {
    dir: TempDir,
    next_index: usize,
}

impl StagingArea {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
            next_index: 0,
        })
    }

    fn next_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Copy a document into the area as `<index>.<basename>`.
    pub async fn stage_document(&mut self, original: &Path) -> Result<StagedDocument> {
        let basename = original
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", original.display()))?
            .to_string_lossy()
            .to_string();
        let original_dir = original
            .parent()
            .ok_or_else(|| anyhow::anyhow!("File has no parent directory: {}", original.display()))?
            .to_path_buf();

        let index = self.next_index();
        let staged_path = self.dir.path().join(format!("{}.{}", index, basename));
        fs::copy(original, &staged_path).await?;

        Ok(StagedDocument {
            staged_path,
            original_dir,
        })
    }

    /// Write a fragment's text into its own uniquely named unit.
    pub async fn stage_text(&mut self, text: &str) -> Result<PathBuf> {
        let index = self.next_index();
        let path = self.dir.path().join(format!("{}.fragment", index));
        fs::write(&path, text).await?;
        Ok(path)
    }
}

/// Strip the synthetic `<index>.` prefix from a staged file name.
pub fn strip_index_prefix(file_name: &str) -> &str {
    match file_name.find('.') {
        Some(pos) => &file_name[pos + 1..],
        None => file_name,
    }
}
