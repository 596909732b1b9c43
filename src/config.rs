//! # Configuration Management Module
//!
//! Run configuration for the asset optimizer.
//!
//! ## Responsibilities:
//! - Defines the `Config` struct with every run parameter
//! - Defines `PassSelection` (which of the five passes to run)
//! - Defines `ToolPaths` (locations of the external optimizer binaries),
//!   loadable from a JSON file
//! - Validates user input before any file is touched
//!
//! ## Parameters:
//! - `assets_path`: root directory containing the web assets
//! - `passes`: selected passes (CSS minify, inline CSS, JS compile,
//!   inline JS, image compress)
//! - `overwrite_original`: replace inputs in place instead of writing
//!   `.min` siblings
//! - `print_statistics`: render the size report at the end of the run
//! - `save_state_path` / `skip_state_path`: run-state persistence
//! - `record_failures`: whether files whose optimizer invocation failed
//!   are still recorded in the run state as processed

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which of the five optimization passes should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSelection {
    pub minify_css: bool,
    pub minify_inline_css: bool,
    pub compile_js: bool,
    pub compile_inline_js: bool,
    pub compress_images: bool,
}

impl PassSelection {
    /// Select every pass.
    pub fn all() -> Self {
        Self {
            minify_css: true,
            minify_inline_css: true,
            compile_js: true,
            compile_inline_js: true,
            compress_images: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.minify_css
            || self.minify_inline_css
            || self.compile_js
            || self.compile_inline_js
            || self.compress_images)
    }

    /// True when both inline passes are selected and therefore need to
    /// serialize their extraction/splice sections on the shared gate.
    pub fn both_inline(&self) -> bool {
        self.minify_inline_css && self.compile_inline_js
    }
}

/// Locations of the external optimizer binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    /// Java runtime (runs the YUI Compressor and Closure Compiler jars)
    pub java: PathBuf,
    /// YUI Compressor jar (CSS minification)
    pub yui_compressor: PathBuf,
    /// Google Closure Compiler jar (JavaScript compilation)
    pub closure_compiler: PathBuf,
    /// jpegoptim binary (JPEG compression)
    pub jpegoptim: PathBuf,
    /// optipng binary (PNG/GIF compression)
    pub optipng: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            java: PathBuf::from("/usr/bin/java"),
            yui_compressor: PathBuf::from("/usr/local/lib/yuicompressor.jar"),
            closure_compiler: PathBuf::from("/usr/local/lib/closure-compiler.jar"),
            jpegoptim: PathBuf::from("/usr/bin/jpegoptim"),
            optipng: PathBuf::from("/usr/bin/optipng"),
        }
    }
}

impl ToolPaths {
    /// Load tool paths from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let tools: ToolPaths = serde_json::from_str(&content)?;
        Ok(tools)
    }

    /// Save tool paths to a JSON file.
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Configuration for one optimizer run
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory containing the assets
    pub assets_path: PathBuf,
    /// Selected passes
    pub passes: PassSelection,
    /// Replace originals in place instead of writing `.min` siblings
    pub overwrite_original: bool,
    /// Print the size report when the run completes
    pub print_statistics: bool,
    /// Where to persist the path->mtime map at the end of the run
    pub save_state_path: Option<PathBuf>,
    /// Prior-run state used to skip unchanged files
    pub skip_state_path: Option<PathBuf>,
    /// Record files in the run state even when their optimizer failed
    pub record_failures: bool,
    /// External tool locations
    pub tools: ToolPaths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets_path: PathBuf::new(),
            passes: PassSelection::default(),
            overwrite_original: false,
            print_statistics: false,
            save_state_path: None,
            skip_state_path: None,
            record_failures: false,
            tools: ToolPaths::default(),
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.assets_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("you must supply the location of your assets"));
        }

        if !self.assets_path.exists() {
            return Err(anyhow::anyhow!(
                "Assets path does not exist: {}",
                self.assets_path.display()
            ));
        }

        if !self.assets_path.is_dir() {
            return Err(anyhow::anyhow!(
                "Assets path is not a directory: {}",
                self.assets_path.display()
            ));
        }

        if self.passes.is_empty() {
            return Err(anyhow::anyhow!("you must select at least one pass"));
        }

        Ok(())
    }
}
