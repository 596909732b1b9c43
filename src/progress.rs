//! # Progress Tracking Module
//!
//! Visual feedback while the passes run.
//!
//! ## Responsibilities:
//! - One `indicatif` bar per running pass, stacked in a shared
//!   `MultiProgress` since the passes run concurrently
//! - Per-file tick with a short status message
//! - Final per-pass summary line

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Owns the multi-bar display shared by all pass workers.
#[derive(Clone)]
pub struct ProgressManager {
    multi: MultiProgress,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// Add a bar for one pass with `total` units of work.
    pub fn add_pass(&self, name: &str, total: u64) -> PassProgress {
        let bar = self.multi.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix:>22} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        bar.set_prefix(name.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        PassProgress { bar }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress bar for a single pass.
#[derive(Clone)]
pub struct PassProgress {
    bar: ProgressBar,
}

impl PassProgress {
    /// Advance by one unit with a status message.
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish the pass's bar with a final message.
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}
