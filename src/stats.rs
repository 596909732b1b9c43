//! # Statistics Module
//!
//! Per-category size accounting and the end-of-run report.
//!
//! ## Responsibilities:
//! - Records before/after byte totals per category (CSS, JavaScript,
//!   inline CSS, inline JavaScript, images), mutated under a mutex by the
//!   pass workers
//! - Computes the signed percentage difference as
//!   `-(100 - after/before*100)`: negative means the assets shrank
//! - Renders the report, omitting categories with zero "before" bytes and
//!   appending a grand total once at least one file was processed

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Asset category a pass accounts its sizes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Css,
    Js,
    InlineCss,
    InlineJs,
    Images,
}

impl Category {
    /// All categories in report order.
    pub const ALL: [Category; 5] = [
        Category::Css,
        Category::Js,
        Category::InlineCss,
        Category::InlineJs,
        Category::Images,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Css => "CSS files",
            Category::Js => "JavaScript files",
            Category::InlineCss => "Inline CSS",
            Category::InlineJs => "Inline JavaScript",
            Category::Images => "Image files",
        }
    }
}

/// Per-category before/after byte totals.
#[derive(Debug, Default)]
pub struct SizeLedger {
    before: HashMap<Category, u64>,
    after: HashMap<Category, u64>,
    files_count: usize,
}

impl SizeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the byte total of a category before its pass runs.
    pub fn record_before(&mut self, category: Category, bytes: u64) {
        *self.before.entry(category).or_default() += bytes;
    }

    /// Record the byte total of a category after its pass completed.
    pub fn record_after(&mut self, category: Category, bytes: u64) {
        *self.after.entry(category).or_default() += bytes;
    }

    /// Count files a pass performed work on.
    pub fn add_files(&mut self, count: usize) {
        self.files_count += count;
    }

    pub fn files_count(&self) -> usize {
        self.files_count
    }

    pub fn before(&self, category: Category) -> u64 {
        self.before.get(&category).copied().unwrap_or(0)
    }

    pub fn after(&self, category: Category) -> u64 {
        self.after.get(&category).copied().unwrap_or(0)
    }

    /// Signed percentage difference; negative indicates shrinkage.
    pub fn difference_percent(before: u64, after: u64) -> f64 {
        -(100.0 - (after as f64 / before as f64) * 100.0)
    }

    /// Render the statistics report.
    pub fn render(&self, assets_path: &Path, elapsed: Duration) -> String {
        let mut out = String::from("Statistics\n\n");

        if self.files_count == 0 {
            out.push_str(&format!(
                "Found 0 files to work on in {}\n",
                assets_path.display()
            ));
        } else {
            out.push_str(&format!(
                "Performed work on {} files located in {}\n",
                self.files_count,
                assets_path.display()
            ));
        }
        out.push_str(&format!("Running time: {}s\n", elapsed.as_secs()));

        let mut total_before = 0u64;
        let mut total_after = 0u64;

        for category in Category::ALL {
            let before = self.before(category);
            if before == 0 {
                continue;
            }
            let after = self.after(category);
            total_before += before;
            total_after += after;

            out.push_str(&format!(
                "\n{}:\nSize before: {} bytes, size after: {} bytes {:+.2}%\n",
                category.label(),
                before,
                after,
                Self::difference_percent(before, after)
            ));
        }

        if self.files_count > 0 && total_before > 0 {
            out.push_str(&format!(
                "\nTotal:\nSize before: {} bytes, size after: {} bytes {:+.2}%\n",
                total_before,
                total_after,
                Self::difference_percent(total_before, total_after)
            ));
        }

        out
    }
}
