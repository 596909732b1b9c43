//! # File Discovery Module
//!
//! Recursive discovery of asset files by extension.
//!
//! ## Responsibilities:
//! - Walks the assets root and collects regular files by extension set
//! - Skips files already carrying the optimized-output marker (`.min`) so
//!   reruns never re-optimize previous outputs
//! - Provides the per-category extension sets and suffix helpers shared by
//!   every pass
//!
//! ## Categories:
//! - **Stylesheets**: css
//! - **Scripts**: js
//! - **Documents** (may contain inline fragments): htm, html, tpl, php, asp
//! - **Images**: jpg, jpeg, png, gif

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Marker inserted before the extension of optimized outputs (`a.min.css`).
pub const OPTIMIZED_SUFFIX: &str = ".min";

/// Extensions of whole-file stylesheet candidates.
pub const STYLESHEET_EXTENSIONS: &[&str] = &["css"];

/// Extensions of whole-file script candidates.
pub const SCRIPT_EXTENSIONS: &[&str] = &["js"];

/// Extensions of document files scanned for inline fragments.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["htm", "html", "tpl", "php", "asp"];

/// Extensions of image candidates.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Find all regular files under `root` whose extension is in
/// `valid_extensions` and whose name does not contain the optimized-output
/// marker. Returns an unordered list; no matches is an empty list, not an
/// error.
pub fn find_valid_files(root: &Path, valid_extensions: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();

        if name.contains(OPTIMIZED_SUFFIX) {
            continue;
        }

        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if valid_extensions.contains(&ext_lower.as_str()) {
                files.push(path.to_path_buf());
            }
        }
    }

    files
}

/// Return the file name with the optimized-output marker inserted before the
/// extension: `style.css` -> `style.min.css`.
pub fn with_optimized_suffix(path: &Path) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    match path.extension() {
        Some(ext) => path.with_file_name(format!(
            "{}{}.{}",
            stem,
            OPTIMIZED_SUFFIX,
            ext.to_string_lossy()
        )),
        None => path.with_file_name(format!("{}{}", stem, OPTIMIZED_SUFFIX)),
    }
}
