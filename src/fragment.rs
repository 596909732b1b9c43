//! # Fragment Extraction and Splicing Module
//!
//! Locates inline `<style>` / `<script>` blocks inside document files and
//! splices their optimized replacements back in.
//!
//! ## Responsibilities:
//! - Kind-specific delimiter patterns (case-insensitive, non-greedy,
//!   spanning newlines, optional `type` attribute)
//! - Eligibility scan: which candidate documents contain at least one block
//! - Extraction: every match in document order becomes a `Fragment` whose
//!   original text is materialized into its own staging unit
//! - Splicing: each fragment replaces exactly the first remaining occurrence
//!   of its original text, in extraction order, which keeps byte-identical
//!   fragments mapped to the right occurrence
//!
//! No document grammar is involved anywhere: boundaries come from pattern
//! matching, so surrounding markup passes through byte for byte.

use crate::staging::StagingArea;
use anyhow::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

/// The kind of embeddable code a fragment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Style,
    Script,
}

impl FragmentKind {
    /// Delimiter pattern for this kind. Matches the opening tag (optional
    /// type attribute, any case) through the nearest closing tag,
    /// non-greedy, across newlines. Capture group 1 is the inner text.
    pub fn pattern(&self) -> &'static Regex {
        static STYLE_RE: OnceLock<Regex> = OnceLock::new();
        static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();

        match self {
            FragmentKind::Style => STYLE_RE.get_or_init(|| {
                Regex::new(r#"(?is)<style(?:\s+type\s*=\s*"text/css")?\s*>(.*?)</style>"#)
                    .expect("style pattern is valid")
            }),
            FragmentKind::Script => SCRIPT_RE.get_or_init(|| {
                Regex::new(
                    r#"(?is)<script(?:\s+type\s*=\s*"text/javascript")?\s*>(.*?)</script>"#,
                )
                .expect("script pattern is valid")
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FragmentKind::Style => "inline CSS",
            FragmentKind::Script => "inline JavaScript",
        }
    }
}

/// One inline block extracted from a document. Identity is the owning
/// document plus the extraction order index.
#[derive(Debug)]
pub struct Fragment {
    /// What kind of block this is, deciding which optimizer runs on it
    pub kind: FragmentKind,
    /// Inner text as matched in the document
    pub original: String,
    /// Optimized text, filled after the external tool ran; `None` when the
    /// invocation failed and the original must be left in place
    pub optimized: Option<String>,
    /// Staging unit holding the original text
    pub unit_path: PathBuf,
}

/// Eligibility scan: keep the candidates containing at least one fragment of
/// the given kind. Unreadable files are logged and skipped, never fatal.
pub async fn find_documents_with_fragments(
    kind: FragmentKind,
    candidates: &[PathBuf],
) -> Vec<PathBuf> {
    let mut eligible = Vec::new();

    for path in candidates {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                if kind.pattern().is_match(&content) {
                    eligible.push(path.clone());
                }
            }
            Err(e) => {
                warn!("Skipping unreadable document {}: {}", path.display(), e);
            }
        }
    }

    eligible
}

/// Extract every fragment of `kind` from a staged document, in document
/// order, materializing each one into its own staging unit.
pub async fn extract_fragments(
    kind: FragmentKind,
    staged_document: &Path,
    area: &mut StagingArea,
) -> Result<Vec<Fragment>> {
    let content = tokio::fs::read_to_string(staged_document).await?;
    let mut fragments = Vec::new();

    for captures in kind.pattern().captures_iter(&content) {
        let original = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let unit_path = area.stage_text(&original).await?;
        fragments.push(Fragment {
            kind,
            original,
            optimized: None,
            unit_path,
        });
    }

    Ok(fragments)
}

/// Replace each fragment's original text with its optimized text, first
/// occurrence only, in extraction order. Fragments without optimized text
/// (failed invocations) are left untouched.
pub fn splice_fragments(content: &str, fragments: &[Fragment]) -> String {
    let mut result = content.to_string();

    for fragment in fragments {
        if let Some(ref optimized) = fragment.optimized {
            result = result.replacen(fragment.original.as_str(), optimized, 1);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn frag(original: &str, optimized: Option<&str>) -> Fragment {
        Fragment {
            kind: FragmentKind::Script,
            original: original.to_string(),
            optimized: optimized.map(|s| s.to_string()),
            unit_path: PathBuf::new(),
        }
    }

    #[test]
    fn test_pattern_matches_optional_type_attribute() {
        let doc = r#"<script type="text/javascript">var a = 1;</script>
                     <SCRIPT>var b = 2;</SCRIPT>"#;
        let inner: Vec<&str> = FragmentKind::Script
            .pattern()
            .captures_iter(doc)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();
        assert_eq!(inner, vec!["var a = 1;", "var b = 2;"]);
    }

    #[test]
    fn test_pattern_spans_newlines_non_greedy() {
        let doc = "<style>\nbody {\n  color: red;\n}\n</style><style>p {}</style>";
        let inner: Vec<&str> = FragmentKind::Style
            .pattern()
            .captures_iter(doc)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();
        assert_eq!(inner.len(), 2);
        assert_eq!(inner[0], "\nbody {\n  color: red;\n}\n");
        assert_eq!(inner[1], "p {}");
    }

    #[test]
    fn test_pattern_ignores_other_kind() {
        let doc = "<style>body {}</style>";
        assert!(!FragmentKind::Script.pattern().is_match(doc));
        assert!(FragmentKind::Style.pattern().is_match(doc));
    }

    #[tokio::test]
    async fn test_eligibility_scan() {
        let dir = TempDir::new().unwrap();
        let with = dir.path().join("with.html");
        let without = dir.path().join("without.html");
        std::fs::write(&with, "<html><script>x()</script></html>").unwrap();
        std::fs::write(&without, "<html>nothing here</html>").unwrap();

        let eligible = find_documents_with_fragments(
            FragmentKind::Script,
            &[with.clone(), without, dir.path().join("missing.html")],
        )
        .await;
        assert_eq!(eligible, vec![with]);
    }

    #[tokio::test]
    async fn test_extract_in_document_order() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("page.html");
        std::fs::write(&doc, "<script>first()</script><p/><script>second()</script>").unwrap();

        let mut area = StagingArea::new().unwrap();
        let fragments = extract_fragments(FragmentKind::Script, &doc, &mut area)
            .await
            .unwrap();

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].kind, FragmentKind::Script);
        assert_eq!(fragments[0].original, "first()");
        assert_eq!(fragments[1].original, "second()");
        assert_eq!(
            std::fs::read_to_string(&fragments[1].unit_path).unwrap(),
            "second()"
        );
    }

    #[test]
    fn test_splice_replaces_each_occurrence_once() {
        // Two byte-identical fragments: each consumes one occurrence in
        // document order.
        let doc = "<a><script>dup()</script><b><script>dup()</script><c>";
        let fragments = vec![frag("dup()", Some("D1()")), frag("dup()", Some("D2()"))];

        let spliced = splice_fragments(doc, &fragments);
        assert_eq!(spliced, "<a><script>D1()</script><b><script>D2()</script><c>");
    }

    #[test]
    fn test_splice_leaves_outer_markup_unchanged() {
        let doc = "<html>\n<head><style>\nbody { color: red }\n</style></head>\n</html>";
        let fragments = vec![frag("\nbody { color: red }\n", Some("body{color:red}"))];

        let spliced = splice_fragments(doc, &fragments);
        assert_eq!(
            spliced,
            "<html>\n<head><style>body{color:red}</style></head>\n</html>"
        );
    }

    #[test]
    fn test_splice_skips_failed_fragments() {
        let doc = "<script>keep()</script>";
        let fragments = vec![frag("keep()", None)];
        assert_eq!(splice_fragments(doc, &fragments), doc);
    }
}
