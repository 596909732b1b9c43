//! # Pass Coordinator Module
//!
//! Orchestrates the optimization run.
//!
//! ## Responsibilities:
//! - Discovers candidates per category, applies the change filter, and
//!   spawns one worker task per selected pass (fan-out/join, unordered
//!   completion)
//! - Whole-file passes call the optimizer boundary directly; inline passes
//!   run their whole eligibility-scan -> extract -> optimize -> splice
//!   sequence inside the shared `InlineGate` critical section
//! - Records before/after byte totals in the shared ledger and collects
//!   per-file failures into the pass outcome instead of aborting
//! - Persists the run state and prints the statistics report at the end
//!
//! ## Pipeline per inline document:
//! 1. Stage an index-prefixed copy of the document
//! 2. Extract every fragment in document order into its own staging unit
//! 3. Optimize each fragment via the external tool (failures keep the
//!    original text)
//! 4. Splice optimized fragments back, first remaining occurrence each
//! 5. Strip the index prefix, add `.min` unless overwriting or already
//!    suffixed, move back to the original directory
//!
//! ## Coordination:
//! The two inline passes read-modify-write the same document set, so their
//! critical sections serialize on the run-scoped `InlineGate`. The second
//! entrant consumes the first's suffixed outputs as inputs when not
//! overwriting in place.

use crate::{
    config::Config,
    discovery::{
        self, DOCUMENT_EXTENSIONS, IMAGE_EXTENSIONS, OPTIMIZED_SUFFIX, SCRIPT_EXTENSIONS,
        STYLESHEET_EXTENSIONS,
    },
    fragment::{self, FragmentKind},
    gate::InlineGate,
    invoker::OptimizerInvoker,
    lock::RunLock,
    progress::ProgressManager,
    state::{file_mtime, RunState},
    stats::{Category, SizeLedger},
    staging::{strip_index_prefix, StagingArea},
};
use anyhow::Result;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One file (or fragment) that could not be optimized.
#[derive(Debug, Clone)]
pub struct PassFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// What one pass did: which files it processed (with their observed mtimes,
/// for the run state) and which units failed.
#[derive(Debug)]
pub struct PassOutcome {
    pub category: Category,
    pub processed: Vec<(PathBuf, u64)>,
    pub failures: Vec<PassFailure>,
}

impl PassOutcome {
    fn new(category: Category) -> Self {
        Self {
            category,
            processed: Vec::new(),
            failures: Vec::new(),
        }
    }

    async fn record_processed(&mut self, path: &Path) {
        match file_mtime(path).await {
            Ok(mtime) => self.processed.push((path.to_path_buf(), mtime)),
            Err(e) => warn!("Could not stat {} for run state: {}", path.display(), e),
        }
    }

    fn record_failure(&mut self, path: &Path, reason: impl ToString) {
        self.failures.push(PassFailure {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }
}

/// Aggregate result of a run.
#[derive(Debug)]
pub struct RunReport {
    pub outcomes: Vec<PassOutcome>,
    pub report: String,
}

impl RunReport {
    pub fn total_failures(&self) -> usize {
        self.outcomes.iter().map(|o| o.failures.len()).sum()
    }
}

/// Everything a pass worker needs, cloned per task. Run-scoped by
/// construction: the gate and ledger live exactly as long as one run.
#[derive(Clone)]
struct PassContext {
    config: Arc<Config>,
    invoker: OptimizerInvoker,
    ledger: Arc<Mutex<SizeLedger>>,
    gate: Arc<InlineGate>,
    progress: ProgressManager,
}

/// Main orchestrator: fans the selected passes out and joins them.
pub struct AssetOptimizer {
    config: Arc<Config>,
}

impl AssetOptimizer {
    pub fn new(mut config: Config) -> Result<Self> {
        config.validate()?;
        // File identity (state keys, lock name) is the absolute path, so
        // resolve the root once: relative spellings and symlinked aliases
        // of the same tree must converge on one lock and one set of state
        // entries.
        config.assets_path = config.assets_path.canonicalize()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Run every selected pass to completion, then persist state and render
    /// the statistics report.
    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        info!(
            "Starting asset optimization in: {}",
            self.config.assets_path.display()
        );

        let prior_state = match self.config.skip_state_path {
            Some(ref path) => {
                let state = RunState::load(path).await;
                info!("Loaded prior state with {} entries", state.len());
                state
            }
            None => RunState::default(),
        };

        let ctx = PassContext {
            config: self.config.clone(),
            invoker: OptimizerInvoker::new(self.config.tools.clone()),
            ledger: Arc::new(Mutex::new(SizeLedger::new())),
            gate: Arc::new(InlineGate::new()),
            progress: ProgressManager::new(),
        };

        let root = &self.config.assets_path;
        let passes = self.config.passes;
        if passes.both_inline() && !self.config.overwrite_original {
            debug!("Both inline passes selected; the second will read the first's suffixed outputs");
        }
        let mut tasks: Vec<JoinHandle<PassOutcome>> = Vec::new();

        if passes.minify_css {
            let files = prior_state
                .filter_changed(discovery::find_valid_files(root, STYLESHEET_EXTENSIONS))
                .await;
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(minify_css_pass(ctx, files)));
        }

        if passes.compile_js {
            let files = prior_state
                .filter_changed(discovery::find_valid_files(root, SCRIPT_EXTENSIONS))
                .await;
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(compile_js_pass(ctx, files)));
        }

        if passes.minify_inline_css {
            let files = prior_state
                .filter_changed(discovery::find_valid_files(root, DOCUMENT_EXTENSIONS))
                .await;
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(inline_pass(ctx, FragmentKind::Style, files)));
        }

        if passes.compile_inline_js {
            let files = prior_state
                .filter_changed(discovery::find_valid_files(root, DOCUMENT_EXTENSIONS))
                .await;
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(inline_pass(ctx, FragmentKind::Script, files)));
        }

        if passes.compress_images {
            let files = prior_state
                .filter_changed(discovery::find_valid_files(root, IMAGE_EXTENSIONS))
                .await;
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(compress_images_pass(ctx, files)));
        }

        // Fan-in: wait for every pass, in whatever order they finish.
        let mut outcomes = Vec::new();
        for joined in join_all(tasks).await {
            outcomes.push(joined?);
        }

        if let Some(ref save_path) = self.config.save_state_path {
            let mut state = RunState::default();
            for outcome in &outcomes {
                for (path, mtime) in &outcome.processed {
                    state.record(path, *mtime);
                }
                if self.config.record_failures {
                    for failure in &outcome.failures {
                        if let Ok(mtime) = file_mtime(&failure.path).await {
                            state.record(&failure.path, mtime);
                        }
                    }
                }
            }
            state.save_merged(save_path).await?;
        }

        let report = ctx
            .ledger
            .lock()
            .expect("ledger mutex poisoned")
            .render(&self.config.assets_path, started.elapsed());

        if self.config.print_statistics {
            println!("{}", report);
        }

        for outcome in &outcomes {
            for failure in &outcome.failures {
                warn!(
                    "{}: failed to optimize {}: {}",
                    outcome.category.label(),
                    failure.path.display(),
                    failure.reason
                );
            }
        }

        info!("Asset optimization finished in {:?}", started.elapsed());
        Ok(RunReport { outcomes, report })
    }

    /// Acquire the advisory run lock for this optimizer's assets root.
    pub fn acquire_lock(&self) -> Result<RunLock> {
        RunLock::acquire(&self.config.assets_path)
    }
}

/// Sum of the current sizes of `files`; missing files count zero.
async fn total_size(files: &[PathBuf]) -> u64 {
    let mut total = 0;
    for file in files {
        if let Ok(metadata) = tokio::fs::metadata(file).await {
            total += metadata.len();
        }
    }
    total
}

/// Move a staged file into place, falling back to copy+remove across
/// filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_err() {
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}

fn output_path_for(input: &Path, overwrite: bool) -> PathBuf {
    if overwrite {
        input.to_path_buf()
    } else {
        discovery::with_optimized_suffix(input)
    }
}

/// Whole-file CSS minification.
async fn minify_css_pass(ctx: PassContext, files: Vec<PathBuf>) -> PassOutcome {
    let mut outcome = PassOutcome::new(Category::Css);
    if files.is_empty() {
        return outcome;
    }

    info!("CSS minification: start");
    let before = total_size(&files).await;
    {
        let mut ledger = ctx.ledger.lock().expect("ledger mutex poisoned");
        ledger.record_before(Category::Css, before);
        ledger.add_files(files.len());
    }
    let progress = ctx.progress.add_pass("CSS", files.len() as u64);

    let mut outputs = Vec::new();
    for file in &files {
        let output = output_path_for(file, ctx.config.overwrite_original);
        match ctx.invoker.minify_css_file(file, &output).await {
            Ok(()) => {
                outcome.record_processed(file).await;
                outputs.push(output);
                progress.update(&file.file_name().unwrap_or_default().to_string_lossy());
            }
            Err(e) => {
                outcome.record_failure(file, &e);
                progress.update("error");
            }
        }
    }

    let after = total_size(&outputs).await;
    ctx.ledger
        .lock()
        .expect("ledger mutex poisoned")
        .record_after(Category::Css, after);
    progress.finish("done");
    info!("CSS minification: completed");
    outcome
}

/// Whole-file JavaScript compilation.
async fn compile_js_pass(ctx: PassContext, files: Vec<PathBuf>) -> PassOutcome {
    let mut outcome = PassOutcome::new(Category::Js);
    if files.is_empty() {
        return outcome;
    }

    info!("JavaScript compilation: start");
    let before = total_size(&files).await;
    {
        let mut ledger = ctx.ledger.lock().expect("ledger mutex poisoned");
        ledger.record_before(Category::Js, before);
        ledger.add_files(files.len());
    }
    let progress = ctx.progress.add_pass("JavaScript", files.len() as u64);

    let mut outputs = Vec::new();
    for file in &files {
        // In overwrite mode the compiler streams to stdout and the result is
        // written back over the input; otherwise it writes the sibling
        // output file itself.
        let result = if ctx.config.overwrite_original {
            match ctx.invoker.compile_js_to_string(file).await {
                Ok(compiled) => tokio::fs::write(file, compiled).await.map_err(Into::into),
                Err(e) => Err(e),
            }
        } else {
            let output = output_path_for(file, false);
            ctx.invoker.compile_js_file(file, &output).await
        };

        match result {
            Ok(()) => {
                outcome.record_processed(file).await;
                outputs.push(output_path_for(file, ctx.config.overwrite_original));
                progress.update(&file.file_name().unwrap_or_default().to_string_lossy());
            }
            Err(e) => {
                outcome.record_failure(file, &e);
                progress.update("error");
            }
        }
    }

    let after = total_size(&outputs).await;
    ctx.ledger
        .lock()
        .expect("ledger mutex poisoned")
        .record_after(Category::Js, after);
    progress.finish("done");
    info!("JavaScript compilation: completed");
    outcome
}

/// Image compression (jpegoptim for JPEGs, optipng for PNG/GIF).
async fn compress_images_pass(ctx: PassContext, files: Vec<PathBuf>) -> PassOutcome {
    let mut outcome = PassOutcome::new(Category::Images);
    if files.is_empty() {
        return outcome;
    }

    info!("Image compression: start");
    let before = total_size(&files).await;
    {
        let mut ledger = ctx.ledger.lock().expect("ledger mutex poisoned");
        ledger.record_before(Category::Images, before);
        ledger.add_files(files.len());
    }
    let progress = ctx.progress.add_pass("Images", files.len() as u64);

    let dest_dir = match tempfile::TempDir::new() {
        Ok(dir) => dir,
        Err(e) => {
            for file in &files {
                outcome.record_failure(file, format!("staging directory: {}", e));
            }
            return outcome;
        }
    };

    let mut outputs = Vec::new();
    for file in &files {
        let is_jpeg = file
            .extension()
            .map(|e| {
                let e = e.to_string_lossy().to_lowercase();
                e == "jpg" || e == "jpeg"
            })
            .unwrap_or(false);

        let result = if is_jpeg {
            if ctx.config.overwrite_original {
                ctx.invoker.compress_jpeg(file, None).await
            } else {
                // jpegoptim writes a same-basename copy into the staging
                // directory; move it back next to the original with the
                // suffix. Moving immediately keeps duplicate basenames from
                // clobbering each other in the staging directory.
                match ctx.invoker.compress_jpeg(file, Some(dest_dir.path())).await {
                    Ok(()) => {
                        let staged = dest_dir
                            .path()
                            .join(file.file_name().unwrap_or_default());
                        let output = output_path_for(file, false);
                        if staged.exists() {
                            move_file(&staged, &output).await
                        } else {
                            Ok(())
                        }
                    }
                    Err(e) => Err(e),
                }
            }
        } else {
            let output = output_path_for(file, ctx.config.overwrite_original);
            ctx.invoker.compress_png(file, &output).await
        };

        match result {
            Ok(()) => {
                outcome.record_processed(file).await;
                outputs.push(output_path_for(file, ctx.config.overwrite_original));
                progress.update(&file.file_name().unwrap_or_default().to_string_lossy());
            }
            Err(e) => {
                outcome.record_failure(file, &e);
                progress.update("error");
            }
        }
    }

    let after = total_size(&outputs).await;
    ctx.ledger
        .lock()
        .expect("ledger mutex poisoned")
        .record_after(Category::Images, after);
    progress.finish("done");
    info!("Image compression: completed");
    outcome
}

/// Inline fragment pass (style or script blocks inside documents).
async fn inline_pass(ctx: PassContext, kind: FragmentKind, candidates: Vec<PathBuf>) -> PassOutcome {
    let category = match kind {
        FragmentKind::Style => Category::InlineCss,
        FragmentKind::Script => Category::InlineJs,
    };
    let mut outcome = PassOutcome::new(category);
    if candidates.is_empty() {
        return outcome;
    }

    info!("{} optimization: start", kind.label());

    // The whole sequence from eligibility scan to relocation runs inside
    // the gate: the other inline pass may still be moving its outputs into
    // place, and a scan racing that move can misread a half-written
    // document. The entry guard releases the gate on every exit path.
    let mut entry = ctx.gate.enter().await;

    let eligible = fragment::find_documents_with_fragments(kind, &candidates).await;
    if eligible.is_empty() {
        return outcome;
    }

    let before = total_size(&eligible).await;
    {
        let mut ledger = ctx.ledger.lock().expect("ledger mutex poisoned");
        ledger.record_before(category, before);
        ledger.add_files(eligible.len());
    }
    let progress = ctx.progress.add_pass(kind.label(), eligible.len() as u64);

    let inputs_suffixed = entry.outputs_suffixed;
    let critical =
        inline_critical_section(&ctx, kind, &eligible, inputs_suffixed, &mut outcome, &progress)
            .await;
    let outputs = match critical {
        Ok(outputs) => {
            if !ctx.config.overwrite_original {
                entry.mark_suffixed();
            }
            drop(entry);
            outputs
        }
        Err(e) => {
            drop(entry);
            for file in &eligible {
                outcome.record_failure(file, &e);
            }
            progress.finish("failed");
            return outcome;
        }
    };

    let after = total_size(&outputs).await;
    ctx.ledger
        .lock()
        .expect("ledger mutex poisoned")
        .record_after(category, after);
    progress.finish("done");
    info!("{} optimization: completed", kind.label());
    outcome
}

/// The extract -> optimize -> splice -> relocate sequence, run while
/// holding the inline gate. Returns the final output paths for the "after"
/// accounting.
async fn inline_critical_section(
    ctx: &PassContext,
    kind: FragmentKind,
    eligible: &[PathBuf],
    inputs_suffixed: bool,
    outcome: &mut PassOutcome,
    progress: &crate::progress::PassProgress,
) -> Result<Vec<PathBuf>> {
    let overwrite = ctx.config.overwrite_original;
    let mut area = StagingArea::new()?;
    let mut outputs = Vec::new();

    for original in eligible {
        // When an earlier inline pass already produced suffixed outputs,
        // those are this pass's inputs; fall back to the original for
        // documents the earlier pass did not touch.
        let input = if inputs_suffixed && !overwrite {
            let suffixed = discovery::with_optimized_suffix(original);
            if suffixed.exists() {
                suffixed
            } else {
                original.clone()
            }
        } else {
            original.clone()
        };

        let staged = match area.stage_document(&input).await {
            Ok(staged) => staged,
            Err(e) => {
                outcome.record_failure(original, &e);
                progress.update("error");
                continue;
            }
        };

        let mut fragments = match fragment::extract_fragments(kind, &staged.staged_path, &mut area).await
        {
            Ok(fragments) => fragments,
            Err(e) => {
                outcome.record_failure(original, &e);
                progress.update("error");
                continue;
            }
        };

        for (index, frag) in fragments.iter_mut().enumerate() {
            match ctx.invoker.optimize_fragment(frag.kind, &frag.unit_path).await {
                Ok(optimized) => frag.optimized = Some(optimized),
                Err(e) => {
                    // Best-effort: the fragment keeps its original text and
                    // counts as zero savings, but the failure is reported.
                    outcome.record_failure(original, format!("fragment {}: {}", index, e));
                }
            }
        }

        let content = match tokio::fs::read_to_string(&staged.staged_path).await {
            Ok(content) => content,
            Err(e) => {
                outcome.record_failure(original, &e);
                progress.update("error");
                continue;
            }
        };
        let spliced = fragment::splice_fragments(&content, &fragments);
        if let Err(e) = tokio::fs::write(&staged.staged_path, &spliced).await {
            outcome.record_failure(original, &e);
            progress.update("error");
            continue;
        }

        // Strip the synthetic index prefix and decide the final name:
        // overwrite keeps the input name, otherwise the suffix is added
        // unless the input already carried it from the earlier pass.
        let staged_name = staged
            .staged_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let base_name = strip_index_prefix(&staged_name).to_string();
        let destination = if overwrite || base_name.contains(OPTIMIZED_SUFFIX) {
            staged.original_dir.join(&base_name)
        } else {
            discovery::with_optimized_suffix(&staged.original_dir.join(&base_name))
        };

        match move_file(&staged.staged_path, &destination).await {
            Ok(()) => {
                debug!(
                    "Spliced {} -> {}",
                    original.display(),
                    destination.display()
                );
                outcome.record_processed(original).await;
                outputs.push(destination);
                progress.update(&base_name);
            }
            Err(e) => {
                outcome.record_failure(original, &e);
                progress.update("error");
            }
        }
    }

    Ok(outputs)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{PassSelection, ToolPaths};
    use tempfile::TempDir;

    /// Executable shell script standing in for the external tools.
    fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Fake `java` handling both jar contracts: YUI (`--type css IN [-o
    /// OUT]`) and Closure (`--js IN [--js_output_file OUT]`). Both squeeze
    /// whitespace out of the input.
    fn fake_java(dir: &Path) -> PathBuf {
        // Buffers before writing so that overwrite mode (input == output)
        // does not truncate the input first.
        fake_tool(
            dir,
            "java",
            r#"if [ "$3" = "--type" ]; then
  in="$5"; out=""; [ "$6" = "-o" ] && out="$7"
else
  in="$8"; out=""; [ "$9" = "--js_output_file" ] && out="${10}"
fi
data=$(tr -d ' \n\t' < "$in")
if [ -n "$out" ]; then printf '%s' "$data" > "$out"; else printf '%s' "$data"; fi"#,
        )
    }

    fn test_config(root: &Path, tools_dir: &Path, passes: PassSelection) -> Config {
        Config {
            assets_path: root.to_path_buf(),
            passes,
            tools: ToolPaths {
                java: fake_java(tools_dir),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_whole_file_and_inline_css_end_to_end() {
        let root = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();

        let css = "body {\n  color: red;\n}\n".repeat(10);
        std::fs::write(root.path().join("a.css"), &css).unwrap();
        let html = "<html><head><style>\np  {  margin : 0 }\n</style></head><body></body></html>";
        std::fs::write(root.path().join("b.html"), html).unwrap();

        let config = test_config(
            root.path(),
            tools.path(),
            PassSelection {
                minify_css: true,
                minify_inline_css: true,
                ..Default::default()
            },
        );
        let report = AssetOptimizer::new(config).unwrap().run().await.unwrap();

        assert_eq!(report.total_failures(), 0);

        // Whole-file output sits alongside the original.
        let min_css = root.path().join("a.min.css");
        assert!(min_css.exists());
        assert!(root.path().join("a.css").exists());
        assert!(!std::fs::read_to_string(&min_css).unwrap().contains(' '));

        // Inline output has the style block replaced, outer markup intact.
        let min_html = std::fs::read_to_string(root.path().join("b.min.html")).unwrap();
        assert_eq!(
            min_html,
            "<html><head><style>p{margin:0}</style></head><body></body></html>"
        );
        assert_eq!(std::fs::read_to_string(root.path().join("b.html")).unwrap(), html);

        // Both categories plus a total in the report.
        assert!(report.report.contains("CSS files:"));
        assert!(report.report.contains("Inline CSS:"));
        assert!(report.report.contains("Total:"));
        assert!(report.report.contains("Performed work on 2 files"));
    }

    #[tokio::test]
    async fn test_both_inline_passes_chain_through_one_output() {
        let root = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();

        let html = "<html><style>\nh1 { x : 1 }\n</style><script>\nvar  a = 1 ;\n</script></html>";
        std::fs::write(root.path().join("page.html"), html).unwrap();

        let config = test_config(
            root.path(),
            tools.path(),
            PassSelection {
                minify_inline_css: true,
                compile_inline_js: true,
                ..Default::default()
            },
        );
        let report = AssetOptimizer::new(config).unwrap().run().await.unwrap();
        assert_eq!(report.total_failures(), 0);

        // One suffixed output carrying both passes' splices; never a
        // double-suffixed file.
        let out = std::fs::read_to_string(root.path().join("page.min.html")).unwrap();
        assert_eq!(out, "<html><style>h1{x:1}</style><script>vara=1;</script></html>");
        assert!(!root.path().join("page.min.min.html").exists());
        assert_eq!(
            std::fs::read_to_string(root.path().join("page.html")).unwrap(),
            html
        );
    }

    #[tokio::test]
    async fn test_overwrite_mode_replaces_in_place() {
        let root = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();

        std::fs::write(root.path().join("site.css"), "a { b : c }").unwrap();
        std::fs::write(
            root.path().join("index.htm"),
            "<style>a { b : c }</style>",
        )
        .unwrap();

        let mut config = test_config(
            root.path(),
            tools.path(),
            PassSelection {
                minify_css: true,
                minify_inline_css: true,
                ..Default::default()
            },
        );
        config.overwrite_original = true;
        AssetOptimizer::new(config).unwrap().run().await.unwrap();

        assert_eq!(
            std::fs::read_to_string(root.path().join("site.css")).unwrap(),
            "a{b:c}"
        );
        assert_eq!(
            std::fs::read_to_string(root.path().join("index.htm")).unwrap(),
            "<style>a{b:c}</style>"
        );
        assert!(!root.path().join("site.min.css").exists());
        assert!(!root.path().join("index.min.htm").exists());
    }

    #[tokio::test]
    async fn test_per_file_failure_does_not_abort_pass() {
        let root = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();

        std::fs::write(root.path().join("good.css"), "a { b : c }").unwrap();
        std::fs::write(root.path().join("bad.css"), "broken").unwrap();

        // Fails on the file named bad.css, squeezes the rest.
        let java = fake_tool(
            tools.path(),
            "java",
            r#"case "$5" in *bad*) exit 1;; esac
if [ "$6" = "-o" ]; then tr -d ' \n\t' < "$5" > "$7"; else tr -d ' \n\t' < "$5"; fi"#,
        );
        let config = Config {
            assets_path: root.path().to_path_buf(),
            passes: PassSelection {
                minify_css: true,
                ..Default::default()
            },
            tools: ToolPaths {
                java,
                ..Default::default()
            },
            ..Default::default()
        };
        let report = AssetOptimizer::new(config).unwrap().run().await.unwrap();

        assert!(root.path().join("good.min.css").exists());
        assert!(!root.path().join("bad.min.css").exists());
        assert_eq!(report.total_failures(), 1);
        assert_eq!(report.outcomes[0].processed.len(), 1);
        assert!(report.outcomes[0].failures[0]
            .path
            .ends_with("bad.css"));
    }

    #[tokio::test]
    async fn test_skip_unchanged_second_run_is_empty() {
        let root = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();
        let state_dir = TempDir::new().unwrap();
        let state_path = state_dir.path().join("state.bin");

        std::fs::write(root.path().join("a.css"), "a { b : c }").unwrap();

        let base = test_config(
            root.path(),
            tools.path(),
            PassSelection {
                minify_css: true,
                ..Default::default()
            },
        );

        let first = Config {
            save_state_path: Some(state_path.clone()),
            ..base.clone()
        };
        let report = AssetOptimizer::new(first).unwrap().run().await.unwrap();
        assert_eq!(report.outcomes[0].processed.len(), 1);

        // Second run on an untouched tree processes nothing.
        let second = Config {
            skip_state_path: Some(state_path.clone()),
            ..base.clone()
        };
        let report = AssetOptimizer::new(second).unwrap().run().await.unwrap();
        assert!(report.outcomes[0].processed.is_empty());
        assert!(report.report.contains("Found 0 files to work on"));

        // Touching the file's mtime brings exactly it back.
        let old = std::time::SystemTime::now() - std::time::Duration::from_secs(7200);
        let file = std::fs::File::options()
            .write(true)
            .open(root.path().join("a.css"))
            .unwrap();
        file.set_modified(old).unwrap();
        drop(file);

        let third = Config {
            skip_state_path: Some(state_path),
            ..base
        };
        let report = AssetOptimizer::new(third).unwrap().run().await.unwrap();
        assert_eq!(report.outcomes[0].processed.len(), 1);
    }

    #[tokio::test]
    async fn test_inline_scan_waits_for_gate_holder() {
        let root = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();
        let page = root.path().join("page.html");
        std::fs::write(&page, "<html>no blocks yet</html>").unwrap();

        let config = test_config(
            root.path(),
            tools.path(),
            PassSelection {
                minify_inline_css: true,
                ..Default::default()
            },
        );
        let ctx = PassContext {
            invoker: OptimizerInvoker::new(config.tools.clone()),
            config: Arc::new(config),
            ledger: Arc::new(Mutex::new(SizeLedger::new())),
            gate: Arc::new(InlineGate::new()),
            progress: ProgressManager::new(),
        };

        let holder = ctx.gate.enter().await;
        let task = tokio::spawn(inline_pass(ctx.clone(), FragmentKind::Style, vec![page.clone()]));

        // The pass must not scan (or touch) any document while the gate is
        // held, so a rewrite landing before the release is what it sees.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!root.path().join("page.min.html").exists());
        std::fs::write(&page, "<style>a { b : c }</style>").unwrap();
        drop(holder);

        let outcome = task.await.unwrap();
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.processed.len(), 1);
        assert_eq!(
            std::fs::read_to_string(root.path().join("page.min.html")).unwrap(),
            "<style>a{b:c}</style>"
        );
    }

    #[tokio::test]
    async fn test_assets_root_spellings_share_lock_and_state_keys() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("assets")).unwrap();
        std::fs::write(root.path().join("assets/a.css"), "a { b : c }").unwrap();
        let tools = TempDir::new().unwrap();
        let state_dir = TempDir::new().unwrap();
        let state_path = state_dir.path().join("state.bin");

        // Same tree, roundabout spelling.
        let spelled = root.path().join("assets/./../assets");
        let canonical = root.path().join("assets").canonicalize().unwrap();

        let mut config = test_config(
            &spelled,
            tools.path(),
            PassSelection {
                minify_css: true,
                ..Default::default()
            },
        );
        config.save_state_path = Some(state_path.clone());
        let optimizer = AssetOptimizer::new(config).unwrap();

        // One lock per root, however the root was spelled.
        let lock = optimizer.acquire_lock().unwrap();
        assert!(RunLock::acquire(&canonical).is_err());
        drop(lock);

        optimizer.run().await.unwrap();

        // State keys are the canonical paths, so a later run spelled
        // canonically finds them.
        let state = RunState::load(&state_path).await;
        assert_ne!(state.recorded_mtime(&canonical.join("a.css")), u64::MAX);
    }

    #[tokio::test]
    async fn test_duplicate_basenames_across_directories() {
        let root = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("one")).unwrap();
        std::fs::create_dir_all(root.path().join("two")).unwrap();
        std::fs::write(
            root.path().join("one/page.html"),
            "<style>a { x : 1 }</style>",
        )
        .unwrap();
        std::fs::write(
            root.path().join("two/page.html"),
            "<style>b { y : 2 }</style>",
        )
        .unwrap();

        let config = test_config(
            root.path(),
            tools.path(),
            PassSelection {
                minify_inline_css: true,
                ..Default::default()
            },
        );
        let report = AssetOptimizer::new(config).unwrap().run().await.unwrap();
        assert_eq!(report.total_failures(), 0);

        assert_eq!(
            std::fs::read_to_string(root.path().join("one/page.min.html")).unwrap(),
            "<style>a{x:1}</style>"
        );
        assert_eq!(
            std::fs::read_to_string(root.path().join("two/page.min.html")).unwrap(),
            "<style>b{y:2}</style>"
        );
    }

    #[tokio::test]
    async fn test_failed_optimizer_keeps_original_fragment() {
        let root = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();

        std::fs::write(
            root.path().join("page.html"),
            "<style>keep { me : 1 }</style>",
        )
        .unwrap();

        let java = fake_tool(tools.path(), "java", "exit 1");
        let config = Config {
            assets_path: root.path().to_path_buf(),
            passes: PassSelection {
                minify_inline_css: true,
                ..Default::default()
            },
            tools: ToolPaths {
                java,
                ..Default::default()
            },
            ..Default::default()
        };
        let report = AssetOptimizer::new(config).unwrap().run().await.unwrap();

        // The document is still relocated, fragment text untouched, and the
        // failure shows up in the batch report.
        assert_eq!(
            std::fs::read_to_string(root.path().join("page.min.html")).unwrap(),
            "<style>keep { me : 1 }</style>"
        );
        assert_eq!(report.total_failures(), 1);
    }
}
