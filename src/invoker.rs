//! # Optimizer Invocation Module
//!
//! Boundary to the external optimizer processes.
//!
//! ## Responsibilities:
//! - Builds the exact command line each external tool expects and runs it
//!   via `tokio::process::Command`, waiting for exit
//! - Two modes per text tool, matching the tools' own contracts: write to a
//!   named output file (whole-file passes) or stream the optimized content
//!   to stdout (fragment passes)
//! - Image tools: jpegoptim overwrites in place or writes into a `--dest`
//!   directory keeping the basename; optipng writes to an `-out` path
//! - A non-zero exit or a spawn failure is a per-unit `Tool` error for the
//!   caller to collect; it never aborts a pass
//!
//! ## Tool contracts:
//! - CSS: `java -jar yuicompressor.jar --type css IN [-o OUT]`
//! - JS: `java -jar closure-compiler.jar --compilation_level
//!   SIMPLE_OPTIMIZATIONS --warning_level QUIET --js IN [--js_output_file OUT]`
//! - JPEG: `jpegoptim --strip-all [--dest=DIR] IN`
//! - PNG/GIF: `optipng IN -out OUT`

use crate::config::ToolPaths;
use crate::error::OptimizeError;
use crate::fragment::FragmentKind;
use anyhow::Result;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs external optimizer processes according to their CLI contracts.
#[derive(Clone)]
pub struct OptimizerInvoker {
    tools: ToolPaths,
}

impl OptimizerInvoker {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    /// Run a tool to completion and return its stdout bytes. Non-zero exit
    /// or spawn failure becomes a `Tool` error.
    async fn run_capture(&self, program: &Path, args: &[String]) -> Result<Vec<u8>> {
        debug!("Running {} {}", program.display(), args.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                OptimizeError::Tool(format!("failed to spawn {}: {}", program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OptimizeError::Tool(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            ))
            .into());
        }

        Ok(output.stdout)
    }

    fn path_arg(path: &Path) -> String {
        path.to_string_lossy().to_string()
    }

    /// Minify a CSS file, writing the result to `output`.
    pub async fn minify_css_file(&self, input: &Path, output: &Path) -> Result<()> {
        let args = vec![
            "-jar".to_string(),
            Self::path_arg(&self.tools.yui_compressor),
            "--type".to_string(),
            "css".to_string(),
            Self::path_arg(input),
            "-o".to_string(),
            Self::path_arg(output),
        ];
        self.run_capture(&self.tools.java, &args).await?;
        Ok(())
    }

    /// Minify a CSS unit, capturing the minified content from stdout.
    pub async fn minify_css_to_string(&self, input: &Path) -> Result<String> {
        let args = vec![
            "-jar".to_string(),
            Self::path_arg(&self.tools.yui_compressor),
            "--type".to_string(),
            "css".to_string(),
            Self::path_arg(input),
        ];
        let stdout = self.run_capture(&self.tools.java, &args).await?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    fn closure_args(&self, input: &Path) -> Vec<String> {
        vec![
            "-jar".to_string(),
            Self::path_arg(&self.tools.closure_compiler),
            "--compilation_level".to_string(),
            "SIMPLE_OPTIMIZATIONS".to_string(),
            "--warning_level".to_string(),
            "QUIET".to_string(),
            "--js".to_string(),
            Self::path_arg(input),
        ]
    }

    /// Compile a JavaScript file, writing the result to `output`.
    pub async fn compile_js_file(&self, input: &Path, output: &Path) -> Result<()> {
        let mut args = self.closure_args(input);
        args.push("--js_output_file".to_string());
        args.push(Self::path_arg(output));
        self.run_capture(&self.tools.java, &args).await?;
        Ok(())
    }

    /// Compile a JavaScript unit, capturing the compiled content from stdout.
    pub async fn compile_js_to_string(&self, input: &Path) -> Result<String> {
        let stdout = self
            .run_capture(&self.tools.java, &self.closure_args(input))
            .await?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    /// Optimize one extracted fragment unit, returning the optimized text.
    pub async fn optimize_fragment(&self, kind: FragmentKind, unit: &Path) -> Result<String> {
        match kind {
            FragmentKind::Style => self.minify_css_to_string(unit).await,
            FragmentKind::Script => self.compile_js_to_string(unit).await,
        }
    }

    /// Compress a JPEG. With `dest` the tool writes a same-basename copy
    /// into that directory; without it the input is overwritten in place.
    pub async fn compress_jpeg(&self, input: &Path, dest: Option<&Path>) -> Result<()> {
        let mut args = vec!["--strip-all".to_string()];
        if let Some(dest) = dest {
            args.push(format!("--dest={}", dest.display()));
        }
        args.push(Self::path_arg(input));
        self.run_capture(&self.tools.jpegoptim, &args).await?;
        Ok(())
    }

    /// Compress a PNG or GIF, writing the result to `output`.
    pub async fn compress_png(&self, input: &Path, output: &Path) -> Result<()> {
        let args = vec![
            Self::path_arg(input),
            "-out".to_string(),
            Self::path_arg(output),
        ];
        self.run_capture(&self.tools.optipng, &args).await?;
        Ok(())
    }
}
