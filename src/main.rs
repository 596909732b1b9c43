//! # Web Asset Optimizer - Main Entry Point
//!
//! ## Execution flow:
//! 1. Parse CLI arguments with `clap`
//! 2. Initialize `tracing` logging (INFO, or DEBUG with `--verbose`)
//! 3. Validate the assets path and pass selection (usage errors exit
//!    non-zero before any file is touched)
//! 4. Acquire the advisory run lock for the assets root
//! 5. Run the selected passes and exit
//!
//! ## Example:
//! ```bash
//! asset-optimizer /srv/www --all --statistics
//! asset-optimizer /srv/www --minify-css --compile-inline-js -o \
//!     --save-state ~/.asset-optimizer/www.state
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use web_asset_optimizer::{AssetOptimizer, Config, PassSelection, ToolPaths};

#[derive(Parser)]
#[command(name = "asset-optimizer")]
#[command(about = "Minify, compile and compress your website's static assets")]
struct Args {
    /// Directory containing the asset files
    assets_path: PathBuf,

    /// Run all passes
    #[arg(long)]
    all: bool,

    /// Minify CSS files
    #[arg(long)]
    minify_css: bool,

    /// Minify inline <style> blocks inside template files
    #[arg(long)]
    minify_inline_css: bool,

    /// Compile JavaScript files with the Closure Compiler
    #[arg(long)]
    compile_js: bool,

    /// Compile inline <script> blocks inside template files
    #[arg(long)]
    compile_inline_js: bool,

    /// Compress image files (jpegoptim / optipng)
    #[arg(long)]
    compress_images: bool,

    /// Overwrite the original files instead of writing .min siblings
    #[arg(short, long)]
    overwrite: bool,

    /// Print statistics at the end of the run
    #[arg(short, long)]
    statistics: bool,

    /// Persist the path->mtime state to this file at the end of the run
    #[arg(long, value_name = "FILE")]
    save_state: Option<PathBuf>,

    /// Skip files unchanged since the run that wrote this state file
    #[arg(long, value_name = "FILE")]
    skip_unchanged: Option<PathBuf>,

    /// Record files in the saved state even when their optimizer failed
    #[arg(long)]
    record_failures: bool,

    /// JSON file overriding the external tool locations
    #[arg(long, value_name = "FILE")]
    tools: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn pass_selection(&self) -> PassSelection {
        if self.all {
            return PassSelection::all();
        }
        PassSelection {
            minify_css: self.minify_css,
            minify_inline_css: self.minify_inline_css,
            compile_js: self.compile_js,
            compile_inline_js: self.compile_inline_js,
            compress_images: self.compress_images,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let tools = match args.tools {
        Some(ref path) => ToolPaths::from_file(path).await?,
        None => ToolPaths::default(),
    };

    let config = Config {
        assets_path: args.assets_path.clone(),
        passes: args.pass_selection(),
        overwrite_original: args.overwrite,
        print_statistics: args.statistics,
        save_state_path: args.save_state,
        skip_state_path: args.skip_unchanged,
        record_failures: args.record_failures,
        tools,
    };

    // Validates before locking, locks before touching any file.
    let optimizer = AssetOptimizer::new(config)?;
    let _lock = optimizer.acquire_lock()?;

    let report = optimizer.run().await?;
    if report.total_failures() > 0 {
        info!("Completed with {} failed unit(s)", report.total_failures());
    }

    Ok(())
}
