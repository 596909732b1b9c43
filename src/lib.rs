//! # Web Asset Optimizer Library
//!
//! Batch optimization pipeline for web assets: minifies stylesheets,
//! compiles JavaScript, compresses images, and rewrites inline
//! `<style>`/`<script>` blocks inside template files.
//!
//! ## Module architecture:
//! - `config`: run configuration, pass selection, external tool paths
//! - `error`: custom error types for the failure taxonomy
//! - `discovery`: recursive file discovery by extension set
//! - `state`: persisted path->mtime map and change filtering
//! - `fragment`: inline fragment extraction and splicing
//! - `staging`: index-keyed temporary units with guaranteed cleanup
//! - `invoker`: external optimizer process boundary
//! - `gate`: mutual exclusion between the two inline passes
//! - `optimizer`: the pass coordinator (fan-out/join orchestrator)
//! - `stats`: per-category size ledger and report rendering
//! - `progress`: per-pass progress bars
//! - `lock`: advisory per-root run lock
//!
//! ## Usage:
//! ```rust,no_run
//! use web_asset_optimizer::{AssetOptimizer, Config, PassSelection};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config {
//!     assets_path: "/srv/www".into(),
//!     passes: PassSelection::all(),
//!     ..Default::default()
//! };
//! let optimizer = AssetOptimizer::new(config)?;
//! let _lock = optimizer.acquire_lock()?;
//! optimizer.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod fragment;
pub mod gate;
pub mod invoker;
pub mod lock;
pub mod optimizer;
pub mod progress;
pub mod staging;
pub mod state;
pub mod stats;

pub use config::{Config, PassSelection, ToolPaths};
pub use error::OptimizeError;
pub use lock::RunLock;
pub use optimizer::{AssetOptimizer, PassOutcome, RunReport};
pub use state::RunState;
