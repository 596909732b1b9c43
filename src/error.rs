//! # Error Types Module
//!
//! Custom error types for the asset optimization pipeline.
//!
//! ## Responsibilities:
//! - Defines the `OptimizeError` enum categorizing every failure class
//! - Integrates with `thiserror` for automatic conversions
//! - Keeps the setup / per-file / state-file taxonomy distinct so callers
//!   can decide what is fatal and what is best-effort
//!
//! ## Categories:
//! - `Io`: filesystem failures (unreadable documents, failed copies)
//! - `Tool`: an external optimizer exited non-zero or could not be spawned
//! - `Lock`: the run lock could not be acquired (another instance running)
//! - `State`: run-state file handling (write failures only; an unreadable
//!   state file is treated as absent, never as an error)
//! - `Validation`: bad user input (missing path, empty pass selection)

/// Custom error types for asset optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("optimizer tool failed: {0}")]
    Tool(String),

    #[error("run lock error: {0}")]
    Lock(String),

    #[error("state file error: {0}")]
    State(String),

    #[error("validation error: {0}")]
    Validation(String),
}
