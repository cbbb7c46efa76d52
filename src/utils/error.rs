//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while supervising the profiled process
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to spawn target process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to prepare preload modules: {0}")]
    Preload(#[source] std::io::Error),

    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("Target subprocess error, code: {}", display_code(.code))]
    TargetProcess { code: Option<i32> },

    #[error("Readiness action failed: {0}")]
    Readiness(#[from] ReadinessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

/// Errors raised by the action run once the target binds a port
#[derive(Error, Debug)]
pub enum ReadinessError {
    #[error("Invalid port announcement: {0:?}")]
    InvalidPort(String),

    #[error("On-port command exited with status {code:?}")]
    CommandFailed { code: Option<i32> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while turning an exited process into an artifact
#[derive(Error, Debug)]
pub enum FinalizeError {
    #[error("No isolate log found for pid {pid} in {}", .dir.display())]
    NoIsolateLogFound { pid: u32, dir: PathBuf },

    #[error("Failed to relocate isolate log after {attempts} attempts: {source}")]
    Relocation {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Tick conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while converting an isolate log into ticks
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to run log preprocessor: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Log preprocessor failed: {0}")]
    Failed(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to read file {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
