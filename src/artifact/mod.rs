//! Post-exit artifact handling.
//!
//! This module turns a supervised exit into a `ProfileArtifact`:
//! - Locating the isolate log by pid
//! - Moving it into the output folder
//! - Converting it into ticks

pub mod finalizer;
pub mod ticks;

use crate::parser::InliningRecord;
use crate::utils::config::SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Re-export main types and functions
pub use finalizer::{find_isolate_log, relocate_with, Finalizer, RelocationPolicy};
pub use ticks::{PreprocessConverter, Tick, TickConverter};

/// Everything one profiling run produced
#[derive(Debug, Clone)]
pub struct ProfileArtifact {
    pub pid: u32,
    pub folder: PathBuf,
    pub log_path: PathBuf,
    pub inlined: InliningRecord,
    pub ticks: Vec<Tick>,
}

/// Summary written to `meta.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMeta {
    /// Schema version for compatibility checking
    pub version: String,

    pub pid: u32,

    /// Runtime executable that was profiled
    pub runtime: String,

    /// Arguments after the instrumentation flags
    pub argv: Vec<String>,

    /// File name of the relocated isolate log
    pub log_file: String,

    pub tick_count: usize,
    pub inlined_targets: usize,
    pub inlined_events: usize,

    /// Timestamp when the artifact was written
    pub generated_at: String,
}

impl ProfileMeta {
    pub fn new(artifact: &ProfileArtifact, runtime: &Path, argv: &[String]) -> Self {
        use chrono::Utc;

        Self {
            version: SCHEMA_VERSION.to_string(),
            pid: artifact.pid,
            runtime: runtime.display().to_string(),
            argv: argv.to_vec(),
            log_file: artifact
                .log_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            tick_count: artifact.ticks.len(),
            inlined_targets: artifact.inlined.len(),
            inlined_events: artifact.inlined.total_events(),
            generated_at: Utc::now().to_rfc3339(),
        }
    }
}
