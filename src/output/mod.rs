//! Output writers for profiling artifacts.
//!
//! This module handles writing data to disk:
//! - Run metadata (`meta.json`)
//! - Inlining associations (`inlined.json`)
//! - Ticks (`ticks.json`)

pub mod json;

// Re-export main functions
pub use json::{read_inlined, read_meta, read_ticks, write_artifact, write_json};
