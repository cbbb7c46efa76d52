//! Data structures recovered from the optimizer trace.
//!
//! These are also the shape of `inlined.json` in the output folder.

use crate::utils::config::ROOT_FRAME_INDEX;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `--- FUNCTION SOURCE (...) ---` header printed by the optimizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationFrame {
    /// Function name, `"(anonymous)"` when the header carries none
    #[serde(rename = "fn")]
    pub function: String,

    /// Script the function is defined in
    pub file: String,

    /// Optimization id
    pub id: u64,

    /// Position inside the optimization, -1 for the function being optimized
    pub index: i64,

    /// Source start offset
    pub start: u64,

    /// Root frame active when this frame was printed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<Box<OptimizationFrame>>,
}

impl OptimizationFrame {
    /// Whether this header opens a new optimization rather than an inlinee
    pub fn is_root(&self) -> bool {
        self.index == ROOT_FRAME_INDEX
    }

    /// Key under which inlining declarations for this frame are recorded
    pub fn target_key(&self) -> String {
        format!("{} {}", self.function, self.file)
    }
}

/// Inlined frames grouped by `"<function> <file>"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InliningRecord {
    entries: BTreeMap<String, Vec<OptimizationFrame>>,
}

impl InliningRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame under its own target key, keeping report order
    pub fn record(&mut self, frame: OptimizationFrame) {
        self.entries.entry(frame.target_key()).or_default().push(frame);
    }

    pub fn get(&self, key: &str) -> Option<&[OptimizationFrame]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of distinct targets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of recorded inlining events across all targets
    pub fn total_events(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<OptimizationFrame>)> {
        self.entries.iter()
    }
}
