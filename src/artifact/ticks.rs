//! Isolate log to tick conversion.
//!
//! Conversion itself belongs to the runtime's log processor; this module only
//! defines the seam and a default implementation that shells out to
//! `<runtime> --prof-process --preprocess <log>`.

use crate::utils::error::ConvertError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

/// One profiler sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Timestamp in microseconds since the isolate started
    #[serde(rename = "tm")]
    pub timestamp: u64,

    /// VM state the sample was taken in
    #[serde(rename = "vm")]
    pub vm_state: i64,

    /// Code entry indices, innermost first
    #[serde(rename = "s", default)]
    pub stack: Vec<i64>,
}

/// Turns a relocated isolate log into ticks
pub trait TickConverter {
    fn convert(&self, log_path: &Path, executable: &Path) -> Result<Vec<Tick>, ConvertError>;
}

/// Runs the runtime's own log preprocessor
#[derive(Debug, Default, Clone, Copy)]
pub struct PreprocessConverter;

impl PreprocessConverter {
    pub fn new() -> Self {
        Self
    }
}

impl TickConverter for PreprocessConverter {
    fn convert(&self, log_path: &Path, executable: &Path) -> Result<Vec<Tick>, ConvertError> {
        debug!(
            "Preprocessing {} with {}",
            log_path.display(),
            executable.display()
        );

        let output = Command::new(executable)
            .arg("--prof-process")
            .arg("--preprocess")
            .arg(log_path)
            .output()
            .map_err(ConvertError::Spawn)?;

        if !output.status.success() {
            return Err(ConvertError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_preprocessed(&output.stdout)
    }
}

/// Extract the tick list from preprocessor JSON
///
/// Everything besides `ticks` (code tables, shared libraries) is ignored.
pub fn parse_preprocessed(json: &[u8]) -> Result<Vec<Tick>, ConvertError> {
    #[derive(Deserialize)]
    struct Preprocessed {
        #[serde(default)]
        ticks: Vec<Tick>,
    }

    let preprocessed: Preprocessed = serde_json::from_slice(json)?;
    debug!("Preprocessor produced {} ticks", preprocessed.ticks.len());
    Ok(preprocessed.ticks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preprocessed() {
        let json = br#"{
            "code": [{"name": "main", "type": "JS"}],
            "ticks": [
                {"tm": 100, "vm": 0, "s": [3, 0, 2, 0]},
                {"tm": 250, "vm": 6}
            ]
        }"#;

        let ticks = parse_preprocessed(json).unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].stack, vec![3, 0, 2, 0]);
        assert_eq!(ticks[1].vm_state, 6);
        assert!(ticks[1].stack.is_empty());
    }

    #[test]
    fn test_parse_preprocessed_without_ticks() {
        assert!(parse_preprocessed(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_preprocessed_invalid() {
        assert!(matches!(
            parse_preprocessed(b"not json"),
            Err(ConvertError::Json(_))
        ));
    }
}
