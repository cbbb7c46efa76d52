//! JSON artifact writer.
//!
//! Writes the artifact of a run into its output folder:
//! `meta.json`, `inlined.json` and `ticks.json`.

use crate::artifact::{ProfileArtifact, ProfileMeta, Tick};
use crate::parser::InliningRecord;
use crate::utils::config::{INLINED_FILE, META_FILE, TICKS_FILE};
use crate::utils::error::OutputError;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Write all artifact files into `artifact.folder`
///
/// **Public** - main entry point for artifact output
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - a target path is a directory
pub fn write_artifact(artifact: &ProfileArtifact, meta: &ProfileMeta) -> Result<(), OutputError> {
    info!("Writing artifact to: {}", artifact.folder.display());

    write_json(meta, artifact.folder.join(META_FILE))?;
    write_json(&artifact.inlined, artifact.folder.join(INLINED_FILE))?;
    write_json(&artifact.ticks, artifact.folder.join(TICKS_FILE))?;

    Ok(())
}

/// Write any serializable value as pretty JSON
///
/// Parent directories are created when missing.
pub fn write_json<T: Serialize + ?Sized>(
    value: &T,
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    // Validate path
    validate_output_path(output_path)?;

    // Create parent directories if needed
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, value).map_err(OutputError::SerializationFailed)?;

    debug!(
        "Wrote {} ({} bytes)",
        output_path.display(),
        calculate_file_size(output_path)
    );

    Ok(())
}

/// Validate that output path is writable
///
/// **Private** - internal validation
fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    // Check if we're trying to overwrite a directory
    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Calculate file size in bytes
///
/// **Private** - internal utility
fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn read_json<T: DeserializeOwned>(input_path: &Path) -> Result<T, OutputError> {
    debug!("Reading {}", input_path.display());

    let file = File::open(input_path).map_err(|source| OutputError::ReadFailed {
        path: input_path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(OutputError::SerializationFailed)
}

/// Read `meta.json` from an output folder
pub fn read_meta(folder: impl AsRef<Path>) -> Result<ProfileMeta, OutputError> {
    read_json(&folder.as_ref().join(META_FILE))
}

/// Read `inlined.json` from an output folder
pub fn read_inlined(folder: impl AsRef<Path>) -> Result<InliningRecord, OutputError> {
    read_json(&folder.as_ref().join(INLINED_FILE))
}

/// Read `ticks.json` from an output folder
pub fn read_ticks(folder: impl AsRef<Path>) -> Result<Vec<Tick>, OutputError> {
    read_json(&folder.as_ref().join(TICKS_FILE))
}
