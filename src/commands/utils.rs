use crate::output::{read_inlined, read_meta};
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Resolve a runtime name or path to an executable
///
/// Names containing a path separator are taken as paths; anything else is
/// looked up on `PATH`.
pub fn resolve_executable(name: &str) -> Result<PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) {
        let path = Path::new(name);
        if !path.is_file() {
            anyhow::bail!("Runtime not found: {}", path.display());
        }
        return Ok(path.to_path_buf());
    }

    which::which(name).with_context(|| format!("Runtime '{}' is not installed or not in PATH", name))
}

/// Print a summary of an output folder
pub fn inspect_profile_dir(folder: PathBuf, top: usize) -> Result<()> {
    println!("Inspecting profile: {}", folder.display());

    let meta = read_meta(&folder).context("Failed to read profile metadata")?;
    let inlined = read_inlined(&folder).context("Failed to read inlining data")?;

    println!("✓ Valid profile folder");
    println!("  Version: {}", meta.version);
    println!("  PID: {}", meta.pid);
    println!("  Runtime: {}", meta.runtime);
    println!("  Arguments: {}", meta.argv.join(" "));
    println!("  Isolate log: {}", meta.log_file);
    println!("  Ticks: {}", meta.tick_count);
    println!(
        "  Inlining: {} events into {} targets",
        inlined.total_events(),
        inlined.len()
    );

    let mut targets: Vec<_> = inlined.iter().collect();
    targets.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    if !targets.is_empty() {
        println!();
        println!("Top inlining targets:");
        for (key, frames) in targets.into_iter().take(top) {
            println!("  {:>5}  {}", frames.len(), key);
        }
    }

    Ok(())
}

/// Display version information
pub fn display_version() {
    println!("V8 Trace Studio v{}", env!("CARGO_PKG_VERSION"));
    println!("Artifact Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Profiles V8-based processes and recovers their inlining decisions.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_executable_on_path() {
        let sh = resolve_executable("sh").unwrap();
        assert!(sh.is_absolute());
    }

    #[test]
    fn test_resolve_executable_missing() {
        assert!(resolve_executable("definitely-not-a-runtime-v8trace").is_err());
        assert!(resolve_executable("/nonexistent/dir/node").is_err());
    }
}
