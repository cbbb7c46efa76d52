//! Output folder naming.
//!
//! Templates may contain `{pid}`, `{timestamp}`, `{name}` and `{cwd}`.

use chrono::Utc;
use std::path::{Path, PathBuf};

/// Expand an output folder template
///
/// **Public** - used by the finalizer once the pid is known
///
/// # Arguments
/// * `template` - Folder template, e.g. `"{pid}.v8trace"`
/// * `pid` - Process id of the profiled child
/// * `name` - Short name of the profiled entry point
/// * `cwd` - Working directory the child ran in
///
/// # Returns
/// Absolute folder path (relative templates resolve against `cwd`)
pub fn resolve_output_dir(template: &str, pid: u32, name: &str, cwd: &Path) -> PathBuf {
    let expanded = template
        .replace("{pid}", &pid.to_string())
        .replace("{timestamp}", &Utc::now().timestamp_millis().to_string())
        .replace("{name}", name)
        .replace("{cwd}", &cwd.to_string_lossy());

    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

/// Derive the `{name}` placeholder from the profiled arguments
///
/// Uses the file stem of the first argument (the script), or `"profile"`.
pub fn profile_name(args: &[String]) -> String {
    args.first()
        .and_then(|script| Path::new(script).file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "profile".to_string())
}
