use crate::utils::config::{DEFAULT_OUTPUT_DIR, DEFAULT_RUNTIME};
use std::path::PathBuf;

/// Arguments for the profile command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct ProfileArgs {
    /// Runtime executable name or path (e.g. "node")
    pub runtime: String,

    /// Script and its arguments, passed after the instrumentation flags
    pub script_args: Vec<String>,

    /// Output folder template
    pub output_dir: String,

    /// Shell command to run once the target binds a port
    pub on_port: Option<String>,

    /// Add profiling flags and preload modules
    pub instrument: bool,

    /// Directory the target runs in (None = current directory)
    pub working_dir: Option<PathBuf>,
}

impl Default for ProfileArgs {
    fn default() -> Self {
        Self {
            runtime: DEFAULT_RUNTIME.to_string(),
            script_args: Vec::new(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            on_port: None,
            instrument: true,
            working_dir: None,
        }
    }
}
