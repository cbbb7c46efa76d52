//! Instrumentation flags and the preload modules injected into the target.
//!
//! The modules ship inside the binary and are written to a scratch
//! directory for the lifetime of one supervised run.

use log::debug;
use std::ffi::OsString;
use std::fs;
use std::io;
use tempfile::TempDir;

const NO_CLUSTER_JS: &str = include_str!("preload/no-cluster.js");
const REDIRECT_STDOUT_JS: &str = include_str!("preload/redirect-stdout.js");
const SOFT_EXIT_JS: &str = include_str!("preload/soft-exit.js");
const DETECT_PORT_JS: &str = include_str!("preload/detect-port.js");

/// Runtime flags that enable the profiler and the optimizer trace
pub const PROFILING_FLAGS: &[&str] = &["--prof", "--print-opt-source"];

/// Whether the target gets profiling flags and preload modules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrumentation {
    /// `--prof`, `--print-opt-source` and the preload modules
    Node,
    /// Run the target exactly as given
    None,
}

impl Instrumentation {
    pub fn node() -> Self {
        Self::Node
    }

    pub fn none() -> Self {
        Self::None
    }
}

/// Preload modules materialized on disk
pub struct PreloadBundle {
    dir: TempDir,
    detect_port: bool,
}

impl PreloadBundle {
    /// Write the modules into a fresh scratch directory
    ///
    /// `detect_port` adds the port detection module used in
    /// readiness-gated mode.
    pub fn materialize(detect_port: bool) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("v8-trace-preload").tempdir()?;

        for (name, source) in Self::modules(detect_port) {
            fs::write(dir.path().join(name), source)?;
        }

        debug!("Preload modules written to {}", dir.path().display());
        Ok(Self { dir, detect_port })
    }

    /// Flags to put in front of the target's own arguments
    pub fn flags(&self) -> Vec<OsString> {
        let mut flags: Vec<OsString> = PROFILING_FLAGS.iter().map(OsString::from).collect();

        for (name, _) in Self::modules(self.detect_port) {
            flags.push("-r".into());
            flags.push(self.dir.path().join(name).into_os_string());
        }

        flags
    }

    fn modules(detect_port: bool) -> Vec<(&'static str, &'static str)> {
        let mut modules = vec![
            ("no-cluster.js", NO_CLUSTER_JS),
            ("redirect-stdout.js", REDIRECT_STDOUT_JS),
            ("soft-exit.js", SOFT_EXIT_JS),
        ];
        if detect_port {
            modules.push(("detect-port.js", DETECT_PORT_JS));
        }
        modules
    }
}
