//! Configuration and constants for the CLI.

use std::time::Duration;

/// Current output schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Runtime used when neither `--runtime` nor `V8_TRACE_RUNTIME` is given
pub const DEFAULT_RUNTIME: &str = "node";

/// Output folder template, see `utils::naming::resolve_output_dir`
pub const DEFAULT_OUTPUT_DIR: &str = "{pid}.v8trace";

// Shutdown protocol timings
pub const ESCALATION_DELAY: Duration = Duration::from_secs(3);
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// How long output readers may keep draining after the target exited;
// descendants can hold the pipes open indefinitely
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// Isolate log relocation: initial attempt + RELOCATION_RETRIES retries
pub const RELOCATION_RETRIES: u32 = 5;
pub const RELOCATION_DELAY: Duration = Duration::from_secs(1);

// Optimizer trace conventions
pub const ROOT_FRAME_INDEX: i64 = -1;
pub const ANONYMOUS_FUNCTION: &str = "(anonymous)";

// File descriptors as seen by the child process
pub const APP_STDOUT_FD: i32 = 3;
pub const RESERVED_FD_A: i32 = 4;
pub const READINESS_FD: i32 = 5;
pub const RESERVED_FD_B: i32 = 6;
pub const CONTROL_FD: i32 = 7;

// Artifact file names inside the output folder
pub const META_FILE: &str = "meta.json";
pub const INLINED_FILE: &str = "inlined.json";
pub const TICKS_FILE: &str = "ticks.json";
