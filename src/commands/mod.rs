//! CLI command implementations.
//!
//! Commands orchestrate the library components to perform user tasks.

pub mod models;
pub mod profile;
pub mod utils;

// Re-export main command functions
pub use models::ProfileArgs;
pub use profile::{execute_profile, validate_args};
pub use utils::{display_version, inspect_profile_dir, resolve_executable};
