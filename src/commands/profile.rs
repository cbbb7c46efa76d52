//! Profile command implementation.
//!
//! The profile command:
//! 1. Resolves the runtime executable
//! 2. Supervises the instrumented target until it exits
//! 3. Relocates and converts the isolate log
//! 4. Writes the artifact files

use super::models::ProfileArgs;
use super::utils::resolve_executable;
use crate::artifact::{Finalizer, PreprocessConverter, ProfileArtifact, ProfileMeta};
use crate::output::write_artifact;
use crate::supervisor::preload::Instrumentation;
use crate::supervisor::readiness::shell_action;
use crate::supervisor::Supervisor;
use crate::utils::naming::profile_name;
use anyhow::{Context, Result};
use log::{debug, info};
use std::time::Instant;

/// Execute the profile command
///
/// **Public** - main entry point called from main.rs
///
/// # Returns
/// The artifact, already written to its output folder
///
/// # Errors
/// * Runtime not found
/// * Target exited non-zero, or the on-port command failed
/// * No isolate log, relocation or conversion failures
/// * File write errors
pub fn execute_profile(args: ProfileArgs) -> Result<ProfileArtifact> {
    let start_time = Instant::now();

    // Step 1: Resolve runtime
    info!("Step 1/4: Resolving runtime '{}'...", args.runtime);
    let runtime = resolve_executable(&args.runtime)?;
    debug!("Runtime resolved to {}", runtime.display());

    let working_dir = match &args.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    // Step 2: Supervise
    info!("Step 2/4: Running target...");
    let instrumentation = if args.instrument {
        Instrumentation::node()
    } else {
        Instrumentation::none()
    };
    let mut supervisor = Supervisor::new(&runtime, args.script_args.clone())
        .with_working_dir(&working_dir)
        .with_instrumentation(instrumentation);
    if let Some(command) = &args.on_port {
        supervisor = supervisor.on_port(shell_action(command.clone()));
    }

    let exit = supervisor.run().context("Profiled process did not complete")?;

    // Step 3: Finalize
    info!("Step 3/4: Collecting isolate log...");
    let finalizer =
        Finalizer::new(PreprocessConverter::new()).with_output_template(args.output_dir.clone());
    let artifact = finalizer
        .finalize(exit, &runtime, &profile_name(&args.script_args))
        .context("Failed to finalize profile")?;

    // Step 4: Write outputs
    info!("Step 4/4: Writing output files...");
    let meta = ProfileMeta::new(&artifact, &runtime, &args.script_args);
    write_artifact(&artifact, &meta).context("Failed to write artifact")?;

    info!("✓ Profile written to: {}", artifact.folder.display());

    let elapsed = start_time.elapsed();
    info!("Profile completed in {:.2}s", elapsed.as_secs_f64());

    Ok(artifact)
}

/// Validate profile arguments
///
/// **Public** - can be called before execute_profile for early validation
pub fn validate_args(args: &ProfileArgs) -> Result<()> {
    if args.runtime.trim().is_empty() {
        anyhow::bail!("Runtime cannot be empty");
    }

    if args.script_args.is_empty() {
        anyhow::bail!("Nothing to profile: pass a script after --");
    }

    if args.output_dir.trim().is_empty() {
        anyhow::bail!("Output directory template cannot be empty");
    }

    if let Some(command) = &args.on_port {
        if command.trim().is_empty() {
            anyhow::bail!("--on-port command cannot be empty");
        }
        if !args.instrument {
            anyhow::bail!("--on-port requires instrumentation (port detection is a preload module)");
        }
    }

    if let Some(dir) = &args.working_dir {
        if !dir.is_dir() {
            anyhow::bail!("Working directory does not exist: {}", dir.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_args() -> ProfileArgs {
        ProfileArgs {
            script_args: vec!["server.js".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_args_valid() {
        assert!(validate_args(&script_args()).is_ok());
    }

    #[test]
    fn test_validate_args_no_script() {
        assert!(validate_args(&ProfileArgs::default()).is_err());
    }

    #[test]
    fn test_validate_args_empty_runtime() {
        let args = ProfileArgs {
            runtime: "  ".to_string(),
            ..script_args()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_empty_output_dir() {
        let args = ProfileArgs {
            output_dir: String::new(),
            ..script_args()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_on_port_needs_instrumentation() {
        let args = ProfileArgs {
            on_port: Some("curl localhost:$PORT".to_string()),
            instrument: false,
            ..script_args()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_blank_on_port() {
        let args = ProfileArgs {
            on_port: Some(" ".to_string()),
            ..script_args()
        };
        assert!(validate_args(&args).is_err());
    }
}
