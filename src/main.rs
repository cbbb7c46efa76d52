//! V8 Trace Studio CLI
//!
//! Profiles a V8-based process and records which functions the optimizer
//! inlined into which, next to the raw profiler ticks.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use v8_trace_studio::commands::{
    display_version, execute_profile, inspect_profile_dir, validate_args, ProfileArgs,
};
use v8_trace_studio::utils::config::{DEFAULT_OUTPUT_DIR, DEFAULT_RUNTIME};

/// V8 Trace Studio - profiling and inlining traces for V8 runtimes
#[derive(Parser, Debug)]
#[command(name = "v8-trace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a script under the profiler
    Profile {
        /// Runtime executable name or path
        #[arg(long, env = "V8_TRACE_RUNTIME", default_value = DEFAULT_RUNTIME)]
        runtime: String,

        /// Output folder template ({pid}, {timestamp}, {name}, {cwd})
        #[arg(short, long, env = "V8_TRACE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: String,

        /// Shell command to run once the target binds a port ($PORT is substituted)
        #[arg(long)]
        on_port: Option<String>,

        /// Run the target without profiling flags and preload modules
        #[arg(long)]
        no_instrument: bool,

        /// Directory to run the target in
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Script and arguments
        #[arg(last = true, required = true)]
        script: Vec<String>,
    },

    /// Summarize a profile output folder
    Inspect {
        /// Path to the output folder
        #[arg(short, long)]
        dir: PathBuf,

        /// Number of inlining targets to list
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Profile {
            runtime,
            output_dir,
            on_port,
            no_instrument,
            cwd,
            script,
        } => {
            let args = ProfileArgs {
                runtime,
                script_args: script,
                output_dir,
                on_port,
                instrument: !no_instrument,
                working_dir: cwd,
            };

            // Validate args first
            validate_args(&args)?;

            execute_profile(args)?;
        }

        Commands::Inspect { dir, top } => {
            inspect_profile_dir(dir, top)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
