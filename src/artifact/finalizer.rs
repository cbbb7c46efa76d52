//! Locate, relocate and convert the isolate log of an exited run.

use super::ticks::TickConverter;
use super::ProfileArtifact;
use crate::supervisor::SupervisedExit;
use crate::utils::config::{DEFAULT_OUTPUT_DIR, RELOCATION_DELAY, RELOCATION_RETRIES};
use crate::utils::error::FinalizeError;
use crate::utils::naming::resolve_output_dir;
use log::{debug, info, warn};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Retry budget for moving the isolate log
///
/// Some platforms keep the log open for a moment after the process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RelocationPolicy {
    fn default() -> Self {
        Self {
            retries: RELOCATION_RETRIES,
            delay: RELOCATION_DELAY,
        }
    }
}

/// Moves a file; `fs::rename` outside of tests
pub type FileMover = Box<dyn Fn(&Path, &Path) -> io::Result<()> + Send + Sync>;

/// Pattern for `isolate-<hex>-<pid>-v8.log`
pub fn isolate_log_pattern(pid: u32) -> Regex {
    #[allow(clippy::unwrap_used)]
    Regex::new(&format!(r"^isolate-(0x)?[0-9a-fA-F]+-{}-v8\.log$", pid)).unwrap()
}

/// Find the isolate log written by `pid` in `dir`
///
/// **Public** - first step of `Finalizer::finalize`
///
/// # Errors
/// * `FinalizeError::NoIsolateLogFound` - no file name matches
/// * `FinalizeError::Io` - `dir` cannot be read
pub fn find_isolate_log(dir: &Path, pid: u32) -> Result<PathBuf, FinalizeError> {
    let pattern = isolate_log_pattern(pid);

    let mut matches: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| pattern.is_match(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    matches.sort();

    if matches.len() > 1 {
        warn!(
            "{} isolate logs found for pid {}, using {}",
            matches.len(),
            pid,
            matches[0].display()
        );
    }

    matches
        .into_iter()
        .next()
        .ok_or_else(|| FinalizeError::NoIsolateLogFound {
            pid,
            dir: dir.to_path_buf(),
        })
}

/// Move `from` to `to`, retrying with a fixed delay
///
/// Makes at most `policy.retries + 1` attempts.
pub fn relocate_with<F>(
    from: &Path,
    to: &Path,
    policy: RelocationPolicy,
    mut mover: F,
) -> Result<(), FinalizeError>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match mover(from, to) {
            Ok(()) => {
                debug!("Relocated {} on attempt {}", from.display(), attempt);
                return Ok(());
            }
            Err(e) if attempt <= policy.retries => {
                debug!(
                    "Relocation attempt {} of {} failed: {}",
                    attempt,
                    policy.retries + 1,
                    e
                );
                thread::sleep(policy.delay);
            }
            Err(e) => {
                return Err(FinalizeError::Relocation {
                    attempts: attempt,
                    source: e,
                })
            }
        }
    }
}

/// Turns a supervised exit into a `ProfileArtifact`
pub struct Finalizer<C> {
    converter: C,
    policy: RelocationPolicy,
    output_template: String,
    mover: FileMover,
}

impl<C: TickConverter> Finalizer<C> {
    pub fn new(converter: C) -> Self {
        Self {
            converter,
            policy: RelocationPolicy::default(),
            output_template: DEFAULT_OUTPUT_DIR.to_string(),
            mover: Box::new(|from: &Path, to: &Path| fs::rename(from, to)),
        }
    }

    pub fn with_policy(mut self, policy: RelocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = template.into();
        self
    }

    pub fn with_mover(mut self, mover: FileMover) -> Self {
        self.mover = mover;
        self
    }

    /// Finalize one run
    ///
    /// # Arguments
    /// * `exit` - Result of the supervisor
    /// * `executable` - Runtime that produced the log, handed to the converter
    /// * `name` - Value of the `{name}` placeholder
    ///
    /// # Errors
    /// * `FinalizeError::NoIsolateLogFound` - converter is not invoked
    /// * `FinalizeError::Relocation` - retry budget exhausted
    /// * `FinalizeError::Convert` - converter failed
    pub fn finalize(
        &self,
        exit: SupervisedExit,
        executable: &Path,
        name: &str,
    ) -> Result<ProfileArtifact, FinalizeError> {
        let log = find_isolate_log(&exit.working_dir, exit.pid)?;
        debug!("Found isolate log {}", log.display());

        let folder = resolve_output_dir(&self.output_template, exit.pid, name, &exit.working_dir);
        fs::create_dir_all(&folder)?;

        let file_name = log
            .file_name()
            .ok_or_else(|| io::Error::other("isolate log path has no file name"))?;
        let log_path = folder.join(file_name);

        relocate_with(&log, &log_path, self.policy, |from, to| (self.mover)(from, to))?;
        info!("✓ Isolate log moved to: {}", log_path.display());

        let ticks = self.converter.convert(&log_path, executable)?;
        info!("Converted {} ticks", ticks.len());

        Ok(ProfileArtifact {
            pid: exit.pid,
            folder,
            log_path,
            inlined: exit.inlined,
            ticks,
        })
    }
}
