//! Extra file descriptors handed to the target process.
//!
//! Besides stdio the child gets five descriptors:
//!
//! | fd | purpose |
//! |----|---------|
//! | 3  | application stdout (written by the redirect module) |
//! | 4  | reserved, `/dev/null` |
//! | 5  | readiness channel (bound port announcements) |
//! | 6  | reserved, `/dev/null` |
//! | 7  | control channel, closed by the supervisor for a graceful stop |

use crate::utils::config::{APP_STDOUT_FD, CONTROL_FD, READINESS_FD, RESERVED_FD_A, RESERVED_FD_B};
use log::debug;
use os_pipe::{PipeReader, PipeWriter};
use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::Command;

/// Descriptors at or above this value are free for staging in the child
const STAGING_FD_FLOOR: RawFd = 64;

/// Child-side ends, only alive between `open` and `close_child_ends`
struct ChildEnds {
    app_stdout: PipeWriter,
    reserved_a: File,
    readiness: PipeWriter,
    reserved_b: File,
    control: PipeReader,
}

impl ChildEnds {
    fn mapping(&self) -> [(RawFd, RawFd); 5] {
        [
            (self.app_stdout.as_raw_fd(), APP_STDOUT_FD),
            (self.reserved_a.as_raw_fd(), RESERVED_FD_A),
            (self.readiness.as_raw_fd(), READINESS_FD),
            (self.reserved_b.as_raw_fd(), RESERVED_FD_B),
            (self.control.as_raw_fd(), CONTROL_FD),
        ]
    }
}

/// Parent-side ends of the extra channels
pub struct ChildChannels {
    /// Application stdout, forwarded verbatim
    pub app_stdout: Option<PipeReader>,

    /// Port announcements from the detection module
    pub readiness: Option<PipeReader>,

    control: Option<PipeWriter>,
    child_ends: Option<ChildEnds>,
}

impl ChildChannels {
    /// Create all pipes
    ///
    /// os_pipe opens every end close-on-exec, so only the descriptors
    /// installed by `attach` survive into the child.
    pub fn open() -> io::Result<Self> {
        let (app_stdout, app_stdout_child) = os_pipe::pipe()?;
        let (readiness, readiness_child) = os_pipe::pipe()?;
        let (control_child, control) = os_pipe::pipe()?;

        Ok(Self {
            app_stdout: Some(app_stdout),
            readiness: Some(readiness),
            control: Some(control),
            child_ends: Some(ChildEnds {
                app_stdout: app_stdout_child,
                reserved_a: File::open("/dev/null")?,
                readiness: readiness_child,
                reserved_b: File::open("/dev/null")?,
                control: control_child,
            }),
        })
    }

    /// Install the child ends at their fixed numbers in the spawned process
    ///
    /// Sources are first duplicated above `STAGING_FD_FLOOR` so that a source
    /// already sitting on one of the target numbers cannot be clobbered.
    pub fn attach(&self, command: &mut Command) -> io::Result<()> {
        let mapping = self
            .child_ends
            .as_ref()
            .ok_or_else(|| io::Error::other("child channel ends already closed"))?
            .mapping();

        // SAFETY: the closure only calls fcntl, dup2 and close, which are
        // async-signal-safe, and does not allocate.
        unsafe {
            command.pre_exec(move || {
                let mut staged: [RawFd; 5] = [-1; 5];
                for (slot, (source, _)) in staged.iter_mut().zip(mapping.iter()) {
                    let fd = libc::fcntl(*source, libc::F_DUPFD, STAGING_FD_FLOOR);
                    if fd < 0 {
                        return Err(io::Error::last_os_error());
                    }
                    *slot = fd;
                }
                for (staged_fd, (_, target)) in staged.iter().zip(mapping.iter()) {
                    if libc::dup2(*staged_fd, *target) < 0 {
                        return Err(io::Error::last_os_error());
                    }
                    libc::close(*staged_fd);
                }
                Ok(())
            });
        }

        Ok(())
    }

    /// Drop the parent's copies of the child ends
    ///
    /// Must run right after spawning, otherwise the readers never see EOF.
    pub fn close_child_ends(&mut self) {
        if self.child_ends.take().is_some() {
            debug!("Closed parent copies of child channel ends");
        }
    }

    /// Close the control channel
    ///
    /// Returns `false` when it was already closed.
    pub fn close_control(&mut self) -> bool {
        self.control.take().is_some()
    }

    pub fn control_open(&self) -> bool {
        self.control.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_close_control_is_idempotent() {
        let mut channels = ChildChannels::open().unwrap();
        assert!(channels.control_open());
        assert!(channels.close_control());
        assert!(!channels.close_control());
        assert!(!channels.control_open());
    }

    #[test]
    fn test_child_writes_reach_app_stdout() {
        let mut channels = ChildChannels::open().unwrap();
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo redirected >&3");
        channels.attach(&mut command).unwrap();

        let mut child = command.spawn().unwrap();
        channels.close_child_ends();

        let mut out = String::new();
        channels
            .app_stdout
            .take()
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        child.wait().unwrap();

        assert_eq!(out, "redirected\n");
    }
}
