//! Readiness-gated mode: react once the target binds a port.

use super::{Status, StatusReporter, SupervisorEvent};
use crate::utils::error::ReadinessError;
use log::{debug, info};
use os_pipe::PipeReader;
use std::io::{self, BufRead, BufReader};
use std::process::Command;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

/// Work to run against the bound port, e.g. a load generator
///
/// Finishing successfully lets the supervisor close the target gracefully.
pub type ReadinessAction = Box<dyn FnOnce(u16) -> Result<(), ReadinessError> + Send>;

/// Parse a port announcement line
pub fn parse_port(line: &str) -> Result<u16, ReadinessError> {
    let trimmed = line.trim();
    trimmed
        .parse::<u16>()
        .map_err(|_| ReadinessError::InvalidPort(trimmed.to_string()))
}

/// Build an action that runs a shell command
///
/// `$PORT` in the command is replaced with the bound port, which is also
/// exported as the `PORT` environment variable.
pub fn shell_action(command: impl Into<String>) -> ReadinessAction {
    let command = command.into();
    Box::new(move |port| {
        let expanded = command.replace("$PORT", &port.to_string());
        info!("Running on-port command: {}", expanded);

        let status = Command::new("sh")
            .arg("-c")
            .arg(&expanded)
            .env("PORT", port.to_string())
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(ReadinessError::CommandFailed {
                code: status.code(),
            })
        }
    })
}

/// Wait for a port announcement, run the action, report its outcome
///
/// **Public** - spawned by the supervisor in readiness-gated mode
///
/// The thread sends at most one `ReadinessFinished` event. If the channel
/// closes without an announcement (the target exited first) nothing is sent.
pub fn spawn_watcher(
    reader: PipeReader,
    action: ReadinessAction,
    events: Sender<SupervisorEvent>,
    status: StatusReporter,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("v8-trace-readiness".to_string())
        .spawn(move || {
            let mut line = String::new();
            let result = match BufReader::new(reader).read_line(&mut line) {
                Ok(0) => {
                    debug!("Readiness channel closed before a port was announced");
                    return;
                }
                Ok(_) => parse_port(&line).and_then(|port| {
                    status(&Status::PortBound { port });
                    action(port)
                }),
                Err(e) => Err(e.into()),
            };
            let _ = events.send(SupervisorEvent::ReadinessFinished(result));
        })
}
