//! Lifecycle supervision of the profiled process.
//!
//! The supervisor:
//! 1. Spawns the target with profiling flags and preload modules
//! 2. Feeds the child's stdout through the optimizer trace parser
//! 3. Forwards application output
//! 4. Runs the two-stage shutdown protocol on signals or readiness
//! 5. Resolves only once the child's real exit was observed

pub mod channels;
pub mod preload;
pub mod readiness;
pub mod signals;
pub mod state;

use crate::parser::{pump_stream, InliningRecord, TraceParser};
use crate::utils::config::{ESCALATION_DELAY, EXIT_POLL_INTERVAL, OUTPUT_DRAIN_TIMEOUT};
use crate::utils::error::{ReadinessError, SupervisorError};
use channels::ChildChannels;
use log::{debug, error, info, warn};
use preload::{Instrumentation, PreloadBundle};
use readiness::ReadinessAction;
use signals::SignalGuard;
use state::{ShutdownAction, ShutdownState};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Input to the supervisor's event loop
#[derive(Debug)]
pub enum SupervisorEvent {
    /// SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Outcome of the readiness action
    ReadinessFinished(Result<(), ReadinessError>),
}

/// Progress reported to the caller while supervising
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Spawned { pid: u32 },
    PortBound { port: u16 },
    WaitingForExit,
    MayHaveHung,
    ForceClosing,
    Exited { code: Option<i32> },
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Spawned { pid } => write!(f, "Profiling process {}", pid),
            Status::PortBound { port } => write!(f, "Target is listening on port {}", port),
            Status::WaitingForExit => write!(f, "Waiting for subprocess to exit..."),
            Status::MayHaveHung => write!(
                f,
                "Subprocess has not exited yet and may have hung, press Ctrl+C again to force close"
            ),
            Status::ForceClosing => write!(f, "Force closing subprocess"),
            Status::Exited { code: Some(code) } => write!(f, "Process exited with code {}", code),
            Status::Exited { code: None } => write!(f, "Process terminated by signal"),
        }
    }
}

/// Callback receiving status updates, may be called from helper threads
pub type StatusReporter = Arc<dyn Fn(&Status) + Send + Sync>;

/// Destination for forwarded program output
pub type OutputSink = Arc<Mutex<dyn Write + Send>>;

/// Reporter that logs every status
pub fn log_status() -> StatusReporter {
    Arc::new(|status: &Status| match status {
        Status::MayHaveHung => warn!("{}", status),
        _ => info!("{}", status),
    })
}

/// What the finalizer needs from a finished run
#[derive(Debug, Clone)]
pub struct SupervisedExit {
    pub pid: u32,
    pub working_dir: PathBuf,
    pub code: Option<i32>,
    pub inlined: InliningRecord,
}

/// Supervisor for one run of the target
///
/// **Public** - built by the profile command, consumed by `run`
pub struct Supervisor {
    executable: PathBuf,
    args: Vec<String>,
    working_dir: PathBuf,
    instrumentation: Instrumentation,
    on_port: Option<ReadinessAction>,
    status: StatusReporter,
    output: OutputSink,
    handle_signals: bool,
    escalation_delay: Duration,
    drain_timeout: Duration,
    events_tx: Sender<SupervisorEvent>,
    events_rx: Receiver<SupervisorEvent>,
}

impl Supervisor {
    pub fn new(executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            executable: executable.into(),
            args,
            working_dir: PathBuf::from("."),
            instrumentation: Instrumentation::node(),
            on_port: None,
            status: log_status(),
            output: Arc::new(Mutex::new(io::stdout())),
            handle_signals: true,
            escalation_delay: ESCALATION_DELAY,
            drain_timeout: OUTPUT_DRAIN_TIMEOUT,
            events_tx,
            events_rx,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_instrumentation(mut self, instrumentation: Instrumentation) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    /// Enable readiness-gated mode
    pub fn on_port(mut self, action: ReadinessAction) -> Self {
        self.on_port = Some(action);
        self
    }

    pub fn with_status(mut self, status: StatusReporter) -> Self {
        self.status = status;
        self
    }

    pub fn with_output(mut self, output: OutputSink) -> Self {
        self.output = output;
        self
    }

    /// Whether to register SIGINT/SIGTERM handlers (on by default)
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    pub fn with_escalation_delay(mut self, delay: Duration) -> Self {
        self.escalation_delay = delay;
        self
    }

    /// Upper bound on draining output after the target exited
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Sender feeding the event loop, same path the signal handlers use
    pub fn event_sender(&self) -> Sender<SupervisorEvent> {
        self.events_tx.clone()
    }

    /// Spawn the target and supervise it until it exits
    ///
    /// # Returns
    /// Exit metadata and the inlining associations parsed from stdout
    ///
    /// # Errors
    /// * `SupervisorError::TargetProcess` - non-zero exit, or a signal the
    ///   supervisor did not send
    /// * `SupervisorError::Readiness` - the on-port action failed; the child
    ///   has been killed and its exit observed
    /// * `SupervisorError::Spawn` / `Preload` / `Signals` / `Io` - setup failures
    pub fn run(mut self) -> Result<SupervisedExit, SupervisorError> {
        let port_mode = self.on_port.is_some();

        let preload = match self.instrumentation {
            Instrumentation::Node => {
                Some(PreloadBundle::materialize(port_mode).map_err(SupervisorError::Preload)?)
            }
            Instrumentation::None => None,
        };

        let mut channels = ChildChannels::open()?;
        let mut command = Command::new(&self.executable);
        if let Some(bundle) = &preload {
            command.args(bundle.flags());
        }
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        channels.attach(&mut command)?;

        let mut signals = if self.handle_signals {
            Some(SignalGuard::install(self.events_tx.clone()).map_err(SupervisorError::Signals)?)
        } else {
            None
        };

        debug!("Spawning {:?}", command);
        let mut child = RunningChild::new(command.spawn().map_err(SupervisorError::Spawn)?);
        channels.close_child_ends();

        let pid = child.id();
        (self.status)(&Status::Spawned { pid });

        let stdout = child
            .take_stdout()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
        let trace = Arc::new(Mutex::new(TraceParser::new()));
        let parser = self.spawn_parser(stdout, trace.clone())?;
        let forwarder = match channels.app_stdout.take() {
            Some(reader) => Some(self.spawn_forwarder(reader)?),
            None => None,
        };

        if let Some(action) = self.on_port.take() {
            if let Some(reader) = channels.readiness.take() {
                // Detached: the action may still be running when the target exits
                let _watcher = readiness::spawn_watcher(
                    reader,
                    action,
                    self.events_tx.clone(),
                    self.status.clone(),
                )?;
            }
        }

        let mut state = ShutdownState::new(self.escalation_delay);
        let mut readiness_error = None;

        let exit_status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }

            if state.poll_escalation(Instant::now()) {
                (self.status)(&Status::MayHaveHung);
            }

            let action = match self.events_rx.recv_timeout(EXIT_POLL_INTERVAL) {
                Ok(SupervisorEvent::Interrupt) => state.on_interrupt(Instant::now()),
                Ok(SupervisorEvent::Terminate) => state.force_close(),
                Ok(SupervisorEvent::ReadinessFinished(result)) => {
                    // The target may have exited while the action ran
                    if let Some(status) = child.try_wait()? {
                        debug!("Target exited before the readiness action finished, ignoring its outcome");
                        break status;
                    }
                    match result {
                        Ok(()) => {
                            debug!("Readiness workload finished before exit, closing target");
                            state.on_workload_complete(Instant::now())
                        }
                        Err(e) => {
                            error!("Readiness action failed: {}", e);
                            readiness_error = Some(e);
                            state.force_close()
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    ShutdownAction::None
                }
            };

            self.apply(action, &mut channels, &mut child)?;
        };

        state.on_exit();
        if let Some(guard) = signals.as_mut() {
            guard.uninstall();
        }
        (self.status)(&Status::Exited {
            code: exit_status.code(),
        });

        let drain_deadline = Instant::now() + self.drain_timeout;
        drain_worker(parser, "trace parser", drain_deadline)?;
        if let Some(forwarder) = forwarder {
            if let Err(e) = drain_worker(forwarder, "stdout forwarder", drain_deadline) {
                warn!("Application output forwarding failed: {}", e);
            }
        }
        let inlined = trace
            .lock()
            .map_err(|_| io::Error::other("trace parser poisoned"))?
            .inlined()
            .clone();

        if let Some(e) = readiness_error {
            return Err(SupervisorError::Readiness(e));
        }
        check_exit(exit_status, state.was_forced())?;

        info!("Trace collected {} inlining targets", inlined.len());

        Ok(SupervisedExit {
            pid,
            working_dir: self.working_dir,
            code: exit_status.code(),
            inlined,
        })
    }

    fn apply(
        &self,
        action: ShutdownAction,
        channels: &mut ChildChannels,
        child: &mut RunningChild,
    ) -> io::Result<()> {
        match action {
            ShutdownAction::None => {}
            ShutdownAction::SoftClose => {
                (self.status)(&Status::WaitingForExit);
                if !channels.close_control() {
                    debug!("Control channel already closed");
                }
            }
            ShutdownAction::ForceKill => {
                (self.status)(&Status::ForceClosing);
                child.kill()?;
            }
        }
        Ok(())
    }

    fn spawn_parser(
        &self,
        stdout: ChildStdout,
        trace: Arc<Mutex<TraceParser>>,
    ) -> io::Result<JoinHandle<io::Result<()>>> {
        let sink = SharedSink(self.output.clone());
        thread::Builder::new()
            .name("v8-trace-parser".to_string())
            .spawn(move || pump_stream(stdout, sink, &trace))
    }

    fn spawn_forwarder(&self, mut reader: os_pipe::PipeReader) -> io::Result<JoinHandle<io::Result<()>>> {
        let mut sink = SharedSink(self.output.clone());
        thread::Builder::new()
            .name("v8-trace-stdout".to_string())
            .spawn(move || io::copy(&mut reader, &mut sink).map(|_| ()))
    }
}

/// Map the observed exit status to the run's result
///
/// A signal death is only accepted when the supervisor asked for it.
fn check_exit(status: ExitStatus, forced: bool) -> Result<(), SupervisorError> {
    match status.code() {
        Some(0) => Ok(()),
        None if forced => {
            debug!("Target terminated after forced close");
            Ok(())
        }
        code => Err(SupervisorError::TargetProcess { code }),
    }
}

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Join an output worker, giving up at `deadline`
///
/// A descendant of the target that inherited its stdout keeps the pipe
/// open after the target itself is gone. Past the deadline the worker is
/// left detached and whatever it collected so far is used.
fn drain_worker(handle: JoinHandle<io::Result<()>>, name: &str, deadline: Instant) -> io::Result<()> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(
                "{} still open after the target exited (held by a descendant?), later output is dropped",
                name
            );
            return Ok(());
        }
        thread::sleep(DRAIN_POLL_INTERVAL);
    }

    handle
        .join()
        .map_err(|_| io::Error::other(format!("{} thread panicked", name)))?
}

/// Owns the child; kills and reaps it if dropped before exit was observed
struct RunningChild {
    child: Child,
    reaped: bool,
}

impl RunningChild {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn id(&self) -> u32 {
        self.child.id()
    }

    fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.reaped {
            return Ok(());
        }
        self.child.kill()
    }
}

impl Drop for RunningChild {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        warn!("Supervisor torn down before exit, killing process {}", self.child.id());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// `Write` adapter over the shared sink; one lock per `write_all`
struct SharedSink(OutputSink);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("output sink poisoned"))?
            .write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("output sink poisoned"))?
            .write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("output sink poisoned"))?
            .flush()
    }
}
