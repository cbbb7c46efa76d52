//! Real signal delivery.
//!
//! These tests signal their own process, so the work runs in a re-executed
//! copy of this test binary and the outer test only inspects how it ended.

use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use v8_trace_studio::supervisor::preload::Instrumentation;
use v8_trace_studio::supervisor::{Status, StatusReporter, Supervisor};

const CHILD_ENV: &str = "V8_TRACE_SIGNAL_TEST_CHILD";

fn send_to_self(signal: i32) {
    // SAFETY: plain kill(2) on our own pid
    unsafe {
        libc::kill(libc::getpid(), signal);
    }
}

/// Supervise a target that only stops when the control channel closes,
/// interrupting it with a real SIGINT once it is running
fn supervise_with_real_interrupt() {
    let (spawned_tx, spawned_rx) = mpsc::channel();
    let reporter: StatusReporter = Arc::new(move |status: &Status| {
        if let Status::Spawned { .. } = status {
            let _ = spawned_tx.send(());
        }
    });

    let interrupter = thread::spawn(move || {
        spawned_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(100));
        send_to_self(libc::SIGINT);
    });

    let exit = Supervisor::new(
        "sh",
        vec!["-c".to_string(), "cat <&7 >/dev/null; exit 0".to_string()],
    )
    .with_instrumentation(Instrumentation::none())
    .with_status(reporter)
    .run()
    .unwrap();

    interrupter.join().unwrap();
    assert_eq!(exit.code, Some(0));
}

fn run_child_scenario() {
    supervise_with_real_interrupt();
    supervise_with_real_interrupt();

    // No supervisor is active anymore: SIGTERM must end the process
    send_to_self(libc::SIGTERM);
    thread::sleep(Duration::from_secs(5));
    panic!("SIGTERM was ignored after the supervisor returned");
}

#[test]
fn test_real_signals_reach_supervisor_and_are_released() {
    if std::env::var_os(CHILD_ENV).is_some() {
        run_child_scenario();
        return;
    }

    let mut child = Command::new(std::env::current_exe().unwrap())
        .args([
            "--exact",
            "test_real_signals_reach_supervisor_and_are_released",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(CHILD_ENV, "1")
        .stdout(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("child test did not finish, a signal was not delivered");
        }
        thread::sleep(Duration::from_millis(50));
    };

    assert_eq!(
        status.signal(),
        Some(libc::SIGTERM),
        "child test ended with {:?}",
        status
    );
}
