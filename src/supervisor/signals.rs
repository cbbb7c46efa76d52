//! SIGINT / SIGTERM delivery into the supervisor's event loop.
//!
//! signal-hook never puts back `SIG_DFL` once a handler has been
//! registered. The first install therefore also registers a conditional
//! default action, armed whenever no guard is installed, so the process
//! reacts to SIGINT and SIGTERM normally between supervised runs.

use super::SupervisorEvent;
use log::debug;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use signal_hook::iterator::{Handle, Signals};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

const FORWARDED: [i32; 2] = [SIGINT, SIGTERM];

/// Default-action fallback shared by every guard in the process
struct DefaultFallback {
    /// True while no guard is installed
    idle: Arc<AtomicBool>,
    active: usize,
}

static FALLBACK: Mutex<Option<DefaultFallback>> = Mutex::new(None);

/// Disarm the default action for the lifetime of one guard
fn enter_guarded() -> io::Result<()> {
    let mut slot = FALLBACK
        .lock()
        .map_err(|_| io::Error::other("signal fallback poisoned"))?;

    let fallback = match slot.as_mut() {
        Some(fallback) => fallback,
        None => {
            let idle = Arc::new(AtomicBool::new(true));
            for signal in FORWARDED {
                flag::register_conditional_default(signal, Arc::clone(&idle))?;
            }
            slot.insert(DefaultFallback { idle, active: 0 })
        }
    };

    fallback.active += 1;
    fallback.idle.store(false, Ordering::SeqCst);
    Ok(())
}

/// Re-arm the default action once the last guard is gone
fn leave_guarded() {
    let Ok(mut slot) = FALLBACK.lock() else {
        return;
    };
    if let Some(fallback) = slot.as_mut() {
        fallback.active = fallback.active.saturating_sub(1);
        if fallback.active == 0 {
            fallback.idle.store(true, Ordering::SeqCst);
        }
    }
}

/// Registration of the supervisor's signal handlers
///
/// `install` and `uninstall` are paired; `uninstall` is idempotent and also
/// runs on drop, so every exit path releases the registration and restores
/// the default action.
pub struct SignalGuard {
    handle: Option<Handle>,
    thread: Option<JoinHandle<()>>,
}

impl SignalGuard {
    /// Register for SIGINT and SIGTERM and forward them as events
    pub fn install(events: Sender<SupervisorEvent>) -> io::Result<Self> {
        enter_guarded()?;

        let spawned = Signals::new(FORWARDED).and_then(|mut signals| {
            let handle = signals.handle();
            let thread = thread::Builder::new()
                .name("v8-trace-signals".to_string())
                .spawn(move || {
                    for signal in signals.forever() {
                        let event = match signal {
                            SIGINT => SupervisorEvent::Interrupt,
                            SIGTERM => SupervisorEvent::Terminate,
                            _ => continue,
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                });
            match thread {
                Ok(thread) => Ok((handle, thread)),
                Err(e) => {
                    handle.close();
                    Err(e)
                }
            }
        });

        match spawned {
            Ok((handle, thread)) => {
                debug!("Signal handlers installed");
                Ok(Self {
                    handle: Some(handle),
                    thread: Some(thread),
                })
            }
            Err(e) => {
                leave_guarded();
                Err(e)
            }
        }
    }

    pub fn is_installed(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop forwarding, release the registration, restore the default action
    pub fn uninstall(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        leave_guarded();
        debug!("Signal handlers uninstalled");
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.uninstall();
    }
}
