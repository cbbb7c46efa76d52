//! Shutdown state machine.
//!
//! ```text
//! Running ──interrupt / workload done──▶ SoftClosing ──interrupt──▶ ForceClosing
//!    │                                        │                          │
//!    └──────────terminate──────────▶ ForceClosing                         │
//!                                             └──────── exit ────────────┴──▶ Exited
//! ```
//!
//! The state only decides; the supervisor performs the returned action.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    SoftClosing,
    ForceClosing,
    Exited,
}

/// What an interrupt currently means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptMode {
    Soft,
    Force,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownAction {
    None,
    /// Report waiting and close the control channel
    SoftClose,
    /// Report and kill the child
    ForceKill,
}

#[derive(Debug)]
pub struct ShutdownState {
    phase: ShutdownPhase,
    interrupt_mode: InterruptMode,
    escalation_delay: Duration,
    escalation_deadline: Option<Instant>,
    forced: bool,
}

impl ShutdownState {
    pub fn new(escalation_delay: Duration) -> Self {
        Self {
            phase: ShutdownPhase::Running,
            interrupt_mode: InterruptMode::Soft,
            escalation_delay,
            escalation_deadline: None,
            forced: false,
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.phase
    }

    pub fn interrupt_mode(&self) -> InterruptMode {
        self.interrupt_mode
    }

    /// Whether a kill was ever requested
    pub fn was_forced(&self) -> bool {
        self.forced
    }

    pub fn escalation_pending(&self) -> bool {
        self.escalation_deadline.is_some()
    }

    /// SIGINT
    pub fn on_interrupt(&mut self, now: Instant) -> ShutdownAction {
        match self.interrupt_mode {
            InterruptMode::Soft => self.soft_close(now),
            InterruptMode::Force => self.force_close(),
        }
    }

    /// The readiness-gated workload finished before the child exited
    pub fn on_workload_complete(&mut self, now: Instant) -> ShutdownAction {
        self.soft_close(now)
    }

    /// Request a graceful stop; only the first call has an effect
    pub fn soft_close(&mut self, now: Instant) -> ShutdownAction {
        if self.phase != ShutdownPhase::Running {
            return ShutdownAction::None;
        }

        self.phase = ShutdownPhase::SoftClosing;
        self.interrupt_mode = InterruptMode::Force;
        self.escalation_deadline = Some(now + self.escalation_delay);
        ShutdownAction::SoftClose
    }

    /// Kill the child, whatever the current phase short of exit
    pub fn force_close(&mut self) -> ShutdownAction {
        if self.phase == ShutdownPhase::Exited {
            return ShutdownAction::None;
        }

        self.phase = ShutdownPhase::ForceClosing;
        self.escalation_deadline = None;
        self.forced = true;
        ShutdownAction::ForceKill
    }

    /// Fires once when the escalation timer has run out
    pub fn poll_escalation(&mut self, now: Instant) -> bool {
        match self.escalation_deadline {
            Some(deadline) if now >= deadline => {
                self.escalation_deadline = None;
                true
            }
            _ => false,
        }
    }

    /// The child's exit was observed; returns `false` if already handled
    pub fn on_exit(&mut self) -> bool {
        if self.phase == ShutdownPhase::Exited {
            return false;
        }

        self.phase = ShutdownPhase::Exited;
        self.escalation_deadline = None;
        true
    }
}
