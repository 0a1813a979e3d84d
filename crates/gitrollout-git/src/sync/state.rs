//! Hub state tracking.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

/// Where the hub is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HubPhase {
    /// Waiting for the next trigger.
    Idle,
    /// Cloning or fetching the mirror.
    Fetching,
    /// Enumerating refs and computing changes.
    Diffing,
    /// Applying change events.
    Dispatching,
    /// Advancing baselines.
    Settling,
}

impl HubPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Diffing => "diffing",
            Self::Dispatching => "dispatching",
            Self::Settling => "settling",
        }
    }
}

impl fmt::Display for HubPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of [`HubState`], suitable for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HubStatus {
    pub phase: HubPhase,
    pub healthy: bool,
    pub cycles_completed: u64,
    pub failure_count: u32,
    pub last_error: Option<String>,
    pub seconds_since_success: Option<u64>,
}

/// Tracks the progress and health of the hub across cycles.
#[derive(Debug)]
pub struct HubState {
    /// The current phase.
    phase: RwLock<HubPhase>,
    /// The last time a cycle completed.
    last_success: RwLock<Option<Instant>>,
    /// The last error message, if any.
    last_error: RwLock<Option<String>>,
    /// Number of consecutive failed cycles.
    failure_count: RwLock<u32>,
    /// Number of completed cycles since startup.
    cycles_completed: RwLock<u64>,
}

impl HubState {
    /// Creates a new HubState.
    pub fn new() -> Self {
        Self {
            phase: RwLock::new(HubPhase::Idle),
            last_success: RwLock::new(None),
            last_error: RwLock::new(None),
            failure_count: RwLock::new(0),
            cycles_completed: RwLock::new(0),
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> HubPhase {
        *self.phase.read()
    }

    /// Moves to `phase`.
    pub fn set_phase(&self, phase: HubPhase) {
        *self.phase.write() = phase;
    }

    /// Returns the time the last cycle completed.
    pub fn last_success(&self) -> Option<Instant> {
        *self.last_success.read()
    }

    /// Returns the duration since the last completed cycle.
    pub fn time_since_success(&self) -> Option<Duration> {
        self.last_success.read().map(|t| t.elapsed())
    }

    /// Records a completed cycle.
    pub fn record_success(&self) {
        let mut last_success = self.last_success.write();
        let mut last_error = self.last_error.write();
        let mut failure_count = self.failure_count.write();
        let mut cycles = self.cycles_completed.write();

        *last_success = Some(Instant::now());
        *last_error = None;
        *failure_count = 0;
        *cycles += 1;
    }

    /// Records an aborted cycle.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut last_error = self.last_error.write();
        let mut failure_count = self.failure_count.write();

        *last_error = Some(error.into());
        *failure_count += 1;
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the number of consecutive failed cycles.
    pub fn failure_count(&self) -> u32 {
        *self.failure_count.read()
    }

    /// Returns the number of completed cycles.
    pub fn cycles_completed(&self) -> u64 {
        *self.cycles_completed.read()
    }

    /// Returns true once a cycle has completed and none failed since.
    pub fn is_healthy(&self) -> bool {
        self.last_success.read().is_some() && self.last_error.read().is_none()
    }

    /// Captures the current state.
    pub fn status(&self) -> HubStatus {
        HubStatus {
            phase: self.phase(),
            healthy: self.is_healthy(),
            cycles_completed: self.cycles_completed(),
            failure_count: self.failure_count(),
            last_error: self.last_error(),
            seconds_since_success: self.time_since_success().map(|d| d.as_secs()),
        }
    }
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}
