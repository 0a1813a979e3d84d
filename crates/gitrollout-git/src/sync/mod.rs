//! Background cycle scheduling and hub state.
//!
//! This module runs hub cycles on a configurable interval, on external
//! triggers, and tracks the hub's progress for status reporting.

mod scheduler;
mod state;

pub use scheduler::{CycleObserver, CycleScheduler, CycleTrigger, SchedulerConfig, SchedulerHandle};
pub use state::{HubPhase, HubState, HubStatus};
