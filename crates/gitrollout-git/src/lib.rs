//! # gitrollout engine
//!
//! Keeps a bare mirror of a remote repository current and rolls out ref
//! changes: each cycle fetches the mirror, diffs branches and tags against
//! the last settled baseline, updates one checkout per changed ref and runs
//! the configured event command.
//!
//! ## Features
//!
//! - Git mechanics behind the [`GitToolkit`] trait, with a system `git` plus
//!   gix implementation
//! - Bounded-concurrency dispatch, joined before baselines advance
//! - At-least-once change events: a failed checkout is retried next cycle
//! - Optional baseline snapshot across restarts
//! - Background scheduler with coalesced triggers and failure backoff
//!
//! ## Example
//!
//! ```ignore
//! use gitrollout_git::{CycleScheduler, MirrorConfig, MirrorHub, SchedulerConfig};
//! use gitrollout_core::TargetConfig;
//!
//! let mirror = MirrorConfig::builder()
//!     .remote_url("https://github.com/org/app.git")
//!     .mirror_path("/var/lib/gitrollout/app.git")
//!     .build()?;
//!
//! let hub = MirrorHub::builder(mirror)
//!     .branches(TargetConfig::new("/srv/app/branches"))
//!     .build()?;
//!
//! hub.ensure().await?;
//! let handle = CycleScheduler::new(Arc::new(hub), SchedulerConfig::default()).start();
//! ```

pub mod checkout;
pub mod dispatch;
pub mod hub;
pub mod mirror;
pub mod process;
pub mod snapshot;
pub mod sync;
pub mod toolkit;

// Re-exports
pub use checkout::CheckoutManager;
pub use dispatch::{CategoryOutcome, Dispatcher, EventOutcome, EventStatus};
pub use hub::{CategoryReport, CycleReport, MirrorHub, MirrorHubBuilder};
pub use mirror::{MirrorConfig, MirrorConfigBuilder, MirrorState, MirrorStore};
pub use process::{CommandOutcome, CommandRunner, ProcessRunner};
pub use snapshot::{Baselines, SnapshotFile};
pub use sync::{
    CycleObserver, CycleScheduler, CycleTrigger, HubPhase, HubState, HubStatus, SchedulerConfig,
    SchedulerHandle,
};
pub use toolkit::{GitToolkit, SystemGit};

// Re-export gitrollout_core for consumers
pub use gitrollout_core;
