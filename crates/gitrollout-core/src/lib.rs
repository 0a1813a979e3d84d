//! # gitrollout core
//!
//! Domain types for mirroring a git remote and rolling out ref changes:
//!
//! - [`RefSet`]: immutable snapshot of the branches or tags of a repository
//! - [`diff`]: change detection between two snapshots, producing
//!   [`ChangeEvent`]s sorted by ref name
//! - [`TargetConfig`]: where a category is checked out and which command runs
//!   for each change
//! - [`RolloutError`]: the error taxonomy shared by every crate
//!
//! This crate performs no I/O.
//!
//! ## Example
//!
//! ```
//! use gitrollout_core::{diff, ChangeKind, CommitId, RefCategory, RefName, RefSet};
//!
//! let a = CommitId::parse("a".repeat(40))?;
//! let b = CommitId::parse("b".repeat(40))?;
//! let main = RefName::new("main")?;
//!
//! let previous = RefSet::from_entries(RefCategory::Branch, [(main.clone(), a)])?;
//! let current = RefSet::from_entries(RefCategory::Branch, [(main, b)])?;
//!
//! let events = diff(&previous, &current);
//! assert_eq!(events[0].kind(), ChangeKind::Moved);
//! # Ok::<(), gitrollout_core::RolloutError>(())
//! ```

pub mod command;
pub mod diff;
pub mod error;
pub mod event;
pub mod path;
pub mod refs;
pub mod refset;
pub mod target;

pub use command::{CommandInvocation, CommandTemplate, EventContext};
pub use diff::diff;
pub use error::{Result, RolloutError};
pub use event::{ChangeEvent, ChangeKind};
pub use path::{restore_ref_name, sanitize_ref_name};
pub use refs::{ABSENT_COMMIT, CommitId, RefCategory, RefName};
pub use refset::RefSet;
pub use target::TargetConfig;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
