//! Error types for gitrollout.
//!
//! Every fallible operation in the engine returns [`Result<T>`]. The variants
//! fall into four classes that decide how far a failure propagates:
//!
//! - **startup-fatal**: the process cannot run safely (`PathConflict`)
//! - **cycle-fatal**: the current cycle aborts and nothing is advanced
//!   (`RemoteUnreachable`, `RepositoryCorrupt`, `Timeout`, `CycleInProgress`)
//! - **event-fatal**: the owning category does not advance this cycle
//!   (`CheckoutFailed`)
//! - **warning**: reported, never escalated (`CommandFailed`)
//!
//! # Example
//!
//! ```
//! use gitrollout_core::RolloutError;
//!
//! let err = RolloutError::unreachable("https://example.com/repo.git", "connection refused");
//! assert!(err.is_cycle_fatal());
//! assert!(err.is_transient());
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::refs::RefCategory;

/// Main error type for mirror and rollout operations.
#[derive(Debug, Error)]
pub enum RolloutError {
    /// The remote could not be reached (network, DNS, authentication).
    #[error("remote '{remote}' unreachable: {message}")]
    RemoteUnreachable {
        /// URL of the remote
        remote: String,
        /// What the transport reported
        message: String,
    },

    /// The local mirror exists but cannot be read.
    #[error("repository at {path} is corrupt: {message}")]
    RepositoryCorrupt {
        /// Location of the mirror
        path: PathBuf,
        /// Description of the problem
        message: String,
    },

    /// The mirror path is occupied by something that is not our mirror.
    #[error("path conflict at {path}: {reason}")]
    PathConflict {
        /// The conflicting path
        path: PathBuf,
        /// Why the path cannot be used
        reason: String,
    },

    /// A working tree could not be materialized or removed.
    #[error("checkout of {category} '{name}' failed: {message}")]
    CheckoutFailed {
        /// Category of the ref
        category: RefCategory,
        /// Ref name
        name: String,
        /// Description of the failure
        message: String,
    },

    /// The configured event command did not succeed.
    #[error("command '{command}' failed: {message}")]
    CommandFailed {
        /// The program that was run
        command: String,
        /// Exit code, if the process exited normally
        exit_code: Option<i32>,
        /// Description of the failure
        message: String,
    },

    /// An operation exceeded its time limit.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// The operation that timed out
        operation: String,
        /// Limit that was exceeded
        seconds: u64,
    },

    /// Another cycle is already running against the same mirror.
    #[error("a cycle is already in progress")]
    CycleInProgress,

    /// A ref name failed validation.
    #[error("invalid ref name '{name}': {reason}")]
    InvalidRefName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// A commit id is not a full hexadecimal object id.
    #[error("invalid commit id '{0}'")]
    InvalidCommitId(String),

    /// The same ref appeared twice while building a snapshot.
    #[error("duplicate {category} '{name}' in ref set")]
    DuplicateRef {
        /// Category of the duplicated ref
        category: RefCategory,
        /// The duplicated name
        name: String,
    },

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RolloutError {
    /// Creates a RemoteUnreachable error.
    pub fn unreachable(remote: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteUnreachable {
            remote: remote.into(),
            message: message.into(),
        }
    }

    /// Creates a RepositoryCorrupt error.
    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::RepositoryCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a PathConflict error.
    pub fn path_conflict(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PathConflict {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a CheckoutFailed error.
    pub fn checkout_failed(
        category: RefCategory,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CheckoutFailed {
            category,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a CommandFailed error.
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: Option<i32>,
        message: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            message: message.into(),
        }
    }

    /// Creates a Timeout error.
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Creates an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true if this error aborts the whole cycle without advancing state.
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnreachable { .. }
                | Self::RepositoryCorrupt { .. }
                | Self::Timeout { .. }
                | Self::CycleInProgress
        )
    }

    /// Returns true if this error only blocks its own category for the cycle.
    pub fn is_event_fatal(&self) -> bool {
        matches!(self, Self::CheckoutFailed { .. })
    }

    /// Returns true if the process cannot continue at all.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, Self::PathConflict { .. } | Self::InvalidConfig(_))
    }

    /// Returns true if a later attempt may succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnreachable { .. } | Self::Timeout { .. } | Self::CycleInProgress
        )
    }
}

/// Type alias for Results with RolloutError.
pub type Result<T> = std::result::Result<T, RolloutError>;
