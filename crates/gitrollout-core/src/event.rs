//! Ref change events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::refs::{ABSENT_COMMIT, CommitId, RefCategory, RefName};

/// What happened to a ref between two observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The ref did not exist before.
    Created,
    /// The ref points to a different commit.
    Moved,
    /// The ref no longer exists.
    Deleted,
}

impl ChangeKind {
    /// Lowercase name used in logs and command context.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Moved => "moved",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected change of one ref.
///
/// The constructors uphold the event invariants: Created carries only a new
/// commit, Deleted only an old one, Moved both and they differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    category: RefCategory,
    name: RefName,
    old: Option<CommitId>,
    new: Option<CommitId>,
}

impl ChangeEvent {
    /// A ref that appeared.
    pub fn created(category: RefCategory, name: RefName, new: CommitId) -> Self {
        Self {
            category,
            name,
            old: None,
            new: Some(new),
        }
    }

    /// A ref that now points elsewhere.
    ///
    /// # Panics
    ///
    /// In debug builds, if `old == new`.
    pub fn moved(category: RefCategory, name: RefName, old: CommitId, new: CommitId) -> Self {
        debug_assert_ne!(old, new, "a moved ref must change its commit");
        Self {
            category,
            name,
            old: Some(old),
            new: Some(new),
        }
    }

    /// A ref that disappeared.
    pub fn deleted(category: RefCategory, name: RefName, old: CommitId) -> Self {
        Self {
            category,
            name,
            old: Some(old),
            new: None,
        }
    }

    pub fn category(&self) -> RefCategory {
        self.category
    }

    pub fn name(&self) -> &RefName {
        &self.name
    }

    pub fn old_commit(&self) -> Option<&CommitId> {
        self.old.as_ref()
    }

    pub fn new_commit(&self) -> Option<&CommitId> {
        self.new.as_ref()
    }

    /// Classifies the event.
    pub fn kind(&self) -> ChangeKind {
        match (&self.old, &self.new) {
            (None, _) => ChangeKind::Created,
            (Some(_), Some(_)) => ChangeKind::Moved,
            (Some(_), None) => ChangeKind::Deleted,
        }
    }

    /// Old commit as rendered for commands, with the absent marker.
    pub fn old_or_absent(&self) -> &str {
        self.old.as_ref().map_or(ABSENT_COMMIT, CommitId::as_str)
    }

    /// New commit as rendered for commands, with the absent marker.
    pub fn new_or_absent(&self) -> &str {
        self.new.as_ref().map_or(ABSENT_COMMIT, CommitId::as_str)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old, &self.new) {
            (None, Some(new)) => write!(f, "{} {} created at {}", self.category, self.name, new.short()),
            (Some(old), Some(new)) => write!(
                f,
                "{} {} moved {}..{}",
                self.category,
                self.name,
                old.short(),
                new.short()
            ),
            (Some(old), None) => write!(f, "{} {} deleted (was {})", self.category, self.name, old.short()),
            (None, None) => write!(f, "{} {} unchanged", self.category, self.name),
        }
    }
}
