//! Immutable snapshots of the refs of one category.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RolloutError};
use crate::event::ChangeEvent;
use crate::refs::{CommitId, RefCategory, RefName};

/// Mapping from ref name to commit id for one category, captured at one
/// observation instant.
///
/// A `RefSet` is never mutated after construction; operations that "change"
/// it return a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefSet {
    category: RefCategory,
    refs: BTreeMap<RefName, CommitId>,
}

impl RefSet {
    /// Creates an empty snapshot (the baseline after a restart).
    pub fn empty(category: RefCategory) -> Self {
        Self {
            category,
            refs: BTreeMap::new(),
        }
    }

    /// Builds a snapshot from `(name, commit)` entries.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRef` if a name occurs more than once.
    pub fn from_entries(
        category: RefCategory,
        entries: impl IntoIterator<Item = (RefName, CommitId)>,
    ) -> Result<Self> {
        let mut refs = BTreeMap::new();
        for (name, commit) in entries {
            if refs.contains_key(&name) {
                return Err(RolloutError::DuplicateRef {
                    category,
                    name: name.into(),
                });
            }
            refs.insert(name, commit);
        }
        Ok(Self { category, refs })
    }

    /// Returns the category of every ref in this set.
    pub fn category(&self) -> RefCategory {
        self.category
    }

    /// Returns the commit a ref points to.
    pub fn get(&self, name: &RefName) -> Option<&CommitId> {
        self.refs.get(name)
    }

    /// Returns true if the set contains `name`.
    pub fn contains(&self, name: &RefName) -> bool {
        self.refs.contains_key(name)
    }

    /// Number of refs.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns true if there are no refs.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Iterates refs in lexical name order.
    pub fn iter(&self) -> impl Iterator<Item = (&RefName, &CommitId)> {
        self.refs.iter()
    }

    /// Returns a snapshot keeping only refs accepted by `keep`.
    pub fn retain(&self, mut keep: impl FnMut(&RefName) -> bool) -> Self {
        Self {
            category: self.category,
            refs: self
                .refs
                .iter()
                .filter(|(name, _)| keep(name))
                .map(|(name, commit)| (name.clone(), commit.clone()))
                .collect(),
        }
    }

    /// Returns the snapshot that results from applying `events` to this one.
    ///
    /// Events of another category are ignored.
    pub fn apply(&self, events: &[ChangeEvent]) -> Self {
        let mut refs = self.refs.clone();
        for event in events.iter().filter(|e| e.category() == self.category) {
            match event.new_commit() {
                Some(commit) => {
                    refs.insert(event.name().clone(), commit.clone());
                },
                None => {
                    refs.remove(event.name());
                },
            }
        }
        Self {
            category: self.category,
            refs,
        }
    }
}
