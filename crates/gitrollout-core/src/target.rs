//! Checkout targets: where refs of one category are materialized.

use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::command::CommandTemplate;
use crate::error::{Result, RolloutError};
use crate::path::sanitize_ref_name;
use crate::refs::RefName;
use crate::refset::RefSet;

/// Destination root, optional event command and ref filters for one category.
///
/// Built once at startup and immutable afterwards. A category without a
/// `TargetConfig` is not tracked at all.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    root_path: PathBuf,
    event_command: Option<CommandTemplate>,
    filters: Vec<Pattern>,
}

impl TargetConfig {
    /// Creates a target that checks out every ref below `root_path`.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            event_command: None,
            filters: Vec::new(),
        }
    }

    /// Sets the command run after each successful checkout update.
    pub fn with_command(mut self, command: CommandTemplate) -> Self {
        self.event_command = Some(command);
        self
    }

    /// Restricts tracking to refs matching `pattern` (glob syntax).
    ///
    /// May be called several times; a ref is tracked if any pattern matches.
    pub fn with_filter(mut self, pattern: &str) -> Result<Self> {
        let compiled = Pattern::new(pattern).map_err(|e| {
            RolloutError::invalid_config(format!("invalid ref filter '{pattern}': {e}"))
        })?;
        self.filters.push(compiled);
        Ok(self)
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn event_command(&self) -> Option<&CommandTemplate> {
        self.event_command.as_ref()
    }

    /// Returns the configured filter patterns.
    pub fn filters(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(Pattern::as_str)
    }

    /// Returns true if `name` is tracked by this target.
    pub fn tracks(&self, name: &RefName) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|p| p.matches(name.as_str()))
    }

    /// Keeps only the tracked refs of a snapshot.
    pub fn select(&self, refs: &RefSet) -> RefSet {
        if self.filters.is_empty() {
            return refs.clone();
        }
        refs.retain(|name| self.tracks(name))
    }

    /// Directory a ref is checked out into.
    pub fn destination(&self, name: &RefName) -> PathBuf {
        self.root_path.join(sanitize_ref_name(name))
    }

    /// Returns true if the two targets' roots overlap (one contains the other).
    pub fn overlaps(&self, other: &TargetConfig) -> bool {
        self.root_path.starts_with(&other.root_path) || other.root_path.starts_with(&self.root_path)
    }
}
