//! Ref categories, ref names and commit ids.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RolloutError};

/// Marker rendered in place of an absent commit id (Created/Deleted events).
pub const ABSENT_COMMIT: &str = "0000000000000000000000000000000000000000";

/// The two kinds of refs that are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefCategory {
    /// A branch (`refs/heads/*`).
    Branch,
    /// A tag (`refs/tags/*`).
    Tag,
}

impl RefCategory {
    /// All categories, in processing order.
    pub const ALL: [RefCategory; 2] = [RefCategory::Branch, RefCategory::Tag];

    /// Singular lowercase name, used in logs and command context.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Tag => "tag",
        }
    }

    /// Plural lowercase name.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Branch => "branches",
            Self::Tag => "tags",
        }
    }

    /// The namespace refs of this category live under.
    pub fn ref_prefix(&self) -> &'static str {
        match self {
            Self::Branch => "refs/heads/",
            Self::Tag => "refs/tags/",
        }
    }

    /// Returns the full ref path for a short name.
    pub fn full_ref(&self, name: &RefName) -> String {
        format!("{}{}", self.ref_prefix(), name)
    }
}

impl fmt::Display for RefCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short name of a branch or tag (`main`, `feature/login`, `v1.2.0`).
///
/// Names are validated on construction, so a `RefName` is always safe to map
/// onto a directory below a target root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Validates and wraps a short ref name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_ref_name(&name).map_err(|reason| RolloutError::InvalidRefName {
            name: name.clone(),
            reason,
        })?;
        Ok(Self(name))
    }

    /// Strips the category prefix from a full ref path.
    ///
    /// Returns `None` when `full` does not belong to `category`.
    pub fn from_full_ref(category: RefCategory, full: &str) -> Option<Result<Self>> {
        full.strip_prefix(category.ref_prefix()).map(Self::new)
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `/`-separated components of the name.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

fn validate_ref_name(name: &str) -> std::result::Result<(), &'static str> {
    if name.is_empty() {
        return Err("reference name cannot be empty");
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err("reference name cannot start or end with '/'");
    }

    if name.contains("..") {
        return Err("reference name cannot contain '..'");
    }

    if name.contains("//") {
        return Err("reference name cannot contain '//'");
    }

    if name.ends_with(".lock") || name.ends_with('.') {
        return Err("reference name cannot end with '.lock' or '.'");
    }

    if name == "@" || name.contains("@{") {
        return Err("reference name cannot be '@' or contain '@{'");
    }

    if name.split('/').any(|component| component.starts_with('.')) {
        return Err("reference name components cannot start with '.'");
    }

    for c in name.chars() {
        if c.is_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\') {
            return Err("reference name contains invalid characters");
        }
    }

    Ok(())
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = RolloutError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for RefName {
    type Error = RolloutError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

/// Full hexadecimal object id of a commit (SHA-1 or SHA-256).
///
/// Stored lowercase so that equality is equality of the commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    /// Parses a full 40 or 64 character hex object id.
    pub fn parse(hex: impl AsRef<str>) -> Result<Self> {
        let hex = hex.as_ref().trim();
        let valid_len = hex.len() == 40 || hex.len() == 64;
        if !valid_len || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RolloutError::InvalidCommitId(hex.to_string()));
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Returns the full hex id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the abbreviated id used in log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CommitId {
    type Error = RolloutError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.0
    }
}
