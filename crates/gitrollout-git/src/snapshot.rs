//! On-disk baseline snapshot.
//!
//! When enabled, the last settled ref sets survive a restart so the first
//! cycle does not replay a `Created` event for every existing ref.

use std::path::{Path, PathBuf};

use gitrollout_core::{RefCategory, RefSet, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SNAPSHOT_VERSION: u32 = 1;

/// The persisted baselines of both categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baselines {
    pub branches: RefSet,
    pub tags: RefSet,
}

impl Baselines {
    /// Empty baselines, as after a fresh start.
    pub fn empty() -> Self {
        Self {
            branches: RefSet::empty(RefCategory::Branch),
            tags: RefSet::empty(RefCategory::Tag),
        }
    }

    pub fn get(&self, category: RefCategory) -> &RefSet {
        match category {
            RefCategory::Branch => &self.branches,
            RefCategory::Tag => &self.tags,
        }
    }

    /// Replaces the baseline of the set's category.
    pub fn set(&mut self, refs: RefSet) {
        match refs.category() {
            RefCategory::Branch => self.branches = refs,
            RefCategory::Tag => self.tags = refs,
        }
    }
}

impl Default for Baselines {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    version: u32,
    remote_url: String,
    #[serde(flatten)]
    baselines: Baselines,
}

/// JSON file holding the baselines of one remote.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the baselines recorded for `remote_url`.
    ///
    /// A missing, unreadable or foreign snapshot yields `None`; the caller
    /// then starts from empty baselines.
    pub fn load(&self, remote_url: &str) -> Option<Baselines> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot at {:?}", self.path);
                return None;
            },
            Err(e) => {
                warn!("Ignoring unreadable snapshot {:?}: {}", self.path, e);
                return None;
            },
        };

        let document: SnapshotDocument = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                warn!("Ignoring malformed snapshot {:?}: {}", self.path, e);
                return None;
            },
        };

        if document.version != SNAPSHOT_VERSION {
            warn!(
                "Ignoring snapshot {:?} with unsupported version {}",
                self.path, document.version
            );
            return None;
        }
        if document.remote_url.trim_end_matches('/') != remote_url.trim_end_matches('/') {
            warn!(
                "Ignoring snapshot {:?} recorded for remote '{}'",
                self.path, document.remote_url
            );
            return None;
        }
        let baselines = document.baselines;
        if baselines.branches.category() != RefCategory::Branch
            || baselines.tags.category() != RefCategory::Tag
        {
            warn!("Ignoring snapshot {:?} with mismatched categories", self.path);
            return None;
        }

        debug!(
            "Loaded snapshot with {} branches and {} tags",
            baselines.branches.len(),
            baselines.tags.len()
        );
        Some(baselines)
    }

    /// Writes `baselines` atomically (temporary file, then rename).
    pub async fn save(&self, remote_url: &str, baselines: &Baselines) -> Result<()> {
        let document = SnapshotDocument {
            version: SNAPSHOT_VERSION,
            remote_url: remote_url.to_string(),
            baselines: baselines.clone(),
        };
        let json = serde_json::to_vec_pretty(&document).map_err(std::io::Error::other)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Saved snapshot to {:?}", self.path);
        Ok(())
    }
}
