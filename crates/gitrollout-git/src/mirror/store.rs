//! Mirror lifecycle: clone, validate, fetch and enumerate refs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gitrollout_core::{RefCategory, RefSet, Result, RolloutError};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::MirrorConfig;
use crate::toolkit::GitToolkit;

/// State of the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorState {
    /// Not cloned or not yet validated.
    Missing,
    /// The initial clone is running.
    Cloning,
    /// Validated and ready to be read.
    Ready,
    /// A fetch is running.
    Fetching,
    /// The last clone or fetch failed.
    Failed(String),
}

/// Owns the local bare mirror.
///
/// The mirror directory is written only by [`ensure`](Self::ensure) and
/// [`refresh`](Self::refresh); [`current_refs`](Self::current_refs) is a pure
/// local read.
pub struct MirrorStore {
    config: MirrorConfig,
    toolkit: Arc<dyn GitToolkit>,
    state: RwLock<MirrorState>,
}

impl MirrorStore {
    /// Creates a store for the mirror described by `config`.
    pub fn new(config: MirrorConfig, toolkit: Arc<dyn GitToolkit>) -> Self {
        Self {
            config,
            toolkit,
            state: RwLock::new(MirrorState::Missing),
        }
    }

    /// Returns the current mirror state.
    pub fn state(&self) -> MirrorState {
        self.state.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Returns the local mirror path.
    pub fn path(&self) -> &Path {
        self.config.mirror_path()
    }

    fn set_state(&self, state: MirrorState) {
        *self.state.write() = state;
    }

    /// Makes sure a valid mirror of the configured remote exists.
    ///
    /// Clones the remote if the mirror path is missing or an empty directory.
    ///
    /// # Errors
    ///
    /// - `RemoteUnreachable` or `Timeout` if the clone cannot complete
    /// - `PathConflict` if the path holds something other than a mirror of
    ///   the configured remote
    pub async fn ensure(&self) -> Result<()> {
        let path = self.path();

        if !tokio::fs::try_exists(path).await? || is_empty_dir(path).await? {
            return self.clone_mirror().await;
        }

        if self.state() == MirrorState::Ready {
            debug!("Mirror already validated at {:?}", path);
            return Ok(());
        }

        self.validate().await
    }

    async fn clone_mirror(&self) -> Result<()> {
        self.set_state(MirrorState::Cloning);

        let url = self.config.remote_url();
        let path = self.path();
        let limit = self.config.clone_timeout();

        info!("Cloning mirror of {} into {:?}", url, path);

        let result = bounded(limit, "mirror clone", self.toolkit.clone_mirror(url, path)).await;

        match result {
            Ok(()) => {
                self.set_state(MirrorState::Ready);
                info!("Mirror cloned successfully");
                Ok(())
            },
            Err(e) => {
                self.remove_partial_clone().await;
                self.set_state(MirrorState::Failed(e.to_string()));
                Err(e)
            },
        }
    }

    async fn remove_partial_clone(&self) {
        let path = self.path();
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => debug!("Removed partial mirror at {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!("Failed to remove partial mirror at {:?}: {}", path, e),
        }
    }

    async fn validate(&self) -> Result<()> {
        let path = self.path();

        let conflict = match self.toolkit.mirror_remote(path).await {
            Ok(Some(url)) if self.config.same_remote(&url) => None,
            Ok(Some(url)) => Some(format!(
                "mirror of '{}', expected '{}'",
                url,
                self.config.remote_url()
            )),
            Ok(None) => Some("repository has no 'origin' remote".to_string()),
            Err(RolloutError::RepositoryCorrupt { message, .. }) => {
                Some(format!("not a bare mirror: {}", message))
            },
            Err(e) => return Err(e),
        };

        match conflict {
            None => {
                self.set_state(MirrorState::Ready);
                debug!("Validated existing mirror at {:?}", path);
                Ok(())
            },
            Some(reason) => {
                self.set_state(MirrorState::Failed(reason.clone()));
                Err(RolloutError::path_conflict(path, reason))
            },
        }
    }

    /// Fetches every ref from the remote, pruning refs deleted upstream.
    ///
    /// Failures are returned as-is; retrying is up to the caller.
    pub async fn refresh(&self) -> Result<()> {
        self.set_state(MirrorState::Fetching);

        let limit = self.config.fetch_timeout();
        debug!("Fetching updates for mirror at {:?}", self.path());

        let result = bounded(limit, "fetch", self.toolkit.fetch_all(self.path())).await;

        match &result {
            Ok(()) => {
                self.set_state(MirrorState::Ready);
                debug!("Mirror fetched successfully");
            },
            Err(e) => {
                self.set_state(MirrorState::Failed(e.to_string()));
                warn!("Fetch failed: {}", e);
            },
        }

        result
    }

    /// Enumerates every ref of `category` with its commit id.
    ///
    /// Never contacts the network and never writes to the mirror.
    pub async fn current_refs(&self, category: RefCategory) -> Result<RefSet> {
        let entries = self.toolkit.list_refs(self.path(), category).await?;
        let refs = RefSet::from_entries(category, entries)?;

        debug!("Mirror has {} {}", refs.len(), category.plural());
        Ok(refs)
    }
}

async fn is_empty_dir(path: &Path) -> Result<bool> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_dir() {
        return Ok(false);
    }
    let mut entries = tokio::fs::read_dir(path).await?;
    Ok(entries.next_entry().await?.is_none())
}

async fn bounded<F>(limit: Duration, operation: &str, future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(RolloutError::timeout(operation, limit.as_secs())),
    }
}
