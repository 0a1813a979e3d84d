//! Working tree materialization for change events.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gitrollout_core::{ChangeEvent, CommitId, Result, RolloutError, TargetConfig};
use tracing::debug;

use crate::toolkit::GitToolkit;

/// Makes the destination of a ref reflect a change event.
///
/// Each event touches only `target.destination(name)`, so events for
/// different refs can be materialized concurrently.
pub struct CheckoutManager {
    toolkit: Arc<dyn GitToolkit>,
    mirror_path: PathBuf,
    timeout: Duration,
}

impl CheckoutManager {
    /// Creates a manager checking out from the mirror at `mirror_path`.
    pub fn new(toolkit: Arc<dyn GitToolkit>, mirror_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            toolkit,
            mirror_path: mirror_path.into(),
            timeout,
        }
    }

    /// Applies `event` below `target` and returns the destination path.
    ///
    /// Created and Moved events reset the destination to exactly the new
    /// commit, discarding local changes. Deleted events remove it; deleting a
    /// destination that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutFailed` if the tree cannot be written or removed.
    pub async fn materialize(&self, target: &TargetConfig, event: &ChangeEvent) -> Result<PathBuf> {
        let destination = target.destination(event.name());

        tokio::fs::create_dir_all(target.root_path())
            .await
            .map_err(|e| failure(event, format!("cannot create {}: {}", target.root_path().display(), e)))?;

        match event.new_commit() {
            Some(commit) => self.checkout(event, commit, &destination).await?,
            None => remove(target.root_path(), event, &destination).await?,
        }

        Ok(destination)
    }

    async fn checkout(&self, event: &ChangeEvent, commit: &CommitId, destination: &Path) -> Result<()> {
        let checkout = self.toolkit.checkout_commit(
            &self.mirror_path,
            event.category(),
            event.name(),
            commit,
            destination,
        );

        match tokio::time::timeout(self.timeout, checkout).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(failure(
                    event,
                    format!("timed out after {}s", self.timeout.as_secs()),
                ));
            },
        }

        debug!(
            category = %event.category(),
            ref_name = %event.name(),
            commit = %commit.short(),
            path = %destination.display(),
            "checkout updated"
        );
        Ok(())
    }
}

async fn remove(root: &Path, event: &ChangeEvent, destination: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(destination).await {
        Ok(()) => {
            debug!(
                category = %event.category(),
                ref_name = %event.name(),
                path = %destination.display(),
                "checkout removed"
            );
            prune_empty_parents(root, destination).await;
            Ok(())
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(failure(
            event,
            format!("cannot remove {}: {}", destination.display(), e),
        )),
    }
}

/// Removes empty directories between `destination` and `root` (exclusive).
async fn prune_empty_parents(root: &Path, destination: &Path) {
    let mut current = destination.parent();

    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        // fails on non-empty directories, which ends the walk
        if tokio::fs::remove_dir(dir).await.is_err() {
            break;
        }
        current = dir.parent();
    }
}

fn failure(event: &ChangeEvent, message: String) -> RolloutError {
    RolloutError::checkout_failed(event.category(), event.name().as_str(), message)
}
