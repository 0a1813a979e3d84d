//! The version-control toolkit the engine delegates git mechanics to.
//!
//! The engine never speaks a git transport itself. Everything that touches
//! objects or refs on disk goes through [`GitToolkit`], which keeps the
//! mirror, checkout and hub logic testable against an in-memory fake.

mod system;

use std::path::Path;

use async_trait::async_trait;
use gitrollout_core::{CommitId, RefCategory, RefName, Result};

pub use system::{SystemGit, classify_remote_failure};

/// Git operations required by the mirror/rollout engine.
///
/// Implementations report failures with the engine's taxonomy:
/// `RemoteUnreachable` for transport problems, `RepositoryCorrupt` for an
/// unreadable local repository and `CheckoutFailed` for working tree
/// updates. Timeouts are enforced by the callers.
#[async_trait]
pub trait GitToolkit: Send + Sync {
    /// Creates a bare mirror clone of `url` at `path`.
    async fn clone_mirror(&self, url: &str, path: &Path) -> Result<()>;

    /// Fetches every ref of the mirror's remote, pruning refs deleted upstream.
    async fn fetch_all(&self, path: &Path) -> Result<()>;

    /// Returns the fetch URL of the mirror's `origin` remote.
    ///
    /// `Ok(None)` means the repository is readable but has no such remote;
    /// `RepositoryCorrupt` means `path` is not a readable bare repository.
    async fn mirror_remote(&self, path: &Path) -> Result<Option<String>>;

    /// Lists the refs of one category with their peeled commit ids.
    ///
    /// Never touches the network and never mutates the repository.
    async fn list_refs(&self, path: &Path, category: RefCategory) -> Result<Vec<(RefName, CommitId)>>;

    /// Makes `dest` a working tree of exactly `commit` taken from the mirror,
    /// discarding any local modifications.
    async fn checkout_commit(
        &self,
        mirror: &Path,
        category: RefCategory,
        name: &RefName,
        commit: &CommitId,
        dest: &Path,
    ) -> Result<()>;
}
