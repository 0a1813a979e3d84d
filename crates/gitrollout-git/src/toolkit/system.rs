//! [`GitToolkit`] backed by the system `git` binary and gix.
//!
//! Clone, fetch and checkout shell out to `git` through
//! [`tokio::process::Command`]; every child is killed when its future is
//! dropped, so callers can bound them with `tokio::time::timeout`. Read-only
//! queries (ref listing, mirror validation) open the repository in-process
//! with gix on the blocking pool.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use gitrollout_core::{CommitId, RefCategory, RefName, Result, RolloutError};
use gix::bstr::ByteSlice;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::GitToolkit;

/// stderr fragments that point at the local repository rather than the remote.
const LOCAL_FAILURE_MARKERS: [&str; 6] = [
    "not a git repository",
    "corrupt",
    "bad object",
    "missing object",
    "object file",
    "bad config",
];

/// Git toolkit using the `git` CLI for mutations and gix for reads.
#[derive(Debug, Clone)]
pub struct SystemGit {
    binary: String,
}

impl SystemGit {
    /// Creates a toolkit running `binary` (usually `"git"`).
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Runs a prepared git command, returning stdout or a message with stderr.
    async fn run(&self, mut cmd: Command, what: &str) -> std::result::Result<Vec<u8>, String> {
        debug!("spawning git {}", what);

        let output = cmd
            .output()
            .await
            .map_err(|e| format!("failed to spawn {} {}: {}", self.binary, what, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "git {} failed ({}): {}",
                what,
                output.status,
                stderr.trim()
            ));
        }

        Ok(output.stdout)
    }

    async fn is_worktree(dest: &Path) -> bool {
        tokio::fs::metadata(dest.join(".git"))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Replaces `dest` with a fresh clone that borrows objects from the mirror.
    async fn recreate(&self, mirror: &Path, dest: &Path) -> std::result::Result<(), String> {
        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(dest)
                .await
                .map_err(|e| format!("failed to remove {}: {}", dest.display(), e))?;
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }

        let mut cmd = self.command();
        cmd.arg("clone")
            .arg("--shared")
            .arg("--no-checkout")
            .arg("--quiet")
            .arg(mirror)
            .arg(dest);
        self.run(cmd, "clone --shared").await.map(|_| ())
    }

    /// Points the working tree at `commit` and drops everything else.
    async fn reset_worktree(&self, dest: &Path, commit: &CommitId) -> std::result::Result<(), String> {
        let mut checkout = self.command();
        checkout
            .arg("-C")
            .arg(dest)
            .arg("-c")
            .arg("advice.detachedHead=false")
            .arg("checkout")
            .arg("--force")
            .arg("--quiet")
            .arg("--detach")
            .arg(commit.as_str());
        self.run(checkout, "checkout").await?;

        let mut clean = self.command();
        clean.arg("-C").arg(dest).arg("clean").arg("-ffdxq");
        self.run(clean, "clean").await.map(|_| ())
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new("git")
    }
}

/// Maps a failed clone or fetch onto `RepositoryCorrupt` or `RemoteUnreachable`.
pub fn classify_remote_failure(remote: &str, mirror: &Path, message: String) -> RolloutError {
    let lower = message.to_ascii_lowercase();
    if LOCAL_FAILURE_MARKERS.iter().any(|m| lower.contains(m)) {
        RolloutError::corrupt(mirror, message)
    } else {
        RolloutError::unreachable(remote, message)
    }
}

#[async_trait]
impl GitToolkit for SystemGit {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn clone_mirror(&self, url: &str, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut cmd = self.command();
        cmd.arg("clone").arg("--mirror").arg("--quiet").arg(url).arg(path);

        self.run(cmd, "clone --mirror")
            .await
            .map_err(|message| classify_remote_failure(url, path, message))?;

        debug!("git clone --mirror succeeded");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn fetch_all(&self, path: &Path) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("-C")
            .arg(path)
            .arg("fetch")
            .arg("--prune")
            .arg("--force")
            .arg("--quiet")
            .arg("origin");

        self.run(cmd, "fetch").await.map_err(|message| {
            classify_remote_failure("origin", path, message)
        })?;

        debug!("git fetch complete");
        Ok(())
    }

    async fn mirror_remote(&self, path: &Path) -> Result<Option<String>> {
        let path = path.to_path_buf();
        let task_path = path.clone();

        tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let repo = open_repo(&task_path)?;
            if !repo.is_bare() {
                return Err(RolloutError::corrupt(&task_path, "repository is not bare"));
            }

            let url = repo
                .config_snapshot()
                .string("remote.origin.url")
                .map(|value| value.to_string());
            Ok(url)
        })
        .await
        .map_err(|e| RolloutError::corrupt(&path, format!("inspection task failed: {}", e)))?
    }

    async fn list_refs(&self, path: &Path, category: RefCategory) -> Result<Vec<(RefName, CommitId)>> {
        let path = path.to_path_buf();
        let task_path = path.clone();

        tokio::task::spawn_blocking(move || list_refs_blocking(&task_path, category))
            .await
            .map_err(|e| RolloutError::corrupt(&path, format!("ref listing task failed: {}", e)))?
    }

    #[instrument(skip(self, mirror, commit), fields(%category, ref_name = %name, commit = %commit.short()))]
    async fn checkout_commit(
        &self,
        mirror: &Path,
        category: RefCategory,
        name: &RefName,
        commit: &CommitId,
        dest: &Path,
    ) -> Result<()> {
        if Self::is_worktree(dest).await {
            match self.reset_worktree(dest, commit).await {
                Ok(()) => return Ok(()),
                Err(message) => {
                    warn!(
                        path = %dest.display(),
                        "updating existing checkout failed, recreating it: {}",
                        message
                    );
                },
            }
        } else if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            warn!(path = %dest.display(), "replacing directory that is not a checkout");
        }

        let result = match self.recreate(mirror, dest).await {
            Ok(()) => self.reset_worktree(dest, commit).await,
            Err(message) => Err(message),
        };

        result.map_err(|message| RolloutError::checkout_failed(category, name.as_str(), message))
    }
}

fn open_repo(path: &Path) -> Result<gix::Repository> {
    gix::open(path)
        .map_err(|e| RolloutError::corrupt(path, format!("failed to open repository: {}", e)))
}

fn list_refs_blocking(path: &Path, category: RefCategory) -> Result<Vec<(RefName, CommitId)>> {
    let repo = open_repo(path)?;
    let corrupt = |what: &str, e: &dyn std::fmt::Display| {
        RolloutError::corrupt(path, format!("failed to {}: {}", what, e))
    };

    let platform = repo.references().map_err(|e| corrupt("read references", &e))?;
    let references = match category {
        RefCategory::Branch => platform.local_branches(),
        RefCategory::Tag => platform.tags(),
    }
    .map_err(|e| corrupt("iterate references", &e))?;

    let mut refs = Vec::new();
    for reference in references {
        let reference = reference.map_err(|e| corrupt("load reference", &e))?;

        let Ok(full_name) = reference.name().as_bstr().to_str().map(str::to_string) else {
            warn!(%category, "skipping ref with a non UTF-8 name");
            continue;
        };
        let name = match RefName::from_full_ref(category, &full_name) {
            Some(Ok(name)) => name,
            Some(Err(e)) => {
                warn!(%category, "skipping ref {}: {}", full_name, e);
                continue;
            },
            None => continue,
        };

        let id = reference
            .into_fully_peeled_id()
            .map_err(|e| corrupt("peel reference", &e))?;
        let kind = id.object().map_err(|e| corrupt("read object", &e))?.kind;
        if kind != gix::object::Kind::Commit {
            warn!(%category, "skipping ref {}: points at a {} rather than a commit", full_name, kind);
            continue;
        }
        let commit = CommitId::parse(id.to_string())
            .map_err(|e| corrupt("parse object id", &e))?;

        refs.push((name, commit));
    }

    Ok(refs)
}
