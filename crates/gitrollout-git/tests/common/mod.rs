//! Shared fakes and fixtures for engine tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gitrollout_core::{
    CommandInvocation, CommitId, RefCategory, RefName, Result, RolloutError, TargetConfig,
};
use gitrollout_git::{
    CommandOutcome, CommandRunner, GitToolkit, MirrorConfig, MirrorHub, MirrorHubBuilder,
};
use parking_lot::Mutex;
use tempfile::TempDir;

pub const REMOTE: &str = "https://example.com/org/app.git";

/// Marker file a fake mirror keeps its remote URL in.
const MARKER: &str = "FAKE_MIRROR";

/// File a fake checkout records its commit in.
pub const HEAD_FILE: &str = "HEAD_COMMIT";

pub fn commit(c: char) -> CommitId {
    CommitId::parse(c.to_string().repeat(40)).unwrap()
}

pub fn name(s: &str) -> RefName {
    RefName::new(s).unwrap()
}

#[derive(Default)]
struct Refs {
    branches: BTreeMap<String, CommitId>,
    tags: BTreeMap<String, CommitId>,
}

impl Refs {
    fn get_mut(&mut self, category: RefCategory) -> &mut BTreeMap<String, CommitId> {
        match category {
            RefCategory::Branch => &mut self.branches,
            RefCategory::Tag => &mut self.tags,
        }
    }

    fn snapshot(&self) -> Refs {
        Refs {
            branches: self.branches.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// In-memory git toolkit.
///
/// The "remote" is a pair of ref maps; cloning and fetching copy them into
/// the mirror. Checkouts write the commit id into [`HEAD_FILE`].
#[derive(Default)]
pub struct FakeToolkit {
    remote: Mutex<Refs>,
    mirror: Mutex<Refs>,
    unreachable: Mutex<bool>,
    fetch_delay: Mutex<Option<Duration>>,
    failing_checkouts: Mutex<BTreeSet<String>>,
    checkouts: Mutex<Vec<(RefCategory, String, CommitId)>>,
    fetches: Mutex<u32>,
}

impl FakeToolkit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_ref(&self, category: RefCategory, name: &str, commit: CommitId) {
        self.remote.lock().get_mut(category).insert(name.to_string(), commit);
    }

    pub fn remove_ref(&self, category: RefCategory, name: &str) {
        self.remote.lock().get_mut(category).remove(name);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock() = unreachable;
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = Some(delay);
    }

    pub fn fail_checkout(&self, name: &str) {
        self.failing_checkouts.lock().insert(name.to_string());
    }

    pub fn heal_checkout(&self, name: &str) {
        self.failing_checkouts.lock().remove(name);
    }

    pub fn checkouts(&self) -> Vec<(RefCategory, String, CommitId)> {
        self.checkouts.lock().clone()
    }

    pub fn fetch_count(&self) -> u32 {
        *self.fetches.lock()
    }

    fn check_reachable(&self, url: &str) -> Result<()> {
        if *self.unreachable.lock() {
            return Err(RolloutError::unreachable(url, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl GitToolkit for FakeToolkit {
    async fn clone_mirror(&self, url: &str, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        self.check_reachable(url)?;
        std::fs::write(path.join(MARKER), url)?;
        *self.mirror.lock() = self.remote.lock().snapshot();
        Ok(())
    }

    async fn fetch_all(&self, _path: &Path) -> Result<()> {
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_reachable("origin")?;
        *self.fetches.lock() += 1;
        *self.mirror.lock() = self.remote.lock().snapshot();
        Ok(())
    }

    async fn mirror_remote(&self, path: &Path) -> Result<Option<String>> {
        std::fs::read_to_string(path.join(MARKER))
            .map(Some)
            .map_err(|e| RolloutError::corrupt(path, e.to_string()))
    }

    async fn list_refs(&self, _path: &Path, category: RefCategory) -> Result<Vec<(RefName, CommitId)>> {
        let mut mirror = self.mirror.lock();
        Ok(mirror
            .get_mut(category)
            .iter()
            .map(|(n, c)| (name(n), c.clone()))
            .collect())
    }

    async fn checkout_commit(
        &self,
        _mirror: &Path,
        category: RefCategory,
        name: &RefName,
        commit: &CommitId,
        dest: &Path,
    ) -> Result<()> {
        if self.failing_checkouts.lock().contains(name.as_str()) {
            return Err(RolloutError::checkout_failed(category, name.as_str(), "injected failure"));
        }
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join(HEAD_FILE), commit.as_str())?;
        self.checkouts
            .lock()
            .push((category, name.to_string(), commit.clone()));
        Ok(())
    }
}

/// Command runner that records invocations and returns a fixed exit code.
#[derive(Default)]
pub struct FakeRunner {
    exit_code: Mutex<i32>,
    invocations: Mutex<Vec<CommandInvocation>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_exit_code(&self, code: i32) {
        *self.exit_code.lock() = code;
    }

    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, invocation: &CommandInvocation, _timeout: Duration) -> Result<CommandOutcome> {
        self.invocations.lock().push(invocation.clone());
        Ok(CommandOutcome::exited(*self.exit_code.lock()))
    }
}

/// Temporary directory layout plus fakes.
pub struct Fixture {
    pub dir: TempDir,
    pub toolkit: Arc<FakeToolkit>,
    pub runner: Arc<FakeRunner>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            toolkit: FakeToolkit::new(),
            runner: FakeRunner::new(),
        }
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.dir.path().join("mirror.git")
    }

    pub fn branches_root(&self) -> PathBuf {
        self.dir.path().join("branches")
    }

    pub fn tags_root(&self) -> PathBuf {
        self.dir.path().join("tags")
    }

    pub fn mirror_config(&self) -> MirrorConfig {
        MirrorConfig::builder()
            .remote_url(REMOTE)
            .mirror_path(self.mirror_path())
            .build()
            .unwrap()
    }

    /// Builder wired to the fakes, without targets.
    pub fn builder(&self) -> MirrorHubBuilder {
        MirrorHub::builder(self.mirror_config())
            .toolkit(self.toolkit.clone())
            .runner(self.runner.clone())
    }

    /// Hub tracking branches and tags, both with a command.
    pub fn hub(&self) -> MirrorHub {
        self.builder()
            .branches(
                TargetConfig::new(self.branches_root())
                    .with_command(gitrollout_core::CommandTemplate::parse("deploy.sh {event} {name}").unwrap()),
            )
            .tags(TargetConfig::new(self.tags_root()))
            .build()
            .unwrap()
    }

    /// Commit recorded in the checkout at `root/relative`.
    pub fn checked_out(&self, root: &Path, relative: &str) -> Option<String> {
        std::fs::read_to_string(root.join(relative).join(HEAD_FILE)).ok()
    }
}
