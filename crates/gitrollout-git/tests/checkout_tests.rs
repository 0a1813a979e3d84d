//! Checkout manager behavior against the fake toolkit.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{FakeToolkit, HEAD_FILE, commit, name};
use gitrollout_core::{ChangeEvent, CommitId, RefCategory, RefName, Result, RolloutError, TargetConfig};
use gitrollout_git::{CheckoutManager, GitToolkit};

fn manager(toolkit: Arc<dyn GitToolkit>) -> CheckoutManager {
    CheckoutManager::new(toolkit, "/unused/mirror.git", Duration::from_secs(5))
}

#[tokio::test]
async fn moved_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let target = TargetConfig::new(dir.path().join("branches"));
    let checkout = manager(FakeToolkit::new());
    let event = ChangeEvent::moved(RefCategory::Branch, name("main"), commit('a'), commit('b'));

    let first = checkout.materialize(&target, &event).await.unwrap();
    let after_first = std::fs::read_to_string(first.join(HEAD_FILE)).unwrap();
    let second = checkout.materialize(&target, &event).await.unwrap();
    let after_second = std::fs::read_to_string(second.join(HEAD_FILE)).unwrap();

    assert_eq!(first, second);
    assert_eq!(after_first, after_second);
    assert_eq!(after_second, commit('b').to_string());
}

#[tokio::test]
async fn deleting_missing_destination_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let target = TargetConfig::new(dir.path().join("tags"));
    let checkout = manager(FakeToolkit::new());
    let event = ChangeEvent::deleted(RefCategory::Tag, name("v0.9"), commit('a'));

    let destination = checkout.materialize(&target, &event).await.unwrap();

    assert_eq!(destination, dir.path().join("tags").join("v0.9"));
    assert!(!destination.exists());
}

#[tokio::test]
async fn delete_removes_nested_destination() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("branches");
    let target = TargetConfig::new(&root);
    let checkout = manager(FakeToolkit::new());

    let created = ChangeEvent::created(RefCategory::Branch, name("team/feature/x"), commit('a'));
    checkout.materialize(&target, &created).await.unwrap();
    std::fs::write(root.join("team").join("feature").join("x").join("local.txt"), "edit").unwrap();

    let deleted = ChangeEvent::deleted(RefCategory::Branch, name("team/feature/x"), commit('a'));
    checkout.materialize(&target, &deleted).await.unwrap();

    assert!(root.exists());
    assert!(!root.join("team").exists());
}

#[tokio::test]
async fn toolkit_failure_is_checkout_failed() {
    let dir = tempfile::tempdir().unwrap();
    let target = TargetConfig::new(dir.path().join("branches"));
    let toolkit = FakeToolkit::new();
    toolkit.fail_checkout("main");
    let checkout = manager(toolkit);

    let event = ChangeEvent::created(RefCategory::Branch, name("main"), commit('a'));
    let err = checkout.materialize(&target, &event).await.unwrap_err();

    assert!(err.is_event_fatal());
}

struct StuckToolkit;

#[async_trait]
impl GitToolkit for StuckToolkit {
    async fn clone_mirror(&self, _url: &str, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn fetch_all(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn mirror_remote(&self, _path: &Path) -> Result<Option<String>> {
        Ok(None)
    }

    async fn list_refs(&self, _path: &Path, _category: RefCategory) -> Result<Vec<(RefName, CommitId)>> {
        Ok(Vec::new())
    }

    async fn checkout_commit(
        &self,
        _mirror: &Path,
        _category: RefCategory,
        _name: &RefName,
        _commit: &CommitId,
        _dest: &Path,
    ) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }
}

#[tokio::test]
async fn slow_checkout_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let target = TargetConfig::new(dir.path().join("branches"));
    let checkout = CheckoutManager::new(Arc::new(StuckToolkit), "/unused", Duration::from_millis(50));

    let event = ChangeEvent::created(RefCategory::Branch, name("main"), commit('a'));
    let err = checkout.materialize(&target, &event).await.unwrap_err();

    assert!(matches!(err, RolloutError::CheckoutFailed { .. }));
}
