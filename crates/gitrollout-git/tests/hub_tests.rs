//! Cycle-level behavior of the hub against in-memory fakes.

mod common;

use std::time::Duration;

use common::{Fixture, REMOTE, commit, name};
use gitrollout_core::{ChangeKind, RefCategory, RolloutError, TargetConfig};
use gitrollout_git::{EventStatus, HubPhase, MirrorHub};

#[tokio::test]
async fn first_cycle_creates_every_ref() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    fx.toolkit.set_ref(RefCategory::Branch, "feature/login", commit('b'));
    fx.toolkit.set_ref(RefCategory::Tag, "v1.0", commit('c'));
    let hub = fx.hub();

    let report = hub.run_cycle().await.unwrap();

    assert_eq!(report.event_count(), 3);
    assert!(report.is_clean());
    assert!(report.outcomes().all(|o| o.event.kind() == ChangeKind::Created));
    assert_eq!(
        fx.checked_out(&fx.branches_root(), "feature/login"),
        Some(commit('b').to_string())
    );
    assert_eq!(
        fx.checked_out(&fx.tags_root(), "v1.0"),
        Some(commit('c').to_string())
    );
    assert_eq!(hub.baseline(RefCategory::Branch).len(), 2);
    assert_eq!(hub.baseline(RefCategory::Tag).len(), 1);
    assert_eq!(hub.state().cycles_completed(), 1);
    assert_eq!(hub.state().phase(), HubPhase::Idle);
}

#[tokio::test]
async fn unchanged_remote_produces_no_events() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    let hub = fx.hub();

    hub.run_cycle().await.unwrap();
    let report = hub.run_cycle().await.unwrap();

    assert_eq!(report.event_count(), 0);
    assert_eq!(fx.runner.invocations().len(), 1);
}

#[tokio::test]
async fn events_are_dispatched_in_name_order() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    let hub = fx.hub();
    hub.run_cycle().await.unwrap();

    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('b'));
    fx.toolkit.set_ref(RefCategory::Branch, "dev", commit('c'));
    let report = hub.run_cycle().await.unwrap();

    let branches = report.category(RefCategory::Branch).unwrap();
    let summary: Vec<_> = branches
        .outcomes
        .iter()
        .map(|o| (o.event.name().to_string(), o.event.kind()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("dev".to_string(), ChangeKind::Created),
            ("main".to_string(), ChangeKind::Moved),
        ]
    );
    assert_eq!(
        fx.checked_out(&fx.branches_root(), "main"),
        Some(commit('b').to_string())
    );
}

#[tokio::test]
async fn fetch_failure_keeps_baseline() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    let hub = fx.hub();
    hub.run_cycle().await.unwrap();
    let before = hub.baseline(RefCategory::Branch);

    fx.toolkit.set_unreachable(true);
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('b'));
    let err = hub.run_cycle().await.unwrap_err();

    assert!(matches!(err, RolloutError::RemoteUnreachable { .. }));
    assert_eq!(hub.baseline(RefCategory::Branch), before);
    assert_eq!(hub.state().failure_count(), 1);
    assert!(hub.state().last_error().is_some());

    fx.toolkit.set_unreachable(false);
    let report = hub.run_cycle().await.unwrap();

    let events: Vec<_> = report.outcomes().map(|o| o.event.clone()).collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), ChangeKind::Moved);
    assert_eq!(events[0].old_commit(), Some(&commit('a')));
    assert_eq!(events[0].new_commit(), Some(&commit('b')));
    assert_eq!(hub.state().failure_count(), 0);
}

#[tokio::test]
async fn checkout_failure_blocks_only_its_category() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    fx.toolkit.set_ref(RefCategory::Tag, "v1.0", commit('c'));
    fx.toolkit.fail_checkout("main");
    let hub = fx.hub();

    let report = hub.run_cycle().await.unwrap();

    let branches = report.category(RefCategory::Branch).unwrap();
    assert!(!branches.advanced);
    assert!(matches!(branches.outcomes[0].status, EventStatus::CheckoutFailed(_)));
    assert!(report.category(RefCategory::Tag).unwrap().advanced);
    assert!(hub.baseline(RefCategory::Branch).is_empty());
    assert_eq!(hub.baseline(RefCategory::Tag).len(), 1);
    assert!(fx.runner.invocations().is_empty(), "no command after a failed checkout");

    fx.toolkit.heal_checkout("main");
    let report = hub.run_cycle().await.unwrap();

    assert_eq!(report.event_count(), 1);
    let retried = report.outcomes().next().unwrap();
    assert_eq!(retried.event.name(), &name("main"));
    assert_eq!(retried.event.kind(), ChangeKind::Created);
    assert_eq!(retried.status, EventStatus::Applied);
    assert_eq!(hub.baseline(RefCategory::Branch).len(), 1);
}

#[tokio::test]
async fn failing_command_still_advances() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    fx.runner.set_exit_code(1);
    let hub = fx.hub();

    let report = hub.run_cycle().await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.command_failures(), 1);
    assert_eq!(hub.baseline(RefCategory::Branch).len(), 1);

    let report = hub.run_cycle().await.unwrap();
    assert_eq!(report.event_count(), 0);
    assert_eq!(fx.runner.invocations().len(), 1);
}

#[tokio::test]
async fn command_receives_event_context() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "release/1.x", commit('a'));
    let hub = fx.hub();

    hub.run_cycle().await.unwrap();

    let invocations = fx.runner.invocations();
    assert_eq!(invocations.len(), 1);
    let invocation = &invocations[0];
    assert_eq!(invocation.argv, vec!["deploy.sh", "created", "release/1.x"]);
    assert!(
        invocation
            .env
            .contains(&("GITROLLOUT_NEW".to_string(), commit('a').to_string()))
    );
    assert_eq!(invocation.working_dir, fx.branches_root().join("release").join("1.x"));
}

#[tokio::test]
async fn deleted_ref_removes_checkout() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    fx.toolkit.set_ref(RefCategory::Branch, "feature/x", commit('b'));
    let hub = fx.hub();
    hub.run_cycle().await.unwrap();
    assert!(fx.branches_root().join("feature").join("x").exists());

    fx.toolkit.remove_ref(RefCategory::Branch, "feature/x");
    let report = hub.run_cycle().await.unwrap();

    assert_eq!(report.event_count(), 1);
    assert_eq!(report.outcomes().next().unwrap().event.kind(), ChangeKind::Deleted);
    assert!(!fx.branches_root().join("feature").exists());
    assert!(fx.branches_root().join("main").exists());

    let invocations = fx.runner.invocations();
    let last = invocations.last().unwrap();
    assert_eq!(last.argv, vec!["deploy.sh", "deleted", "feature/x"]);
    assert_eq!(last.working_dir, fx.branches_root());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nested_ref_replacing_its_parent_is_checked_out() {
    let fx = Fixture::new();
    let hub = fx.hub();

    for round in 0..40 {
        let (live, gone) = if round % 2 == 0 { ("a", "a/b") } else { ("a/b", "a") };
        let tip = commit(if round % 2 == 0 { 'a' } else { 'b' });
        fx.toolkit.remove_ref(RefCategory::Branch, gone);
        fx.toolkit.set_ref(RefCategory::Branch, live, tip.clone());

        let report = hub.run_cycle().await.unwrap();

        assert!(report.is_clean(), "round {round}: {:?}", report.outcomes().collect::<Vec<_>>());
        assert_eq!(
            fx.checked_out(&fx.branches_root(), live),
            Some(tip.to_string()),
            "round {round}: checkout of {live} missing"
        );
        assert_eq!(hub.baseline(RefCategory::Branch).len(), 1);
    }
}

#[tokio::test]
async fn deletions_finish_before_nested_creations() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "team", commit('a'));
    let hub = fx.hub();
    hub.run_cycle().await.unwrap();

    fx.toolkit.remove_ref(RefCategory::Branch, "team");
    fx.toolkit.set_ref(RefCategory::Branch, "team/api", commit('b'));
    fx.toolkit.set_ref(RefCategory::Branch, "team/web", commit('c'));
    let report = hub.run_cycle().await.unwrap();

    let kinds: Vec<_> = report
        .outcomes()
        .map(|o| (o.event.name().to_string(), o.event.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("team".to_string(), ChangeKind::Deleted),
            ("team/api".to_string(), ChangeKind::Created),
            ("team/web".to_string(), ChangeKind::Created),
        ]
    );
    assert!(report.is_clean());
    assert!(!fx.branches_root().join("team").join(common::HEAD_FILE).exists());
    assert_eq!(
        fx.checked_out(&fx.branches_root(), "team/api"),
        Some(commit('b').to_string())
    );
    assert_eq!(
        fx.checked_out(&fx.branches_root(), "team/web"),
        Some(commit('c').to_string())
    );
}

#[tokio::test]
async fn untracked_category_is_ignored() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    fx.toolkit.set_ref(RefCategory::Tag, "v1.0", commit('b'));
    let hub = fx
        .builder()
        .tags(TargetConfig::new(fx.tags_root()))
        .build()
        .unwrap();

    let report = hub.run_cycle().await.unwrap();

    assert!(report.category(RefCategory::Branch).is_none());
    assert_eq!(report.event_count(), 1);
    assert!(!fx.branches_root().exists());
    assert!(hub.baseline(RefCategory::Branch).is_empty());
}

#[tokio::test]
async fn filters_limit_tracked_refs() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    fx.toolkit.set_ref(RefCategory::Branch, "release/1.0", commit('b'));
    let hub = fx
        .builder()
        .branches(
            TargetConfig::new(fx.branches_root())
                .with_filter("release/*")
                .unwrap(),
        )
        .build()
        .unwrap();

    hub.run_cycle().await.unwrap();

    let baseline = hub.baseline(RefCategory::Branch);
    assert_eq!(baseline.len(), 1);
    assert!(baseline.contains(&name("release/1.0")));
    assert!(!fx.branches_root().join("main").exists());
}

#[tokio::test]
async fn concurrent_cycle_is_rejected() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    fx.toolkit.set_fetch_delay(Duration::from_millis(100));
    let hub = fx.hub();

    let (first, second) = tokio::join!(hub.run_cycle(), hub.run_cycle());

    assert!(first.is_ok());
    assert!(matches!(second, Err(RolloutError::CycleInProgress)));
    assert_eq!(fx.toolkit.fetch_count(), 1);
}

#[tokio::test]
async fn cycle_timeout_aborts_without_advancing() {
    let fx = Fixture::new();
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));
    fx.toolkit.set_fetch_delay(Duration::from_secs(5));
    let hub = fx
        .builder()
        .branches(TargetConfig::new(fx.branches_root()))
        .cycle_timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = hub.run_cycle().await.unwrap_err();

    assert!(matches!(err, RolloutError::Timeout { .. }));
    assert!(hub.baseline(RefCategory::Branch).is_empty());
    assert_eq!(hub.state().phase(), HubPhase::Idle);
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let fx = Fixture::new();
    let state_file = fx.dir.path().join("state").join("refs.json");
    fx.toolkit.set_ref(RefCategory::Branch, "main", commit('a'));

    let build = || {
        fx.builder()
            .branches(TargetConfig::new(fx.branches_root()))
            .state_file(&state_file)
            .build()
            .unwrap()
    };

    let hub = build();
    assert_eq!(hub.run_cycle().await.unwrap().event_count(), 1);
    drop(hub);

    let restarted = build();
    assert_eq!(restarted.baseline(RefCategory::Branch).len(), 1);
    assert_eq!(restarted.run_cycle().await.unwrap().event_count(), 0);
}

#[tokio::test]
async fn overlapping_roots_are_rejected() {
    let fx = Fixture::new();
    let result = fx
        .builder()
        .branches(TargetConfig::new(fx.dir.path().join("deploy")))
        .tags(TargetConfig::new(fx.dir.path().join("deploy").join("tags")))
        .build();

    assert!(matches!(result, Err(RolloutError::InvalidConfig(_))));
}

#[tokio::test]
async fn mirror_of_other_remote_is_a_path_conflict() {
    let fx = Fixture::new();
    let other = Fixture::new();
    // clone a mirror for a different remote into fx's mirror path
    let foreign = gitrollout_git::MirrorConfig::builder()
        .remote_url("https://example.com/org/other.git")
        .mirror_path(fx.mirror_path())
        .build()
        .unwrap();
    MirrorHub::builder(foreign)
        .toolkit(other.toolkit.clone())
        .build()
        .unwrap()
        .ensure()
        .await
        .unwrap();

    let err = fx.hub().ensure().await.unwrap_err();

    assert!(matches!(err, RolloutError::PathConflict { .. }));
    assert!(err.is_startup_fatal());
}

#[tokio::test]
async fn failed_clone_leaves_no_partial_mirror() {
    let fx = Fixture::new();
    fx.toolkit.set_unreachable(true);
    let hub = fx.hub();

    let err = hub.ensure().await.unwrap_err();

    assert!(matches!(err, RolloutError::RemoteUnreachable { .. }));
    assert!(!fx.mirror_path().exists());

    fx.toolkit.set_unreachable(false);
    hub.ensure().await.unwrap();
    assert!(fx.mirror_path().exists());
}

#[tokio::test]
async fn existing_mirror_is_reused() {
    let fx = Fixture::new();
    fx.hub().ensure().await.unwrap();

    let hub = fx.hub();
    hub.ensure().await.unwrap();
    assert_eq!(hub.store().state(), gitrollout_git::MirrorState::Ready);

    assert_eq!(
        std::fs::read_to_string(fx.mirror_path().join("FAKE_MIRROR")).unwrap(),
        REMOTE
    );
}
