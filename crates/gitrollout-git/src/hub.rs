//! The observe, diff, dispatch and settle cycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gitrollout_core::{diff, ChangeEvent, RefCategory, RefSet, Result, RolloutError, TargetConfig};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::checkout::CheckoutManager;
use crate::dispatch::{CategoryOutcome, Dispatcher, EventOutcome};
use crate::mirror::{MirrorConfig, MirrorStore};
use crate::process::{CommandRunner, ProcessRunner};
use crate::snapshot::{Baselines, SnapshotFile};
use crate::sync::{HubPhase, HubState};
use crate::toolkit::{GitToolkit, SystemGit};

/// What happened to one category during a cycle.
#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub category: RefCategory,
    /// Whether the category's baseline was advanced.
    pub advanced: bool,
    pub outcomes: Vec<EventOutcome>,
}

/// Summary of a completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub categories: Vec<CategoryReport>,
    pub duration: Duration,
}

impl CycleReport {
    /// All event outcomes, branches first.
    pub fn outcomes(&self) -> impl Iterator<Item = &EventOutcome> {
        self.categories.iter().flat_map(|c| c.outcomes.iter())
    }

    pub fn event_count(&self) -> usize {
        self.outcomes().count()
    }

    pub fn checkout_failures(&self) -> usize {
        self.outcomes().filter(|o| !o.status.is_processed()).count()
    }

    pub fn command_failures(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o.status, crate::dispatch::EventStatus::CommandFailed(_)))
            .count()
    }

    /// Returns the report for `category`, if it is tracked.
    pub fn category(&self, category: RefCategory) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// True if every tracked category advanced.
    pub fn is_clean(&self) -> bool {
        self.categories.iter().all(|c| c.advanced)
    }
}

struct Plan {
    category: RefCategory,
    target: Arc<TargetConfig>,
    current: RefSet,
    events: Vec<ChangeEvent>,
}

struct Dispatched {
    current: RefSet,
    outcome: CategoryOutcome,
}

/// Top-level orchestrator: owns the mirror, the targets and the baselines.
///
/// Only one cycle runs at a time. Baselines are replaced as a whole at the
/// end of a cycle and only for categories whose checkouts all succeeded, so
/// a failed event is recomputed by the next cycle.
pub struct MirrorHub {
    store: MirrorStore,
    dispatcher: Dispatcher,
    branches: Option<Arc<TargetConfig>>,
    tags: Option<Arc<TargetConfig>>,
    baselines: RwLock<Baselines>,
    cycle_lock: Mutex<()>,
    state: Arc<HubState>,
    snapshot: Option<SnapshotFile>,
    cycle_timeout: Option<Duration>,
}

impl MirrorHub {
    /// Creates a builder for a hub mirroring `mirror`.
    pub fn builder(mirror: MirrorConfig) -> MirrorHubBuilder {
        MirrorHubBuilder::new(mirror)
    }

    pub fn store(&self) -> &MirrorStore {
        &self.store
    }

    /// Returns the shared state handle.
    pub fn state(&self) -> Arc<HubState> {
        Arc::clone(&self.state)
    }

    /// Returns the target of `category`, or `None` if it is not tracked.
    pub fn target(&self, category: RefCategory) -> Option<&Arc<TargetConfig>> {
        match category {
            RefCategory::Branch => self.branches.as_ref(),
            RefCategory::Tag => self.tags.as_ref(),
        }
    }

    /// Returns the last settled refs of `category`.
    pub fn baseline(&self, category: RefCategory) -> RefSet {
        self.baselines.read().get(category).clone()
    }

    /// Makes sure the mirror exists and belongs to the configured remote.
    pub async fn ensure(&self) -> Result<()> {
        self.store.ensure().await
    }

    /// Runs one full cycle.
    ///
    /// # Errors
    ///
    /// - `CycleInProgress` if another cycle is running
    /// - any cycle-fatal error from fetching or enumerating refs, or
    ///   `Timeout` if the cycle exceeded its limit
    ///
    /// In every error case no baseline is changed. Checkout and command
    /// failures are not errors; they are reported in the [`CycleReport`].
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            debug!("Cycle requested while another is running");
            return Err(RolloutError::CycleInProgress);
        };

        let started = Instant::now();
        let result = match self.cycle_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.observe_and_dispatch()).await {
                Ok(result) => result,
                Err(_) => Err(RolloutError::timeout("cycle", limit.as_secs())),
            },
            None => self.observe_and_dispatch().await,
        };

        let dispatched = match result {
            Ok(dispatched) => dispatched,
            Err(e) => {
                warn!("Cycle aborted, baselines kept: {}", e);
                self.state.record_failure(e.to_string());
                self.state.set_phase(HubPhase::Idle);
                return Err(e);
            },
        };

        self.state.set_phase(HubPhase::Settling);
        let report = self.settle(dispatched, started).await;

        self.state.record_success();
        self.state.set_phase(HubPhase::Idle);
        Ok(report)
    }

    async fn observe_and_dispatch(&self) -> Result<Vec<Dispatched>> {
        self.state.set_phase(HubPhase::Fetching);
        self.store.ensure().await?;
        self.store.refresh().await?;

        self.state.set_phase(HubPhase::Diffing);
        let mut branch_plan = None;
        let mut tag_plan = None;
        for category in RefCategory::ALL {
            let Some(target) = self.target(category) else {
                continue;
            };
            let plan = self.plan(category, Arc::clone(target)).await?;
            match category {
                RefCategory::Branch => branch_plan = Some(plan),
                RefCategory::Tag => tag_plan = Some(plan),
            }
        }

        self.state.set_phase(HubPhase::Dispatching);
        let (branches, tags) = tokio::join!(self.dispatch(branch_plan), self.dispatch(tag_plan));

        Ok(branches.into_iter().chain(tags).collect())
    }

    async fn plan(&self, category: RefCategory, target: Arc<TargetConfig>) -> Result<Plan> {
        let current = target.select(&self.store.current_refs(category).await?);
        let events = diff(&self.baseline(category), &current);

        debug!(%category, "{} refs tracked, {} changes", current.len(), events.len());
        Ok(Plan {
            category,
            target,
            current,
            events,
        })
    }

    async fn dispatch(&self, plan: Option<Plan>) -> Option<Dispatched> {
        let plan = plan?;
        let outcome = if plan.events.is_empty() {
            CategoryOutcome {
                category: plan.category,
                outcomes: Vec::new(),
            }
        } else {
            self.dispatcher
                .dispatch(plan.category, plan.target, plan.events)
                .await
        };

        Some(Dispatched {
            current: plan.current,
            outcome,
        })
    }

    async fn settle(&self, dispatched: Vec<Dispatched>, started: Instant) -> CycleReport {
        let mut next = self.baselines.read().clone();
        let mut changed = false;
        let mut categories = Vec::with_capacity(dispatched.len());

        for Dispatched { current, outcome } in dispatched {
            let category = outcome.category;
            let advanced = outcome.all_processed();

            if advanced {
                changed |= next.get(category) != &current;
                next.set(current);
            } else {
                error!(
                    %category,
                    "{} checkout failures, baseline kept for retry",
                    outcome.checkout_failures()
                );
            }
            if outcome.command_failures() > 0 {
                warn!(%category, "{} event commands failed", outcome.command_failures());
            }

            categories.push(CategoryReport {
                category,
                advanced,
                outcomes: outcome.outcomes,
            });
        }

        if changed {
            *self.baselines.write() = next.clone();
            if let Some(snapshot) = &self.snapshot
                && let Err(e) = snapshot.save(self.store.config().remote_url(), &next).await
            {
                warn!("Failed to save snapshot {:?}: {}", snapshot.path(), e);
            }
        }

        let report = CycleReport {
            categories,
            duration: started.elapsed(),
        };

        if report.event_count() > 0 {
            info!(
                "Cycle completed in {:?}: {} events, {} checkout failures, {} command failures",
                report.duration,
                report.event_count(),
                report.checkout_failures(),
                report.command_failures()
            );
        } else {
            debug!("Cycle completed in {:?}: no changes", report.duration);
        }

        report
    }
}

/// Builder for [`MirrorHub`].
pub struct MirrorHubBuilder {
    mirror: MirrorConfig,
    toolkit: Option<Arc<dyn GitToolkit>>,
    runner: Option<Arc<dyn CommandRunner>>,
    branches: Option<TargetConfig>,
    tags: Option<TargetConfig>,
    max_concurrency: usize,
    command_timeout: Duration,
    cycle_timeout: Option<Duration>,
    state_file: Option<PathBuf>,
}

impl MirrorHubBuilder {
    fn new(mirror: MirrorConfig) -> Self {
        Self {
            mirror,
            toolkit: None,
            runner: None,
            branches: None,
            tags: None,
            max_concurrency: 4,
            command_timeout: Duration::from_secs(600),
            cycle_timeout: None,
            state_file: None,
        }
    }

    /// Overrides the git toolkit (defaults to the system `git`).
    pub fn toolkit(mut self, toolkit: Arc<dyn GitToolkit>) -> Self {
        self.toolkit = Some(toolkit);
        self
    }

    /// Overrides the command runner (defaults to OS processes).
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Tracks branches below `target`.
    pub fn branches(mut self, target: TargetConfig) -> Self {
        self.branches = Some(target);
        self
    }

    /// Tracks tags below `target`.
    pub fn tags(mut self, target: TargetConfig) -> Self {
        self.tags = Some(target);
        self
    }

    /// Sets the number of events handled concurrently per category.
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets the timeout of each event command.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Bounds a whole cycle (fetch, diff and dispatch).
    pub fn cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = Some(timeout);
        self
    }

    /// Persists baselines in `path`.
    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    /// Builds the hub, loading persisted baselines if a state file is set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the branch and tag roots overlap or a
    /// limit is zero.
    pub fn build(self) -> Result<MirrorHub> {
        if let (Some(branches), Some(tags)) = (&self.branches, &self.tags)
            && branches.overlaps(tags)
        {
            return Err(RolloutError::invalid_config(format!(
                "branch root {} and tag root {} overlap",
                branches.root_path().display(),
                tags.root_path().display()
            )));
        }
        if self.max_concurrency == 0 {
            return Err(RolloutError::invalid_config("max_concurrency must be non-zero"));
        }
        if self.command_timeout.is_zero() || self.cycle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(RolloutError::invalid_config("timeouts must be non-zero"));
        }

        let toolkit = self
            .toolkit
            .unwrap_or_else(|| Arc::new(SystemGit::new(self.mirror.git_binary())));
        let runner = self.runner.unwrap_or_else(|| Arc::new(ProcessRunner::new()));

        let checkout = CheckoutManager::new(
            Arc::clone(&toolkit),
            self.mirror.mirror_path().clone(),
            self.mirror.checkout_timeout(),
        );
        let dispatcher = Dispatcher::new(
            Arc::new(checkout),
            runner,
            self.max_concurrency,
            self.command_timeout,
        );

        let snapshot = self.state_file.map(SnapshotFile::new);
        let baselines = snapshot
            .as_ref()
            .and_then(|s| s.load(self.mirror.remote_url()))
            .unwrap_or_default();

        Ok(MirrorHub {
            store: MirrorStore::new(self.mirror, toolkit),
            dispatcher,
            branches: self.branches.map(Arc::new),
            tags: self.tags.map(Arc::new),
            baselines: RwLock::new(baselines),
            cycle_lock: Mutex::new(()),
            state: Arc::new(HubState::new()),
            snapshot,
            cycle_timeout: self.cycle_timeout,
        })
    }
}
