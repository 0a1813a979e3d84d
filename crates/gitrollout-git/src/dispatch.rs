//! Turns change events into checkout updates and command runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gitrollout_core::{
    ChangeEvent, CommandTemplate, EventContext, RefCategory, RolloutError, TargetConfig,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::checkout::CheckoutManager;
use crate::process::CommandRunner;

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStatus {
    /// Checkout updated and the command (if any) succeeded.
    Applied,
    /// Checkout updated but the command failed. Reported only.
    CommandFailed(String),
    /// Checkout failed; the command was not run.
    CheckoutFailed(String),
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::CommandFailed(_) => "command_failed",
            Self::CheckoutFailed(_) => "checkout_failed",
        }
    }

    /// True if the checkout for the event is in place.
    pub fn is_processed(&self) -> bool {
        !matches!(self, Self::CheckoutFailed(_))
    }
}

/// An event together with where it was applied and how it went.
#[derive(Debug, Clone)]
pub struct EventOutcome {
    pub event: ChangeEvent,
    pub destination: PathBuf,
    pub status: EventStatus,
}

/// Outcomes of every event of one category, in dispatch order.
#[derive(Debug, Clone)]
pub struct CategoryOutcome {
    pub category: RefCategory,
    pub outcomes: Vec<EventOutcome>,
}

impl CategoryOutcome {
    /// Returns true if no checkout failed, i.e. the baseline may advance.
    pub fn all_processed(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_processed())
    }

    /// Number of events whose checkout failed.
    pub fn checkout_failures(&self) -> usize {
        self.count(|s| matches!(s, EventStatus::CheckoutFailed(_)))
    }

    /// Number of events whose command failed.
    pub fn command_failures(&self) -> usize {
        self.count(|s| matches!(s, EventStatus::CommandFailed(_)))
    }

    fn count(&self, predicate: impl Fn(&EventStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

/// Drives the checkout manager and the event command for each event.
#[derive(Clone)]
pub struct Dispatcher {
    checkout: Arc<CheckoutManager>,
    runner: Arc<dyn CommandRunner>,
    max_concurrency: usize,
    command_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher running at most `max_concurrency` events at once.
    pub fn new(
        checkout: Arc<CheckoutManager>,
        runner: Arc<dyn CommandRunner>,
        max_concurrency: usize,
        command_timeout: Duration,
    ) -> Self {
        Self {
            checkout,
            runner,
            max_concurrency: max_concurrency.max(1),
            command_timeout,
        }
    }

    /// Handles one event: checkout first, then the command if the checkout
    /// succeeded.
    pub async fn handle(&self, target: &TargetConfig, event: &ChangeEvent) -> EventOutcome {
        let destination = target.destination(event.name());

        let status = match self.checkout.materialize(target, event).await {
            Ok(_) => match target.event_command() {
                Some(template) => self.run_command(template, target, event, &destination).await,
                None => EventStatus::Applied,
            },
            Err(e) => {
                error!(
                    category = %event.category(),
                    ref_name = %event.name(),
                    "{}",
                    e
                );
                EventStatus::CheckoutFailed(e.to_string())
            },
        };

        EventOutcome {
            event: event.clone(),
            destination,
            status,
        }
    }

    async fn run_command(
        &self,
        template: &CommandTemplate,
        target: &TargetConfig,
        event: &ChangeEvent,
        destination: &Path,
    ) -> EventStatus {
        let working_dir = if event.new_commit().is_some() {
            destination
        } else {
            target.root_path()
        };
        let invocation = template.invocation(&EventContext::new(event, destination, working_dir));

        let failure = match self.runner.run(&invocation, self.command_timeout).await {
            Ok(outcome) if outcome.success() => {
                debug!(
                    category = %event.category(),
                    ref_name = %event.name(),
                    "command finished in {:?}",
                    outcome.duration
                );
                return EventStatus::Applied;
            },
            Ok(outcome) => {
                RolloutError::command_failed(template.program(), outcome.exit_code, outcome.describe())
            },
            Err(e) => e,
        };

        warn!(
            category = %event.category(),
            ref_name = %event.name(),
            "{}",
            failure
        );
        EventStatus::CommandFailed(failure.to_string())
    }

    /// Handles every event of one category on a bounded pool and waits for
    /// all of them. Outcomes are returned in the order of `events`.
    ///
    /// Deleted events run to completion before any Created or Moved event
    /// starts, since the destination of `a` contains the destination of
    /// `a/b`. Refs alive at the same time never nest, so each batch is free
    /// to run concurrently.
    pub async fn dispatch(
        &self,
        category: RefCategory,
        target: Arc<TargetConfig>,
        events: Vec<ChangeEvent>,
    ) -> CategoryOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let (deletions, updates): (Vec<usize>, Vec<usize>) =
            (0..events.len()).partition(|&index| events[index].new_commit().is_none());

        let mut slots: Vec<Option<EventOutcome>> = vec![None; events.len()];
        for batch in [deletions, updates] {
            let mut tasks = JoinSet::new();

            for index in batch {
                let dispatcher = self.clone();
                let target = Arc::clone(&target);
                let semaphore = Arc::clone(&semaphore);
                let event = events[index].clone();

                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    (index, dispatcher.handle(&target, &event).await)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, outcome)) => slots[index] = Some(outcome),
                    Err(e) => error!(%category, "dispatch task failed: {}", e),
                }
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(events)
            .map(|(slot, event)| {
                slot.unwrap_or_else(|| EventOutcome {
                    destination: target.destination(event.name()),
                    event,
                    status: EventStatus::CheckoutFailed("dispatch task did not complete".to_string()),
                })
            })
            .collect();

        CategoryOutcome { category, outcomes }
    }
}
