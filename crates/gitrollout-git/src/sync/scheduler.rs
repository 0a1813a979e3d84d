//! Background cycle scheduler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gitrollout_core::RolloutError;
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::hub::{CycleReport, MirrorHub};

/// Configuration for the cycle scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between cycles.
    pub interval: Duration,
    /// Maximum number of consecutive failures before backing off.
    pub max_failures: u32,
    /// Backoff multiplier for failures.
    pub backoff_multiplier: f64,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_failures: 3,
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(1800),
        }
    }
}

/// Receives the result of every scheduled cycle.
pub trait CycleObserver: Send + Sync {
    fn cycle_completed(&self, report: &CycleReport);

    fn cycle_failed(&self, error: &RolloutError, elapsed: Duration);
}

/// Requests a cycle outside the regular interval.
///
/// Triggers fired while a cycle is running coalesce into a single pending
/// cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleTrigger {
    notify: Arc<Notify>,
}

impl CycleTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a cycle as soon as the current one (if any) finishes.
    pub fn fire(&self) {
        self.notify.notify_one();
    }

    /// Completes once a cycle has been requested, consuming the request.
    pub async fn fired(&self) {
        self.notify.notified().await;
    }
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    /// Sender to signal shutdown.
    shutdown_tx: watch::Sender<bool>,
    trigger: CycleTrigger,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signals the scheduler to stop after the current cycle.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Returns the trigger of the running scheduler.
    pub fn trigger(&self) -> CycleTrigger {
        self.trigger.clone()
    }

    /// Stops the scheduler and waits for its task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs hub cycles on an interval and on demand.
pub struct CycleScheduler {
    /// The hub to drive.
    hub: Arc<MirrorHub>,
    /// Configuration.
    config: SchedulerConfig,
    trigger: CycleTrigger,
    observer: Option<Arc<dyn CycleObserver>>,
    /// Current delay between cycles.
    current_backoff: Mutex<Duration>,
}

impl CycleScheduler {
    /// Creates a new scheduler.
    pub fn new(hub: Arc<MirrorHub>, config: SchedulerConfig) -> Self {
        Self {
            hub,
            current_backoff: Mutex::new(config.interval),
            config,
            trigger: CycleTrigger::new(),
            observer: None,
        }
    }

    /// Creates a scheduler with default configuration.
    pub fn with_defaults(hub: Arc<MirrorHub>) -> Self {
        Self::new(hub, SchedulerConfig::default())
    }

    /// Uses `trigger` instead of a private one.
    pub fn with_trigger(mut self, trigger: CycleTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Reports every cycle to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn CycleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns the trigger of this scheduler.
    pub fn trigger(&self) -> CycleTrigger {
        self.trigger.clone()
    }

    /// Returns the delay before the next scheduled cycle.
    pub fn current_delay(&self) -> Duration {
        *self.current_backoff.lock()
    }

    /// Starts the background task. The first cycle runs immediately.
    ///
    /// Returns a handle that can be used to stop the scheduler.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let trigger = self.trigger.clone();
        let task = tokio::spawn(self.run(shutdown_rx));

        SchedulerHandle {
            shutdown_tx,
            trigger,
            task: Some(task),
        }
    }

    /// Runs the scheduler loop.
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            "Starting cycle scheduler with interval {:?}",
            self.config.interval
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            self.run_once().await;

            let delay = self.current_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.trigger.fired() => {
                    debug!("Cycle triggered");
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Cycle scheduler shutting down");
    }

    /// Runs a single cycle and adjusts the backoff.
    pub async fn run_once(&self) {
        let started = Instant::now();

        match self.hub.run_cycle().await {
            Ok(report) => {
                self.reset_backoff();
                if let Some(observer) = &self.observer {
                    observer.cycle_completed(&report);
                }
            },
            Err(RolloutError::CycleInProgress) => {
                debug!("Skipping scheduled cycle, another is running");
            },
            Err(e) => {
                self.increase_backoff();
                if let Some(observer) = &self.observer {
                    observer.cycle_failed(&e, started.elapsed());
                }
            },
        }
    }

    /// Resets the backoff to the base interval.
    fn reset_backoff(&self) {
        let mut backoff = self.current_backoff.lock();
        *backoff = self.config.interval;
    }

    /// Increases the backoff duration after a failure.
    fn increase_backoff(&self) {
        let mut backoff = self.current_backoff.lock();
        let failure_count = self.hub.state().failure_count();

        if failure_count >= self.config.max_failures {
            // overflow, infinity and NaN all saturate at the ceiling
            let new_backoff =
                Duration::try_from_secs_f64(backoff.as_secs_f64() * self.config.backoff_multiplier)
                    .unwrap_or(self.config.max_backoff);
            *backoff = new_backoff.min(self.config.max_backoff);

            debug!(
                "Increased backoff to {:?} after {} failures",
                *backoff, failure_count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.max_failures, 3);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert_eq!(config.max_backoff, Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn test_triggers_coalesce() {
        let trigger = CycleTrigger::new();
        trigger.fire();
        trigger.fire();
        trigger.fire();

        tokio::time::timeout(Duration::from_millis(50), trigger.fired())
            .await
            .unwrap();
        let second = tokio::time::timeout(Duration::from_millis(50), trigger.fired()).await;
        assert!(second.is_err(), "only one pending trigger is kept");
    }

    #[test]
    fn test_handle_stop() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = SchedulerHandle {
            shutdown_tx,
            trigger: CycleTrigger::new(),
            task: None,
        };

        assert!(!*shutdown_rx.borrow());
        handle.stop();
        assert!(*shutdown_rx.borrow());
    }
}
