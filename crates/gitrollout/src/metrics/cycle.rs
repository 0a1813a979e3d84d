//! Cycle metrics recording.

use std::time::Duration;

use gitrollout_core::RolloutError;
use gitrollout_git::{CycleObserver, CycleReport};
use metrics::{counter, gauge, histogram};

/// Describes the cycle metrics. Call once at startup.
pub fn register_cycle_metrics() {
    metrics::describe_counter!(
        "gitrollout_cycles_total",
        "Total number of cycles by outcome"
    );
    metrics::describe_counter!(
        "gitrollout_events_total",
        "Total number of change events by category, kind and status"
    );
    metrics::describe_histogram!(
        "gitrollout_cycle_duration_seconds",
        "Time spent on a cycle"
    );
    metrics::describe_gauge!(
        "gitrollout_consecutive_failures",
        "Number of consecutive aborted cycles"
    );
}

/// Records scheduler results as Prometheus metrics.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    failures: parking_lot::Mutex<u32>,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome label of a completed cycle.
    pub fn outcome(report: &CycleReport) -> &'static str {
        if report.is_clean() { "settled" } else { "partial" }
    }
}

impl CycleObserver for MetricsObserver {
    fn cycle_completed(&self, report: &CycleReport) {
        counter!("gitrollout_cycles_total", "outcome" => Self::outcome(report)).increment(1);
        histogram!("gitrollout_cycle_duration_seconds").record(report.duration.as_secs_f64());

        for outcome in report.outcomes() {
            counter!(
                "gitrollout_events_total",
                "category" => outcome.event.category().as_str(),
                "kind" => outcome.event.kind().as_str(),
                "status" => outcome.status.as_str()
            )
            .increment(1);
        }

        *self.failures.lock() = 0;
        gauge!("gitrollout_consecutive_failures").set(0.0);
    }

    fn cycle_failed(&self, _error: &RolloutError, elapsed: Duration) {
        counter!("gitrollout_cycles_total", "outcome" => "failed").increment(1);
        histogram!("gitrollout_cycle_duration_seconds").record(elapsed.as_secs_f64());

        let mut failures = self.failures.lock();
        *failures += 1;
        gauge!("gitrollout_consecutive_failures").set(f64::from(*failures));
    }
}
