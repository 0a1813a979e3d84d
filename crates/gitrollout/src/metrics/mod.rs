//! Prometheus metrics for rollout cycles.

pub mod cycle;
pub mod setup;

pub use cycle::{MetricsObserver, register_cycle_metrics};
pub use setup::init_metrics;
