//! Application state.

use std::sync::Arc;

use gitrollout_git::{CycleTrigger, HubState};
use metrics_exporter_prometheus::PrometheusHandle;

/// State shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    hub_state: Arc<HubState>,
    trigger: CycleTrigger,
    prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Creates state for a running scheduler.
    pub fn new(hub_state: Arc<HubState>, trigger: CycleTrigger) -> Self {
        Self {
            hub_state,
            trigger,
            prometheus: None,
        }
    }

    /// Exposes `handle` on `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    pub fn hub_state(&self) -> &HubState {
        self.hub_state.as_ref()
    }

    pub fn trigger(&self) -> &CycleTrigger {
        &self.trigger
    }

    pub fn prometheus(&self) -> Option<&PrometheusHandle> {
        self.prometheus.as_ref()
    }
}
