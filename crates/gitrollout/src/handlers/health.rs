use axum::{Json, extract::State, http::StatusCode};
use gitrollout_git::HubStatus;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub hub: HubStatus,
}

impl HealthResponse {
    /// `UP` after a clean cycle, `STARTING` before the first cycle settles,
    /// `DOWN` once a cycle has failed.
    pub fn from_status(hub: HubStatus) -> Self {
        let status = if hub.healthy {
            "UP"
        } else if hub.cycles_completed == 0 && hub.failure_count == 0 {
            "STARTING"
        } else {
            "DOWN"
        };
        Self { status, hub }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.status {
            "DOWN" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::OK,
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let response = HealthResponse::from_status(state.hub_state().status());
    (response.status_code(), Json(response))
}
