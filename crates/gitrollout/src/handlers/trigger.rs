//! Manual cycle trigger.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
    pub phase: &'static str,
}

/// Requests a cycle. Requests made while a cycle runs collapse into one.
pub async fn trigger_cycle(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    let phase = state.hub_state().phase();
    info!(%phase, "Cycle requested over HTTP");
    state.trigger().fire();

    (
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            status: "ACCEPTED",
            phase: phase.as_str(),
        }),
    )
}
