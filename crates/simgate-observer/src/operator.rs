//! Operator endpoints for runtime control of the simulation host.
//!
//! These write to the shared [`HostControl`](simgate_core::HostControl).
//! A paused host keeps answering reads and invokes; only ticks stop.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/operator/pause` | Pause ticking |
//! | `POST` | `/api/operator/resume` | Resume ticking |
//! | `POST` | `/api/operator/speed` | Set the tick interval (ms) |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use simgate_core::control::MIN_TICK_INTERVAL_MS;
use simgate_core::{HostControl, SimError};
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

/// Body of `POST /api/operator/speed`.
#[derive(Debug, serde::Deserialize)]
pub struct SetSpeedRequest {
    /// New tick interval in milliseconds.
    pub tick_interval_ms: u64,
}

/// Pause ticking.
pub async fn pause(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ObserverError> {
    let control = control(&state)?;
    control.pause();
    info!(tick = control.current_tick(), "Simulation paused by operator");
    Ok(Json(control.status()))
}

/// Resume ticking after a pause.
pub async fn resume(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ObserverError> {
    let control = control(&state)?;
    control.resume();
    info!(tick = control.current_tick(), "Simulation resumed by operator");
    Ok(Json(control.status()))
}

/// Change the tick interval. Takes effect from the next tick.
pub async fn set_speed(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetSpeedRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let control = control(&state)?;
    let previous = control
        .set_tick_interval_ms(body.tick_interval_ms)
        .ok_or_else(|| {
            SimError::invalid(format!(
                "tick_interval_ms must be at least {MIN_TICK_INTERVAL_MS}"
            ))
        })?;
    info!(
        previous_interval_ms = previous,
        new_interval_ms = body.tick_interval_ms,
        "Tick interval changed by operator"
    );
    Ok(Json(serde_json::json!({
        "previous_interval_ms": previous,
        "new_interval_ms": body.tick_interval_ms,
    })))
}

fn control(state: &AppState) -> Result<&HostControl, ObserverError> {
    state
        .control
        .as_deref()
        .ok_or_else(|| ObserverError::Internal(String::from("host control not available")))
}
