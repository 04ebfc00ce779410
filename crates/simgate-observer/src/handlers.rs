//! REST endpoint handlers for the observer API.
//!
//! Cache calls block until the simulation thread answers, so every cache
//! call runs on the blocking pool via [`spawn_blocking`](tokio::task::spawn_blocking).
//! A kind without operations in the [`OperationTable`](simgate_core::OperationTable)
//! answers `404` exactly like an unknown kind.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/status` | Host and bridge status |
//! | `GET` | `/api/operations` | Exposed operations |
//! | `GET` | `/api/integrations` | Optional integrations |
//! | `GET` | `/api/{kind}` | List objects (`?details=true` for full) |
//! | `GET` | `/api/{kind}/{id}` | One object (`?details=true` for full) |
//! | `POST` | `/api/{kind}/{id}/invoke` | Run a method on one object |
//!
//! Operator routes live in [`operator`](crate::operator).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde_json::{Map, Value};
use simgate_core::{SnapshotService, Verb};
use simgate_types::{DetailLevel, ObjectKind, Snapshot};
use tracing::debug;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Query parameters for the read endpoints.
#[derive(Debug, Default, serde::Deserialize)]
pub struct DetailQuery {
    /// Capture every field instead of the headline fields.
    #[serde(default)]
    pub details: bool,
}

impl DetailQuery {
    const fn level(&self) -> DetailLevel {
        DetailLevel::from_flag(self.details)
    }
}

/// Body of `POST /api/{kind}/{id}/invoke`.
#[derive(Debug, serde::Deserialize)]
pub struct InvokeRequest {
    /// Method name.
    pub method: String,
    /// Named arguments.
    #[serde(default)]
    pub params: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Status endpoints
// ---------------------------------------------------------------------------

/// Host and bridge status.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let host = state.control.as_ref().map(|control| control.status());
    let bridge = state.bridge_stats.as_ref().map(|stats| stats());
    Json(serde_json::json!({
        "host": host,
        "bridge": bridge,
    }))
}

/// Every exposed operation.
pub async fn list_operations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "count": state.operations.len(),
        "operations": &*state.operations,
    }))
}

/// Optional integrations and whether each is active.
pub async fn list_integrations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "integrations": state.integrations,
    }))
}

// ---------------------------------------------------------------------------
// Object endpoints
// ---------------------------------------------------------------------------

/// List every object of a kind.
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let kind = exposed_kind(&state, &kind, Verb::List)?;
    let detail = query.level();
    let snapshots = blocking(&state, move |service| service.list(kind, detail)).await?;
    debug!(%kind, count = snapshots.len(), "Listed objects");

    let objects: Vec<&Snapshot> = snapshots.iter().map(AsRef::as_ref).collect();
    Ok(Json(serde_json::json!({
        "count": objects.len(),
        "objects": objects,
    })))
}

/// One object.
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<DetailQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    exposed_kind(&state, &kind, Verb::Get)?;
    let key = state.snapshots.parse_key(&kind, &id)?;
    let detail = query.level();
    let snapshot = blocking(&state, move |service| service.get(&key, detail)).await?;
    Ok(Json(serde_json::to_value(&*snapshot)?))
}

/// Run a registered method on one object.
pub async fn invoke_method(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Json(request): Json<InvokeRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    exposed_kind(&state, &kind, Verb::Invoke)?;
    let key = state.snapshots.parse_key(&kind, &id)?;
    let InvokeRequest { method, params } = request;
    let name = method.clone();
    let result = blocking(&state, move |service| service.invoke(&key, &method, &params)).await?;

    Ok(Json(serde_json::json!({
        "method": name,
        "result": result,
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve `name` to a kind that has at least one `verb` operation.
///
/// Invoke checks the method itself in the cache, which rejects unknown
/// methods before queueing anything.
fn exposed_kind(state: &AppState, name: &str, verb: Verb) -> Result<ObjectKind, ObserverError> {
    state
        .snapshots
        .kind_named(name)
        .filter(|kind| state.operations.iter().any(|op| op.kind == *kind && op.verb == verb))
        .ok_or_else(|| ObserverError::NotFound(format!("no such kind '{name}'")))
}

/// Run a cache call on the blocking pool.
async fn blocking<T, F>(state: &AppState, call: F) -> Result<T, ObserverError>
where
    T: Send + 'static,
    F: FnOnce(&dyn SnapshotService) -> Result<T, simgate_core::SimError> + Send + 'static,
{
    let service = Arc::clone(&state.snapshots);
    let result = tokio::task::spawn_blocking(move || call(service.as_ref()))
        .await
        .map_err(|e| ObserverError::Internal(format!("request worker failed: {e}")))?;
    result.map_err(ObserverError::from)
}
