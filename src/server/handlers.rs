//! Request handlers for the skin catalog API.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::error::ApiError;
use super::AppState;
use crate::catalog::CatalogSnapshot;
use crate::refresh::TriggerOutcome;

/// Read the catalog off the async workers.
async fn load_catalog(state: &AppState) -> CatalogSnapshot {
    let reader = state.catalog.clone();
    tokio::task::spawn_blocking(move || reader.load_all())
        .await
        .unwrap_or_default()
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// Every cached skin record.
pub async fn list_skins(State(state): State<AppState>) -> Response {
    let snapshot = load_catalog(&state).await;
    if snapshot.is_empty() {
        return Json(json!({
            "message": "No skins in cache. Trigger /refresh to populate cache.",
            "skins": [],
        }))
        .into_response();
    }
    Json(snapshot.records).into_response()
}

/// Start a background refresh unless one is running.
pub async fn trigger_refresh(State(state): State<AppState>) -> impl IntoResponse {
    match state.orchestrator.trigger() {
        TriggerOutcome::Started => Json(json!({
            "message": "Cache refresh started in background",
            "status": "Check /refresh/status for progress",
        })),
        TriggerOutcome::AlreadyRunning(status) => Json(json!({
            "message": "Cache refresh already in progress",
            "status": status,
        })),
    }
}

pub async fn refresh_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.status())
}

/// Skins of one hero, matched case-insensitively.
pub async fn character_skins(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = load_catalog(&state).await;
    let skins = snapshot.find_by_character(&name);
    if skins.is_empty() {
        return Err(ApiError::NotFound(format!("Character '{}' not found", name)));
    }
    Ok(Json(json!({ "character": name, "skins": skins })))
}

/// A single skin by numeric ID, matched exactly as written.
pub async fn skin_by_id(
    State(state): State<AppState>,
    Path(skin_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_numeric_id(&skin_id) {
        return Err(ApiError::BadRequest(format!("Invalid skin ID '{}'", skin_id)));
    }

    let snapshot = load_catalog(&state).await;
    match snapshot.find_by_skin_id(&skin_id) {
        Some(record) => Ok(Json(record.clone())),
        None => Err(ApiError::NotFound(format!(
            "Skin with ID {} not found",
            skin_id
        ))),
    }
}

/// Non-empty and ASCII digits only; no sign, no whitespace.
fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Skins whose name contains the fragment, ignoring case.
pub async fn skins_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = load_catalog(&state).await;
    let matches: Vec<_> = snapshot
        .find_by_skin_name(&name)
        .into_iter()
        .cloned()
        .collect();
    if matches.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No skins found matching '{}'",
            name
        )));
    }
    Ok(Json(matches))
}
