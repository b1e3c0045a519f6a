use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "culturefit-api"
    }))
}

/// GET /api/culture-fit/health
/// Reports which optional collaborators are wired in.
pub async fn culture_fit_health_handler(State(state): State<AppState>) -> Json<Value> {
    let pipeline = &state.pipeline;
    Json(json!({
        "status": "ok",
        "organizations": pipeline.catalog.names(),
        "persistence": pipeline.store.is_some() && pipeline.settings.save_to_db,
        "record_store": pipeline.store.is_some(),
    }))
}
