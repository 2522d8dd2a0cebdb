use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /
pub async fn index_handler() -> &'static str {
    "Mural API is running"
}

/// GET /health
/// Returns service status plus the size of the loaded catalog and page image map.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "mural-api",
        "catalog_records": state.catalog.len(),
        "page_images": state.page_images.len(),
        "publishing": state.publisher.is_configured(),
    }))
}
