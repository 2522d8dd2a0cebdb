//! Axum route handlers for the Mural API.

use axum::{extract::State, Json};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::catalog::{dedup_by_slug, filter_catalog, CatalogEntry};
use crate::errors::AppError;
use crate::layout::WallSpec;
use crate::render::compose;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MuralsRequest {
    #[serde(default, deserialize_with = "lenient_number")]
    pub wall_width: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub wall_height: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct MuralsResponse {
    pub eligible: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct GridRequest {
    #[serde(default)]
    pub handle: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub wall_width: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub wall_height: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct GridResponse {
    pub grid_url: String,
    pub pages_fetched: usize,
    pub pages_missing: Vec<u32>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/murals
pub async fn handle_murals(
    State(state): State<AppState>,
    Json(req): Json<MuralsRequest>,
) -> Result<Json<MuralsResponse>, AppError> {
    let wall = wall_spec(req.wall_width, req.wall_height)?;
    let eligible = filter_catalog(
        wall,
        state.catalog.records(),
        &state.covers,
        state.layout_strategy,
    );
    let eligible = dedup_by_slug(eligible);
    info!(
        "{} murals fit a {}x{} wall",
        eligible.len(),
        wall.width,
        wall.height
    );
    Ok(Json(MuralsResponse { eligible }))
}

/// POST /api/accurate-grid
pub async fn handle_accurate_grid(
    State(state): State<AppState>,
    Json(req): Json<GridRequest>,
) -> Result<Json<GridResponse>, AppError> {
    let wall = wall_spec(req.wall_width, req.wall_height)?;
    let handle = req.handle.trim();
    if handle.is_empty() {
        return Err(AppError::Validation("handle is required".to_string()));
    }

    // Duplicate handles are possible; the first one that fits the wall wins.
    let candidates: Vec<_> = state
        .catalog
        .records()
        .iter()
        .filter(|r| r.handle.trim() == handle)
        .cloned()
        .collect();
    if candidates.is_empty() {
        return Err(AppError::NotFound(format!("Mural '{handle}' not found")));
    }

    let entry = filter_catalog(wall, &candidates, &state.covers, state.layout_strategy)
        .into_iter()
        .next()
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Mural '{handle}' has no eligible layout for a {}x{} wall",
                wall.width, wall.height
            ))
        })?;

    info!(
        "Generating grid for {} ({}) at {}x{}",
        entry.handle,
        entry.grid,
        wall.width,
        wall.height
    );

    let composed = compose(
        &entry.folder,
        entry.pages,
        &entry.layout,
        &state.page_images,
        state.page_source.as_ref(),
        state.fetch_options,
    )
    .await?;

    let grid_url = state
        .publisher
        .publish(&entry.handle, composed.image)
        .await?;

    Ok(Json(GridResponse {
        grid_url,
        pages_fetched: composed.fetched,
        pages_missing: composed.missing,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

fn wall_spec(width: Option<f64>, height: Option<f64>) -> Result<WallSpec, AppError> {
    match (width, height) {
        (Some(width), Some(height))
            if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 =>
        {
            Ok(WallSpec { width, height })
        }
        _ => Err(AppError::Validation(
            "wall_width and wall_height must be positive numbers".to_string(),
        )),
    }
}

/// Accepts `120`, `120.5`, `"120"` or `null`. Anything else unparsable becomes `None`,
/// which the handlers report as a validation error rather than a rejected body.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        Some(Raw::Other(_)) | None => None,
    })
}
