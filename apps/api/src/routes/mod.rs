pub mod health;
pub mod murals;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::index_handler))
        .route("/health", get(health::health_handler))
        .route("/api/murals", post(murals::handle_murals))
        .route("/api/accurate-grid", post(murals::handle_accurate_grid))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::catalog::records::CatalogRecord;
    use crate::catalog::{Catalog, CoverUrls};
    use crate::layout::SearchStrategy;
    use crate::page_images::PageImageMap;
    use crate::publish::{ObjectStore, PublishError, Publisher};
    use crate::render::fetch::FetchError;
    use crate::render::{FetchOptions, PageSource};

    struct NoPages;

    #[async_trait]
    impl PageSource for NoPages {
        async fn fetch(&self, _url: &str) -> Result<Bytes, FetchError> {
            Err(FetchError::Status(404))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put(&self, key: &str, _body: Vec<u8>, _ct: &str) -> Result<(), PublishError> {
            self.keys.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    fn record(handle: &str, title: &str, pages: &str) -> CatalogRecord {
        CatalogRecord {
            handle: handle.to_string(),
            title: title.to_string(),
            pages: pages.to_string(),
            page_width_cm: "21".to_string(),
            page_height_cm: "29.7".to_string(),
            cover_url: String::new(),
        }
    }

    fn state(publisher: Publisher) -> AppState {
        AppState {
            catalog: Arc::new(Catalog::new(vec![
                record("four_pages", "Four Pages (4)", "4"),
                record("forty_pages", "Forty Pages (40)", "40"),
                record("broken", "Broken", "n/a"),
            ])),
            page_images: Arc::new(PageImageMap::new(HashMap::new())),
            covers: CoverUrls::new("https://covers.example/{handle}.jpg"),
            layout_strategy: SearchStrategy::FirstFit,
            page_source: Arc::new(NoPages),
            fetch_options: FetchOptions::default(),
            publisher,
        }
    }

    fn configured() -> Publisher {
        Publisher::new(
            Arc::new(MemoryStore::default()),
            "https://pub.example.dev",
            "previews",
        )
    }

    async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(state(configured()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_murals_lists_only_fitting_texts() {
        let app = build_router(state(configured()));
        let (status, body) = post(
            app,
            "/api/murals",
            json!({ "wall_width": 110, "wall_height": "50" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let eligible = body["eligible"].as_array().unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0]["handle"], "four_pages");
        assert_eq!(eligible[0]["grid"], "1x4");
        assert_eq!(
            eligible[0]["cover_url"],
            "https://covers.example/four_pages.jpg"
        );
    }

    #[tokio::test]
    async fn test_murals_rejects_invalid_dimensions() {
        for body in [
            json!({ "wall_width": 0, "wall_height": 50 }),
            json!({ "wall_height": 50 }),
            json!({ "wall_width": "wide", "wall_height": 50 }),
        ] {
            let app = build_router(state(configured()));
            let (status, body) = post(app, "/api/murals", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_accurate_grid_publishes_preview() {
        let app = build_router(state(configured()));
        let (status, body) = post(
            app,
            "/api/accurate-grid",
            json!({ "handle": "four_pages", "wall_width": 110, "wall_height": 50 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["grid_url"],
            "https://pub.example.dev/previews/four_pages_grid.png"
        );
        assert_eq!(body["pages_fetched"], 0);
        assert_eq!(body["pages_missing"], json!([1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn test_accurate_grid_unknown_or_ineligible_handle() {
        let app = build_router(state(configured()));
        let (status, _) = post(
            app,
            "/api/accurate-grid",
            json!({ "handle": "nope", "wall_width": 110, "wall_height": 50 }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let app = build_router(state(configured()));
        let (status, _) = post(
            app,
            "/api/accurate-grid",
            json!({ "handle": "forty_pages", "wall_width": 110, "wall_height": 50 }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_accurate_grid_uses_first_eligible_duplicate() {
        let mut state = state(configured());
        state.catalog = Arc::new(Catalog::new(vec![
            record("dup", "Dup Long (40)", "40"),
            record("dup", "Dup Short (4)", "4"),
        ]));
        let (status, body) = post(
            build_router(state),
            "/api/accurate-grid",
            json!({ "handle": "dup", "wall_width": 110, "wall_height": 50 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["grid_url"], "https://pub.example.dev/previews/dup_grid.png");
        assert_eq!(body["pages_missing"], json!([1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn test_accurate_grid_without_storage() {
        let app = build_router(state(Publisher::unconfigured()));
        let (status, body) = post(
            app,
            "/api/accurate-grid",
            json!({ "handle": "four_pages", "wall_width": 110, "wall_height": 50 }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "STORAGE_NOT_CONFIGURED");
    }
}
