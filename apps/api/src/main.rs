mod catalog;
mod config;
mod errors;
mod layout;
mod page_images;
mod publish;
mod render;
mod routes;
mod state;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::catalog::{load_catalog, Catalog, CoverUrls};
use crate::config::{Config, StorageConfig};
use crate::page_images::PageImageMap;
use crate::publish::{Publisher, S3ObjectStore};
use crate::render::HttpPageSource;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; malformed values abort startup.
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mural API v{}", env!("CARGO_PKG_VERSION"));

    // Catalog and page image map are read once; the service still answers with
    // whatever loaded, so a missing file is logged rather than fatal.
    let catalog = load_catalog(&config.catalog_path).unwrap_or_else(|e| {
        warn!("Catalog unavailable, serving an empty catalog: {e}");
        Catalog::default()
    });
    if catalog.is_empty() {
        warn!("Catalog has no usable records; /api/murals will return an empty list");
    }
    let page_images = PageImageMap::load(&config.cdn_map_path).unwrap_or_else(|e| {
        warn!("Page image map unavailable, every page will be a placeholder: {e}");
        PageImageMap::default()
    });
    if page_images.is_empty() {
        warn!("Page image map is empty; previews will contain only placeholders");
    }

    let publisher = match &config.storage {
        Some(storage) => {
            let s3 = build_s3_client(storage).await;
            info!("S3 client initialized for bucket {}", storage.bucket);
            Publisher::new(
                Arc::new(S3ObjectStore::new(s3, &storage.bucket)),
                &storage.public_base_url,
                &storage.prefix,
            )
        }
        None => {
            warn!("R2 storage not configured; grid generation will fail");
            Publisher::unconfigured()
        }
    };

    let page_source = HttpPageSource::new(config.fetch_timeout)
        .context("Failed to build HTTP client for page fetches")?;

    info!(
        "Layout strategy: {:?}, fetch concurrency: {}, fetch timeout: {:?}",
        config.layout_strategy, config.fetch_concurrency, config.fetch_timeout
    );

    // Build app state
    let state = AppState {
        catalog: Arc::new(catalog),
        page_images: Arc::new(page_images),
        covers: CoverUrls::new(&config.cover_url_template),
        layout_strategy: config.layout_strategy,
        page_source: Arc::new(page_source),
        fetch_options: config.fetch_options(),
        publisher,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(config.cors_origin.as_deref())?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client for an S3-compatible endpoint (R2, MinIO, AWS).
/// Static credentials are used when both keys are set; otherwise the default chain.
async fn build_s3_client(storage: &StorageConfig) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(storage.region.clone()))
        .endpoint_url(&storage.endpoint);

    if let (Some(key_id), Some(secret)) = (&storage.access_key_id, &storage.secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            key_id,
            secret,
            None,
            None,
            "mural-static",
        ));
    }

    aws_sdk_s3::Client::new(&loader.load().await)
}

fn build_cors(origin: Option<&str>) -> Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin: HeaderValue = origin
        .parse()
        .with_context(|| format!("CORS_ORIGIN '{origin}' is not a valid header value"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}
