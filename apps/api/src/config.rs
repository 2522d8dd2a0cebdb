use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::warn;

use crate::catalog::filter::DEFAULT_COVER_URL_TEMPLATE;
use crate::layout::SearchStrategy;
use crate::publish::{derive_public_base, DEFAULT_PREFIX};
use crate::render::fetch::{DEFAULT_FETCH_CONCURRENCY, DEFAULT_MAX_RETRIES};
use crate::render::FetchOptions;

/// Application configuration loaded from environment variables.
/// Only malformed values fail startup; everything has a default or is optional.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub catalog_path: String,
    pub cdn_map_path: String,
    pub cover_url_template: String,
    pub layout_strategy: SearchStrategy,
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
    /// Allowed browser origin for `/api/*`. Permissive CORS when unset.
    pub cors_origin: Option<String>,
    /// `None` disables publishing; grid requests then fail with a clear error.
    pub storage: Option<StorageConfig>,
}

/// S3-compatible bucket the previews are written to.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub prefix: String,
    /// User-facing base URL; never the authenticated upload endpoint.
    pub public_base_url: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the process env.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            port: var("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            catalog_path: var("CATALOG_PATH")
                .unwrap_or_else(|| "mural_master_regenerated.csv".to_string()),
            cdn_map_path: var("CDN_MAP_PATH").unwrap_or_else(|| "cdn_map.json".to_string()),
            cover_url_template: var("COVER_URL_TEMPLATE")
                .unwrap_or_else(|| DEFAULT_COVER_URL_TEMPLATE.to_string()),
            layout_strategy: match var("LAYOUT_STRATEGY") {
                Some(s) => s.parse::<SearchStrategy>().map_err(|e| anyhow!(e))?,
                None => SearchStrategy::default(),
            },
            fetch_concurrency: match var("FETCH_CONCURRENCY") {
                Some(s) => s
                    .parse::<usize>()
                    .ok()
                    .filter(|&n| n > 0)
                    .context("FETCH_CONCURRENCY must be a positive integer")?,
                None => DEFAULT_FETCH_CONCURRENCY,
            },
            fetch_timeout: Duration::from_secs(
                var("FETCH_TIMEOUT_SECS")
                    .unwrap_or_else(|| "30".to_string())
                    .parse::<u64>()
                    .context("FETCH_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            cors_origin: var("CORS_ORIGIN"),
            storage: storage_from(&var),
        })
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            concurrency: self.fetch_concurrency,
            timeout: self.fetch_timeout,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

fn storage_from(var: &impl Fn(&str) -> Option<String>) -> Option<StorageConfig> {
    let (endpoint, bucket) = match (var("R2_ENDPOINT_URL"), var("R2_BUCKET_NAME")) {
        (Some(endpoint), Some(bucket)) => (endpoint, bucket),
        (None, None) => return None,
        _ => {
            warn!("R2_ENDPOINT_URL and R2_BUCKET_NAME must both be set; publishing disabled");
            return None;
        }
    };

    let Some(public_base_url) =
        var("R2_PUBLIC_BASE_URL").or_else(|| derive_public_base(&endpoint, &bucket))
    else {
        warn!("Cannot derive a public base URL from '{endpoint}'; publishing disabled");
        return None;
    };

    Some(StorageConfig {
        region: var("R2_REGION").unwrap_or_else(|| "auto".to_string()),
        prefix: var("R2_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
        access_key_id: var("AWS_ACCESS_KEY_ID"),
        secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
        public_base_url,
        endpoint,
        bucket,
    })
}
