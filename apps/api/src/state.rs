use std::sync::Arc;

use crate::catalog::{Catalog, CoverUrls};
use crate::layout::SearchStrategy;
use crate::page_images::PageImageMap;
use crate::publish::Publisher;
use crate::render::{FetchOptions, PageSource};

/// Shared application state injected into all route handlers via Axum extractors.
/// Everything here is built once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub page_images: Arc<PageImageMap>,
    pub covers: CoverUrls,
    pub layout_strategy: SearchStrategy,
    /// Where page images are downloaded from. Default: `HttpPageSource`.
    pub page_source: Arc<dyn PageSource>,
    pub fetch_options: FetchOptions,
    pub publisher: Publisher,
}
