//! Catalog loading — one CSV row per printed text.
//!
//! Numeric columns are kept as raw strings here. They are validated per request by the
//! filter, so a single malformed row degrades to "skipped" instead of failing the load.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::layout::PageSpec;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to open catalog {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Why a single record cannot take part in a layout search.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("invalid page count '{0}'")]
    PageCount(String),

    #[error("invalid page width '{0}'")]
    PageWidth(String),

    #[error("invalid page height '{0}'")]
    PageHeight(String),
}

/// A catalog row as it appears in the source CSV.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogRecord {
    #[serde(rename = "Handle", default)]
    pub handle: String,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Pages", default)]
    pub pages: String,
    #[serde(rename = "Page Width (cm)", default)]
    pub page_width_cm: String,
    #[serde(rename = "Page Height (cm)", default)]
    pub page_height_cm: String,
    /// Explicit cover image; falls back to the configured template when empty.
    #[serde(rename = "Cover URL", default)]
    pub cover_url: String,
}

impl CatalogRecord {
    /// Parses the numeric columns into a `PageSpec`.
    ///
    /// Page count must be a positive integer (a trailing `.0` is tolerated, as spreadsheet
    /// exports often write one); dimensions must be positive finite numbers.
    pub fn page_spec(&self) -> Result<PageSpec, RecordError> {
        let count = parse_count(&self.pages).ok_or_else(|| RecordError::PageCount(self.pages.clone()))?;
        let width = parse_dimension(&self.page_width_cm)
            .ok_or_else(|| RecordError::PageWidth(self.page_width_cm.clone()))?;
        let height = parse_dimension(&self.page_height_cm)
            .ok_or_else(|| RecordError::PageHeight(self.page_height_cm.clone()))?;

        Ok(PageSpec {
            width,
            height,
            count,
        })
    }
}

/// The immutable record set consulted by every filter request.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
}

impl Catalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads the catalog CSV. Rows that cannot be deserialized, or whose page count and
/// dimensions do not parse, are logged once here and left out of the catalog.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog, CatalogError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| CatalogError::Open {
            path: path.display().to_string(),
            source,
        })?;

    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<CatalogRecord>().enumerate() {
        match row {
            Ok(record) => match record.page_spec() {
                Ok(_) => records.push(record),
                Err(e) => warn!("Skipping catalog row {} ('{}'): {e}", line + 2, record.handle),
            },
            Err(e) => warn!("Skipping catalog row {}: {e}", line + 2),
        }
    }

    info!("Loaded {} catalog records from {}", records.len(), path.display());
    Ok(Catalog::new(records))
}

fn parse_count(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(".0").unwrap_or(raw);
    raw.parse::<u32>().ok().filter(|&n| n > 0)
}

fn parse_dimension(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
