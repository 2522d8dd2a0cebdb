//! Catalog Filter — runs the layout solver over every record and keeps the ones that fit.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::catalog::records::CatalogRecord;
use crate::catalog::slug::slugify;
use crate::layout::{solve, Layout, SearchStrategy, WallSpec};

pub const DEFAULT_COVER_URL_TEMPLATE: &str =
    "https://cdn.shopify.com/s/files/1/0960/9930/3717/files/x{handle}.jpg";

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// A catalog record that fits the requested wall, joined with its solved layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub title: String,
    pub handle: String,
    pub slug: String,
    pub pages: u32,
    /// Raw page width in cm, before scaling.
    pub page_w: f64,
    /// Raw page height in cm, before scaling.
    pub page_h: f64,
    pub aspect_ratio: f64,
    /// Groups the per-page images of this text in the page image map.
    pub folder: String,
    pub cover_url: String,
    pub grid: String,
    pub scale: u32,
    #[serde(rename = "layout_details")]
    pub layout: Layout,
}

/// Builds cover image URLs from a template containing a `{handle}` placeholder.
#[derive(Debug, Clone)]
pub struct CoverUrls {
    template: String,
}

impl CoverUrls {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn cover_url(&self, handle: &str) -> String {
        self.template.replace("{handle}", handle)
    }
}

impl Default for CoverUrls {
    fn default() -> Self {
        Self::new(DEFAULT_COVER_URL_TEMPLATE)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Core functions
// ────────────────────────────────────────────────────────────────────────────

/// Returns every record whose pages can be laid out on `wall`, in input order.
///
/// Records with unusable numeric fields are logged and skipped; they never fail the batch.
pub fn filter_catalog(
    wall: WallSpec,
    records: &[CatalogRecord],
    covers: &CoverUrls,
    strategy: SearchStrategy,
) -> Vec<CatalogEntry> {
    let mut eligible = Vec::new();

    for record in records {
        let page = match record.page_spec() {
            Ok(page) => page,
            Err(e) => {
                debug!("Skipping catalog record '{}': {e}", record.handle);
                continue;
            }
        };

        let Some(layout) = solve(wall, page, strategy).into_layout() else {
            continue;
        };

        let handle = record.handle.trim().to_string();
        let title = record.title.trim().to_string();
        let cover_url = if record.cover_url.trim().is_empty() {
            covers.cover_url(&handle)
        } else {
            record.cover_url.trim().to_string()
        };

        eligible.push(CatalogEntry {
            slug: slugify(&handle),
            folder: folder_key(&title, page.count),
            aspect_ratio: round_to(page.width / page.height, 4),
            pages: page.count,
            page_w: page.width,
            page_h: page.height,
            cover_url,
            grid: layout.grid(),
            scale: layout.scale_pct,
            layout,
            title,
            handle,
        });
    }

    debug!(
        "{} of {} catalog records fit {}x{}",
        eligible.len(),
        records.len(),
        wall.width,
        wall.height
    );
    eligible
}

/// Drops entries whose slug was already seen, keeping the first occurrence.
pub fn dedup_by_slug(entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.slug.clone()))
        .collect()
}

/// Folder key of a text's page images: the title without any trailing `" (...)"`
/// suffix, followed by `" ({pages})"`.
pub fn folder_key(title: &str, pages: u32) -> String {
    let base = title.rsplit_once(" (").map_or(title, |(base, _)| base);
    format!("{base} ({pages})")
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
