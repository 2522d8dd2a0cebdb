//! Grid Compositor — assembles a low-resolution preview of a solved mural.
//!
//! # Pipeline
//! 1. Derive pixel geometry from the layout (`PREVIEW_SCALE` px per cm).
//! 2. Resolve every page URL through the page image map.
//! 3. Fetch all pages concurrently (`fetch::fetch_all`); failures become `None`.
//! 4. Decode, stretch each page to its cell, paste row-major onto a white canvas.
//!    Missing or undecodable pages get a placeholder tile.
//!
//! Step 4 is CPU-bound and runs inside `tokio::task::spawn_blocking`.

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use thiserror::Error;
use tracing::{info, warn};

use crate::layout::Layout;
use crate::page_images::{page_key, PageImageMap};
use crate::render::fetch::{fetch_all, FetchOptions, PageSource};
use crate::render::placeholder::placeholder_tile;

/// Preview pixels per wall unit (cm). Deliberately low: this is a preview, not print output.
pub const PREVIEW_SCALE: f64 = 10.0;

const CANVAS_BACKGROUND: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("image assembly task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// Pixel geometry of a preview canvas, derived deterministically from a `Layout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub rows: u32,
    pub cols: u32,
    pub cell_w: u32,
    pub cell_h: u32,
    pub margin_x: u32,
    pub margin_y: u32,
    pub gap: u32,
}

impl GridGeometry {
    pub fn from_layout(layout: &Layout) -> Self {
        Self {
            rows: layout.rows,
            cols: layout.cols,
            cell_w: to_px(layout.page_w),
            cell_h: to_px(layout.page_h),
            margin_x: to_px(layout.margin_x),
            margin_y: to_px(layout.margin_y),
            gap: layout.row_gap * PREVIEW_SCALE as u32,
        }
    }

    pub fn cells(&self) -> u32 {
        self.rows * self.cols
    }

    /// Columns are butted, so only rows are separated by `gap`.
    pub fn canvas_size(&self) -> (u32, u32) {
        let width = 2 * self.margin_x + self.cols * self.cell_w;
        let height =
            2 * self.margin_y + self.rows * self.cell_h + self.rows.saturating_sub(1) * self.gap;
        (width, height)
    }

    /// Top-left corner of the cell for 0-based page index `idx`, row-major.
    pub fn cell_origin(&self, idx: u32) -> (u32, u32) {
        let row = idx / self.cols;
        let col = idx % self.cols;
        (
            self.margin_x + col * self.cell_w,
            self.margin_y + row * (self.cell_h + self.gap),
        )
    }
}

fn to_px(length: f64) -> u32 {
    (length * PREVIEW_SCALE).round().max(0.0) as u32
}

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

/// A finished preview plus what went into it.
#[derive(Debug, Clone)]
pub struct ComposedImage {
    pub image: RgbImage,
    /// Pages that were fetched and decoded successfully.
    pub fetched: usize,
    /// 1-based numbers of pages drawn as placeholders.
    pub missing: Vec<u32>,
}

// ────────────────────────────────────────────────────────────────────────────
// Core functions
// ────────────────────────────────────────────────────────────────────────────

/// Composes the preview for `page_count` pages of `folder` laid out per `layout`.
///
/// Individual page failures only degrade their own cell; the canvas is always full-size.
pub async fn compose(
    folder: &str,
    page_count: u32,
    layout: &Layout,
    page_images: &PageImageMap,
    source: &dyn PageSource,
    options: FetchOptions,
) -> Result<ComposedImage, ComposeError> {
    let geometry = GridGeometry::from_layout(layout);

    let placeable = page_count.min(geometry.cells());
    if placeable < page_count {
        warn!(
            "Layout {} holds {} cells but '{}' has {} pages; extra pages are dropped",
            layout.grid(),
            geometry.cells(),
            folder,
            page_count
        );
    }

    let urls: Vec<Option<String>> = (1..=placeable)
        .map(|page_num| {
            let url = page_images.page_url(folder, page_num).map(String::from);
            if url.is_none() {
                warn!("Page image map missing: {}", page_key(folder, page_num));
            }
            url
        })
        .collect();

    let pages = fetch_all(source, urls, options).await;
    let fetched_bytes = pages.iter().filter(|p| p.is_some()).count();
    info!(
        "Fetched {} of {} pages for '{}'",
        fetched_bytes,
        pages.len(),
        folder
    );

    let composed = tokio::task::spawn_blocking(move || assemble(geometry, pages)).await?;
    Ok(composed)
}

/// Decodes, resizes and pastes every page slot. Slot `i` is page `i + 1`.
pub fn assemble(geometry: GridGeometry, pages: Vec<Option<Bytes>>) -> ComposedImage {
    let (canvas_w, canvas_h) = geometry.canvas_size();
    let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, CANVAS_BACKGROUND);
    let mut fetched = 0;
    let mut missing = Vec::new();

    for (idx, page) in pages.into_iter().enumerate() {
        let idx = idx as u32;
        let page_num = idx + 1;

        let tile = match page.as_deref().map(|bytes| decode_tile(bytes, &geometry)) {
            Some(Ok(tile)) => {
                fetched += 1;
                tile
            }
            Some(Err(e)) => {
                warn!("Page {page_num} could not be decoded: {e}");
                missing.push(page_num);
                placeholder_tile(geometry.cell_w, geometry.cell_h, page_num)
            }
            None => {
                missing.push(page_num);
                placeholder_tile(geometry.cell_w, geometry.cell_h, page_num)
            }
        };

        let (x, y) = geometry.cell_origin(idx);
        imageops::replace(&mut canvas, &tile, i64::from(x), i64::from(y));
    }

    ComposedImage {
        image: canvas,
        fetched,
        missing,
    }
}

/// Decodes one page and stretches it to exactly fill a cell.
fn decode_tile(bytes: &[u8], geometry: &GridGeometry) -> image::ImageResult<RgbImage> {
    let page = image::load_from_memory(bytes)?.to_rgb8();
    if geometry.cell_w == 0 || geometry.cell_h == 0 {
        return Ok(RgbImage::new(geometry.cell_w, geometry.cell_h));
    }
    Ok(imageops::resize(
        &page,
        geometry.cell_w,
        geometry.cell_h,
        FilterType::Lanczos3,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
