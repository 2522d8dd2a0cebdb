//! Layout Solver — finds a grid of scaled pages that sits centered on a wall.
//!
//! # Search space
//! - `scale_pct` 95..=105 (outer), `row_gap` 1..=5 (middle), `rows` 1..=bound (inner).
//! - `cols = ceil(count / rows)`; layouts whose last row would be empty are skipped.
//! - Columns are butted: no horizontal gap, the side margins absorb the slack.
//!
//! A configuration is accepted when both centering margins fall in the closed band
//! `[MARGIN_MIN, MARGIN_MAX]`. Worst case is 11 × 5 × rows-bound O(1) steps, so the
//! solver stays synchronous and is called straight from request handlers.

use serde::{Deserialize, Serialize, Serializer};

// ────────────────────────────────────────────────────────────────────────────
// Constants
// ────────────────────────────────────────────────────────────────────────────

pub const SCALE_MIN_PCT: u32 = 95;
pub const SCALE_MAX_PCT: u32 = 105;
pub const ROW_GAP_MIN: u32 = 1;
pub const ROW_GAP_MAX: u32 = 5;
/// Closed band for both centering margins, in wall units (cm).
pub const MARGIN_MIN: f64 = 5.0;
pub const MARGIN_MAX: f64 = 16.0;

const EPSILON: f64 = 1e-9;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Wall the mural must fit on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallSpec {
    pub width: f64,
    pub height: f64,
}

/// Physical page size and page count of one printed text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    pub width: f64,
    pub height: f64,
    pub count: u32,
}

/// How the solver picks among acceptable configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Return the first acceptable configuration (scale, then gap, then rows ascending).
    #[default]
    FirstFit,
    /// Scan everything and keep the smallest `margin_x + margin_y`; earliest wins ties.
    MinTotalMargin,
}

impl std::str::FromStr for SearchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_fit" | "first-fit" => Ok(SearchStrategy::FirstFit),
            "min_margin" | "min-margin" | "min_total_margin" => Ok(SearchStrategy::MinTotalMargin),
            other => Err(format!("unknown layout strategy '{other}'")),
        }
    }
}

/// A resolved mural layout. Every field refers to the same (scale, gap, rows, cols) tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub scale_pct: u32,
    pub rows: u32,
    pub cols: u32,
    /// Vertical spacing between rows. Columns have none.
    pub row_gap: u32,
    pub margin_x: f64,
    pub margin_y: f64,
    /// Scaled page width actually placed on the wall.
    pub page_w: f64,
    /// Scaled page height actually placed on the wall.
    pub page_h: f64,
}

impl Layout {
    /// `"{rows}x{cols}"`, the compact grid label clients display.
    pub fn grid(&self) -> String {
        format!("{}x{}", self.rows, self.cols)
    }

    pub fn mural_width(&self) -> f64 {
        self.cols as f64 * self.page_w
    }

    pub fn mural_height(&self) -> f64 {
        self.rows as f64 * self.page_h + self.rows.saturating_sub(1) as f64 * self.row_gap as f64
    }

    fn total_margin(&self) -> f64 {
        self.margin_x + self.margin_y
    }
}

/// Outcome of a layout search.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutResult {
    Eligible(Layout),
    Ineligible,
}

impl LayoutResult {
    #[cfg(test)]
    pub fn is_eligible(&self) -> bool {
        matches!(self, LayoutResult::Eligible(_))
    }

    pub fn layout(&self) -> Option<&Layout> {
        match self {
            LayoutResult::Eligible(layout) => Some(layout),
            LayoutResult::Ineligible => None,
        }
    }

    pub fn into_layout(self) -> Option<Layout> {
        match self {
            LayoutResult::Eligible(layout) => Some(layout),
            LayoutResult::Ineligible => None,
        }
    }
}

#[derive(Serialize)]
struct LayoutWire<'a> {
    eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    grid: Option<String>,
    #[serde(flatten)]
    layout: Option<&'a Layout>,
}

/// Serializes as `{"eligible": false}` or `{"eligible": true, "grid": "RxC", ...}`.
impl Serialize for LayoutResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let layout = self.layout();
        LayoutWire {
            eligible: layout.is_some(),
            grid: layout.map(Layout::grid),
            layout,
        }
        .serialize(serializer)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Core functions
// ────────────────────────────────────────────────────────────────────────────

/// Searches for a layout of `page.count` pages on `wall`.
///
/// Degenerate input (non-finite or non-positive sizes, zero pages) is never eligible.
/// Identical inputs always produce identical results.
pub fn solve(wall: WallSpec, page: PageSpec, strategy: SearchStrategy) -> LayoutResult {
    if !is_positive(wall.width)
        || !is_positive(wall.height)
        || !is_positive(page.width)
        || !is_positive(page.height)
        || page.count == 0
    {
        return LayoutResult::Ineligible;
    }

    let mut best: Option<Layout> = None;

    for scale_pct in SCALE_MIN_PCT..=SCALE_MAX_PCT {
        let page_w = page.width * scale_pct as f64 / 100.0;
        let page_h = page.height * scale_pct as f64 / 100.0;

        for row_gap in ROW_GAP_MIN..=ROW_GAP_MAX {
            let max_rows = max_rows(wall.height, page_h, row_gap, page.count);

            for rows in 1..=max_rows {
                let cols = page.count.div_ceil(rows);
                if (rows - 1) * cols >= page.count {
                    continue;
                }

                let candidate = Layout {
                    scale_pct,
                    rows,
                    cols,
                    row_gap,
                    margin_x: 0.0,
                    margin_y: 0.0,
                    page_w,
                    page_h,
                };
                let margin_x = (wall.width - candidate.mural_width()) / 2.0;
                let margin_y = (wall.height - candidate.mural_height()) / 2.0;

                if !in_margin_band(margin_x) || !in_margin_band(margin_y) {
                    continue;
                }

                let candidate = Layout {
                    margin_x,
                    margin_y,
                    ..candidate
                };

                match strategy {
                    SearchStrategy::FirstFit => return LayoutResult::Eligible(candidate),
                    SearchStrategy::MinTotalMargin => {
                        let better = best
                            .as_ref()
                            .map_or(true, |b| candidate.total_margin() < b.total_margin() - EPSILON);
                        if better {
                            best = Some(candidate);
                        }
                    }
                }
            }
        }
    }

    best.map_or(LayoutResult::Ineligible, LayoutResult::Eligible)
}

/// Whether `margin` lies in the closed acceptable band.
pub fn in_margin_band(margin: f64) -> bool {
    margin >= MARGIN_MIN - EPSILON && margin <= MARGIN_MAX + EPSILON
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Largest row count whose stacked height still leaves the minimum margin top and bottom.
/// Capped at `count`, since more rows than pages always leaves an empty row.
fn max_rows(wall_h: f64, page_h: f64, row_gap: u32, count: u32) -> u32 {
    let usable = wall_h - 2.0 * MARGIN_MIN;
    if usable < page_h - EPSILON {
        return 0;
    }
    let gap = row_gap as f64;
    let fit = ((usable + gap + EPSILON) / (page_h + gap)).floor();
    if fit >= count as f64 {
        count
    } else {
        fit as u32
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
