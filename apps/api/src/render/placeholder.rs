//! Placeholder tile for pages that could not be fetched or decoded.
//!
//! A flat grey tile with a red `X{page}` marker, so gaps in a preview are easy to trace
//! back to a page number. Glyphs are a fixed 5×7 bitmap; no font files are needed.

use image::{Rgb, RgbImage};

pub const TILE_BACKGROUND: Rgb<u8> = Rgb([0xee, 0xee, 0xee]);
pub const MARKER_COLOR: Rgb<u8> = Rgb([0xff, 0x00, 0x00]);

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
/// Horizontal advance per glyph, including one column of spacing.
const ADVANCE: u32 = GLYPH_W + 1;

/// Rows of each glyph, top to bottom; bit 4 is the leftmost column.
fn glyph(c: char) -> Option<[u8; 7]> {
    Some(match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        _ => return None,
    })
}

/// Builds a `width`×`height` placeholder for 1-based `page_num`.
pub fn placeholder_tile(width: u32, height: u32, page_num: u32) -> RgbImage {
    let mut tile = RgbImage::from_pixel(width, height, TILE_BACKGROUND);
    draw_marker(&mut tile, &format!("X{page_num}"));
    tile
}

/// Draws `text` centered, scaled to about half the tile width.
fn draw_marker(tile: &mut RgbImage, text: &str) {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        return;
    }
    let (width, height) = tile.dimensions();
    let text_w = chars * ADVANCE - 1;

    let scale = (width / 2 / text_w).min(height / 3 / GLYPH_H).max(1);
    let origin_x = (width.saturating_sub(text_w * scale)) / 2;
    let origin_y = (height.saturating_sub(GLYPH_H * scale)) / 2;

    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else { continue };
        let glyph_x = origin_x + i as u32 * ADVANCE * scale;

        for (gy, bits) in rows.iter().enumerate() {
            for gx in 0..GLYPH_W {
                if bits & (0x10 >> gx) == 0 {
                    continue;
                }
                fill_block(
                    tile,
                    glyph_x + gx * scale,
                    origin_y + gy as u32 * scale,
                    scale,
                );
            }
        }
    }
}

/// Fills a `size`×`size` block, clipped to the tile.
fn fill_block(tile: &mut RgbImage, x: u32, y: u32, size: u32) {
    let (width, height) = tile.dimensions();
    for py in y..(y + size).min(height) {
        for px in x..(x + size).min(width) {
            tile.put_pixel(px, py, MARKER_COLOR);
        }
    }
}
