//! Frame composition: every displayed frame is rebuilt from a clean copy of
//! the base image, so nothing from an earlier frame can linger.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

use crate::geometry::{Point, Rect};
use crate::session::LabeledRegion;

pub const COMMITTED_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const PREVIEW_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const TAG_FILL: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const TAG_TEXT: Rgba<u8> = Rgba([0, 0, 0, 255]);

const GLYPH_SCALE: i32 = 2;
const TAG_PADDING: i32 = 2;

/// Everything drawn on top of the base image for one frame.
pub struct Overlay<'a> {
    pub committed: &'a [LabeledRegion],
    pub provisional: Option<Rect>,
    pub preview: Option<(Point, Point)>,
}

pub fn compose(base: &RgbaImage, overlay: &Overlay<'_>) -> RgbaImage {
    let mut img = base.clone();

    for region in overlay.committed {
        draw_rect_outline(&mut img, region.bounds, COMMITTED_COLOR);
        draw_label_tag(&mut img, region.bounds.x, region.bounds.y, region.class.as_char());
    }

    if let Some(rect) = overlay.provisional {
        draw_rect_outline(&mut img, rect, PREVIEW_COLOR);
    }

    if let Some((anchor, cursor)) = overlay.preview {
        draw_rect_outline(&mut img, Rect::from_corners(anchor, cursor), PREVIEW_COLOR);
    }

    img
}

/// Size of the label tag drawn above a region, in pixels.
pub fn tag_size() -> (i32, i32) {
    let side = 8 * GLYPH_SCALE + 2 * TAG_PADDING;
    (side, side)
}

fn put_clipped(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    if x >= 0 && x < w && y >= 0 && y < h {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_rect_outline(img: &mut RgbaImage, rect: Rect, color: Rgba<u8>) {
    let max = rect.max();
    for x in rect.x..=max.x {
        put_clipped(img, x, rect.y, color);
        put_clipped(img, x, max.y, color);
    }
    for y in rect.y..=max.y {
        put_clipped(img, rect.x, y, color);
        put_clipped(img, max.x, y, color);
    }
}

fn fill_rect(img: &mut RgbaImage, x: i32, y: i32, w: i32, h: i32, color: Rgba<u8>) {
    for yy in y..y + h {
        for xx in x..x + w {
            put_clipped(img, xx, yy, color);
        }
    }
}

/// Filled tag sitting just above `(x, y)` with `label` printed inside it.
fn draw_label_tag(img: &mut RgbaImage, x: i32, y: i32, label: char) {
    let (tw, th) = tag_size();
    let top = y - th;
    fill_rect(img, x, top, tw, th, TAG_FILL);
    draw_glyph(img, x + TAG_PADDING, top + TAG_PADDING, label, TAG_TEXT);
}

fn draw_glyph(img: &mut RgbaImage, x: i32, y: i32, ch: char, color: Rgba<u8>) {
    let Some(glyph) = BASIC_FONTS.get(ch) else {
        return;
    };
    for (row_idx, &row) in glyph.iter().enumerate() {
        for col_idx in 0..8 {
            if (row >> col_idx) & 1 == 0 {
                continue;
            }
            let px = x + col_idx * GLYPH_SCALE;
            let py = y + row_idx as i32 * GLYPH_SCALE;
            fill_rect(img, px, py, GLYPH_SCALE, GLYPH_SCALE, color);
        }
    }
}
