//! Pixel-space points and rectangles, plus the normalized box used by the
//! yolo output format.

/// A position in image pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
///
/// Width and height are unsigned, so a rectangle can never be inverted no
/// matter which direction it was dragged in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from two opposite corners given in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: a.x.abs_diff(b.x),
            height: a.y.abs_diff(b.y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bottom-right corner (exclusive).
    pub fn max(&self) -> Point {
        Point::new(
            self.x.saturating_add(self.width as i32),
            self.y.saturating_add(self.height as i32),
        )
    }

    /// Multiply every component by `factor`. Used to map a rectangle drawn on
    /// a downscaled display image back onto the original image.
    pub fn scaled(&self, factor: u32) -> Self {
        let f = factor as i32;
        Self {
            x: self.x * f,
            y: self.y * f,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    pub fn to_normalized(&self, image_width: u32, image_height: u32) -> NormalizedBox {
        let (iw, ih) = (image_width as f64, image_height as f64);
        let (w, h) = (self.width as f64, self.height as f64);
        NormalizedBox {
            cx: (self.x as f64 + w / 2.0) / iw,
            cy: (self.y as f64 + h / 2.0) / ih,
            w: w / iw,
            h: h / ih,
        }
    }
}

/// Center/size box with every component relative to the image dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl NormalizedBox {
    /// Map back into pixel space, rounding to the nearest pixel.
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> Rect {
        let (iw, ih) = (image_width as f64, image_height as f64);
        let w = self.w * iw;
        let h = self.h * ih;
        Rect {
            x: (self.cx * iw - w / 2.0).round() as i32,
            y: (self.cy * ih - h / 2.0).round() as i32,
            width: w.round() as u32,
            height: h.round() as u32,
        }
    }
}
