//! Box geometry: corner-form boxes, image sizes and intersection-over-union.

pub mod map;

use crate::util::{DetPostError, DetPostResult};

/// Axis-aligned bounding box in corner form (`x1, y1` top-left, `x2, y2`
/// bottom-right).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Creates a box from its corners.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Converts a center-form box (`cx, cy, w, h`) to corner form.
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Self {
            x1: cx - half_w,
            y1: cy - half_h,
            x2: cx + half_w,
            y2: cy + half_h,
        }
    }

    /// Returns the width, zero for inverted boxes.
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    /// Returns the height, zero for inverted boxes.
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Returns the center point.
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Returns true when every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// Scales both corners by independent x and y factors.
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }

    /// Returns the overlapping area with `other`.
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    /// Intersection-over-union with `other`, see [`iou`].
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        iou(self, other)
    }
}

/// Computes intersection-over-union of two boxes.
///
/// Returns a value in `[0, 1]`. A zero union (both boxes degenerate) yields
/// `0`, as does any pair whose coordinates make the ratio NaN, so degenerate
/// boxes never take part in suppression.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter = a.intersection_area(b);
    let union = a.area() + b.area() - inter;
    if union.is_nan() || union <= 0.0 {
        return 0.0;
    }
    let ratio = inter / union;
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

/// Width and height of an image or coordinate space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageSize {
    pub width: f32,
    pub height: f32,
}

impl ImageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Returns an error unless both sides are positive and finite.
    pub fn validate(&self) -> DetPostResult<()> {
        let ok = |v: f32| v.is_finite() && v > 0.0;
        if ok(self.width) && ok(self.height) {
            Ok(())
        } else {
            Err(DetPostError::InvalidSize {
                width: self.width,
                height: self.height,
            })
        }
    }
}

impl From<(u32, u32)> for ImageSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f32, height as f32)
    }
}
