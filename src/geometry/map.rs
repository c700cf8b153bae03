//! Rescaling predictions between coordinate spaces.
//!
//! Mapping is a pure per-axis scale. Output boxes are not clamped to the
//! destination bounds; clipping to a viewport belongs to the renderer, so
//! callers must not assume mapped boxes lie inside `to`.

use crate::geometry::{BoundingBox, ImageSize};
use crate::prediction::Prediction;
use crate::util::DetPostResult;

/// Per-axis scale from one coordinate space to another.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleTransform {
    sx: f32,
    sy: f32,
    from: ImageSize,
    to: ImageSize,
}

impl ScaleTransform {
    /// Builds the transform taking `from` coordinates to `to` coordinates.
    pub fn between(from: ImageSize, to: ImageSize) -> DetPostResult<Self> {
        from.validate()?;
        to.validate()?;
        Ok(Self {
            sx: to.width / from.width,
            sy: to.height / from.height,
            from,
            to,
        })
    }

    /// Returns the `(x, y)` scale factors.
    pub fn factors(&self) -> (f32, f32) {
        (self.sx, self.sy)
    }

    /// Returns the transform mapping `to` back onto `from`.
    pub fn inverse(&self) -> Self {
        Self {
            sx: self.from.width / self.to.width,
            sy: self.from.height / self.to.height,
            from: self.to,
            to: self.from,
        }
    }

    pub fn apply_box(&self, bbox: &BoundingBox) -> BoundingBox {
        bbox.scale(self.sx, self.sy)
    }

    /// Rescales a prediction and records the destination space on it.
    pub fn apply(&self, prediction: &Prediction) -> Prediction {
        Prediction {
            bbox: self.apply_box(&prediction.bbox),
            source_image_size: self.to,
            ..*prediction
        }
    }
}

/// Maps one prediction from `from` space into `to` space.
pub fn map_prediction(
    prediction: &Prediction,
    from: ImageSize,
    to: ImageSize,
) -> DetPostResult<Prediction> {
    Ok(ScaleTransform::between(from, to)?.apply(prediction))
}
