//! Decoded detection candidates and their suppression.
//!
//! A [`Candidate`] is one tensor position after decoding and before any
//! filtering. The [`nms`] module prunes overlapping candidates (or
//! predictions) with greedy non-maximum suppression.

use crate::geometry::BoundingBox;

pub(crate) mod nms;

/// One decoded detection in model input coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    /// Class with the highest score at this position.
    pub class_index: usize,
    /// Score of `class_index` (the maximum class score).
    pub score: f32,
}

impl Candidate {
    /// Returns the candidate box in corner form.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_center(self.center_x, self.center_y, self.width, self.height)
    }
}

/// Anything the suppressor can rank and compare.
pub trait Detection {
    /// Ranking score; NaN marks the item as unusable.
    fn score(&self) -> f32;
    /// Class the item competes within when suppressing per class.
    fn class_index(&self) -> usize;
    /// Corner-form box used for overlap tests.
    fn bbox(&self) -> BoundingBox;
}

impl Detection for Candidate {
    fn score(&self) -> f32 {
        self.score
    }

    fn class_index(&self) -> usize {
        self.class_index
    }

    fn bbox(&self) -> BoundingBox {
        Candidate::bbox(self)
    }
}
