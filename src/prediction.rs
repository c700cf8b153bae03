//! Pipeline output records.

use std::time::Duration;

use crate::candidate::{Candidate, Detection};
use crate::geometry::{BoundingBox, ImageSize};

/// A detection handed to the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub score: f32,
    pub bbox: BoundingBox,
    /// Coordinate space `bbox` is expressed in.
    pub source_image_size: ImageSize,
}

impl Prediction {
    /// Wraps a decoded candidate, keeping its model-space coordinates.
    pub fn from_candidate(candidate: &Candidate, source_image_size: ImageSize) -> Self {
        Self {
            class_index: candidate.class_index,
            score: candidate.score,
            bbox: candidate.bbox(),
            source_image_size,
        }
    }
}

impl Detection for Prediction {
    fn score(&self) -> f32 {
        self.score
    }

    fn class_index(&self) -> usize {
        self.class_index
    }

    fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

/// Output of one post-processing run.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    /// Latency of the external inference call, threaded through unchanged.
    pub inference_latency: Duration,
    /// Surviving predictions sorted by descending score.
    pub predictions: Vec<Prediction>,
    /// Model input resolution the tensor was produced at.
    pub input_image_size: ImageSize,
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Returns the highest scoring prediction.
    pub fn best(&self) -> Option<&Prediction> {
        self.predictions.first()
    }
}
