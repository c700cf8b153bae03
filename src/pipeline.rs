//! End-to-end post-processing: decode, suppress and map one frame.
//!
//! [`Postprocessor`] holds only its validated configuration. Every call owns
//! its intermediate buffers, so a single instance can be shared freely across
//! threads and frames.

use std::time::Duration;

use crate::candidate::nms::{suppress, SuppressParams};
use crate::decode::decode;
use crate::geometry::map::ScaleTransform;
use crate::geometry::ImageSize;
use crate::prediction::{DetectionResult, Prediction};
use crate::tensor::TensorView;
use crate::trace::{trace_event, trace_span};
use crate::util::{DetPostError, DetPostResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Configuration for [`Postprocessor`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PostprocessConfig {
    /// Objectness gate applied while decoding attribute-major tensors.
    pub confidence_threshold: f32,
    /// Minimum class score kept by the suppressor.
    pub score_threshold: f32,
    /// IoU above which overlapping boxes are suppressed.
    pub iou_threshold: f32,
    /// Maximum number of predictions per frame.
    pub limit: usize,
    /// Suppress within each class instead of across all classes.
    pub per_class: bool,
    /// Resolution of the model input the tensor coordinates refer to.
    pub model_input_size: ImageSize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.35,
            score_threshold: 0.6,
            iou_threshold: 0.6,
            limit: 100,
            per_class: true,
            model_input_size: ImageSize::new(640.0, 640.0),
        }
    }
}

impl PostprocessConfig {
    /// Validates thresholds and the model input size.
    pub fn validate(&self) -> DetPostResult<()> {
        if !self.confidence_threshold.is_finite() {
            return Err(DetPostError::InvalidThreshold {
                name: "confidence_threshold",
                value: self.confidence_threshold,
            });
        }
        self.suppress_params().validate()?;
        self.model_input_size.validate()
    }

    /// Returns the suppressor parameters described by this configuration.
    pub fn suppress_params(&self) -> SuppressParams {
        SuppressParams {
            iou_threshold: self.iou_threshold,
            score_threshold: self.score_threshold,
            limit: self.limit,
            per_class: self.per_class,
        }
    }
}

/// One frame queued for [`Postprocessor::run_batch`].
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub tensor: TensorView<'a>,
    /// Destination space for the output boxes.
    pub target_size: ImageSize,
    pub inference_latency: Duration,
}

/// Stateless detection post-processor.
#[derive(Clone, Debug)]
pub struct Postprocessor {
    cfg: PostprocessConfig,
}

impl Postprocessor {
    /// Creates a post-processor after validating `cfg`.
    pub fn new(cfg: PostprocessConfig) -> DetPostResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &PostprocessConfig {
        &self.cfg
    }

    /// Post-processes one output tensor.
    ///
    /// Predictions come back in `target_size` coordinates, sorted by
    /// descending score. `inference_latency` is carried into the result
    /// unchanged.
    pub fn run(
        &self,
        tensor: TensorView<'_>,
        target_size: ImageSize,
        inference_latency: Duration,
    ) -> DetPostResult<DetectionResult> {
        let _span = trace_span!("postprocess", candidates = tensor.candidate_count()).entered();
        let transform = ScaleTransform::between(self.cfg.model_input_size, target_size)?;

        let candidates = decode(tensor, self.cfg.confidence_threshold)?;
        let raw: Vec<Prediction> = candidates
            .iter()
            .map(|c| Prediction::from_candidate(c, self.cfg.model_input_size))
            .collect();
        let kept = suppress(&raw, &self.cfg.suppress_params())?;
        let predictions: Vec<Prediction> = kept.iter().map(|p| transform.apply(p)).collect();

        trace_event!(
            "postprocess_done",
            decoded = candidates.len(),
            predictions = predictions.len()
        );
        Ok(DetectionResult {
            inference_latency,
            predictions,
            input_image_size: self.cfg.model_input_size,
        })
    }

    /// Post-processes independent frames, one result per frame in order.
    ///
    /// With the `rayon` feature frames are spread across the thread pool; each
    /// frame is still handled by a single [`run`](Self::run) call.
    pub fn run_batch(&self, frames: &[Frame<'_>]) -> Vec<DetPostResult<DetectionResult>> {
        let _span = trace_span!("postprocess_batch", frames = frames.len()).entered();
        #[cfg(feature = "rayon")]
        let results = frames
            .par_iter()
            .map(|f| self.run(f.tensor, f.target_size, f.inference_latency))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let results = frames
            .iter()
            .map(|f| self.run(f.tensor, f.target_size, f.inference_latency))
            .collect();
        results
    }
}
