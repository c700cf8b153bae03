//! detpost turns raw object-detection head outputs into final predictions.
//!
//! The pipeline is pure and per-frame: a flat `f32` tensor is decoded into
//! candidates, filtered and pruned with greedy non-maximum suppression, then
//! rescaled from model input coordinates into the caller's image space.
//! Model execution, image preprocessing and rendering stay with the caller.
//! Parallelism across frames is available via the `rayon` feature.

pub mod candidate;
pub mod decode;
pub mod geometry;
pub mod labels;
pub mod pipeline;
pub mod prediction;
pub mod tensor;
pub mod throttle;
mod trace;
pub mod util;

pub use candidate::nms::{nms_indices, suppress, SuppressParams};
pub use candidate::{Candidate, Detection};
pub use decode::decode;
pub use geometry::map::{map_prediction, ScaleTransform};
pub use geometry::{iou, BoundingBox, ImageSize};
pub use labels::LabelTable;
pub use pipeline::{Frame, PostprocessConfig, Postprocessor};
pub use prediction::{DetectionResult, Prediction};
pub use tensor::{TensorLayout, TensorShape, TensorView};
pub use throttle::FrameThrottle;
pub use util::{DetPostError, DetPostResult};
