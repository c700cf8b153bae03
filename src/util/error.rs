//! Error types for detpost.

use thiserror::Error;

/// Result alias for detpost operations.
pub type DetPostResult<T> = std::result::Result<T, DetPostError>;

/// Errors that can occur when decoding or suppressing detections.
///
/// Every variant describes a configuration problem. Empty tensors, zero
/// surviving candidates and non-finite scores are not errors.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DetPostError {
    /// A tensor dimension is zero.
    #[error("invalid tensor shape: {rows}x{columns}")]
    InvalidShape { rows: usize, columns: usize },
    /// The shape declares zero classes.
    #[error("num_classes must be at least 1")]
    NoClasses,
    /// The attribute dimension cannot hold geometry plus class scores.
    #[error("tensor has {attributes} attributes per candidate, layout requires at least {required}")]
    TooFewAttributes { attributes: usize, required: usize },
    /// The buffer length does not equal `rows * columns`.
    #[error("tensor length mismatch: expected {expected} values, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    /// A threshold is NaN or infinite.
    #[error("invalid threshold {name}: {value}")]
    InvalidThreshold { name: &'static str, value: f32 },
    /// An image size is not positive and finite.
    #[error("invalid image size: {width}x{height}")]
    InvalidSize { width: f32, height: f32 },
}
