//! Python bindings for the detpost detection post-processing library.
//!
//! Tensors arrive as 2-D `float32` numpy arrays in the model's native layout;
//! predictions come back as plain Python objects.

use std::time::Duration;

use numpy::{PyReadonlyArray1, PyReadonlyArray2, PyUntypedArrayMethods};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use detpost::{
    BoundingBox, DetPostError, DetectionResult as RustDetectionResult, ImageSize,
    PostprocessConfig as RustPostprocessConfig, Postprocessor as RustPostprocessor,
    Prediction as RustPrediction, TensorLayout, TensorShape, TensorView,
};

/// Convert a DetPostError to a Python exception.
fn to_py_err(err: DetPostError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn parse_layout(layout: &str) -> PyResult<TensorLayout> {
    match layout.to_lowercase().as_str() {
        "attribute_major" => Ok(TensorLayout::AttributeMajor),
        "candidate_major" => Ok(TensorLayout::CandidateMajor),
        _ => Err(PyValueError::new_err(
            "layout must be 'attribute_major' or 'candidate_major'",
        )),
    }
}

fn bbox_from_list(values: [f32; 4]) -> BoundingBox {
    BoundingBox::new(values[0], values[1], values[2], values[3])
}

/// A single detection in destination coordinates.
#[pyclass]
#[derive(Clone)]
pub struct Prediction {
    #[pyo3(get)]
    pub class_index: usize,
    #[pyo3(get)]
    pub score: f32,
    #[pyo3(get)]
    pub x1: f32,
    #[pyo3(get)]
    pub y1: f32,
    #[pyo3(get)]
    pub x2: f32,
    #[pyo3(get)]
    pub y2: f32,
}

#[pymethods]
impl Prediction {
    /// Corners as an `(x1, y1, x2, y2)` tuple.
    #[getter]
    fn xyxy(&self) -> (f32, f32, f32, f32) {
        (self.x1, self.y1, self.x2, self.y2)
    }

    fn __repr__(&self) -> String {
        format!(
            "Prediction(class_index={}, score={:.4}, xyxy=({:.1}, {:.1}, {:.1}, {:.1}))",
            self.class_index, self.score, self.x1, self.y1, self.x2, self.y2
        )
    }
}

impl From<&RustPrediction> for Prediction {
    fn from(p: &RustPrediction) -> Self {
        Self {
            class_index: p.class_index,
            score: p.score,
            x1: p.bbox.x1,
            y1: p.bbox.y1,
            x2: p.bbox.x2,
            y2: p.bbox.y2,
        }
    }
}

/// Output of one post-processing run.
#[pyclass]
pub struct DetectionResult {
    predictions: Vec<Prediction>,
    #[pyo3(get)]
    inference_latency_ms: f64,
    #[pyo3(get)]
    input_width: f32,
    #[pyo3(get)]
    input_height: f32,
}

#[pymethods]
impl DetectionResult {
    /// Predictions sorted by descending score.
    #[getter]
    fn predictions(&self) -> Vec<Prediction> {
        self.predictions.clone()
    }

    fn __len__(&self) -> usize {
        self.predictions.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "DetectionResult(predictions={}, inference_latency_ms={:.2})",
            self.predictions.len(),
            self.inference_latency_ms
        )
    }
}

impl From<RustDetectionResult> for DetectionResult {
    fn from(r: RustDetectionResult) -> Self {
        Self {
            predictions: r.predictions.iter().map(Prediction::from).collect(),
            inference_latency_ms: r.inference_latency.as_secs_f64() * 1000.0,
            input_width: r.input_image_size.width,
            input_height: r.input_image_size.height,
        }
    }
}

/// Post-processing configuration.
#[pyclass]
#[derive(Clone)]
pub struct PostprocessConfig {
    inner: RustPostprocessConfig,
}

#[pymethods]
impl PostprocessConfig {
    /// Create a new PostprocessConfig.
    ///
    /// Args:
    ///     confidence_threshold: Objectness gate for attribute-major tensors (default: 0.35)
    ///     score_threshold: Minimum class score kept (default: 0.6)
    ///     iou_threshold: Overlap above which boxes are suppressed (default: 0.6)
    ///     limit: Maximum predictions per frame (default: 100)
    ///     per_class: Suppress within each class only (default: True)
    ///     input_width: Model input width (default: 640)
    ///     input_height: Model input height (default: 640)
    #[new]
    #[pyo3(signature = (
        confidence_threshold = 0.35,
        score_threshold = 0.6,
        iou_threshold = 0.6,
        limit = 100,
        per_class = true,
        input_width = 640.0,
        input_height = 640.0
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        confidence_threshold: f32,
        score_threshold: f32,
        iou_threshold: f32,
        limit: usize,
        per_class: bool,
        input_width: f32,
        input_height: f32,
    ) -> PyResult<Self> {
        let inner = RustPostprocessConfig {
            confidence_threshold,
            score_threshold,
            iou_threshold,
            limit,
            per_class,
            model_input_size: ImageSize::new(input_width, input_height),
        };
        inner.validate().map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn __repr__(&self) -> String {
        format!(
            "PostprocessConfig(score_threshold={}, iou_threshold={}, limit={}, per_class={})",
            self.inner.score_threshold, self.inner.iou_threshold, self.inner.limit, self.inner.per_class
        )
    }
}

/// Stateless detection post-processor.
#[pyclass]
pub struct Postprocessor {
    inner: RustPostprocessor,
}

#[pymethods]
impl Postprocessor {
    #[new]
    #[pyo3(signature = (config = None))]
    fn new(config: Option<PostprocessConfig>) -> PyResult<Self> {
        let cfg = config.map(|c| c.inner).unwrap_or_default();
        let inner = RustPostprocessor::new(cfg).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Decode, suppress and rescale one output tensor.
    ///
    /// Args:
    ///     tensor: 2D float32 numpy array in the model's layout
    ///     layout: "attribute_major" or "candidate_major" (default: "candidate_major")
    ///     target_width: Destination width (default: model input width)
    ///     target_height: Destination height (default: model input height)
    ///     num_classes: Class count (default: derived from the attribute count)
    ///     latency_ms: Inference latency to record on the result (default: 0)
    ///
    /// Returns:
    ///     DetectionResult with predictions sorted by score (best first)
    #[pyo3(signature = (
        tensor,
        layout = "candidate_major",
        target_width = None,
        target_height = None,
        num_classes = None,
        latency_ms = 0.0
    ))]
    fn run(
        &self,
        tensor: PyReadonlyArray2<'_, f32>,
        layout: &str,
        target_width: Option<f32>,
        target_height: Option<f32>,
        num_classes: Option<usize>,
        latency_ms: f64,
    ) -> PyResult<DetectionResult> {
        let layout = parse_layout(layout)?;
        let dims = tensor.shape();
        let (rows, columns) = (dims[0], dims[1]);
        let shape = match num_classes {
            Some(n) => TensorShape::new(rows, columns, n, layout),
            None => TensorShape::infer(rows, columns, layout),
        }
        .map_err(to_py_err)?;
        let data = tensor.as_slice()?;
        let view = TensorView::new(data, shape).map_err(to_py_err)?;

        let model = self.inner.config().model_input_size;
        let target = ImageSize::new(
            target_width.unwrap_or(model.width),
            target_height.unwrap_or(model.height),
        );
        let latency = Duration::try_from_secs_f64(latency_ms / 1000.0).map_err(|err| {
            PyValueError::new_err(format!("latency_ms {latency_ms} is not a valid duration: {err}"))
        })?;
        let result = self.inner.run(view, target, latency).map_err(to_py_err)?;
        Ok(result.into())
    }

    fn __repr__(&self) -> String {
        "Postprocessor()".to_string()
    }
}

/// Intersection-over-union of two `(x1, y1, x2, y2)` boxes.
#[pyfunction]
fn iou(a: [f32; 4], b: [f32; 4]) -> f32 {
    detpost::iou(&bbox_from_list(a), &bbox_from_list(b))
}

/// Greedy class-agnostic NMS over an Nx4 box array and N scores.
///
/// Returns:
///     Indices of kept boxes, best first
#[pyfunction]
#[pyo3(signature = (boxes, scores, iou_threshold = 0.5, limit = 100))]
fn nms(
    boxes: PyReadonlyArray2<'_, f32>,
    scores: PyReadonlyArray1<'_, f32>,
    iou_threshold: f32,
    limit: usize,
) -> PyResult<Vec<usize>> {
    if boxes.shape()[1] != 4 {
        return Err(PyValueError::new_err("boxes must have shape (N, 4)"));
    }
    let rects: Vec<BoundingBox> = boxes
        .as_slice()?
        .chunks_exact(4)
        .map(|c| BoundingBox::new(c[0], c[1], c[2], c[3]))
        .collect();
    detpost::nms_indices(&rects, scores.as_slice()?, iou_threshold, limit).map_err(to_py_err)
}

/// Python module for detpost post-processing.
#[pymodule]
fn _detpost(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Prediction>()?;
    m.add_class::<DetectionResult>()?;
    m.add_class::<PostprocessConfig>()?;
    m.add_class::<Postprocessor>()?;
    m.add_function(wrap_pyfunction!(iou, m)?)?;
    m.add_function(wrap_pyfunction!(nms, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
