use clap::Parser;
use detpost::{
    DetectionResult, ImageSize, LabelTable, PostprocessConfig, Postprocessor, TensorLayout,
    TensorShape, TensorView,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Detection post-processing CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for the pipeline stages.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LayoutConfig {
    AttributeMajor,
    CandidateMajor,
}

impl From<LayoutConfig> for TensorLayout {
    fn from(value: LayoutConfig) -> Self {
        match value {
            LayoutConfig::AttributeMajor => TensorLayout::AttributeMajor,
            LayoutConfig::CandidateMajor => TensorLayout::CandidateMajor,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
struct SizeJson {
    width: f32,
    height: f32,
}

impl From<SizeJson> for ImageSize {
    fn from(value: SizeJson) -> Self {
        ImageSize::new(value.width, value.height)
    }
}

impl From<ImageSize> for SizeJson {
    fn from(value: ImageSize) -> Self {
        Self {
            width: value.width,
            height: value.height,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TensorConfig {
    path: String,
    layout: LayoutConfig,
    rows: usize,
    columns: usize,
    /// Derived from the attribute count when omitted.
    #[serde(default)]
    num_classes: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PostprocessJson {
    confidence_threshold: f32,
    score_threshold: f32,
    iou_threshold: f32,
    limit: usize,
    per_class: bool,
    model_input_size: SizeJson,
}

impl Default for PostprocessJson {
    fn default() -> Self {
        let cfg = PostprocessConfig::default();
        Self {
            confidence_threshold: cfg.confidence_threshold,
            score_threshold: cfg.score_threshold,
            iou_threshold: cfg.iou_threshold,
            limit: cfg.limit,
            per_class: cfg.per_class,
            model_input_size: cfg.model_input_size.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Config {
    tensor: TensorConfig,
    #[serde(default)]
    postprocess: PostprocessJson,
    /// Destination space; defaults to the model input size.
    #[serde(default)]
    target_size: Option<SizeJson>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    inference_latency_ms: f64,
    #[serde(default)]
    output_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct PredictionRecord {
    class_index: usize,
    label: String,
    score: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

#[derive(Debug, Serialize)]
struct Output {
    inference_latency_ms: f64,
    input_image_size: SizeJson,
    target_size: SizeJson,
    predictions: Vec<PredictionRecord>,
}

impl Output {
    fn new(result: &DetectionResult, target: ImageSize, labels: &LabelTable) -> Self {
        let predictions = result
            .predictions
            .iter()
            .map(|p| PredictionRecord {
                class_index: p.class_index,
                label: labels.name_or_id(p.class_index).into_owned(),
                score: p.score,
                x1: p.bbox.x1,
                y1: p.bbox.y1,
                x2: p.bbox.x2,
                y2: p.bbox.y2,
            })
            .collect();
        Self {
            inference_latency_ms: result.inference_latency.as_secs_f64() * 1000.0,
            input_image_size: result.input_image_size.into(),
            target_size: target.into(),
            predictions,
        }
    }
}

/// Reads a tensor as a JSON array of numbers or as raw little-endian `f32`.
fn load_tensor(path: &Path) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let text = fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&text)?);
    }
    let bytes = fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "{}: raw tensor has {} bytes, not a multiple of 4",
            path.display(),
            bytes.len()
        )
        .into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Converts a millisecond latency, rejecting negative, NaN and out of range values.
fn latency_from_ms(ms: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(ms / 1000.0)
        .map_err(|err| format!("inference_latency_ms {ms} is not a valid duration: {err}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("detpost=debug".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.tensor.path.is_empty() {
        return Err("tensor.path must be set in the config".into());
    }
    let latency = latency_from_ms(config.inference_latency_ms)?;

    // Relative tensor paths resolve against the config file's directory.
    let tensor_path = cli
        .config
        .parent()
        .map(|dir| dir.join(&config.tensor.path))
        .unwrap_or_else(|| PathBuf::from(&config.tensor.path));
    let data = load_tensor(&tensor_path)?;
    tracing::info!(path = %tensor_path.display(), values = data.len(), "loaded tensor");

    let layout: TensorLayout = config.tensor.layout.into();
    let shape = match config.tensor.num_classes {
        Some(num_classes) => {
            TensorShape::new(config.tensor.rows, config.tensor.columns, num_classes, layout)?
        }
        None => TensorShape::infer(config.tensor.rows, config.tensor.columns, layout)?,
    };
    let view = TensorView::new(&data, shape)?;

    let pp = &config.postprocess;
    let post = Postprocessor::new(PostprocessConfig {
        confidence_threshold: pp.confidence_threshold,
        score_threshold: pp.score_threshold,
        iou_threshold: pp.iou_threshold,
        limit: pp.limit,
        per_class: pp.per_class,
        model_input_size: pp.model_input_size.into(),
    })?;
    let target: ImageSize = config
        .target_size
        .map(Into::into)
        .unwrap_or(post.config().model_input_size);

    let result = post.run(view, target, latency)?;
    tracing::info!(predictions = result.predictions.len(), "post-processing finished");

    let labels = LabelTable::new(config.labels);
    let output = Output::new(&result, target, &labels);
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::latency_from_ms;
    use std::time::Duration;

    #[test]
    fn latency_accepts_finite_milliseconds() {
        assert_eq!(latency_from_ms(0.0).unwrap(), Duration::ZERO);
        assert_eq!(latency_from_ms(250.0).unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn latency_rejects_unrepresentable_values() {
        assert!(latency_from_ms(-1.0).is_err());
        assert!(latency_from_ms(f64::NAN).is_err());
        assert!(latency_from_ms(f64::INFINITY).is_err());
        assert!(latency_from_ms(1e300).is_err());
    }
}
