use std::time::Duration;

use detpost::{
    iou, BoundingBox, ImageSize, PostprocessConfig, Postprocessor, ScaleTransform, TensorLayout,
    TensorShape, TensorView,
};

/// Candidate-major tensor with two classes: `(x1, y1, x2, y2, class, score)`.
fn two_class_tensor(boxes: &[(f32, f32, f32, f32, usize, f32)]) -> Vec<f32> {
    let mut data = Vec::with_capacity(boxes.len() * 6);
    for &(x1, y1, x2, y2, class, score) in boxes {
        let mut scores = [0.0f32; 2];
        scores[class] = score;
        data.extend_from_slice(&[(x1 + x2) / 2.0, (y1 + y2) / 2.0, x2 - x1, y2 - y1]);
        data.extend_from_slice(&scores);
    }
    data
}

fn scenario() -> Vec<f32> {
    two_class_tensor(&[
        (10.0, 10.0, 50.0, 50.0, 0, 0.9),
        (12.0, 12.0, 48.0, 48.0, 0, 0.8),
        (200.0, 200.0, 240.0, 240.0, 1, 0.7),
    ])
}

fn config(score_threshold: f32) -> PostprocessConfig {
    PostprocessConfig {
        confidence_threshold: 0.5,
        score_threshold,
        iou_threshold: 0.5,
        limit: 100,
        per_class: true,
        model_input_size: ImageSize::new(640.0, 640.0),
    }
}

fn run(data: &[f32], cfg: PostprocessConfig, target: ImageSize) -> detpost::DetectionResult {
    let shape = TensorShape::new(data.len() / 6, 6, 2, TensorLayout::CandidateMajor).unwrap();
    let view = TensorView::new(data, shape).unwrap();
    Postprocessor::new(cfg)
        .unwrap()
        .run(view, target, Duration::from_millis(16))
        .unwrap()
}

#[test]
fn overlapping_box_is_suppressed() {
    let data = scenario();
    let result = run(&data, config(0.5), ImageSize::new(640.0, 640.0));

    assert_eq!(result.predictions.len(), 2);
    let first = &result.predictions[0];
    assert_eq!(first.class_index, 0);
    assert_eq!(first.score, 0.9);
    assert_eq!(first.bbox, BoundingBox::new(10.0, 10.0, 50.0, 50.0));
    let second = &result.predictions[1];
    assert_eq!(second.class_index, 1);
    assert_eq!(second.score, 0.7);
    assert_eq!(second.bbox, BoundingBox::new(200.0, 200.0, 240.0, 240.0));
    assert_eq!(result.inference_latency, Duration::from_millis(16));
}

#[test]
fn high_score_threshold_yields_empty_result() {
    let data = scenario();
    let result = run(&data, config(0.95), ImageSize::new(640.0, 640.0));
    assert!(result.is_empty());
}

#[test]
fn zero_area_box_neither_suppresses_nor_is_suppressed() {
    let data = two_class_tensor(&[
        (30.0, 10.0, 30.0, 50.0, 0, 0.9),
        (10.0, 10.0, 50.0, 50.0, 0, 0.8),
    ]);
    let result = run(&data, config(0.5), ImageSize::new(640.0, 640.0));
    assert_eq!(result.predictions.len(), 2);
    assert_eq!(
        iou(&result.predictions[0].bbox, &result.predictions[1].bbox),
        0.0
    );
}

#[test]
fn predictions_are_mapped_into_view_space() {
    let data = scenario();
    let view = ImageSize::new(1920.0, 1080.0);
    let result = run(&data, config(0.5), view);
    assert_eq!(result.input_image_size, ImageSize::new(640.0, 640.0));
    let first = &result.predictions[0];
    assert_eq!(first.source_image_size, view);
    assert!((first.bbox.x1 - 30.0).abs() < 1e-4);
    assert!((first.bbox.y1 - 16.875).abs() < 1e-4);
    assert!((first.bbox.x2 - 150.0).abs() < 1e-4);
    assert!((first.bbox.y2 - 84.375).abs() < 1e-4);
}

#[test]
fn mapping_round_trip_restores_model_space() {
    let data = scenario();
    let target = ImageSize::new(1280.0, 1280.0);
    let result = run(&data, config(0.5), target);
    let back = ScaleTransform::between(target, ImageSize::new(640.0, 640.0)).unwrap();
    let restored: Vec<BoundingBox> = result
        .predictions
        .iter()
        .map(|p| back.apply(p).bbox)
        .collect();
    let expected = [
        BoundingBox::new(10.0, 10.0, 50.0, 50.0),
        BoundingBox::new(200.0, 200.0, 240.0, 240.0),
    ];
    for (got, want) in restored.iter().zip(expected.iter()) {
        assert!((got.x1 - want.x1).abs() < 1e-4);
        assert!((got.y1 - want.y1).abs() < 1e-4);
        assert!((got.x2 - want.x2).abs() < 1e-4);
        assert!((got.y2 - want.y2).abs() < 1e-4);
    }
}

#[test]
fn global_suppression_crosses_classes() {
    let data = two_class_tensor(&[
        (10.0, 10.0, 50.0, 50.0, 0, 0.9),
        (11.0, 11.0, 50.0, 50.0, 1, 0.85),
    ]);
    let per_class = run(&data, config(0.5), ImageSize::new(640.0, 640.0));
    assert_eq!(per_class.predictions.len(), 2);

    let global = run(
        &data,
        PostprocessConfig {
            per_class: false,
            ..config(0.5)
        },
        ImageSize::new(640.0, 640.0),
    );
    assert_eq!(global.predictions.len(), 1);
    assert_eq!(global.predictions[0].class_index, 0);
}

#[test]
fn attribute_major_tensor_goes_through_objectness_gate() {
    // 7 attributes x 2 candidates: the second column has low objectness.
    #[rustfmt::skip]
    let data = [
        100.0, 300.0,
        100.0, 300.0,
        50.0, 50.0,
        50.0, 50.0,
        0.9, 0.3,
        0.8, 0.9,
        0.1, 0.9,
    ];
    let shape = TensorShape::infer(7, 2, TensorLayout::AttributeMajor).unwrap();
    let view = TensorView::new(&data, shape).unwrap();
    let post = Postprocessor::new(config(0.5)).unwrap();
    let result = post
        .run(view, ImageSize::new(640.0, 640.0), Duration::ZERO)
        .unwrap();
    assert_eq!(result.predictions.len(), 1);
    assert_eq!(result.predictions[0].score, 0.8);
    assert_eq!(result.predictions[0].bbox, BoundingBox::new(75.0, 75.0, 125.0, 125.0));
}

#[test]
fn non_finite_boxes_are_excluded_before_the_limit() {
    #[rustfmt::skip]
    let data = [
        f32::NAN, 30.0, 40.0, 40.0, 0.9, 0.0,
        30.0, 30.0, f32::INFINITY, 40.0, 0.85, 0.0,
        30.0, 30.0, 40.0, 40.0, 0.8, 0.0,
    ];
    for limit in [1usize, 100] {
        let cfg = PostprocessConfig {
            limit,
            ..config(0.5)
        };
        let result = run(&data, cfg, ImageSize::new(640.0, 640.0));
        assert_eq!(result.predictions.len(), 1, "limit {limit}");
        let only = &result.predictions[0];
        assert!(only.bbox.is_finite());
        assert_eq!(only.score, 0.8);
        assert_eq!(only.bbox, BoundingBox::new(10.0, 10.0, 50.0, 50.0));
    }
}
