//! Randomized checks of the suppression invariants over seeded inputs.

use detpost::{iou, suppress, BoundingBox, Candidate, Detection, SuppressParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_candidates(rng: &mut StdRng, count: usize, num_classes: usize) -> Vec<Candidate> {
    (0..count)
        .map(|_| Candidate {
            center_x: rng.random_range(0.0..640.0),
            center_y: rng.random_range(0.0..640.0),
            width: rng.random_range(4.0..160.0),
            height: rng.random_range(4.0..160.0),
            class_index: rng.random_range(0..num_classes),
            // Coarse scores so ties are common.
            score: (rng.random_range(0..20) as f32) / 20.0,
        })
        .collect()
}

fn random_box(rng: &mut StdRng) -> BoundingBox {
    let x1 = rng.random_range(-50.0..200.0);
    let y1 = rng.random_range(-50.0..200.0);
    let w = if rng.random_range(0..10) == 0 { 0.0 } else { rng.random_range(0.0..120.0) };
    let h = rng.random_range(0.0..120.0);
    BoundingBox::new(x1, y1, x1 + w, y1 + h)
}

#[test]
fn iou_stays_in_unit_interval() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..2000 {
        let a = random_box(&mut rng);
        let b = random_box(&mut rng);
        let v = iou(&a, &b);
        assert!((0.0..=1.0).contains(&v), "iou {v} for {a:?} {b:?}");
        if a.area() > 0.0 {
            assert!((iou(&a, &a) - 1.0).abs() < 1e-5);
        }
        if a.x2 <= b.x1 || b.x2 <= a.x1 || a.y2 <= b.y1 || b.y2 <= a.y1 {
            assert_eq!(v, 0.0);
        }
    }
}

#[test]
fn survivors_never_overlap_above_threshold() {
    let mut rng = StdRng::seed_from_u64(42);
    for per_class in [true, false] {
        for _ in 0..50 {
            let items = random_candidates(&mut rng, 120, 4);
            let params = SuppressParams {
                iou_threshold: 0.45,
                score_threshold: 0.2,
                limit: 300,
                per_class,
            };
            let out = suppress(&items, &params).unwrap();
            for (i, a) in out.iter().enumerate() {
                for b in &out[i + 1..] {
                    if per_class && a.class_index != b.class_index {
                        continue;
                    }
                    assert!(iou(&a.bbox(), &b.bbox()) <= params.iou_threshold);
                }
            }
        }
    }
}

#[test]
fn output_is_sorted_and_capped() {
    let mut rng = StdRng::seed_from_u64(3);
    for limit in [0usize, 1, 5, 40] {
        let items = random_candidates(&mut rng, 200, 3);
        let params = SuppressParams {
            iou_threshold: 0.5,
            score_threshold: 0.0,
            limit,
            per_class: true,
        };
        let out = suppress(&items, &params).unwrap();
        assert!(out.len() <= limit);
        assert!(out.windows(2).all(|w| w[0].score() >= w[1].score()));
    }
}

#[test]
fn raising_score_threshold_never_adds_predictions() {
    let mut rng = StdRng::seed_from_u64(11);
    let items = random_candidates(&mut rng, 300, 5);
    let mut previous = usize::MAX;
    for step in 0..=20 {
        let score_threshold = step as f32 / 20.0;
        let params = SuppressParams {
            iou_threshold: 0.5,
            score_threshold,
            limit: 1000,
            per_class: true,
        };
        let out = suppress(&items, &params).unwrap();
        assert!(out.iter().all(|p| p.score >= score_threshold));
        assert!(out.len() <= previous);
        previous = out.len();
    }
}

#[test]
fn repeated_suppression_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(99);
    let items = random_candidates(&mut rng, 500, 6);
    let params = SuppressParams {
        iou_threshold: 0.3,
        score_threshold: 0.1,
        limit: 100,
        per_class: true,
    };
    let first = suppress(&items, &params).unwrap();
    for _ in 0..5 {
        let again = suppress(&items, &params).unwrap();
        assert_eq!(again.len(), first.len());
        for (a, b) in again.iter().zip(&first) {
            assert_eq!(a.score.to_bits(), b.score.to_bits());
            assert_eq!(a.class_index, b.class_index);
            assert_eq!(a.bbox(), b.bbox());
        }
    }
}

#[test]
fn nan_scores_do_not_disturb_ordering() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut items = random_candidates(&mut rng, 100, 2);
    let clean = suppress(&items, &SuppressParams::default()).unwrap();
    for i in 0..10usize {
        let mut poisoned = items[i];
        poisoned.score = f32::NAN;
        items.insert(i * 7, poisoned);
    }
    let out = suppress(&items, &SuppressParams::default()).unwrap();
    assert_eq!(out, clean);
}
