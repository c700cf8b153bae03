//! Greedy non-maximum suppression over scored boxes.
//!
//! Items are ranked by descending score with a stable sort, so equal scores
//! keep their input order. The sweep walks that ranking once: every item is
//! `Active` until a higher ranked survivor overlaps it by more than the IoU
//! threshold, at which point it becomes `Suppressed`. A counter of undecided
//! items ends the sweep as soon as nothing is left to visit.

use std::collections::BTreeMap;

use crate::candidate::Detection;
use crate::geometry::{iou, BoundingBox};
use crate::trace::{trace_anomaly, trace_event, trace_span};
use crate::util::math::score_cmp_desc;
use crate::util::{DetPostError, DetPostResult};

/// Parameters for [`suppress`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SuppressParams {
    /// Overlap above which the lower ranked box is suppressed.
    pub iou_threshold: f32,
    /// Items scoring below this are discarded before the sweep.
    pub score_threshold: f32,
    /// Maximum number of survivors.
    pub limit: usize,
    /// Run the sweep independently per class.
    pub per_class: bool,
}

impl Default for SuppressParams {
    fn default() -> Self {
        Self {
            iou_threshold: 0.6,
            score_threshold: 0.6,
            limit: 100,
            per_class: true,
        }
    }
}

impl SuppressParams {
    /// Rejects NaN or infinite thresholds.
    pub fn validate(&self) -> DetPostResult<()> {
        if !self.iou_threshold.is_finite() {
            return Err(DetPostError::InvalidThreshold {
                name: "iou_threshold",
                value: self.iou_threshold,
            });
        }
        if !self.score_threshold.is_finite() {
            return Err(DetPostError::InvalidThreshold {
                name: "score_threshold",
                value: self.score_threshold,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Active,
    Suppressed,
}

/// Filters `items` by score and removes overlapping boxes.
///
/// Returns survivors sorted by descending score, at most `params.limit` of
/// them. NaN scores and boxes with a NaN or infinite coordinate are always
/// discarded. With `per_class`, boxes of
/// different classes never suppress each other and the per-class survivors
/// are merged by score (ties by ascending class, then input order).
pub fn suppress<T>(items: &[T], params: &SuppressParams) -> DetPostResult<Vec<T>>
where
    T: Detection + Clone,
{
    params.validate()?;
    let _span = trace_span!("suppress", items = items.len(), per_class = params.per_class).entered();
    if params.limit == 0 || items.is_empty() {
        return Ok(Vec::new());
    }

    let mut nan_scores = 0usize;
    let mut bad_boxes = 0usize;
    let eligible: Vec<usize> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let score = item.score();
            if score.is_nan() {
                nan_scores += 1;
                None
            } else if score < params.score_threshold {
                None
            } else if !item.bbox().is_finite() {
                bad_boxes += 1;
                None
            } else {
                Some(idx)
            }
        })
        .collect();
    if nan_scores > 0 || bad_boxes > 0 {
        trace_anomaly!(
            "non_finite_dropped",
            nan_scores = nan_scores,
            non_finite_boxes = bad_boxes
        );
    }

    let kept = if params.per_class {
        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for idx in eligible.iter().copied() {
            by_class.entry(items[idx].class_index()).or_default().push(idx);
        }
        let mut merged = Vec::new();
        for indices in by_class.values() {
            merged.extend(sweep(items, indices, params.iou_threshold, params.limit));
        }
        merged.sort_by(|&a, &b| {
            score_cmp_desc(items[a].score(), items[b].score())
                .then_with(|| items[a].class_index().cmp(&items[b].class_index()))
                .then_with(|| a.cmp(&b))
        });
        merged.truncate(params.limit);
        merged
    } else {
        sweep(items, &eligible, params.iou_threshold, params.limit)
    };

    trace_event!("suppress_done", eligible = eligible.len(), kept = kept.len());
    Ok(kept.into_iter().map(|idx| items[idx].clone()).collect())
}

/// Runs NMS over parallel box and score arrays, returning kept indices.
///
/// No score threshold is applied beyond dropping NaN scores and non-finite
/// boxes; the remaining boxes take
/// part in a single class-agnostic sweep.
pub fn nms_indices(
    boxes: &[BoundingBox],
    scores: &[f32],
    iou_threshold: f32,
    limit: usize,
) -> DetPostResult<Vec<usize>> {
    if boxes.len() != scores.len() {
        return Err(DetPostError::LengthMismatch {
            expected: boxes.len(),
            got: scores.len(),
        });
    }
    if !iou_threshold.is_finite() {
        return Err(DetPostError::InvalidThreshold {
            name: "iou_threshold",
            value: iou_threshold,
        });
    }
    let items: Vec<Scored> = boxes
        .iter()
        .zip(scores)
        .map(|(&bbox, &score)| Scored { bbox, score })
        .collect();
    let eligible: Vec<usize> = (0..items.len())
        .filter(|&idx| !items[idx].score.is_nan() && items[idx].bbox.is_finite())
        .collect();
    Ok(sweep(&items, &eligible, iou_threshold, limit))
}

struct Scored {
    bbox: BoundingBox,
    score: f32,
}

impl Detection for Scored {
    fn score(&self) -> f32 {
        self.score
    }

    fn class_index(&self) -> usize {
        0
    }

    fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

/// Greedy sweep over `indices` into `items`; returns survivors best first.
fn sweep<T: Detection>(items: &[T], indices: &[usize], iou_threshold: f32, limit: usize) -> Vec<usize> {
    if limit == 0 {
        return Vec::new();
    }
    let mut order = indices.to_vec();
    order.sort_by(|&a, &b| score_cmp_desc(items[a].score(), items[b].score()));
    let boxes: Vec<BoundingBox> = order.iter().map(|&idx| items[idx].bbox()).collect();

    let mut status = vec![Status::Active; order.len()];
    let mut undecided = order.len();
    let mut selected = Vec::with_capacity(limit.min(order.len()));

    for i in 0..order.len() {
        if undecided == 0 {
            break;
        }
        if status[i] == Status::Suppressed {
            continue;
        }
        selected.push(order[i]);
        undecided -= 1;
        if selected.len() == limit {
            break;
        }
        for j in (i + 1)..order.len() {
            if undecided == 0 {
                break;
            }
            if status[j] == Status::Active && iou(&boxes[i], &boxes[j]) > iou_threshold {
                status[j] = Status::Suppressed;
                undecided -= 1;
            }
        }
    }

    selected
}
