//! Decoding raw detection tensors into candidates.
//!
//! Each tensor position yields at most one [`Candidate`]: its center-form box,
//! the class with the highest score and that score. Attribute-major tensors
//! carry an objectness attribute that gates the position before any class
//! score is read; candidate-major tensors are decoded unconditionally and left
//! to the suppressor's score threshold.

use crate::candidate::Candidate;
use crate::tensor::{TensorLayout, TensorView, OBJECTNESS_ATTRIBUTE};
use crate::trace::{trace_event, trace_span};
use crate::util::math::argmax_first;
use crate::util::{DetPostError, DetPostResult};

/// Decodes every candidate of `tensor` in input order.
///
/// `confidence_threshold` only applies to [`TensorLayout::AttributeMajor`]:
/// positions whose objectness is below it (or NaN) are skipped.
pub fn decode(tensor: TensorView<'_>, confidence_threshold: f32) -> DetPostResult<Vec<Candidate>> {
    if !confidence_threshold.is_finite() {
        return Err(DetPostError::InvalidThreshold {
            name: "confidence_threshold",
            value: confidence_threshold,
        });
    }
    let shape = tensor.shape();
    let _span = trace_span!(
        "decode",
        candidates = shape.candidate_count(),
        classes = shape.num_classes()
    )
    .entered();

    let out = match shape.layout() {
        TensorLayout::AttributeMajor => decode_attribute_major(tensor, confidence_threshold),
        TensorLayout::CandidateMajor => decode_candidate_major(tensor),
    };

    trace_event!("decoded", count = out.len());
    Ok(out)
}

fn decode_attribute_major(tensor: TensorView<'_>, confidence_threshold: f32) -> Vec<Candidate> {
    let mut out = Vec::new();
    for idx in 0..tensor.candidate_count() {
        let objectness = tensor.at(OBJECTNESS_ATTRIBUTE, idx);
        if objectness.is_nan() || objectness < confidence_threshold {
            continue;
        }
        if let Some(candidate) = candidate_at(tensor, idx) {
            out.push(candidate);
        }
    }
    out
}

fn decode_candidate_major(tensor: TensorView<'_>) -> Vec<Candidate> {
    let num_classes = tensor.shape().num_classes();
    let offset = tensor.shape().layout().class_offset();
    let mut out = Vec::with_capacity(tensor.candidate_count());
    for idx in 0..tensor.candidate_count() {
        let Some(row) = tensor.candidate_row(idx) else {
            continue;
        };
        let scores = &row[offset..offset + num_classes];
        if let Some((class_index, score)) = argmax_first(scores.iter().copied()) {
            out.push(Candidate {
                center_x: row[0],
                center_y: row[1],
                width: row[2],
                height: row[3],
                class_index,
                score,
            });
        }
    }
    out
}

fn candidate_at(tensor: TensorView<'_>, idx: usize) -> Option<Candidate> {
    let (class_index, score) = argmax_first(tensor.class_scores(idx))?;
    Some(Candidate {
        center_x: tensor.at(0, idx),
        center_y: tensor.at(1, idx),
        width: tensor.at(2, idx),
        height: tensor.at(3, idx),
        class_index,
        score,
    })
}
