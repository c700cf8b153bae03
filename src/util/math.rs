//! Numeric helpers shared by the decoder and the suppressor.

use std::cmp::Ordering;

/// Orders two scores descending, placing NaN after every number.
///
/// Signed zeros compare equal so callers relying on a stable sort keep input
/// order for them.
pub(crate) fn score_cmp_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Returns the index and value of the largest element.
///
/// The first strictly greater value wins, so ties resolve to the lowest
/// index. A NaN is replaced by the next non-NaN value and never replaces one.
pub(crate) fn argmax_first<I>(values: I) -> Option<(usize, f32)>
where
    I: IntoIterator<Item = f32>,
{
    let mut iter = values.into_iter().enumerate();
    let (mut best_idx, mut best) = iter.next()?;
    for (idx, value) in iter {
        if value > best || (best.is_nan() && !value.is_nan()) {
            best_idx = idx;
            best = value;
        }
    }
    Some((best_idx, best))
}
