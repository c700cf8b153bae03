//! Stage instrumentation for decode, suppress and postprocess.
//!
//! Each stage opens one span named after it (`decode`, `suppress`,
//! `postprocess`, `postprocess_batch`) carrying its input size, and closes
//! with a single event reporting how many items came out. Dropped NaN scores
//! and non-finite boxes are reported at warn level. Without the `tracing`
//! feature everything here expands to nothing.

/// Debug span for one stage, e.g. `trace_span!("decode", candidates = n)`.
#[cfg(feature = "tracing")]
macro_rules! trace_span {
    ($name:expr $(, $($field:tt)*)?) => {
        tracing::debug_span!($name $(, $($field)*)?)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_span {
    ($name:expr $(, $($field:tt)*)?) => {
        $crate::trace::NoopSpan
    };
}

/// Debug event with the item counts a stage produced.
#[cfg(feature = "tracing")]
macro_rules! trace_event {
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        tracing::debug!(name: $name, $($key = $value),+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_event {
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        let _ = ($($value,)+);
    };
}

/// Warn event counting inputs discarded for non-finite values.
#[cfg(feature = "tracing")]
macro_rules! trace_anomaly {
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        tracing::warn!(name: $name, $($key = $value),+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_anomaly {
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        let _ = ($($value,)+);
    };
}

pub(crate) use trace_anomaly;
pub(crate) use trace_event;
pub(crate) use trace_span;

/// Span guard returned by `trace_span!` when tracing is compiled out.
#[cfg(not(feature = "tracing"))]
pub struct NoopSpan;

#[cfg(not(feature = "tracing"))]
impl NoopSpan {
    #[inline]
    pub fn entered(self) -> Self {
        self
    }
}
