//! Typed views over raw detection-head output tensors.
//!
//! A detection head emits a flat `f32` buffer. `TensorShape` records how that
//! buffer is laid out and `TensorView` borrows it read-only with bounds-checked
//! accessors, so decoders address values by `(attribute, candidate)` instead of
//! hand-written index arithmetic.

use crate::util::{DetPostError, DetPostResult};

/// Number of leading geometry attributes (`cx`, `cy`, `w`, `h`).
pub const BOX_ATTRIBUTES: usize = 4;

/// Attribute index of the objectness score in [`TensorLayout::AttributeMajor`].
pub const OBJECTNESS_ATTRIBUTE: usize = 4;

/// Memory layout of a detection head output.
///
/// The two variants are distinct model output conventions and are not
/// interchangeable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TensorLayout {
    /// `rows` are attributes and `columns` are candidates; attribute `a` of
    /// candidate `i` lives at `a * columns + i`. Attributes 0..4 are the box,
    /// attribute 4 is objectness and class scores follow.
    AttributeMajor,
    /// `rows` are candidates and `columns` are attributes; each candidate is
    /// contiguous. Attributes 0..4 are the box and class scores follow, with no
    /// objectness.
    CandidateMajor,
}

impl TensorLayout {
    /// Index of the first class score attribute.
    pub fn class_offset(self) -> usize {
        match self {
            TensorLayout::AttributeMajor => OBJECTNESS_ATTRIBUTE + 1,
            TensorLayout::CandidateMajor => BOX_ATTRIBUTES,
        }
    }

    /// Returns true when the layout carries a separate objectness attribute.
    pub fn has_objectness(self) -> bool {
        matches!(self, TensorLayout::AttributeMajor)
    }
}

/// Validated shape descriptor for a detection tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TensorShape {
    rows: usize,
    columns: usize,
    num_classes: usize,
    layout: TensorLayout,
}

impl TensorShape {
    /// Creates a shape with an explicit class count.
    ///
    /// A zero candidate dimension is valid and describes an empty tensor; a
    /// zero attribute dimension is not, nor is a shape whose element count
    /// overflows `usize`.
    ///
    /// Attributes past the class scores (e.g. mask coefficients) are allowed
    /// and ignored by the decoder.
    pub fn new(
        rows: usize,
        columns: usize,
        num_classes: usize,
        layout: TensorLayout,
    ) -> DetPostResult<Self> {
        let attributes = match layout {
            TensorLayout::AttributeMajor => rows,
            TensorLayout::CandidateMajor => columns,
        };
        if attributes == 0 || rows.checked_mul(columns).is_none() {
            return Err(DetPostError::InvalidShape { rows, columns });
        }
        if num_classes == 0 {
            return Err(DetPostError::NoClasses);
        }
        let shape = Self {
            rows,
            columns,
            num_classes,
            layout,
        };
        let required = layout.class_offset() + num_classes;
        if shape.attribute_count() < required {
            return Err(DetPostError::TooFewAttributes {
                attributes: shape.attribute_count(),
                required,
            });
        }
        Ok(shape)
    }

    /// Creates a shape whose class count fills every attribute after the
    /// geometry (and objectness, for attribute-major tensors).
    pub fn infer(rows: usize, columns: usize, layout: TensorLayout) -> DetPostResult<Self> {
        let attributes = match layout {
            TensorLayout::AttributeMajor => rows,
            TensorLayout::CandidateMajor => columns,
        };
        if attributes == 0 {
            return Err(DetPostError::InvalidShape { rows, columns });
        }
        let num_classes = attributes.saturating_sub(layout.class_offset());
        Self::new(rows, columns, num_classes, layout)
    }

    /// Returns the row count.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the column count.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Returns the number of class scores per candidate.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Returns the memory layout.
    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// Returns the number of candidate detections in the tensor.
    pub fn candidate_count(&self) -> usize {
        match self.layout {
            TensorLayout::AttributeMajor => self.columns,
            TensorLayout::CandidateMajor => self.rows,
        }
    }

    /// Returns the number of attributes stored per candidate.
    pub fn attribute_count(&self) -> usize {
        match self.layout {
            TensorLayout::AttributeMajor => self.rows,
            TensorLayout::CandidateMajor => self.columns,
        }
    }

    /// Returns the total number of values the buffer must hold.
    pub fn len(&self) -> usize {
        self.rows * self.columns
    }

    /// Returns true when the tensor holds no candidates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn flat_index(&self, attribute: usize, candidate: usize) -> usize {
        match self.layout {
            TensorLayout::AttributeMajor => attribute * self.columns + candidate,
            TensorLayout::CandidateMajor => candidate * self.columns + attribute,
        }
    }
}

/// Borrowed read-only view over a detection tensor.
#[derive(Copy, Clone, Debug)]
pub struct TensorView<'a> {
    data: &'a [f32],
    shape: TensorShape,
}

impl<'a> TensorView<'a> {
    /// Creates a view, rejecting buffers whose length differs from the shape.
    pub fn new(data: &'a [f32], shape: TensorShape) -> DetPostResult<Self> {
        let expected = shape
            .rows
            .checked_mul(shape.columns)
            .ok_or(DetPostError::InvalidShape {
                rows: shape.rows,
                columns: shape.columns,
            })?;
        if data.len() != expected {
            return Err(DetPostError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    /// Returns the shape descriptor.
    pub fn shape(&self) -> TensorShape {
        self.shape
    }

    /// Returns the backing buffer.
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Returns the number of candidates.
    pub fn candidate_count(&self) -> usize {
        self.shape.candidate_count()
    }

    /// Returns `attribute` of `candidate`, or `None` when out of range.
    pub fn get(&self, attribute: usize, candidate: usize) -> Option<f32> {
        if attribute >= self.shape.attribute_count() || candidate >= self.candidate_count() {
            return None;
        }
        self.data
            .get(self.shape.flat_index(attribute, candidate))
            .copied()
    }

    /// Unchecked-by-contract accessor for the decoder's inner loops.
    #[inline]
    pub(crate) fn at(&self, attribute: usize, candidate: usize) -> f32 {
        debug_assert!(attribute < self.shape.attribute_count());
        debug_assert!(candidate < self.candidate_count());
        self.data[self.shape.flat_index(attribute, candidate)]
    }

    /// Returns the contiguous attribute slice of a candidate-major candidate.
    pub fn candidate_row(&self, candidate: usize) -> Option<&'a [f32]> {
        if self.shape.layout != TensorLayout::CandidateMajor || candidate >= self.shape.rows {
            return None;
        }
        let start = candidate * self.shape.columns;
        self.data.get(start..start + self.shape.columns)
    }

    /// Iterates the class scores of one candidate in class order.
    pub fn class_scores(&self, candidate: usize) -> impl Iterator<Item = f32> + 'a {
        let view = *self;
        let offset = self.shape.layout.class_offset();
        let count = if candidate < self.candidate_count() {
            self.shape.num_classes
        } else {
            0
        };
        (0..count).map(move |class| view.at(offset + class, candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::{TensorLayout, TensorShape, TensorView};
    use crate::util::DetPostError;

    #[test]
    fn infer_derives_class_count_per_layout() {
        let a = TensorShape::infer(85, 10, TensorLayout::AttributeMajor).unwrap();
        assert_eq!(a.num_classes(), 80);
        assert_eq!(a.candidate_count(), 10);

        let b = TensorShape::infer(8400, 84, TensorLayout::CandidateMajor).unwrap();
        assert_eq!(b.num_classes(), 80);
        assert_eq!(b.candidate_count(), 8400);
    }

    #[test]
    fn infer_rejects_geometry_only_tensors() {
        let err = TensorShape::infer(5, 3, TensorLayout::AttributeMajor).unwrap_err();
        assert_eq!(err, DetPostError::NoClasses);
    }

    #[test]
    fn zero_candidates_is_a_valid_shape() {
        let shape = TensorShape::new(84, 0, 80, TensorLayout::AttributeMajor).unwrap();
        assert!(shape.is_empty());
        let view = TensorView::new(&[], shape).unwrap();
        assert_eq!(view.candidate_count(), 0);
    }

    #[test]
    fn zero_attributes_is_rejected() {
        let err = TensorShape::new(10, 0, 1, TensorLayout::CandidateMajor).unwrap_err();
        assert_eq!(err, DetPostError::InvalidShape { rows: 10, columns: 0 });
    }

    #[test]
    fn overflowing_shape_is_rejected() {
        let err = TensorShape::new(6, usize::MAX, 1, TensorLayout::AttributeMajor).unwrap_err();
        assert_eq!(
            err,
            DetPostError::InvalidShape {
                rows: 6,
                columns: usize::MAX,
            }
        );
        assert!(TensorShape::infer(usize::MAX, 6, TensorLayout::CandidateMajor).is_err());
    }

    #[test]
    fn attribute_major_indexing_strides_by_columns() {
        // 6 attributes (box, objectness, 1 class) x 2 candidates.
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let shape = TensorShape::new(6, 2, 1, TensorLayout::AttributeMajor).unwrap();
        let view = TensorView::new(&data, shape).unwrap();
        assert_eq!(view.get(0, 1), Some(1.0));
        assert_eq!(view.get(4, 0), Some(8.0));
        assert_eq!(view.get(6, 0), None);
        assert_eq!(view.get(0, 2), None);
        assert_eq!(view.class_scores(1).collect::<Vec<_>>(), vec![11.0]);
    }

    #[test]
    fn candidate_major_rows_are_contiguous() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let shape = TensorShape::new(2, 6, 2, TensorLayout::CandidateMajor).unwrap();
        let view = TensorView::new(&data, shape).unwrap();
        assert_eq!(view.candidate_row(1).unwrap(), &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(view.class_scores(0).collect::<Vec<_>>(), vec![4.0, 5.0]);
        assert!(view.candidate_row(2).is_none());
        assert_eq!(view.class_scores(5).count(), 0);
    }
}
