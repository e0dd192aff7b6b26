//! Statistics-bin layout and element-wise bin operations.
//!
//! A bin is one cell of the dense contingency tensor: a weighted case count
//! followed by per-output residual sums, and for classification per-output
//! hessian sums. Bins live packed back-to-back in a flat `f64` buffer; a
//! [`TensorLayout`] maps between bin indices and buffer offsets.
//!
//! The count occupies an `f64` slot on purpose: occurrence weights are
//! integers, integers are exact in a double far past any realistic dataset
//! size, and keeping every field in one homogeneous buffer lets add,
//! subtract and copy run as plain element-wise loops. Exact integer
//! arithmetic also means equal counts cancel to exactly zero, which the
//! summed-area construction relies on.

use crate::error::CoreError;
use crate::utils::{checked_add, checked_mul};

/// Which objective the statistics serve.
///
/// Regression bins carry `1 + L` slots (count + residual sums);
/// classification bins carry `1 + 2L` (count + residual sums + hessian sums).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectiveKind {
    Regression,
    Classification,
}

/// Geometry of one statistics bin: objective and output-vector length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TensorLayout {
    objective: ObjectiveKind,
    vector_len: usize,
}

impl TensorLayout {
    /// Layout for regression (single output).
    pub fn regression() -> Self {
        Self { objective: ObjectiveKind::Regression, vector_len: 1 }
    }

    /// Layout for classification over `target_class_count` classes.
    ///
    /// Binary classification is special-cased to a single log-odds output;
    /// multi-class gets one output per class.
    pub fn classification(target_class_count: usize) -> Self {
        assert!(2 <= target_class_count, "classification needs at least 2 classes");
        let vector_len = if target_class_count <= 2 { 1 } else { target_class_count };
        Self { objective: ObjectiveKind::Classification, vector_len }
    }

    #[inline]
    pub fn objective(&self) -> ObjectiveKind {
        self.objective
    }

    /// Number of model outputs per bin.
    #[inline]
    pub fn vector_len(&self) -> usize {
        self.vector_len
    }

    /// True when bins carry hessian sums.
    #[inline]
    pub fn has_hessians(&self) -> bool {
        self.objective == ObjectiveKind::Classification
    }

    /// `f64` slots per bin.
    #[inline]
    pub fn stride(&self) -> usize {
        match self.objective {
            ObjectiveKind::Regression => 1 + self.vector_len,
            ObjectiveKind::Classification => 1 + 2 * self.vector_len,
        }
    }

    /// Buffer length (in `f64`s) for a histogram of `volume` bins plus the
    /// rolling-previous sentinel, with overflow checked against both the
    /// element count and the byte size.
    pub fn histogram_len(&self, volume: usize) -> Result<usize, CoreError> {
        let bins = checked_add(volume, 1, "histogram bin count")?;
        let len = checked_mul(bins, self.stride(), "histogram length")?;
        checked_mul(len, std::mem::size_of::<f64>(), "histogram byte size")?;
        Ok(len)
    }

    /// Offset of the count slot of bin `index`.
    #[inline]
    pub fn bin_offset(&self, index: usize) -> usize {
        index * self.stride()
    }
}

// =============================================================================
// Bin Field Access
// =============================================================================

/// Weighted case count of a bin.
#[inline]
pub fn bin_count(bin: &[f64]) -> f64 {
    bin[0]
}

/// Residual sum for output `output`.
#[inline]
pub fn bin_residual(bin: &[f64], output: usize) -> f64 {
    bin[1 + output]
}

/// Hessian sum for output `output`. Classification layouts only.
#[inline]
pub fn bin_hessian(bin: &[f64], layout: &TensorLayout, output: usize) -> f64 {
    debug_assert!(layout.has_hessians());
    bin[1 + layout.vector_len() + output]
}

// =============================================================================
// Bin Operations
// =============================================================================
//
// All four operations are total and infallible; they treat the bin as an
// opaque vector of linearly-combining sums.

/// Zero every field of a bin.
#[inline]
pub fn zero_bin(bin: &mut [f64]) {
    bin.fill(0.0);
}

/// dst += src, element-wise.
#[inline]
pub fn add_bin(dst: &mut [f64], src: &[f64]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += s;
    }
}

/// dst -= src, element-wise.
#[inline]
pub fn subtract_bin(dst: &mut [f64], src: &[f64]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d -= s;
    }
}

/// Byte-equivalent replacement of dst by src.
#[inline]
pub fn copy_bin(dst: &mut [f64], src: &[f64]) {
    dst.copy_from_slice(src);
}

/// Borrow bin `index` of a histogram buffer.
#[inline]
pub fn bin<'a>(buffer: &'a [f64], layout: &TensorLayout, index: usize) -> &'a [f64] {
    let stride = layout.stride();
    let offset = index * stride;
    &buffer[offset..offset + stride]
}

/// Mutably borrow bin `index` of a histogram buffer.
#[inline]
pub fn bin_mut<'a>(buffer: &'a mut [f64], layout: &TensorLayout, index: usize) -> &'a mut [f64] {
    let stride = layout.stride();
    let offset = index * stride;
    &mut buffer[offset..offset + stride]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_by_objective() {
        assert_eq!(TensorLayout::regression().stride(), 2);
        assert_eq!(TensorLayout::classification(2).stride(), 3);
        assert_eq!(TensorLayout::classification(3).stride(), 7);
    }

    #[test]
    fn test_binary_classification_collapses_to_one_output() {
        assert_eq!(TensorLayout::classification(2).vector_len(), 1);
        assert_eq!(TensorLayout::classification(5).vector_len(), 5);
    }

    #[test]
    fn test_histogram_len_includes_sentinel() {
        let layout = TensorLayout::regression();
        // 6 bins + 1 sentinel, stride 2
        assert_eq!(layout.histogram_len(6).unwrap(), 14);
    }

    #[test]
    fn test_histogram_len_overflow() {
        let layout = TensorLayout::classification(3);
        assert!(layout.histogram_len(usize::MAX / 2).is_err());
    }

    #[test]
    fn test_bin_arithmetic_cancels_exactly() {
        let layout = TensorLayout::classification(2);
        let mut a = vec![5.0, 1.25, 0.5];
        let b = vec![2.0, 0.25, 0.5];
        add_bin(&mut a, &b);
        assert_eq!(a, vec![7.0, 1.5, 1.0]);
        subtract_bin(&mut a, &b);
        subtract_bin(&mut a, &b);
        // exact cancellation back past the original
        assert_eq!(a, vec![3.0, 1.0, 0.0]);

        let mut c = vec![1.0; layout.stride()];
        zero_bin(&mut c);
        assert_eq!(bin_count(&c), 0.0);
    }

    #[test]
    fn test_field_accessors() {
        let layout = TensorLayout::classification(3);
        let mut buffer = vec![0.0; layout.histogram_len(2).unwrap()];
        let b = bin_mut(&mut buffer, &layout, 1);
        b[0] = 4.0;
        b[1] = -1.0;
        b[4] = 2.5;
        let b = bin(&buffer, &layout, 1);
        assert_eq!(bin_count(b), 4.0);
        assert_eq!(bin_residual(b, 0), -1.0);
        assert_eq!(bin_hessian(b, &layout, 0), 2.5);
    }
}
