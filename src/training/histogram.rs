//! Histogram building (scatter pass).
//!
//! Walks the packed input once and accumulates each case's weighted
//! statistics into its tensor bin. The inner loop is monomorphized over the
//! output-vector length for the common small cases (1, 2 or 3 outputs), with
//! a dynamic fallback; the compiler unrolls the fixed-length loops, which is
//! where the scatter spends its time on wide multi-class problems.
//!
//! The histogram must arrive zeroed (the cache guarantees this) and sized
//! for `volume + 1` bins; the scatter itself never touches the sentinel.

use crate::data::PackedInput;
use crate::sampling::SamplingSet;

use super::bins::TensorLayout;

/// Accumulate every case of `input` into `histogram`.
///
/// `residuals` is row-major `case x output`; `hessians` has the same shape
/// and is required exactly for classification layouts. Each case's fields
/// are scaled by its occurrence count in `sampling`.
///
/// # Panics
/// Panics (debug builds) on shape mismatches between the buffers and the
/// layout.
pub fn bin_cases(
    histogram: &mut [f64],
    layout: &TensorLayout,
    input: &PackedInput,
    residuals: &[f64],
    hessians: Option<&[f64]>,
    sampling: &SamplingSet,
) {
    let vector_len = layout.vector_len();
    debug_assert_eq!(residuals.len(), input.case_count() * vector_len);
    debug_assert_eq!(sampling.case_count(), input.case_count());
    debug_assert_eq!(layout.has_hessians(), hessians.is_some());
    if let Some(hessians) = hessians {
        debug_assert_eq!(hessians.len(), residuals.len());
    }

    match (vector_len, hessians) {
        (1, None) => scatter_fixed::<1>(histogram, layout, input, residuals, None, sampling),
        (1, Some(h)) => scatter_fixed::<1>(histogram, layout, input, residuals, Some(h), sampling),
        (2, Some(h)) => scatter_fixed::<2>(histogram, layout, input, residuals, Some(h), sampling),
        (3, Some(h)) => scatter_fixed::<3>(histogram, layout, input, residuals, Some(h), sampling),
        _ => scatter_dynamic(histogram, layout, input, residuals, hessians, sampling),
    }
}

/// Scatter with a compile-time output count; the per-output loops unroll.
fn scatter_fixed<const L: usize>(
    histogram: &mut [f64],
    layout: &TensorLayout,
    input: &PackedInput,
    residuals: &[f64],
    hessians: Option<&[f64]>,
    sampling: &SamplingSet,
) {
    debug_assert_eq!(layout.vector_len(), L);
    let stride = layout.stride();
    let counts = sampling.counts();

    for (case, tensor_index) in input.tensor_indices().enumerate() {
        let occurrences = counts[case];
        if occurrences == 0 {
            continue;
        }
        let weight = occurrences as f64;
        let offset = tensor_index * stride;
        debug_assert!(offset + stride <= histogram.len() - stride, "scatter into sentinel");
        let bin = &mut histogram[offset..offset + stride];

        bin[0] += weight;
        let row = case * L;
        for output in 0..L {
            bin[1 + output] += weight * residuals[row + output];
        }
        if let Some(hessians) = hessians {
            for output in 0..L {
                bin[1 + L + output] += weight * hessians[row + output];
            }
        }
    }
}

/// Runtime-length fallback for wide output vectors.
fn scatter_dynamic(
    histogram: &mut [f64],
    layout: &TensorLayout,
    input: &PackedInput,
    residuals: &[f64],
    hessians: Option<&[f64]>,
    sampling: &SamplingSet,
) {
    let vector_len = layout.vector_len();
    let stride = layout.stride();
    let counts = sampling.counts();

    for (case, tensor_index) in input.tensor_indices().enumerate() {
        let occurrences = counts[case];
        if occurrences == 0 {
            continue;
        }
        let weight = occurrences as f64;
        let offset = tensor_index * stride;
        let bin = &mut histogram[offset..offset + stride];

        bin[0] += weight;
        let row = case * vector_len;
        for output in 0..vector_len {
            bin[1 + output] += weight * residuals[row + output];
        }
        if let Some(hessians) = hessians {
            for output in 0..vector_len {
                bin[1 + vector_len + output] += weight * hessians[row + output];
            }
        }
    }
}
