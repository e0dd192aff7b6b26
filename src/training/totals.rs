//! Summed-area ("fast totals") construction and hyper-rectangle queries.
//!
//! [`build_fast_totals`] converts a freshly-scattered histogram in place so
//! that bin `(i0, .., i_{D-1})` holds the sum of the raw histogram over the
//! box `[0,i0] x .. x [0,i_{D-1}]`. Construction is a single row-major pass
//! (axis 0 fastest) using the one sentinel bin past the main tensor as a
//! rolling axis-0 prefix, plus an inclusion-exclusion correction over the
//! remaining axes. No memory beyond the sentinel is touched.
//!
//! [`region_totals`] then answers any anchored hyper-rectangle query in
//! `O(2^popcount(mask))` bin reads.
//!
//! Debug builds re-derive every constructed cell from a copy of the raw
//! histogram and compare counts; [`verify_fast_totals`] exposes the same
//! check to tests.

use crate::data::{FeatureCombination, MAX_DIMENSIONS};
use crate::error::CoreError;
use crate::utils::disjoint_slices_mut;

use super::bins::{add_bin, bin, bin_count, copy_bin, subtract_bin, zero_bin, TensorLayout};

/// In-place summed-area transform of `histogram`.
///
/// The buffer must hold `tensor_volume + 1` bins. The final bin is the
/// rolling-previous sentinel: it is zeroed here before use and holds
/// whatever the last stripe left behind on return, like the rest of the
/// engine scratch.
pub fn build_fast_totals(
    histogram: &mut [f64],
    layout: &TensorLayout,
    combination: &FeatureCombination,
) {
    let dims = combination.dimension_count();
    let stride = layout.stride();
    let volume = combination.tensor_volume();
    debug_assert_eq!(histogram.len(), (volume + 1) * stride);

    #[cfg(debug_assertions)]
    let original = histogram[..volume * stride].to_vec();

    let axis_strides = combination.axis_strides();
    let (main, sentinel) = histogram.split_at_mut(volume * stride);
    let previous = &mut sentinel[..stride];
    zero_bin(previous);

    // Subsets of axes {1, .., D-1}; axis 0 is carried by the sentinel.
    let subset_end = 1usize << (dims - 1);
    let mut index = [0usize; MAX_DIMENSIONS];

    for flat in 0..volume {
        // Axis-0 prefix: cell += previous, previous = cell. The copy happens
        // before the corrections below on purpose - the sentinel tracks the
        // raw row prefix, not the finished total.
        {
            let cell = &mut main[flat * stride..(flat + 1) * stride];
            add_bin(cell, previous);
            copy_bin(previous, cell);
        }

        for subset in 1..subset_end {
            let mut back_offset = 0usize;
            let mut bits = subset;
            let mut at_lower_face = false;
            while bits != 0 {
                let axis = 1 + bits.trailing_zeros() as usize;
                if index[axis] == 0 {
                    // decrementing this axis would leave the tensor; the
                    // term is zero
                    at_lower_face = true;
                    break;
                }
                back_offset += axis_strides[axis];
                bits &= bits - 1;
            }
            if at_lower_face {
                continue;
            }
            let (cell, source) = disjoint_slices_mut(
                main,
                flat * stride,
                (flat - back_offset) * stride,
                stride,
            );
            if subset.count_ones() & 1 == 1 {
                add_bin(cell, source);
            } else {
                subtract_bin(cell, source);
            }
        }

        #[cfg(debug_assertions)]
        {
            let starts = [0usize; MAX_DIMENSIONS];
            let mut reference = vec![0.0; stride];
            box_total(
                &original,
                layout,
                combination,
                &starts[..dims],
                &index[..dims],
                &mut reference,
            );
            debug_assert_eq!(
                bin_count(&main[flat * stride..(flat + 1) * stride]),
                bin_count(&reference),
                "summed-area bin {} disagrees with the brute-force total",
                flat
            );
        }

        // Odometer advance; the sentinel restarts with every axis-0 stripe.
        let mut axis = 0;
        loop {
            index[axis] += 1;
            if index[axis] != combination.state_count(axis) {
                break;
            }
            index[axis] = 0;
            if axis == 0 {
                zero_bin(previous);
            }
            axis += 1;
            if axis == dims {
                break;
            }
        }
    }
}

/// Brute-force sum of the raw histogram over the box
/// `[starts[k], lasts[k]]` on every axis, written into `out`.
///
/// Reference implementation for debug checks and tests; `O(box volume)`.
pub fn box_total(
    histogram: &[f64],
    layout: &TensorLayout,
    combination: &FeatureCombination,
    starts: &[usize],
    lasts: &[usize],
    out: &mut [f64],
) {
    let dims = combination.dimension_count();
    debug_assert_eq!(starts.len(), dims);
    debug_assert_eq!(lasts.len(), dims);

    let axis_strides = combination.axis_strides();
    let mut flat = 0usize;
    for axis in 0..dims {
        debug_assert!(starts[axis] <= lasts[axis]);
        debug_assert!(lasts[axis] < combination.state_count(axis));
        flat += starts[axis] * axis_strides[axis];
    }

    zero_bin(out);
    let mut index = [0usize; MAX_DIMENSIONS];
    index[..dims].copy_from_slice(starts);

    loop {
        add_bin(out, bin(histogram, layout, flat));

        let mut axis = 0;
        loop {
            if index[axis] != lasts[axis] {
                index[axis] += 1;
                flat += axis_strides[axis];
                break;
            }
            flat -= (lasts[axis] - starts[axis]) * axis_strides[axis];
            index[axis] = starts[axis];
            axis += 1;
            if axis == dims {
                return;
            }
        }
    }
}

/// Check a constructed summed-area tensor against its raw histogram.
///
/// Counts must match exactly (integer weights cannot drift); the first
/// disagreeing bin is reported.
pub fn verify_fast_totals(
    raw: &[f64],
    totals: &[f64],
    layout: &TensorLayout,
    combination: &FeatureCombination,
) -> Result<(), CoreError> {
    let dims = combination.dimension_count();
    let stride = layout.stride();
    let volume = combination.tensor_volume();
    let starts = [0usize; MAX_DIMENSIONS];
    let mut index = [0usize; MAX_DIMENSIONS];
    let mut reference = vec![0.0; stride];

    for flat in 0..volume {
        box_total(raw, layout, combination, &starts[..dims], &index[..dims], &mut reference);
        if bin_count(&reference) != bin_count(bin(totals, layout, flat)) {
            return Err(CoreError::TotalsMismatch { index: flat });
        }

        let mut axis = 0;
        while axis < dims {
            index[axis] += 1;
            if index[axis] != combination.state_count(axis) {
                break;
            }
            index[axis] = 0;
            axis += 1;
        }
    }
    Ok(())
}

/// Sum of the raw histogram over the hyper-rectangle selected by `anchor`
/// and `direction`, answered from the summed-area tensor.
///
/// Bit `k` of `direction` picks the side of axis `k`: 0 selects
/// `[0, anchor[k]]`, 1 selects `[anchor[k] + 1, states_k - 1]`. The query
/// expands the high axes by inclusion-exclusion over the `2^popcount`
/// corner combinations; a corner term is added when its number of
/// anchor-side choices is even and subtracted otherwise. An all-low mask is
/// a single bin read.
pub fn region_totals(
    totals: &[f64],
    layout: &TensorLayout,
    combination: &FeatureCombination,
    anchor: &[usize],
    direction: usize,
    out: &mut [f64],
) {
    let dims = combination.dimension_count();
    debug_assert_eq!(anchor.len(), dims);
    debug_assert!(direction >> dims == 0, "direction mask has bits past the last axis");

    let mut multiple = 1usize;
    let mut starting_offset = 0usize;

    if direction == 0 {
        for axis in 0..dims {
            debug_assert!(anchor[axis] < combination.state_count(axis));
            starting_offset += multiple * anchor[axis];
            multiple *= combination.state_count(axis);
        }
        copy_bin(out, bin(totals, layout, starting_offset));
        return;
    }

    // For each high axis: the buffer offsets of the anchor corner and of the
    // far corner, both relative to starting_offset.
    let mut corners = [(0usize, 0usize); MAX_DIMENSIONS];
    let mut high_count = 0usize;
    for axis in 0..dims {
        let states = combination.state_count(axis);
        if direction >> axis & 1 == 1 {
            debug_assert!(anchor[axis] < states - 1, "high side of axis {} is empty", axis);
            let far = multiple * (states - 1);
            corners[high_count] = (multiple * anchor[axis], far);
            high_count += 1;
            multiple += far;
        } else {
            debug_assert!(anchor[axis] < states);
            starting_offset += multiple * anchor[axis];
            multiple *= states;
        }
    }

    zero_bin(out);
    for permute in 0..1usize << high_count {
        let mut offset = starting_offset;
        for (bit, &(anchor_corner, far_corner)) in corners[..high_count].iter().enumerate() {
            offset += if permute >> bit & 1 == 1 { far_corner } else { anchor_corner };
        }
        // + when the far-corner count has the same parity as the number of
        // high axes, i.e. the anchor-corner count is even.
        if (high_count as u32 + permute.count_ones()) & 1 == 0 {
            add_bin(out, bin(totals, layout, offset));
        } else {
            subtract_bin(out, bin(totals, layout, offset));
        }
    }
}
