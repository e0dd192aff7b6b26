//! Exhaustive best-split search over feature pairs.
//!
//! The driver bins the cases, builds the summed-area tensor in the
//! thread-local scratch, then enumerates every three-region partition that
//! one outer cut plus one inner cut per slab can produce:
//!
//! ```text
//! for outer axis in {0, 1}:
//!   for each outer cut:
//!     sweep the inner axis inside the outer-low slab  -> best low pair
//!     sweep the inner axis inside the outer-high slab -> best high pair
//!     score = best low gain + best high gain
//! ```
//!
//! The winning partition is written into the caller's segmented region as a
//! tree with two leaves on the outer axis and up to three segments on the
//! inner axis; when both slabs picked the same inner cut the grid collapses
//! to 2x2. Comparisons are strict, so ties resolve to the earliest
//! candidate in enumeration order and reruns are bit-identical.

use crate::data::{FeatureCombination, PackedInput};
use crate::error::CoreError;
use crate::sampling::SamplingSet;
use crate::utils::disjoint_slices_mut;

use super::bins::TensorLayout;
use super::cache::TrainingCache;
use super::gain::{leaf_prediction, node_gain};
use super::histogram::bin_cases;
use super::region::SegmentedRegion;
use super::totals::{build_fast_totals, region_totals};

/// Best cut found by one inner-axis sweep.
struct SweepOutcome {
    gain: f64,
    cut: usize,
}

/// Sweep every cut of `inner_axis` inside the slab selected by `slab_mask`,
/// maximizing the summed low+high node gain.
///
/// `anchor` must already carry the outer-axis coordinate; the sweep owns the
/// inner coordinate. On return `best` holds the winning low and high totals
/// back to back (two bins).
#[allow(clippy::too_many_arguments)]
fn sweep_inner_axis(
    totals: &[f64],
    layout: &TensorLayout,
    combination: &FeatureCombination,
    anchor: &mut [usize; 2],
    slab_mask: usize,
    inner_axis: usize,
    best: &mut [f64],
    scratch: &mut [f64],
) -> SweepOutcome {
    debug_assert_eq!(slab_mask & (1 << inner_axis), 0);
    let stride = layout.stride();
    let high_mask = slab_mask | 1 << inner_axis;
    let states = combination.state_count(inner_axis);

    let mut outcome = SweepOutcome { gain: f64::NEG_INFINITY, cut: 0 };
    for cut in 0..states - 1 {
        anchor[inner_axis] = cut;
        let (low, high) = disjoint_slices_mut(scratch, 0, stride, stride);
        region_totals(totals, layout, combination, &anchor[..], slab_mask, low);
        region_totals(totals, layout, combination, &anchor[..], high_mask, high);

        let gain = node_gain(low, layout) + node_gain(high, layout);
        debug_assert!(0.0 <= gain);
        if outcome.gain < gain {
            outcome = SweepOutcome { gain, cut };
            best.copy_from_slice(scratch);
        }
    }
    outcome
}

/// The globally best pair partition.
struct BestPartition {
    gain: f64,
    outer_axis: usize,
    outer_cut: usize,
    /// Inner cut chosen inside the outer-low slab.
    low_cut: usize,
    /// Inner cut chosen inside the outer-high slab.
    high_cut: usize,
}

/// Train the best pair split and write it into `update`.
///
/// `residuals` (and `hessians`, for classification layouts) are row-major
/// `case x output`; weights come from `sampling`. `update` must have been
/// allocated with at least two dimensions and the same vector length; on
/// success it holds the new partition, on error its previous contents.
#[allow(clippy::too_many_arguments)]
pub fn train_pair(
    combination: &FeatureCombination,
    layout: &TensorLayout,
    input: &PackedInput,
    residuals: &[f64],
    hessians: Option<&[f64]>,
    sampling: &SamplingSet,
    cache: &mut TrainingCache,
    update: &mut SegmentedRegion,
) -> Result<(), CoreError> {
    let dimensions = combination.dimension_count();
    if dimensions != 2 {
        return Err(CoreError::UnsupportedDimensions { dimensions });
    }
    debug_assert_eq!(update.vector_len(), layout.vector_len());

    let stride = layout.stride();
    let length = layout.histogram_len(combination.tensor_volume())?;
    let histogram = cache.acquire_histogram(length)?;
    bin_cases(histogram, layout, input, residuals, hessians, sampling);
    build_fast_totals(histogram, layout, combination);
    let totals: &[f64] = histogram;

    // Winner quadrants: [outer-low inner-low, outer-low inner-high,
    // outer-high inner-low, outer-high inner-high].
    let mut winner = vec![0.0; 4 * stride];
    let mut slab_low = vec![0.0; 2 * stride];
    let mut slab_high = vec![0.0; 2 * stride];
    let mut scratch = vec![0.0; 2 * stride];
    let mut anchor = [0usize; 2];

    let mut best = BestPartition {
        gain: f64::NEG_INFINITY,
        outer_axis: 0,
        outer_cut: 0,
        low_cut: 0,
        high_cut: 0,
    };

    for (outer_axis, inner_axis) in [(0usize, 1usize), (1, 0)] {
        for outer_cut in 0..combination.state_count(outer_axis) - 1 {
            anchor[outer_axis] = outer_cut;

            let low = sweep_inner_axis(
                totals, layout, combination, &mut anchor,
                0, inner_axis, &mut slab_low, &mut scratch,
            );
            let high = sweep_inner_axis(
                totals, layout, combination, &mut anchor,
                1 << outer_axis, inner_axis, &mut slab_high, &mut scratch,
            );

            let gain = low.gain + high.gain;
            if best.gain < gain {
                best = BestPartition {
                    gain,
                    outer_axis,
                    outer_cut,
                    low_cut: low.cut,
                    high_cut: high.cut,
                };
                winner[..2 * stride].copy_from_slice(&slab_low);
                winner[2 * stride..].copy_from_slice(&slab_high);
            }
        }
    }

    write_partition(&best, &winner, layout, update)
}

/// Write the winning partition into the segmented region.
///
/// All fallible growth happens before the first destructive write, so a
/// resource failure leaves the region's previous contents intact.
fn write_partition(
    best: &BestPartition,
    winner: &[f64],
    layout: &TensorLayout,
    update: &mut SegmentedRegion,
) -> Result<(), CoreError> {
    let stride = layout.stride();
    let vector_len = layout.vector_len();
    let outer = best.outer_axis;
    let inner = 1 - outer;

    let inner_divisions: [usize; 2];
    let inner_division_count;
    if best.low_cut == best.high_cut {
        inner_divisions = [best.low_cut, 0];
        inner_division_count = 1;
    } else {
        inner_divisions = [
            best.low_cut.min(best.high_cut),
            best.low_cut.max(best.high_cut),
        ];
        inner_division_count = 2;
    }

    update.set_dimension_count(2);
    update.reserve_divisions(outer, 1)?;
    update.reserve_divisions(inner, inner_division_count)?;
    update.ensure_value_capacity(vector_len * 2 * (inner_division_count + 1))?;

    update.reset();
    update.set_division_count(outer, 1)?;
    update.divisions_mut(outer)[0] = best.outer_cut;
    update.set_division_count(inner, inner_division_count)?;
    update
        .divisions_mut(inner)
        .copy_from_slice(&inner_divisions[..inner_division_count]);

    let axis0_segments = update.division_count(0) + 1;
    let axis1_segments = update.division_count(1) + 1;
    let inner_bounds = &inner_divisions[..inner_division_count];

    let values = update.values_mut();
    for i1 in 0..axis1_segments {
        for i0 in 0..axis0_segments {
            let (outer_segment, inner_segment) = if outer == 0 { (i0, i1) } else { (i1, i0) };
            // which side of this slab's own inner cut the segment falls on
            let slab_cut = if outer_segment == 0 { best.low_cut } else { best.high_cut };
            let segment_end = inner_bounds.get(inner_segment).copied().unwrap_or(usize::MAX);
            let inner_is_high = slab_cut < segment_end;
            let quadrant = 2 * outer_segment + inner_is_high as usize;
            let piece = &winner[quadrant * stride..(quadrant + 1) * stride];

            let cell = i1 * axis0_segments + i0;
            for output in 0..vector_len {
                values[cell * vector_len + output] = leaf_prediction(piece, layout, output);
            }
        }
    }
    Ok(())
}
