//! Best-split search for single features.
//!
//! The one-dimensional case reuses the pair pipeline end to end - scatter,
//! prefix totals, anchored region queries - but the search degenerates to a
//! single sweep producing a two-leaf region.

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

/// Train the best single cut of a 1-feature combination into `update`.
///
/// On success the region holds one division and two value blocks; on error
/// its previous contents.
#[allow(clippy::too_many_arguments)]
pub fn train_single(
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
    if dimensions != 1 {
        return Err(CoreError::UnsupportedDimensions { dimensions });
    }
    debug_assert_eq!(update.vector_len(), layout.vector_len());

    let stride = layout.stride();
    let vector_len = layout.vector_len();
    let states = combination.state_count(0);
    let length = layout.histogram_len(combination.tensor_volume())?;
    let histogram = cache.acquire_histogram(length)?;
    bin_cases(histogram, layout, input, residuals, hessians, sampling);
    build_fast_totals(histogram, layout, combination);
    let totals: &[f64] = histogram;

    let mut best_pair = vec![0.0; 2 * stride];
    let mut scratch = vec![0.0; 2 * stride];
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_cut = 0usize;

    for cut in 0..states - 1 {
        let anchor = [cut];
        let (low, high) = disjoint_slices_mut(&mut scratch, 0, stride, stride);
        region_totals(totals, layout, combination, &anchor, 0b0, low);
        region_totals(totals, layout, combination, &anchor, 0b1, high);

        let gain = node_gain(low, layout) + node_gain(high, layout);
        debug_assert!(0.0 <= gain);
        if best_gain < gain {
            best_gain = gain;
            best_cut = cut;
            best_pair.copy_from_slice(&scratch);
        }
    }

    update.set_dimension_count(1);
    update.reserve_divisions(0, 1)?;
    update.ensure_value_capacity(vector_len * 2)?;

    update.reset();
    update.set_division_count(0, 1)?;
    update.divisions_mut(0)[0] = best_cut;
    let values = update.values_mut();
    for (segment, piece) in best_pair.chunks_exact(stride).enumerate() {
        for output in 0..vector_len {
            values[segment * vector_len + output] = leaf_prediction(piece, layout, output);
        }
    }
    Ok(())
}
