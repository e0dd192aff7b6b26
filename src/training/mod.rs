//! Training infrastructure: the multi-dimensional histogram engine.
//!
//! The pipeline every operation shares:
//!
//! 1. [`histogram::bin_cases`] scatters weighted case statistics into a
//!    dense N-dimensional contingency table ([`bins`] defines the cells)
//! 2. [`totals::build_fast_totals`] turns the table into a summed-area
//!    tensor in place
//! 3. [`totals::region_totals`] answers anchored hyper-rectangle queries in
//!    `O(2^D)` bin reads
//!
//! On top of that sit the consumers:
//!
//! - [`pair::train_pair`] / [`single::train_single`] - best-split search,
//!   writing a [`SegmentedRegion`] model update ([`train_update`] dispatches
//!   on dimensionality)
//! - [`interactions::score_interaction`] - pair interaction strength
//!
//! Scratch ownership follows one rule: each training thread owns one
//! [`TrainingCache`] plus its output [`SegmentedRegion`]s, and nothing in
//! here aliases or locks.

pub mod bins;
pub mod cache;
pub mod gain;
pub mod histogram;
pub mod interactions;
pub mod logger;
pub mod pair;
pub mod region;
pub mod single;
pub mod totals;

pub use bins::{ObjectiveKind, TensorLayout};
pub use cache::TrainingCache;
pub use interactions::{
    score_interaction, score_interactions, InteractionCandidate, ScoreParams,
};
pub use logger::{TrainingLogger, Verbosity};
pub use pair::train_pair;
pub use region::SegmentedRegion;
pub use single::train_single;

use crate::data::{FeatureCombination, PackedInput};
use crate::error::CoreError;
use crate::sampling::SamplingSet;

/// Train the best split for a combination of any supported dimensionality.
///
/// Dispatches to [`train_single`] or [`train_pair`]; other dimension counts
/// return the unsupported-dimensions error and leave `update` untouched.
#[allow(clippy::too_many_arguments)]
pub fn train_update(
    combination: &FeatureCombination,
    layout: &TensorLayout,
    input: &PackedInput,
    residuals: &[f64],
    hessians: Option<&[f64]>,
    sampling: &SamplingSet,
    cache: &mut TrainingCache,
    update: &mut SegmentedRegion,
) -> Result<(), CoreError> {
    match combination.dimension_count() {
        1 => train_single(combination, layout, input, residuals, hessians, sampling, cache, update),
        2 => train_pair(combination, layout, input, residuals, hessians, sampling, cache, update),
        dimensions => Err(CoreError::UnsupportedDimensions { dimensions }),
    }
}
