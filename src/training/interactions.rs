//! Pair interaction scoring.
//!
//! [`score_interaction`] reuses the training pipeline up to the summed-area
//! tensor, then exhaustively evaluates every `(cut0, cut1)` grid position:
//! the score of a position is the sum of the four per-quadrant node gains,
//! and the interaction strength of the pair is the maximum over positions.
//! No model update is produced.
//!
//! [`score_interactions`] ranks a whole candidate list, optionally fanning
//! out over rayon with one scratch cache per worker, which keeps every
//! histogram thread-local as the concurrency contract requires.

use rayon::prelude::*;

use crate::data::{FeatureCombination, PackedInput};
use crate::error::CoreError;
use crate::sampling::SamplingSet;

use super::bins::TensorLayout;
use super::cache::TrainingCache;
use super::gain::node_gain;
use super::histogram::bin_cases;
use super::logger::{TrainingLogger, Verbosity};
use super::totals::{build_fast_totals, region_totals};

/// Quadrant selectors around an anchor: low-low, low-high, high-low,
/// high-high (bit 0 = axis 0).
const QUADRANT_MASKS: [usize; 4] = [0b00, 0b10, 0b01, 0b11];

/// Score one feature pair; higher means a stronger interaction.
///
/// Only pairs are scoreable; anything else is rejected as unsupported.
pub fn score_interaction(
    combination: &FeatureCombination,
    layout: &TensorLayout,
    input: &PackedInput,
    residuals: &[f64],
    hessians: Option<&[f64]>,
    sampling: &SamplingSet,
    cache: &mut TrainingCache,
) -> Result<f64, CoreError> {
    let dimensions = combination.dimension_count();
    if dimensions != 2 {
        return Err(CoreError::UnsupportedDimensions { dimensions });
    }

    let stride = layout.stride();
    let length = layout.histogram_len(combination.tensor_volume())?;
    let histogram = cache.acquire_histogram(length)?;
    bin_cases(histogram, layout, input, residuals, hessians, sampling);
    build_fast_totals(histogram, layout, combination);
    let totals: &[f64] = histogram;

    let mut quadrant = vec![0.0; stride];
    let mut best = f64::NEG_INFINITY;
    for cut0 in 0..combination.state_count(0) - 1 {
        for cut1 in 0..combination.state_count(1) - 1 {
            let anchor = [cut0, cut1];
            let mut score = 0.0;
            for mask in QUADRANT_MASKS {
                region_totals(totals, layout, combination, &anchor, mask, &mut quadrant);
                score += node_gain(&quadrant, layout);
            }
            debug_assert!(0.0 <= score);
            if best < score {
                best = score;
            }
        }
    }
    Ok(best)
}

/// One entry of a batch scoring run.
#[derive(Clone, Debug)]
pub struct InteractionCandidate {
    pub combination: FeatureCombination,
    pub input: PackedInput,
}

/// Options for batch interaction scoring.
#[derive(Clone, Copy, Debug)]
pub struct ScoreParams {
    /// Fan candidates out over the rayon pool.
    pub parallel: bool,
    /// Progress logging level.
    pub verbosity: Verbosity,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self { parallel: true, verbosity: Verbosity::default() }
    }
}

impl ScoreParams {
    /// Builder: force sequential evaluation.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Builder: set the logging level.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}

/// Score every candidate pair, preserving input order.
///
/// The parallel path gives each rayon worker its own [`TrainingCache`];
/// results are deterministic and identical to the sequential path.
pub fn score_interactions(
    candidates: &[InteractionCandidate],
    layout: &TensorLayout,
    residuals: &[f64],
    hessians: Option<&[f64]>,
    sampling: &SamplingSet,
    params: &ScoreParams,
) -> Result<Vec<f64>, CoreError> {
    let logger = TrainingLogger::new(params.verbosity);

    let scores: Result<Vec<f64>, CoreError> = if params.parallel {
        candidates
            .par_iter()
            .map_init(TrainingCache::new, |cache, candidate| {
                score_interaction(
                    &candidate.combination,
                    layout,
                    &candidate.input,
                    residuals,
                    hessians,
                    sampling,
                    cache,
                )
            })
            .collect()
    } else {
        let mut cache = TrainingCache::new();
        candidates
            .iter()
            .map(|candidate| {
                score_interaction(
                    &candidate.combination,
                    layout,
                    &candidate.input,
                    residuals,
                    hessians,
                    sampling,
                    &mut cache,
                )
            })
            .collect()
    };
    let scores = scores?;

    if logger.is_enabled(Verbosity::Debug) {
        for (candidate, score) in candidates.iter().zip(&scores) {
            let features: Vec<usize> = candidate
                .combination
                .members()
                .iter()
                .map(|member| member.feature_index)
                .collect();
            logger.log(Verbosity::Debug, &format!("pair {:?} scored {:.6}", features, score));
        }
    }
    logger.log(
        Verbosity::Info,
        &format!("scored {} interaction candidates", candidates.len()),
    );
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Feature;
    use approx::assert_abs_diff_eq;

    fn pair_combo(s0: usize, s1: usize) -> FeatureCombination {
        FeatureCombination::pair(Feature::new(s0, 0), Feature::new(s1, 1)).unwrap()
    }

    /// A single loaded cell in a 3x3 table: the best grid position isolates
    /// it, and its quadrant contributes residual^2 / count exactly.
    #[test]
    fn test_single_mass_cell_score() {
        let layout = TensorLayout::regression();
        let combination = pair_combo(3, 3);
        let f0 = [1usize];
        let f1 = [1usize];
        let input = PackedInput::pack(&combination, &[&f0, &f1]).unwrap();
        let residuals = [6.0];
        let sampling = SamplingSet::identity(1);
        let mut cache = TrainingCache::new();

        let score = score_interaction(
            &combination, &layout, &input, &residuals, None, &sampling, &mut cache,
        )
        .unwrap();
        assert_abs_diff_eq!(score, 36.0, epsilon = f64::EPSILON);
    }

    /// Each quadrant of the best grid position contributes its node gain;
    /// with unit counts the checkerboard sums to 4.
    #[test]
    fn test_quadrant_gain_sum() {
        let layout = TensorLayout::regression();
        let combination = pair_combo(2, 2);
        let f0 = [0usize, 1, 0, 1];
        let f1 = [0usize, 0, 1, 1];
        let input = PackedInput::pack(&combination, &[&f0, &f1]).unwrap();
        let sampling = SamplingSet::identity(4);
        let mut cache = TrainingCache::new();

        let checker = [1.0, -1.0, -1.0, 1.0];
        let score = score_interaction(
            &combination, &layout, &input, &checker, None, &sampling, &mut cache,
        )
        .unwrap();
        assert_abs_diff_eq!(score, 4.0);

        let flat = [1.0, 1.0, 1.0, 1.0];
        let score = score_interaction(
            &combination, &layout, &input, &flat, None, &sampling, &mut cache,
        )
        .unwrap();
        // every quadrant predicts the same value; gain sums to the total
        // regardless of the cut, which is the no-interaction baseline
        assert_abs_diff_eq!(score, 4.0);
    }

    #[test]
    fn test_rejects_non_pairs() {
        let layout = TensorLayout::regression();
        let combination = FeatureCombination::new(vec![Feature::new(2, 0)]).unwrap();
        let f0 = [0usize];
        let input = PackedInput::pack(&combination, &[&f0]).unwrap();
        let sampling = SamplingSet::identity(1);
        let mut cache = TrainingCache::new();

        let err = score_interaction(
            &combination, &layout, &input, &[0.0], None, &sampling, &mut cache,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedDimensions { dimensions: 1 }));
    }

    #[test]
    fn test_batch_parallel_matches_sequential() {
        let layout = TensorLayout::regression();
        let n = 40;
        let residuals: Vec<f64> = (0..n).map(|i| ((i * 13) % 7) as f64 - 3.0).collect();
        let sampling = SamplingSet::bootstrap(n, 5);

        let mut candidates = Vec::new();
        for (s0, s1) in [(2, 3), (4, 4), (3, 5), (6, 2)] {
            let combination = pair_combo(s0, s1);
            let f0: Vec<usize> = (0..n).map(|i| (i * 3) % s0).collect();
            let f1: Vec<usize> = (0..n).map(|i| (i * 5) % s1).collect();
            let input = PackedInput::pack(&combination, &[&f0, &f1]).unwrap();
            candidates.push(InteractionCandidate { combination, input });
        }

        let parallel = score_interactions(
            &candidates, &layout, &residuals, None, &sampling, &ScoreParams::default(),
        )
        .unwrap();
        let sequential = score_interactions(
            &candidates, &layout, &residuals, None, &sampling,
            &ScoreParams::default().sequential(),
        )
        .unwrap();
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.len(), candidates.len());
    }
}
