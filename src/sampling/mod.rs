//! Bootstrap sampling sets.
//!
//! A [`SamplingSet`] records how many times each original case occurs in one
//! bootstrap resample. The binner consumes the counts as integer weights, so
//! a resample never rearranges the dataset: cases keep their storage order
//! and absent cases simply carry weight zero.

use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Per-case occurrence counts for one resample of the training set.
///
/// The number of cases is fixed at the source dataset size and the counts
/// always sum to that size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplingSet {
    counts: Vec<usize>,
}

impl SamplingSet {
    /// Draw a bootstrap sample: `case_count` uniform draws with replacement,
    /// tallied into occurrence counts.
    ///
    /// Deterministic for a fixed seed.
    ///
    /// # Panics
    /// Panics if `case_count` is zero.
    pub fn bootstrap(case_count: usize, seed: u64) -> Self {
        assert!(0 < case_count, "cannot sample an empty dataset");
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut counts = vec![0usize; case_count];
        for _ in 0..case_count {
            let case = rng.gen_range(0..case_count);
            counts[case] += 1;
        }
        Self { counts }
    }

    /// The trivial sample: every case exactly once. Used when training
    /// without bagging.
    pub fn identity(case_count: usize) -> Self {
        assert!(0 < case_count, "cannot sample an empty dataset");
        Self { counts: vec![1; case_count] }
    }

    /// Wrap externally-computed occurrence counts.
    pub fn from_counts(counts: Vec<usize>) -> Self {
        assert!(!counts.is_empty(), "cannot sample an empty dataset");
        Self { counts }
    }

    /// Number of cases in the source dataset.
    #[inline]
    pub fn case_count(&self) -> usize {
        self.counts.len()
    }

    /// Occurrence count of one case.
    #[inline]
    pub fn occurrences(&self, case: usize) -> usize {
        self.counts[case]
    }

    /// Per-case occurrence counts.
    #[inline]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Total occurrences across all cases. For a bootstrap or identity set
    /// this equals the case count.
    pub fn total_occurrences(&self) -> usize {
        self.counts.iter().sum()
    }
}
