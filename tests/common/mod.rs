//! Shared helpers for integration tests.
#![allow(dead_code)]

use glassboost::data::{Feature, FeatureCombination, PackedInput};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Deterministic RNG for reproducible test data.
pub fn rng(seed: u64) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(seed)
}

/// A pair combination over features 0 and 1.
pub fn pair_combination(s0: usize, s1: usize) -> FeatureCombination {
    FeatureCombination::pair(Feature::new(s0, 0), Feature::new(s1, 1)).unwrap()
}

/// Random pair dataset: `n` cases with uniform states and residuals in
/// [-4, 4), packed and ready to train.
pub fn random_pair_dataset(
    s0: usize,
    s1: usize,
    n: usize,
    seed: u64,
) -> (FeatureCombination, PackedInput, Vec<f64>) {
    let mut rng = rng(seed);
    let combination = pair_combination(s0, s1);
    let f0: Vec<usize> = (0..n).map(|_| rng.gen_range(0..s0)).collect();
    let f1: Vec<usize> = (0..n).map(|_| rng.gen_range(0..s1)).collect();
    let residuals: Vec<f64> = (0..n).map(|_| rng.gen_range(-4.0..4.0)).collect();
    let input = PackedInput::pack(&combination, &[&f0, &f1]).unwrap();
    (combination, input, residuals)
}
