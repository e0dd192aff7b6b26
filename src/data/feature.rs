//! Feature and feature-combination metadata.
//!
//! A [`FeatureCombination`] treats an ordered tuple of discrete features as a
//! single N-dimensional categorical variable. The combination owns the
//! geometry every downstream stage depends on: the tensor volume (product of
//! per-axis state counts) and the bit-packing layout used by
//! [`PackedInput`](super::PackedInput).
//!
//! Member order matters: member 0 is the innermost ("fastest") axis of the
//! flattened tensor index.

use crate::error::CoreError;
use crate::utils::checked_mul;

/// Hard cap on combination dimensionality.
///
/// With the minimum of two states per axis, a combination of `usize::BITS`
/// features would already need more histogram bins than the address space can
/// hold, so one word of bits minus one is a true upper bound. The spare high
/// bit keeps direction-mask arithmetic from overflowing.
pub const MAX_DIMENSIONS: usize = usize::BITS as usize - 1;

/// A discrete feature: its bin count and its column position in the
/// per-feature input arrays. Names live in the caller's metadata; the core
/// never needs them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Feature {
    /// Number of discrete states (bins). Always at least 2.
    pub state_count: usize,
    /// Column index into the caller's row-major per-feature input arrays.
    pub feature_index: usize,
}

impl Feature {
    /// Create a feature descriptor.
    ///
    /// # Panics
    /// Panics if `state_count < 2`; a single-state feature carries no
    /// information and upstream binning never produces one.
    pub fn new(state_count: usize, feature_index: usize) -> Self {
        assert!(state_count >= 2, "feature needs at least 2 states, got {}", state_count);
        Self { state_count, feature_index }
    }
}

/// An ordered tuple of features treated as one N-dimensional variable.
///
/// Construction precomputes the tensor volume and the word-packing layout
/// (`items_per_word`, `bits_per_item`), rejecting combinations whose volume
/// overflows the platform word.
#[derive(Clone, Debug)]
pub struct FeatureCombination {
    members: Vec<Feature>,
    tensor_volume: usize,
    items_per_word: usize,
    bits_per_item: usize,
}

impl FeatureCombination {
    /// Build a combination from its ordered members.
    ///
    /// Fails with a resource error if the product of state counts does not
    /// fit in a `usize`.
    ///
    /// # Panics
    /// Panics if `members` is empty or longer than [`MAX_DIMENSIONS`].
    pub fn new(members: Vec<Feature>) -> Result<Self, CoreError> {
        assert!(!members.is_empty(), "combination needs at least one feature");
        assert!(
            members.len() <= MAX_DIMENSIONS,
            "combination has {} features, max is {}",
            members.len(),
            MAX_DIMENSIONS
        );

        let mut tensor_volume = 1usize;
        for member in &members {
            tensor_volume = checked_mul(tensor_volume, member.state_count, "tensor volume")?;
        }

        // Bits needed to store any flat tensor index, then how many such
        // items share one storage word. bits_per_item is the word size
        // divided by items_per_word, which can exceed the minimum bit count
        // (e.g. 5 bits needed -> 12 items -> 5 bits; 7 needed -> 9 items ->
        // 7 bits).
        let max_index = tensor_volume - 1;
        let bits_required = if max_index == 0 {
            1
        } else {
            usize::BITS as usize - max_index.leading_zeros() as usize
        };
        let items_per_word = usize::BITS as usize / bits_required;
        let bits_per_item = usize::BITS as usize / items_per_word;

        Ok(Self { members, tensor_volume, items_per_word, bits_per_item })
    }

    /// Convenience constructor for the common pair case.
    pub fn pair(first: Feature, second: Feature) -> Result<Self, CoreError> {
        Self::new(vec![first, second])
    }

    /// Number of member features (tensor dimensionality).
    #[inline]
    pub fn dimension_count(&self) -> usize {
        self.members.len()
    }

    /// Member features in axis order (axis 0 first).
    #[inline]
    pub fn members(&self) -> &[Feature] {
        &self.members
    }

    /// State count of the member on `axis`.
    #[inline]
    pub fn state_count(&self, axis: usize) -> usize {
        self.members[axis].state_count
    }

    /// Product of all member state counts.
    #[inline]
    pub fn tensor_volume(&self) -> usize {
        self.tensor_volume
    }

    /// How many packed tensor indices share one storage word.
    #[inline]
    pub fn items_per_word(&self) -> usize {
        self.items_per_word
    }

    /// Bit width of one packed tensor index.
    #[inline]
    pub fn bits_per_item(&self) -> usize {
        self.bits_per_item
    }

    /// Stride of each axis in the flattened tensor: the product of the state
    /// counts of all lower axes. Axis 0 has stride 1.
    pub fn axis_strides(&self) -> Vec<usize> {
        let mut strides = Vec::with_capacity(self.members.len());
        let mut stride = 1usize;
        for member in &self.members {
            strides.push(stride);
            stride *= member.state_count;
        }
        strides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_geometry() {
        let combo = FeatureCombination::pair(Feature::new(5, 0), Feature::new(3, 1)).unwrap();
        assert_eq!(combo.dimension_count(), 2);
        assert_eq!(combo.tensor_volume(), 15);
        assert_eq!(combo.axis_strides(), vec![1, 5]);
        // 15 states -> 4 bits -> 16 items per 64-bit word -> 4 bits per item
        assert_eq!(combo.items_per_word(), 16);
        assert_eq!(combo.bits_per_item(), 4);
    }

    #[test]
    fn test_bits_per_item_rounds_up_to_word_divisor() {
        // volume 40 -> max index 39 -> 6 bits -> 10 items -> 64/10 = 6 bits
        let combo = FeatureCombination::pair(Feature::new(8, 0), Feature::new(5, 1)).unwrap();
        assert_eq!(combo.items_per_word(), 10);
        assert_eq!(combo.bits_per_item(), 6);
        // volume 100 -> 7 bits -> 9 items -> 7 bits
        let combo = FeatureCombination::pair(Feature::new(10, 0), Feature::new(10, 1)).unwrap();
        assert_eq!(combo.items_per_word(), 9);
        assert_eq!(combo.bits_per_item(), 7);
    }

    #[test]
    fn test_single_feature_combination() {
        let combo = FeatureCombination::new(vec![Feature::new(2, 3)]).unwrap();
        assert_eq!(combo.dimension_count(), 1);
        assert_eq!(combo.tensor_volume(), 2);
        assert_eq!(combo.items_per_word(), 64);
        assert_eq!(combo.bits_per_item(), 1);
    }

    #[test]
    fn test_volume_overflow_is_rejected() {
        // 33 features of 4 states each overflow a 64-bit volume.
        let members: Vec<Feature> = (0..33).map(|i| Feature::new(4, i)).collect();
        let err = FeatureCombination::new(members).unwrap_err();
        assert!(err.is_resource());
    }
}
