//! Bit-packed case storage for a feature combination.
//!
//! Each training case collapses to one flat tensor index (member 0 fastest).
//! [`PackedInput::pack`] stores `items_per_word` successive indices per
//! storage word, earliest case in the least-significant bits, so unpacking is
//! a mask plus a running shift with no per-item repositioning. The tail word
//! leaves unused high bits zero.

use crate::data::FeatureCombination;
use crate::error::CoreError;
use crate::utils::checked_mul;

/// Word-packed tensor indices for every case of one feature combination.
///
/// Read-only after construction; the binner walks it once per training call.
#[derive(Clone, Debug)]
pub struct PackedInput {
    words: Vec<usize>,
    case_count: usize,
    items_per_word: usize,
    bits_per_item: usize,
}

impl PackedInput {
    /// Pack per-member state columns into words.
    ///
    /// `columns[k][i]` is the state of combination member `k` for case `i`,
    /// in the combination's member order. Fails with a resource error when
    /// the word count or byte size overflows.
    ///
    /// # Panics
    /// Panics if there are no cases, if the column count does not match the
    /// combination, or (debug builds) if any state is out of range.
    pub fn pack(
        combination: &FeatureCombination,
        columns: &[&[usize]],
    ) -> Result<Self, CoreError> {
        assert_eq!(
            columns.len(),
            combination.dimension_count(),
            "one state column per combination member"
        );
        let case_count = columns[0].len();
        assert!(0 < case_count, "cannot pack zero cases");
        for column in columns {
            assert_eq!(column.len(), case_count, "state columns must have equal length");
        }

        let items_per_word = combination.items_per_word();
        let bits_per_item = combination.bits_per_item();
        let word_count = (case_count - 1) / items_per_word + 1;
        // The capacity checks mirror the volume check done at combination
        // construction: reject before allocating.
        checked_mul(word_count, items_per_word, "packed item count")?;
        checked_mul(word_count, std::mem::size_of::<usize>(), "packed byte size")?;
        let mut words = Vec::new();
        words.try_reserve_exact(word_count)?;

        let mut case = 0;
        for _ in 0..word_count {
            let mut bits = 0usize;
            let mut shift = 0;
            let in_this_word = items_per_word.min(case_count - case);
            for _ in 0..in_this_word {
                let tensor_index = flat_index(combination, columns, case);
                bits |= tensor_index << shift;
                shift += bits_per_item;
                case += 1;
            }
            words.push(bits);
        }
        debug_assert_eq!(case, case_count);

        Ok(Self { words, case_count, items_per_word, bits_per_item })
    }

    /// Number of packed cases.
    #[inline]
    pub fn case_count(&self) -> usize {
        self.case_count
    }

    /// Raw storage words.
    #[inline]
    pub fn words(&self) -> &[usize] {
        &self.words
    }

    /// Iterate the per-case tensor indices in case order.
    #[inline]
    pub fn tensor_indices(&self) -> TensorIndexIter<'_> {
        TensorIndexIter {
            words: &self.words,
            mask: mask_for(self.bits_per_item),
            bits_per_item: self.bits_per_item,
            items_per_word: self.items_per_word,
            item_in_word: 0,
            word_index: 0,
            current: if self.words.is_empty() { 0 } else { self.words[0] },
            remaining: self.case_count,
        }
    }
}

#[inline]
fn mask_for(bits_per_item: usize) -> usize {
    if bits_per_item == usize::BITS as usize {
        usize::MAX
    } else {
        (1usize << bits_per_item) - 1
    }
}

/// Flatten one case's member states into a tensor index, member 0 fastest.
#[inline]
fn flat_index(combination: &FeatureCombination, columns: &[&[usize]], case: usize) -> usize {
    let mut tensor_multiple = 1;
    let mut tensor_index = 0;
    for (member, column) in combination.members().iter().zip(columns) {
        let state = column[case];
        debug_assert!(
            state < member.state_count,
            "state {} out of range for feature with {} states",
            state,
            member.state_count
        );
        tensor_index += tensor_multiple * state;
        tensor_multiple *= member.state_count;
    }
    tensor_index
}

/// Iterator over packed tensor indices, LSB-first within each word.
pub struct TensorIndexIter<'a> {
    words: &'a [usize],
    mask: usize,
    bits_per_item: usize,
    items_per_word: usize,
    item_in_word: usize,
    word_index: usize,
    current: usize,
    remaining: usize,
}

impl Iterator for TensorIndexIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        if self.item_in_word == self.items_per_word {
            self.word_index += 1;
            self.current = self.words[self.word_index];
            self.item_in_word = 0;
        }
        let index = self.current & self.mask;
        // checked_shr: bits_per_item is the full word width when only one
        // item fits per word, and a plain shift by the width would trap.
        self.current = self.current.checked_shr(self.bits_per_item as u32).unwrap_or(0);
        self.item_in_word += 1;
        self.remaining -= 1;
        Some(index)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for TensorIndexIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Feature;

    fn pair_3x2() -> FeatureCombination {
        FeatureCombination::pair(Feature::new(3, 0), Feature::new(2, 1)).unwrap()
    }

    #[test]
    fn test_pack_round_trip() {
        let combo = pair_3x2();
        let f0 = [0usize, 1, 2, 0, 1, 2, 0];
        let f1 = [0usize, 0, 0, 1, 1, 1, 0];
        let packed = PackedInput::pack(&combo, &[&f0, &f1]).unwrap();

        let expected: Vec<usize> =
            f0.iter().zip(&f1).map(|(&a, &b)| a + 3 * b).collect();
        let unpacked: Vec<usize> = packed.tensor_indices().collect();
        assert_eq!(unpacked, expected);
    }

    #[test]
    fn test_pack_spans_multiple_words() {
        // volume 40 -> 10 items per word; 23 cases need 3 words with a
        // partially-filled tail.
        let combo =
            FeatureCombination::pair(Feature::new(8, 0), Feature::new(5, 1)).unwrap();
        let n = 23;
        let f0: Vec<usize> = (0..n).map(|i| i % 8).collect();
        let f1: Vec<usize> = (0..n).map(|i| (i * 3) % 5).collect();
        let packed = PackedInput::pack(&combo, &[&f0, &f1]).unwrap();
        assert_eq!(packed.words().len(), 3);
        assert_eq!(packed.case_count(), n);

        let expected: Vec<usize> =
            (0..n).map(|i| f0[i] + 8 * f1[i]).collect();
        let unpacked: Vec<usize> = packed.tensor_indices().collect();
        assert_eq!(unpacked, expected);

        // Tail word: only 3 items live there, high bits stay zero.
        let tail = packed.words()[2];
        assert_eq!(tail >> (3 * combo.bits_per_item()), 0);
    }

    #[test]
    fn test_earliest_case_in_low_bits() {
        let combo = pair_3x2();
        let f0 = [2usize, 0];
        let f1 = [1usize, 0];
        let packed = PackedInput::pack(&combo, &[&f0, &f1]).unwrap();
        // case 0 has index 2 + 3*1 = 5, stored in the low bits_per_item bits
        assert_eq!(packed.words()[0] & 0b111, 5);
    }

    #[test]
    fn test_exact_size_iterator() {
        let combo = pair_3x2();
        let f0 = [0usize; 130];
        let f1 = [1usize; 130];
        let packed = PackedInput::pack(&combo, &[&f0, &f1]).unwrap();
        let iter = packed.tensor_indices();
        assert_eq!(iter.len(), 130);
        assert_eq!(iter.filter(|&t| t == 3).count(), 130);
    }
}
