//! Piecewise-constant N-dimensional model tensors.
//!
//! A [`SegmentedRegion`] stores, per axis, a strictly-ascending list of
//! division points (a division at `d` closes the segment that still includes
//! state `d`), plus a dense value grid with one `vector_len` block per
//! segment cell, axis 0 fastest. Model updates from the split drivers land
//! here, get scaled by the learning rate, and accumulate into the running
//! model via [`add`](SegmentedRegion::add) / [`expand`](SegmentedRegion::expand).
//!
//! Both `expand` and `add` rewrite the value grid in place from the highest
//! linear index downward. That order is load-before-store correctness, not a
//! performance trick: every destination cell sits at or above its source
//! cells, so a forward pass would overwrite values it still has to read.
//! `test_add_forward_rewrite_would_clobber` pins this.

use crate::data::MAX_DIMENSIONS;
use crate::error::CoreError;

/// Per-axis division storage. Capacity only ever grows.
#[derive(Clone, Debug, Default)]
struct Axis {
    divisions: Vec<usize>,
}

/// Cursor state for one axis during a reverse in-place rewrite.
#[derive(Clone, Copy, Debug, Default)]
struct MergeCursor {
    /// Descending index into this region's divisions; -1 when exhausted.
    division1: isize,
    /// Descending index into the other operand's divisions (`add`) or the
    /// countdown over target divisions (`expand`); -1 when exhausted.
    division2: isize,
    /// Division count of the merged axis.
    merged: usize,
}

/// Piecewise-constant function over integer tensor indices.
#[derive(Clone, Debug)]
pub struct SegmentedRegion {
    vector_len: usize,
    max_dimensions: usize,
    dimension_count: usize,
    axes: Vec<Axis>,
    /// Backing storage; `values[..value_count()]` is the live grid, the tail
    /// is reserve kept across reuse.
    values: Vec<f64>,
    expanded: bool,
}

impl SegmentedRegion {
    /// Empty region: zero divisions on every axis, one zero value block.
    ///
    /// `max_dimensions` bounds later `set_dimension_count` calls; the
    /// dimension count starts at the maximum.
    pub fn new(max_dimensions: usize, vector_len: usize) -> Self {
        assert!(0 < max_dimensions && max_dimensions <= MAX_DIMENSIONS);
        assert!(1 <= vector_len);
        Self {
            vector_len,
            max_dimensions,
            dimension_count: max_dimensions,
            axes: vec![Axis::default(); max_dimensions],
            values: vec![0.0; vector_len],
            expanded: false,
        }
    }

    #[inline]
    pub fn vector_len(&self) -> usize {
        self.vector_len
    }

    #[inline]
    pub fn dimension_count(&self) -> usize {
        self.dimension_count
    }

    /// Narrow or widen the active dimension count (within the allocation
    /// maximum). Axes outside the active range keep their storage.
    pub fn set_dimension_count(&mut self, count: usize) {
        assert!(0 < count && count <= self.max_dimensions);
        self.dimension_count = count;
    }

    #[inline]
    pub fn division_count(&self, axis: usize) -> usize {
        self.axes[axis].divisions.len()
    }

    #[inline]
    pub fn divisions(&self, axis: usize) -> &[usize] {
        &self.axes[axis].divisions
    }

    #[inline]
    pub fn divisions_mut(&mut self, axis: usize) -> &mut [usize] {
        &mut self.axes[axis].divisions
    }

    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Live value count: `vector_len * product(division_count + 1)`.
    pub fn value_count(&self) -> usize {
        let mut count = self.vector_len;
        for axis in &self.axes[..self.dimension_count] {
            count *= axis.divisions.len() + 1;
        }
        count
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values[..self.value_count()]
    }

    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        let count = self.value_count();
        &mut self.values[..count]
    }

    /// Grow an axis's division capacity without touching its count. Growth
    /// is geometric (x1.5) so repeated unions amortize.
    pub fn reserve_divisions(&mut self, axis: usize, count: usize) -> Result<(), CoreError> {
        let divisions = &mut self.axes[axis].divisions;
        if divisions.capacity() < count {
            let target = count + (count >> 1);
            divisions.try_reserve(target - divisions.len())?;
        }
        Ok(())
    }

    /// Set the division count of one axis, preserving existing entries.
    /// Shrinking keeps the storage; growth appends zeros for the caller to
    /// overwrite.
    pub fn set_division_count(&mut self, axis: usize, count: usize) -> Result<(), CoreError> {
        debug_assert!(
            !self.expanded || count <= self.axes[axis].divisions.len(),
            "an expanded region is already at full division count"
        );
        self.reserve_divisions(axis, count)?;
        let divisions = &mut self.axes[axis].divisions;
        if count <= divisions.len() {
            divisions.truncate(count);
        } else {
            divisions.resize(count, 0);
        }
        Ok(())
    }

    /// Grow the value backing store to at least `count` slots (geometric
    /// growth, zero-filled). Never shrinks.
    pub fn ensure_value_capacity(&mut self, count: usize) -> Result<(), CoreError> {
        if self.values.len() < count {
            debug_assert!(!self.expanded, "an expanded region is already at full value count");
            let target = count + (count >> 1);
            self.values.try_reserve(target - self.values.len())?;
            self.values.resize(target, 0.0);
        }
        Ok(())
    }

    /// Back to the empty state: no divisions on any active axis, one zero
    /// value block. Storage is retained.
    pub fn reset(&mut self) {
        for axis in &mut self.axes[..self.dimension_count] {
            axis.divisions.clear();
        }
        self.values[..self.vector_len].fill(0.0);
        self.expanded = false;
    }

    /// Deep overwrite from another region of identical shape parameters.
    pub fn copy_from(&mut self, source: &SegmentedRegion) -> Result<(), CoreError> {
        assert_eq!(self.dimension_count, source.dimension_count);
        assert_eq!(self.vector_len, source.vector_len);

        // All capacity first, so failure leaves the previous contents intact.
        for axis in 0..self.dimension_count {
            self.reserve_divisions(axis, source.division_count(axis))?;
        }
        self.ensure_value_capacity(source.value_count())?;

        for axis in 0..self.dimension_count {
            let count = source.division_count(axis);
            self.set_division_count(axis, count)?;
            self.axes[axis].divisions.copy_from_slice(source.divisions(axis));
        }
        let count = source.value_count();
        self.values[..count].copy_from_slice(&source.values[..count]);
        self.expanded = source.expanded;
        Ok(())
    }

    /// Scale every live value.
    pub fn multiply(&mut self, factor: f64) {
        for value in self.values_mut() {
            *value *= factor;
        }
    }

    /// Re-grid onto one segment per state: every axis gets the identity
    /// division sequence `0..states-1` and each fine cell receives the value
    /// of the coarse segment that contained it.
    ///
    /// `state_counts[k]` is the full state count of axis `k`. Idempotent.
    pub fn expand(&mut self, state_counts: &[usize]) -> Result<(), CoreError> {
        if self.expanded {
            return Ok(());
        }
        let dims = self.dimension_count;
        let vector_len = self.vector_len;
        debug_assert_eq!(state_counts.len(), dims);

        let mut cursors = [MergeCursor::default(); MAX_DIMENSIONS];
        let mut old_cells = 1usize;
        let mut new_cells = 1usize;
        for axis in 0..dims {
            let divisions = &self.axes[axis].divisions;
            debug_assert!(divisions.len() + 1 <= state_counts[axis]);
            old_cells *= divisions.len() + 1;
            new_cells *= state_counts[axis];
            cursors[axis] = MergeCursor {
                division1: divisions.len() as isize - 1,
                division2: state_counts[axis] as isize - 2,
                merged: state_counts[axis] - 1,
            };
        }

        self.ensure_value_capacity(new_cells * vector_len)?;
        for axis in 0..dims {
            self.reserve_divisions(axis, state_counts[axis] - 1)?;
        }

        // Reverse in-place rewrite of the value grid.
        let mut source = (old_cells * vector_len) as isize - 1;
        let mut top = (new_cells * vector_len) as isize - 1;
        loop {
            let mut block = source;
            for _ in 0..vector_len {
                self.values[top as usize] = self.values[block as usize];
                top -= 1;
                block -= 1;
            }
            if top < 0 {
                break;
            }

            let mut axis = 0;
            let mut multiplication = vector_len as isize;
            loop {
                let cursor = &mut cursors[axis];
                if 0 <= cursor.division1 {
                    let division = self.axes[axis].divisions[cursor.division1 as usize] as isize;
                    debug_assert!(0 <= cursor.division2);
                    if cursor.division2 <= division {
                        cursor.division1 -= 1;
                        source -= multiplication;
                    }
                    cursor.division2 -= 1;
                    break;
                } else if 0 <= cursor.division2 {
                    cursor.division2 -= 1;
                    break;
                } else {
                    // this axis is spent: rewind to the last cell of the
                    // same source row and carry into the next axis
                    let segments = (self.axes[axis].divisions.len() + 1) as isize;
                    source -= multiplication;
                    multiplication *= segments;
                    source += multiplication;
                    cursor.division1 = self.axes[axis].divisions.len() as isize - 1;
                    cursor.division2 = cursor.merged as isize - 1;
                    axis += 1;
                }
            }
        }
        debug_assert_eq!(top, -1);
        debug_assert_eq!(source, vector_len as isize - 1);

        for axis in 0..dims {
            let count = state_counts[axis] - 1;
            if count != self.axes[axis].divisions.len() {
                self.set_division_count(axis, count)?;
            }
            for (division, slot) in self.axes[axis].divisions.iter_mut().enumerate() {
                *slot = division;
            }
        }
        self.expanded = true;
        Ok(())
    }

    /// Pointwise sum with `rhs`, re-gridded onto the per-axis union of both
    /// division sets.
    ///
    /// The value grid is rewritten in reverse linear order (see module
    /// docs); divisions are merged per axis afterwards, also in reverse,
    /// with a bulk tail copy once one operand is exhausted.
    pub fn add(&mut self, rhs: &SegmentedRegion) -> Result<(), CoreError> {
        assert_eq!(self.dimension_count, rhs.dimension_count);
        assert_eq!(self.vector_len, rhs.vector_len);
        let dims = self.dimension_count;
        let vector_len = self.vector_len;

        let mut cursors = [MergeCursor::default(); MAX_DIMENSIONS];
        let mut cells1 = 1usize;
        let mut cells2 = 1usize;
        let mut merged_cells = 1usize;
        for axis in 0..dims {
            let divisions1 = &self.axes[axis].divisions;
            let divisions2 = &rhs.axes[axis].divisions;
            cells1 *= divisions1.len() + 1;
            cells2 *= divisions2.len() + 1;
            let merged = merged_division_count(divisions1, divisions2);
            cursors[axis] = MergeCursor {
                division1: divisions1.len() as isize - 1,
                division2: divisions2.len() as isize - 1,
                merged,
            };
            merged_cells *= merged + 1;
        }

        self.ensure_value_capacity(merged_cells * vector_len)?;
        for axis in 0..dims {
            self.reserve_divisions(axis, cursors[axis].merged)?;
        }

        // Reverse in-place rewrite: self's old grid is source 1 and the
        // destination at once.
        let mut value1 = (cells1 * vector_len) as isize - 1;
        let mut value2 = (cells2 * vector_len) as isize - 1;
        let mut top = (merged_cells * vector_len) as isize - 1;
        loop {
            let mut block1 = value1;
            let mut block2 = value2;
            for _ in 0..vector_len {
                self.values[top as usize] =
                    self.values[block1 as usize] + rhs.values[block2 as usize];
                top -= 1;
                block1 -= 1;
                block2 -= 1;
            }
            if top < 0 {
                break;
            }

            let mut axis = 0;
            let mut multiplication1 = vector_len as isize;
            let mut multiplication2 = vector_len as isize;
            loop {
                let cursor = &mut cursors[axis];
                let valid1 = 0 <= cursor.division1;
                let valid2 = 0 <= cursor.division2;
                if valid1 && valid2 {
                    let d1 = self.axes[axis].divisions[cursor.division1 as usize];
                    let d2 = rhs.axes[axis].divisions[cursor.division2 as usize];
                    if d2 <= d1 {
                        cursor.division1 -= 1;
                        value1 -= multiplication1;
                    }
                    if d1 <= d2 {
                        cursor.division2 -= 1;
                        value2 -= multiplication2;
                    }
                    break;
                } else if valid1 {
                    cursor.division1 -= 1;
                    value1 -= multiplication1;
                    break;
                } else if valid2 {
                    cursor.division2 -= 1;
                    value2 -= multiplication2;
                    break;
                } else {
                    let segments1 = (self.axes[axis].divisions.len() + 1) as isize;
                    let segments2 = (rhs.axes[axis].divisions.len() + 1) as isize;
                    value1 -= multiplication1;
                    value2 -= multiplication2;
                    multiplication1 *= segments1;
                    multiplication2 *= segments2;
                    value1 += multiplication1;
                    value2 += multiplication2;
                    cursor.division1 = self.axes[axis].divisions.len() as isize - 1;
                    cursor.division2 = rhs.axes[axis].divisions.len() as isize - 1;
                    axis += 1;
                }
            }
        }
        debug_assert_eq!(top, -1);
        debug_assert_eq!(value1, vector_len as isize - 1);
        debug_assert_eq!(value2, vector_len as isize - 1);

        // Division merge, per axis, descending with tail short-circuits.
        for axis in 0..dims {
            let merged = cursors[axis].merged;
            let old_count = self.axes[axis].divisions.len();
            self.set_division_count(axis, merged)?;
            let divisions2 = &rhs.axes[axis].divisions;
            let divisions1 = &mut self.axes[axis].divisions;

            let mut p1 = old_count as isize - 1;
            let mut p2 = divisions2.len() as isize - 1;
            let mut t = merged as isize - 1;
            loop {
                if t == p1 {
                    // the surviving prefix of our own divisions is already
                    // in place
                    break;
                }
                if t == p2 {
                    // everything left comes from rhs: bulk copy
                    divisions1[..(t + 1) as usize]
                        .copy_from_slice(&divisions2[..(t + 1) as usize]);
                    break;
                }
                let d1 = divisions1[p1 as usize];
                let d2 = divisions2[p2 as usize];
                if d2 <= d1 {
                    p1 -= 1;
                }
                if d1 <= d2 {
                    p2 -= 1;
                }
                divisions1[t as usize] = d1.max(d2);
                t -= 1;
            }
        }
        Ok(())
    }
}

impl PartialEq for SegmentedRegion {
    /// Structural equality over the active axes and the live value grid.
    fn eq(&self, other: &Self) -> bool {
        if self.dimension_count != other.dimension_count || self.vector_len != other.vector_len {
            return false;
        }
        for axis in 0..self.dimension_count {
            if self.divisions(axis) != other.divisions(axis) {
                return false;
            }
        }
        self.values() == other.values()
    }
}

/// Size of the duplicate-collapsed union of two ascending division lists.
fn merged_division_count(a: &[usize], b: &[usize]) -> usize {
    let mut ia = 0usize;
    let mut ib = 0usize;
    let mut count = 0usize;
    while ia < a.len() && ib < b.len() {
        count += 1;
        let da = a[ia];
        let db = b[ib];
        if da <= db {
            ia += 1;
        }
        if db <= da {
            ib += 1;
        }
    }
    count + (a.len() - ia) + (b.len() - ib)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_1d(divisions: &[usize], values: &[f64]) -> SegmentedRegion {
        let mut region = SegmentedRegion::new(1, 1);
        region.ensure_value_capacity(values.len()).unwrap();
        region.set_division_count(0, divisions.len()).unwrap();
        region.divisions_mut(0).copy_from_slice(divisions);
        region.values_mut().copy_from_slice(values);
        region
    }

    #[test]
    fn test_merged_division_count() {
        assert_eq!(merged_division_count(&[2], &[5]), 2);
        assert_eq!(merged_division_count(&[2, 5], &[5]), 2);
        assert_eq!(merged_division_count(&[], &[1, 3]), 2);
        assert_eq!(merged_division_count(&[], &[]), 0);
        assert_eq!(merged_division_count(&[1, 2, 3], &[1, 2, 3]), 3);
    }

    #[test]
    fn test_add_disjoint_divisions() {
        // divisions [2]/values [1,2]  +  divisions [5]/values [10,20]
        // -> divisions [2,5]/values [11,12,22]
        let mut a = region_1d(&[2], &[1.0, 2.0]);
        let b = region_1d(&[5], &[10.0, 20.0]);
        a.add(&b).unwrap();
        assert_eq!(a.divisions(0), &[2, 5]);
        assert_eq!(a.values(), &[11.0, 12.0, 22.0]);
    }

    #[test]
    fn test_add_is_commutative() {
        let mut ab = region_1d(&[2], &[1.0, 2.0]);
        ab.add(&region_1d(&[5], &[10.0, 20.0])).unwrap();
        let mut ba = region_1d(&[5], &[10.0, 20.0]);
        ba.add(&region_1d(&[2], &[1.0, 2.0])).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_add_shared_and_empty_divisions() {
        // shared division collapses
        let mut a = region_1d(&[3], &[1.0, 2.0]);
        a.add(&region_1d(&[3], &[5.0, 7.0])).unwrap();
        assert_eq!(a.divisions(0), &[3]);
        assert_eq!(a.values(), &[6.0, 9.0]);

        // adding a constant region leaves the grid shape alone
        let mut c = region_1d(&[1, 4], &[1.0, 2.0, 3.0]);
        c.add(&region_1d(&[], &[10.0])).unwrap();
        assert_eq!(c.divisions(0), &[1, 4]);
        assert_eq!(c.values(), &[11.0, 12.0, 13.0]);
    }

    #[test]
    fn test_add_2d_regrids_both_axes() {
        // self: axis0 division [1] -> segments {0},{1,2}; axis1 none.
        // rhs: axis0 none; axis1 division [0] -> segments {0},{1}.
        // union grid is 2x2.
        let mut a = SegmentedRegion::new(2, 1);
        a.ensure_value_capacity(4).unwrap();
        a.set_division_count(0, 1).unwrap();
        a.divisions_mut(0)[0] = 1;
        a.values_mut().copy_from_slice(&[1.0, 2.0]);

        let mut b = SegmentedRegion::new(2, 1);
        b.ensure_value_capacity(4).unwrap();
        b.set_division_count(1, 1).unwrap();
        b.divisions_mut(1)[0] = 0;
        b.values_mut().copy_from_slice(&[10.0, 20.0]);

        a.add(&b).unwrap();
        assert_eq!(a.divisions(0), &[1]);
        assert_eq!(a.divisions(1), &[0]);
        // axis 0 fastest: (0,0) (1,0) (0,1) (1,1)
        assert_eq!(a.values(), &[11.0, 12.0, 21.0, 22.0]);
    }

    #[test]
    fn test_add_forward_rewrite_would_clobber() {
        // The merged grid has strictly more cells than either source, and
        // the block written at the top linear index reads from a *lower*
        // linear index of the same buffer. A forward pass would have
        // overwritten values[1] before reading it for cells 1 and 2; the
        // reverse pass must not.
        let mut a = region_1d(&[0], &[-1.0, 4.0]);
        let b = region_1d(&[1, 3], &[1.0, 2.0, 3.0]);
        a.add(&b).unwrap();
        assert_eq!(a.divisions(0), &[0, 1, 3]);
        assert_eq!(a.values(), &[0.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_add_multi_output_blocks() {
        let mut a = SegmentedRegion::new(1, 2);
        a.ensure_value_capacity(4).unwrap();
        a.set_division_count(0, 1).unwrap();
        a.divisions_mut(0)[0] = 2;
        a.values_mut().copy_from_slice(&[1.0, -1.0, 2.0, -2.0]);

        let mut b = SegmentedRegion::new(1, 2);
        b.values_mut().copy_from_slice(&[0.5, 0.25]);

        a.add(&b).unwrap();
        assert_eq!(a.values(), &[1.5, -0.75, 2.5, -1.75]);
    }

    #[test]
    fn test_expand_1d() {
        let mut region = region_1d(&[2], &[7.0, 9.0]);
        region.expand(&[7]).unwrap();
        assert!(region.is_expanded());
        assert_eq!(region.divisions(0), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(region.values(), &[7.0, 7.0, 7.0, 9.0, 9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_expand_2d() {
        // 2x2 coarse grid over a 3x3 tensor: axis0 division [0],
        // axis1 division [1].
        let mut region = SegmentedRegion::new(2, 1);
        region.ensure_value_capacity(9).unwrap();
        region.set_division_count(0, 1).unwrap();
        region.divisions_mut(0)[0] = 0;
        region.set_division_count(1, 1).unwrap();
        region.divisions_mut(1)[0] = 1;
        region.values_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);

        region.expand(&[3, 3]).unwrap();
        assert_eq!(region.divisions(0), &[0, 1]);
        assert_eq!(region.divisions(1), &[0, 1]);
        // rows (axis1): y=0 -> [1,2,2]; y=1 -> [1,2,2]; y=2 -> [3,4,4]
        assert_eq!(
            region.values(),
            &[1.0, 2.0, 2.0, 1.0, 2.0, 2.0, 3.0, 4.0, 4.0]
        );
    }

    #[test]
    fn test_expand_is_idempotent() {
        let mut once = region_1d(&[1], &[1.0, 5.0]);
        once.expand(&[4]).unwrap();
        let mut twice = once.clone();
        twice.expand(&[4]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_expand_from_no_divisions() {
        let mut region = region_1d(&[], &[3.5]);
        region.expand(&[4]).unwrap();
        assert_eq!(region.divisions(0), &[0, 1, 2]);
        assert_eq!(region.values(), &[3.5, 3.5, 3.5, 3.5]);
    }

    #[test]
    fn test_copy_round_trip() {
        let mut source = SegmentedRegion::new(2, 1);
        source.ensure_value_capacity(6).unwrap();
        source.set_division_count(0, 2).unwrap();
        source.divisions_mut(0).copy_from_slice(&[1, 3]);
        source.set_division_count(1, 1).unwrap();
        source.divisions_mut(1)[0] = 0;
        for (i, value) in source.values_mut().iter_mut().enumerate() {
            *value = i as f64;
        }

        let mut target = SegmentedRegion::new(2, 1);
        target.copy_from(&source).unwrap();
        assert_eq!(target, source);
    }

    #[test]
    fn test_reset_and_multiply() {
        let mut region = region_1d(&[2], &[3.0, 6.0]);
        region.multiply(0.5);
        assert_eq!(region.values(), &[1.5, 3.0]);

        region.reset();
        assert_eq!(region.division_count(0), 0);
        assert_eq!(region.values(), &[0.0]);
        assert!(!region.is_expanded());
    }

    #[test]
    fn test_division_capacity_never_shrinks() {
        let mut region = region_1d(&[1, 2, 3], &[0.0; 4]);
        let capacity = region.axes[0].divisions.capacity();
        region.set_division_count(0, 1).unwrap();
        assert_eq!(region.division_count(0), 1);
        assert!(region.axes[0].divisions.capacity() >= capacity);
    }

    #[test]
    fn test_expanded_add_stays_on_full_grid() {
        let mut a = region_1d(&[1], &[1.0, 2.0]);
        a.expand(&[3]).unwrap();
        let mut b = region_1d(&[0], &[10.0, 20.0]);
        b.expand(&[3]).unwrap();
        a.add(&b).unwrap();
        assert_eq!(a.divisions(0), &[0, 1]);
        assert_eq!(a.values(), &[11.0, 21.0, 22.0]);
    }
}
