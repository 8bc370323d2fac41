//! Aggregation weight map driving adaptive patch selection.
//!
//! The map records, for every valid patch anchor, how much aggregation
//! weight previous iterations have already deposited there. The next anchor
//! is always the argmin, so processing concentrates where little work has
//! been done; the loop ends once the minimum clears the caller's threshold.
//!
//! A full argmin scan is O(grid), but between two scans the map only ever
//! receives additive patch-sized updates. The cached (min, argmin) pair
//! therefore stays valid until an update touches the argmin cell itself;
//! only then is the `stale` flag raised and the next query pays for a
//! rescan. Ties are broken by row-major scan order, which makes the
//! iteration order deterministic.

use ndarray::{Array2, ArrayView2};

use crate::float_trait::Da3dFloat;

/// 2-D grid of non-negative aggregation weights with cached argmin.
#[derive(Debug, Clone)]
pub struct WeightMap<F: Da3dFloat> {
    grid: Array2<F>,
    cached_min: F,
    cached_pos: (usize, usize),
    stale: bool,
}

impl<F: Da3dFloat> WeightMap<F> {
    /// Create a zero-initialized map covering `rows` x `cols` anchors.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            grid: Array2::zeros((rows, cols)),
            cached_min: F::zero(),
            cached_pos: (0, 0),
            stale: false,
        }
    }

    /// Current minimum weight over all anchors.
    pub fn minimum(&mut self) -> F {
        if self.stale {
            self.rescan();
        }
        self.cached_min
    }

    /// Coordinate of the current minimum (row, col).
    pub fn find_minimum(&mut self) -> (usize, usize) {
        if self.stale {
            self.rescan();
        }
        self.cached_pos
    }

    /// Add the patch `k` to the grid with its (0, 0) element landing at
    /// (`row0`, `col0`); parts falling outside the grid are dropped. The
    /// offsets may be negative.
    pub fn increase_weights(&mut self, k: ArrayView2<F>, row0: isize, col0: isize) {
        let (rows, cols) = self.grid.dim();
        let (k_rows, k_cols) = k.dim();
        for dr in 0..k_rows {
            let row = row0 + dr as isize;
            if row < 0 || row >= rows as isize {
                continue;
            }
            for dc in 0..k_cols {
                let col = col0 + dc as isize;
                if col < 0 || col >= cols as isize {
                    continue;
                }
                let pos = (row as usize, col as usize);
                self.grid[pos] += k[[dr, dc]];
                if pos == self.cached_pos {
                    self.stale = true;
                }
            }
        }
    }

    fn rescan(&mut self) {
        // Strict comparison keeps the first occurrence in row-major order.
        let mut min_val = self.grid[[0, 0]];
        let mut min_pos = (0, 0);
        for ((row, col), &val) in self.grid.indexed_iter() {
            if val < min_val {
                min_val = val;
                min_pos = (row, col);
            }
        }
        self.cached_min = min_val;
        self.cached_pos = min_pos;
        self.stale = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_fresh_map_minimum_is_zero_at_origin() {
        let mut map = WeightMap::<f32>::new(5, 7);
        assert_eq!(map.minimum(), 0.0);
        assert_eq!(map.find_minimum(), (0, 0));
    }

    #[test]
    fn test_update_away_from_argmin_keeps_cache() {
        let mut map = WeightMap::<f32>::new(5, 5);
        let patch = Array2::from_elem((2, 2), 1.0f32);
        map.increase_weights(patch.view(), 3, 3);
        // (0, 0) untouched, still the minimum.
        assert_eq!(map.minimum(), 0.0);
        assert_eq!(map.find_minimum(), (0, 0));
    }

    #[test]
    fn test_update_at_argmin_forces_rescan() {
        let mut map = WeightMap::<f32>::new(3, 3);
        let patch = Array2::from_elem((1, 1), 2.0f32);
        map.increase_weights(patch.view(), 0, 0);
        // Every other cell is still zero; the rescan must find one of them.
        assert_eq!(map.minimum(), 0.0);
        assert_ne!(map.find_minimum(), (0, 0));
    }

    #[test]
    fn test_ties_break_row_major() {
        let mut map = WeightMap::<f32>::new(3, 3);
        let cell = Array2::from_elem((1, 1), 1.0f32);
        map.increase_weights(cell.view(), 0, 0);
        // All remaining zeros tie; the first in row-major order is (0, 1).
        assert_eq!(map.find_minimum(), (0, 1));
    }

    #[test]
    fn test_negative_offsets_are_clipped() {
        let mut map = WeightMap::<f32>::new(4, 4);
        let patch = Array2::from_elem((3, 3), 1.0f32);
        map.increase_weights(patch.view(), -2, -2);
        // Only the patch corner at (2, 2) lands inside, onto grid cell (0, 0).
        assert_eq!(map.minimum(), 0.0);
        assert_eq!(map.find_minimum(), (0, 1));
    }

    #[test]
    fn test_minimum_is_monotone_under_updates() {
        let mut map = WeightMap::<f32>::new(6, 6);
        let patch = Array2::from_shape_fn((3, 3), |(r, c)| 0.1 + 0.05 * (r * 3 + c) as f32);
        let mut prev = map.minimum();
        for step in 0..40 {
            let (pr, pc) = map.find_minimum();
            map.increase_weights(patch.view(), pr as isize - 1, pc as isize - 1);
            let cur = map.minimum();
            assert!(cur >= prev, "minimum decreased at step {}", step);
            prev = cur;
        }
        assert!(prev > 0.0, "repeated updates never lifted the minimum");
    }

    #[test]
    fn test_reaches_threshold_in_finite_steps() {
        let mut map = WeightMap::<f32>::new(8, 8);
        // Center weight 1 mimics the squared bilateral mask of the pipeline.
        let patch = Array2::from_shape_fn((5, 5), |(r, c)| {
            let dr = r as f32 - 2.0;
            let dc = c as f32 - 2.0;
            (-(dr * dr + dc * dc) / 2.0).exp()
        });
        let mut steps = 0;
        while map.minimum() < 1.0 {
            let (pr, pc) = map.find_minimum();
            map.increase_weights(patch.view(), pr as isize - 2, pc as isize - 2);
            steps += 1;
            assert!(steps <= 64 * 4, "threshold not reached in a bounded number of steps");
        }
    }
}
