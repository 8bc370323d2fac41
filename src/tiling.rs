//! Tile grid selection, symmetric-padded splitting and weighted merging.
//!
//! The image is divided into a near-square grid of non-overlapping cells,
//! one per worker. Each cell is expanded by the patch padding with the
//! symmetric boundary convention, processed independently, and the padded
//! partial results are summed back and normalized by their accumulated
//! weights. The merge is a plain sum-then-divide, so the composition does
//! not depend on tile ordering.

use ndarray::{Array2, Array3, ArrayView3};

use crate::float_trait::Da3dFloat;

/// Fold a possibly out-of-range coordinate into [0, size) with the
/// symmetric boundary convention: -1 -> 0, -2 -> 1, ..., size -> size-1,
/// wrapping modulo 2*size for far-out positions.
pub fn symmetric_coordinate(pos: isize, size: usize) -> usize {
    let size = size as isize;
    let mut pos = pos;
    if pos < 0 {
        pos = -pos - 1;
    }
    if pos >= 2 * size {
        pos %= 2 * size;
    }
    if pos >= size {
        pos = 2 * size - 1 - pos;
    }
    pos as usize
}

/// Choose a (tile_rows, tile_cols) grid with tile_rows * tile_cols ==
/// `tiles`, approximately proportional to `rows` : `cols`. The two integer
/// divisors of `tiles` bracketing sqrt(tiles * rows / cols) are tried and
/// the one with the smaller aspect mismatch wins.
pub fn compute_tiling(rows: usize, cols: usize, tiles: usize) -> (usize, usize) {
    let best_r = (tiles as f64 * rows as f64 / cols as f64).sqrt();
    let mut r_low = best_r as usize;
    let mut r_up = r_low + 1;
    if r_low < 1 {
        return (1, tiles);
    }
    if r_up > tiles {
        return (tiles, 1);
    }
    while tiles % r_low != 0 {
        r_low -= 1;
    }
    while tiles % r_up != 0 {
        r_up += 1;
    }
    if r_up * r_low * cols > tiles * rows {
        (r_low, tiles / r_low)
    } else {
        (r_up, tiles / r_up)
    }
}

/// Split `src` into `tiling.0 * tiling.1` tiles, each expanded by
/// `pad_before` on top/left and `pad_after` on bottom/right with symmetric
/// reflection. Cell boundaries are integer-proportional, so cells differ in
/// size by at most one row/column.
pub fn split_tiles<F: Da3dFloat>(
    src: ArrayView3<F>,
    pad_before: usize,
    pad_after: usize,
    tiling: (usize, usize),
) -> Vec<Array3<F>> {
    let (rows, cols, channels) = src.dim();
    let mut result = Vec::with_capacity(tiling.0 * tiling.1);
    for tr in 0..tiling.0 {
        let rstart = (rows * tr / tiling.0) as isize - pad_before as isize;
        let rend = (rows * (tr + 1) / tiling.0 + pad_after) as isize;
        for tc in 0..tiling.1 {
            let cstart = (cols * tc / tiling.1) as isize - pad_before as isize;
            let cend = (cols * (tc + 1) / tiling.1 + pad_after) as isize;
            let mut tile =
                Array3::zeros(((rend - rstart) as usize, (cend - cstart) as usize, channels));
            for row in rstart..rend {
                let src_row = symmetric_coordinate(row, rows);
                for col in cstart..cend {
                    let src_col = symmetric_coordinate(col, cols);
                    for ch in 0..channels {
                        tile[[(row - rstart) as usize, (col - cstart) as usize, ch]] =
                            src[[src_row, src_col, ch]];
                    }
                }
            }
            result.push(tile);
        }
    }
    result
}

/// Merge partial (output, weight) tiles back into a `shape`-sized image.
/// Each tile's padded region, clipped to the image, is summed into a
/// full-size accumulator; the sum is normalized per pixel by the summed
/// weights. Pixels with zero total weight are out of contract — the
/// processing loop's termination threshold guarantees coverage.
pub fn merge_tiles<F: Da3dFloat>(
    tiles: &[(Array3<F>, Array2<F>)],
    shape: (usize, usize),
    pad_before: usize,
    pad_after: usize,
    tiling: (usize, usize),
) -> Array3<F> {
    let channels = tiles[0].0.dim().2;
    let mut result = Array3::<F>::zeros((shape.0, shape.1, channels));
    let mut weights = Array2::<F>::zeros((shape.0, shape.1));
    for tr in 0..tiling.0 {
        let rstart = (shape.0 * tr / tiling.0) as isize - pad_before as isize;
        let rend = shape.0 * (tr + 1) / tiling.0 + pad_after;
        for tc in 0..tiling.1 {
            let cstart = (shape.1 * tc / tiling.1) as isize - pad_before as isize;
            let cend = shape.1 * (tc + 1) / tiling.1 + pad_after;
            let (tile_out, tile_wgt) = &tiles[tr * tiling.1 + tc];
            for row in rstart.max(0) as usize..rend.min(shape.0) {
                let tile_row = (row as isize - rstart) as usize;
                for col in cstart.max(0) as usize..cend.min(shape.1) {
                    let tile_col = (col as isize - cstart) as usize;
                    for ch in 0..channels {
                        result[[row, col, ch]] += tile_out[[tile_row, tile_col, ch]];
                    }
                    weights[[row, col]] += tile_wgt[[tile_row, tile_col]];
                }
            }
        }
    }
    for row in 0..shape.0 {
        for col in 0..shape.1 {
            let w = weights[[row, col]];
            for ch in 0..channels {
                result[[row, col, ch]] /= w;
            }
        }
    }
    result
}
