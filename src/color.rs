//! Orthonormal color decorrelation.
//!
//! RGB is rotated into a luminance/chrominance basis before filtering:
//! Y = (R+G+B)/sqrt(3), U = (R-B)/sqrt(2), V = (R-2G+B)/sqrt(6). The matrix
//! is orthonormal, so Euclidean distances between pixels are preserved and
//! the bilateral range term is unaffected, while correlated luminance energy
//! concentrates in the first channel for the per-channel shrinkage.
//! Single-channel images pass through untouched.

use ndarray::Array3;

use crate::float_trait::Da3dFloat;

/// Rotate RGB into the decorrelated basis, in place. Identity for C != 3.
pub fn forward<F: Da3dFloat>(img: &mut Array3<F>) {
    let (rows, cols, channels) = img.dim();
    if channels != 3 {
        return;
    }
    let inv_sqrt3 = F::one() / F::cast_f64(3.0).sqrt();
    let inv_sqrt2 = F::one() / F::cast_f64(2.0).sqrt();
    let inv_sqrt6 = F::one() / F::cast_f64(6.0).sqrt();
    let two = F::cast_f64(2.0);
    for row in 0..rows {
        for col in 0..cols {
            let r = img[[row, col, 0]];
            let g = img[[row, col, 1]];
            let b = img[[row, col, 2]];
            img[[row, col, 0]] = (r + g + b) * inv_sqrt3;
            img[[row, col, 1]] = (r - b) * inv_sqrt2;
            img[[row, col, 2]] = (r - two * g + b) * inv_sqrt6;
        }
    }
}

/// Rotate back to RGB, in place. Identity for C != 3.
pub fn inverse<F: Da3dFloat>(img: &mut Array3<F>) {
    let (rows, cols, channels) = img.dim();
    if channels != 3 {
        return;
    }
    let sqrt2 = F::cast_f64(2.0).sqrt();
    let sqrt3 = F::cast_f64(3.0).sqrt();
    let inv_sqrt3 = F::one() / sqrt3;
    let inv_sqrt6 = F::one() / F::cast_f64(6.0).sqrt();
    for row in 0..rows {
        for col in 0..cols {
            let y = img[[row, col, 0]];
            let u = img[[row, col, 1]];
            let v = img[[row, col, 2]];
            img[[row, col, 0]] = (sqrt2 * y + sqrt3 * u + v) * inv_sqrt6;
            img[[row, col, 1]] = (y - sqrt2 * v) * inv_sqrt3;
            img[[row, col, 2]] = (sqrt2 * y - sqrt3 * u + v) * inv_sqrt6;
        }
    }
}
