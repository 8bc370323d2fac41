//! Top-level denoising entry point.
//!
//! [`denoise`] validates its inputs, rotates color images into the
//! decorrelated basis, splits both images into symmetric-padded tiles (one
//! per worker), runs the block driver on every tile in parallel, merges the
//! partial results by weight normalization and rotates back.

use ndarray::{Array3, ArrayView3};
use rayon::prelude::*;

use crate::color;
use crate::error::Da3dError;
use crate::float_trait::Da3dFloat;
use crate::pipeline::{da3d_block, BlockParams, MAX_CHANNELS};
use crate::tiling::{compute_tiling, merge_tiles, split_tiles};

// =============================================================================
// Constants
// =============================================================================

/// Default patch radius; the DFT patch side becomes 32.
const DEFAULT_RADIUS: usize = 8;

/// Default spatial scale of the bilateral masks.
const DEFAULT_SIGMA_S: f64 = 4.0;

/// Per-channel range scale applied when `gamma_r` is left at auto.
const GAMMA_R_PER_CHANNEL: f64 = 0.4;

/// Per-channel shrinkage strength applied when `gamma_f` is left at auto.
const GAMMA_F_PER_CHANNEL: f64 = 0.4;

/// Default aggregation weight every anchor must reach.
const DEFAULT_THRESHOLD: f64 = 1.0;

// =============================================================================
// Configuration
// =============================================================================

/// Tuning parameters for [`denoise`].
///
/// `Default::default()` gives the recommended settings; `sigma` is not part
/// of the configuration because it is a property of the input, not of the
/// algorithm.
#[derive(Debug, Clone, Copy)]
pub struct Da3dConfig<F: Da3dFloat> {
    /// Worker (and tile) count. 0 = use all available cores.
    pub threads: usize,
    /// Patch radius. Default: 8.
    pub radius: usize,
    /// Spatial scale of the bilateral masks. Default: 4.0.
    pub sigma_s: F,
    /// Range scale of the bilateral masks. 0.0 = auto (0.4 per channel).
    pub gamma_r: F,
    /// Frequency shrinkage strength. 0.0 = auto (0.4 per channel).
    pub gamma_f: F,
    /// Termination threshold on the aggregation weight map. Default: 1.0.
    pub threshold: F,
}

impl<F: Da3dFloat> Default for Da3dConfig<F> {
    fn default() -> Self {
        Self {
            threads: 0,
            radius: DEFAULT_RADIUS,
            sigma_s: F::cast_f64(DEFAULT_SIGMA_S),
            gamma_r: F::zero(),
            gamma_f: F::zero(),
            threshold: F::cast_f64(DEFAULT_THRESHOLD),
        }
    }
}

impl<F: Da3dFloat> Da3dConfig<F> {
    /// Create a configuration with the recommended defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the parameters without touching any image.
    pub fn validate(&self) -> Result<(), Da3dError> {
        if self.radius == 0 {
            return Err(Da3dError::NonPositiveParameter {
                name: "radius",
                value: 0.0,
            });
        }
        if self.sigma_s <= F::zero() {
            return Err(Da3dError::NonPositiveParameter {
                name: "sigma_s",
                value: to_f64(self.sigma_s),
            });
        }
        if self.gamma_r < F::zero() {
            return Err(Da3dError::NegativeParameter {
                name: "gamma_r",
                value: to_f64(self.gamma_r),
            });
        }
        if self.gamma_f < F::zero() {
            return Err(Da3dError::NegativeParameter {
                name: "gamma_f",
                value: to_f64(self.gamma_f),
            });
        }
        if self.threshold <= F::zero() {
            return Err(Da3dError::NonPositiveParameter {
                name: "threshold",
                value: to_f64(self.threshold),
            });
        }
        Ok(())
    }
}

fn to_f64<F: Da3dFloat>(value: F) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

// =============================================================================
// Entry Point
// =============================================================================

/// Refine `noisy` using the pre-denoised `guide` and noise level `sigma`.
///
/// Both images must share the same (rows, cols, channels) shape with 1 or 3
/// channels; `sigma` must be positive. Returns the refined estimate with the
/// same shape.
///
/// # Example
///
/// ```
/// use da3d::{denoise, Da3dConfig};
/// use ndarray::Array3;
///
/// let noisy = Array3::<f32>::from_elem((48, 48, 1), 0.5);
/// let guide = noisy.clone();
/// let config = Da3dConfig { threads: 1, radius: 4, ..Da3dConfig::default() };
/// let output = denoise(noisy.view(), guide.view(), 0.1, &config).unwrap();
/// assert_eq!(output.dim(), (48, 48, 1));
/// ```
pub fn denoise<F: Da3dFloat>(
    noisy: ArrayView3<F>,
    guide: ArrayView3<F>,
    sigma: F,
    config: &Da3dConfig<F>,
) -> Result<Array3<F>, Da3dError> {
    config.validate()?;
    if noisy.dim() != guide.dim() {
        return Err(Da3dError::ShapeMismatch {
            noisy: noisy.dim(),
            guide: guide.dim(),
        });
    }
    let (rows, cols, channels) = guide.dim();
    if rows == 0 || cols == 0 {
        return Err(Da3dError::EmptyImage);
    }
    if channels != 1 && channels != MAX_CHANNELS {
        return Err(Da3dError::UnsupportedChannels(channels));
    }
    if sigma <= F::zero() {
        return Err(Da3dError::NonPositiveParameter {
            name: "sigma",
            value: to_f64(sigma),
        });
    }

    let radius = config.radius;
    let patch_size = (2 * radius + 1).next_power_of_two();
    let channel_count = F::cast_usize(channels);
    let gamma_r = if config.gamma_r > F::zero() {
        config.gamma_r
    } else {
        F::cast_f64(GAMMA_R_PER_CHANNEL) * channel_count
    };
    let gamma_f = if config.gamma_f > F::zero() {
        config.gamma_f
    } else {
        F::cast_f64(GAMMA_F_PER_CHANNEL) * channel_count
    };

    // One tile per worker; clamp so every tile keeps at least one full
    // row and column of its own.
    let threads = if config.threads == 0 {
        rayon::current_num_threads()
    } else {
        config.threads
    };
    let tiles = threads.min(rows).min(cols).max(1);
    let tiling = compute_tiling(rows, cols, tiles);
    tracing::debug!(
        rows,
        cols,
        channels,
        patch_size,
        tiles_rows = tiling.0,
        tiles_cols = tiling.1,
        "starting denoiser"
    );

    let mut noisy_t = noisy.to_owned();
    let mut guide_t = guide.to_owned();
    color::forward(&mut noisy_t);
    color::forward(&mut guide_t);

    let pad_before = radius;
    let pad_after = patch_size - radius - 1;
    let noisy_tiles = split_tiles(noisy_t.view(), pad_before, pad_after, tiling);
    let guide_tiles = split_tiles(guide_t.view(), pad_before, pad_after, tiling);

    let params = BlockParams {
        sigma,
        radius,
        sigma_s: config.sigma_s,
        gamma_r,
        gamma_f,
        threshold: config.threshold,
    };
    let result_tiles: Vec<_> = noisy_tiles
        .into_par_iter()
        .zip(guide_tiles.into_par_iter())
        .map(|(noisy_tile, guide_tile)| da3d_block(&noisy_tile, &guide_tile, &params))
        .collect();

    let mut output = merge_tiles(&result_tiles, (rows, cols), pad_before, pad_after, tiling);
    color::inverse(&mut output);
    tracing::debug!("denoiser finished");
    Ok(output)
}
