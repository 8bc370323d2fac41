//! Per-patch processing pipeline and the single-tile block driver.
//!
//! Each iteration of [`da3d_block`] picks the least-covered patch anchor
//! from the aggregation weight map, detrends the patch with a weighted
//! regression plane, shrinks it in the DFT domain using the guide's
//! spectrum, and accumulates the filtered result with bilateral weights.
//! The loop ends once every anchor has accumulated at least `threshold`
//! aggregation weight.

use ndarray::{s, Array2, Array3};

use crate::dft_patch::DftPatch;
use crate::float_trait::Da3dFloat;
use crate::weight_map::WeightMap;

/// Upper bound on the channel count; entry points reject anything above.
pub(crate) const MAX_CHANNELS: usize = 3;

/// Per-channel slope pair (a_row, a_col) of the regression plane. The
/// plane's value at offset (dr, dc) from the patch center is
/// a_row*dr + a_col*dc.
type RegPlane<F> = [[F; 2]; MAX_CHANNELS];

/// Parameters of a single tile run, pre-resolved by the orchestrator.
///
/// `gamma_r` and `gamma_f` are the concrete per-image values (the 0 = auto
/// sentinel of [`Da3dConfig`](crate::Da3dConfig) is already resolved);
/// both must be positive, as must `sigma`, `sigma_s` and `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct BlockParams<F: Da3dFloat> {
    /// Noise standard deviation of the noisy input.
    pub sigma: F,
    /// Patch radius; the DFT patch side is the next power of two >= 2r+1.
    pub radius: usize,
    /// Spatial scale of the bilateral masks.
    pub sigma_s: F,
    /// Range scale factor of the bilateral masks (multiplies sigma^2).
    pub gamma_r: F,
    /// Strength of the frequency-domain shrinkage.
    pub gamma_f: F,
    /// Aggregation weight every anchor must reach before termination.
    pub threshold: F,
}

/// Bilateral spatial-range mask over `g`, centered at (r, r):
/// k(row, col) = exp(-|g(row,col,.) - g(r,r,.)|^2 / gamma_r_sigma2
///                   - ((row-r)^2 + (col-r)^2) / (2 sigma_s2)).
fn bilateral_weight<F: Da3dFloat>(
    g: &Array3<F>,
    k: &mut Array2<F>,
    r: usize,
    gamma_r_sigma2: F,
    sigma_s2: F,
) {
    let (rows, cols, channels) = g.dim();
    let two = F::cast_f64(2.0);
    for row in 0..rows {
        let dr = F::cast_isize(row as isize - r as isize);
        for col in 0..cols {
            let dc = F::cast_isize(col as isize - r as isize);
            let mut x = F::zero();
            for ch in 0..channels {
                let d = g[[row, col, ch]] - g[[r, r, ch]];
                x += d * d;
            }
            x /= gamma_r_sigma2;
            x += (dr * dr + dc * dc) / (two * sigma_s2);
            k[[row, col]] = (-x).fast_exp();
        }
    }
}

/// Weighted least-squares fit of a plane through the patch center, one
/// slope pair per channel. A singular normal matrix (all mask weight on a
/// single row or column) falls back to the zero plane.
fn compute_regression_plane<F: Da3dFloat>(
    y: &Array3<F>,
    g: &Array3<F>,
    k: &Array2<F>,
    r: usize,
) -> RegPlane<F> {
    let (rows, cols, channels) = y.dim();
    let mut plane = [[F::zero(); 2]; MAX_CHANNELS];

    let mut a = F::zero();
    let mut b = F::zero();
    let mut c = F::zero();
    for row in 0..rows {
        let dr = F::cast_isize(row as isize - r as isize);
        for col in 0..cols {
            let dc = F::cast_isize(col as isize - r as isize);
            let kv = k[[row, col]];
            a += dr * dr * kv;
            b += dr * dc * kv;
            c += dc * dc * kv;
        }
    }
    let det = a * c - b * b;
    if det == F::zero() {
        return plane;
    }

    for (ch, slopes) in plane.iter_mut().enumerate().take(channels) {
        let central = g[[r, r, ch]];
        let mut d = F::zero();
        let mut e = F::zero();
        for row in 0..rows {
            let dr = F::cast_isize(row as isize - r as isize);
            for col in 0..cols {
                let dc = F::cast_isize(col as isize - r as isize);
                let kv = k[[row, col]];
                let dev = y[[row, col, ch]] - central;
                d += dr * dev * kv;
                e += dc * dev * kv;
            }
        }
        // Solves  |a b| |a_row|   |d|
        //         |b c| |a_col| = |e|
        slopes[0] = (c * d - b * e) / det;
        slopes[1] = (a * e - b * d) / det;
    }
    plane
}

/// Subtract the regression plane from every channel of `patch`, in place.
fn subtract_plane<F: Da3dFloat>(patch: &mut Array3<F>, r: usize, plane: &RegPlane<F>) {
    let (rows, cols, channels) = patch.dim();
    for row in 0..rows {
        let dr = F::cast_isize(row as isize - r as isize);
        for col in 0..cols {
            let dc = F::cast_isize(col as isize - r as isize);
            for ch in 0..channels {
                patch[[row, col, ch]] -= plane[ch][0] * dr + plane[ch][1] * dc;
            }
        }
    }
}

/// Fill the DFT patch's space domain with the masked patch
/// k*patch + (1-k)*avg, where avg is the k-weighted channel average.
/// Returns the averages so aggregation can remove them again.
fn modify_patch<F: Da3dFloat>(
    patch: &Array3<F>,
    k: &Array2<F>,
    modified: &mut DftPatch<F>,
) -> [F; MAX_CHANNELS] {
    let (rows, cols, channels) = patch.dim();
    let total_weight: F = k.iter().copied().sum();

    let mut averages = [F::zero(); MAX_CHANNELS];
    let space = modified.space_mut();
    for (ch, average) in averages.iter_mut().enumerate().take(channels) {
        let mut avg = F::zero();
        for row in 0..rows {
            for col in 0..cols {
                avg += k[[row, col]] * patch[[row, col, ch]];
            }
        }
        avg /= total_weight;
        for row in 0..rows {
            for col in 0..cols {
                let kv = k[[row, col]];
                let value = kv * patch[[row, col, ch]] + (F::one() - kv) * avg;
                space[[row, col, ch]].re = value;
                space[[row, col, ch]].im = F::zero();
            }
        }
        *average = avg;
    }
    averages
}

/// Attenuate every non-DC bin of `y_m` by exp(-gamma_f_sigma_f2 / |G|^2),
/// with G the matching guide bin. The DC bin carries the mask average and
/// is preserved unchanged.
fn shrink_frequencies<F: Da3dFloat>(
    y_m: &mut DftPatch<F>,
    g_m: &DftPatch<F>,
    gamma_f_sigma_f2: F,
) {
    let size = y_m.size();
    let channels = y_m.channels();
    let guide_freq = g_m.freq();
    let noisy_freq = y_m.freq_mut();
    for row in 0..size {
        for col in 0..size {
            if row == 0 && col == 0 {
                continue;
            }
            for ch in 0..channels {
                let g2 = guide_freq[[row, col, ch]].norm_sqr();
                let factor = (-gamma_f_sigma_f2 / g2).fast_exp();
                noisy_freq[[row, col, ch]] = noisy_freq[[row, col, ch]] * factor;
            }
        }
    }
}

/// Denoise a single (padded) tile to convergence.
///
/// `noisy` and `guide` must have identical (rows, cols, channels) shape
/// with rows and cols at least the DFT patch side S = next power of two
/// >= 2r+1, and channels <= 3. Returns the unnormalized (output, weight)
/// pair; the caller divides after merging overlapping tiles.
pub fn da3d_block<F: Da3dFloat>(
    noisy: &Array3<F>,
    guide: &Array3<F>,
    params: &BlockParams<F>,
) -> (Array3<F>, Array2<F>) {
    let (rows, cols, channels) = guide.dim();
    let r = params.radius;
    let s = (2 * r + 1).next_power_of_two();

    let sigma2 = params.sigma * params.sigma;
    let gamma_r_sigma2 = params.gamma_r * sigma2;
    let sigma_s2 = params.sigma_s * params.sigma_s;
    // Widened scales for the regression mask: it must see the trend past
    // the range kernel's usual reach.
    let gamma_rr_sigma2 = gamma_r_sigma2 * F::cast_f64(10.0);
    let sigma_sr2 = sigma_s2 * F::cast_f64(2.0);

    let mut y = Array3::<F>::zeros((s, s, channels));
    let mut g = Array3::<F>::zeros((s, s, channels));
    let mut k_reg = Array2::<F>::zeros((s, s));
    let mut k = Array2::<F>::zeros((s, s));
    let mut y_m = DftPatch::<F>::new(s, channels);
    let mut g_m = DftPatch::<F>::new(s, channels);

    let mut agg_weights = WeightMap::<F>::new(rows - s + 1, cols - s + 1);
    let mut output = Array3::<F>::zeros((rows, cols, channels));
    let mut weights = Array2::<F>::zeros((rows, cols));

    while agg_weights.minimum() < params.threshold {
        let (pr, pc) = agg_weights.find_minimum();
        y.assign(&noisy.slice(s![pr..pr + s, pc..pc + s, ..]));
        g.assign(&guide.slice(s![pr..pr + s, pc..pc + s, ..]));

        bilateral_weight(&g, &mut k_reg, r, gamma_rr_sigma2, sigma_sr2);
        let plane = compute_regression_plane(&y, &g, &k_reg, r);
        subtract_plane(&mut y, r, &plane);
        subtract_plane(&mut g, r, &plane);

        bilateral_weight(&g, &mut k, r, gamma_r_sigma2, sigma_s2);
        let yt = modify_patch(&y, &k, &mut y_m);
        modify_patch(&g, &k, &mut g_m);
        y_m.to_freq();
        g_m.to_freq();

        // Frequency-domain noise level: the mask scales the noise energy
        // that survives into the spectrum.
        let mask_energy: F = k.iter().map(|&v| v * v).sum();
        let sigma_f2 = sigma2 * mask_energy;
        shrink_frequencies(&mut y_m, &g_m, params.gamma_f * sigma_f2);
        y_m.to_space();

        // Aggregate: restore the plane within the mask, remove the average
        // mixed in by modify_patch, weight by k; then square the mask so
        // the deposited weights match the contributions.
        for row in 0..s {
            let dr = F::cast_isize(row as isize - r as isize);
            for col in 0..s {
                let dc = F::cast_isize(col as isize - r as isize);
                let kv = k[[row, col]];
                for ch in 0..channels {
                    let restored = y_m.space()[[row, col, ch]].re
                        + (plane[ch][0] * dr + plane[ch][1] * dc) * kv
                        - (F::one() - kv) * yt[ch];
                    output[[pr + row, pc + col, ch]] += restored * kv;
                }
                let kv2 = kv * kv;
                k[[row, col]] = kv2;
                weights[[pr + row, pc + col]] += kv2;
            }
        }
        agg_weights.increase_weights(k.view(), pr as isize - r as isize, pc as isize - r as isize);
    }

    (output, weights)
}
