//! Square complex patch with per-channel forward/inverse 2-D DFT.
//!
//! A [`DftPatch`] owns a space-domain buffer, a frequency-domain buffer and
//! the pre-computed FFT plans for its size; one instance per tile is reused
//! across all iterations, so plan setup is paid once. After [`to_freq`]
//! the frequency view is current and the space view is stale, and vice
//! versa after [`to_space`].
//!
//! [`to_freq`]: DftPatch::to_freq
//! [`to_space`]: DftPatch::to_space

use ndarray::Array3;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::float_trait::Da3dFloat;

/// S x S x C complex patch with dual space/frequency views.
pub struct DftPatch<F: Da3dFloat> {
    size: usize,
    channels: usize,
    space: Array3<Complex<F>>,
    freq: Array3<Complex<F>>,
    fwd: Arc<dyn Fft<F>>,
    inv: Arc<dyn Fft<F>>,
}

impl<F: Da3dFloat> DftPatch<F> {
    /// Allocate a zeroed patch of side `size` with `channels` channels and
    /// plan its transforms.
    pub fn new(size: usize, channels: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fwd = planner.plan_fft_forward(size);
        let inv = planner.plan_fft_inverse(size);
        Self {
            size,
            channels,
            space: Array3::zeros((size, size, channels)),
            freq: Array3::zeros((size, size, channels)),
            fwd,
            inv,
        }
    }

    /// Patch side length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Space-domain buffer, indexed (row, col, channel).
    pub fn space(&self) -> &Array3<Complex<F>> {
        &self.space
    }

    /// Mutable space-domain buffer.
    pub fn space_mut(&mut self) -> &mut Array3<Complex<F>> {
        &mut self.space
    }

    /// Frequency-domain buffer, indexed (row, col, channel). Bin (0, 0) is
    /// the DC component.
    pub fn freq(&self) -> &Array3<Complex<F>> {
        &self.freq
    }

    /// Mutable frequency-domain buffer.
    pub fn freq_mut(&mut self) -> &mut Array3<Complex<F>> {
        &mut self.freq
    }

    /// Forward 2-D DFT of every channel: space -> freq, unnormalized.
    /// Rows are transformed first, then columns.
    pub fn to_freq(&mut self) {
        let s = self.size;
        let mut line = vec![Complex::new(F::zero(), F::zero()); s];
        for ch in 0..self.channels {
            for row in 0..s {
                for col in 0..s {
                    line[col] = self.space[[row, col, ch]];
                }
                self.fwd.process(&mut line);
                for col in 0..s {
                    self.freq[[row, col, ch]] = line[col];
                }
            }
            for col in 0..s {
                for row in 0..s {
                    line[row] = self.freq[[row, col, ch]];
                }
                self.fwd.process(&mut line);
                for row in 0..s {
                    self.freq[[row, col, ch]] = line[row];
                }
            }
        }
    }

    /// Inverse 2-D DFT of every channel: freq -> space, normalized by
    /// 1/S^2 so that `to_freq` followed by `to_space` is the identity.
    pub fn to_space(&mut self) {
        let s = self.size;
        let norm = F::one() / F::cast_usize(s * s);
        let mut line = vec![Complex::new(F::zero(), F::zero()); s];
        for ch in 0..self.channels {
            for col in 0..s {
                for row in 0..s {
                    line[row] = self.freq[[row, col, ch]];
                }
                self.inv.process(&mut line);
                for row in 0..s {
                    self.space[[row, col, ch]] = line[row];
                }
            }
            for row in 0..s {
                for col in 0..s {
                    line[col] = self.space[[row, col, ch]];
                }
                self.inv.process(&mut line);
                for col in 0..s {
                    self.space[[row, col, ch]] = line[col] * norm;
                }
            }
        }
    }
}
