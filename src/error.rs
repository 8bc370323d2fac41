//! Error types for the denoiser entry points.

use thiserror::Error;

/// Precondition violations reported by [`denoise`](crate::denoise) and
/// [`Da3dConfig::validate`](crate::Da3dConfig::validate).
///
/// The processing core itself has no runtime failure modes; every variant
/// here is caught before any tile is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Da3dError {
    #[error("noisy image shape {noisy:?} does not match guide shape {guide:?}")]
    ShapeMismatch {
        noisy: (usize, usize, usize),
        guide: (usize, usize, usize),
    },

    #[error("unsupported channel count {0}, expected 1 or 3")]
    UnsupportedChannels(usize),

    #[error("{name} must be positive, got {value}")]
    NonPositiveParameter { name: &'static str, value: f64 },

    #[error("{name} must be non-negative, got {value}")]
    NegativeParameter { name: &'static str, value: f64 },

    #[error("input image has no pixels")]
    EmptyImage,
}
