//! DA3D (Data-Adaptive Dual-Domain) image denoising.
//!
//! Pure Rust implementation of the DA3D second-step denoiser. Given a noisy
//! image and a coarsely pre-denoised *guide* of the same shape, together
//! with the noise standard deviation, it produces a refined estimate by
//! processing overlapping square patches chosen adaptively: an aggregation
//! weight map concentrates work where little has been done so far, and each
//! patch goes through bilateral masking, weighted planar regression and a
//! guided shrinkage in the DFT domain.
//!
//! Images are `ndarray::Array3` values of shape (rows, cols, channels) with
//! 1 (gray) or 3 (RGB) channels; color inputs are processed in a
//! decorrelated luminance/chrominance basis. Tiles are dispatched to a
//! rayon worker pool, one tile per thread.
//!
//! ## f32/f64 Support
//!
//! All public functions are generic over the [`Da3dFloat`] trait, so both
//! f32 and f64 images are supported.

pub mod color;
pub mod dft_patch;
pub mod error;
pub mod float_trait;
pub mod orchestration;
pub mod pipeline;
pub mod tiling;
pub mod weight_map;

// Re-export commonly used types at the crate root
pub use dft_patch::DftPatch;
pub use error::Da3dError;
pub use float_trait::Da3dFloat;
pub use orchestration::{denoise, Da3dConfig};
pub use pipeline::{da3d_block, BlockParams};
pub use weight_map::WeightMap;
