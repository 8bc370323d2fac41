//! Float trait abstraction for f32/f64 support.
//!
//! All kernels are generic over [`Da3dFloat`], which bundles the numeric
//! bounds the pipeline needs (float arithmetic, FFT compatibility, iterator
//! sums) together with a fast exponential approximation.
//!
//! ## Fast exponential
//!
//! The bilateral masks and the frequency shrinkage evaluate one exponential
//! per pixel per iteration, so `fast_exp` is on the hot path. The f32
//! implementation uses Cephes-style range reduction: n = round(x·log2 e),
//! x = n·ln2 + r with |r| <= ln2/2, exp(r) from a degree-6 polynomial, and
//! exp(x) = 2^n·exp(r) reconstructed through the IEEE-754 exponent field.
//! Relative error stays within a few ulp on the clamped range. The f64
//! implementation delegates to the libm exponential.

use num_traits::{Float, FromPrimitive, NumAssign};
use rustfft::FftNum;
use std::fmt::Debug;
use std::iter::Sum;

/// Trait alias for floating point types supported by the denoiser.
pub trait Da3dFloat:
    Float + FftNum + FromPrimitive + NumAssign + Sum + Debug + Send + Sync + 'static
{
    /// Cast an f64 literal to this type.
    fn cast_f64(val: f64) -> Self;

    /// Cast a usize to this type.
    fn cast_usize(val: usize) -> Self;

    /// Cast an isize to this type.
    fn cast_isize(val: isize) -> Self;

    /// Approximate e^self. Inputs far below the underflow limit saturate
    /// toward zero; callers never pass +inf.
    fn fast_exp(self) -> Self;
}

// Cephes expf polynomial coefficients (1/k! on [-ln2/2, ln2/2]).
const EXP_C2: f32 = 0.5;
const EXP_C3: f32 = 0.166_666_67;
const EXP_C4: f32 = 0.041_666_668;
const EXP_C5: f32 = 0.008_333_334;
const EXP_C6: f32 = 0.001_388_889_1;

// ln2 split into high/low parts so r = x - n·ln2 is computed exactly.
const LN2_HI: f32 = 0.693_145_75;
const LN2_LO: f32 = 1.428_606_8e-6;

// Clamp bounds keeping 2^n representable as a normal f32.
const EXP_LO: f32 = -87.3;
const EXP_HI: f32 = 88.0;

impl Da3dFloat for f32 {
    #[inline]
    fn cast_f64(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn cast_usize(val: usize) -> Self {
        val as f32
    }

    #[inline]
    fn cast_isize(val: isize) -> Self {
        val as f32
    }

    #[inline]
    fn fast_exp(self) -> f32 {
        let x = self.clamp(EXP_LO, EXP_HI);
        let n = (x * std::f32::consts::LOG2_E).round();
        let r = (x - n * LN2_HI) - n * LN2_LO;
        let p = 1.0
            + r * (1.0
                + r * (EXP_C2 + r * (EXP_C3 + r * (EXP_C4 + r * (EXP_C5 + r * EXP_C6)))));
        let pow2n = f32::from_bits((((n as i32) + 127) << 23) as u32);
        p * pow2n
    }
}

impl Da3dFloat for f64 {
    #[inline]
    fn cast_f64(val: f64) -> Self {
        val
    }

    #[inline]
    fn cast_usize(val: usize) -> Self {
        val as f64
    }

    #[inline]
    fn cast_isize(val: isize) -> Self {
        val as f64
    }

    #[inline]
    fn fast_exp(self) -> f64 {
        self.exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_helpers_f32() {
        let val: f32 = Da3dFloat::cast_f64(std::f64::consts::PI);
        assert!((val - std::f32::consts::PI).abs() < 1e-6);
        assert_eq!(<f32 as Da3dFloat>::cast_usize(42), 42.0f32);
        assert_eq!(<f32 as Da3dFloat>::cast_isize(-5), -5.0f32);
    }

    #[test]
    fn test_cast_helpers_f64() {
        let val: f64 = Da3dFloat::cast_f64(std::f64::consts::PI);
        assert!((val - std::f64::consts::PI).abs() < 1e-15);
        assert_eq!(<f64 as Da3dFloat>::cast_usize(42), 42.0f64);
        assert_eq!(<f64 as Da3dFloat>::cast_isize(-5), -5.0f64);
    }

    #[test]
    fn test_fast_exp_identity_at_zero() {
        assert_eq!(0.0f32.fast_exp(), 1.0f32);
        assert_eq!(0.0f64.fast_exp(), 1.0f64);
    }

    #[test]
    fn test_fast_exp_accuracy_f32() {
        // Sweep the range the pipeline actually uses (negated squared
        // distances) and compare against the libm reference.
        let mut x = -40.0f32;
        while x <= 4.0 {
            let approx = x.fast_exp();
            let exact = x.exp();
            let rel = ((approx - exact) / exact).abs();
            assert!(
                rel < 1e-6,
                "fast_exp({}) = {}, expected {}, rel err {}",
                x,
                approx,
                exact,
                rel
            );
            x += 0.0137;
        }
    }

    #[test]
    fn test_fast_exp_saturates_far_negative() {
        // Arguments below the clamp bound must come out vanishingly small,
        // including -inf (produced by the shrinkage when a guide bin is 0).
        assert!((-200.0f32).fast_exp() < 1e-35);
        assert!(f32::NEG_INFINITY.fast_exp() < 1e-35);
        assert_eq!(f64::NEG_INFINITY.fast_exp(), 0.0);
    }

    #[test]
    fn test_fast_exp_monotone_on_mask_range() {
        let mut prev = (-30.0f32).fast_exp();
        let mut x = -29.9f32;
        while x <= 0.0 {
            let cur = x.fast_exp();
            assert!(cur >= prev, "fast_exp not monotone at {}", x);
            prev = cur;
            x += 0.1;
        }
    }
}
