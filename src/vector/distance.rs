//! Squared Euclidean distance kernel.
//!
//! Three implementations share one contract, `sum((a[i] - b[i])^2)`:
//! - [`distance_squared_scalar`]: reference path, any length, any alignment.
//! - [`distance_squared_lanes`]: portable 8-lane accumulation that the
//!   compiler auto-vectorizes; used where AVX2 is unavailable.
//! - an AVX2 + FMA path selected at runtime on x86_64.
//!
//! The vectorized paths process full 8-float lanes and hand the remainder to
//! the scalar loop. Their results differ from the scalar path only by
//! summation order. Elements are never truncated before squaring.

use crate::vector::types::SIMD_LANES;

/// Computes the squared Euclidean distance between two vectors.
///
/// Dispatches to the fastest kernel the CPU supports. Vectors shorter than
/// one lane skip straight to the scalar loop.
///
/// # Panics
/// Debug builds panic if the slices differ in length.
#[inline]
pub fn distance_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    if a.len() < SIMD_LANES {
        return distance_squared_scalar(a, b);
    }

    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        {
            // SAFETY: the required CPU features were detected above.
            return unsafe { x86::distance_squared_avx2(a, b) };
        }
    }

    distance_squared_lanes(a, b)
}

/// Reference implementation: one accumulator, strict left-to-right order.
#[inline]
pub fn distance_squared_scalar(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Portable lane-parallel implementation.
///
/// Keeps eight independent partial sums, one per lane, so the loop body has
/// no cross-iteration dependency and maps onto a single 256-bit register.
#[inline]
pub fn distance_squared_lanes(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let mut acc = [0.0f32; SIMD_LANES];
    let a_chunks = a.chunks_exact(SIMD_LANES);
    let b_chunks = b.chunks_exact(SIMD_LANES);
    let tail = distance_squared_scalar(a_chunks.remainder(), b_chunks.remainder());

    for (ca, cb) in a_chunks.zip(b_chunks) {
        for lane in 0..SIMD_LANES {
            let d = ca[lane] - cb[lane];
            acc[lane] += d * d;
        }
    }

    acc.iter().sum::<f32>() + tail
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::distance_squared_scalar;
    use crate::vector::types::SIMD_LANES;
    use std::arch::x86_64::*;

    /// AVX2 kernel: fused multiply-add over 8-float lanes.
    ///
    /// Uses unaligned loads so that rows of a store whose dimension is not a
    /// multiple of 8 (and therefore not 32-byte aligned) are still accepted.
    ///
    /// # Safety
    /// The caller must ensure the CPU supports `avx2` and `fma`.
    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn distance_squared_avx2(a: &[f32], b: &[f32]) -> f32 {
        let n = a.len().min(b.len());
        let simd_end = n - n % SIMD_LANES;

        let mut lanes = [0.0f32; SIMD_LANES];
        // SAFETY: every load reads SIMD_LANES floats starting at i < simd_end,
        // which stays inside both slices; the store targets a local array.
        unsafe {
            let mut sum = _mm256_setzero_ps();
            let mut i = 0;
            while i < simd_end {
                let va = _mm256_loadu_ps(a.as_ptr().add(i));
                let vb = _mm256_loadu_ps(b.as_ptr().add(i));
                let diff = _mm256_sub_ps(va, vb);
                sum = _mm256_fmadd_ps(diff, diff, sum);
                i += SIMD_LANES;
            }
            _mm256_storeu_ps(lanes.as_mut_ptr(), sum);
        }

        lanes.iter().sum::<f32>() + distance_squared_scalar(&a[simd_end..n], &b[simd_end..n])
    }
}
