//! # SIMD Memory Copy
//!
//! Bulk byte copy with the widest vector registers the processor offers.
//!
//! ## Tiers
//! - **AVX2**: 32-byte unaligned loads and stores
//! - **SSE2**: 16-byte unaligned loads and stores
//! - **Scalar**: `copy_from_slice`
//!
//! Tails shorter than one vector are finished with a single overlapping
//! store that ends exactly at the last byte, so no tier needs a byte loop.
//!
//! ## Example
//!
//! ```rust
//! use bytelane::io::simd_memory::copy::copy;
//!
//! let src = vec![42u8; 100];
//! let mut dst = vec![0u8; 64];
//! assert_eq!(copy(&mut dst, &src), 64);
//! assert_eq!(dst, src[..64]);
//! ```

use crate::config::SimdConfig;
use crate::simd::{select_path, Operation, SimdPath};
use crate::system::cpu_features::{self, X86Features};
use std::sync::OnceLock;

/// SIMD memory copy dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimdCopy {
    tier: SimdPath,
}

impl SimdCopy {
    /// Copier using every capability of the running processor
    pub fn new() -> Self {
        Self::with_features(cpu_features::x86())
    }

    /// Copier restricted to `features`; flags the processor lacks are ignored.
    pub fn with_features(features: X86Features) -> Self {
        Self {
            tier: select_path(Operation::Copy, features & cpu_features::x86()),
        }
    }

    /// Copier restricted by a [`SimdConfig`]
    pub fn from_config(config: &SimdConfig) -> Self {
        Self::with_features(config.effective_x86())
    }

    /// Get the currently selected SIMD tier
    pub fn tier(&self) -> SimdPath {
        self.tier
    }

    /// Copy `min(dst.len(), src.len())` bytes from the front of `src` to the
    /// front of `dst`, returning the number of bytes copied.
    #[inline]
    pub fn copy(&self, dst: &mut [u8], src: &[u8]) -> usize {
        let len = dst.len().min(src.len());
        let (dst, src) = (&mut dst[..len], &src[..len]);

        match self.tier {
            #[cfg(all(target_arch = "x86_64", feature = "simd"))]
            // SAFETY: the tier is only selected when AVX2 was detected.
            SimdPath::Avx2 => unsafe { x86::copy_avx2(dst, src) },
            #[cfg(all(target_arch = "x86_64", feature = "simd"))]
            // SAFETY: SSE2 is part of the x86_64 baseline.
            SimdPath::Sse2 => unsafe { x86::copy_sse2(dst, src) },
            _ => dst.copy_from_slice(src),
        }
        len
    }
}

impl Default for SimdCopy {
    fn default() -> Self {
        Self::new()
    }
}

/// Global SIMD copy instance for reuse
static GLOBAL_SIMD_COPY: OnceLock<SimdCopy> = OnceLock::new();

/// Get the global SIMD copy instance
pub fn global_simd_copy() -> &'static SimdCopy {
    GLOBAL_SIMD_COPY.get_or_init(|| {
        let simd = SimdCopy::from_config(SimdConfig::global());
        log::debug!("SIMD copy using {:?} tier", simd.tier());
        simd
    })
}

/// Copy the common prefix of `src` into `dst` with the global copier.
///
/// Returns `min(dst.len(), src.len())`.
pub fn copy(dst: &mut [u8], src: &[u8]) -> usize {
    global_simd_copy().copy(dst, src)
}

#[cfg(all(target_arch = "x86_64", feature = "simd"))]
mod x86 {
    use std::arch::x86_64::*;

    /// # Safety
    ///
    /// The CPU must support AVX2. `dst` and `src` must have equal lengths.
    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn copy_avx2(dst: &mut [u8], src: &[u8]) {
        debug_assert_eq!(dst.len(), src.len());
        let len = src.len();
        if len < 32 {
            return unsafe { copy_sse2(dst, src) };
        }

        let (d, s) = (dst.as_mut_ptr(), src.as_ptr());
        let mut offset = 0;
        unsafe {
            while offset + 32 <= len {
                let data = _mm256_loadu_si256(s.add(offset).cast());
                _mm256_storeu_si256(d.add(offset).cast(), data);
                offset += 32;
            }

            // Last 32 bytes, overlapping what was already written
            if offset < len {
                let tail = _mm256_loadu_si256(s.add(len - 32).cast());
                _mm256_storeu_si256(d.add(len - 32).cast(), tail);
            }
        }
    }

    /// # Safety
    ///
    /// `dst` and `src` must have equal lengths.
    #[target_feature(enable = "sse2")]
    pub(super) unsafe fn copy_sse2(dst: &mut [u8], src: &[u8]) {
        debug_assert_eq!(dst.len(), src.len());
        let len = src.len();
        if len < 16 {
            dst.copy_from_slice(src);
            return;
        }

        let (d, s) = (dst.as_mut_ptr(), src.as_ptr());
        let mut offset = 0;
        unsafe {
            while offset + 16 <= len {
                let data = _mm_loadu_si128(s.add(offset).cast());
                _mm_storeu_si128(d.add(offset).cast(), data);
                offset += 16;
            }

            if offset < len {
                let tail = _mm_loadu_si128(s.add(len - 16).cast());
                _mm_storeu_si128(d.add(len - 16).cast(), tail);
            }
        }
    }
}
