//! # SIMD UTF-8 Validation
//!
//! Classifies a byte buffer as ASCII, UTF-8, both or neither.
//!
//! ## Architecture
//! - **AVX2**: ASCII fast path over 32-byte chunks
//! - **SSE2**: ASCII fast path over 16-byte chunks
//! - **Scalar**: `<[u8]>::is_ascii` followed by `std::str::from_utf8`
//!
//! Once a chunk with a high bit set is found, the remainder is handed to the
//! standard library validator. Everything before that chunk is ASCII, so the
//! chunk starts on a character boundary.
//!
//! ## Example
//!
//! ```
//! use bytelane::io::simd_validation::utf8::{self, Validation};
//!
//! assert_eq!(utf8::validate(b"plain"), Validation::ASCII | Validation::UTF8);
//! assert!(utf8::valid("grüße".as_bytes()));
//! assert!(!utf8::valid_ascii("grüße".as_bytes()));
//! assert!(!utf8::valid(&[0xFF, 0xFE]));
//! ```

use crate::config::SimdConfig;
use crate::simd::{select_path, Operation, SimdPath};
use crate::system::cpu_features::{self, X86Features};
use bitflags::bitflags;
use std::sync::OnceLock;

bitflags! {
    /// Encodings a buffer is valid in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Validation: u8 {
        /// Every byte is below 0x80
        const ASCII = 1 << 0;
        /// Well-formed UTF-8
        const UTF8 = 1 << 1;
    }
}

impl Validation {
    /// Whether the buffer is well-formed UTF-8
    #[inline]
    pub fn is_utf8(self) -> bool {
        self.contains(Validation::UTF8)
    }

    /// Whether the buffer is pure ASCII
    #[inline]
    pub fn is_ascii(self) -> bool {
        self.contains(Validation::ASCII)
    }
}

/// UTF-8 validator bound to one SIMD tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf8Validator {
    tier: SimdPath,
}

impl Utf8Validator {
    /// Validator using every capability of the running processor
    pub fn new() -> Self {
        Self::with_features(cpu_features::x86())
    }

    /// Validator restricted to `features`; flags the processor lacks are ignored.
    pub fn with_features(features: X86Features) -> Self {
        Self {
            tier: select_path(Operation::Utf8Validation, features & cpu_features::x86()),
        }
    }

    /// Validator restricted by a [`SimdConfig`]
    pub fn from_config(config: &SimdConfig) -> Self {
        Self::with_features(config.effective_x86())
    }

    /// Get currently selected SIMD tier
    pub fn tier(&self) -> SimdPath {
        self.tier
    }

    /// Classify `data`.
    pub fn validate(&self, data: &[u8]) -> Validation {
        let ascii_prefix = match self.tier {
            #[cfg(all(target_arch = "x86_64", feature = "simd"))]
            // SAFETY: the tier is only selected when AVX2 was detected.
            SimdPath::Avx2 => unsafe { x86::ascii_prefix_avx2(data) },
            #[cfg(all(target_arch = "x86_64", feature = "simd"))]
            // SAFETY: SSE2 is part of the x86_64 baseline.
            SimdPath::Sse2 => unsafe { x86::ascii_prefix_sse2(data) },
            _ => 0,
        };

        classify(&data[ascii_prefix..])
    }
}

impl Default for Utf8Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a buffer with no vector help.
fn classify(rest: &[u8]) -> Validation {
    if rest.is_ascii() {
        Validation::ASCII | Validation::UTF8
    } else if std::str::from_utf8(rest).is_ok() {
        Validation::UTF8
    } else {
        Validation::empty()
    }
}

static GLOBAL_VALIDATOR: OnceLock<Utf8Validator> = OnceLock::new();

/// Get global UTF-8 validator instance
pub fn global_validator() -> &'static Utf8Validator {
    GLOBAL_VALIDATOR.get_or_init(|| {
        let validator = Utf8Validator::from_config(SimdConfig::global());
        log::debug!("UTF-8 validator using {:?} tier", validator.tier());
        validator
    })
}

/// Classify `data` as ASCII and/or UTF-8.
///
/// Empty input is both.
pub fn validate(data: &[u8]) -> Validation {
    global_validator().validate(data)
}

/// Whether `data` is well-formed UTF-8.
pub fn valid(data: &[u8]) -> bool {
    validate(data).is_utf8()
}

/// Whether every byte of `data` is ASCII.
pub fn valid_ascii(data: &[u8]) -> bool {
    validate(data).is_ascii()
}

#[cfg(all(target_arch = "x86_64", feature = "simd"))]
mod x86 {
    use std::arch::x86_64::*;

    /// Length of the leading run of whole 32-byte ASCII chunks.
    ///
    /// # Safety
    ///
    /// The CPU must support AVX2.
    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn ascii_prefix_avx2(data: &[u8]) -> usize {
        let mut pos = 0;
        unsafe {
            let high_bit = _mm256_set1_epi8(0x80u8 as i8);
            while pos + 32 <= data.len() {
                let chunk = _mm256_loadu_si256(data.as_ptr().add(pos).cast());
                if _mm256_testz_si256(chunk, high_bit) == 0 {
                    break;
                }
                pos += 32;
            }
        }
        pos
    }

    /// Length of the leading run of whole 16-byte ASCII chunks.
    ///
    /// # Safety
    ///
    /// SSE2 only, always safe on x86_64.
    #[target_feature(enable = "sse2")]
    pub(super) unsafe fn ascii_prefix_sse2(data: &[u8]) -> usize {
        let mut pos = 0;
        unsafe {
            while pos + 16 <= data.len() {
                let chunk = _mm_loadu_si128(data.as_ptr().add(pos).cast());
                // movemask collects the high bit of every byte
                if _mm_movemask_epi8(chunk) != 0 {
                    break;
                }
                pos += 16;
            }
        }
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validators() -> Vec<Utf8Validator> {
        vec![
            Utf8Validator::with_features(X86Features::empty()),
            Utf8Validator::with_features(X86Features::SSE | X86Features::SSE2),
            Utf8Validator::new(),
        ]
    }

    #[test]
    fn test_empty_input() {
        for v in validators() {
            assert_eq!(v.validate(&[]), Validation::ASCII | Validation::UTF8);
        }
        assert!(valid(&[]));
        assert!(valid_ascii(&[]));
    }

    #[test]
    fn test_ascii_and_multibyte() {
        let ascii = "The quick brown fox jumps over the lazy dog. 0123456789".as_bytes();
        let mixed = "Hello, 世界! Ünïcödé 🦀 text".as_bytes();
        for v in validators() {
            let r = v.validate(ascii);
            assert!(r.is_ascii() && r.is_utf8());

            let r = v.validate(mixed);
            assert!(!r.is_ascii());
            assert!(r.is_utf8());
        }
    }

    #[test]
    fn test_invalid_sequences() {
        let cases: [&[u8]; 6] = [
            &[0xFF],
            &[0xC0, 0x80],             // overlong
            &[0xED, 0xA0, 0x80],       // surrogate
            &[0xF4, 0x90, 0x80, 0x80], // above U+10FFFF
            &[0xE2, 0x82],             // truncated
            &[0x80],                   // lone continuation
        ];
        for v in validators() {
            for case in cases {
                assert_eq!(v.validate(case), Validation::empty(), "{:?}", case);
            }
        }
    }

    #[test]
    fn test_invalid_after_long_ascii_run() {
        for v in validators() {
            for run in [15, 16, 31, 32, 33, 64, 100, 1000] {
                let mut data = vec![b'a'; run];
                data.push(0xC3);
                assert!(!v.validate(&data).is_utf8(), "run {} tier {:?}", run, v.tier());

                data.push(0xA9);
                let r = v.validate(&data);
                assert!(r.is_utf8() && !r.is_ascii(), "run {} tier {:?}", run, v.tier());
            }
        }
    }

    #[test]
    fn test_multibyte_straddling_chunk_boundary() {
        for v in validators() {
            for offset in 28..36 {
                let mut data = vec![b'x'; offset];
                data.extend_from_slice("€".as_bytes());
                data.extend_from_slice(&[b'y'; 40]);
                assert_eq!(v.validate(&data), Validation::UTF8, "offset {}", offset);
            }
        }
    }

    #[test]
    fn test_global_validator() {
        assert_eq!(
            global_validator().tier(),
            Utf8Validator::from_config(SimdConfig::global()).tier()
        );
        assert!(valid(b"abc"));
        assert!(!valid(&[b'a', 0xFF]));
    }
}
