//! # Adjacent Equal-Block Counting
//!
//! Counts how many adjacent fixed-width blocks of a byte buffer are equal to
//! their successor. For an element width `W` and a buffer of `n` full blocks
//! the result is the number of `i < n - 1` where block `i` equals block
//! `i + 1`. Trailing bytes that do not form a full block are ignored.
//!
//! Run-length and dictionary encoders use this to decide cheaply whether a
//! column of fixed-width values is worth run-length encoding.
//!
//! ## Code paths
//!
//! - **AVX2**: 256-byte windows split into eight 32-byte lanes. Each lane
//!   compares `p[32k..32k+32]` with the same range shifted by `W`, turns the
//!   comparison into a byte mask and counts its bits. When the remaining input
//!   no longer fills a window, the window is halved (128, 64, 32 bytes) and a
//!   final 16-byte step runs for `W < 16`, before the scalar loop finishes the
//!   last few blocks.
//! - **Scalar**: native-width load and compare of each block pair. This is
//!   the only path without AVX2 and the tail of every vector run.
//!
//! Both paths return identical counts for every input.
//!
//! ## Example
//!
//! ```
//! use bytelane::io::simd_memory::count_pair::{count_pair1, count_pair4, PairCounter, W4};
//! use bytelane::X86Features;
//!
//! assert_eq!(count_pair1(&[5, 5, 9, 9, 9, 1]), 3);
//! assert_eq!(count_pair4(&[7; 8]), 1);
//!
//! // Force the portable path
//! let scalar = PairCounter::with_features(X86Features::empty());
//! assert_eq!(scalar.count::<W4>(&[7; 8]), 1);
//! ```

use crate::config::SimdConfig;
use crate::error::{BytelaneError, Result};
use crate::simd::{select_path, Operation, SimdPath};
use crate::system::cpu_features::{self, X86Features};
use std::fmt;
use std::sync::OnceLock;

//==============================================================================
// ELEMENT WIDTHS
//==============================================================================

/// Runtime representation of a supported element width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementWidth {
    /// 1 byte
    W1,
    /// 2 bytes
    W2,
    /// 4 bytes
    W4,
    /// 8 bytes
    W8,
    /// 16 bytes
    W16,
    /// 32 bytes
    W32,
}

impl ElementWidth {
    /// Every supported width, narrowest first
    pub const ALL: [ElementWidth; 6] = [
        ElementWidth::W1,
        ElementWidth::W2,
        ElementWidth::W4,
        ElementWidth::W8,
        ElementWidth::W16,
        ElementWidth::W32,
    ];

    /// Block size in bytes
    pub const fn size(self) -> usize {
        match self {
            ElementWidth::W1 => 1,
            ElementWidth::W2 => 2,
            ElementWidth::W4 => 4,
            ElementWidth::W8 => 8,
            ElementWidth::W16 => 16,
            ElementWidth::W32 => 32,
        }
    }
}

impl TryFrom<usize> for ElementWidth {
    type Error = BytelaneError;

    fn try_from(size: usize) -> Result<Self> {
        ElementWidth::ALL
            .into_iter()
            .find(|width| width.size() == size)
            .ok_or_else(|| {
                BytelaneError::invalid_data(format!(
                    "unsupported element width {} (expected 1, 2, 4, 8, 16 or 32)",
                    size
                ))
            })
    }
}

impl fmt::Display for ElementWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.size())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Compile-time element width. Implemented by [`W1`] through [`W32`].
pub trait BlockWidth: sealed::Sealed + Copy + fmt::Debug + 'static {
    /// Block size in bytes
    const SIZE: usize;

    /// Matching runtime width
    const WIDTH: ElementWidth;

    /// Bytewise equality of the first `SIZE` bytes of `a` and `b`.
    ///
    /// # Panics
    ///
    /// Panics if either slice is shorter than `SIZE`.
    fn block_eq(a: &[u8], b: &[u8]) -> bool;
}

macro_rules! block_width {
    ($(#[$doc:meta])* $name:ident, $size:expr, $width:ident, |$a:ident, $b:ident| $eq:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl BlockWidth for $name {
            const SIZE: usize = $size;
            const WIDTH: ElementWidth = ElementWidth::$width;

            #[inline(always)]
            fn block_eq($a: &[u8], $b: &[u8]) -> bool {
                $eq
            }
        }
    };
}

block_width!(
    /// 1-byte blocks
    W1, 1, W1, |a, b| a[0] == b[0]
);
block_width!(
    /// 2-byte blocks
    W2, 2, W2, |a, b| u16::from_ne_bytes(word(a)) == u16::from_ne_bytes(word(b))
);
block_width!(
    /// 4-byte blocks
    W4, 4, W4, |a, b| u32::from_ne_bytes(word(a)) == u32::from_ne_bytes(word(b))
);
block_width!(
    /// 8-byte blocks
    W8, 8, W8, |a, b| u64::from_ne_bytes(word(a)) == u64::from_ne_bytes(word(b))
);
block_width!(
    /// 16-byte blocks, one 128-bit vector each
    W16, 16, W16, |a, b| mask128(a, b) == 0xFFFF
);
block_width!(
    /// 32-byte blocks, two 128-bit vectors each
    W32, 32, W32, |a, b| (mask128(a, b) & mask128(&a[16..], &b[16..])) == 0xFFFF
);

/// First `N` bytes of `block` as an array, for native-width loads.
#[inline(always)]
fn word<const N: usize>(block: &[u8]) -> [u8; N] {
    let mut w = [0u8; N];
    w.copy_from_slice(&block[..N]);
    w
}

/// Byte-equality mask of the first 16 bytes of `a` and `b` (bit i set when
/// byte i matches).
#[cfg(all(target_arch = "x86_64", feature = "simd"))]
#[inline(always)]
fn mask128(a: &[u8], b: &[u8]) -> u32 {
    use std::arch::x86_64::*;

    let (a, b) = (&a[..16], &b[..16]);
    // SAFETY: both slices are exactly 16 bytes long and SSE2 is part of the
    // x86_64 baseline.
    unsafe {
        let va = _mm_loadu_si128(a.as_ptr().cast());
        let vb = _mm_loadu_si128(b.as_ptr().cast());
        _mm_movemask_epi8(_mm_cmpeq_epi8(va, vb)) as u32
    }
}

#[cfg(not(all(target_arch = "x86_64", feature = "simd")))]
#[inline(always)]
fn mask128(a: &[u8], b: &[u8]) -> u32 {
    if u128::from_ne_bytes(word(a)) == u128::from_ne_bytes(word(b)) {
        0xFFFF
    } else {
        0
    }
}

//==============================================================================
// SCALAR LOOP
//==============================================================================

/// Count adjacent equal blocks one pair at a time.
///
/// This is the portable reference path; every vector path must agree with it.
pub fn count_pairs_scalar<W: BlockWidth>(data: &[u8]) -> usize {
    let mut blocks = data.chunks_exact(W::SIZE);
    let Some(mut prev) = blocks.next() else {
        return 0;
    };

    let mut count = 0usize;
    for next in blocks {
        // Accumulate the comparison result instead of branching on it.
        count += usize::from(W::block_eq(prev, next));
        prev = next;
    }
    count
}

/// Sum `values` as a balanced binary tree of additions.
#[cfg_attr(not(all(target_arch = "x86_64", feature = "simd")), allow(dead_code))]
#[inline]
fn pairwise_sum(values: &[usize]) -> usize {
    match values {
        [] => 0,
        [x] => *x,
        [x, y] => x + y,
        _ => {
            let (lo, hi) = values.split_at(values.len() / 2);
            pairwise_sum(lo) + pairwise_sum(hi)
        }
    }
}

//==============================================================================
// AVX2 PATH
//==============================================================================

#[cfg(all(target_arch = "x86_64", feature = "simd"))]
mod avx2 {
    use super::{count_pairs_scalar, pairwise_sum, BlockWidth};
    use std::arch::x86_64::*;

    /// Bytes per iteration of the main loop
    const WINDOW: usize = 256;
    /// Bytes per 256-bit lane
    const LANE: usize = 32;

    /// # Safety
    ///
    /// The CPU must support AVX2 and POPCNT.
    #[target_feature(enable = "avx2,popcnt")]
    pub(super) unsafe fn count_pairs<W: BlockWidth>(data: &[u8]) -> usize {
        let p = data.as_ptr();
        let mut offset = 0usize;
        let mut remaining = data.len();
        // Each matching pair contributes W mask bits (one lane-sized unit for W = 32).
        let mut units = 0usize;

        // A window of C bytes reads C + W bytes: every block starting in the
        // window is compared with its successor.
        while remaining >= WINDOW + W::SIZE {
            units += unsafe { count_window::<W, 8>(p.add(offset)) };
            offset += WINDOW;
            remaining -= WINDOW;
        }

        if remaining >= 128 + W::SIZE {
            units += unsafe { count_window::<W, 4>(p.add(offset)) };
            offset += 128;
            remaining -= 128;
        }
        if remaining >= 64 + W::SIZE {
            units += unsafe { count_window::<W, 2>(p.add(offset)) };
            offset += 64;
            remaining -= 64;
        }
        if remaining >= 32 + W::SIZE {
            units += unsafe { count_window::<W, 1>(p.add(offset)) };
            offset += 32;
            remaining -= 32;
        }
        if W::SIZE < 16 && remaining >= 16 + W::SIZE {
            units += unsafe { count_half_lane::<W>(p.add(offset)) };
            offset += 16;
        }

        let vector_count = if W::SIZE < 32 {
            units >> W::SIZE.trailing_zeros()
        } else {
            units
        };

        // Offsets advance in multiples of 16 or 32, so the tail starts on a
        // block boundary for every width.
        vector_count + count_pairs_scalar::<W>(&data[offset..])
    }

    /// Count one window of `LANES` 32-byte lanes starting at `p`.
    ///
    /// Reads `LANES * 32 + W` bytes.
    #[inline]
    #[target_feature(enable = "avx2,popcnt")]
    unsafe fn count_window<W: BlockWidth, const LANES: usize>(p: *const u8) -> usize {
        unsafe {
            let mut current = [_mm256_setzero_si256(); LANES];
            for (i, lane) in current.iter_mut().enumerate() {
                *lane = _mm256_loadu_si256(p.add(i * LANE).cast());
            }

            let mut counts = [0usize; LANES];
            for i in 0..LANES {
                let next = if i + 1 < LANES && W::SIZE == 32 {
                    // The successor blocks are exactly the next lane.
                    current[i + 1]
                } else if i + 1 < LANES && W::SIZE == 16 {
                    // High half of this lane followed by the low half of the next one.
                    _mm256_permute2x128_si256(current[i], current[i + 1], 0x21)
                } else {
                    _mm256_loadu_si256(p.add(i * LANE + W::SIZE).cast())
                };
                counts[i] = lane_units::<W>(current[i], next);
            }

            pairwise_sum(&counts)
        }
    }

    /// Mask bits contributed by matching pairs in one lane.
    #[inline]
    #[target_feature(enable = "avx2,popcnt")]
    unsafe fn lane_units<W: BlockWidth>(a: __m256i, b: __m256i) -> usize {
        unsafe {
            let eq = match W::SIZE {
                1 => _mm256_cmpeq_epi8(a, b),
                2 => _mm256_cmpeq_epi16(a, b),
                4 => _mm256_cmpeq_epi32(a, b),
                16 => {
                    // Swap the quadwords of each 128-bit half and AND, so only
                    // fully equal halves keep their bits.
                    let eq = _mm256_cmpeq_epi64(a, b);
                    _mm256_and_si256(eq, _mm256_permute4x64_epi64(eq, 0xB1))
                }
                _ => _mm256_cmpeq_epi64(a, b),
            };

            let bits = (_mm256_movemask_epi8(eq) as u32).count_ones() as usize;
            if W::SIZE == 32 {
                // 32 bits for a full match, at most 24 otherwise
                bits >> 5
            } else {
                bits
            }
        }
    }

    /// One 16-byte step with 128-bit vectors, for widths below 16.
    ///
    /// Reads `16 + W` bytes.
    #[inline]
    #[target_feature(enable = "avx2,popcnt")]
    unsafe fn count_half_lane<W: BlockWidth>(p: *const u8) -> usize {
        unsafe {
            let a = _mm_loadu_si128(p.cast());
            let b = _mm_loadu_si128(p.add(W::SIZE).cast());
            let eq = match W::SIZE {
                1 => _mm_cmpeq_epi8(a, b),
                2 => _mm_cmpeq_epi16(a, b),
                4 => _mm_cmpeq_epi32(a, b),
                _ => _mm_cmpeq_epi64(a, b),
            };
            (_mm_movemask_epi8(eq) as u32).count_ones() as usize
        }
    }
}

//==============================================================================
// DISPATCHER
//==============================================================================

/// Equal-block counter bound to one code path.
///
/// The path is chosen once at construction; counting never re-checks CPU
/// features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairCounter {
    path: SimdPath,
}

impl PairCounter {
    /// Counter using every capability of the running processor.
    pub fn new() -> Self {
        Self::with_features(cpu_features::x86())
    }

    /// Counter restricted to `features`.
    ///
    /// Flags the running processor does not report are ignored, so an empty
    /// bitset forces the scalar loop and a full one behaves like [`new`](Self::new).
    pub fn with_features(features: X86Features) -> Self {
        let path = select_path(Operation::CountPair, features & cpu_features::x86());
        Self { path }
    }

    /// Counter restricted by a [`SimdConfig`].
    pub fn from_config(config: &SimdConfig) -> Self {
        Self::with_features(config.effective_x86())
    }

    /// Path this counter runs
    pub fn path(&self) -> SimdPath {
        self.path
    }

    /// Count adjacent equal `W`-byte blocks in `data`.
    #[inline]
    pub fn count<W: BlockWidth>(&self, data: &[u8]) -> usize {
        if data.len() < 2 * W::SIZE {
            return 0;
        }

        match self.path {
            #[cfg(all(target_arch = "x86_64", feature = "simd"))]
            // SAFETY: the Avx2 path is only selected when the processor reports
            // AVX2 and POPCNT (`with_features` intersects with detection).
            SimdPath::Avx2 => unsafe { avx2::count_pairs::<W>(data) },
            _ => count_pairs_scalar::<W>(data),
        }
    }

    /// Count adjacent equal blocks for a width chosen at runtime.
    pub fn count_width(&self, data: &[u8], width: ElementWidth) -> usize {
        match width {
            ElementWidth::W1 => self.count::<W1>(data),
            ElementWidth::W2 => self.count::<W2>(data),
            ElementWidth::W4 => self.count::<W4>(data),
            ElementWidth::W8 => self.count::<W8>(data),
            ElementWidth::W16 => self.count::<W16>(data),
            ElementWidth::W32 => self.count::<W32>(data),
        }
    }
}

impl Default for PairCounter {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_PAIR_COUNTER: OnceLock<PairCounter> = OnceLock::new();

/// Process-wide counter honouring the global [`SimdConfig`].
pub fn global_pair_counter() -> &'static PairCounter {
    GLOBAL_PAIR_COUNTER.get_or_init(|| {
        let counter = PairCounter::from_config(SimdConfig::global());
        log::debug!("Pair counter using {:?} path", counter.path());
        counter
    })
}

//==============================================================================
// PUBLIC API
//==============================================================================

/// Count adjacent equal blocks of a runtime-selected width.
pub fn count_pairs(data: &[u8], width: ElementWidth) -> usize {
    global_pair_counter().count_width(data, width)
}

/// Count adjacent equal bytes.
pub fn count_pair1(data: &[u8]) -> usize {
    global_pair_counter().count::<W1>(data)
}

/// Count adjacent equal 2-byte blocks.
pub fn count_pair2(data: &[u8]) -> usize {
    global_pair_counter().count::<W2>(data)
}

/// Count adjacent equal 4-byte blocks.
pub fn count_pair4(data: &[u8]) -> usize {
    global_pair_counter().count::<W4>(data)
}

/// Count adjacent equal 8-byte blocks.
pub fn count_pair8(data: &[u8]) -> usize {
    global_pair_counter().count::<W8>(data)
}

/// Count adjacent equal 16-byte blocks.
pub fn count_pair16(data: &[u8]) -> usize {
    global_pair_counter().count::<W16>(data)
}

/// Count adjacent equal 32-byte blocks.
pub fn count_pair32(data: &[u8]) -> usize {
    global_pair_counter().count::<W32>(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(data: &[u8], width: usize) -> usize {
        let blocks: Vec<&[u8]> = data.chunks_exact(width).collect();
        blocks.windows(2).filter(|pair| pair[0] == pair[1]).count()
    }

    /// Runs of repeated values so that every width sees both matches and mismatches.
    fn runs(len: usize, width: usize) -> Vec<u8> {
        (0..len)
            .map(|i| {
                let block = i / width;
                ((block / 3) as u8).wrapping_mul(31) ^ ((i % width) as u8)
            })
            .collect()
    }

    fn counters() -> [PairCounter; 2] {
        [PairCounter::with_features(X86Features::empty()), PairCounter::new()]
    }

    #[test]
    fn test_scenarios() {
        for counter in counters() {
            assert_eq!(counter.count::<W1>(&[5, 5, 9, 9, 9, 1]), 3);
            assert_eq!(counter.count::<W4>(&[7; 8]), 1);
            assert_eq!(counter.count::<W16>(&[0; 31]), 0);
        }
    }

    #[test]
    fn test_empty_bitset_forces_scalar() {
        let counter = PairCounter::with_features(X86Features::empty());
        assert_eq!(counter.path(), SimdPath::Scalar);

        let portable = PairCounter::from_config(&SimdConfig {
            enable_simd: false,
            enable_avx2: true,
        });
        assert_eq!(portable.path(), SimdPath::Scalar);
    }

    #[test]
    fn test_detected_path() {
        let expected = select_path(Operation::CountPair, cpu_features::x86());
        assert_eq!(PairCounter::new().path(), expected);
    }

    #[test]
    fn test_short_buffers() {
        for counter in counters() {
            for width in ElementWidth::ALL {
                let w = width.size();
                for len in 0..2 * w {
                    assert_eq!(counter.count_width(&vec![0u8; len], width), 0, "{} len {}", width, len);
                }

                let mut exact = vec![0xAB; 2 * w];
                assert_eq!(counter.count_width(&exact, width), 1, "{}", width);
                exact[2 * w - 1] ^= 1;
                assert_eq!(counter.count_width(&exact, width), 0, "{}", width);
            }
        }
    }

    #[test]
    fn test_trailing_partial_block_ignored() {
        for counter in counters() {
            // Three full 4-byte blocks plus three stray bytes equal to the last block's prefix
            let data = [1, 2, 3, 4, 1, 2, 3, 4, 9, 9, 9, 9, 9, 9, 9];
            assert_eq!(counter.count::<W4>(&data), 1);
        }
    }

    #[test]
    fn test_cascade_boundaries_match_reference() {
        for counter in counters() {
            for width in ElementWidth::ALL {
                let w = width.size();
                for base in [0, 16, 32, 64, 128, 256, 512, 768] {
                    for len in [base + w, base + 2 * w, base + w + 1, (base + w).saturating_sub(1)] {
                        let data = runs(len, w);
                        assert_eq!(
                            counter.count_width(&data, width),
                            reference(&data, w),
                            "{} len {} path {:?}",
                            width,
                            len,
                            counter.path()
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_all_equal_and_all_distinct() {
        for counter in counters() {
            for width in ElementWidth::ALL {
                let w = width.size();
                let blocks = 1000 / w + 3;
                let same = vec![0x5A; blocks * w];
                assert_eq!(counter.count_width(&same, width), blocks - 1);

                let distinct: Vec<u8> = (0..blocks * w).map(|i| ((i / w) % 251) as u8).collect();
                assert_eq!(counter.count_width(&distinct, width), reference(&distinct, w));
            }
        }
    }

    #[test]
    fn test_single_byte_difference_inside_block() {
        // A mismatch in any byte position of a wide block must break the pair,
        // including positions that straddle 128-bit halves.
        for counter in counters() {
            for width in [ElementWidth::W16, ElementWidth::W32] {
                let w = width.size();
                for pos in 0..w {
                    let mut data = vec![0x11u8; 20 * w];
                    data[7 * w + pos] = 0x22;
                    assert_eq!(counter.count_width(&data, width), 20 - 1 - 2, "{} pos {}", width, pos);
                }
            }
        }
    }

    #[test]
    fn test_block_eq() {
        assert!(W1::block_eq(&[3], &[3]));
        assert!(!W2::block_eq(&[1, 2], &[1, 3]));
        assert!(W8::block_eq(&[9; 8], &[9; 8]));
        assert!(W16::block_eq(&[1; 16], &[1; 16]));
        let mut b = [1u8; 32];
        b[31] = 0;
        assert!(!W32::block_eq(&[1; 32], &b));
        assert!(W32::block_eq(&b, &b));
    }

    #[test]
    fn test_pairwise_sum() {
        assert_eq!(pairwise_sum(&[]), 0);
        assert_eq!(pairwise_sum(&[4]), 4);
        assert_eq!(pairwise_sum(&[1, 2]), 3);
        assert_eq!(pairwise_sum(&[1, 2, 3]), 6);
        assert_eq!(pairwise_sum(&[1, 2, 3, 4, 5, 6, 7, 8]), 36);
    }

    #[test]
    fn test_element_width_parsing() {
        for width in ElementWidth::ALL {
            assert_eq!(ElementWidth::try_from(width.size()).unwrap(), width);
        }
        for bad in [0, 3, 5, 12, 64] {
            let err = ElementWidth::try_from(bad).unwrap_err();
            assert_eq!(err.category(), "data");
        }
        assert_eq!(ElementWidth::W16.to_string(), "16B");
        assert_eq!(W8::WIDTH, ElementWidth::W8);
        assert_eq!(W32::SIZE, 32);
    }

    #[test]
    fn test_global_entry_points() {
        let data = runs(1000, 8);
        assert_eq!(count_pair8(&data), reference(&data, 8));
        assert_eq!(count_pairs(&data, ElementWidth::W8), reference(&data, 8));
        assert_eq!(count_pair1(&[5, 5, 9, 9, 9, 1]), 3);
        assert_eq!(count_pair2(&[1, 0, 1, 0, 1, 1]), 1);
        assert_eq!(count_pair4(&[7; 8]), 1);
        assert_eq!(count_pair16(&[0; 31]), 0);
        assert_eq!(count_pair32(&[0; 96]), 2);
    }
}
