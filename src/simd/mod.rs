//! # SIMD Dispatch
//!
//! Maps an operation and a capability bitset to the code path that will run
//! it. Selection happens once, at the top of a call or when a dispatcher is
//! constructed; the chosen path never re-checks features inside its loop.
//!
//! ## Example
//!
//! ```
//! use bytelane::simd::{select_path, Operation, SimdPath};
//! use bytelane::X86Features;
//!
//! // No capabilities: everything runs the portable loop.
//! assert_eq!(select_path(Operation::CountPair, X86Features::empty()), SimdPath::Scalar);
//! ```

use crate::system::cpu_features::X86Features;

/// Operations routed through the dispatch gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Adjacent equal-block counting
    CountPair,
    /// Bulk memory copy
    Copy,
    /// UTF-8 / ASCII validation
    Utf8Validation,
}

/// Code path selected for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimdPath {
    /// 256-bit integer vectors
    Avx2,
    /// 128-bit integer vectors
    Sse2,
    /// Portable scalar loop
    Scalar,
}

impl SimdPath {
    /// Bytes processed per vector register on this path.
    pub fn vector_bytes(self) -> usize {
        match self {
            SimdPath::Avx2 => 32,
            SimdPath::Sse2 => 16,
            SimdPath::Scalar => 8,
        }
    }

    /// Whether this path uses vector registers at all.
    pub fn is_vectorized(self) -> bool {
        !matches!(self, SimdPath::Scalar)
    }
}

/// Select the code path for `op` given the x86 capability bitset.
///
/// Vector paths are only compiled for x86_64 with the `simd` cargo feature;
/// everywhere else this always returns [`SimdPath::Scalar`].
#[inline]
pub fn select_path(op: Operation, features: X86Features) -> SimdPath {
    if !cfg!(all(target_arch = "x86_64", feature = "simd")) {
        return SimdPath::Scalar;
    }

    match op {
        Operation::CountPair => {
            if features.contains(X86Features::AVX2 | X86Features::POPCNT) {
                SimdPath::Avx2
            } else {
                SimdPath::Scalar
            }
        }
        Operation::Copy | Operation::Utf8Validation => {
            if features.contains(X86Features::AVX2) {
                SimdPath::Avx2
            } else if features.contains(X86Features::SSE2) {
                SimdPath::Sse2
            } else {
                SimdPath::Scalar
            }
        }
    }
}
