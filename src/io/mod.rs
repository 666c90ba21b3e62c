//! Byte-buffer primitives
//!
//! Vectorized operations over in-memory byte slices: equal-block counting,
//! bulk copy and text validation.

pub mod simd_memory;
pub mod simd_validation;

pub use simd_memory::{count_pairs, ElementWidth, PairCounter, SimdCopy};
pub use simd_validation::{Utf8Validator, Validation};
