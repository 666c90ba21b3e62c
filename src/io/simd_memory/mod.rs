//! # SIMD Memory Operations
//!
//! Hardware-accelerated operations over raw byte buffers.
//!
//! ## Modules
//!
//! - **count_pair**: adjacent equal-block counting for 1 to 32 byte elements
//! - **copy**: bulk copy with AVX2/SSE2 loads and stores
//!
//! Every operation selects its code path once through [`crate::simd::select_path`]
//! and falls back to a portable loop when no vector extension is available.

pub mod copy;
pub mod count_pair;

pub use copy::{copy, SimdCopy};
pub use count_pair::{
    count_pair1, count_pair16, count_pair2, count_pair32, count_pair4, count_pair8,
    count_pairs, count_pairs_scalar, BlockWidth, ElementWidth, PairCounter, W1, W16, W2,
    W32, W4, W8,
};
