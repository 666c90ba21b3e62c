//! # Bytelane: Vectorized Byte-Buffer Primitives
//!
//! Small, hot primitives for columnar encoders, each dispatched at runtime to
//! the widest vector code path the processor supports.
//!
//! ## Key Features
//!
//! - **Equal-block counting**: number of adjacent equal 1, 2, 4, 8, 16 or
//!   32 byte blocks, with an AVX2 path and a portable loop
//! - **CPU capability registry**: x86, ARM and ARM64 feature bitsets detected
//!   once per process
//! - **Bulk copy** and **UTF-8 validation** through the same dispatch gate
//! - **Configuration**: mask capabilities from the environment or a JSON file
//!
//! ## Quick Start
//!
//! ```rust
//! use bytelane::{count_pair1, count_pairs, ElementWidth, PairCounter, X86Features};
//!
//! assert_eq!(count_pair1(&[5, 5, 9, 9, 9, 1]), 3);
//! assert_eq!(count_pairs(&[7; 8], ElementWidth::W4), 1);
//!
//! // Pin the portable path, e.g. to compare against the vector one
//! let scalar = PairCounter::with_features(X86Features::empty());
//! assert_eq!(scalar.count_width(&[7; 8], ElementWidth::W4), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod error;
pub mod io;
pub mod simd;
pub mod system;

// Re-export core types
pub use error::{BytelaneError, Result};
pub use system::cpu_features::{Arm64Features, ArmFeatures, CpuFeatureSet, X86Features};

// Counting
pub use io::simd_memory::count_pair::{
    count_pair1, count_pair16, count_pair2, count_pair32, count_pair4, count_pair8,
    count_pairs, BlockWidth, ElementWidth, PairCounter,
};

// Collaborators
pub use io::simd_memory::copy::{copy, SimdCopy};
pub use io::simd_validation::utf8;

pub use config::{Config, SimdConfig};
pub use simd::{Operation, SimdPath};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Whether the global equal-block counter runs a vector path
pub fn has_simd_support() -> bool {
    io::simd_memory::count_pair::global_pair_counter()
        .path()
        .is_vectorized()
}

/// Initialize the library.
///
/// Detection and dispatch are lazy; calling this only front-loads them and
/// logs the outcome.
pub fn init() {
    log::debug!("Initializing bytelane v{}", VERSION);
    let _ = system::get_cpu_features();
    let _ = io::simd_memory::count_pair::global_pair_counter();
    let _ = io::simd_memory::copy::global_simd_copy();
    let _ = utf8::global_validator();
}
