//! # SIMD Data Validation
//!
//! - `utf8`: ASCII / UTF-8 classification with a vector ASCII fast path
//!
//! ## Example
//!
//! ```
//! use bytelane::io::simd_validation::utf8;
//!
//! assert!(utf8::valid(b"Hello, World!"));
//! assert!(utf8::valid("Hello, 世界! 🦀".as_bytes()));
//! assert!(!utf8::valid(&[0xFF, 0xFE, 0xFD]));
//! ```

pub mod utf8;

pub use utf8::{Utf8Validator, Validation};
