//! # System Integration
//!
//! Runtime CPU capability detection for x86, 32-bit ARM and ARM64.

pub mod cpu_features;

pub use cpu_features::{get_cpu_features, Arm64Features, ArmFeatures, CpuFeatureSet, X86Features};
