//! Configuration APIs for bytelane
//!
//! Configuration lets a process restrict which detected capabilities the
//! dispatchers are allowed to use, for example to pin every primitive to its
//! portable path on a fleet with heterogeneous hardware, or to compare paths
//! in production.
//!
//! # Environment Initialization
//!
//! ```rust
//! use bytelane::config::{Config, SimdConfig};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Reads BYTELANE_SIMD_ENABLE and BYTELANE_SIMD_AVX2
//! let config = SimdConfig::from_env()?;
//!
//! // Same variables under a custom prefix
//! let config = SimdConfig::from_env_with_prefix("MYAPP_")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Presets
//!
//! ```rust
//! use bytelane::config::{Config, SimdConfig};
//!
//! let fast = SimdConfig::performance_preset();
//! let portable = SimdConfig::portable_preset();
//! assert!(fast.enable_simd && !portable.enable_simd);
//! ```

use crate::error::Result;
use std::env;
use std::fmt;
use std::path::Path;

pub mod simd;

pub use simd::SimdConfig;

/// Common configuration trait providing validation, environment initialization,
/// presets and file persistence.
pub trait Config: Clone + fmt::Debug {
    /// Validate the configuration for correctness and consistency.
    fn validate(&self) -> Result<()>;

    /// Initialize configuration from environment variables.
    ///
    /// Environment variables use the format `BYTELANE_{COMPONENT}_{FIELD}`,
    /// e.g. `BYTELANE_SIMD_AVX2=0`.
    fn from_env() -> Result<Self>
    where
        Self: Default,
    {
        Self::from_env_with_prefix("BYTELANE_")
    }

    /// Initialize configuration from environment variables with a custom prefix.
    fn from_env_with_prefix(prefix: &str) -> Result<Self>
    where
        Self: Default;

    /// Configuration using every capability the hardware offers.
    fn performance_preset() -> Self;

    /// Configuration restricted to portable code paths.
    fn portable_preset() -> Self;

    /// Save configuration to a file.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()>;

    /// Load configuration from a file.
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self>;
}

/// Utility function to parse boolean environment variable.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive) as true and
/// "false", "0", "no", "off" as false. Anything else, or an unset variable,
/// yields `default`.
pub fn parse_env_bool(var_name: &str, default: bool) -> bool {
    env::var(var_name)
        .ok()
        .and_then(|s| match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => {
                log::warn!("Ignoring unrecognized value {:?} for {}", s, var_name);
                None
            }
        })
        .unwrap_or(default)
}
