//! SIMD acceleration configuration.

use super::{parse_env_bool, Config};
use crate::error::{BytelaneError, Result};
use crate::system::cpu_features::{self, X86Features};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Capabilities the dispatchers are allowed to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimdConfig {
    /// Enable vector code paths at all
    pub enable_simd: bool,
    /// Enable 256-bit AVX2 paths (and anything wider)
    pub enable_avx2: bool,
}

impl Default for SimdConfig {
    fn default() -> Self {
        Self {
            enable_simd: true,
            enable_avx2: true,
        }
    }
}

impl SimdConfig {
    /// Restrict `features` to what this configuration allows.
    ///
    /// Disabling AVX2 also removes the AVX-512 flags, which imply it.
    pub fn mask_x86(&self, features: X86Features) -> X86Features {
        if !self.enable_simd {
            return X86Features::empty();
        }
        if !self.enable_avx2 {
            return features
                - (X86Features::AVX2
                    | X86Features::AVX512F
                    | X86Features::AVX512BW
                    | X86Features::AVX512DQ
                    | X86Features::AVX512VL);
        }
        features
    }

    /// The detected x86 bitset with this configuration applied.
    pub fn effective_x86(&self) -> X86Features {
        self.mask_x86(cpu_features::x86())
    }

    /// Process-wide configuration, read from `BYTELANE_*` variables on first use.
    ///
    /// The global dispatchers are built from this. An unreadable environment
    /// falls back to [`SimdConfig::default`].
    pub fn global() -> &'static SimdConfig {
        GLOBAL_SIMD_CONFIG.get_or_init(|| {
            Self::from_env().unwrap_or_else(|e| {
                log::warn!("Invalid SIMD config in environment, using defaults: {}", e);
                Self::default()
            })
        })
    }
}

static GLOBAL_SIMD_CONFIG: OnceLock<SimdConfig> = OnceLock::new();

impl Config for SimdConfig {
    fn validate(&self) -> Result<()> {
        // Every combination is meaningful
        Ok(())
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let mut config = Self::default();
        config.enable_simd = parse_env_bool(&format!("{}SIMD_ENABLE", prefix), config.enable_simd);
        config.enable_avx2 = parse_env_bool(&format!("{}SIMD_AVX2", prefix), config.enable_avx2);
        config.validate()?;
        log::debug!("Loaded SIMD config from environment ({}*): {:?}", prefix, config);
        Ok(config)
    }

    fn performance_preset() -> Self {
        Self {
            enable_simd: true,
            enable_avx2: true,
        }
    }

    fn portable_preset() -> Self {
        Self {
            enable_simd: false,
            enable_avx2: false,
        }
    }

    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self).map_err(|e| {
            BytelaneError::configuration(format!("Failed to serialize SIMD config: {}", e))
        })?;
        std::fs::write(path, serialized).map_err(|e| {
            BytelaneError::configuration(format!("Failed to write SIMD config file: {}", e))
        })?;
        Ok(())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BytelaneError::configuration(format!("Failed to read SIMD config file: {}", e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            BytelaneError::configuration(format!("Failed to parse SIMD config file: {}", e))
        })?;
        config.validate()?;
        log::debug!("Loaded SIMD config from file: {:?}", config);
        Ok(config)
    }
}
