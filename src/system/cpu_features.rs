//! # CPU Feature Detection
//!
//! Process-wide registry of the instruction-set extensions available on the
//! running processor, one bitset per architecture family.
//!
//! Each family is detected lazily on first use and cached for the lifetime of
//! the process. Detection never fails: on a foreign architecture, or when the
//! platform offers no way to query the hardware, the corresponding bitset is
//! empty and every consumer falls back to its portable code path.
//!
//! ```
//! use bytelane::system::cpu_features::{self, X86Features};
//!
//! let x86 = cpu_features::x86();
//! if x86.contains(X86Features::AVX2) {
//!     // 256-bit integer vectors are available
//! }
//! assert_eq!(x86, cpu_features::x86());
//! ```

use bitflags::bitflags;
use std::sync::OnceLock;

bitflags! {
    /// Instruction-set extensions of the x86 family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct X86Features: u64 {
        /// Streaming SIMD Extensions
        const SSE = 1 << 0;
        /// SSE2, 128-bit integer vectors (baseline on x86_64)
        const SSE2 = 1 << 1;
        /// SSE3
        const SSE3 = 1 << 2;
        /// Supplemental SSE3
        const SSSE3 = 1 << 3;
        /// SSE4.1
        const SSE41 = 1 << 4;
        /// SSE4.2
        const SSE42 = 1 << 5;
        /// Population count instruction
        const POPCNT = 1 << 6;
        /// Advanced Vector Extensions (256-bit floating point)
        const AVX = 1 << 7;
        /// AVX2, 256-bit integer vectors
        const AVX2 = 1 << 8;
        /// Bit manipulation instructions, set 1
        const BMI1 = 1 << 9;
        /// Bit manipulation instructions, set 2
        const BMI2 = 1 << 10;
        /// Leading zero count
        const LZCNT = 1 << 11;
        /// Fused multiply-add
        const FMA = 1 << 12;
        /// AVX-512 foundation
        const AVX512F = 1 << 13;
        /// AVX-512 byte and word instructions
        const AVX512BW = 1 << 14;
        /// AVX-512 doubleword and quadword instructions
        const AVX512DQ = 1 << 15;
        /// AVX-512 vector length extensions
        const AVX512VL = 1 << 16;
    }
}

bitflags! {
    /// Hardware capabilities of 32-bit ARM processors, as reported by the kernel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ArmFeatures: u64 {
        /// Half-word loads and stores
        const HALF = 1 << 0;
        /// Thumb instruction set
        const THUMB = 1 << 1;
        /// Vector floating point
        const VFP = 1 << 2;
        /// DSP extensions
        const EDSP = 1 << 3;
        /// Advanced SIMD (NEON)
        const NEON = 1 << 4;
        /// VFPv3
        const VFPV3 = 1 << 5;
        /// VFPv4
        const VFPV4 = 1 << 6;
        /// Integer division in ARM mode
        const IDIVA = 1 << 7;
        /// Integer division in Thumb mode
        const IDIVT = 1 << 8;
        /// Large physical address extension
        const LPAE = 1 << 9;
        /// AES instructions
        const AES = 1 << 10;
        /// Polynomial multiply long
        const PMULL = 1 << 11;
        /// SHA-1 instructions
        const SHA1 = 1 << 12;
        /// SHA-256 instructions
        const SHA2 = 1 << 13;
        /// CRC32 instructions
        const CRC32 = 1 << 14;
    }
}

bitflags! {
    /// Instruction-set extensions of the ARM64 (AArch64) family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Arm64Features: u64 {
        /// Floating point
        const FP = 1 << 0;
        /// Advanced SIMD
        const ASIMD = 1 << 1;
        /// AES instructions
        const AES = 1 << 2;
        /// Polynomial multiply long
        const PMULL = 1 << 3;
        /// SHA-1 and SHA-256 instructions
        const SHA2 = 1 << 4;
        /// CRC32 instructions
        const CRC32 = 1 << 5;
        /// Large system extensions (atomics)
        const ATOMICS = 1 << 6;
        /// Half-precision SIMD arithmetic
        const ASIMDHP = 1 << 7;
        /// Rounding double multiply accumulate
        const ASIMDRDM = 1 << 8;
        /// SHA-3 and SHA-512 instructions
        const SHA3 = 1 << 9;
        /// SM4 instructions
        const SM4 = 1 << 10;
        /// Dot product instructions
        const ASIMDDP = 1 << 11;
        /// Scalable vector extension
        const SVE = 1 << 12;
    }
}

static X86: OnceLock<X86Features> = OnceLock::new();
static ARM: OnceLock<ArmFeatures> = OnceLock::new();
static ARM64: OnceLock<Arm64Features> = OnceLock::new();
static CPU_FEATURES: OnceLock<CpuFeatureSet> = OnceLock::new();

/// x86 feature bitset of the running processor (empty on other architectures).
#[inline]
pub fn x86() -> X86Features {
    *X86.get_or_init(|| {
        let features = detect_x86();
        log::debug!("Detected x86 features: {:?}", features);
        features
    })
}

/// 32-bit ARM feature bitset of the running processor (empty elsewhere).
#[inline]
pub fn arm() -> ArmFeatures {
    *ARM.get_or_init(|| {
        let features = detect_arm();
        log::debug!("Detected arm features: {:?}", features);
        features
    })
}

/// ARM64 feature bitset of the running processor (empty elsewhere).
#[inline]
pub fn arm64() -> Arm64Features {
    *ARM64.get_or_init(|| {
        let features = detect_arm64();
        log::debug!("Detected arm64 features: {:?}", features);
        features
    })
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect_x86() -> X86Features {
    let table = [
        (std::is_x86_feature_detected!("sse"), X86Features::SSE),
        (std::is_x86_feature_detected!("sse2"), X86Features::SSE2),
        (std::is_x86_feature_detected!("sse3"), X86Features::SSE3),
        (std::is_x86_feature_detected!("ssse3"), X86Features::SSSE3),
        (std::is_x86_feature_detected!("sse4.1"), X86Features::SSE41),
        (std::is_x86_feature_detected!("sse4.2"), X86Features::SSE42),
        (std::is_x86_feature_detected!("popcnt"), X86Features::POPCNT),
        (std::is_x86_feature_detected!("avx"), X86Features::AVX),
        (std::is_x86_feature_detected!("avx2"), X86Features::AVX2),
        (std::is_x86_feature_detected!("bmi1"), X86Features::BMI1),
        (std::is_x86_feature_detected!("bmi2"), X86Features::BMI2),
        (std::is_x86_feature_detected!("lzcnt"), X86Features::LZCNT),
        (std::is_x86_feature_detected!("fma"), X86Features::FMA),
        (std::is_x86_feature_detected!("avx512f"), X86Features::AVX512F),
        (std::is_x86_feature_detected!("avx512bw"), X86Features::AVX512BW),
        (std::is_x86_feature_detected!("avx512dq"), X86Features::AVX512DQ),
        (std::is_x86_feature_detected!("avx512vl"), X86Features::AVX512VL),
    ];

    table
        .iter()
        .filter(|(detected, _)| *detected)
        .fold(X86Features::empty(), |acc, (_, flag)| acc | *flag)
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn detect_x86() -> X86Features {
    X86Features::empty()
}

#[cfg(all(target_arch = "arm", target_os = "linux"))]
fn detect_arm() -> ArmFeatures {
    // Userspace has no stable detection macro for 32-bit ARM; the kernel
    // exposes the hwcaps through /proc/cpuinfo.
    match std::fs::read_to_string("/proc/cpuinfo") {
        Ok(cpuinfo) => parse_cpuinfo_features(&cpuinfo),
        Err(e) => {
            log::warn!("Unable to read /proc/cpuinfo, assuming no arm features: {}", e);
            ArmFeatures::empty()
        }
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "linux")))]
fn detect_arm() -> ArmFeatures {
    ArmFeatures::empty()
}

#[cfg(target_arch = "aarch64")]
fn detect_arm64() -> Arm64Features {
    use std::arch::is_aarch64_feature_detected;

    let table = [
        (is_aarch64_feature_detected!("fp"), Arm64Features::FP),
        (is_aarch64_feature_detected!("asimd"), Arm64Features::ASIMD),
        (is_aarch64_feature_detected!("aes"), Arm64Features::AES),
        (is_aarch64_feature_detected!("pmull"), Arm64Features::PMULL),
        (is_aarch64_feature_detected!("sha2"), Arm64Features::SHA2),
        (is_aarch64_feature_detected!("crc"), Arm64Features::CRC32),
        (is_aarch64_feature_detected!("lse"), Arm64Features::ATOMICS),
        (is_aarch64_feature_detected!("fp16"), Arm64Features::ASIMDHP),
        (is_aarch64_feature_detected!("rdm"), Arm64Features::ASIMDRDM),
        (is_aarch64_feature_detected!("sha3"), Arm64Features::SHA3),
        (is_aarch64_feature_detected!("sm4"), Arm64Features::SM4),
        (is_aarch64_feature_detected!("dotprod"), Arm64Features::ASIMDDP),
        (is_aarch64_feature_detected!("sve"), Arm64Features::SVE),
    ];

    table
        .iter()
        .filter(|(detected, _)| *detected)
        .fold(Arm64Features::empty(), |acc, (_, flag)| acc | *flag)
}

#[cfg(not(target_arch = "aarch64"))]
fn detect_arm64() -> Arm64Features {
    Arm64Features::empty()
}

/// Parse the `Features` line of a Linux `/proc/cpuinfo` dump into ARM hwcaps.
///
/// Unknown tokens are ignored; a dump without a `Features` line yields the
/// empty set.
pub fn parse_cpuinfo_features(cpuinfo: &str) -> ArmFeatures {
    let Some(line) = cpuinfo
        .lines()
        .find(|line| line.trim_start().starts_with("Features"))
    else {
        return ArmFeatures::empty();
    };

    let tokens = line.split_once(':').map(|(_, rest)| rest).unwrap_or("");
    tokens
        .split_whitespace()
        .fold(ArmFeatures::empty(), |acc, token| {
            acc | match token {
                "half" => ArmFeatures::HALF,
                "thumb" => ArmFeatures::THUMB,
                "vfp" => ArmFeatures::VFP,
                "edsp" => ArmFeatures::EDSP,
                "neon" => ArmFeatures::NEON,
                "vfpv3" => ArmFeatures::VFPV3,
                "vfpv4" => ArmFeatures::VFPV4,
                "idiva" => ArmFeatures::IDIVA,
                "idivt" => ArmFeatures::IDIVT,
                "lpae" => ArmFeatures::LPAE,
                "aes" => ArmFeatures::AES,
                "pmull" => ArmFeatures::PMULL,
                "sha1" => ArmFeatures::SHA1,
                "sha2" => ArmFeatures::SHA2,
                "crc32" => ArmFeatures::CRC32,
                _ => ArmFeatures::empty(),
            }
        })
}

/// Snapshot of every architecture family plus processor identification.
#[derive(Debug, Clone)]
pub struct CpuFeatureSet {
    /// x86 feature bitset
    pub x86: X86Features,
    /// 32-bit ARM feature bitset
    pub arm: ArmFeatures,
    /// ARM64 feature bitset
    pub arm64: Arm64Features,
    /// CPU vendor (GenuineIntel, AuthenticAMD, ARM, ...)
    pub vendor: String,
    /// CPU model name
    pub model: String,
}

impl CpuFeatureSet {
    /// Width in bytes of the widest integer vector register usable at runtime.
    pub fn vector_width(&self) -> usize {
        if self.x86.contains(X86Features::AVX2) {
            32
        } else if self.x86.contains(X86Features::SSE2)
            || self.arm.contains(ArmFeatures::NEON)
            || self.arm64.contains(Arm64Features::ASIMD)
        {
            16
        } else {
            8
        }
    }

    /// True when no family reports any extension.
    pub fn is_baseline(&self) -> bool {
        self.x86.is_empty() && self.arm.is_empty() && self.arm64.is_empty()
    }
}

/// Get the global CPU feature set (detected once on first call)
pub fn get_cpu_features() -> &'static CpuFeatureSet {
    CPU_FEATURES.get_or_init(|| {
        let (vendor, model) = cpu_info();
        let set = CpuFeatureSet {
            x86: x86(),
            arm: arm(),
            arm64: arm64(),
            vendor,
            model,
        };
        log::debug!(
            "CPU: {} {} (vector width {} bytes)",
            set.vendor,
            set.model,
            set.vector_width()
        );
        set
    })
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn cpu_info() -> (String, String) {
    let cpuid = raw_cpuid::CpuId::new();
    let vendor = cpuid
        .get_vendor_info()
        .map(|v| v.as_str().to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let model = cpuid
        .get_processor_brand_string()
        .map(|b| b.as_str().trim().to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    (vendor, model)
}

#[cfg(all(
    any(target_arch = "arm", target_arch = "aarch64"),
    target_os = "linux"
))]
fn cpu_info() -> (String, String) {
    let Ok(cpuinfo) = std::fs::read_to_string("/proc/cpuinfo") else {
        return ("ARM".to_string(), "Unknown".to_string());
    };

    let mut vendor = "ARM".to_string();
    let mut model = "Unknown".to_string();
    for line in cpuinfo.lines() {
        if line.starts_with("CPU implementer") {
            if line.contains("0x51") {
                vendor = "Qualcomm".to_string();
            } else if line.contains("0x61") {
                vendor = "Apple".to_string();
            }
        } else if line.starts_with("model name") || line.starts_with("Hardware") {
            if let Some(name) = line.split(':').nth(1) {
                model = name.trim().to_string();
            }
        }
    }
    (vendor, model)
}

#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    all(any(target_arch = "arm", target_arch = "aarch64"), target_os = "linux")
)))]
fn cpu_info() -> (String, String) {
    ("Unknown".to_string(), "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_is_idempotent() {
        assert_eq!(x86(), x86());
        assert_eq!(arm(), arm());
        assert_eq!(arm64(), arm64());
        assert!(std::ptr::eq(get_cpu_features(), get_cpu_features()));
    }

    #[test]
    fn test_feature_set_matches_registry() {
        let set = get_cpu_features();
        assert_eq!(set.x86, x86());
        assert_eq!(set.arm, arm());
        assert_eq!(set.arm64, arm64());
        assert!(!set.vendor.is_empty());
        assert!([8, 16, 32].contains(&set.vector_width()));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_x86_64_baseline() {
        let features = x86();
        assert!(features.contains(X86Features::SSE | X86Features::SSE2));
        assert_eq!(features.contains(X86Features::AVX2), std::is_x86_feature_detected!("avx2"));
        assert!(arm().is_empty());
        assert!(arm64().is_empty());
    }

    #[cfg(target_arch = "aarch64")]
    #[test]
    fn test_aarch64_baseline() {
        assert!(arm64().contains(Arm64Features::ASIMD));
        assert!(x86().is_empty());
        assert!(arm().is_empty());
    }

    #[test]
    fn test_parse_cpuinfo_features() {
        let cpuinfo = "processor\t: 0\n\
                       model name\t: ARMv7 Processor rev 4 (v7l)\n\
                       Features\t: half thumb fastmult vfp edsp neon vfpv3 tls vfpv4 idiva idivt lpae evtstrm crc32\n\
                       CPU implementer\t: 0x41\n";
        let features = parse_cpuinfo_features(cpuinfo);
        assert!(features.contains(ArmFeatures::NEON | ArmFeatures::VFPV4 | ArmFeatures::CRC32));
        assert!(features.contains(ArmFeatures::IDIVA | ArmFeatures::IDIVT | ArmFeatures::LPAE));
        assert!(!features.contains(ArmFeatures::AES));
        assert!(!features.contains(ArmFeatures::SHA2));
    }

    #[test]
    fn test_parse_cpuinfo_without_features_line() {
        assert!(parse_cpuinfo_features("").is_empty());
        assert!(parse_cpuinfo_features("processor\t: 0\nBogoMIPS\t: 38.40\n").is_empty());
        assert!(parse_cpuinfo_features("Features\t:\n").is_empty());
    }

    #[test]
    fn test_vector_width_tiers() {
        let mut set = CpuFeatureSet {
            x86: X86Features::empty(),
            arm: ArmFeatures::empty(),
            arm64: Arm64Features::empty(),
            vendor: "Test".to_string(),
            model: "Test".to_string(),
        };
        assert!(set.is_baseline());
        assert_eq!(set.vector_width(), 8);

        set.arm64 = Arm64Features::FP | Arm64Features::ASIMD;
        assert_eq!(set.vector_width(), 16);

        set.x86 = X86Features::SSE2 | X86Features::AVX | X86Features::AVX2;
        assert_eq!(set.vector_width(), 32);
        assert!(!set.is_baseline());
    }
}
