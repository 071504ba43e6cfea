//! CPU identification from CPUID leaves
//!
//! Decodes vendor, family, brand string and core counts. Leaf numbers and
//! bit fields follow the AMD Family 17h PPR (CPUID_Fn00000001,
//! CPUID_Fn80000002..4, CPUID_Fn8000001E).

use zen_sens_core::{SourceError, SourceResult};

pub const AMD_VENDOR: &str = "AuthenticAMD";
pub const ZEN_FAMILY: u32 = 0x17;

const LEAF_VENDOR: u32 = 0x0000_0000;
const LEAF_FEATURES: u32 = 0x0000_0001;
const LEAF_EXT_MAX: u32 = 0x8000_0000;
const LEAF_BRAND: [u32; 3] = [0x8000_0002, 0x8000_0003, 0x8000_0004];
const LEAF_EXT_TOPOLOGY: u32 = 0x8000_001E;

/// Register values returned by one CPUID leaf
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuidRegisters {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// Something that can execute CPUID
pub trait CpuidReader {
    fn read(&self, leaf: u32) -> CpuidRegisters;
}

/// Executes CPUID on the current processor
///
/// On non-x86 targets every leaf reads as zero, which fails the Zen gate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCpuid;

impl CpuidReader for NativeCpuid {
    #[cfg(target_arch = "x86_64")]
    #[allow(unused_unsafe)]
    fn read(&self, leaf: u32) -> CpuidRegisters {
        // SAFETY: CPUID is available on every x86_64 processor.
        let r = unsafe { std::arch::x86_64::__cpuid(leaf) };
        CpuidRegisters {
            eax: r.eax,
            ebx: r.ebx,
            ecx: r.ecx,
            edx: r.edx,
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn read(&self, _leaf: u32) -> CpuidRegisters {
        CpuidRegisters::default()
    }
}

/// Vendor string from leaf 0 (EBX, EDX, ECX order)
pub fn vendor_string(regs: &CpuidRegisters) -> String {
    let mut bytes = Vec::with_capacity(12);
    for word in [regs.ebx, regs.edx, regs.ecx] {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Base family plus extended family from leaf 1 EAX
pub fn extended_family(eax: u32) -> u32 {
    ((eax >> 8) & 0xF) + ((eax >> 20) & 0xFF)
}

/// Logical processor count from leaf 1 EBX[23:16]
pub fn logical_processor_count(ebx: u32) -> u32 {
    (ebx >> 16) & 0xFF
}

/// Threads per core from leaf 0x8000001E EBX[15:8], stored as count - 1
///
/// A field reading 0 therefore yields a divisor of 1.
pub fn threads_per_core(ebx: u32) -> u32 {
    ((ebx >> 8) & 0xFF) + 1
}

/// 48-byte brand string, cut at the first NUL and right-trimmed
pub fn brand_string(leaves: &[CpuidRegisters; 3]) -> String {
    let mut bytes = Vec::with_capacity(48);
    for regs in leaves {
        for word in [regs.eax, regs.ebx, regs.ecx, regs.edx] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
    }
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

/// Decoded identity of the running processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuIdentity {
    vendor: String,
    family: u32,
    model_name: String,
    logical_cpus: u32,
    threads_per_core: u32,
}

impl CpuIdentity {
    /// Identify the processor this process runs on
    pub fn detect() -> Self {
        Self::detect_with(&NativeCpuid)
    }

    pub fn detect_with(reader: &dyn CpuidReader) -> Self {
        let vendor_regs = reader.read(LEAF_VENDOR);
        let vendor = vendor_string(&vendor_regs);

        let (family, logical_cpus) = if vendor_regs.eax >= LEAF_FEATURES {
            let features = reader.read(LEAF_FEATURES);
            (
                extended_family(features.eax),
                logical_processor_count(features.ebx),
            )
        } else {
            (0, 0)
        };

        let max_ext = reader.read(LEAF_EXT_MAX).eax;
        let model_name = if max_ext >= LEAF_BRAND[2] {
            brand_string(&LEAF_BRAND.map(|leaf| reader.read(leaf)))
        } else {
            String::new()
        };
        let threads = if max_ext >= LEAF_EXT_TOPOLOGY {
            threads_per_core(reader.read(LEAF_EXT_TOPOLOGY).ebx)
        } else {
            1
        };

        let identity = Self {
            vendor,
            family,
            model_name,
            logical_cpus,
            threads_per_core: threads,
        };
        log::debug!("Detected CPU: {:?}", identity);
        identity
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn family(&self) -> u32 {
        self.family
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn logical_cpus(&self) -> u32 {
        self.logical_cpus
    }

    pub fn threads_per_core(&self) -> u32 {
        self.threads_per_core
    }

    /// Physical cores per package
    pub fn physical_cores(&self) -> u32 {
        self.logical_cpus / self.threads_per_core.max(1)
    }

    /// AMD processor of the Zen family (0x17)
    pub fn is_zen(&self) -> bool {
        self.vendor == AMD_VENDOR && self.family == ZEN_FAMILY
    }

    /// Gate shared by every source that reads Zen-specific interfaces
    pub fn require_zen(&self) -> SourceResult<u32> {
        if !self.is_zen() {
            return Err(SourceError::UnsupportedCpu {
                vendor: self.vendor.clone(),
                family: self.family,
            });
        }
        match self.physical_cores() {
            0 => Err(SourceError::NoCores),
            cores => Ok(cores),
        }
    }
}
