//! zen-sens-sources: Sensor source implementations for AMD Zen processors.

mod cpuid;
mod msr;
mod os_freq;
mod topology;
mod zenpower;

pub use cpuid::{
    brand_string, extended_family, logical_processor_count, threads_per_core, vendor_string,
    CpuIdentity, CpuidReader, CpuidRegisters, NativeCpuid, AMD_VENDOR, ZEN_FAMILY,
};
pub use msr::{
    effective_frequency_ghz, energy_delta_power, energy_unit, DevCpuMsr, MsrFile, MsrSource,
    RegisterBackend, RegisterDevice, MSR_CORE_ENERGY, MSR_HW_PSTATE_STATUS, MSR_PACKAGE_ENERGY,
    MSR_RAPL_POWER_UNIT,
};
pub use os_freq::{frequency_file, parse_khz, OsFrequencySource};
pub use topology::{parse_cpu_list, resolve_topology};
pub use zenpower::{
    find_driver_instances, HwmonMetric, HwmonSensorInstance, ZenpowerSource, HWMON_CATALOG,
};

use zen_sens_core::SensorRegistry;
use zen_sens_types::SourcesConfig;

/// Build the registry with every built-in source, in display order
///
/// The CPU is identified once and shared by the sources that depend on it.
/// Call `init_all` on the result to probe the hardware.
pub fn default_registry(config: &SourcesConfig) -> SensorRegistry {
    default_registry_for(CpuIdentity::detect(), config)
}

/// Same as [`default_registry`] with an already detected CPU
pub fn default_registry_for(identity: CpuIdentity, config: &SourcesConfig) -> SensorRegistry {
    let mut registry = SensorRegistry::new();
    registry.register(Box::new(ZenpowerSource::new(config)));
    registry.register(Box::new(MsrSource::new(identity.clone(), config)));
    registry.register(Box::new(OsFrequencySource::new(identity, config)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpuid::testing::zen_identity;
    use crate::topology::testing::add_cpu;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_registry_order() {
        let registry = default_registry_for(zen_identity(16, 2), &SourcesConfig::default());
        let ids: Vec<&str> = registry.sources().iter().map(|s| s.driver_name()).collect();
        assert_eq!(ids, vec!["zenpower", "msr", "os"]);
    }

    #[test]
    fn test_registry_over_synthetic_system() {
        let tmp = TempDir::new().unwrap();
        let cpus = tmp.path().join("cpu");
        let hwmon = tmp.path().join("hwmon");
        for cpu in 0..2 {
            add_cpu(&cpus, cpu, cpu, &cpu.to_string());
            let freq = frequency_file(&cpus, cpu);
            fs::create_dir_all(freq.parent().unwrap()).unwrap();
            fs::write(freq, "3000000").unwrap();
        }
        fs::create_dir_all(hwmon.join("hwmon0")).unwrap();
        fs::write(hwmon.join("hwmon0/name"), "zenpower\n").unwrap();
        fs::write(hwmon.join("hwmon0/temp1_input"), "41000").unwrap();

        let mut config = SourcesConfig::default();
        config.paths.cpu_devices = cpus;
        config.paths.hwmon = hwmon;
        // No msr device tree: that source stays disabled
        config.paths.msr_devices = tmp.path().join("dev-cpu");

        let mut registry = default_registry_for(zen_identity(2, 1), &config);
        assert_eq!(registry.init_all(), 2);
        assert!(!registry.sources()[1].is_enabled());

        let labels: Vec<&str> = registry.sensors().map(|s| s.label()).collect();
        assert_eq!(
            labels,
            vec!["CPU Temperature (tDie)", "Core 0 Frequency", "Core 1 Frequency"]
        );

        registry.update_all();
        registry.clear_all_min_max();
        for sensor in registry.sensors() {
            assert_eq!(sensor.min(), sensor.value());
        }
    }
}
