//! Source configuration types shared by all sensor sources.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::topology::TopologyEntry;

fn default_hwmon_driver() -> String {
    "zenpower".to_string()
}

fn default_cpu_devices() -> PathBuf {
    PathBuf::from("/sys/bus/cpu/devices")
}

fn default_hwmon() -> PathBuf {
    PathBuf::from("/sys/class/hwmon")
}

fn default_msr_devices() -> PathBuf {
    PathBuf::from("/dev/cpu")
}

/// How per-core sensors are numbered in their labels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LabelStyle {
    /// Position in the topology table ("Core 0", "Core 1", ...)
    #[serde(rename = "core_index")]
    #[default]
    CoreIndex,
    /// OS-reported core id, which may skip values
    #[serde(rename = "core_id")]
    CoreId,
}

impl LabelStyle {
    /// Number shown in a per-core label for the given topology entry
    pub fn core_number(&self, entry: &TopologyEntry) -> u32 {
        match self {
            LabelStyle::CoreIndex => entry.physical_core_index as u32,
            LabelStyle::CoreId => entry.core_id,
        }
    }
}

/// Filesystem roots the sources read from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemPaths {
    /// Per-logical-CPU device tree (`cpuN/topology`, `cpuN/cpufreq`)
    #[serde(default = "default_cpu_devices")]
    pub cpu_devices: PathBuf,
    /// Hardware monitoring class directory
    #[serde(default = "default_hwmon")]
    pub hwmon: PathBuf,
    /// Register access device root (`N/msr`)
    #[serde(default = "default_msr_devices")]
    pub msr_devices: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self {
            cpu_devices: default_cpu_devices(),
            hwmon: default_hwmon(),
            msr_devices: default_msr_devices(),
        }
    }
}

/// Configuration for the sensor sources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourcesConfig {
    /// Name reported by the target hwmon driver's `name` file
    #[serde(default = "default_hwmon_driver")]
    pub hwmon_driver: String,
    #[serde(default)]
    pub label_style: LabelStyle,
    #[serde(default)]
    pub paths: SystemPaths,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            hwmon_driver: default_hwmon_driver(),
            label_style: LabelStyle::default(),
            paths: SystemPaths::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SourcesConfig =
            serde_json::from_str(r#"{"label_style":"core_id","paths":{"hwmon":"/tmp/hw"}}"#)
                .unwrap();
        assert_eq!(config.hwmon_driver, "zenpower");
        assert_eq!(config.label_style, LabelStyle::CoreId);
        assert_eq!(config.paths.hwmon, PathBuf::from("/tmp/hw"));
        assert_eq!(config.paths.msr_devices, PathBuf::from("/dev/cpu"));
    }

    #[test]
    fn test_label_style_core_number() {
        let entry = TopologyEntry {
            physical_core_index: 3,
            core_id: 8,
            logical_cpu_id: 6,
        };
        assert_eq!(LabelStyle::CoreIndex.core_number(&entry), 3);
        assert_eq!(LabelStyle::CoreId.core_number(&entry), 8);
    }
}
