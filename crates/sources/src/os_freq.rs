//! Per-core frequency as reported by the cpufreq subsystem

use crate::cpuid::CpuIdentity;
use crate::topology::resolve_topology;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use zen_sens_core::{
    MetricCell, SensorDescriptor, SensorKind, SensorSource, SourceError, SourceMetadata,
    SourceResult,
};
use zen_sens_types::{LabelStyle, SourcesConfig, TopologyEntry};

const KHZ_PER_GHZ: f64 = 1_000_000.0;

/// `scaling_cur_freq` of one logical CPU
pub fn frequency_file(cpu_devices: &Path, logical_cpu: u32) -> PathBuf {
    cpu_devices
        .join(format!("cpu{}", logical_cpu))
        .join("cpufreq")
        .join("scaling_cur_freq")
}

/// Parse a kHz reading into GHz
pub fn parse_khz(text: &str) -> Option<f32> {
    let khz: u64 = text.trim().parse().ok()?;
    Some((khz as f64 / KHZ_PER_GHZ) as f32)
}

struct CoreFrequency {
    entry: TopologyEntry,
    path: PathBuf,
    cell: Arc<MetricCell>,
}

/// OS-reported current frequency of every physical core
pub struct OsFrequencySource {
    metadata: SourceMetadata,
    identity: CpuIdentity,
    cpu_devices: PathBuf,
    label_style: LabelStyle,
    cores: Vec<CoreFrequency>,
}

impl OsFrequencySource {
    pub fn new(identity: CpuIdentity, config: &SourcesConfig) -> Self {
        Self {
            metadata: SourceMetadata {
                id: "os".to_string(),
                name: "OS".to_string(),
                description: "Current core frequency from cpufreq".to_string(),
                update_cost: Duration::from_millis(1),
            },
            identity,
            cpu_devices: config.paths.cpu_devices.clone(),
            label_style: config.label_style,
            cores: Vec::new(),
        }
    }
}

impl SensorSource for OsFrequencySource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    fn init(&mut self) -> SourceResult<()> {
        let core_count = self.identity.require_zen()? as usize;
        let topology = resolve_topology(&self.cpu_devices, core_count);

        let cores: Vec<CoreFrequency> = topology
            .into_iter()
            .map(|entry| CoreFrequency {
                path: frequency_file(&self.cpu_devices, entry.logical_cpu_id),
                entry,
                cell: MetricCell::shared(),
            })
            .collect();

        if !cores.iter().any(|core| core.path.is_file()) {
            let path = cores
                .first()
                .map(|core| core.path.clone())
                .unwrap_or_else(|| frequency_file(&self.cpu_devices, 0));
            return Err(SourceError::Io {
                path,
                source: io::Error::new(io::ErrorKind::NotFound, "cpufreq not available"),
            });
        }

        self.cores = cores;
        self.update();
        Ok(())
    }

    fn sensors(&self) -> Vec<SensorDescriptor> {
        self.cores
            .iter()
            .map(|core| {
                SensorDescriptor::new(
                    format!("Core {} Frequency", self.label_style.core_number(&core.entry)),
                    format!(
                        "Current frequency reported by the cpufreq driver\n\
                         Source: cpu{} scaling_cur_freq",
                        core.entry.logical_cpu_id
                    ),
                    SensorKind::Frequency,
                    core.cell.clone(),
                )
            })
            .collect()
    }

    fn update(&mut self) {
        for core in &self.cores {
            let value = fs::read_to_string(&core.path)
                .ok()
                .and_then(|text| parse_khz(&text));
            match value {
                Some(ghz) => core.cell.record(ghz),
                None => core.cell.mark_unavailable(),
            }
        }
    }

    fn clear_min_max(&mut self) {
        for core in &self.cores {
            core.cell.clear_min_max();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpuid::testing::zen_identity;
    use crate::topology::testing::add_cpu;
    use tempfile::TempDir;
    use zen_sens_types::{is_unavailable, SENSOR_UNAVAILABLE};

    fn set_freq(root: &Path, cpu: u32, khz: &str) {
        let path = frequency_file(root, cpu);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("{}\n", khz)).unwrap();
    }

    fn source_for(root: &Path, style: LabelStyle) -> OsFrequencySource {
        let mut config = SourcesConfig::default();
        config.paths.cpu_devices = root.to_path_buf();
        config.label_style = style;
        OsFrequencySource::new(zen_identity(4, 2), &config)
    }

    fn smt_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        add_cpu(tmp.path(), 0, 0, "0,2");
        add_cpu(tmp.path(), 1, 8, "1,3");
        add_cpu(tmp.path(), 2, 0, "0,2");
        add_cpu(tmp.path(), 3, 8, "1,3");
        tmp
    }

    #[test]
    fn test_parse_khz() {
        assert_eq!(parse_khz("3400000\n"), Some(3.4));
        assert_eq!(parse_khz("550000"), Some(0.55));
        assert_eq!(parse_khz(""), None);
        assert_eq!(parse_khz("-1"), None);
    }

    #[test]
    fn test_reads_representative_threads() {
        let tmp = smt_tree();
        set_freq(tmp.path(), 0, "3400000");
        set_freq(tmp.path(), 1, "2200000");
        // Sibling threads are never read
        set_freq(tmp.path(), 2, "9900000");

        let mut source = source_for(tmp.path(), LabelStyle::CoreIndex);
        source.init().unwrap();
        let sensors = source.sensors();

        let labels: Vec<&str> = sensors.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["Core 0 Frequency", "Core 1 Frequency"]);
        assert_eq!(sensors[0].value(), 3.4);
        assert_eq!(sensors[1].value(), 2.2);
        assert!(sensors[1].hint().ends_with("Source: cpu1 scaling_cur_freq"));
        assert_eq!(sensors[0].formatted_value(), "   3.400 GHz");
    }

    #[test]
    fn test_core_id_label_style() {
        let tmp = smt_tree();
        set_freq(tmp.path(), 0, "3400000");
        set_freq(tmp.path(), 1, "2200000");

        let mut source = source_for(tmp.path(), LabelStyle::CoreId);
        source.init().unwrap();
        assert_eq!(source.sensors()[1].label(), "Core 8 Frequency");
    }

    #[test]
    fn test_no_cpufreq_fails_init() {
        let tmp = smt_tree();
        let mut source = source_for(tmp.path(), LabelStyle::CoreIndex);
        assert!(matches!(source.init(), Err(SourceError::Io { .. })));
    }

    #[test]
    fn test_missing_core_reports_sentinel() {
        let tmp = smt_tree();
        set_freq(tmp.path(), 0, "3000000");

        let mut source = source_for(tmp.path(), LabelStyle::CoreIndex);
        source.init().unwrap();
        let sensors = source.sensors();
        assert_eq!(sensors[0].value(), 3.0);
        assert!(is_unavailable(sensors[1].value()));

        set_freq(tmp.path(), 0, "garbage");
        source.update();
        assert_eq!(sensors[0].value(), SENSOR_UNAVAILABLE);
        assert_eq!(sensors[0].min(), 3.0);
        assert_eq!(sensors[0].max(), 3.0);
    }

    #[test]
    fn test_min_max_tracking_and_clear() {
        let tmp = smt_tree();
        set_freq(tmp.path(), 0, "2000000");
        set_freq(tmp.path(), 1, "2000000");

        let mut source = source_for(tmp.path(), LabelStyle::CoreIndex);
        source.init().unwrap();
        let sensors = source.sensors();

        for khz in ["3600000", "1400000", "2800000"] {
            set_freq(tmp.path(), 0, khz);
            source.update();
        }
        assert_eq!(sensors[0].min(), 1.4);
        assert_eq!(sensors[0].max(), 3.6);

        source.clear_min_max();
        for sensor in &sensors {
            assert_eq!(sensor.min(), sensor.value());
            assert_eq!(sensor.max(), sensor.value());
        }
    }

    #[test]
    fn test_non_zen_is_rejected() {
        let tmp = smt_tree();
        set_freq(tmp.path(), 0, "3000000");
        let mut config = SourcesConfig::default();
        config.paths.cpu_devices = tmp.path().to_path_buf();
        let mut source = OsFrequencySource::new(zen_identity(0, 1), &config);
        assert!(source.init().is_err());
        assert!(source.sensors().is_empty());
    }
}
