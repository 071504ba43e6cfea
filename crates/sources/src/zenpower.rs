//! zenpower hwmon driver reader
//!
//! The zenpower kernel module exposes SVI2 telemetry and die temperatures
//! through the hwmon class. Multi-socket systems get one driver instance per
//! node; every instance is probed for the subset of catalog files its driver
//! version provides.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use zen_sens_core::{
    MetricCell, SensorDescriptor, SensorKind, SensorSource, SourceError, SourceMetadata,
    SourceResult,
};
use zen_sens_types::SourcesConfig;

/// One known hwmon metric file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HwmonMetric {
    pub label: &'static str,
    pub hint: &'static str,
    pub file: &'static str,
    pub divisor: f64,
    pub kind: SensorKind,
}

const fn metric(
    label: &'static str,
    hint: &'static str,
    file: &'static str,
    divisor: f64,
    kind: SensorKind,
) -> HwmonMetric {
    HwmonMetric {
        label,
        hint,
        file,
        divisor,
        kind,
    }
}

const CCD_HINT: &str = "Temperature of a core complex die";

/// Probe order is display order
pub static HWMON_CATALOG: [HwmonMetric; 16] = [
    metric(
        "CPU Temperature (tDie)",
        "Die temperature reported by the SMU",
        "temp1_input",
        1000.0,
        SensorKind::Temperature,
    ),
    metric(
        "CPU Temperature (tCtl)",
        "Control temperature used for fan curves; may carry an offset over tDie",
        "temp2_input",
        1000.0,
        SensorKind::Temperature,
    ),
    metric("CPU CCD1 Temperature", CCD_HINT, "temp3_input", 1000.0, SensorKind::Temperature),
    metric("CPU CCD2 Temperature", CCD_HINT, "temp4_input", 1000.0, SensorKind::Temperature),
    metric("CPU CCD3 Temperature", CCD_HINT, "temp5_input", 1000.0, SensorKind::Temperature),
    metric("CPU CCD4 Temperature", CCD_HINT, "temp6_input", 1000.0, SensorKind::Temperature),
    metric("CPU CCD5 Temperature", CCD_HINT, "temp7_input", 1000.0, SensorKind::Temperature),
    metric("CPU CCD6 Temperature", CCD_HINT, "temp8_input", 1000.0, SensorKind::Temperature),
    metric("CPU CCD7 Temperature", CCD_HINT, "temp9_input", 1000.0, SensorKind::Temperature),
    metric("CPU CCD8 Temperature", CCD_HINT, "temp10_input", 1000.0, SensorKind::Temperature),
    metric(
        "CPU Core Voltage (SVI2)",
        "Core voltage reported by the SVI2 telemetry plane",
        "in1_input",
        1000.0,
        SensorKind::Voltage,
    ),
    metric(
        "SOC Voltage (SVI2)",
        "SoC voltage reported by the SVI2 telemetry plane",
        "in2_input",
        1000.0,
        SensorKind::Voltage,
    ),
    metric(
        "CPU Core Current (SVI2)",
        "Core current reported by the SVI2 telemetry plane",
        "curr1_input",
        1000.0,
        SensorKind::Current,
    ),
    metric(
        "SOC Current (SVI2)",
        "SoC current reported by the SVI2 telemetry plane",
        "curr2_input",
        1000.0,
        SensorKind::Current,
    ),
    metric(
        "CPU Core Power (SVI2)",
        "Core power computed from SVI2 voltage and current",
        "power1_input",
        1_000_000.0,
        SensorKind::Power,
    ),
    metric(
        "SOC Power (SVI2)",
        "SoC power computed from SVI2 voltage and current",
        "power2_input",
        1_000_000.0,
        SensorKind::Power,
    ),
];

/// A catalog metric found on one driver instance
pub struct HwmonSensorInstance {
    metric: &'static HwmonMetric,
    directory: PathBuf,
    node: usize,
    cell: Arc<MetricCell>,
}

impl HwmonSensorInstance {
    pub fn metric(&self) -> &'static HwmonMetric {
        self.metric
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn node(&self) -> usize {
        self.node
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(self.metric.file)
    }

    fn read(&self) -> Option<f32> {
        let path = self.path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                log::trace!("{}: {}", path.display(), e);
                return None;
            }
        };
        let raw: f64 = text.trim().parse().ok()?;
        Some((raw / self.metric.divisor) as f32)
    }
}

/// Trailing number of an `hwmonN` entry, for natural ordering
fn hwmon_index(name: &str) -> Option<u32> {
    name.strip_prefix("hwmon")?.parse().ok()
}

/// Driver instances under `root` whose `name` matches `driver`
///
/// Entries are visited in natural order (`hwmon2` before `hwmon10`). Two
/// entries resolving to the same device directory count once.
pub fn find_driver_instances(root: &Path, driver: &str) -> Vec<PathBuf> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list {}: {}", root.display(), e);
            return Vec::new();
        }
    };

    let mut candidates: Vec<(Option<u32>, String, PathBuf)> = entries
        .flatten()
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            (hwmon_index(&name), name, entry.path())
        })
        .collect();
    // Numbered entries first, in numeric order, then the rest by name
    candidates.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    });

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut found = Vec::new();
    for (_, name, path) in candidates {
        let Ok(driver_name) = fs::read_to_string(path.join("name")) else {
            continue;
        };
        if driver_name.trim_end() != driver {
            log::trace!("{}: driver {:?}, skipping", name, driver_name.trim_end());
            continue;
        }
        let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if !seen.insert(canonical) {
            log::debug!("{}: duplicate of an earlier {} instance", name, driver);
            continue;
        }
        found.push(path);
    }
    found
}

/// Temperatures and SVI2 telemetry from the zenpower hwmon driver
pub struct ZenpowerSource {
    metadata: SourceMetadata,
    driver: String,
    hwmon_root: PathBuf,
    nodes: usize,
    instances: Vec<HwmonSensorInstance>,
}

impl ZenpowerSource {
    pub fn new(config: &SourcesConfig) -> Self {
        Self {
            metadata: SourceMetadata {
                id: config.hwmon_driver.clone(),
                name: "zenpower".to_string(),
                description: "Sensor readings from the zenpower hwmon driver".to_string(),
                update_cost: Duration::from_millis(1),
            },
            driver: config.hwmon_driver.clone(),
            hwmon_root: config.paths.hwmon.clone(),
            nodes: 0,
            instances: Vec::new(),
        }
    }

    pub fn instances(&self) -> &[HwmonSensorInstance] {
        &self.instances
    }

    pub fn node_count(&self) -> usize {
        self.nodes
    }

    fn label(&self, instance: &HwmonSensorInstance) -> String {
        if self.nodes > 1 {
            format!("Node {} - {}", instance.node, instance.metric.label)
        } else {
            instance.metric.label.to_string()
        }
    }

    fn hint(&self, instance: &HwmonSensorInstance) -> String {
        let dir = instance
            .directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "{}\nSource: {} {} {}",
            instance.metric.hint, self.driver, dir, instance.metric.file
        )
    }
}

impl SensorSource for ZenpowerSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    fn init(&mut self) -> SourceResult<()> {
        log::warn!(
            "=== Scanning {} for {} ===",
            self.hwmon_root.display(),
            self.driver
        );
        let directories = find_driver_instances(&self.hwmon_root, &self.driver);
        if directories.is_empty() {
            return Err(SourceError::DriverNotFound {
                driver: self.driver.clone(),
            });
        }

        let mut instances = Vec::new();
        for (node, directory) in directories.iter().enumerate() {
            let before = instances.len();
            for metric in HWMON_CATALOG.iter() {
                if directory.join(metric.file).is_file() {
                    instances.push(HwmonSensorInstance {
                        metric,
                        directory: directory.clone(),
                        node,
                        cell: MetricCell::shared(),
                    });
                }
            }
            log::info!(
                "  [node {}] {}: {} metrics",
                node,
                directory.display(),
                instances.len() - before
            );
        }

        self.nodes = directories.len();
        self.instances = instances;
        if self.instances.is_empty() {
            return Err(SourceError::NoSensors);
        }

        self.update();
        Ok(())
    }

    fn sensors(&self) -> Vec<SensorDescriptor> {
        self.instances
            .iter()
            .map(|instance| {
                SensorDescriptor::new(
                    self.label(instance),
                    self.hint(instance),
                    instance.metric.kind,
                    instance.cell.clone(),
                )
            })
            .collect()
    }

    fn update(&mut self) {
        for instance in &self.instances {
            match instance.read() {
                Some(value) => instance.cell.record(value),
                None => instance.cell.mark_unavailable(),
            }
        }
    }

    fn clear_min_max(&mut self) {
        for instance in &self.instances {
            instance.cell.clear_min_max();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zen_sens_types::SENSOR_UNAVAILABLE;

    fn add_instance(root: &Path, entry: &str, driver: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = root.join(entry);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{}\n", driver)).unwrap();
        for (file, value) in files {
            fs::write(dir.join(file), format!("{}\n", value)).unwrap();
        }
        dir
    }

    fn all_files() -> Vec<(&'static str, &'static str)> {
        HWMON_CATALOG.iter().map(|m| (m.file, "1000")).collect()
    }

    fn source_for(root: &Path) -> ZenpowerSource {
        let mut config = SourcesConfig::default();
        config.paths.hwmon = root.to_path_buf();
        ZenpowerSource::new(&config)
    }

    #[test]
    fn test_two_nodes_one_foreign_driver() {
        let tmp = TempDir::new().unwrap();
        add_instance(tmp.path(), "hwmon0", "k10temp", &[("temp1_input", "40000")]);
        add_instance(
            tmp.path(),
            "hwmon1",
            "zenpower",
            &[
                ("temp1_input", "45500"),
                ("in1_input", "1200"),
                ("curr1_input", "20000"),
                ("power1_input", "24000000"),
            ],
        );
        add_instance(tmp.path(), "hwmon2", "zenpower", &all_files());

        let mut source = source_for(tmp.path());
        source.init().unwrap();

        assert_eq!(source.node_count(), 2);
        let instances = source.instances();
        assert_eq!(instances.len(), 4 + HWMON_CATALOG.len());
        assert!(instances[..4].iter().all(|i| i.node() == 0));
        assert!(instances[4..].iter().all(|i| i.node() == 1));
        assert!(instances[..4].iter().all(|i| i.directory().ends_with("hwmon1")));

        let sensors = source.sensors();
        assert_eq!(sensors[0].label(), "Node 0 - CPU Temperature (tDie)");
        assert_eq!(sensors[1].label(), "Node 0 - CPU Core Voltage (SVI2)");
        assert_eq!(sensors[4].label(), "Node 1 - CPU Temperature (tDie)");
        assert!(sensors[0].hint().ends_with("Source: zenpower hwmon1 temp1_input"));
    }

    #[test]
    fn test_values_are_scaled() {
        let tmp = TempDir::new().unwrap();
        add_instance(
            tmp.path(),
            "hwmon3",
            "zenpower",
            &[
                ("temp2_input", "45500"),
                ("in2_input", "1100"),
                ("power2_input", "12500000"),
            ],
        );

        let mut source = source_for(tmp.path());
        source.init().unwrap();
        let sensors = source.sensors();

        let labels: Vec<&str> = sensors.iter().map(|s| s.label()).collect();
        assert_eq!(
            labels,
            vec!["CPU Temperature (tCtl)", "SOC Voltage (SVI2)", "SOC Power (SVI2)"]
        );
        assert_eq!(sensors[0].value(), 45.5);
        assert_eq!(sensors[1].value(), 1.1);
        assert_eq!(sensors[2].value(), 12.5);
        assert_eq!(sensors[2].formatted_value(), "  12.500 W");
        assert_eq!(sensors[0].min(), 45.5);
        assert_eq!(sensors[0].max(), 45.5);
    }

    #[test]
    fn test_read_failure_reports_sentinel() {
        let tmp = TempDir::new().unwrap();
        let dir = add_instance(
            tmp.path(),
            "hwmon0",
            "zenpower",
            &[("temp1_input", "50000"), ("in1_input", "1350")],
        );

        let mut source = source_for(tmp.path());
        source.init().unwrap();
        let sensors = source.sensors();

        fs::write(dir.join("temp1_input"), "60000").unwrap();
        source.update();
        assert_eq!(sensors[0].max(), 60.0);

        fs::remove_file(dir.join("temp1_input")).unwrap();
        fs::write(dir.join("in1_input"), "garbage").unwrap();
        source.update();
        assert_eq!(sensors[0].value(), SENSOR_UNAVAILABLE);
        assert_eq!(sensors[0].min(), 50.0);
        assert_eq!(sensors[0].max(), 60.0);
        assert_eq!(sensors[1].value(), SENSOR_UNAVAILABLE);
        assert_eq!(sensors[1].min(), 1.35);

        fs::write(dir.join("temp1_input"), "55000").unwrap();
        source.update();
        assert_eq!(sensors[0].value(), 55.0);
    }

    #[test]
    fn test_single_node_labels_are_unprefixed() {
        let tmp = TempDir::new().unwrap();
        add_instance(tmp.path(), "hwmon5", "zenpower", &all_files());

        let mut source = source_for(tmp.path());
        source.init().unwrap();
        let labels: Vec<String> = source.sensors().iter().map(|s| s.label().to_string()).collect();
        let expected: Vec<String> = HWMON_CATALOG.iter().map(|m| m.label.to_string()).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn test_missing_driver() {
        let tmp = TempDir::new().unwrap();
        add_instance(tmp.path(), "hwmon0", "nct6775", &[("temp1_input", "30000")]);

        let mut source = source_for(tmp.path());
        assert!(matches!(source.init(), Err(SourceError::DriverNotFound { .. })));

        let mut missing = source_for(&tmp.path().join("nope"));
        assert!(missing.init().is_err());
    }

    #[test]
    fn test_driver_without_catalog_files() {
        let tmp = TempDir::new().unwrap();
        add_instance(tmp.path(), "hwmon0", "zenpower", &[("fan1_input", "900")]);

        let mut source = source_for(tmp.path());
        assert!(matches!(source.init(), Err(SourceError::NoSensors)));
    }

    #[test]
    fn test_natural_order_and_symlink_dedup() {
        let tmp = TempDir::new().unwrap();
        add_instance(tmp.path(), "hwmon10", "zenpower", &[("temp1_input", "1")]);
        add_instance(tmp.path(), "hwmon2", "zenpower", &[("temp1_input", "2")]);
        std::os::unix::fs::symlink(tmp.path().join("hwmon2"), tmp.path().join("hwmon3")).unwrap();

        let found = find_driver_instances(tmp.path(), "zenpower");
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("hwmon2"));
        assert!(found[1].ends_with("hwmon10"));
    }

    #[test]
    fn test_clear_min_max() {
        let tmp = TempDir::new().unwrap();
        let dir = add_instance(tmp.path(), "hwmon0", "zenpower", &[("power1_input", "10000000")]);

        let mut source = source_for(tmp.path());
        source.init().unwrap();
        fs::write(dir.join("power1_input"), "30000000").unwrap();
        source.update();
        fs::write(dir.join("power1_input"), "20000000").unwrap();
        source.update();

        let sensor = source.sensors().remove(0);
        assert_eq!((sensor.min(), sensor.max()), (10.0, 30.0));
        source.clear_min_max();
        assert_eq!(sensor.min(), 20.0);
        assert_eq!(sensor.max(), 20.0);
    }
}
