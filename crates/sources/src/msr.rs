//! Register-based power and effective frequency source
//!
//! Power comes from the RAPL energy counters, sampled twice around a fixed
//! measurement window. Effective frequency comes from the undocumented
//! hardware P-state status register (same layout ZenStates uses).
//!
//! Register offsets: AMD OSRR for Family 17h, MSRC001_0299..029B.

use crate::cpuid::CpuIdentity;
use crate::topology::resolve_topology;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use zen_sens_core::{
    MetricCell, SensorDescriptor, SensorKind, SensorSource, SourceError, SourceMetadata,
    SourceResult, MEASUREMENT_WINDOW,
};
use zen_sens_types::{LabelStyle, SourcesConfig, TopologyEntry};

/// RAPL power unit register; energy status unit in bits 12:8
pub const MSR_RAPL_POWER_UNIT: u32 = 0xC001_0299;
/// Per-core energy counter
pub const MSR_CORE_ENERGY: u32 = 0xC001_029A;
/// Package energy counter
pub const MSR_PACKAGE_ENERGY: u32 = 0xC001_029B;
/// Current hardware P-state status (FID bits 7:0, FDID bits 13:8)
pub const MSR_HW_PSTATE_STATUS: u32 = 0xC001_0293;

/// Joules per energy counter tick: 0.5 ^ unit field
pub fn energy_unit(raw: u64) -> f64 {
    0.5f64.powi(((raw >> 8) & 0x1F) as i32)
}

/// Average power over the window, or `None` if the counter went backwards
pub fn energy_delta_power(before: u64, after: u64, unit: f64, window: Duration) -> Option<f32> {
    if after < before {
        return None;
    }
    Some(((after - before) as f64 * unit / window.as_secs_f64()) as f32)
}

/// Effective core frequency in GHz: FID / FDID * 200 MHz
pub fn effective_frequency_ghz(raw: u64) -> Option<f32> {
    let fid = (raw & 0xFF) as f64;
    let fdid = ((raw >> 8) & 0x3F) as f64;
    if fdid == 0.0 {
        return None;
    }
    Some((fid / fdid * 0.2) as f32)
}

/// An open handle that reads 64-bit registers of one logical CPU
pub trait RegisterDevice: Send {
    fn read(&self, register: u32) -> io::Result<u64>;
}

/// Opens register devices by logical CPU id
pub trait RegisterBackend: Send {
    fn open(&self, logical_cpu: u32) -> io::Result<Box<dyn RegisterDevice>>;

    /// Path shown in errors and hints
    fn device_path(&self, logical_cpu: u32) -> PathBuf;
}

/// `/dev/cpu/N/msr` file, read with positioned 8-byte reads
pub struct MsrFile {
    file: File,
}

impl RegisterDevice for MsrFile {
    fn read(&self, register: u32) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.file.read_exact_at(&mut buf, register as u64)?;
        Ok(u64::from_le_bytes(buf))
    }
}

/// The kernel msr driver's device tree
pub struct DevCpuMsr {
    root: PathBuf,
}

impl DevCpuMsr {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl RegisterBackend for DevCpuMsr {
    fn open(&self, logical_cpu: u32) -> io::Result<Box<dyn RegisterDevice>> {
        let file = File::open(self.device_path(logical_cpu))?;
        Ok(Box::new(MsrFile { file }))
    }

    fn device_path(&self, logical_cpu: u32) -> PathBuf {
        self.root.join(logical_cpu.to_string()).join("msr")
    }
}

/// Differential sampling state of one energy counter
struct EnergyState {
    counter_before: u64,
    counter_after: u64,
    power: Arc<MetricCell>,
}

impl EnergyState {
    fn new() -> Self {
        Self {
            counter_before: 0,
            counter_after: 0,
            power: MetricCell::shared(),
        }
    }

    fn apply(&mut self, before: Option<u64>, after: Option<u64>, unit: f64, window: Duration) {
        let (Some(before), Some(after)) = (before, after) else {
            self.power.mark_unavailable();
            return;
        };
        self.counter_before = before;
        self.counter_after = after;

        match energy_delta_power(self.counter_before, self.counter_after, unit, window) {
            Some(power) => self.power.record(power),
            None => log::debug!(
                "Energy counter went backwards ({} -> {}), keeping previous value",
                self.counter_before,
                self.counter_after
            ),
        }
    }
}

/// One physical core's register handle and metrics
struct CoreChannel {
    entry: TopologyEntry,
    device: Option<Box<dyn RegisterDevice>>,
    energy: EnergyState,
    frequency: Arc<MetricCell>,
}

impl CoreChannel {
    fn read(&self, register: u32) -> Option<u64> {
        let device = self.device.as_ref()?;
        match device.read(register) {
            Ok(value) => Some(value),
            Err(e) => {
                log::trace!(
                    "cpu{}: register {:#x} read failed: {}",
                    self.entry.logical_cpu_id,
                    register,
                    e
                );
                None
            }
        }
    }
}

/// Power and effective frequency from model-specific registers
pub struct MsrSource {
    metadata: SourceMetadata,
    identity: CpuIdentity,
    cpu_devices: PathBuf,
    label_style: LabelStyle,
    backend: Box<dyn RegisterBackend>,
    window: Duration,
    energy_unit: f64,
    package: EnergyState,
    package_core: usize,
    cores: Vec<CoreChannel>,
}

impl MsrSource {
    pub fn new(identity: CpuIdentity, config: &SourcesConfig) -> Self {
        let backend = Box::new(DevCpuMsr::new(&config.paths.msr_devices));
        Self::with_backend(identity, config, backend)
    }

    pub fn with_backend(
        identity: CpuIdentity,
        config: &SourcesConfig,
        backend: Box<dyn RegisterBackend>,
    ) -> Self {
        Self {
            metadata: SourceMetadata {
                id: "msr".to_string(),
                name: "Model-Specific Registers".to_string(),
                description: "Package/core power from RAPL energy counters and effective frequency"
                    .to_string(),
                update_cost: MEASUREMENT_WINDOW,
            },
            identity,
            cpu_devices: config.paths.cpu_devices.clone(),
            label_style: config.label_style,
            backend,
            window: MEASUREMENT_WINDOW,
            energy_unit: 0.0,
            package: EnergyState::new(),
            package_core: 0,
            cores: Vec::new(),
        }
    }

    /// Override the sampling window (tests use a short one)
    pub fn with_measurement_window(mut self, window: Duration) -> Self {
        self.window = window;
        self.metadata.update_cost = window;
        self
    }

    pub fn energy_unit(&self) -> f64 {
        self.energy_unit
    }

    fn package_counter(&self) -> Option<u64> {
        self.cores
            .get(self.package_core)
            .and_then(|core| core.read(MSR_PACKAGE_ENERGY))
    }

    fn core_label(&self, entry: &TopologyEntry) -> u32 {
        self.label_style.core_number(entry)
    }
}

impl SensorSource for MsrSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    fn init(&mut self) -> SourceResult<()> {
        let core_count = self.identity.require_zen()? as usize;
        let topology = resolve_topology(&self.cpu_devices, core_count);

        log::warn!("=== Opening MSR devices for {} cores ===", topology.len());
        let mut first_error = None;
        let mut cores = Vec::with_capacity(topology.len());
        for entry in topology {
            let device = match self.backend.open(entry.logical_cpu_id) {
                Ok(device) => Some(device),
                Err(e) => {
                    log::warn!(
                        "  Cannot open {}: {}",
                        self.backend.device_path(entry.logical_cpu_id).display(),
                        e
                    );
                    first_error.get_or_insert((entry.logical_cpu_id, e));
                    None
                }
            };
            cores.push(CoreChannel {
                entry,
                device,
                energy: EnergyState::new(),
                frequency: MetricCell::shared(),
            });
        }

        let first_open = cores
            .iter()
            .enumerate()
            .find_map(|(index, core)| core.device.as_ref().map(|device| (index, device)));
        let Some((package_core, device)) = first_open else {
            let (cpu, source) = first_error
                .unwrap_or_else(|| (0, io::Error::new(io::ErrorKind::NotFound, "no cores")));
            return Err(SourceError::DeviceOpen {
                path: self.backend.device_path(cpu),
                source,
            });
        };

        let unit_raw = device
            .read(MSR_RAPL_POWER_UNIT)
            .map_err(|source| SourceError::RegisterRead {
                register: MSR_RAPL_POWER_UNIT,
                source,
            })?;

        self.energy_unit = energy_unit(unit_raw);
        self.package_core = package_core;
        self.cores = cores;
        log::info!("  Energy unit: {:.9} J", self.energy_unit);

        // Seed min/max from a first sample
        self.update();
        Ok(())
    }

    fn sensors(&self) -> Vec<SensorDescriptor> {
        let mut sensors = Vec::with_capacity(self.cores.len() * 2 + 1);

        let package_cpu = self
            .cores
            .get(self.package_core)
            .map(|c| c.entry.logical_cpu_id)
            .unwrap_or(0);
        sensors.push(SensorDescriptor::new(
            "Package Power",
            format!(
                "Package power derived from the RAPL energy counter\nSource: cpu{} MSR",
                package_cpu
            ),
            SensorKind::Power,
            self.package.power.clone(),
        ));

        for core in &self.cores {
            sensors.push(SensorDescriptor::new(
                format!("Core {} Power", self.core_label(&core.entry)),
                format!(
                    "Core power derived from the RAPL energy counter\nSource: cpu{} MSR",
                    core.entry.logical_cpu_id
                ),
                SensorKind::Power,
                core.energy.power.clone(),
            ));
        }

        for core in &self.cores {
            sensors.push(SensorDescriptor::new(
                format!("Core {} Effective Frequency", self.core_label(&core.entry)),
                format!(
                    "Frequency computed from the current P-state FID/FDID ratio\nSource: cpu{} MSR",
                    core.entry.logical_cpu_id
                ),
                SensorKind::Frequency,
                core.frequency.clone(),
            ));
        }

        sensors
    }

    fn update(&mut self) {
        let package_before = self.package_counter();
        let cores_before: Vec<Option<u64>> =
            self.cores.iter().map(|c| c.read(MSR_CORE_ENERGY)).collect();

        thread::sleep(self.window);

        let package_after = self.package_counter();
        let cores_after: Vec<Option<u64>> =
            self.cores.iter().map(|c| c.read(MSR_CORE_ENERGY)).collect();

        let (unit, window) = (self.energy_unit, self.window);
        self.package.apply(package_before, package_after, unit, window);

        for ((core, before), after) in self.cores.iter_mut().zip(cores_before).zip(cores_after) {
            // A core whose device never opened keeps its sentinel
            if core.device.is_none() {
                continue;
            }
            core.energy.apply(before, after, unit, window);

            match core.read(MSR_HW_PSTATE_STATUS).and_then(effective_frequency_ghz) {
                Some(ghz) => core.frequency.record(ghz),
                None => core.frequency.mark_unavailable(),
            }
        }
    }

    fn clear_min_max(&mut self) {
        self.package.power.clear_min_max();
        for core in &self.cores {
            core.energy.power.clear_min_max();
            core.frequency.clear_min_max();
        }
    }
}
