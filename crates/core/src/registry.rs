//! Registry of sensor sources

use crate::descriptor::SensorDescriptor;
use crate::error::SourceError;
use crate::sensor_source::{BoxedSensorSource, SourceMetadata};
use std::time::Duration;

/// A registered source together with its lifecycle state
pub struct SourceEntry {
    source: BoxedSensorSource,
    enabled: bool,
    sensors: Vec<SensorDescriptor>,
    init_error: Option<SourceError>,
}

impl SourceEntry {
    pub fn driver_name(&self) -> &str {
        &self.source.metadata().id
    }

    pub fn metadata(&self) -> &SourceMetadata {
        self.source.metadata()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Descriptors discovered at init; empty while disabled
    pub fn sensors(&self) -> &[SensorDescriptor] {
        &self.sensors
    }

    /// Reason this source was left disabled, if init failed
    pub fn init_error(&self) -> Option<&SourceError> {
        self.init_error.as_ref()
    }
}

/// Ordered list of sensor sources driven as one unit
///
/// Order of registration is display order. The registry does not own a
/// timer: callers invoke `update_all` on their own cadence, and each call
/// runs every enabled source sequentially on the calling thread.
pub struct SensorRegistry {
    entries: Vec<SourceEntry>,
    initialized: bool,
}

impl SensorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            initialized: false,
        }
    }

    /// Append a source; ignored once `init_all` has run
    pub fn register(&mut self, source: BoxedSensorSource) {
        if self.initialized {
            log::warn!(
                "Source {} registered after initialization, ignoring",
                source.metadata().id
            );
            return;
        }
        self.entries.push(SourceEntry {
            source,
            enabled: false,
            sensors: Vec::new(),
            init_error: None,
        });
    }

    /// Initialize every source once and collect its descriptors
    ///
    /// Returns the number of enabled sources. Sources that fail are never
    /// retried.
    pub fn init_all(&mut self) -> usize {
        if self.initialized {
            log::warn!("Sensor registry already initialized");
            return self.enabled_count();
        }
        self.initialized = true;

        log::warn!("=== Initializing sensor sources ===");
        for entry in &mut self.entries {
            let id = entry.source.metadata().id.clone();
            let name = entry.source.metadata().name.clone();
            match entry.source.init() {
                Ok(()) => {
                    let sensors = entry.source.sensors();
                    if sensors.is_empty() {
                        log::warn!("  [{}] initialized but exposes no sensors", id);
                        entry.init_error = Some(SourceError::NoSensors);
                        continue;
                    }
                    log::info!("  [{}] {}: enabled with {} sensors", id, name, sensors.len());
                    entry.sensors = sensors;
                    entry.enabled = true;
                }
                Err(e) => {
                    log::warn!("  [{}] {} not available: {}", id, name, e);
                    entry.init_error = Some(e);
                }
            }
        }

        self.enabled_count()
    }

    /// Run one update cycle over every enabled source, in order
    pub fn update_all(&mut self) {
        for entry in self.entries.iter_mut().filter(|e| e.enabled) {
            entry.source.update();
        }
    }

    /// Reset running extremes of every enabled source
    pub fn clear_all_min_max(&mut self) {
        for entry in self.entries.iter_mut().filter(|e| e.enabled) {
            entry.source.clear_min_max();
        }
    }

    pub fn sources(&self) -> &[SourceEntry] {
        &self.entries
    }

    /// Every descriptor of every enabled source, in display order
    pub fn sensors(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .flat_map(|e| e.sensors.iter())
    }

    /// Expected wall time of one `update_all` call over the enabled sources
    pub fn update_cost(&self) -> Duration {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.source.metadata().update_cost)
            .sum()
    }

    pub fn enabled_count(&self) -> usize {
        self.entries.iter().filter(|e| e.enabled).count()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
