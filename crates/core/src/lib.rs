//! zen-sens-core: Core traits and registry for the zen-sens sensor engine.
//!
//! This crate contains the fundamental `SensorSource` trait, the live
//! `MetricCell`/`SensorDescriptor` pair consumers poll, the ordered
//! `SensorRegistry`, and shared constants.

pub mod constants;
mod descriptor;
mod error;
mod metric;
mod registry;
mod sensor_source;

pub use constants::{DEFAULT_UPDATE_INTERVAL, DEFAULT_UPDATE_INTERVAL_MS, MEASUREMENT_WINDOW};
pub use descriptor::SensorDescriptor;
pub use error::{SourceError, SourceResult};
pub use metric::{MetricCell, Reading};
pub use registry::{SensorRegistry, SourceEntry};
pub use sensor_source::{BoxedSensorSource, SensorSource, SourceMetadata};

// Re-export types used in trait signatures for convenience
pub use zen_sens_types::{FormatSpec, SensorKind, SENSOR_UNAVAILABLE};
