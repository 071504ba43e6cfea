//! zen-sens-types: Shared data types for the zen-sens sensor engine.
//!
//! This crate contains pure data types (sensor kinds, formats, topology
//! entries, source configuration) shared across all zen-sens crates.
//! Nothing here touches the filesystem or hardware.

pub mod sensor;
pub mod source_configs;
pub mod topology;

// Re-export commonly used types at the crate root for convenience
pub use sensor::{
    is_unavailable, FormatSpec, SensorKind, SENSOR_UNAVAILABLE, UNAVAILABLE_PLACEHOLDER,
};
pub use source_configs::{LabelStyle, SourcesConfig, SystemPaths};
pub use topology::TopologyEntry;
