//! zen-sens: Hardware telemetry for AMD Zen processors
//!
//! This library provides the application layer around the sensor engine:
//! - Configuration management
//! - The periodic update loop
//! - Text and JSON rendering of sensor readings

pub mod config;
pub mod core;
pub mod output;

// Re-export commonly used types
pub use config::AppConfig;
pub use core::UpdateManager;
pub use output::OutputFormat;
pub use zen_sens_core::{SensorDescriptor, SensorRegistry, SensorSource};
pub use zen_sens_sources::{default_registry, CpuIdentity};
