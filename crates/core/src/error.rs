//! Errors reported by sensor sources during initialization

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a sensor source could not be enabled
///
/// Only `init` returns these. Failures during `update` never surface as
/// errors: a failed read reports the sentinel for that cycle and an anomalous
/// counter delta is skipped.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported CPU (vendor {vendor:?}, family {family:#x})")]
    UnsupportedCpu { vendor: String, family: u32 },

    #[error("CPU reports no physical cores")]
    NoCores,

    #[error("failed to open {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read register {register:#x}: {source}")]
    RegisterRead {
        register: u32,
        #[source]
        source: io::Error,
    },

    #[error("no hwmon instance named {driver:?}")]
    DriverNotFound { driver: String },

    #[error("source exposes no sensors")]
    NoSensors,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type SourceResult<T> = Result<T, SourceError>;
