//! Shared constants for the sensor engine

use std::time::Duration;

/// Suggested polling cadence for display consumers (300ms)
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(300);

/// Default polling cadence in milliseconds (useful for config defaults)
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 300;

/// Window between the two energy counter snapshots of one register sample.
/// An instantaneous counter delta carries no rate information, so every
/// register update blocks for this long.
pub const MEASUREMENT_WINDOW: Duration = Duration::from_millis(100);
