//! Sensor source trait and related types

use crate::descriptor::SensorDescriptor;
use crate::error::SourceResult;
use std::time::Duration;

/// Metadata about a sensor source
#[derive(Debug, Clone)]
pub struct SourceMetadata {
    /// Short driver identifier ("zenpower", "msr", "os")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Description of what this source provides
    pub description: String,
    /// Minimum time one `update` call blocks for
    pub update_cost: Duration,
}

/// Trait for all sensor sources
///
/// A source detects its hardware once in `init`, then produces a fixed list
/// of descriptors bound to its live metric cells. The registry calls
/// `update` every poll cycle for as long as the source stays enabled.
pub trait SensorSource: Send {
    /// Get metadata about this source
    fn metadata(&self) -> &SourceMetadata;

    /// Detect hardware and open handles
    ///
    /// Called once. An error means the source stays disabled for the
    /// lifetime of the process.
    fn init(&mut self) -> SourceResult<()>;

    /// Describe every sensor this source exposes, in display order
    ///
    /// Only meaningful after a successful `init`. The returned descriptors
    /// share cells with the source, so they keep updating.
    fn sensors(&self) -> Vec<SensorDescriptor>;

    /// Refresh all metric cells
    ///
    /// Never fails as a whole: individual metrics fall back to the
    /// unavailable sentinel or keep their previous value.
    fn update(&mut self);

    /// Reset min and max of every metric to its current value
    ///
    /// Sources without running extremes can rely on the default no-op.
    fn clear_min_max(&mut self) {}
}

/// Type-erased sensor source for dynamic dispatch
pub type BoxedSensorSource = Box<dyn SensorSource>;
