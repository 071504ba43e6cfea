//! Live metric cells shared between a source and its descriptors

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use zen_sens_types::{is_unavailable, SENSOR_UNAVAILABLE};

/// A float stored as its bit pattern so it can be shared across threads
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Point-in-time copy of a metric cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

/// Current value plus running minimum and maximum of one metric
///
/// A source owns one `Arc<MetricCell>` per metric and hands clones of the
/// `Arc` to its descriptors, so every update is visible to every consumer
/// without copying. Each field is a single atomic word: readers on another
/// thread see last-writer-wins values with no snapshot isolation, and may
/// observe a value from this cycle next to a min/max from the previous one.
///
/// Until the first valid sample arrives, min and max hold the sentinel.
#[derive(Debug)]
pub struct MetricCell {
    value: AtomicF32,
    min: AtomicF32,
    max: AtomicF32,
}

impl MetricCell {
    /// Create an unseeded cell reporting the sentinel
    pub fn new() -> Self {
        Self {
            value: AtomicF32::new(SENSOR_UNAVAILABLE),
            min: AtomicF32::new(SENSOR_UNAVAILABLE),
            max: AtomicF32::new(SENSOR_UNAVAILABLE),
        }
    }

    /// Create an unseeded cell behind an `Arc`
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn value(&self) -> f32 {
        self.value.load()
    }

    pub fn min(&self) -> f32 {
        self.min.load()
    }

    pub fn max(&self) -> f32 {
        self.max.load()
    }

    /// True once a valid sample has set min and max
    pub fn is_seeded(&self) -> bool {
        !is_unavailable(self.min.load())
    }

    /// Store a new sample and widen min/max to include it
    ///
    /// The sentinel and non-finite values are treated as a failed read.
    pub fn record(&self, value: f32) {
        if is_unavailable(value) || !value.is_finite() {
            self.mark_unavailable();
            return;
        }

        self.value.store(value);
        if !self.is_seeded() {
            self.min.store(value);
            self.max.store(value);
            return;
        }

        if value < self.min.load() {
            self.min.store(value);
        }
        if value > self.max.load() {
            self.max.store(value);
        }
    }

    /// Report the sentinel for this cycle, leaving min/max untouched
    pub fn mark_unavailable(&self) {
        self.value.store(SENSOR_UNAVAILABLE);
    }

    /// Collapse min and max onto the current value
    pub fn clear_min_max(&self) {
        let value = self.value.load();
        self.min.store(value);
        self.max.store(value);
    }

    pub fn reading(&self) -> Reading {
        Reading {
            value: self.value(),
            min: self.min(),
            max: self.max(),
        }
    }
}

impl Default for MetricCell {
    fn default() -> Self {
        Self::new()
    }
}
