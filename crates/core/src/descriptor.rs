//! Sensor descriptors handed out to consumers

use crate::metric::{MetricCell, Reading};
use std::sync::Arc;
use zen_sens_types::FormatSpec;

/// A named measurement bound to its source's live metric cell
///
/// Label, hint and format are fixed once the source has discovered its
/// sensors. The value, min and max are read through the shared cell on
/// every access, so a descriptor never goes stale.
#[derive(Debug, Clone)]
pub struct SensorDescriptor {
    label: String,
    hint: String,
    format: FormatSpec,
    cell: Arc<MetricCell>,
}

impl SensorDescriptor {
    pub fn new(
        label: impl Into<String>,
        hint: impl Into<String>,
        format: impl Into<FormatSpec>,
        cell: Arc<MetricCell>,
    ) -> Self {
        Self {
            label: label.into(),
            hint: hint.into(),
            format: format.into(),
            cell,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Human explanation of the measurement and where it is read from
    pub fn hint(&self) -> &str {
        &self.hint
    }

    pub fn format(&self) -> &FormatSpec {
        &self.format
    }

    pub fn value(&self) -> f32 {
        self.cell.value()
    }

    pub fn min(&self) -> f32 {
        self.cell.min()
    }

    pub fn max(&self) -> f32 {
        self.cell.max()
    }

    pub fn reading(&self) -> Reading {
        self.cell.reading()
    }

    /// Current value rendered with this descriptor's format
    pub fn formatted_value(&self) -> String {
        self.format.format(self.cell.value())
    }

    pub fn cell(&self) -> &Arc<MetricCell> {
        &self.cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zen_sens_types::{SensorKind, UNAVAILABLE_PLACEHOLDER};

    #[test]
    fn test_descriptor_tracks_cell() {
        let cell = MetricCell::shared();
        let desc = SensorDescriptor::new("Package Power", "hint", SensorKind::Power, cell.clone());

        assert_eq!(desc.formatted_value().trim(), UNAVAILABLE_PLACEHOLDER);

        cell.record(35.5);
        assert_eq!(desc.value(), 35.5);
        assert_eq!(desc.formatted_value(), "  35.500 W");

        let copy = desc.clone();
        cell.record(20.0);
        assert_eq!(copy.value(), 20.0);
        assert_eq!(copy.max(), 35.5);
    }
}
