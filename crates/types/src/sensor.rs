//! Sensor kinds and value formatting

use serde::{Deserialize, Serialize};

/// Value stored in a metric when no valid reading exists for the current cycle
pub const SENSOR_UNAVAILABLE: f32 = -999.0;

/// Text rendered in place of a value that is unavailable
pub const UNAVAILABLE_PLACEHOLDER: &str = "? ? ?";

/// Returns true if `value` is the unavailable sentinel
pub fn is_unavailable(value: f32) -> bool {
    value == SENSOR_UNAVAILABLE
}

/// Physical quantity a sensor measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Degrees Celsius
    Temperature,
    /// Volts
    Voltage,
    /// Amperes
    Current,
    /// Watts
    Power,
    /// Gigahertz
    Frequency,
}

impl SensorKind {
    /// Unit suffix used when rendering values of this kind
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::Voltage => "V",
            SensorKind::Current => "A",
            SensorKind::Power => "W",
            SensorKind::Frequency => "GHz",
        }
    }

    /// Number of decimals shown for this kind
    pub fn precision(&self) -> usize {
        match self {
            SensorKind::Temperature => 2,
            _ => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Voltage => "voltage",
            SensorKind::Current => "current",
            SensorKind::Power => "power",
            SensorKind::Frequency => "frequency",
        }
    }
}

/// Semantic format of a sensor value
///
/// Replaces printf-style format strings: consumers either call [`FormatSpec::format`]
/// or read `kind`/`precision`/`unit` and render the number themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub kind: SensorKind,
    pub precision: usize,
    pub unit: String,
}

impl FormatSpec {
    /// Default format for a sensor kind
    pub fn for_kind(kind: SensorKind) -> Self {
        Self {
            kind,
            precision: kind.precision(),
            unit: kind.unit().to_string(),
        }
    }

    /// Render a value, substituting the placeholder for the sentinel
    pub fn format(&self, value: f32) -> String {
        if is_unavailable(value) {
            return format!("{:>12}", UNAVAILABLE_PLACEHOLDER);
        }
        let number = format!("{:.*}", self.precision, value);
        format!("{:>8} {}", number, self.unit)
    }
}

impl From<SensorKind> for FormatSpec {
    fn from(kind: SensorKind) -> Self {
        Self::for_kind(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_format() {
        let spec = FormatSpec::for_kind(SensorKind::Power);
        assert_eq!(spec.format(12.5), "  12.500 W");
    }

    #[test]
    fn test_temperature_precision() {
        let spec = FormatSpec::for_kind(SensorKind::Temperature);
        assert_eq!(spec.precision, 2);
        assert_eq!(spec.format(45.5), "   45.50 °C");
    }

    #[test]
    fn test_sentinel_renders_placeholder() {
        let spec = FormatSpec::for_kind(SensorKind::Frequency);
        let rendered = spec.format(SENSOR_UNAVAILABLE);
        assert_eq!(rendered.trim(), UNAVAILABLE_PLACEHOLDER);
        assert!(!rendered.contains("999"));
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&SensorKind::Voltage).unwrap();
        assert_eq!(json, "\"voltage\"");
        let kind: SensorKind = serde_json::from_str("\"frequency\"").unwrap();
        assert_eq!(kind, SensorKind::Frequency);
    }
}
