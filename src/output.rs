//! Line-oriented rendering of sensor readings

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io::Write;
use zen_sens_core::SensorDescriptor;
use zen_sens_types::{is_unavailable, UNAVAILABLE_PLACEHOLDER};

/// Vertical tab written after every text cycle
pub const CYCLE_SEPARATOR: &str = "\x0b";

/// Stream format of the command-line output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// `label<TAB>value` lines, cycles separated by a vertical tab
    #[default]
    Text,
    /// One JSON object per cycle
    Json,
}

/// One sensor as written in JSON output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub label: String,
    /// `None` when the last read failed
    pub value: Option<f32>,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub unit: String,
}

fn available(value: f32) -> Option<f32> {
    if is_unavailable(value) {
        None
    } else {
        Some(value)
    }
}

impl From<&SensorDescriptor> for SensorSnapshot {
    fn from(sensor: &SensorDescriptor) -> Self {
        let reading = sensor.reading();
        Self {
            label: sensor.label().to_string(),
            value: available(reading.value),
            min: available(reading.min),
            max: available(reading.max),
            unit: sensor.format().unit.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CycleSnapshot {
    pub sensors: Vec<SensorSnapshot>,
}

/// Write one update cycle in the requested format
pub fn write_cycle<W: Write>(
    out: &mut W,
    format: OutputFormat,
    sensors: &[SensorDescriptor],
) -> Result<()> {
    match format {
        OutputFormat::Text => write_text(out, sensors),
        OutputFormat::Json => write_json(out, sensors),
    }
}

pub fn write_text<W: Write>(out: &mut W, sensors: &[SensorDescriptor]) -> Result<()> {
    for sensor in sensors {
        let value = sensor.value();
        if is_unavailable(value) {
            writeln!(out, "{}\t{}", sensor.label(), UNAVAILABLE_PLACEHOLDER)?;
        } else {
            writeln!(out, "{}\t{:.6}", sensor.label(), value)?;
        }
    }
    writeln!(out, "{}", CYCLE_SEPARATOR)?;
    out.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(out: &mut W, sensors: &[SensorDescriptor]) -> Result<()> {
    let cycle = CycleSnapshot {
        sensors: sensors.iter().map(SensorSnapshot::from).collect(),
    };
    serde_json::to_writer(&mut *out, &cycle)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Human-readable table, used for the startup summary
pub fn write_table<W: Write>(out: &mut W, sensors: &[SensorDescriptor]) -> Result<()> {
    let width = sensors.iter().map(|s| s.label().len()).max().unwrap_or(0);
    for sensor in sensors {
        let format = sensor.format();
        writeln!(
            out,
            "{:<width$} {} {} {}",
            sensor.label(),
            format.format(sensor.value()),
            format.format(sensor.min()),
            format.format(sensor.max()),
            width = width
        )?;
    }
    Ok(())
}
