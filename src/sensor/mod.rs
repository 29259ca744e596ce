//! # Sensor Module
//!
//! Barometric sensing for the payload.
//!
//! This module handles:
//! - Fixed-point compensation of raw ADC codes (`compensation`)
//! - BMP280 register access over I2C (`bmp280`)
//! - Binding a sensor to its calibration (`Barometer`)
//! - Converting readings into telemetry units (`Measurement`)

pub mod bmp280;
pub mod compensation;

use tracing::debug;

use crate::error::SensorError;
use compensation::{altitude_m, compensate, CalibrationSet, CompensatedReading, RawSample};

/// Source of calibration coefficients and raw conversions
pub trait SensorSource {
    /// Read the factory calibration block
    fn read_calibration(&mut self) -> Result<CalibrationSet, SensorError>;

    /// Read the latest raw temperature and pressure codes
    fn read_raw(&mut self) -> Result<RawSample, SensorError>;
}

/// Anything that can produce a compensated reading on demand
#[cfg_attr(test, mockall::automock)]
pub trait ReadingSource {
    fn read(&mut self) -> Result<CompensatedReading, SensorError>;
}

/// A sensor paired with the calibration it was read with
///
/// The calibration is read exactly once, at construction, and is never
/// refreshed for the lifetime of the value.
#[derive(Debug)]
pub struct Barometer<S> {
    source: S,
    calibration: CalibrationSet,
}

impl<S: SensorSource> Barometer<S> {
    /// Read the calibration and take ownership of the sensor
    pub fn new(mut source: S) -> Result<Self, SensorError> {
        let calibration = source.read_calibration()?;
        Ok(Self { source, calibration })
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calibration
    }
}

impl<S: SensorSource> ReadingSource for Barometer<S> {
    fn read(&mut self) -> Result<CompensatedReading, SensorError> {
        let raw = self.source.read_raw()?;
        let reading = compensate(&self.calibration, &raw);
        debug!(
            "raw t={} p={} -> {} cdegC, {} Pa/256",
            raw.adc_temperature(),
            raw.adc_pressure(),
            reading.temperature_centidegrees,
            reading.pressure_pa_q8
        );
        Ok(reading)
    }
}

/// Physical readings in telemetry units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    /// Temperature in °C
    pub temperature_c: f64,
    /// Pressure in hPa
    pub pressure_hpa: f64,
    /// Altitude above the reference level in m
    pub altitude_m: f64,
}

impl Measurement {
    /// Convert a compensated reading, deriving altitude from `sea_level_hpa`
    pub fn from_reading(reading: &CompensatedReading, sea_level_hpa: f64) -> Self {
        let pressure_hpa = reading.pressure_hpa();
        Self {
            temperature_c: reading.temperature_c(),
            pressure_hpa,
            altitude_m: altitude_m(pressure_hpa, sea_level_hpa),
        }
    }

    /// Placeholder used when no sensor is fitted
    pub fn zero() -> Self {
        Self::default()
    }
}
