//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; anything left out takes the
//! built-in default, so an empty file describes the reference payload.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CansatError, Result};
use crate::radio::config::{frequency_registers, SUPPORTED_BANDWIDTHS_HZ};
use crate::radio::RadioConfig;
use crate::sensor::bmp280::BMP280_DEFAULT_ADDRESS;

/// Longest mission id that still leaves room for the readings in one frame
pub const MAX_MISSION_ID_LEN: usize = 32;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub mission: MissionConfig,

    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub pins: PinConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub ground: GroundConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Mission identity and cadence
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MissionConfig {
    #[serde(default = "default_mission_id")]
    pub id: String,

    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u64,

    /// Outer loop tick; the telemetry interval is checked on every tick
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,

    /// Reference pressure for altitude, hPa
    #[serde(default = "default_sea_level_hpa")]
    pub sea_level_hpa: f64,

    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
}

/// Barometer wiring
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SensorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,

    #[serde(default = "default_i2c_address")]
    pub i2c_address: u8,
}

/// Radio bus and GPIO assignment (BCM numbering)
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PinConfig {
    #[serde(default)]
    pub spi_bus: u8,

    #[serde(default)]
    pub spi_chip_select: u8,

    #[serde(default = "default_spi_clock_hz")]
    pub spi_clock_hz: u32,

    #[serde(default = "default_radio_reset")]
    pub radio_reset: u8,

    #[serde(default = "default_status_led")]
    pub status_led: u8,

    #[serde(default = "default_error_led")]
    pub error_led: u8,
}

/// Microphone PCM stream
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AudioConfig {
    /// Stream of raw little-endian PCM; no microphone when unset
    #[serde(default)]
    pub source: Option<PathBuf>,

    #[serde(default = "default_sample_bits")]
    pub bits: u32,

    #[serde(default = "default_block_samples")]
    pub block_samples: usize,
}

/// On-disk logs
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_flight_log")]
    pub flight_log: PathBuf,

    #[serde(default = "default_ground_log")]
    pub ground_log: PathBuf,

    /// Flight log rows held in memory between writes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Ground station settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GroundConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Diagnostic log file
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_true() -> bool { true }

fn default_mission_id() -> String { "COSMIG2026".to_string() }
fn default_telemetry_interval_ms() -> u64 { 1000 }
fn default_loop_interval_ms() -> u64 { 50 }
fn default_sea_level_hpa() -> f64 { 1013.25 }
fn default_startup_delay_ms() -> u64 { 2000 }

fn default_i2c_bus() -> u8 { 1 }
fn default_i2c_address() -> u8 { BMP280_DEFAULT_ADDRESS }

fn default_spi_clock_hz() -> u32 { 5_000_000 }
fn default_radio_reset() -> u8 { 25 }
fn default_status_led() -> u8 { 20 }
fn default_error_led() -> u8 { 21 }

fn default_sample_bits() -> u32 { 16 }
fn default_block_samples() -> usize { 128 }

fn default_flight_log() -> PathBuf { PathBuf::from("logs/cansat_log.csv") }
fn default_ground_log() -> PathBuf { PathBuf::from("logs/ground_station_log.jsonl") }
fn default_buffer_size() -> usize { 5 }

fn default_poll_interval_ms() -> u64 { 100 }

fn default_log_directory() -> PathBuf { PathBuf::from("logs") }
fn default_file_prefix() -> String { "cansat.log".to_string() }

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            id: default_mission_id(),
            telemetry_interval_ms: default_telemetry_interval_ms(),
            loop_interval_ms: default_loop_interval_ms(),
            sea_level_hpa: default_sea_level_hpa(),
            startup_delay_ms: default_startup_delay_ms(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            i2c_bus: default_i2c_bus(),
            i2c_address: default_i2c_address(),
        }
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            spi_chip_select: 0,
            spi_clock_hz: default_spi_clock_hz(),
            radio_reset: default_radio_reset(),
            status_led: default_status_led(),
            error_led: default_error_led(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            source: None,
            bits: default_sample_bits(),
            block_samples: default_block_samples(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            flight_log: default_flight_log(),
            ground_log: default_ground_log(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_log_directory(),
            file_prefix: default_file_prefix(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> CansatError {
    CansatError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cansat_telemetry::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise use the built-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Mission id travels unescaped in a comma-separated frame
        let id = &self.mission.id;
        if id.is_empty() {
            return Err(invalid("mission id cannot be empty"));
        }
        if id.contains(',') {
            return Err(invalid("mission id cannot contain ','"));
        }
        if id.len() > MAX_MISSION_ID_LEN {
            return Err(invalid(format!(
                "mission id must be at most {} bytes",
                MAX_MISSION_ID_LEN
            )));
        }

        if self.mission.telemetry_interval_ms == 0 {
            return Err(invalid("telemetry_interval_ms must be greater than 0"));
        }

        if self.mission.loop_interval_ms == 0
            || self.mission.loop_interval_ms > self.mission.telemetry_interval_ms
        {
            return Err(invalid(
                "loop_interval_ms must be between 1 and telemetry_interval_ms",
            ));
        }

        if self.mission.sea_level_hpa.is_nan() || self.mission.sea_level_hpa <= 0.0 {
            return Err(invalid("sea_level_hpa must be greater than 0"));
        }

        // Radio
        if !(7..=12).contains(&self.radio.spreading_factor) {
            return Err(invalid("spreading_factor must be between 7 and 12"));
        }

        if !(5..=8).contains(&self.radio.coding_rate) {
            return Err(invalid("coding_rate must be between 5 and 8"));
        }

        if !SUPPORTED_BANDWIDTHS_HZ.contains(&self.radio.bandwidth_hz) {
            return Err(invalid("bandwidth_hz must be one of: 125000, 250000, 500000"));
        }

        if let Err(e) = frequency_registers(self.radio.frequency_hz) {
            return Err(invalid(format!("frequency_hz: {}", e)));
        }

        // Buses
        if self.sensor.i2c_address > 0x7F {
            return Err(invalid("i2c_address must be a 7-bit address"));
        }

        if self.pins.spi_bus > 2 || self.pins.spi_chip_select > 2 {
            return Err(invalid("spi_bus and spi_chip_select must be between 0 and 2"));
        }

        if self.pins.spi_clock_hz == 0 {
            return Err(invalid("spi_clock_hz must be greater than 0"));
        }

        if self.pins.status_led == self.pins.error_led {
            return Err(invalid("status_led and error_led must be different pins"));
        }

        // Audio
        if self.audio.bits != 16 && self.audio.bits != 32 {
            return Err(invalid("audio bits must be 16 or 32"));
        }

        if self.audio.block_samples == 0 {
            return Err(invalid("block_samples must be greater than 0"));
        }

        // Storage
        if self.storage.buffer_size == 0 {
            return Err(invalid("buffer_size must be greater than 0"));
        }

        if self.ground.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be greater than 0"));
        }

        if self.logging.enabled && self.logging.file_prefix.is_empty() {
            return Err(invalid("logging file_prefix cannot be empty when enabled"));
        }

        Ok(())
    }
}
