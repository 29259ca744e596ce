//! # Radio Configuration
//!
//! Modulation parameters and their conversion into register values.
//!
//! ## Frequency synthesis
//!
//! The synthesizer step is `FXOSC / 2^19` with a 32 MHz crystal, so the
//! 24-bit `Frf` word is `round(frequency_hz / 32e6 * 2^19)`, written MSB first
//! into `RegFrfMsb`, `RegFrfMid` and `RegFrfLsb`.

use serde::Deserialize;

use crate::error::RadioError;

/// Crystal oscillator frequency
pub const FXOSC_HZ: f64 = 32_000_000.0;

/// 2^19, the synthesizer resolution divisor
const FRF_SCALE: f64 = 524_288.0;

/// Largest value the 24-bit `Frf` word can hold
const FRF_MAX: f64 = 16_777_215.0;

/// Transmit power limits for the PA_BOOST output
pub const TX_POWER_MIN_DBM: i8 = 2;
pub const TX_POWER_MAX_DBM: i8 = 17;

/// Supported signal bandwidths
pub const SUPPORTED_BANDWIDTHS_HZ: [u32; 3] = [125_000, 250_000, 500_000];

/// LoRa modulation settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RadioConfig {
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,

    #[serde(default = "default_tx_power_dbm")]
    pub tx_power_dbm: i8,

    #[serde(default = "default_spreading_factor")]
    pub spreading_factor: u8,

    #[serde(default = "default_bandwidth_hz")]
    pub bandwidth_hz: u32,

    #[serde(default = "default_coding_rate")]
    pub coding_rate: u8,
}

pub(crate) fn default_frequency_hz() -> f64 { 868_000_000.0 }
pub(crate) fn default_tx_power_dbm() -> i8 { 14 }
pub(crate) fn default_spreading_factor() -> u8 { 7 }
pub(crate) fn default_bandwidth_hz() -> u32 { 125_000 }
pub(crate) fn default_coding_rate() -> u8 { 5 }

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            frequency_hz: default_frequency_hz(),
            tx_power_dbm: default_tx_power_dbm(),
            spreading_factor: default_spreading_factor(),
            bandwidth_hz: default_bandwidth_hz(),
            coding_rate: default_coding_rate(),
        }
    }
}

/// Register values derived from a [`RadioConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioRegisters {
    /// `RegFrfMsb`, `RegFrfMid`, `RegFrfLsb`
    pub frequency: [u8; 3],
    pub pa_config: u8,
    pub modem_config_1: u8,
    pub modem_config_2: u8,
}

impl RadioConfig {
    /// Validate the settings and compute every register value
    ///
    /// Power is clamped rather than rejected; an unsupported bandwidth falls
    /// back to 125 kHz.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a spreading factor outside 7–12, a coding
    /// rate outside 5–8, or a frequency the 24-bit synthesizer cannot express.
    pub fn registers(&self) -> Result<RadioRegisters, RadioError> {
        if !(7..=12).contains(&self.spreading_factor) {
            return Err(RadioError::InvalidConfig(format!(
                "spreading factor {} outside 7-12",
                self.spreading_factor
            )));
        }

        if !(5..=8).contains(&self.coding_rate) {
            return Err(RadioError::InvalidConfig(format!(
                "coding rate 4/{} outside 4/5-4/8",
                self.coding_rate
            )));
        }

        Ok(RadioRegisters {
            frequency: frequency_registers(self.frequency_hz)?,
            pa_config: pa_config(self.tx_power_dbm),
            modem_config_1: (bandwidth_code(self.bandwidth_hz) << 4)
                | ((self.coding_rate - 4) << 1),
            modem_config_2: (self.spreading_factor << 4) | super::registers::RX_PAYLOAD_CRC_ON,
        })
    }
}

/// Compute the `Frf` register triple for a carrier frequency
///
/// # Errors
///
/// Returns `InvalidConfig` for non-finite, non-positive or out-of-range input.
pub fn frequency_registers(frequency_hz: f64) -> Result<[u8; 3], RadioError> {
    let frf = (frequency_hz / FXOSC_HZ * FRF_SCALE).round();
    if !frf.is_finite() || frf <= 0.0 || frf > FRF_MAX {
        return Err(RadioError::InvalidConfig(format!(
            "frequency {} Hz outside synthesizer range",
            frequency_hz
        )));
    }

    let frf = frf as u32;
    Ok([(frf >> 16) as u8, (frf >> 8) as u8, frf as u8])
}

/// Clamp power to 2–17 dBm and encode it for the PA_BOOST pin
pub fn pa_config(tx_power_dbm: i8) -> u8 {
    let power = tx_power_dbm.clamp(TX_POWER_MIN_DBM, TX_POWER_MAX_DBM);
    super::registers::PA_BOOST | (power - TX_POWER_MIN_DBM) as u8
}

/// `RegModemConfig1` bandwidth code, 125 kHz for anything unmapped
pub fn bandwidth_code(bandwidth_hz: u32) -> u8 {
    match bandwidth_hz {
        250_000 => 8,
        500_000 => 9,
        _ => 7,
    }
}
