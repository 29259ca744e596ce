//! # BMP280 I2C Driver
//!
//! Register-level access to a Bosch BMP280 barometric sensor over any
//! `embedded_hal::i2c::I2c` bus.
//!
//! The driver only moves bytes: calibration decoding and compensation live in
//! [`super::compensation`].

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use tracing::{debug, info};

use super::compensation::{CalibrationSet, RawSample, CALIBRATION_LEN, RAW_SAMPLE_LEN};
use super::SensorSource;
use crate::error::SensorError;

/// Default 7-bit address (SDO tied low)
pub const BMP280_DEFAULT_ADDRESS: u8 = 0x76;

/// Value of the chip id register on a BMP280
pub const BMP280_CHIP_ID: u8 = 0x58;

const REG_CALIBRATION: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

/// osrs_t ×1, osrs_p ×1, normal mode
const CTRL_MEAS_NORMAL: u8 = 0x27;

/// t_sb 1000 ms, filter off, 3-wire SPI off
const CONFIG_STANDBY_1000MS: u8 = 0xA0;

/// BMP280 connected over I2C
#[derive(Debug)]
pub struct Bmp280<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Bmp280<I2C> {
    /// Probe the sensor and put it into continuous (normal) measurement mode
    ///
    /// # Errors
    ///
    /// - `HardwareNotPresent` if the address is not acknowledged
    /// - `UnexpectedHardware` if the chip id is not 0x58
    /// - `BusFault` for any other bus failure
    pub fn new(i2c: I2C, address: u8) -> Result<Self, SensorError> {
        let mut sensor = Self { i2c, address };

        let mut chip_id = [0u8];
        sensor
            .i2c
            .write_read(address, &[REG_CHIP_ID], &mut chip_id)
            .map_err(|e| match e.kind() {
                ErrorKind::NoAcknowledge(_) => SensorError::HardwareNotPresent,
                _ => SensorError::BusFault(format!("{:?}", e)),
            })?;

        if chip_id[0] != BMP280_CHIP_ID {
            return Err(SensorError::UnexpectedHardware {
                found: chip_id[0],
                expected: BMP280_CHIP_ID,
            });
        }

        sensor.write_register(REG_CTRL_MEAS, CTRL_MEAS_NORMAL)?;
        sensor.write_register(REG_CONFIG, CONFIG_STANDBY_1000MS)?;

        info!("BMP280 detected at 0x{:02X}", address);
        Ok(sensor)
    }

    /// Release the bus
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| SensorError::BusFault(format!("{:?}", e)))
    }

    fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), SensorError> {
        self.i2c
            .write_read(self.address, &[register], buffer)
            .map_err(|e| SensorError::BusFault(format!("{:?}", e)))
    }
}

impl<I2C: I2c> SensorSource for Bmp280<I2C> {
    fn read_calibration(&mut self) -> Result<CalibrationSet, SensorError> {
        let mut block = [0u8; CALIBRATION_LEN];
        self.read_block(REG_CALIBRATION, &mut block)?;
        let calibration = CalibrationSet::from_bytes(&block);
        debug!("BMP280 calibration: {:?}", calibration);
        Ok(calibration)
    }

    fn read_raw(&mut self) -> Result<RawSample, SensorError> {
        let mut block = [0u8; RAW_SAMPLE_LEN];
        self.read_block(REG_DATA, &mut block)?;
        Ok(RawSample::from_bytes(&block))
    }
}
