//! # Raspberry Pi Backend
//!
//! Adapts `rppal` SPI, I2C and GPIO handles to the `embedded-hal` traits the
//! drivers are written against.
//!
//! SPI chip select is driven by the kernel driver for the whole of one
//! `transfer`, so each `SpiDevice::transaction` is flattened into a single
//! full-duplex transfer.

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::i2c::{self, I2c as I2cBus};
use embedded_hal::spi::{self, Operation, SpiDevice};
use rppal::gpio::Gpio;
use rppal::i2c::I2c;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::convert::Infallible;
use thiserror::Error;
use tracing::info;

use super::StdDelay;
use crate::config::{PinConfig, SensorConfig};
use crate::error::{CansatError, Result};
use crate::indicator::led::LedIndicator;
use crate::radio::{RadioConfig, Sx127x};
use crate::sensor::bmp280::Bmp280;
use crate::sensor::Barometer;

/// Linux errno for a missing I2C acknowledge
const EREMOTEIO: i32 = 121;

/// Errors raised by the Raspberry Pi peripherals
#[derive(Debug, Error)]
pub enum RpiError {
    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    #[error("unsupported bus operation")]
    Unsupported,
}

impl spi::Error for RpiError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

impl i2c::Error for RpiError {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            RpiError::I2c(rppal::i2c::Error::Io(e)) if e.raw_os_error() == Some(EREMOTEIO) => {
                i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Unknown)
            }
            _ => i2c::ErrorKind::Other,
        }
    }
}

/// SPI device on a hardware chip select line
pub struct RpiSpi {
    spi: Spi,
}

impl RpiSpi {
    pub fn open(bus: u8, chip_select: u8, clock_hz: u32) -> Result<Self> {
        let bus = match bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            _ => Bus::Spi2,
        };
        let slave = match chip_select {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            _ => SlaveSelect::Ss2,
        };

        let spi = Spi::new(bus, slave, clock_hz, Mode::Mode0)
            .map_err(|e| CansatError::Hardware(format!("Failed to open SPI: {}", e)))?;
        Ok(Self { spi })
    }
}

impl spi::ErrorType for RpiSpi {
    type Error = RpiError;
}

impl SpiDevice for RpiSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> std::result::Result<(), RpiError> {
        let mut tx = Vec::new();
        for op in operations.iter() {
            match op {
                Operation::Write(bytes) => tx.extend_from_slice(bytes),
                Operation::Read(buffer) => tx.resize(tx.len() + buffer.len(), 0),
                Operation::Transfer(read, write) => {
                    tx.extend_from_slice(write);
                    tx.resize(tx.len() + read.len().saturating_sub(write.len()), 0);
                }
                Operation::TransferInPlace(buffer) => tx.extend_from_slice(buffer),
                Operation::DelayNs(_) => return Err(RpiError::Unsupported),
            }
        }

        let mut rx = vec![0u8; tx.len()];
        self.spi.transfer(&mut rx, &tx)?;

        let mut offset = 0;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => offset += bytes.len(),
                Operation::Read(buffer) => {
                    buffer.copy_from_slice(&rx[offset..offset + buffer.len()]);
                    offset += buffer.len();
                }
                Operation::Transfer(read, write) => {
                    read.copy_from_slice(&rx[offset..offset + read.len()]);
                    offset += read.len().max(write.len());
                }
                Operation::TransferInPlace(buffer) => {
                    buffer.copy_from_slice(&rx[offset..offset + buffer.len()]);
                    offset += buffer.len();
                }
                Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}

/// I2C bus master
pub struct RpiI2c {
    i2c: I2c,
}

impl RpiI2c {
    pub fn open(bus: u8) -> Result<Self> {
        let i2c = I2c::with_bus(bus)
            .map_err(|e| CansatError::Hardware(format!("Failed to open I2C bus {}: {}", bus, e)))?;
        Ok(Self { i2c })
    }
}

impl i2c::ErrorType for RpiI2c {
    type Error = RpiError;
}

impl I2cBus for RpiI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> std::result::Result<(), RpiError> {
        self.i2c.set_slave_address(u16::from(address))?;

        // A write directly followed by a read becomes one repeated-start transfer
        let mut pending: Option<&[u8]> = None;
        for op in operations.iter_mut() {
            match op {
                i2c::Operation::Write(bytes) => {
                    if let Some(previous) = pending.take() {
                        self.i2c.write(previous)?;
                    }
                    pending = Some(*bytes);
                }
                i2c::Operation::Read(buffer) => match pending.take() {
                    Some(command) => self.i2c.write_read(command, buffer)?,
                    None => {
                        self.i2c.read(buffer)?;
                    }
                },
            }
        }
        if let Some(previous) = pending {
            self.i2c.write(previous)?;
        }
        Ok(())
    }
}

/// GPIO output line
pub struct RpiPin {
    pin: rppal::gpio::OutputPin,
}

impl RpiPin {
    pub fn open(gpio: &Gpio, bcm: u8) -> Result<Self> {
        let pin = gpio
            .get(bcm)
            .map_err(|e| CansatError::Hardware(format!("Failed to claim GPIO {}: {}", bcm, e)))?
            .into_output();
        Ok(Self { pin })
    }
}

impl PinErrorType for RpiPin {
    type Error = Infallible;
}

impl OutputPin for RpiPin {
    fn set_low(&mut self) -> std::result::Result<(), Infallible> {
        self.pin.set_low();
        Ok(())
    }

    fn set_high(&mut self) -> std::result::Result<(), Infallible> {
        self.pin.set_high();
        Ok(())
    }
}

fn open_gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| CansatError::Hardware(format!("Failed to open GPIO: {}", e)))
}

/// Reset and configure the transceiver wired per `pins`
pub fn open_radio(pins: &PinConfig, radio: &RadioConfig) -> Result<Sx127x<RpiSpi, RpiPin, StdDelay>> {
    let gpio = open_gpio()?;
    let spi = RpiSpi::open(pins.spi_bus, pins.spi_chip_select, pins.spi_clock_hz)?;
    let reset = RpiPin::open(&gpio, pins.radio_reset)?;

    let radio = Sx127x::init(spi, reset, StdDelay, radio)?;
    info!("Radio on SPI{}.{} ready", pins.spi_bus, pins.spi_chip_select);
    Ok(radio)
}

/// Probe the barometer and read its calibration
pub fn open_barometer(sensor: &SensorConfig) -> Result<Barometer<Bmp280<RpiI2c>>> {
    let i2c = RpiI2c::open(sensor.i2c_bus)?;
    let bmp = Bmp280::new(i2c, sensor.i2c_address)?;
    Ok(Barometer::new(bmp)?)
}

/// Claim the status and error LEDs
pub fn open_indicator(pins: &PinConfig) -> Result<LedIndicator<RpiPin, RpiPin, StdDelay>> {
    let gpio = open_gpio()?;
    let status = RpiPin::open(&gpio, pins.status_led)?;
    let error = RpiPin::open(&gpio, pins.error_led)?;
    Ok(LedIndicator::new(status, error, StdDelay))
}
