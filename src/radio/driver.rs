//! # SX127x LoRa Driver
//!
//! Blocking, register-level driver for SX1276/77/78/79 transceivers.
//!
//! Every bus access is a single `SpiDevice::transaction`, so chip select is
//! asserted and released inside one call and no other bus user can interleave
//! with a burst FIFO transfer.
//!
//! ## Mode discipline
//!
//! ```text
//! Sleep -> Standby <-> Transmit (polled TxDone, forced back to Standby)
//!          Standby <-> ReceiveContinuous
//! ```
//!
//! Sleep is only entered during [`Sx127x::init`]. After every [`Sx127x::send`],
//! successful or not, IRQ flags are cleared and the radio is back in Standby.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Operation, SpiDevice};
use tracing::{debug, info, warn};

use super::config::RadioConfig;
use super::registers::*;
use super::{RxPacket, Transceiver};
use crate::error::RadioError;

/// Reset line hold and settle time
const RESET_PULSE_MS: u32 = 10;

/// Settle time after entering Sleep before synthesizer writes
const SLEEP_SETTLE_MS: u32 = 10;

/// TxDone polling budget: 100 polls at 10 ms, about one second
pub const TX_POLL_ATTEMPTS: u32 = 100;
pub const TX_POLL_INTERVAL_MS: u32 = 10;

/// Packet RSSI offset for the HF port (862-1020 MHz band)
pub const RSSI_OFFSET_DBM: i16 = 157;

/// Preamble length in symbols
const PREAMBLE_SYMBOLS: u16 = 8;

/// Largest payload `RegPayloadLength` can describe
pub const MAX_PAYLOAD_LEN: usize = 255;

fn bus_fault<E: core::fmt::Debug>(err: E) -> RadioError {
    RadioError::BusFault(format!("{:?}", err))
}

/// An initialized SX127x transceiver
///
/// Only [`Sx127x::init`] constructs this type, so holding one means the
/// device was identified and configured and is idle in Standby.
pub struct Sx127x<SPI, RST, D> {
    spi: SPI,
    reset: RST,
    delay: D,
    mode: RadioMode,
    config: RadioConfig,
}

impl<SPI, RST, D> core::fmt::Debug for Sx127x<SPI, RST, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sx127x")
            .field("mode", &self.mode)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<SPI, RST, D> Sx127x<SPI, RST, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    D: DelayNs,
{
    /// Reset, identify and configure the transceiver
    ///
    /// # Arguments
    ///
    /// * `spi` - Device handle on the shared SPI bus (owns chip select)
    /// * `reset` - Active-low reset line
    /// * `delay` - Blocking delay provider
    /// * `config` - Modulation settings
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the settings cannot be encoded (checked before any bus access)
    /// - `HardwareNotPresent` if the version register reads back 0x00 or 0xFF
    /// - `UnexpectedHardware` for any other version than 0x12
    /// - `BusFault` if any bus or reset line operation fails
    ///
    /// All of these are terminal for this driver instance; retrying is the
    /// caller's decision.
    pub fn init(spi: SPI, reset: RST, delay: D, config: &RadioConfig) -> Result<Self, RadioError> {
        let registers = config.registers()?;

        let mut radio = Self {
            spi,
            reset,
            delay,
            mode: RadioMode::Sleep,
            config: config.clone(),
        };

        radio.hard_reset()?;

        match radio.read_register(Register::Version)? {
            SX127X_VERSION => {}
            0x00 | 0xFF => return Err(RadioError::HardwareNotPresent),
            found => {
                return Err(RadioError::UnexpectedHardware {
                    found,
                    expected: SX127X_VERSION,
                })
            }
        }

        // Frequency registers are only writable in Sleep
        radio.set_mode(RadioMode::Sleep)?;
        radio.delay.delay_ms(SLEEP_SETTLE_MS);

        let [msb, mid, lsb] = registers.frequency;
        radio.write_register(Register::FrfMsb, msb)?;
        radio.write_register(Register::FrfMid, mid)?;
        radio.write_register(Register::FrfLsb, lsb)?;

        radio.write_register(Register::PaConfig, registers.pa_config)?;
        radio.write_register(Register::Lna, LNA_MAX_GAIN_BOOST)?;
        radio.write_register(Register::ModemConfig1, registers.modem_config_1)?;
        radio.write_register(Register::ModemConfig2, registers.modem_config_2)?;

        let [preamble_msb, preamble_lsb] = PREAMBLE_SYMBOLS.to_be_bytes();
        radio.write_register(Register::PreambleMsb, preamble_msb)?;
        radio.write_register(Register::PreambleLsb, preamble_lsb)?;

        // TX and RX share the whole FIFO from offset 0
        radio.write_register(Register::FifoTxBaseAddr, 0x00)?;
        radio.write_register(Register::FifoRxBaseAddr, 0x00)?;

        radio.set_mode(RadioMode::Standby)?;

        info!(
            "SX127x ready: {:.3} MHz, SF{}, {} kHz, CR 4/{}, {} dBm",
            config.frequency_hz / 1e6,
            config.spreading_factor,
            config.bandwidth_hz / 1000,
            config.coding_rate,
            config.tx_power_dbm.clamp(2, 17)
        );

        Ok(radio)
    }

    /// Current operating mode as last written by the driver
    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    /// Settings the radio was initialized with
    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// Transmit one payload and wait for TxDone
    ///
    /// # Errors
    ///
    /// - `PayloadTooLarge` if `payload` exceeds 255 bytes
    /// - `Timeout` if TxDone is not raised within 100 polls
    /// - `BusFault` on any bus failure
    ///
    /// In every case the IRQ flags are cleared and Standby is forced before
    /// returning. The first error encountered is the one reported.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        let outcome = self.transmit(payload);
        let cleanup = self.finish_transmit();

        match outcome {
            Ok(()) => {
                cleanup?;
                debug!("Sent {} byte frame", payload.len());
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup_err) = cleanup {
                    warn!("Cleanup after failed transmit also failed: {}", cleanup_err);
                }
                Err(e)
            }
        }
    }

    /// Check for a received frame without blocking
    ///
    /// Puts the radio in continuous receive, then returns `Ok(None)` unless
    /// RxDone is latched. A latched frame is read out of the FIFO, the IRQ
    /// flags are cleared and the packet RSSI is attached.
    pub fn poll_receive(&mut self) -> Result<Option<RxPacket>, RadioError> {
        self.set_mode(RadioMode::ReceiveContinuous)?;

        let flags = self.read_register(Register::IrqFlags)?;
        if flags & IRQ_RX_DONE == 0 {
            return Ok(None);
        }

        let length = self.read_register(Register::RxNbBytes)?;
        let start = self.read_register(Register::FifoRxCurrentAddr)?;
        self.write_register(Register::FifoAddrPtr, start)?;

        let mut payload = vec![0u8; usize::from(length)];
        self.read_fifo(&mut payload)?;

        self.write_register(Register::IrqFlags, IRQ_CLEAR_ALL)?;

        let rssi_raw = self.read_register(Register::PktRssiValue)?;
        let packet = RxPacket {
            payload,
            rssi_dbm: i16::from(rssi_raw) - RSSI_OFFSET_DBM,
            crc_valid: flags & IRQ_PAYLOAD_CRC_ERROR == 0,
        };

        debug!(
            "Received {} byte frame at {} dBm (crc {})",
            packet.payload.len(),
            packet.rssi_dbm,
            if packet.crc_valid { "ok" } else { "error" }
        );
        Ok(Some(packet))
    }

    /// Release the bus handle, reset line and delay
    pub fn release(self) -> (SPI, RST, D) {
        (self.spi, self.reset, self.delay)
    }

    fn transmit(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.set_mode(RadioMode::Standby)?;

        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(RadioError::PayloadTooLarge(payload.len()));
        }

        self.write_register(Register::FifoAddrPtr, 0x00)?;
        self.write_fifo(payload)?;
        self.write_register(Register::PayloadLength, payload.len() as u8)?;
        self.set_mode(RadioMode::Transmit)?;

        for attempt in 0..TX_POLL_ATTEMPTS {
            let flags = self.read_register(Register::IrqFlags)?;
            if flags & IRQ_TX_DONE != 0 {
                debug!("TxDone after {} polls", attempt + 1);
                return Ok(());
            }
            self.delay.delay_ms(TX_POLL_INTERVAL_MS);
        }

        warn!("TxDone not observed after {} polls", TX_POLL_ATTEMPTS);
        Err(RadioError::Timeout {
            attempts: TX_POLL_ATTEMPTS,
        })
    }

    fn finish_transmit(&mut self) -> Result<(), RadioError> {
        let cleared = self.write_register(Register::IrqFlags, IRQ_CLEAR_ALL);
        let standby = self.set_mode(RadioMode::Standby);
        cleared.and(standby)
    }

    fn hard_reset(&mut self) -> Result<(), RadioError> {
        self.reset.set_low().map_err(bus_fault)?;
        self.delay.delay_ms(RESET_PULSE_MS);
        self.reset.set_high().map_err(bus_fault)?;
        self.delay.delay_ms(RESET_PULSE_MS);
        Ok(())
    }

    fn set_mode(&mut self, mode: RadioMode) -> Result<(), RadioError> {
        self.write_register(Register::OpMode, mode.op_mode())?;
        self.mode = mode;
        Ok(())
    }

    fn write_register(&mut self, register: Register, value: u8) -> Result<(), RadioError> {
        self.spi
            .write(&[register.write_addr(), value])
            .map_err(bus_fault)
    }

    fn read_register(&mut self, register: Register) -> Result<u8, RadioError> {
        let mut value = [0u8];
        self.spi
            .transaction(&mut [
                Operation::Write(&[register.read_addr()]),
                Operation::Read(&mut value),
            ])
            .map_err(bus_fault)?;
        Ok(value[0])
    }

    fn write_fifo(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[Register::Fifo.write_addr()]),
                Operation::Write(payload),
            ])
            .map_err(bus_fault)
    }

    fn read_fifo(&mut self, buffer: &mut [u8]) -> Result<(), RadioError> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[Register::Fifo.read_addr()]),
                Operation::Read(buffer),
            ])
            .map_err(bus_fault)
    }
}

impl<SPI, RST, D> Transceiver for Sx127x<SPI, RST, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    D: DelayNs,
{
    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        Sx127x::send(self, payload)
    }

    fn poll_receive(&mut self) -> Result<Option<RxPacket>, RadioError> {
        Sx127x::poll_receive(self)
    }
}
