//! # Radio Module
//!
//! LoRa link over an SX127x transceiver.
//!
//! This module handles:
//! - Register map and operating modes (`registers`)
//! - Modulation settings and frequency synthesis (`config`)
//! - Reset, identification, framed transmit and polled receive (`driver`)

pub mod config;
pub mod driver;
pub mod registers;

#[cfg(test)]
pub(crate) mod mocks;

pub use config::RadioConfig;
pub use driver::Sx127x;
pub use registers::RadioMode;

use crate::error::RadioError;

/// A frame pulled out of the receive FIFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxPacket {
    /// Raw payload bytes
    pub payload: Vec<u8>,
    /// Packet RSSI in dBm
    pub rssi_dbm: i16,
    /// False if the modem latched a payload CRC error for this frame
    pub crc_valid: bool,
}

/// Half-duplex, single-channel packet link
#[cfg_attr(test, mockall::automock)]
pub trait Transceiver {
    /// Transmit one frame, blocking until it is on air or the budget runs out
    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError>;

    /// Return a pending frame, if any, without blocking
    fn poll_receive(&mut self) -> Result<Option<RxPacket>, RadioError>;
}
