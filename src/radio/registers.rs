//! # SX127x Register Map
//!
//! LoRa-mode register addresses and bit definitions for the SX1276/77/78/79
//! family (RFM95W modules).

/// Expected value of `RegVersion` on supported silicon
pub const SX127X_VERSION: u8 = 0x12;

/// Bit 7 of an address byte selects a write access
const WRITE_FLAG: u8 = 0x80;

/// `RegOpMode` long-range (LoRa) mode selector
pub const LONG_RANGE_MODE: u8 = 0x80;

/// `RegIrqFlags` bits
pub const IRQ_TX_DONE: u8 = 0x08;
pub const IRQ_PAYLOAD_CRC_ERROR: u8 = 0x20;
pub const IRQ_RX_DONE: u8 = 0x40;

/// Writing all ones clears every latched IRQ flag
pub const IRQ_CLEAR_ALL: u8 = 0xFF;

/// `RegPaConfig` PA_BOOST output selection
pub const PA_BOOST: u8 = 0x80;

/// `RegLna`: G1 (maximum) gain, LNA boost on
pub const LNA_MAX_GAIN_BOOST: u8 = 0x23;

/// `RegModemConfig2` RxPayloadCrcOn bit
pub const RX_PAYLOAD_CRC_ON: u8 = 0x04;

/// Addressable registers used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    Fifo = 0x00,
    OpMode = 0x01,
    FrfMsb = 0x06,
    FrfMid = 0x07,
    FrfLsb = 0x08,
    PaConfig = 0x09,
    Lna = 0x0C,
    FifoAddrPtr = 0x0D,
    FifoTxBaseAddr = 0x0E,
    FifoRxBaseAddr = 0x0F,
    FifoRxCurrentAddr = 0x10,
    IrqFlags = 0x12,
    RxNbBytes = 0x13,
    PktRssiValue = 0x1A,
    ModemConfig1 = 0x1D,
    ModemConfig2 = 0x1E,
    PreambleMsb = 0x20,
    PreambleLsb = 0x21,
    PayloadLength = 0x22,
    Version = 0x42,
}

impl Register {
    pub fn addr(self) -> u8 {
        self as u8
    }

    /// Address byte for a read access (bit 7 clear)
    pub fn read_addr(self) -> u8 {
        self.addr() & !WRITE_FLAG
    }

    /// Address byte for a write access (bit 7 set)
    pub fn write_addr(self) -> u8 {
        self.addr() | WRITE_FLAG
    }
}

/// Operating modes driven by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    Sleep,
    Standby,
    Transmit,
    ReceiveContinuous,
}

impl RadioMode {
    /// Full `RegOpMode` value, long-range mode bit included
    pub fn op_mode(self) -> u8 {
        let mode = match self {
            RadioMode::Sleep => 0x00,
            RadioMode::Standby => 0x01,
            RadioMode::Transmit => 0x03,
            RadioMode::ReceiveContinuous => 0x05,
        };
        LONG_RANGE_MODE | mode
    }
}
