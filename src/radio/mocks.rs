//! Simulated SX127x register file for driver tests

use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};
use std::sync::{Arc, Mutex};

use super::registers::{Register, IRQ_PAYLOAD_CRC_ERROR, IRQ_RX_DONE, IRQ_TX_DONE, SX127X_VERSION};

/// Injected bus failure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockSpiError;

impl embedded_hal::spi::Error for MockSpiError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Chip state shared between the test and the driver under test
pub struct ChipState {
    pub registers: [u8; 128],
    pub fifo: [u8; 256],
    /// Raise TxDone as soon as Transmit mode is entered
    pub tx_completes: bool,
    /// Fail every transaction
    pub failing: bool,
    pub transactions: usize,
    pub op_mode_writes: Vec<u8>,
    pub irq_clear_writes: Vec<u8>,
    pub register_writes: Vec<(u8, u8)>,
}

impl ChipState {
    fn write(&mut self, addr: u8, value: u8) {
        match addr {
            a if a == Register::Fifo.addr() => {
                let ptr = self.registers[Register::FifoAddrPtr.addr() as usize];
                self.fifo[ptr as usize] = value;
                self.registers[Register::FifoAddrPtr.addr() as usize] = ptr.wrapping_add(1);
                return;
            }
            a if a == Register::OpMode.addr() => {
                self.op_mode_writes.push(value);
                self.registers[a as usize] = value;
                if value & 0x07 == 0x03 && self.tx_completes {
                    self.registers[Register::IrqFlags.addr() as usize] |= IRQ_TX_DONE;
                }
            }
            a if a == Register::IrqFlags.addr() => {
                // Write one to clear
                self.irq_clear_writes.push(value);
                self.registers[a as usize] &= !value;
            }
            a => self.registers[a as usize] = value,
        }
        self.register_writes.push((addr, value));
    }

    fn read(&mut self, addr: u8) -> u8 {
        if addr == Register::Fifo.addr() {
            let ptr = self.registers[Register::FifoAddrPtr.addr() as usize];
            self.registers[Register::FifoAddrPtr.addr() as usize] = ptr.wrapping_add(1);
            return self.fifo[ptr as usize];
        }
        self.registers[addr as usize]
    }
}

/// Simulated transceiver on its own chip select
#[derive(Clone)]
pub struct SimulatedSx127x {
    pub state: Arc<Mutex<ChipState>>,
}

impl SimulatedSx127x {
    pub fn new() -> Self {
        let mut registers = [0u8; 128];
        registers[Register::Version.addr() as usize] = SX127X_VERSION;

        Self {
            state: Arc::new(Mutex::new(ChipState {
                registers,
                fifo: [0u8; 256],
                tx_completes: true,
                failing: false,
                transactions: 0,
                op_mode_writes: Vec::new(),
                irq_clear_writes: Vec::new(),
                register_writes: Vec::new(),
            })),
        }
    }

    pub fn register(&self, register: Register) -> u8 {
        self.state.lock().unwrap().registers[register.addr() as usize]
    }

    pub fn set_register(&self, register: Register, value: u8) {
        self.state.lock().unwrap().registers[register.addr() as usize] = value;
    }

    pub fn set_tx_completes(&self, completes: bool) {
        self.state.lock().unwrap().tx_completes = completes;
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn fifo(&self, start: usize, len: usize) -> Vec<u8> {
        self.state.lock().unwrap().fifo[start..start + len].to_vec()
    }

    pub fn op_mode_writes(&self) -> Vec<u8> {
        self.state.lock().unwrap().op_mode_writes.clone()
    }

    pub fn irq_clear_writes(&self) -> Vec<u8> {
        self.state.lock().unwrap().irq_clear_writes.clone()
    }

    pub fn register_writes(&self) -> Vec<(u8, u8)> {
        self.state.lock().unwrap().register_writes.clone()
    }

    pub fn transaction_count(&self) -> usize {
        self.state.lock().unwrap().transactions
    }

    pub fn clear_history(&self) {
        let mut chip = self.state.lock().unwrap();
        chip.op_mode_writes.clear();
        chip.irq_clear_writes.clear();
        chip.register_writes.clear();
    }

    /// Place a frame in the FIFO as the modem would and latch RxDone
    pub fn deliver(&self, payload: &[u8], fifo_start: u8, rssi_raw: u8, crc_error: bool) {
        let mut chip = self.state.lock().unwrap();
        let start = fifo_start as usize;
        chip.fifo[start..start + payload.len()].copy_from_slice(payload);
        chip.registers[Register::FifoRxCurrentAddr.addr() as usize] = fifo_start;
        chip.registers[Register::RxNbBytes.addr() as usize] = payload.len() as u8;
        chip.registers[Register::PktRssiValue.addr() as usize] = rssi_raw;

        let mut flags = IRQ_RX_DONE;
        if crc_error {
            flags |= IRQ_PAYLOAD_CRC_ERROR;
        }
        chip.registers[Register::IrqFlags.addr() as usize] |= flags;
    }
}

impl ErrorType for SimulatedSx127x {
    type Error = MockSpiError;
}

impl SpiDevice for SimulatedSx127x {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut chip = self.state.lock().unwrap();
        if chip.failing {
            return Err(MockSpiError);
        }
        chip.transactions += 1;

        // First byte of the select window is the address byte
        let mut access: Option<(u8, bool)> = None;

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        match access {
                            None => access = Some((byte & 0x7F, byte & 0x80 != 0)),
                            Some((addr, true)) => chip.write(addr, byte),
                            Some((_, false)) => {}
                        }
                    }
                }
                Operation::Read(buffer) => {
                    let Some((addr, _)) = access else {
                        return Err(MockSpiError);
                    };
                    for byte in buffer.iter_mut() {
                        *byte = chip.read(addr);
                    }
                }
                Operation::DelayNs(_) => {}
                _ => return Err(MockSpiError),
            }
        }
        Ok(())
    }
}
