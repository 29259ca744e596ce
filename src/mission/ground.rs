//! Ground-side receiver

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::RadioError;
use crate::radio::Transceiver;
use crate::storage::ReceptionLog;
use crate::telemetry::{ReceivedTelemetry, TelemetryPacket};

/// Link quality counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames that decoded into a packet
    pub received: u64,
    /// Frames dropped because the modem flagged a CRC error
    pub crc_errors: u64,
    /// Frames that passed CRC but did not decode
    pub malformed: u64,
    /// Sequence numbers skipped between consecutive packets
    pub missed: u64,
    pub last_sequence: Option<u64>,
}

impl LinkStats {
    fn record_sequence(&mut self, sequence: u64) {
        if let Some(last) = self.last_sequence {
            if let Some(expected) = last.checked_add(1) {
                if sequence > expected {
                    self.missed = self.missed.saturating_add(sequence - expected);
                }
            }
        }
        self.last_sequence = Some(sequence);
    }
}

pub struct GroundStation {
    radio: Box<dyn Transceiver>,
    log: Option<Box<dyn ReceptionLog>>,
    stats: LinkStats,
}

impl GroundStation {
    pub fn new(radio: Box<dyn Transceiver>) -> Self {
        Self {
            radio,
            log: None,
            stats: LinkStats::default(),
        }
    }

    pub fn with_log(mut self, log: Box<dyn ReceptionLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Check the radio once and decode any pending frame
    ///
    /// Corrupt or malformed frames are counted and yield `Ok(None)`; only
    /// bus-level failures are returned as errors.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Result<Option<ReceivedTelemetry>, RadioError> {
        let Some(frame) = self.radio.poll_receive()? else {
            return Ok(None);
        };

        if !frame.crc_valid {
            self.stats.crc_errors += 1;
            debug!("Dropped frame with CRC error ({} bytes, {} dBm)", frame.payload.len(), frame.rssi_dbm);
            return Ok(None);
        }

        let packet = match TelemetryPacket::from_bytes(&frame.payload) {
            Ok(packet) => packet,
            Err(e) => {
                self.stats.malformed += 1;
                debug!("Dropped malformed frame: {}", e);
                return Ok(None);
            }
        };

        self.stats.received += 1;
        self.stats.record_sequence(packet.sequence);

        let received = ReceivedTelemetry {
            packet,
            rssi_dbm: frame.rssi_dbm,
            received_at: now,
        };

        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.append(&received) {
                warn!("Reception log append failed: {}", e);
            }
        }

        Ok(Some(received))
    }
}
