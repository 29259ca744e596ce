//! Comma-separated telemetry frame
//!
//! Wire format (ASCII, no escaping):
//!
//! ```text
//! mission_id,sequence,temperature,pressure,altitude,audio_level
//! COSMIG2026,42,25.34,1013.25,150.2,0.1234
//! ```
//!
//! Temperature and pressure carry two decimals, altitude one, audio level
//! four. Trailing fields beyond the sixth are ignored on decode.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::error::{CansatError, Result};

/// Minimum number of comma-separated fields in a frame
pub const FIELD_COUNT: usize = 6;

/// One telemetry sample as sent over the air
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryPacket {
    pub mission_id: String,
    pub sequence: u64,
    /// °C
    pub temperature_c: f64,
    /// hPa
    pub pressure_hpa: f64,
    /// m above the reference level
    pub altitude_m: f64,
    /// Normalized RMS level, 0..=1
    pub audio_level: f64,
}

impl TelemetryPacket {
    /// Render the wire string
    pub fn encode(&self) -> String {
        format!(
            "{},{},{:.2},{:.2},{:.1},{:.4}",
            self.mission_id,
            self.sequence,
            self.temperature_c,
            self.pressure_hpa,
            self.altitude_m,
            self.audio_level
        )
    }

    /// Wire bytes ready for the transceiver
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().into_bytes()
    }

    /// Parse a wire string
    ///
    /// Decoding is all-or-nothing: any missing or malformed field rejects
    /// the whole frame. The mission id is carried through untouched.
    pub fn decode(frame: &str) -> Result<Self> {
        let fields: Vec<&str> = frame.trim().split(',').collect();
        if fields.len() < FIELD_COUNT {
            return Err(CansatError::Decode(format!(
                "expected at least {} fields, got {}",
                FIELD_COUNT,
                fields.len()
            )));
        }

        let sequence = fields[1]
            .trim()
            .parse::<u64>()
            .map_err(|e| CansatError::Decode(format!("sequence {:?}: {}", fields[1], e)))?;

        Ok(Self {
            mission_id: fields[0].to_string(),
            sequence,
            temperature_c: parse_float("temperature", fields[2])?,
            pressure_hpa: parse_float("pressure", fields[3])?,
            altitude_m: parse_float("altitude", fields[4])?,
            audio_level: parse_float("audio level", fields[5])?,
        })
    }

    /// Decode raw radio bytes; invalid UTF-8 is replaced rather than rejected
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decode(&String::from_utf8_lossy(bytes))
    }

    /// Like [`decode`](Self::decode) but discards the reason
    pub fn parse(frame: &str) -> Option<Self> {
        Self::decode(frame).ok()
    }
}

impl fmt::Display for TelemetryPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_float(name: &str, field: &str) -> Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|e| CansatError::Decode(format!("{} {:?}: {}", name, field, e)))
}

/// A decoded packet with the listener's link metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedTelemetry {
    #[serde(flatten)]
    pub packet: TelemetryPacket,
    pub rssi_dbm: i16,
    pub received_at: DateTime<Utc>,
}

impl fmt::Display for ReceivedTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.packet;
        writeln!(f, "Mission ID:  {}", p.mission_id)?;
        writeln!(f, "Packet #:    {}", p.sequence)?;
        writeln!(f, "Temperature: {:.2} °C", p.temperature_c)?;
        writeln!(f, "Pressure:    {:.2} hPa", p.pressure_hpa)?;
        writeln!(f, "Altitude:    {:.1} m", p.altitude_m)?;
        writeln!(f, "Audio RMS:   {:.4}", p.audio_level)?;
        writeln!(f, "RSSI:        {} dBm", self.rssi_dbm)?;
        write!(f, "Time:        {}", self.received_at.format("%H:%M:%S"))
    }
}
