//! # Telemetry Module
//!
//! Packets exchanged between the payload and the ground station.
//!
//! This module handles:
//! - Encoding and decoding the comma-separated wire frame (`packet`)
//! - Sequence numbering and transmit cadence on the sender (`session`)

pub mod packet;
pub mod session;

pub use packet::{ReceivedTelemetry, TelemetryPacket};
pub use session::SenderSession;
