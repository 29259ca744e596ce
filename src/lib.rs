//! # CanSat Telemetry Library
//!
//! Payload firmware and ground receiver for a CanSat mission.
//!
//! The payload samples a BMP280 barometer and a PCM microphone, encodes the
//! readings as a comma-separated text frame and broadcasts it over an
//! SX127x LoRa transceiver once per interval. The ground station listens on
//! the same channel, decodes each frame and records it with link quality.
//!
//! Drivers are written against `embedded-hal` traits; the `rpi` feature adds
//! a Raspberry Pi backend.

pub mod audio;
pub mod config;
pub mod error;
pub mod hw;
pub mod indicator;
pub mod logging;
pub mod mission;
pub mod radio;
pub mod sensor;
pub mod storage;
pub mod telemetry;
