//! # Hardware Module
//!
//! Platform glue between the drivers and real peripherals.
//!
//! The drivers are written against `embedded-hal` traits only. This module
//! provides a `std` delay and, with the `rpi` feature, Raspberry Pi adapters
//! for SPI, I2C and GPIO.

#[cfg(feature = "rpi")]
pub mod rpi;

use embedded_hal::delay::DelayNs;
use std::time::Duration;

/// Blocking delay backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
