//! Two-LED indicator over GPIO output pins

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use super::Indicator;

/// Status flash length
pub const HEARTBEAT_MS: u32 = 50;

/// Error blink on and off time
pub const BLINK_MS: u32 = 200;

/// Active-high LED that remembers its last driven state
pub struct Led<P: OutputPin> {
    pin: P,
    is_on: bool,
}

impl<P: OutputPin> Led<P> {
    /// Wrap a pin, switching it off
    pub fn new(mut pin: P) -> Self {
        pin.set_low().ok();
        Self { pin, is_on: false }
    }

    pub fn set(&mut self, on: bool) {
        if on {
            self.pin.set_high().ok();
        } else {
            self.pin.set_low().ok();
        }
        self.is_on = on;
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn free(self) -> P {
        self.pin
    }
}

/// Status and error LEDs sharing one delay source
pub struct LedIndicator<S: OutputPin, E: OutputPin, D> {
    status: Led<S>,
    error: Led<E>,
    delay: D,
}

impl<S: OutputPin, E: OutputPin, D: DelayNs> LedIndicator<S, E, D> {
    /// Both LEDs start off
    pub fn new(status: S, error: E, delay: D) -> Self {
        Self {
            status: Led::new(status),
            error: Led::new(error),
            delay,
        }
    }

    pub fn status_is_on(&self) -> bool {
        self.status.is_on()
    }

    pub fn error_is_on(&self) -> bool {
        self.error.is_on()
    }

    /// Switch both LEDs off and hand back the pins
    pub fn release(mut self) -> (S, E) {
        self.status.set(false);
        self.error.set(false);
        (self.status.free(), self.error.free())
    }
}

impl<S: OutputPin, E: OutputPin, D: DelayNs> Indicator for LedIndicator<S, E, D> {
    fn status_on(&mut self) {
        self.status.set(true);
    }

    fn status_off(&mut self) {
        self.status.set(false);
    }

    fn heartbeat(&mut self) {
        self.status.set(true);
        self.delay.delay_ms(HEARTBEAT_MS);
        self.status.set(false);
    }

    fn error_blink(&mut self, count: u32) {
        for _ in 0..count {
            self.error.set(true);
            self.delay.delay_ms(BLINK_MS);
            self.error.set(false);
            self.delay.delay_ms(BLINK_MS);
        }
    }
}
