//! # Indicator Module
//!
//! Visual status for the payload: a status LED that flashes on every good
//! transmission and an error LED that blinks a count identifying the fault.
//!
//! | Event                     | Pattern        |
//! |---------------------------|----------------|
//! | Send succeeded            | status flash   |
//! | Send or read failed       | 1 error blink  |
//! | Storage unavailable       | 2 error blinks |
//! | Sensor or radio missing   | 3 error blinks |
//! | Unrecoverable loop fault  | 5 error blinks |

pub mod led;

pub use led::LedIndicator;

/// Mission events that have a visual pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indication {
    SendOk,
    SendFailed,
    ReadFailed,
    StorageInitFailed,
    SensorInitFailed,
    RadioInitFailed,
    Fault,
}

impl Indication {
    /// Number of error blinks, or `None` for the status flash
    pub fn blink_count(self) -> Option<u32> {
        match self {
            Indication::SendOk => None,
            Indication::SendFailed | Indication::ReadFailed => Some(1),
            Indication::StorageInitFailed => Some(2),
            Indication::SensorInitFailed | Indication::RadioInitFailed => Some(3),
            Indication::Fault => Some(5),
        }
    }
}

/// Status and error lights
///
/// Indicators are best effort: a failing LED never interrupts the mission.
#[cfg_attr(test, mockall::automock)]
pub trait Indicator {
    fn status_on(&mut self);

    fn status_off(&mut self);

    /// Brief status flash
    fn heartbeat(&mut self);

    /// Blink the error light `count` times
    fn error_blink(&mut self, count: u32);

    fn signal(&mut self, indication: Indication) {
        match indication.blink_count() {
            None => self.heartbeat(),
            Some(count) => self.error_blink(count),
        }
    }
}

/// Indicator for runs without LEDs
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIndicator;

impl Indicator for NullIndicator {
    fn status_on(&mut self) {}
    fn status_off(&mut self) {}
    fn heartbeat(&mut self) {}
    fn error_blink(&mut self, _count: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blink_counts() {
        assert_eq!(Indication::SendOk.blink_count(), None);
        assert_eq!(Indication::SendFailed.blink_count(), Some(1));
        assert_eq!(Indication::ReadFailed.blink_count(), Some(1));
        assert_eq!(Indication::StorageInitFailed.blink_count(), Some(2));
        assert_eq!(Indication::SensorInitFailed.blink_count(), Some(3));
        assert_eq!(Indication::RadioInitFailed.blink_count(), Some(3));
        assert_eq!(Indication::Fault.blink_count(), Some(5));
    }

    /// Counts calls through the default `signal`
    #[derive(Default)]
    struct Counting {
        heartbeats: u32,
        blinks: Vec<u32>,
    }

    impl Indicator for Counting {
        fn status_on(&mut self) {}
        fn status_off(&mut self) {}
        fn heartbeat(&mut self) {
            self.heartbeats += 1;
        }
        fn error_blink(&mut self, count: u32) {
            self.blinks.push(count);
        }
    }

    #[test]
    fn test_signal_dispatches_to_pattern() {
        let mut indicator = Counting::default();
        indicator.signal(Indication::SendOk);
        indicator.signal(Indication::StorageInitFailed);
        indicator.signal(Indication::Fault);

        assert_eq!(indicator.heartbeats, 1);
        assert_eq!(indicator.blinks, vec![2, 5]);
    }

    #[test]
    fn test_null_indicator_accepts_everything() {
        let mut indicator = NullIndicator;
        indicator.status_on();
        indicator.signal(Indication::Fault);
        indicator.status_off();
    }
}
