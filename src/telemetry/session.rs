//! Sender-side transmission session
//!
//! Owns the packet sequence counter and transmit cadence. The counter
//! starts at 1, advances once per packet built, and never resets for the
//! lifetime of the session.

use std::time::{Duration, Instant};

use super::packet::TelemetryPacket;
use crate::sensor::Measurement;

#[derive(Debug, Clone)]
pub struct SenderSession {
    mission_id: String,
    next_sequence: u64,
    started_at: Instant,
    interval: Duration,
    last_send: Option<Instant>,
}

impl SenderSession {
    pub fn new(mission_id: impl Into<String>, interval: Duration, started_at: Instant) -> Self {
        Self {
            mission_id: mission_id.into(),
            next_sequence: 1,
            started_at,
            interval,
            last_send: None,
        }
    }

    pub fn mission_id(&self) -> &str {
        &self.mission_id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sequence number the next packet will carry
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// True if no packet has been sent yet or a full interval has elapsed
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_send {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Record a transmit attempt at `now`
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_send = Some(now);
    }

    /// Build the next packet, consuming a sequence number
    pub fn next_packet(&mut self, measurement: &Measurement, audio_level: f64) -> TelemetryPacket {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        TelemetryPacket {
            mission_id: self.mission_id.clone(),
            sequence,
            temperature_c: measurement.temperature_c,
            pressure_hpa: measurement.pressure_hpa,
            altitude_m: measurement.altitude_m,
            audio_level,
        }
    }

    /// Seconds since the session started
    pub fn mission_time(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.started_at).as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(start: Instant) -> SenderSession {
        SenderSession::new("COSMIG2026", Duration::from_secs(1), start)
    }

    #[test]
    fn test_first_send_is_due_immediately() {
        let start = Instant::now();
        assert!(session(start).is_due(start));
    }

    #[test]
    fn test_is_due_after_interval() {
        let start = Instant::now();
        let mut s = session(start);
        s.mark_sent(start);

        assert!(!s.is_due(start + Duration::from_millis(999)));
        assert!(s.is_due(start + Duration::from_millis(1000)));
        assert!(s.is_due(start + Duration::from_millis(2500)));
    }

    #[test]
    fn test_sequence_starts_at_one_and_increments() {
        let mut s = session(Instant::now());
        let m = Measurement::zero();

        assert_eq!(s.next_sequence(), 1);
        assert_eq!(s.next_packet(&m, 0.0).sequence, 1);
        assert_eq!(s.next_packet(&m, 0.0).sequence, 2);
        assert_eq!(s.next_packet(&m, 0.0).sequence, 3);
        assert_eq!(s.next_sequence(), 4);
    }

    #[test]
    fn test_packet_carries_measurement() {
        let mut s = session(Instant::now());
        let m = Measurement {
            temperature_c: 25.34,
            pressure_hpa: 1013.25,
            altitude_m: 150.2,
        };

        let packet = s.next_packet(&m, 0.1234);
        assert_eq!(packet.encode(), "COSMIG2026,1,25.34,1013.25,150.2,0.1234");
    }

    #[test]
    fn test_mission_time() {
        let start = Instant::now();
        let s = session(start);
        assert_eq!(s.mission_time(start), 0.0);
        assert!((s.mission_time(start + Duration::from_millis(1500)) - 1.5).abs() < 1e-9);
    }
}
