//! Payload-side telemetry cycle
//!
//! Every subsystem except the indicator is optional. A missing barometer
//! yields zero readings, a missing microphone a zero audio level, a missing
//! radio skips transmission and a missing flight log skips storage. The
//! cycle itself never fails; per-subsystem outcomes are reported instead.

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::audio::AudioSource;
use crate::error::{RadioError, Result};
use crate::indicator::{Indication, Indicator};
use crate::radio::Transceiver;
use crate::sensor::{Measurement, ReadingSource};
use crate::storage::FlightLog;
use crate::telemetry::{SenderSession, TelemetryPacket};

/// What happened to the packet built in a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Sent,
    /// No transceiver fitted
    NoRadio,
    Failed(RadioError),
}

/// Result of one telemetry cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// Sensors could not be read; no packet was built
    ReadFailed(String),
    Completed {
        packet: TelemetryPacket,
        send: SendOutcome,
        logged: bool,
    },
}

impl CycleReport {
    pub fn packet(&self) -> Option<&TelemetryPacket> {
        match self {
            CycleReport::Completed { packet, .. } => Some(packet),
            CycleReport::ReadFailed(_) => None,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, CycleReport::Completed { send: SendOutcome::Sent, .. })
    }
}

/// Running totals over the mission
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlightStats {
    pub cycles: u64,
    pub sent: u64,
    pub send_failures: u64,
    pub read_failures: u64,
}

pub struct FlightComputer {
    session: SenderSession,
    sea_level_hpa: f64,
    indicator: Box<dyn Indicator>,
    sensor: Option<Box<dyn ReadingSource>>,
    radio: Option<Box<dyn Transceiver>>,
    audio: Option<Box<dyn AudioSource>>,
    log: Option<Box<dyn FlightLog>>,
    stats: FlightStats,
}

impl FlightComputer {
    pub fn new(session: SenderSession, sea_level_hpa: f64, indicator: Box<dyn Indicator>) -> Self {
        Self {
            session,
            sea_level_hpa,
            indicator,
            sensor: None,
            radio: None,
            audio: None,
            log: None,
            stats: FlightStats::default(),
        }
    }

    pub fn with_sensor(mut self, sensor: Box<dyn ReadingSource>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn with_radio(mut self, radio: Box<dyn Transceiver>) -> Self {
        self.radio = Some(radio);
        self
    }

    pub fn with_audio(mut self, audio: Box<dyn AudioSource>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_log(mut self, log: Box<dyn FlightLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn session(&self) -> &SenderSession {
        &self.session
    }

    pub fn stats(&self) -> FlightStats {
        self.stats
    }

    /// Run a cycle if the transmit interval has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<CycleReport> {
        if !self.session.is_due(now) {
            return None;
        }
        self.session.mark_sent(now);
        Some(self.run_cycle(now))
    }

    /// Read, encode, send, log and signal once
    pub fn run_cycle(&mut self, now: Instant) -> CycleReport {
        self.stats.cycles += 1;

        let (measurement, audio_level) = match self.read_inputs() {
            Ok(inputs) => inputs,
            Err(e) => {
                warn!("Sensor read failed: {}", e);
                self.stats.read_failures += 1;
                self.indicator.signal(Indication::ReadFailed);
                return CycleReport::ReadFailed(e.to_string());
            }
        };

        let packet = self.session.next_packet(&measurement, audio_level);
        let send = self.transmit(&packet);

        let timestamp = self.session.mission_time(now);
        let logged = match self.log.as_mut() {
            Some(log) => match log.append(timestamp, &measurement, &packet) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Flight log append failed: {}", e);
                    false
                }
            },
            None => false,
        };

        CycleReport::Completed { packet, send, logged }
    }

    fn read_inputs(&mut self) -> Result<(Measurement, f64)> {
        let measurement = match self.sensor.as_mut() {
            Some(sensor) => Measurement::from_reading(&sensor.read()?, self.sea_level_hpa),
            None => Measurement::zero(),
        };

        let audio_level = match self.audio.as_mut() {
            Some(audio) => audio.rms_level()?,
            None => 0.0,
        };

        Ok((measurement, audio_level))
    }

    fn transmit(&mut self, packet: &TelemetryPacket) -> SendOutcome {
        let Some(radio) = self.radio.as_mut() else {
            debug!("No radio, packet #{} not sent", packet.sequence);
            return SendOutcome::NoRadio;
        };

        match radio.send(&packet.to_bytes()) {
            Ok(()) => {
                debug!("Sent packet #{}: {}", packet.sequence, packet);
                self.stats.sent += 1;
                self.indicator.signal(Indication::SendOk);
                SendOutcome::Sent
            }
            Err(e) => {
                warn!("Send of packet #{} failed: {}", packet.sequence, e);
                self.stats.send_failures += 1;
                self.indicator.signal(Indication::SendFailed);
                SendOutcome::Failed(e)
            }
        }
    }

    /// Flush storage and switch the status light off
    ///
    /// A flush failure is signalled as a fault before being returned.
    pub fn shutdown(&mut self) -> Result<()> {
        info!(
            "Mission ended: {} cycles, {} sent, {} send failures, {} read failures",
            self.stats.cycles, self.stats.sent, self.stats.send_failures, self.stats.read_failures
        );

        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.flush() {
                self.indicator.signal(Indication::Fault);
                return Err(e);
            }
        }
        self.indicator.status_off();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioSource;
    use crate::error::{CansatError, SensorError};
    use crate::indicator::MockIndicator;
    use crate::radio::MockTransceiver;
    use crate::sensor::compensation::CompensatedReading;
    use crate::sensor::MockReadingSource;
    use crate::storage::MockFlightLog;
    use mockall::predicate::eq;
    use std::time::Duration;

    fn session(start: Instant) -> SenderSession {
        SenderSession::new("COSMIG2026", Duration::from_secs(1), start)
    }

    fn sea_level_sensor() -> MockReadingSource {
        let mut sensor = MockReadingSource::new();
        sensor.expect_read().returning(|| {
            Ok(CompensatedReading {
                temperature_centidegrees: 2534,
                pressure_pa_q8: 101_325 * 256,
            })
        });
        sensor
    }

    fn quiet_indicator() -> MockIndicator {
        let mut indicator = MockIndicator::new();
        indicator.expect_signal().return_const(());
        indicator.expect_status_off().return_const(());
        indicator
    }

    #[test]
    fn test_cycle_sends_encoded_packet() {
        let start = Instant::now();
        let mut radio = MockTransceiver::new();
        radio
            .expect_send()
            .withf(|payload| payload == b"COSMIG2026,1,25.34,1013.25,0.0,0.2500")
            .times(1)
            .returning(|_| Ok(()));

        let mut audio = MockAudioSource::new();
        audio.expect_rms_level().returning(|| Ok(0.25));

        let mut indicator = MockIndicator::new();
        indicator
            .expect_signal()
            .with(eq(Indication::SendOk))
            .times(1)
            .return_const(());

        let mut computer = FlightComputer::new(session(start), 1013.25, Box::new(indicator))
            .with_sensor(Box::new(sea_level_sensor()))
            .with_radio(Box::new(radio))
            .with_audio(Box::new(audio));

        let report = computer.run_cycle(start);
        assert!(report.is_sent());
        assert_eq!(report.packet().unwrap().sequence, 1);
        assert_eq!(computer.stats().sent, 1);
    }

    #[test]
    fn test_missing_sensor_sends_zero_readings() {
        let start = Instant::now();
        let mut radio = MockTransceiver::new();
        radio
            .expect_send()
            .withf(|payload| payload == b"COSMIG2026,1,0.00,0.00,0.0,0.0000")
            .times(1)
            .returning(|_| Ok(()));

        let mut computer = FlightComputer::new(session(start), 1013.25, Box::new(quiet_indicator()))
            .with_radio(Box::new(radio));

        assert!(computer.run_cycle(start).is_sent());
    }

    #[test]
    fn test_missing_radio_still_consumes_sequence_and_logs() {
        let start = Instant::now();
        let mut log = MockFlightLog::new();
        log.expect_append()
            .withf(|timestamp, _, packet| *timestamp == 0.0 && packet.sequence == 1)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut indicator = MockIndicator::new();
        indicator.expect_signal().never();

        let mut computer = FlightComputer::new(session(start), 1013.25, Box::new(indicator))
            .with_sensor(Box::new(sea_level_sensor()))
            .with_log(Box::new(log));

        let report = computer.run_cycle(start);
        match report {
            CycleReport::Completed { send, logged, .. } => {
                assert_eq!(send, SendOutcome::NoRadio);
                assert!(logged);
            }
            other => panic!("unexpected report: {:?}", other),
        }
        assert_eq!(computer.session().next_sequence(), 2);
    }

    #[test]
    fn test_send_failure_blinks_and_is_reported() {
        let start = Instant::now();
        let mut radio = MockTransceiver::new();
        radio
            .expect_send()
            .returning(|_| Err(RadioError::Timeout { attempts: 100 }));

        let mut indicator = MockIndicator::new();
        indicator
            .expect_signal()
            .with(eq(Indication::SendFailed))
            .times(1)
            .return_const(());

        let mut computer = FlightComputer::new(session(start), 1013.25, Box::new(indicator))
            .with_sensor(Box::new(sea_level_sensor()))
            .with_radio(Box::new(radio));

        let report = computer.run_cycle(start);
        match report {
            CycleReport::Completed { send, .. } => {
                assert_eq!(send, SendOutcome::Failed(RadioError::Timeout { attempts: 100 }));
            }
            other => panic!("unexpected report: {:?}", other),
        }
        assert_eq!(computer.stats().send_failures, 1);
    }

    #[test]
    fn test_read_failure_skips_send_and_keeps_sequence() {
        let start = Instant::now();
        let mut sensor = MockReadingSource::new();
        sensor
            .expect_read()
            .times(1)
            .returning(|| Err(SensorError::BusFault("nack".to_string())));

        let mut radio = MockTransceiver::new();
        radio.expect_send().never();

        let mut indicator = MockIndicator::new();
        indicator
            .expect_signal()
            .with(eq(Indication::ReadFailed))
            .times(1)
            .return_const(());

        let mut computer = FlightComputer::new(session(start), 1013.25, Box::new(indicator))
            .with_sensor(Box::new(sensor))
            .with_radio(Box::new(radio));

        assert!(matches!(computer.run_cycle(start), CycleReport::ReadFailed(_)));
        assert_eq!(computer.session().next_sequence(), 1);
        assert_eq!(computer.stats().read_failures, 1);
    }

    #[test]
    fn test_audio_failure_counts_as_read_failure() {
        let start = Instant::now();
        let mut audio = MockAudioSource::new();
        audio
            .expect_rms_level()
            .returning(|| Err(CansatError::Hardware("stream closed".to_string())));

        let mut computer = FlightComputer::new(session(start), 1013.25, Box::new(quiet_indicator()))
            .with_audio(Box::new(audio));

        assert!(matches!(computer.run_cycle(start), CycleReport::ReadFailed(_)));
    }

    #[test]
    fn test_log_failure_does_not_stop_cycle() {
        let start = Instant::now();
        let mut log = MockFlightLog::new();
        log.expect_append()
            .returning(|_, _, _| Err(CansatError::Io(std::io::Error::other("disk full"))));

        let mut computer = FlightComputer::new(session(start), 1013.25, Box::new(quiet_indicator()))
            .with_log(Box::new(log));

        match computer.run_cycle(start) {
            CycleReport::Completed { logged, .. } => assert!(!logged),
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[test]
    fn test_poll_respects_interval() {
        let start = Instant::now();
        let mut radio = MockTransceiver::new();
        radio.expect_send().times(2).returning(|_| Ok(()));

        let mut computer = FlightComputer::new(session(start), 1013.25, Box::new(quiet_indicator()))
            .with_radio(Box::new(radio));

        assert!(computer.poll(start).is_some());
        assert!(computer.poll(start + Duration::from_millis(500)).is_none());
        let report = computer.poll(start + Duration::from_millis(1000)).unwrap();
        assert_eq!(report.packet().unwrap().sequence, 2);
    }

    #[test]
    fn test_log_timestamp_is_mission_time() {
        let start = Instant::now();
        let mut log = MockFlightLog::new();
        log.expect_append()
            .withf(|timestamp, _, _| (*timestamp - 2.5).abs() < 1e-9)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut computer = FlightComputer::new(session(start), 1013.25, Box::new(quiet_indicator()))
            .with_log(Box::new(log));

        computer.run_cycle(start + Duration::from_millis(2500));
    }

    #[test]
    fn test_shutdown_flushes_log() {
        let mut log = MockFlightLog::new();
        log.expect_flush().times(1).returning(|| Ok(()));

        let mut indicator = MockIndicator::new();
        indicator.expect_status_off().times(1).return_const(());

        let mut computer = FlightComputer::new(session(Instant::now()), 1013.25, Box::new(indicator))
            .with_log(Box::new(log));

        computer.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_flush_failure_signals_fault() {
        let mut log = MockFlightLog::new();
        log.expect_flush()
            .returning(|| Err(CansatError::Io(std::io::Error::other("card removed"))));

        let mut indicator = MockIndicator::new();
        indicator
            .expect_signal()
            .with(eq(Indication::Fault))
            .times(1)
            .return_const(());

        let mut computer = FlightComputer::new(session(Instant::now()), 1013.25, Box::new(indicator))
            .with_log(Box::new(log));

        assert!(computer.shutdown().is_err());
    }
}
