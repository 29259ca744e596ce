//! # Storage Module
//!
//! On-disk records of the mission.
//!
//! This module handles:
//! - The payload's CSV flight log, buffered in memory and written in batches
//! - The ground station's JSON Lines reception log, one object per packet

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::sensor::Measurement;
use crate::telemetry::{ReceivedTelemetry, TelemetryPacket};

/// CSV column header of the flight log
pub const FLIGHT_LOG_HEADER: &str = "timestamp,sequence,temp_c,pressure_hpa,altitude_m,audio_rms";

/// Unwritten rows kept while the card is failing, in multiples of `buffer_size`
const MAX_PENDING_BATCHES: usize = 20;

/// Sink for one row per telemetry cycle
#[cfg_attr(test, mockall::automock)]
pub trait FlightLog {
    /// Record a cycle; `timestamp` is mission time in seconds
    fn append(&mut self, timestamp: f64, measurement: &Measurement, packet: &TelemetryPacket) -> Result<()>;

    /// Write out anything still buffered
    fn flush(&mut self) -> Result<()>;
}

/// Sink for packets decoded by the ground station
#[cfg_attr(test, mockall::automock)]
pub trait ReceptionLog {
    fn append(&mut self, telemetry: &ReceivedTelemetry) -> Result<()>;
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Buffered CSV flight log
///
/// Rows are held in memory and appended to the file every `buffer_size`
/// records, on [`flush`](FlightLog::flush), and when the log is dropped.
/// The header is written only when the file is new or empty, so a restart
/// continues the same log.
///
/// Rows that fail to write stay queued and are retried on the next batch.
/// The queue is bounded; once full, the oldest rows are discarded.
pub struct CsvFlightLog {
    path: PathBuf,
    file: File,
    buffer: VecDeque<String>,
    buffer_size: usize,
    max_pending: usize,
    dropped: u64,
}

impl CsvFlightLog {
    pub fn create(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = open_append(&path)?;

        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", FLIGHT_LOG_HEADER)?;
        }

        info!("Flight log: {}", path.display());
        let buffer_size = buffer_size.max(1);
        Ok(Self {
            path,
            file,
            buffer: VecDeque::with_capacity(buffer_size),
            buffer_size,
            max_pending: buffer_size.saturating_mul(MAX_PENDING_BATCHES),
            dropped: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows waiting to be written
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Rows discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn format_row(timestamp: f64, measurement: &Measurement, packet: &TelemetryPacket) -> String {
        format!(
            "{:.3},{},{:.2},{:.2},{:.1},{:.4}\n",
            timestamp,
            packet.sequence,
            measurement.temperature_c,
            measurement.pressure_hpa,
            measurement.altitude_m,
            packet.audio_level
        )
    }
}

impl FlightLog for CsvFlightLog {
    fn append(&mut self, timestamp: f64, measurement: &Measurement, packet: &TelemetryPacket) -> Result<()> {
        if self.buffer.len() >= self.max_pending {
            self.buffer.pop_front();
            self.dropped += 1;
            if self.dropped == 1 || self.dropped % self.max_pending as u64 == 0 {
                warn!("Flight log queue full, {} rows discarded so far", self.dropped);
            }
        }

        self.buffer.push_back(Self::format_row(timestamp, measurement, packet));
        if self.buffer.len() >= self.buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut written = 0;
        while let Some(row) = self.buffer.front() {
            self.file.write_all(row.as_bytes())?;
            self.buffer.pop_front();
            written += 1;
        }
        self.file.flush()?;

        debug!("Flushed {} rows to {}", written, self.path.display());
        Ok(())
    }
}

impl Drop for CsvFlightLog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Lost {} buffered flight log rows: {}", self.buffer.len(), e);
        }
    }
}

/// JSON Lines log of received packets, written through on every append
pub struct JsonlReceptionLog {
    path: PathBuf,
    file: File,
    records: u64,
}

impl JsonlReceptionLog {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_append(&path)?;
        info!("Reception log: {}", path.display());
        Ok(Self { path, file, records: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written by this instance
    pub fn records(&self) -> u64 {
        self.records
    }
}

impl ReceptionLog for JsonlReceptionLog {
    fn append(&mut self, telemetry: &ReceivedTelemetry) -> Result<()> {
        let mut line = serde_json::to_string(telemetry)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.records += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn measurement() -> Measurement {
        Measurement {
            temperature_c: 25.08,
            pressure_hpa: 1006.72,
            altitude_m: 55.54,
        }
    }

    fn packet(sequence: u64) -> TelemetryPacket {
        TelemetryPacket {
            mission_id: "COSMIG2026".to_string(),
            sequence,
            temperature_c: 25.08,
            pressure_hpa: 1006.72,
            altitude_m: 55.54,
            audio_level: 0.25,
        }
    }

    #[test]
    fn test_flight_log_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flight.csv");

        drop(CsvFlightLog::create(&path, 5).unwrap());
        drop(CsvFlightLog::create(&path, 5).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{}\n", FLIGHT_LOG_HEADER));
    }

    #[test]
    fn test_flight_log_buffers_until_threshold() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flight.csv");
        let mut log = CsvFlightLog::create(&path, 3).unwrap();

        log.append(1.0, &measurement(), &packet(1)).unwrap();
        log.append(2.0, &measurement(), &packet(2)).unwrap();
        assert_eq!(log.pending(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);

        log.append(3.0, &measurement(), &packet(3)).unwrap();
        assert_eq!(log.pending(), 0);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "1.000,1,25.08,1006.72,55.5,0.2500");
        assert_eq!(lines[3], "3.000,3,25.08,1006.72,55.5,0.2500");
    }

    #[test]
    fn test_flight_log_flushes_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flight.csv");
        {
            let mut log = CsvFlightLog::create(&path, 10).unwrap();
            log.append(0.5, &measurement(), &packet(1)).unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_flight_log_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run1").join("flight.csv");
        let log = CsvFlightLog::create(&path, 1).unwrap();
        assert!(log.path().exists());
    }

    #[test]
    fn test_reception_log_writes_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ground.jsonl");
        let mut log = JsonlReceptionLog::create(&path).unwrap();

        for sequence in 1..=2 {
            log.append(&ReceivedTelemetry {
                packet: packet(sequence),
                rssi_dbm: -90,
                received_at: Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap(),
            })
            .unwrap();
        }
        assert_eq!(log.records(), 2);

        let content = fs::read_to_string(&path).unwrap();
        let records: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["sequence"], 2);
        assert_eq!(records[1]["rssi_dbm"], -90);
        assert_eq!(records[0]["pressure_hpa"], 1006.72);
    }

    #[test]
    fn test_flight_log_bounds_queue_while_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flight.csv");
        let mut log = CsvFlightLog::create(&path, 5).unwrap();
        log.file = File::open(&path).unwrap();

        let mut errors = 0;
        for sequence in 1..=1000 {
            if log.append(sequence as f64, &measurement(), &packet(sequence)).is_err() {
                errors += 1;
            }
        }
        assert_eq!(errors, 996);
        assert_eq!(log.pending(), 100);
        assert_eq!(log.dropped(), 900);

        log.file = OpenOptions::new().append(true).open(&path).unwrap();
        log.flush().unwrap();
        assert_eq!(log.pending(), 0);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 101);
        assert!(lines[1].starts_with("901.000,901,"));
        assert!(lines[100].starts_with("1000.000,1000,"));
    }
}
