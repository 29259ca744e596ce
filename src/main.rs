//! # CanSat
//!
//! Payload firmware: samples the barometer and microphone, broadcasts
//! telemetry over LoRa and keeps a CSV flight log.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, or built-in defaults)
//!    - Set up logging
//!    - Bring up LEDs, barometer, radio, flight log and microphone; a
//!      subsystem that fails to start is left out and blinked on the error LED
//!
//! 2. **Main Loop**
//!    - Tick every `loop_interval_ms`
//!    - Run a telemetry cycle whenever `telemetry_interval_ms` has elapsed
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Graceful Shutdown**
//!    - Flush the flight log
//!    - Log mission totals
//!
//! Run on the payload:
//! ```bash
//! cargo run --release --features rpi --bin cansat -- config/default.toml
//! ```

use anyhow::{Context, Result};
use std::time::Instant;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use cansat_telemetry::audio::{self, PcmMicrophone};
use cansat_telemetry::config::Config;
use cansat_telemetry::hw::rpi;
use cansat_telemetry::indicator::{Indication, Indicator, NullIndicator};
use cansat_telemetry::logging;
use cansat_telemetry::mission::{CycleReport, FlightComputer, SendOutcome};
use cansat_telemetry::storage::CsvFlightLog;
use cansat_telemetry::telemetry::SenderSession;

/// Number of cycles between status log messages
const LOG_INTERVAL_CYCLES: u64 = 60;

/// How long to wait for the capture daemon to open its end of the pipe
const MICROPHONE_OPEN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = Config::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    let _log_guard = logging::init(&config.logging);
    info!("CanSat v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Mission ID: {}", config.mission.id);

    let mut indicator: Box<dyn Indicator> = match rpi::open_indicator(&config.pins) {
        Ok(leds) => Box::new(leds),
        Err(e) => {
            warn!("LEDs unavailable, running without indicator: {}", e);
            Box::new(NullIndicator)
        }
    };
    indicator.status_on();

    let sensor = if config.sensor.enabled {
        match rpi::open_barometer(&config.sensor) {
            Ok(barometer) => {
                info!("BMP280 ready at 0x{:02X}", config.sensor.i2c_address);
                Some(barometer)
            }
            Err(e) => {
                warn!("Barometer unavailable, sending zero readings: {}", e);
                indicator.signal(Indication::SensorInitFailed);
                None
            }
        }
    } else {
        None
    };

    let radio = match rpi::open_radio(&config.pins, &config.radio) {
        Ok(radio) => Some(radio),
        Err(e) => {
            warn!("Radio unavailable, telemetry will only be logged: {}", e);
            indicator.signal(Indication::RadioInitFailed);
            None
        }
    };

    let flight_log = match CsvFlightLog::create(&config.storage.flight_log, config.storage.buffer_size) {
        Ok(log) => Some(log),
        Err(e) => {
            warn!("Flight log unavailable: {}", e);
            indicator.signal(Indication::StorageInitFailed);
            None
        }
    };

    let microphone = match &config.audio.source {
        Some(path) => match audio::open_stream(path, MICROPHONE_OPEN_TIMEOUT)
            .and_then(|stream| PcmMicrophone::new(stream, config.audio.bits, config.audio.block_samples))
        {
            Ok(mic) => {
                info!("Microphone stream: {}", path.display());
                Some(mic)
            }
            Err(e) => {
                warn!("Microphone unavailable: {}", e);
                indicator.signal(Indication::SensorInitFailed);
                None
            }
        },
        None => None,
    };

    let session = SenderSession::new(
        config.mission.id.clone(),
        Duration::from_millis(config.mission.telemetry_interval_ms),
        Instant::now(),
    );

    let mut computer = FlightComputer::new(session, config.mission.sea_level_hpa, indicator);
    if let Some(sensor) = sensor {
        computer = computer.with_sensor(Box::new(sensor));
    }
    if let Some(mic) = microphone {
        computer = computer.with_audio(Box::new(mic));
    }
    if let Some(radio) = radio {
        computer = computer.with_radio(Box::new(radio));
    }
    if let Some(log) = flight_log {
        computer = computer.with_log(Box::new(log));
    }

    sleep(Duration::from_millis(config.mission.startup_delay_ms)).await;

    let mut ticker = interval(Duration::from_millis(config.mission.loop_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Starting telemetry loop, one packet every {} ms",
        config.mission.telemetry_interval_ms
    );
    info!("Press Ctrl+C to exit");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(report) = computer.poll(Instant::now()) else {
                    continue;
                };

                match &report {
                    CycleReport::Completed { packet, send: SendOutcome::Failed(e), .. } => {
                        debug!("Packet #{} not delivered: {}", packet.sequence, e);
                    }
                    CycleReport::Completed { packet, .. } => {
                        debug!("Cycle complete: {}", packet);
                    }
                    CycleReport::ReadFailed(reason) => {
                        debug!("Cycle skipped: {}", reason);
                    }
                }

                let stats = computer.stats();
                if stats.cycles % LOG_INTERVAL_CYCLES == 0 {
                    info!(
                        "{} cycles, {} sent, {} send failures, {} read failures",
                        stats.cycles, stats.sent, stats.send_failures, stats.read_failures
                    );
                }
            }

            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Err(e) = computer.shutdown() {
        error!("Flight log flush failed: {}", e);
    }

    Ok(())
}
