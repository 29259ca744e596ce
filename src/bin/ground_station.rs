//! # Ground Station
//!
//! Listens on the mission channel, prints each decoded telemetry packet with
//! its RSSI and appends it to a JSON Lines reception log.
//!
//! Unlike the payload, the ground station cannot do anything useful without
//! its radio, so a radio that fails to initialize ends the program.
//!
//! ```bash
//! cargo run --release --features rpi --bin ground-station -- config/default.toml
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

use cansat_telemetry::config::Config;
use cansat_telemetry::hw::rpi;
use cansat_telemetry::logging;
use cansat_telemetry::mission::GroundStation;
use cansat_telemetry::storage::JsonlReceptionLog;

const RULE_WIDTH: usize = 60;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = Config::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    let _log_guard = logging::init(&config.logging);
    info!("CanSat Ground Station v{} starting...", env!("CARGO_PKG_VERSION"));

    let radio = rpi::open_radio(&config.pins, &config.radio).context("Failed to initialize radio")?;
    info!(
        "Listening on {:.1} MHz, SF{}, {} kHz",
        config.radio.frequency_hz / 1e6,
        config.radio.spreading_factor,
        config.radio.bandwidth_hz / 1000
    );

    let mut station = GroundStation::new(Box::new(radio));
    match JsonlReceptionLog::create(&config.storage.ground_log) {
        Ok(log) => station = station.with_log(Box::new(log)),
        Err(e) => warn!("Reception log unavailable: {}", e),
    }

    let mut ticker = interval(Duration::from_millis(config.ground.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Press Ctrl+C to exit");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match station.poll(Utc::now()) {
                    Ok(Some(received)) => {
                        println!("{}", "=".repeat(RULE_WIDTH));
                        println!("{}", received);
                        println!("{}", "=".repeat(RULE_WIDTH));
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Receive failed: {}", e),
                }
            }

            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    let stats = station.stats();
    info!(
        "Received {} packets ({} CRC errors, {} malformed, {} missed)",
        stats.received, stats.crc_errors, stats.malformed, stats.missed
    );

    Ok(())
}
