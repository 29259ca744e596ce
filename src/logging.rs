//! # Logging Module
//!
//! Diagnostic output through `tracing`.
//!
//! Events always go to stdout. With `[logging] enabled = true` they are
//! also written, without ANSI colors, to a daily rolling file. The filter
//! follows `RUST_LOG` with INFO as the floor.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber
///
/// The returned guard flushes the file writer when dropped and must be
/// held until the program exits.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = if config.enabled {
        let appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}
