//! # RCIO Bridge
//!
//! Host process for the RCIO co-processor.
//!
//! Opens the SPI link, reads the firmware identity once, then keeps the RC
//! input and status caches fresh until interrupted.

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use rcio_bridge::config::{Config, LoggingConfig};
use rcio_bridge::interface::RegisterInterface;
use rcio_bridge::poller::MonotonicClock;
use rcio_bridge::rc_input::RcInputTracker;
use rcio_bridge::status::StatusTracker;
use rcio_bridge::telemetry::{DeviceSnapshot, SnapshotLogger};
use rcio_bridge::transport::SpidevTransport;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// How often the trackers are offered a chance to poll
///
/// Each tracker decides for itself whether its interval has elapsed.
const POLL_PERIOD: Duration = Duration::from_millis(1);

/// Number of RC updates between status log messages
const LOG_INTERVAL_UPDATES: u64 = 1000;

/// Main entry point for RCIO Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (the path given as first argument, else `config/default.toml` if present, else defaults)
///    - Set up logging
///    - Open the spidev node and probe the firmware identity
///
/// 2. **Main Loop**
///    - Offer both trackers a poll every millisecond
///    - Record telemetry snapshots if enabled
///    - Log a summary every 1000 RC updates (~10 seconds)
///
/// 3. **Shutdown** on Ctrl+C
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(std::env::args().nth(1))?;

    let _log_guard = init_logging(&config.logging);

    info!("RCIO Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let transport = if config.spi.device.is_empty() {
        SpidevTransport::open()?
    } else {
        SpidevTransport::open_path(&config.spi.device)?
    };
    info!("RCIO SPI device opened at: {}", transport.device_path());

    let io = RegisterInterface::with_settle(transport, config.spi.settle());

    let mut status = StatusTracker::with_timing(
        MonotonicClock,
        config.status.initial_delay(),
        config.status.interval(),
    );
    let report = tokio::task::block_in_place(|| status.probe(&io));
    if !report.all_ok() {
        warn!("Firmware identity incomplete: {:?}", report);
    }

    let mut rc = RcInputTracker::with_timing(
        MonotonicClock,
        config.rc_input.initial_delay(),
        config.rc_input.interval(),
    );

    let rc_reader = rc.reader();
    let status_reader = status.reader();

    let mut recorder = if config.telemetry.enabled {
        let recorder = SnapshotLogger::create(&config.telemetry.path)
            .with_context(|| format!("Failed to open telemetry log {}", config.telemetry.path))?;
        info!("Recording telemetry to {}", recorder.path().display());
        Some(recorder)
    } else {
        None
    };

    let mut poll_tick = interval(POLL_PERIOD);
    poll_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut telemetry_tick = interval(config.telemetry.interval());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Polling RC input every {:?}, status every {:?}",
        config.rc_input.interval(), config.status.interval());
    info!("Press Ctrl+C to exit");

    let mut rc_updates: u64 = 0;

    loop {
        tokio::select! {
            _ = poll_tick.tick() => {
                // Transactions block on the bus for a few hundred microseconds
                let rc_updated = tokio::task::block_in_place(|| {
                    let rc_updated = rc.refresh(&io);
                    status.refresh(&io);
                    rc_updated
                });

                if rc_updated {
                    rc_updates += 1;
                    if rc_updates % LOG_INTERVAL_UPDATES == 0 {
                        let rc_state = rc_reader.snapshot();
                        info!(
                            "RC updates: {} (connected: {}, source: {:?}), RCIO alive: {}, pwm_ok: {}",
                            rc_updates,
                            rc_state.connected,
                            rc_state.source,
                            status_reader.alive(),
                            status_reader.pwm_ok()
                        );
                    }
                }
            }

            _ = telemetry_tick.tick(), if recorder.is_some() => {
                if let Some(recorder) = recorder.as_mut() {
                    let snapshot = DeviceSnapshot::capture(&rc_reader, &status_reader);
                    if let Err(e) = recorder.record(&snapshot) {
                        warn!("Failed to record telemetry: {}", e);
                    }
                }
            }

            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total RC updates: {}", rc_updates);
                break;
            }
        }
    }

    Ok(())
}

/// Load the configuration
///
/// A path given on the command line must exist. Without one, the default
/// path is tried and built-in defaults are used if it is missing.
fn load_config(path: Option<String>) -> Result<Config> {
    match path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path)),
        None => Config::load_or_default(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load configuration from {}", DEFAULT_CONFIG_PATH)),
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over the configured level. With a log directory set,
/// output goes to a daily-rotated file through a non-blocking writer whose
/// guard must be kept alive for the life of the process.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.dir, "rcio.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}
