//! ADS-B Live Feed Binary
//!
//! Connects to an ADS-B feed server, tracks aircraft into a local snapshot
//! and logs a summary periodically.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin adsb-live-feed
//! ```
//!
//! # Environment Variables
//!
//! - `ADSB_FEED_URL`: Feed endpoint (default: `ws://localhost:5000/ws/adsb`)
//! - `ADSB_FEED_TRACK`: Comma-separated station codes; empty tracks everything
//! - `ADSB_FEED_AUTO_RECONNECT`: Reconnect with backoff after drops (default: false)
//! - `ADSB_FEED_SNAPSHOT_LOG_SECS`: Snapshot summary interval (default: 30)
//! - `ADSB_FEED_STALE_AFTER_SECS`: Prune aircraft not seen for this long (default: 300)
//! - `ADSB_FEED_METRICS_PORT`: Prometheus metrics port (default: 0, disabled)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: `adsb_live_feed=info`)

use std::sync::Arc;
use std::time::Duration;

use adsb_live_feed::infrastructure::metrics;
use adsb_live_feed::infrastructure::telemetry;
use adsb_live_feed::{
    AircraftSnapshot, ConnectionState, ControlOutcome, FeedConfig, LiveFeed, LiveFeedConfig,
    TrackingSettings, init_metrics,
};
use anyhow::Context;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// How long to wait for the channel to close on shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting ADS-B live feed");

    let config = FeedConfig::from_env().context("invalid feed configuration")?;
    log_config(&config);

    if config.metrics_port != 0 {
        init_metrics(config.metrics_port)?;
    }

    let shutdown_token = CancellationToken::new();
    let snapshot = Arc::new(AircraftSnapshot::new());

    let feed = LiveFeed::mount_with_shutdown(
        LiveFeedConfig::from_feed_config(&config),
        Arc::clone(&snapshot),
        &shutdown_token,
    );
    let mut state_rx = feed.watch_state();

    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let mut report = tokio::time::interval(
        config
            .tracking
            .snapshot_log_interval
            .max(Duration::from_secs(1)),
    );
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => break,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    tracing::warn!("Feed stopped unexpectedly");
                    break;
                }
                let state = *state_rx.borrow_and_update();
                tracing::info!(state = %state, "Feed state changed");
                if state == ConnectionState::Connected {
                    start_tracking(&feed, &config.tracking);
                }
            }
            _ = report.tick() => report_snapshot(&snapshot, config.tracking.stale_after),
        }
    }

    drop(feed);
    let _ = tokio::time::timeout(
        SHUTDOWN_TIMEOUT,
        state_rx.wait_for(|state| *state == ConnectionState::Disconnected),
    )
    .await;

    tracing::info!(tracked = snapshot.len(), "ADS-B live feed stopped");
    Ok(())
}

/// Issue the configured tracking command on a fresh connection.
fn start_tracking(feed: &LiveFeed, tracking: &TrackingSettings) {
    let outcome = if tracking.tracks_all() {
        feed.start_tracking_all()
    } else {
        feed.subscribe_to_aircraft(tracking.icao_codes.iter().cloned())
    };

    if outcome == ControlOutcome::Dropped {
        tracing::warn!("Tracking command dropped; waiting for next connection");
    }
}

/// Prune stale aircraft and log a summary.
fn report_snapshot(snapshot: &AircraftSnapshot, stale_after: Duration) {
    let pruned = snapshot.prune_older_than(stale_after, chrono::Utc::now());
    if !pruned.is_empty() {
        tracing::debug!(count = pruned.len(), codes = ?pruned, "Pruned stale aircraft");
    }

    metrics::set_tracked_aircraft(snapshot.len());
    tracing::info!(
        tracked = snapshot.len(),
        positioned = snapshot.positioned_count(),
        pruned = pruned.len(),
        last_update = ?snapshot.last_update(),
        "Snapshot summary"
    );
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &FeedConfig) {
    let tracked = if config.tracking.tracks_all() {
        "all".to_string()
    } else {
        config.tracking.icao_codes.join(",")
    };

    tracing::info!(
        url = %config.url,
        auto_reconnect = config.auto_reconnect.enabled,
        tracked = %tracked,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        connect_timeout_secs = config.transport.connect_timeout.as_secs(),
        reconnect_delay_ms = config.transport.reconnect_delay.as_millis(),
        event_capacity = config.transport.event_capacity,
        max_reconnect_attempts = config.auto_reconnect.max_attempts,
        "Transport settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
