//! Telemetry bootstrap: global tracing subscriber plus the `log` bridge used by sqlx.
//!
//! `NOTIFY_LOG_LEVEL` sets the base directive and `NOTIFY_LOG_FORMAT` picks json
//! or pretty output on stderr. A `RUST_LOG` value, when present, replaces the
//! configured directive entirely.

use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter,
    filter::ParseError,
    fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// Migration progress is chatty at info; keep it to warnings unless asked.
const QUIET_TARGETS: &[&str] = &["sea_orm_migration=warn"];

/// Errors that can occur while initializing global telemetry.
#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Filter directive derived from the configured log level.
pub fn filter_directive(config: &AppConfig) -> String {
    let level = config.log_level.trim();
    let level = if level.is_empty() { "info" } else { level };
    std::iter::once(level)
        .chain(QUIET_TARGETS.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}

fn build_filter(config: &AppConfig) -> Result<EnvFilter, TelemetryInitError> {
    let directive = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => filter_directive(config),
    };
    EnvFilter::try_new(&directive).map_err(|source| TelemetryInitError::Filter { directive, source })
}

/// Initialize global tracing exactly once, routing `log` records (sqlx) into it.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if TELEMETRY_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    let env_filter = match build_filter(config) {
        Ok(filter) => filter,
        Err(err) => {
            TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
            return Err(err);
        }
    };

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        _ => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(err.into());
    }

    // Another `log` logger may already own the global slot; sqlx output then stays there.
    if let Err(err) = LogTracer::builder().with_max_level(LevelFilter::Trace).init() {
        tracing::debug!(error = %err, "log bridge not installed");
    }

    tracing::debug!(
        profile = %config.profile,
        format = %config.log_format,
        "Telemetry initialized"
    );
    Ok(())
}
