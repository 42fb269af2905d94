//! Tracing setup: rotating file logs plus console output.
//!
//! Two daily-rotated files land in the log directory: `audit.log` (compact
//! text) and `audit.json.log` (structured JSON). Console output goes to
//! stderr so exports and reports can be piped from stdout. `RUST_LOG`
//! controls filtering; the default is `info`.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init_logging<P: AsRef<Path>>(log_dir: P) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = log_dir.as_ref();
    std::fs::create_dir_all(log_path)?;

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let text_appender = tracing_appender::rolling::daily(log_path, "audit.log");
    let (text_writer, text_guard) = tracing_appender::non_blocking(text_appender);

    let json_appender = tracing_appender::rolling::daily(log_path, "audit.json.log");
    let (json_writer, json_guard) = tracing_appender::non_blocking(json_appender);

    let text_layer = fmt::layer()
        .with_writer(text_writer)
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_filter(env_filter.clone());

    let json_layer = fmt::layer()
        .json()
        .with_writer(json_writer)
        .with_target(true)
        .with_current_span(true)
        .with_filter(env_filter.clone());

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(console_layer)
        .init();

    // The non-blocking writers stop on guard drop; keep them for the
    // life of the process.
    Box::leak(Box::new(text_guard));
    Box::leak(Box::new(json_guard));

    tracing::debug!(dir = %log_path.display(), "logging initialized");
    Ok(())
}

/// Convenience wrapper: put logs in a `logs/` subdirectory of the data dir.
pub fn init_logging_in_data_dir<P: AsRef<Path>>(
    data_dir: P,
) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(data_dir.as_ref().join("logs"))
}
