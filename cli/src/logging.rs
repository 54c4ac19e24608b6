//! Logging configuration with optional file output and size-based rotation.
//!
//! Logs go to stdout. When a log file is given, they are also written there
//! with 10 MB size-based rotation. Set `DEBUG_LOGGING=1` to enable debug
//! output for tickwork crates.

use std::path::Path;

use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEBUG_DIRECTIVE: &str = "info,tickwork=debug,tickwork_core=debug,tickwork_cli=debug";

/// Initialize logging.
///
/// Returns a `WorkerGuard` when file logging is active; it MUST be held until
/// exit so buffered lines are flushed.
///
/// # Fallback
/// If the log file cannot be created, logs go to stdout only.
pub fn init(log_file: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let debug_logging = std::env::var("DEBUG_LOGGING").is_ok();

    let Some(log_path) = log_file else {
        init_stdout_only(debug_logging);
        return None;
    };

    let file_appender = match BasicRollingFileAppender::new(
        log_path,
        RollingConditionBasic::new().max_size(10 * 1024 * 1024), // 10 MB
        1, // Keep only the latest rotated file
    ) {
        Ok(appender) => appender,
        Err(e) => {
            // Can't use tracing yet since subscriber not initialized
            eprintln!("Failed to create log file at {:?}: {}", log_path, e);
            init_stdout_only(debug_logging);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .with(filter(debug_logging))
        .init();

    tracing::info!(log_file = ?log_path, debug_logging, "tickwork logging initialized");

    Some(guard)
}

fn init_stdout_only(debug_logging: bool) {
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(filter(debug_logging))
        .init();

    tracing::debug!(debug_logging, "tickwork logging initialized (stdout only)");
}

/// `RUST_LOG` wins when set; otherwise INFO, or DEBUG for our crates
fn filter(debug_logging: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug_logging { DEBUG_DIRECTIVE } else { "info" })
    })
}
