use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "venue_identity=info";

/// Initializes the logging system with both console and file output.
///
/// Console output goes to stderr so that `--json` command output on stdout
/// stays machine readable. The returned guard must be kept alive for the
/// lifetime of the process; dropping it flushes the file writer.
pub fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    // Fall back to console-only logging when the log directory is unusable
    if let Err(e) = fs::create_dir_all(log_dir) {
        let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .init();
        tracing::warn!("Could not create log dir {}: {}", log_dir.display(), e);
        return None;
    }

    // Create a non-blocking file appender for daily log rotation
    let file_appender = tracing_appender::rolling::daily(log_dir, "venue_identity.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    // JSON lines in the file, human readable on the console
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Some(guard)
}
