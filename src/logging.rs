//! Tracing setup.
//!
//! Diagnostics always go to stderr so stdout stays clean for JSON results.
//! With a log directory configured, a daily rotating file is written too.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "mpd-gateway";
const DEFAULT_FILTER: &str = "mpd_gateway=info,warn";

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the default filter. Keep the returned guard alive
/// for the lifetime of the process or buffered file output is lost.
pub fn init(log_dir: Option<&Path>, verbose: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "mpd_gateway=debug,warn"
        } else {
            DEFAULT_FILTER
        })
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(dir) = log_dir {
        tracing::debug!("Logging to {}", dir.display());
    }
    Ok(guard)
}
