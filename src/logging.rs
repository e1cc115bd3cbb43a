use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "faultline";
const LOG_FILE_SUFFIX: &str = "log";

/// Keeps the file writer alive; drop it last so buffered lines are flushed.
pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
    session_id: String,
}

impl LoggingGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Installs a global subscriber for hosts that have none. Libraries embedding
/// the notifier into an app with its own subscriber should skip this.
pub fn init_tracing(logging_config: &LoggingConfig) -> Result<LoggingGuard> {
    if logging_config.filter.trim().is_empty() {
        return Err(anyhow!("logging.filter cannot be empty"));
    }
    if !logging_config.stderr_enabled && logging_config.dir.is_none() {
        return Err(anyhow!("logging needs stderr_enabled or a dir"));
    }

    let mut worker_guard = None;
    let file_layer = match &logging_config.dir {
        Some(dir) => {
            let appender = notice_log_appender(dir, &logging_config.rotation)?;
            let (non_blocking_writer, guard) = tracing_appender::non_blocking(appender);
            worker_guard = Some(guard);

            Some(
                fmt::layer()
                    .json()
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_ansi(false)
                    .with_writer(non_blocking_writer)
                    .with_filter(layer_filter(&logging_config.filter)?),
            )
        }
        None => None,
    };

    let stderr_layer = if logging_config.stderr_enabled {
        Some(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(layer_filter(&logging_config.filter)?),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let session_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        session_id = %session_id,
        dir = ?logging_config.dir,
        filter = %logging_config.filter,
        rotation = ?logging_config.rotation,
        stderr_enabled = logging_config.stderr_enabled,
        "logging_initialized"
    );

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        session_id,
    })
}

/// Host override for the configured filter, e.g. `FAULTLINE_LOG=faultline=trace`.
pub const LOG_FILTER_ENV: &str = "FAULTLINE_LOG";

fn layer_filter(configured: &str) -> Result<EnvFilter> {
    match std::env::var(LOG_FILTER_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid {LOG_FILTER_ENV} directives '{directives}'")),
        _ => EnvFilter::try_new(configured)
            .with_context(|| format!("invalid logging.filter directives '{configured}'")),
    }
}

/// Opens `<dir>/faultline.<date>.log`, creating `dir` when missing.
fn notice_log_appender(dir: &Path, rotation: &LoggingRotation) -> Result<RollingFileAppender> {
    let dir = std::path::absolute(dir)
        .with_context(|| format!("cannot resolve logging.dir {}", dir.display()))?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create logging directory {}", dir.display()))?;

    let rotation = match rotation {
        LoggingRotation::Daily => Rotation::DAILY,
        LoggingRotation::Hourly => Rotation::HOURLY,
    };
    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(&dir)
        .with_context(|| format!("failed to open log file in {}", dir.display()))
}
