use crate::utils::env_paths::EnvPaths;
use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging to stderr, plus a daily rolling file when a log
/// directory is configured. The returned guard must be held until exit.
pub fn init_logging(verbose: bool, env_paths: &EnvPaths) -> Result<Option<WorkerGuard>> {
    // Fallback to UTC if local time fails (can happen in some environments)
    let timer = OffsetTime::local_rfc_3339().unwrap_or_else(|_| {
        OffsetTime::new(
            time::UtcOffset::UTC,
            time::format_description::well_known::Rfc3339,
        )
    });

    let (file_layer, guard) = match &env_paths.log_dir {
        Some(logs_dir) => {
            std::fs::create_dir_all(logs_dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("lakestack")
                .filename_suffix("log")
                .build(logs_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_timer(timer.clone())
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Stdout is reserved for command output.
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer)
        .with_target(false);

    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    if let Some(logs_dir) = &env_paths.log_dir {
        tracing::debug!("Log files are being written to: {:?}", logs_dir);
    }
    Ok(guard)
}
