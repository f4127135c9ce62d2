use anyhow::{anyhow, Context, Result};
use engager_core::LoggingConfig;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Console logging plus an optional plain-text log file.
///
/// `RUST_LOG` wins over the configured level. The returned guard flushes the
/// file writer and must live as long as the process.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_lowercase()))
        .map_err(|e| anyhow!("Failed to create log filter: {}", e))?;

    let registry = Registry::default().with(env_filter);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let guard = match config.file.as_deref() {
        Some(log_path) => {
            let directory = log_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            std::fs::create_dir_all(directory).with_context(|| {
                format!("Failed to create log directory {}", directory.display())
            })?;
            let file_name = log_path
                .file_name()
                .ok_or_else(|| anyhow!("Log file path has no file name: {}", log_path.display()))?;

            let (writer, guard) = non_blocking(rolling::never(directory, file_name));
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);

            registry.with(console_layer).with(file_layer).init();
            info!("Logging to {}", log_path.display());
            Some(guard)
        }
        None => {
            registry.with(console_layer).init();
            None
        }
    };

    Ok(guard)
}
