use crate::{HarvestError, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Keeps the file writer flushing until dropped at the end of `main`.
#[must_use]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Console output filtered by `RUST_LOG` (default `info`, `debug` with
/// `verbose`), plus an optional appending plain-text log file.
pub fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<LogGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{default_level},html5ever=warn,selectors=warn,reqwest=warn,hyper=warn"
        ))
    });

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir).map_err(|e| HarvestError::io(dir, e))?;
            let file_name = path
                .file_name()
                .ok_or_else(|| HarvestError::InvalidConfig(format!("log file has no name: {}", path.display())))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    Ok(LogGuard { _file: guard })
}
