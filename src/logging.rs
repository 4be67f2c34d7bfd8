use crate::config::Config;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Keep guards alive for the lifetime of the app.
pub struct LogGuards {
    _file_guard: Option<WorkerGuard>,
}

fn split_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file = path
        .file_name()
        .unwrap_or_else(|| OsStr::new("imgpick.log"))
        .to_string_lossy()
        .to_string();
    (dir, file)
}

/// Stdout (stderr for `pick`, so the answer stays alone on stdout) plus an
/// optional plain-text file.
pub fn init_logging(config: &Config, to_stderr: bool) -> LogGuards {
    // RUST_LOG wins over -v/-q
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_ansi(!to_stderr)
        .compact()
        .with_timer(fmt::time::ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_writer(if to_stderr {
            BoxMakeWriter::new(std::io::stderr)
        } else {
            BoxMakeWriter::new(std::io::stdout)
        });

    let (file_layer, guard) = match config.log_file.as_deref() {
        Some(path) => {
            let (dir, file) = split_path(path);
            let appender = tracing_appender::rolling::never(dir, file);
            let (nb, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .compact()
                .with_timer(fmt::time::ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_writer(nb);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Option<Layer> is itself a layer
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    LogGuards { _file_guard: guard }
}
