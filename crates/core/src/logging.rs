use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber. Keep the returned guard alive for the
/// duration of the process or buffered file output is lost.
pub fn init_logging(component: &str, to_stderr: bool, verbose: bool) -> WorkerGuard {
    let log_dir = log_dir();
    let _ = std::fs::create_dir_all(&log_dir);

    // one file per component and day, e.g. `cli.2026-10-16`
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, component));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);
    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if to_stderr {
        let console = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .without_time();
        registry.with(console).init();
    } else {
        registry.init();
    }

    guard
}

/// `UBERIZE_LOG_DIR` if set, otherwise `~/.uberize/logs`.
fn log_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("UBERIZE_LOG_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".uberize").join("logs")
}

/// Used only when `RUST_LOG` is unset.
fn default_directives(verbose: bool) -> &'static str {
    if verbose { "uberize_core=debug,info" } else { "info" }
}
