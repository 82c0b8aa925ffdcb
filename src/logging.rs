use std::{fs, path::Path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "engine.log";

/// Install the global subscriber: daily rolling file under `log_dir`,
/// filtered by `RUST_LOG` (default `info`).
///
/// Keep the returned guard alive for the life of the program or buffered
/// lines are lost on exit. Installing twice leaves the first subscriber in place.
pub fn init_tracing(log_dir: &Path) -> WorkerGuard {
  if let Err(e) = fs::create_dir_all(log_dir) {
    eprintln!("create log dir {}: {e}", log_dir.display());
  }
  let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
  let installed = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(non_blocking)
    .with_ansi(false)
    .try_init();
  if installed.is_err() {
    tracing::debug!("tracing subscriber already installed");
  }
  guard
}
