//! Tracing subscriber setup.

use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn file_writer(app_name: &'static str) -> Option<BoxMakeWriter> {
  let dir = PathBuf::from(std::env::var_os("HEYWORK_LOG_DIR")?);
  if let Err(e) = std::fs::create_dir_all(&dir) {
    eprintln!("Failed to create log directory {}: {}", dir.display(), e);
    return None;
  }

  let appender = tracing_appender::rolling::daily(dir, format!("{app_name}.log"));
  let (non_blocking, guard) = tracing_appender::non_blocking(appender);
  let _ = LOG_GUARD.set(guard);
  Some(BoxMakeWriter::new(non_blocking))
}

/// Install the global subscriber.
///
/// `RUST_LOG` controls filtering (default `info`). When `HEYWORK_LOG_DIR` is set,
/// output goes to a daily-rotated `<app>.log` in that directory instead of stderr.
pub fn init(app_name: &'static str) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt().with_env_filter(filter);

  if let Some(writer) = file_writer(app_name) {
    let _ = builder.with_ansi(false).with_writer(writer).try_init();
  } else {
    let _ = builder.with_writer(std::io::stderr).try_init();
  }
}
