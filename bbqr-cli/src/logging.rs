//! Logging setup: console output on stderr, optional rotated log files.
//!
//! stdout is reserved for fragments and decoded payloads, so the console
//! layer always writes to stderr.

use std::fs;
use std::io;
use std::path::Path;

use chrono::Local;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_NAME: &str = "bbqr.log";

/// Initialize the global subscriber.
///
/// # Arguments
/// * `log_dir` - Directory for daily-rotated log files, `None` for console only
/// * `retention_days` - Number of days to keep log files
/// * `verbose` - Whether to enable debug-level logging
/// * `level` - Filter from the config file, used when `RUST_LOG` is unset
pub fn init_logging(
    log_dir: Option<&Path>,
    retention_days: u64,
    verbose: bool,
    level: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if verbose { "debug" } else { level.unwrap_or("info") };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .with_timer(LocalTimeTimer);

    let file = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            clean_old_logs(dir, retention_days)?;

            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // The guard flushes on drop; keep it for the life of the process.
            let _ = Box::leak(Box::new(guard));

            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_level(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .with_timer(LocalTimeTimer),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to set default subscriber: {}", e))?;

    // The codec logs through the `log` facade.
    tracing_log::LogTracer::init()
        .map_err(|e| format!("Failed to initialize LogTracer: {}", e))?;

    Ok(())
}

/// Remove rotated log files older than `retention_days`.
fn clean_old_logs(log_dir: &Path, retention_days: u64) -> io::Result<()> {
    let cutoff = Local::now() - chrono::Duration::days(retention_days as i64);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_ours = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.starts_with(LOG_FILE_NAME));
        if !is_ours {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => chrono::DateTime::<Local>::from(modified),
            Err(_) => continue,
        };
        if modified < cutoff {
            if let Err(e) = fs::remove_file(&path) {
                eprintln!("Failed to remove old log file {:?}: {}", path, e);
            }
        }
    }

    Ok(())
}

/// Local-time timestamps for log lines.
#[derive(Debug, Clone, Copy)]
struct LocalTimeTimer;

impl fmt::time::FormatTime for LocalTimeTimer {
    fn format_time(&self, w: &mut fmt::format::Writer) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_clean_old_logs_keeps_recent_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let recent = dir.path().join("bbqr.log.2026-10-17");
        let foreign = dir.path().join("notes.txt");
        fs::write(&recent, "x").unwrap();
        fs::write(&foreign, "x").unwrap();

        clean_old_logs(dir.path(), 7).unwrap();
        assert!(recent.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_clean_old_logs_removes_expired() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("bbqr.log.2020-01-01");
        fs::write(&old, "x").unwrap();
        let file = fs::File::options().write(true).open(&old).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(30 * 24 * 3600))
            .unwrap();
        drop(file);

        clean_old_logs(dir.path(), 7).unwrap();
        assert!(!old.exists());
    }
}
