//! Global tracing subscriber for the cart
//!
//! Console output goes to stderr. With `log.file_output` set, a second layer
//! writes plain text to `<log_dir>/carretto_<timestamp>.log` through a
//! non-blocking worker, after pruning the directory to `max_log_files`.

use anyhow::{Context, Result};
use carretto_core::LogConfig;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Keeps the file worker flushing until dropped at the end of `main`
pub struct LogGuard {
    pub path: PathBuf,
    _worker: WorkerGuard,
}

/// Configured level, unless `RUST_LOG` says otherwise
fn level_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy()
}

/// Prune old session logs and open this session's file
///
/// Returns the writer, its guard, and how many old files were removed.
fn open_session_file(config: &LogConfig) -> Result<(NonBlocking, LogGuard, usize)> {
    config
        .ensure_log_directory()
        .with_context(|| format!("Failed to create log directory {:?}", config.log_dir))?;

    // A failed prune is only a warning
    let pruned = config.cleanup_old_logs().unwrap_or_else(|e| {
        eprintln!("Warning: could not prune {:?}: {}", config.log_dir, e);
        0
    });

    let path = config.current_log_path();
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {:?}", path))?;
    let (writer, worker) = tracing_appender::non_blocking(file);
    Ok((
        writer,
        LogGuard {
            path,
            _worker: worker,
        },
        pruned,
    ))
}

/// Install the subscriber; `None` when file output is off
pub fn init(config: &LogConfig) -> Result<Option<LogGuard>> {
    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(level_filter(config))
    });

    let (file_layer, guard, pruned) = if config.file_output {
        let (writer, guard, pruned) = open_session_file(config)?;
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(level_filter(config));
        (Some(layer), Some(guard), pruned)
    } else {
        (None, None, 0)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(level = %config.parse_level(), "Logging ready");
    if let Some(guard) = &guard {
        info!(pruned, keep = config.max_log_files, "Session log {:?}", guard.path);
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config(dir: &std::path::Path, keep: usize) -> LogConfig {
        LogConfig {
            file_output: true,
            log_dir: dir.join("logs"),
            max_log_files: keep,
            ..LogConfig::default()
        }
    }

    #[test]
    fn test_session_file_created_under_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), 10);

        let (_writer, guard, pruned) = open_session_file(&config).unwrap();
        assert_eq!(pruned, 0);
        assert!(guard.path.exists());
        assert!(guard.path.starts_with(&config.log_dir));
        let name = guard.path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("carretto_") && name.ends_with(".log"));
    }

    #[test]
    fn test_session_file_prunes_old_logs() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), 2);
        std::fs::create_dir_all(&config.log_dir).unwrap();
        for stamp in ["20240101_000000", "20240102_000000", "20240103_000000"] {
            File::create(config.log_dir.join(format!("carretto_{}.log", stamp))).unwrap();
        }

        let (_writer, _guard, pruned) = open_session_file(&config).unwrap();
        assert_eq!(pruned, 1);
        assert!(!config.log_dir.join("carretto_20240101_000000.log").exists());
    }
}
