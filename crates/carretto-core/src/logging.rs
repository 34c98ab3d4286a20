//! Logging configuration
//!
//! Describes where log output goes. The subscriber itself is installed by the
//! binary; this module only owns the settings and the log directory
//! housekeeping so it can be tested without a global subscriber.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Prefix of every log file written by the file layer
const LOG_FILE_PREFIX: &str = "carretto_";

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`); `RUST_LOG` overrides it
    pub level: String,
    /// Write to stderr
    pub console_output: bool,
    /// Write to a timestamped file under `log_dir`
    pub file_output: bool,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Number of log files kept by [`LogConfig::cleanup_old_logs`]
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
            max_log_files: 10,
        }
    }
}

impl LogConfig {
    /// Parse `level`, falling back to INFO for unknown names
    pub fn parse_level(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" => LevelFilter::ERROR,
            "warn" | "warning" => LevelFilter::WARN,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }

    /// Create `log_dir` when file output is enabled
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        if self.file_output {
            fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Delete the oldest `carretto_*.log` files so at most `max_log_files` remain
    ///
    /// Returns the number of files removed.
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if !self.log_dir.is_dir() {
            return Ok(0);
        }

        let mut logs: Vec<PathBuf> = fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_log_file(path))
            .collect();

        if logs.len() <= self.max_log_files {
            return Ok(0);
        }

        // Timestamped names sort chronologically
        logs.sort();
        let excess = logs.len() - self.max_log_files;
        let mut removed = 0;
        for path in logs.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Path of the log file for a process started now
    pub fn current_log_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.log_dir
            .join(format!("{}{}.log", LOG_FILE_PREFIX, stamp))
    }
}

fn is_log_file(path: &std::path::Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log")
}
