//! Process-wide logger setup.
//!
//! Logs go to stderr unless a log directory is configured, in which case
//! they go to size-rotated files there. `RUST_LOG` overrides the configured
//! level.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;

const LOG_FILE_BASENAME: &str = "contacthub";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

static LOGGER: OnceCell<LoggerHandle> = OnceCell::new();

pub const DEFAULT_LEVEL: &str = "warn";

/// Start the logger. Later calls are no-ops.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<()> {
    let level = normalize_level(level)?;

    LOGGER.get_or_try_init(|| -> Result<LoggerHandle> {
        let logger = Logger::try_with_env_or_str(level)
            .with_context(|| format!("invalid log level `{level}`"))?;

        let handle = match log_dir {
            Some(dir) => {
                fs::create_dir_all(dir).with_context(|| {
                    format!("failed to create log directory {}", dir.display())
                })?;
                logger
                    .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
                    .rotate(
                        Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                        Naming::Numbers,
                        Cleanup::KeepLogFiles(MAX_LOG_FILES),
                    )
                    .write_mode(WriteMode::BufferAndFlush)
                    .append()
                    .format_for_files(flexi_logger::detailed_format)
                    .start()
            }
            None => logger
                .log_to_stderr()
                .format_for_stderr(flexi_logger::default_format)
                .start(),
        }
        .map_err(|e| anyhow!("failed to start logger: {e}"))?;

        info!(
            "event=app_start status=ok version={} level={}",
            env!("CARGO_PKG_VERSION"),
            level
        );
        Ok(handle)
    })?;

    Ok(())
}

fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => Ok("off"),
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(anyhow!(
            "unsupported log level `{other}`; expected off|trace|debug|info|warn|error"
        )),
    }
}
