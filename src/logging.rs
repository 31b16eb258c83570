//! tracing subscriber setup.
//!
//! Headless runs log to stderr. The TUI owns the terminal, so it logs to a file
//! (explicit `--log-file`, else the cache dir) or not at all.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "basket=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `<cache dir>/basket/basket.log`.
pub fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("basket").join("basket.log"))
}

pub fn init(log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let target = match log_file {
        Some(p) => Some(p.to_path_buf()),
        None if interactive => default_log_file(),
        None => None,
    };

    let res = match target {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None if interactive => return Ok(()),
        None => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .try_init(),
    };

    res.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
