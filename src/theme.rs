//! Light/dark theme preference.
//!
//! A [`ThemeContext`] is created once at startup and handed to the UI; nothing
//! reads the preference from global state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ThemeFile {
    mode: ThemeMode,
}

#[derive(Debug, Clone)]
pub struct ThemeContext {
    mode: ThemeMode,
    store: Option<PathBuf>,
}

impl ThemeContext {
    /// `<config dir>/basket/theme.json`, when the platform has a config dir.
    pub fn default_store() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("basket").join("theme.json"))
    }

    /// Read the saved preference. Missing or unreadable files fall back to dark.
    pub fn load(store: Option<PathBuf>) -> Self {
        let mode = store
            .as_deref()
            .and_then(|p| match read_mode(p) {
                Ok(m) => Some(m),
                Err(e) => {
                    tracing::debug!(path = %p.display(), error = %e, "no saved theme");
                    None
                }
            })
            .unwrap_or_default();
        Self { mode, store }
    }

    /// A context that never touches disk.
    pub fn ephemeral(mode: ThemeMode) -> Self {
        Self { mode, store: None }
    }

    pub fn mode(&self) -> ThemeMode {
        self.mode
    }

    pub fn is_dark(&self) -> bool {
        self.mode == ThemeMode::Dark
    }

    pub fn set(&mut self, mode: ThemeMode) -> Result<()> {
        self.mode = mode;
        if let Some(path) = self.store.as_deref() {
            write_mode(path, mode)?;
        }
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<ThemeMode> {
        let next = self.mode.toggled();
        self.set(next)?;
        Ok(next)
    }
}

fn read_mode(path: &Path) -> Result<ThemeMode> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let file: ThemeFile = serde_json::from_str(&raw).context("parse theme file")?;
    Ok(file.mode)
}

fn write_mode(path: &Path, mode: ThemeMode) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let body = serde_json::to_string(&ThemeFile { mode })?;
    std::fs::write(path, body).with_context(|| format!("write {}", path.display()))
}
