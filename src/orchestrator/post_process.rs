//! Post-fetch processing utilities.
//!
//! Handles the optional audio download and JSON export after a headless fetch
//! reaches `ready`.

use crate::backend::Backend;
use crate::cli::Cli;
use crate::model::{FetchReport, MediaKind, MediaResult, Mode, RunConfig, SearchResult};
use anyhow::{Context, Result};
use std::path::Path;

/// Result of post-fetch processing, ready for presentation layers.
pub(crate) struct ProcessedFetch {
    pub report: FetchReport,
    pub messages: Vec<String>,
}

/// Everything the fetch produced, as handed over by the controller.
pub(crate) struct CompletedFetch<'a> {
    pub query: &'a str,
    pub mode: Mode,
    pub result: &'a SearchResult,
    pub media: &'a MediaResult,
}

/// Process a completed fetch: download audio when asked to, build the report and export it.
pub(crate) async fn process_fetch_completion<B: Backend>(
    args: &Cli,
    cfg: &RunConfig,
    backend: &B,
    fetch: CompletedFetch<'_>,
) -> ProcessedFetch {
    let mut messages = Vec::new();

    let mut saved_path = None;
    if args.download {
        match (fetch.media.kind, fetch.media.job_id.as_deref()) {
            (MediaKind::Audio, Some(job_id)) => {
                match backend.download(job_id, &cfg.download_dir).await {
                    Ok(p) => {
                        messages.push(format!("Saved: {}", p.display()));
                        saved_path = Some(p);
                    }
                    Err(e) => messages.push(format!("Download failed: {e:#}")),
                }
            }
            _ => messages.push("Nothing to download: video results are embed-only".into()),
        }
    }

    let report = FetchReport {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        base_url: cfg.base_url.clone(),
        query: fetch.query.to_string(),
        mode: fetch.mode,
        result: fetch.result.clone(),
        media: fetch.media.clone(),
        saved_path,
    };

    if let Some(export_path) = args.export_json.as_deref() {
        match export_json(export_path, &report) {
            Ok(_) => messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedFetch { report, messages }
}

pub(crate) fn export_json(path: &Path, report: &FetchReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(report).context("serialize report")?;
    std::fs::write(path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
