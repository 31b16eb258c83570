//! Text output for headless mode.
//!
//! Progress lines for each screen and the final summary of a completed fetch.

use crate::model::{FetchReport, MediaKind, MediaStatus};
use crate::view::{format_duration, Screen};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Progress lines describing one screen. Selection changes print nothing.
pub(crate) fn screen_lines(screen: &Screen) -> Vec<String> {
    match screen {
        Screen::Search { busy: false, .. } => Vec::new(),
        Screen::Search { busy: true, query } => {
            vec![format!("Searching: {}", query.as_deref().unwrap_or(""))]
        }
        Screen::Results {
            rows,
            mode_selector: None,
            ..
        } => {
            let mut lines = vec![format!("{} result(s):", rows.len())];
            lines.extend(rows.iter().enumerate().map(|(i, r)| {
                format!("  {:>2}. {} - {} [{}]", i + 1, r.title, r.uploader, r.duration)
            }));
            lines
        }
        Screen::Results { .. } => Vec::new(),
        Screen::Processing {
            title,
            mode,
            status,
            attempt,
            progress,
        } => {
            let mut line = format!("Processing {mode}: {title}");
            if let Some(s) = status {
                line.push_str(&format!(" ({s}"));
                if let Some(p) = progress {
                    line.push_str(&format!(" {p}%"));
                }
                line.push_str(&format!(", check {attempt})"));
            }
            vec![line]
        }
        Screen::AudioPlayer { title, .. } | Screen::VideoEmbed { title, .. } => {
            vec![format!("Ready: {title}")]
        }
        Screen::Error { message } => vec![format!("Error: {message}")],
    }
}

/// Build the final summary for a completed fetch.
pub(crate) fn build_text_summary(report: &FetchReport) -> TextSummary {
    let mut lines = Vec::new();
    let r = &report.result;
    lines.push(format!("Title: {}", r.title));
    lines.push(format!(
        "Uploader: {} ({})",
        r.uploader,
        format_duration(r.duration)
    ));

    match report.media.kind {
        MediaKind::Audio => {
            lines.push(format!("Audio: {}", report.media.url));
            if let Some(d) = report.media.download_url.as_deref() {
                lines.push(format!("Download: {d}"));
            }
        }
        MediaKind::Video => {
            lines.push(format!("Embed: {}", report.media.url));
            if report.media.status == MediaStatus::Blocked {
                lines.push("Note: the source restricts embedded playback".into());
            }
        }
    }
    if let Some(p) = report.saved_path.as_deref() {
        lines.push(format!("Saved to: {}", p.display()));
    }

    TextSummary { lines }
}
