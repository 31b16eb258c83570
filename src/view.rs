//! What each phase puts on screen.
//!
//! `Screen` is derived from a [`Phase`] alone. The TUI draws it, the text mode
//! prints it.

use crate::model::{MediaKind, MediaStatus, Mode};
use crate::orchestrator::{Phase, Selection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub title: String,
    pub uploader: String,
    pub duration: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSelector {
    pub selected: Option<Mode>,
    pub confirm_enabled: bool,
    pub confirm_label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// `idle` and `searching`.
    Search { busy: bool, query: Option<String> },
    Results {
        query: String,
        rows: Vec<ResultRow>,
        /// Present once a result is chosen.
        mode_selector: Option<ModeSelector>,
    },
    Processing {
        title: String,
        mode: Mode,
        status: Option<String>,
        attempt: u32,
        progress: Option<u32>,
    },
    AudioPlayer {
        title: String,
        url: String,
        download_url: String,
    },
    VideoEmbed {
        title: String,
        embed_url: String,
        blocked: bool,
    },
    Error { message: String },
}

impl Screen {
    pub fn from_phase(phase: &Phase) -> Self {
        match phase {
            Phase::Idle => Screen::Search {
                busy: false,
                query: None,
            },
            Phase::Searching { query } => Screen::Search {
                busy: true,
                query: Some(query.clone()),
            },
            Phase::Results {
                query,
                results,
                selection,
            } => Screen::Results {
                query: query.clone(),
                rows: results
                    .iter()
                    .enumerate()
                    .map(|(i, r)| ResultRow {
                        title: r.title.clone(),
                        uploader: r.uploader.clone(),
                        duration: format_duration(r.duration),
                        selected: selection.map(|s| s.index) == Some(i),
                    })
                    .collect(),
                mode_selector: selection.map(|Selection { mode, .. }| ModeSelector {
                    selected: mode,
                    confirm_enabled: mode.is_some(),
                    confirm_label: confirm_label(mode),
                }),
            },
            Phase::Processing {
                result,
                mode,
                attempt,
                job_state,
                progress,
                ..
            } => Screen::Processing {
                title: result.title.clone(),
                mode: *mode,
                status: job_state.as_ref().map(|s| s.label().to_string()),
                attempt: *attempt,
                progress: *progress,
            },
            Phase::Ready { media } => match media.kind {
                MediaKind::Audio => Screen::AudioPlayer {
                    title: media.title.clone(),
                    url: media.url.clone(),
                    download_url: media
                        .download_url
                        .clone()
                        .unwrap_or_else(|| media.url.clone()),
                },
                MediaKind::Video => Screen::VideoEmbed {
                    title: media.title.clone(),
                    embed_url: media.url.clone(),
                    blocked: media.status == MediaStatus::Blocked,
                },
            },
            Phase::Error { message } => Screen::Error {
                message: message.clone(),
            },
        }
    }

    /// Ready and error screens offer "search again".
    pub fn offers_search_again(&self) -> bool {
        matches!(
            self,
            Screen::AudioPlayer { .. } | Screen::VideoEmbed { .. } | Screen::Error { .. }
        )
    }
}

fn confirm_label(mode: Option<Mode>) -> &'static str {
    match mode {
        Some(Mode::Audio) => "Download Audio",
        Some(Mode::Video) => "Play Video",
        None => "Select Format",
    }
}

/// `m:ss`, minutes unbounded.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
