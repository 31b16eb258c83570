//! Pure phase state machine.
//!
//! No I/O happens here. User operations and network completions go in, the
//! next [`Phase`] and any [`Effect`] the controller must execute come out.
//! Every asynchronous operation is tagged with the epoch current when it was
//! issued; completions carrying any other epoch are dropped.

use crate::backend::ApiError;
use crate::model::{
    JobState, JobStatus, MediaKind, MediaResult, MediaStatus, Mode, ProcessResponse, SearchResult,
};

pub const NO_RESULTS: &str = "No results found. Try a different search.";
pub const SEARCH_FAILED: &str = "Search failed. Please check your connection and try again.";
pub const PROCESS_FAILED: &str = "Failed to process media. Please try again.";
pub const STATUS_FAILED: &str = "Failed to check processing status. Please try again.";
pub const JOB_FAILED: &str = "Processing failed.";
pub const POLL_TIMEOUT: &str = "Processing timed out. Please try again.";

pub type Epoch = u64;

/// The chosen result and, once picked, its delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub mode: Option<Mode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Searching {
        query: String,
    },
    Results {
        query: String,
        results: Vec<SearchResult>,
        selection: Option<Selection>,
    },
    Processing {
        result: SearchResult,
        mode: Mode,
        job_id: Option<String>,
        attempt: u32,
        job_state: Option<JobState>,
        progress: Option<u32>,
    },
    Ready {
        media: MediaResult,
    },
    Error {
        message: String,
    },
}

/// Fieldless tag of a [`Phase`], for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Idle,
    Searching,
    Results,
    Processing,
    Ready,
    Error,
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PhaseKind::Idle => "idle",
            PhaseKind::Searching => "searching",
            PhaseKind::Results => "results",
            PhaseKind::Processing => "processing",
            PhaseKind::Ready => "ready",
            PhaseKind::Error => "error",
        };
        f.write_str(s)
    }
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::Searching { .. } => PhaseKind::Searching,
            Phase::Results { .. } => PhaseKind::Results,
            Phase::Processing { .. } => PhaseKind::Processing,
            Phase::Ready { .. } => PhaseKind::Ready,
            Phase::Error { .. } => PhaseKind::Error,
        }
    }
}

/// Work the controller must start on behalf of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Search {
        epoch: Epoch,
        query: String,
    },
    Process {
        epoch: Epoch,
        video_id: String,
        mode: Mode,
    },
    Poll {
        epoch: Epoch,
        job_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed: rejected input or a stale completion.
    Ignored,
    Changed,
    /// State changed and the effect must be started.
    Start(Effect),
}

/// What one poll tick, or the end of the poll loop, reported.
#[derive(Debug)]
pub enum PollEvent {
    Progress { attempt: u32, status: JobStatus },
    Ready { url: String, download_url: String },
    Failed { error: Option<String> },
    TimedOut { attempts: u32 },
    Transport(ApiError),
}

impl PollEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollEvent::Progress { .. })
    }
}

#[derive(Debug)]
pub struct Machine {
    phase: Phase,
    epoch: Epoch,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            epoch: 0,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn advance_epoch(&mut self) -> Epoch {
        self.epoch += 1;
        self.epoch
    }

    fn fail(&mut self, message: impl Into<String>) -> Outcome {
        self.phase = Phase::Error {
            message: message.into(),
        };
        Outcome::Changed
    }

    /// Start a search. Blank queries are rejected without touching state.
    ///
    /// Accepted from `idle`, `results` and `searching`; a search issued while
    /// another is pending supersedes it.
    pub fn search(&mut self, query: &str) -> Outcome {
        let query = query.trim();
        if query.is_empty() {
            return Outcome::Ignored;
        }
        if !matches!(
            self.phase,
            Phase::Idle | Phase::Searching { .. } | Phase::Results { .. }
        ) {
            return Outcome::Ignored;
        }
        let epoch = self.advance_epoch();
        self.phase = Phase::Searching {
            query: query.to_string(),
        };
        Outcome::Start(Effect::Search {
            epoch,
            query: query.to_string(),
        })
    }

    /// Select a result by position. Always clears the mode.
    pub fn select_result(&mut self, index: usize) -> Outcome {
        match &mut self.phase {
            Phase::Results {
                results, selection, ..
            } if index < results.len() => {
                *selection = Some(Selection { index, mode: None });
                Outcome::Changed
            }
            _ => Outcome::Ignored,
        }
    }

    /// Choose the delivery mode for the current selection.
    pub fn select_mode(&mut self, mode: Mode) -> Outcome {
        match &mut self.phase {
            Phase::Results {
                selection: Some(sel),
                ..
            } => {
                sel.mode = Some(mode);
                Outcome::Changed
            }
            _ => Outcome::Ignored,
        }
    }

    /// Request the selected result in the selected mode. A no-op unless both
    /// are present.
    pub fn fetch(&mut self) -> Outcome {
        let (result, mode) = match &self.phase {
            Phase::Results {
                results,
                selection:
                    Some(Selection {
                        index,
                        mode: Some(mode),
                    }),
                ..
            } => match results.get(*index) {
                Some(r) => (r.clone(), *mode),
                None => return Outcome::Ignored,
            },
            _ => return Outcome::Ignored,
        };
        let epoch = self.advance_epoch();
        let video_id = result.id.clone();
        self.phase = Phase::Processing {
            result,
            mode,
            job_id: None,
            attempt: 0,
            job_state: None,
            progress: None,
        };
        Outcome::Start(Effect::Process {
            epoch,
            video_id,
            mode,
        })
    }

    /// Back to `idle` from anywhere. Pending completions become stale.
    pub fn reset(&mut self) -> Outcome {
        self.advance_epoch();
        self.phase = Phase::Idle;
        Outcome::Changed
    }

    pub fn on_search(
        &mut self,
        epoch: Epoch,
        result: Result<Vec<SearchResult>, ApiError>,
    ) -> Outcome {
        if epoch != self.epoch {
            return Outcome::Ignored;
        }
        let query = match &self.phase {
            Phase::Searching { query } => query.clone(),
            _ => return Outcome::Ignored,
        };
        match result {
            Ok(results) if results.is_empty() => self.fail(NO_RESULTS),
            Ok(results) => {
                self.phase = Phase::Results {
                    query,
                    results,
                    selection: None,
                };
                Outcome::Changed
            }
            Err(e) => {
                tracing::warn!(error = %e, "search failed");
                self.fail(SEARCH_FAILED)
            }
        }
    }

    pub fn on_process(
        &mut self,
        epoch: Epoch,
        result: Result<ProcessResponse, ApiError>,
    ) -> Outcome {
        if epoch != self.epoch {
            return Outcome::Ignored;
        }
        let (title, mode) = match &self.phase {
            Phase::Processing {
                result,
                mode,
                job_id: None,
                ..
            } => (result.title.clone(), *mode),
            _ => return Outcome::Ignored,
        };
        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "process request failed");
                return self.fail(PROCESS_FAILED);
            }
        };

        match mode {
            Mode::Video => {
                let raw_status = resp.status.as_deref().unwrap_or("ready");
                if JobState::parse(raw_status) == JobState::Failed {
                    return self.fail(non_empty(resp.error).unwrap_or_else(|| PROCESS_FAILED.into()));
                }
                let Some(embed_url) = non_empty(resp.embed_url) else {
                    tracing::warn!("video process response carried no embed_url");
                    return self.fail(PROCESS_FAILED);
                };
                let status = if raw_status.eq_ignore_ascii_case("blocked") {
                    MediaStatus::Blocked
                } else {
                    MediaStatus::Ready
                };
                self.phase = Phase::Ready {
                    media: MediaResult {
                        kind: MediaKind::Video,
                        url: embed_url,
                        download_url: None,
                        title,
                        job_id: resp.job_id,
                        status,
                    },
                };
                Outcome::Changed
            }
            Mode::Audio => {
                let Some(new_job) = non_empty(resp.job_id) else {
                    tracing::warn!("audio process response carried no job_id");
                    return self.fail(PROCESS_FAILED);
                };
                if let Phase::Processing { job_id, .. } = &mut self.phase {
                    *job_id = Some(new_job.clone());
                }
                Outcome::Start(Effect::Poll {
                    epoch,
                    job_id: new_job,
                })
            }
        }
    }

    pub fn on_poll(&mut self, epoch: Epoch, event: PollEvent) -> Outcome {
        if epoch != self.epoch {
            return Outcome::Ignored;
        }
        let Phase::Processing {
            result,
            mode: Mode::Audio,
            job_id: Some(job_id),
            attempt,
            job_state,
            progress,
        } = &mut self.phase
        else {
            return Outcome::Ignored;
        };

        match event {
            PollEvent::Progress {
                attempt: n,
                status,
            } => {
                *attempt = n;
                *job_state = Some(status.state());
                *progress = status.progress;
                Outcome::Changed
            }
            PollEvent::Ready { url, download_url } => {
                let media = MediaResult {
                    kind: MediaKind::Audio,
                    url,
                    download_url: Some(download_url),
                    title: result.title.clone(),
                    job_id: Some(job_id.clone()),
                    status: MediaStatus::Ready,
                };
                self.phase = Phase::Ready { media };
                Outcome::Changed
            }
            PollEvent::Failed { error } => {
                self.fail(non_empty(error).unwrap_or_else(|| JOB_FAILED.into()))
            }
            PollEvent::TimedOut { attempts } => {
                tracing::warn!(attempts, "job did not finish in time");
                self.fail(POLL_TIMEOUT)
            }
            PollEvent::Transport(e) => {
                tracing::warn!(error = %e, "status check failed");
                self.fail(STATUS_FAILED)
            }
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}
