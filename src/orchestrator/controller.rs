//! Fetch lifecycle controller.
//!
//! Owns the phase machine, runs its effects as tokio tasks and emits events for
//! presentation layers. At most one request task and one poll task exist at a
//! time; both are aborted whenever the machine moves past them.

use super::machine::{Effect, Epoch, Machine, Outcome, Phase, PollEvent};
use super::poll::{poll_job, PollConfig};
use crate::backend::{ApiError, Backend};
use crate::model::{MediaKind, Mode, ProcessResponse, RunConfig, SearchResult};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Search(String),
    SelectResult(usize),
    SelectMode(Mode),
    Fetch,
    Reset,
    /// Save the ready audio file into the configured download directory.
    Download,
    Quit,
}

#[derive(Debug, Clone)]
pub(crate) enum OrchestratorEvent {
    PhaseChanged(Phase),
    Info(InfoEvent),
}

/// Side-channel notices that do not change the phase.
#[derive(Debug, Clone)]
pub(crate) enum InfoEvent {
    Message(String),
    Downloading { job_id: String },
    Downloaded { path: PathBuf },
    DownloadFailed(String),
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Downloading { job_id } => format!("Downloading {job_id}.mp3…"),
            InfoEvent::Downloaded { path } => format!("Saved: {}", path.display()),
            InfoEvent::DownloadFailed(e) => format!("Download failed: {e}"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ControllerSettings {
    pub poll: PollConfig,
    pub download_dir: PathBuf,
}

impl From<&RunConfig> for ControllerSettings {
    fn from(cfg: &RunConfig) -> Self {
        Self {
            poll: PollConfig {
                interval: cfg.poll_interval,
                max_attempts: cfg.max_poll_attempts,
            },
            download_dir: cfg.download_dir.clone(),
        }
    }
}

enum Completion {
    Search {
        epoch: Epoch,
        result: Result<Vec<SearchResult>, ApiError>,
    },
    Process {
        epoch: Epoch,
        result: Result<ProcessResponse, ApiError>,
    },
    Poll {
        epoch: Epoch,
        event: PollEvent,
    },
    Download(Result<PathBuf, ApiError>),
}

struct Controller<B: Backend> {
    backend: Arc<B>,
    settings: ControllerSettings,
    machine: Machine,
    request: Option<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
    done_tx: UnboundedSender<Completion>,
    event_tx: UnboundedSender<OrchestratorEvent>,
}

impl<B: Backend> Controller<B> {
    fn emit_phase(&self) {
        let phase = self.machine.phase();
        tracing::info!(phase = %phase.kind(), epoch = self.machine.epoch(), "phase changed");
        let _ = self
            .event_tx
            .send(OrchestratorEvent::PhaseChanged(phase.clone()));
    }

    fn emit_info(&self, info: InfoEvent) {
        let _ = self.event_tx.send(OrchestratorEvent::Info(info));
    }

    fn cancel_request(&mut self) {
        if let Some(h) = self.request.take() {
            h.abort();
        }
    }

    fn cancel_poller(&mut self) {
        if let Some(h) = self.poller.take() {
            tracing::debug!("cancelling poll loop");
            h.abort();
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Ignored => {}
            Outcome::Changed => self.emit_phase(),
            Outcome::Start(effect) => {
                self.emit_phase();
                self.start(effect);
            }
        }
    }

    fn start(&mut self, effect: Effect) {
        let backend = self.backend.clone();
        let tx = self.done_tx.clone();
        match effect {
            Effect::Search { epoch, query } => {
                self.cancel_request();
                self.cancel_poller();
                self.request = Some(tokio::spawn(async move {
                    let result = backend.search(&query).await;
                    let _ = tx.send(Completion::Search { epoch, result });
                }));
            }
            Effect::Process {
                epoch,
                video_id,
                mode,
            } => {
                self.cancel_request();
                self.cancel_poller();
                self.request = Some(tokio::spawn(async move {
                    let result = backend.process(&video_id, mode).await;
                    let _ = tx.send(Completion::Process { epoch, result });
                }));
            }
            Effect::Poll { epoch, job_id } => {
                self.cancel_poller();
                let cfg = self.settings.poll;
                tracing::info!(%job_id, interval = ?cfg.interval, max_attempts = cfg.max_attempts, "polling job");
                self.poller = Some(tokio::spawn(async move {
                    let event = poll_job(backend.as_ref(), &job_id, cfg, |attempt, status| {
                        let _ = tx.send(Completion::Poll {
                            epoch,
                            event: PollEvent::Progress {
                                attempt,
                                status: status.clone(),
                            },
                        });
                    })
                    .await;
                    let _ = tx.send(Completion::Poll { epoch, event });
                }));
            }
        }
    }

    fn handle_command(&mut self, cmd: UiCommand) {
        tracing::debug!(?cmd, "ui command");
        match cmd {
            UiCommand::Search(query) => {
                let out = self.machine.search(&query);
                self.apply(out);
            }
            UiCommand::SelectResult(index) => {
                let out = self.machine.select_result(index);
                self.apply(out);
            }
            UiCommand::SelectMode(mode) => {
                let out = self.machine.select_mode(mode);
                self.apply(out);
            }
            UiCommand::Fetch => {
                let out = self.machine.fetch();
                self.apply(out);
            }
            UiCommand::Reset => {
                self.cancel_request();
                self.cancel_poller();
                let out = self.machine.reset();
                self.apply(out);
            }
            UiCommand::Download => self.start_download(),
            // Handled by the run loop.
            UiCommand::Quit => {}
        }
    }

    fn start_download(&mut self) {
        let job_id = match self.machine.phase() {
            Phase::Ready { media } if media.kind == MediaKind::Audio => media.job_id.clone(),
            _ => None,
        };
        let Some(job_id) = job_id else {
            self.emit_info(InfoEvent::Message(
                "Nothing to download: no audio is ready.".into(),
            ));
            return;
        };
        self.emit_info(InfoEvent::Downloading {
            job_id: job_id.clone(),
        });
        let backend = self.backend.clone();
        let tx = self.done_tx.clone();
        let dir = self.settings.download_dir.clone();
        // Downloads are not tied to the phase; a reset does not interrupt them.
        tokio::spawn(async move {
            let result = backend.download(&job_id, &dir).await;
            let _ = tx.send(Completion::Download(result));
        });
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Search { epoch, result } => {
                let out = self.machine.on_search(epoch, result);
                if out != Outcome::Ignored {
                    self.request = None;
                }
                self.apply(out);
            }
            Completion::Process { epoch, result } => {
                let out = self.machine.on_process(epoch, result);
                if out != Outcome::Ignored {
                    self.request = None;
                }
                self.apply(out);
            }
            Completion::Poll { epoch, event } => {
                let terminal = event.is_terminal();
                let out = self.machine.on_poll(epoch, event);
                if terminal && out != Outcome::Ignored {
                    self.poller = None;
                }
                self.apply(out);
            }
            Completion::Download(Ok(path)) => self.emit_info(InfoEvent::Downloaded { path }),
            Completion::Download(Err(e)) => {
                tracing::warn!(error = %e, "download failed");
                self.emit_info(InfoEvent::DownloadFailed(e.to_string()));
            }
        }
    }
}

/// Drive the phase machine from UI commands and emit events back to presentation layers.
///
/// Returns once `Quit` arrives or the command channel closes; any in-flight
/// request or poll loop is aborted first.
pub(crate) async fn run_controller<B: Backend>(
    backend: Arc<B>,
    settings: ControllerSettings,
    event_tx: UnboundedSender<OrchestratorEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
    let mut ctl = Controller {
        backend,
        settings,
        machine: Machine::new(),
        request: None,
        poller: None,
        done_tx,
        event_tx,
    };
    ctl.emit_phase();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Quit) | None => {
                        ctl.cancel_request();
                        ctl.cancel_poller();
                        break;
                    }
                    Some(cmd) => ctl.handle_command(cmd),
                }
            }
            // The controller keeps a sender alive, so this never yields None.
            Some(done) = done_rx.recv() => ctl.handle_completion(done),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MediaStatus, ProcessResponse};
    use crate::orchestrator::machine::{PhaseKind, NO_RESULTS, POLL_TIMEOUT};
    use crate::orchestrator::testing::{result, status, FakeBackend};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Harness {
        backend: Arc<FakeBackend>,
        cmd_tx: UnboundedSender<UiCommand>,
        event_rx: UnboundedReceiver<OrchestratorEvent>,
        handle: JoinHandle<Result<()>>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn start(backend: FakeBackend) -> Self {
            let backend = Arc::new(backend);
            let dir = tempfile::tempdir().expect("tempdir");
            let settings = ControllerSettings {
                poll: PollConfig {
                    interval: Duration::from_millis(2),
                    max_attempts: 60,
                },
                download_dir: dir.path().to_path_buf(),
            };
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
            let handle = tokio::spawn(run_controller(backend.clone(), settings, event_tx, cmd_rx));
            Self {
                backend,
                cmd_tx,
                event_rx,
                handle,
                _dir: dir,
            }
        }

        fn send(&self, cmd: UiCommand) {
            self.cmd_tx.send(cmd).expect("controller alive");
        }

        async fn next_phase(&mut self) -> Phase {
            loop {
                let ev = tokio::time::timeout(Duration::from_secs(5), self.event_rx.recv())
                    .await
                    .expect("timed out waiting for event")
                    .expect("controller stopped");
                if let OrchestratorEvent::PhaseChanged(p) = ev {
                    return p;
                }
            }
        }

        async fn wait_for(&mut self, kind: PhaseKind) -> Phase {
            loop {
                let p = self.next_phase().await;
                if p.kind() == kind {
                    return p;
                }
            }
        }

        async fn next_info(&mut self) -> InfoEvent {
            loop {
                let ev = tokio::time::timeout(Duration::from_secs(5), self.event_rx.recv())
                    .await
                    .expect("timed out waiting for event")
                    .expect("controller stopped");
                if let OrchestratorEvent::Info(i) = ev {
                    return i;
                }
            }
        }

        /// Asserts nothing but progress arrives for `window`.
        async fn assert_quiet(&mut self, window: Duration) {
            tokio::time::sleep(window).await;
            while let Ok(ev) = self.event_rx.try_recv() {
                if let OrchestratorEvent::PhaseChanged(p) = ev {
                    panic!("unexpected phase change: {p:?}");
                }
            }
        }

        async fn shutdown(self) {
            self.send(UiCommand::Quit);
            self.handle
                .await
                .expect("controller task")
                .expect("controller result");
        }
    }

    async fn to_selection(h: &mut Harness, mode: Mode) {
        assert_eq!(h.next_phase().await, Phase::Idle);
        h.send(UiCommand::Search("song".into()));
        h.wait_for(PhaseKind::Results).await;
        h.send(UiCommand::SelectResult(0));
        h.next_phase().await;
        h.send(UiCommand::SelectMode(mode));
        h.next_phase().await;
    }

    fn audio_job() -> ProcessResponse {
        ProcessResponse {
            job_id: Some("job-7".into()),
            status: Some("queued".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn blank_search_never_reaches_backend() {
        let mut h = Harness::start(FakeBackend::default().with_results(vec![result("a")]));
        assert_eq!(h.next_phase().await, Phase::Idle);
        h.send(UiCommand::Search("   ".into()));
        h.assert_quiet(Duration::from_millis(30)).await;
        assert_eq!(h.backend.search_calls.load(Ordering::SeqCst), 0);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn empty_search_ends_in_error() {
        let mut h = Harness::start(FakeBackend::default().with_results(Vec::new()));
        h.next_phase().await;
        h.send(UiCommand::Search("zzz".into()));
        assert_eq!(h.next_phase().await.kind(), PhaseKind::Searching);
        assert_eq!(
            h.next_phase().await,
            Phase::Error {
                message: NO_RESULTS.into()
            }
        );
        h.shutdown().await;
    }

    #[tokio::test]
    async fn fetch_without_mode_makes_no_request() {
        let mut h = Harness::start(
            FakeBackend::default()
                .with_results(vec![result("a")])
                .with_process(audio_job()),
        );
        h.next_phase().await;
        h.send(UiCommand::Search("song".into()));
        h.wait_for(PhaseKind::Results).await;
        h.send(UiCommand::SelectResult(0));
        h.next_phase().await;
        h.send(UiCommand::Fetch);
        h.assert_quiet(Duration::from_millis(30)).await;
        assert_eq!(h.backend.process_calls.load(Ordering::SeqCst), 0);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn video_fetch_skips_polling() {
        let backend = FakeBackend::default()
            .with_results(vec![result("vid")])
            .with_process(ProcessResponse {
                job_id: Some("j".into()),
                status: Some("ready".into()),
                embed_url: Some("https://www.youtube.com/embed/vid".into()),
                error: None,
            });
        let mut h = Harness::start(backend);
        to_selection(&mut h, Mode::Video).await;

        h.send(UiCommand::Fetch);
        assert_eq!(h.next_phase().await.kind(), PhaseKind::Processing);
        let Phase::Ready { media } = h.next_phase().await else {
            panic!("expected ready");
        };
        assert_eq!(media.kind, MediaKind::Video);
        assert_eq!(media.status, MediaStatus::Ready);
        assert_eq!(
            h.backend.process_requests.lock().unwrap().as_slice(),
            &[("vid".to_string(), Mode::Video)]
        );
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 0);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn audio_ready_on_third_tick_then_stops() {
        let backend = FakeBackend::default()
            .with_results(vec![result("a")])
            .with_process(audio_job())
            .with_statuses([
                Some(status("pending")),
                Some(status("pending")),
                Some(status("ready")),
            ]);
        let mut h = Harness::start(backend);
        to_selection(&mut h, Mode::Audio).await;

        h.send(UiCommand::Fetch);
        let mut attempts_seen = Vec::new();
        let media = loop {
            match h.next_phase().await {
                Phase::Processing { attempt, .. } => attempts_seen.push(attempt),
                Phase::Ready { media } => break media,
                other => panic!("unexpected phase {other:?}"),
            }
        };
        assert_eq!(media.kind, MediaKind::Audio);
        assert_eq!(media.job_id.as_deref(), Some("job-7"));
        assert_eq!(attempts_seen.last(), Some(&2));
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 3);

        h.assert_quiet(Duration::from_millis(30)).await;
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 3);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn failed_job_reports_server_message() {
        let mut failed = status("failed");
        failed.error = Some("SOURCE_RESTRICTED".into());
        let backend = FakeBackend::default()
            .with_results(vec![result("a")])
            .with_process(audio_job())
            .with_statuses([Some(failed)]);
        let mut h = Harness::start(backend);
        to_selection(&mut h, Mode::Audio).await;

        h.send(UiCommand::Fetch);
        assert_eq!(
            h.wait_for(PhaseKind::Error).await,
            Phase::Error {
                message: "SOURCE_RESTRICTED".into()
            }
        );
        h.assert_quiet(Duration::from_millis(30)).await;
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 1);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn sixty_pending_ticks_time_out() {
        let backend = FakeBackend::default()
            .with_results(vec![result("a")])
            .with_process(audio_job());
        let mut h = Harness::start(backend);
        to_selection(&mut h, Mode::Audio).await;

        h.send(UiCommand::Fetch);
        assert_eq!(
            h.wait_for(PhaseKind::Error).await,
            Phase::Error {
                message: POLL_TIMEOUT.into()
            }
        );
        h.assert_quiet(Duration::from_millis(30)).await;
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 60);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn reset_cancels_active_poll_loop() {
        let backend = FakeBackend::default()
            .with_results(vec![result("a")])
            .with_process(audio_job());
        let mut h = Harness::start(backend);
        to_selection(&mut h, Mode::Audio).await;

        h.send(UiCommand::Fetch);
        // Wait until the loop has ticked at least once.
        loop {
            if let Phase::Processing { attempt, .. } = h.next_phase().await {
                if attempt >= 1 {
                    break;
                }
            }
        }
        h.send(UiCommand::Reset);
        h.wait_for(PhaseKind::Idle).await;
        let calls = h.backend.status_calls.load(Ordering::SeqCst);

        h.assert_quiet(Duration::from_millis(40)).await;
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), calls);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn reset_during_search_discards_late_response() {
        let backend = FakeBackend::default()
            .with_results(vec![result("a")])
            .with_search_delay(Duration::from_millis(30));
        let mut h = Harness::start(backend);
        h.next_phase().await;

        h.send(UiCommand::Search("slow".into()));
        assert_eq!(h.next_phase().await.kind(), PhaseKind::Searching);
        h.send(UiCommand::Reset);
        assert_eq!(h.next_phase().await, Phase::Idle);

        h.assert_quiet(Duration::from_millis(60)).await;
        h.shutdown().await;
    }

    #[tokio::test]
    async fn reset_during_video_process_stays_idle() {
        let backend = FakeBackend::default()
            .with_results(vec![result("a")])
            .with_process(ProcessResponse {
                embed_url: Some("https://www.youtube.com/embed/a".into()),
                ..Default::default()
            })
            .with_process_delay(Duration::from_millis(30));
        let mut h = Harness::start(backend);
        to_selection(&mut h, Mode::Video).await;

        h.send(UiCommand::Fetch);
        assert_eq!(h.next_phase().await.kind(), PhaseKind::Processing);
        h.send(UiCommand::Reset);
        assert_eq!(h.next_phase().await, Phase::Idle);
        h.assert_quiet(Duration::from_millis(60)).await;
        h.shutdown().await;
    }

    #[tokio::test]
    async fn download_saves_ready_audio() {
        let backend = FakeBackend::default()
            .with_results(vec![result("a")])
            .with_process(audio_job())
            .with_statuses([Some(status("ready"))]);
        let mut h = Harness::start(backend);
        to_selection(&mut h, Mode::Audio).await;
        h.send(UiCommand::Fetch);
        h.wait_for(PhaseKind::Ready).await;

        h.send(UiCommand::Download);
        assert!(matches!(h.next_info().await, InfoEvent::Downloading { ref job_id } if job_id == "job-7"));
        let InfoEvent::Downloaded { path } = h.next_info().await else {
            panic!("expected download");
        };
        assert!(path.ends_with("job-7.mp3"));
        assert!(path.exists());
        h.shutdown().await;
    }

    #[tokio::test]
    async fn download_before_ready_is_refused() {
        let mut h = Harness::start(FakeBackend::default());
        h.next_phase().await;
        h.send(UiCommand::Download);
        assert!(matches!(h.next_info().await, InfoEvent::Message(_)));
        h.shutdown().await;
    }
}
