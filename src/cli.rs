use crate::backend::BasketClient;
use crate::model::{Mode, RunConfig, SearchResult};
use crate::orchestrator::{
    self, CompletedFetch, ControllerSettings, OrchestratorEvent, Phase, Selection, UiCommand,
};
use crate::theme::ThemeMode;
use crate::view::Screen;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "basket",
    version,
    about = "Search, pick and fetch media from a Basket server"
)]
pub struct Cli {
    /// Base URL of the Basket backend
    #[arg(long, env = "BASKET_API_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Print the JSON report and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Search query for --text/--json runs
    #[arg(long)]
    pub query: Option<String>,

    /// Which search result to fetch in --text/--json runs (1-based)
    #[arg(long, default_value_t = 1)]
    pub pick: usize,

    /// Delivery mode for --text/--json runs
    #[arg(long, value_enum, default_value_t = Mode::Audio)]
    pub mode: Mode,

    /// Save the audio file after a --text/--json run
    #[arg(long)]
    pub download: bool,

    /// Export the fetch report as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Directory downloaded audio is written to
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Delay between job status checks
    #[arg(long, default_value = "1s")]
    pub poll_interval: humantime::Duration,

    /// Status checks before a job is given up on
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_poll_attempts: u32,

    /// Per-request timeout (unset: no timeout)
    #[arg(long)]
    pub request_timeout: Option<humantime::Duration>,

    /// Write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Use this theme for the session without saving it
    #[arg(long, value_enum)]
    pub theme: Option<ThemeMode>,
}

pub async fn run(args: Cli) -> Result<()> {
    let headless = args.json || args.text || cfg!(not(feature = "tui"));
    crate::logging::init(args.log_file.as_deref(), !headless)?;

    if args.json && args.text {
        return Err(anyhow::anyhow!("--json and --text are mutually exclusive"));
    }
    if headless && args.query.as_deref().map_or(true, |q| q.trim().is_empty()) {
        return Err(anyhow::anyhow!(
            "--query is required with --text or --json"
        ));
    }
    if args.pick == 0 {
        return Err(anyhow::anyhow!("--pick is 1-based"));
    }

    if !headless {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
    }

    run_headless(args).await
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        base_url: args.base_url.clone(),
        poll_interval: Duration::from(args.poll_interval),
        max_poll_attempts: args.max_poll_attempts,
        request_timeout: args.request_timeout.map(Duration::from),
        user_agent: format!("basket/{}", env!("CARGO_PKG_VERSION")),
        download_dir: args
            .download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

/// Drive one search → pick → fetch cycle through the controller and print the outcome.
async fn run_headless(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let client = Arc::new(BasketClient::new(&cfg).context("failed to build HTTP client")?);
    let query = args.query.clone().unwrap_or_default();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<OrchestratorEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let controller = tokio::spawn(orchestrator::run_controller(
        client.clone(),
        ControllerSettings::from(&cfg),
        event_tx,
        cmd_rx,
    ));
    let (out_tx, out_handle) = spawn_output_writer();

    let _ = cmd_tx.send(UiCommand::Search(query.clone()));

    let mut picked: Option<SearchResult> = None;
    let outcome = loop {
        let Some(ev) = event_rx.recv().await else {
            break Err(anyhow::anyhow!("controller stopped unexpectedly"));
        };
        let phase = match ev {
            OrchestratorEvent::Info(info) => {
                let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
                continue;
            }
            OrchestratorEvent::PhaseChanged(phase) => phase,
        };

        if args.text {
            for line in crate::text_summary::screen_lines(&Screen::from_phase(&phase)) {
                let _ = out_tx.send(OutputLine::Stderr(line));
            }
        }

        match phase {
            Phase::Results {
                results,
                selection: None,
                ..
            } => {
                let index = args.pick - 1;
                match results.get(index) {
                    Some(r) => {
                        picked = Some(r.clone());
                        let _ = cmd_tx.send(UiCommand::SelectResult(index));
                    }
                    None => {
                        break Err(anyhow::anyhow!(
                            "--pick {} is out of range: only {} result(s)",
                            args.pick,
                            results.len()
                        ));
                    }
                }
            }
            Phase::Results {
                selection: Some(Selection { mode: None, .. }),
                ..
            } => {
                let _ = cmd_tx.send(UiCommand::SelectMode(args.mode));
            }
            Phase::Results {
                selection: Some(Selection { mode: Some(_), .. }),
                ..
            } => {
                let _ = cmd_tx.send(UiCommand::Fetch);
            }
            Phase::Ready { media } => break Ok(media),
            Phase::Error { message } => break Err(anyhow::anyhow!(message)),
            Phase::Idle | Phase::Searching { .. } | Phase::Processing { .. } => {}
        }
    };

    let _ = cmd_tx.send(UiCommand::Quit);
    controller.await.context("controller task failed")??;

    let res = match (outcome, picked) {
        (Ok(media), Some(result)) => {
            let processed = orchestrator::process_fetch_completion(
                &args,
                &cfg,
                client.as_ref(),
                CompletedFetch {
                    query: &query,
                    mode: args.mode,
                    result: &result,
                    media: &media,
                },
            )
            .await;
            for msg in processed.messages {
                let _ = out_tx.send(OutputLine::Stderr(msg));
            }
            if args.json {
                let out = serde_json::to_string_pretty(&processed.report)?;
                let _ = out_tx.send(OutputLine::Stdout(out));
            } else {
                for line in crate::text_summary::build_text_summary(&processed.report).lines {
                    let _ = out_tx.send(OutputLine::Stdout(line));
                }
            }
            Ok(())
        }
        (Ok(_), None) => Err(anyhow::anyhow!("fetch finished without a selected result")),
        (Err(e), _) => Err(e),
    };

    drop(out_tx);
    let _ = out_handle.await;
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_contract() {
        let args = Cli::parse_from(["basket", "--base-url", "http://localhost:8000"]);
        let cfg = build_config(&args);
        assert_eq!(cfg.base_url, "http://localhost:8000");
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.max_poll_attempts, 60);
        assert!(cfg.request_timeout.is_none());
        assert_eq!(args.mode, Mode::Audio);
        assert_eq!(args.pick, 1);
    }

    #[test]
    fn durations_parse_with_humantime() {
        let args = Cli::parse_from([
            "basket",
            "--poll-interval",
            "250ms",
            "--request-timeout",
            "5s",
            "--download-dir",
            "/tmp/basket",
        ]);
        let cfg = build_config(&args);
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(cfg.download_dir, PathBuf::from("/tmp/basket"));
    }

    #[test]
    fn zero_poll_attempts_is_rejected() {
        assert!(Cli::try_parse_from(["basket", "--max-poll-attempts", "0"]).is_err());
    }

    #[test]
    fn mode_accepts_lowercase_names() {
        let args = Cli::parse_from(["basket", "--mode", "video"]);
        assert_eq!(args.mode, Mode::Video);
    }
}
