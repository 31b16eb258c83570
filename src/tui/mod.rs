mod help;
mod state;

use crate::backend::BasketClient;
use crate::cli::{build_config, Cli};
use crate::model::Mode;
use crate::orchestrator::{self, ControllerSettings, OrchestratorEvent, UiCommand};
use crate::theme::ThemeContext;
use crate::view::{ModeSelector, ResultRow, Screen};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Terminal,
};
use state::{Palette, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let client = Arc::new(BasketClient::new(&cfg).context("failed to build HTTP client")?);
    let theme = match args.theme {
        Some(mode) => ThemeContext::ephemeral(mode),
        None => ThemeContext::load(ThemeContext::default_store()),
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel::<OrchestratorEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let max_poll_attempts = cfg.max_poll_attempts;
    let ui_handle =
        std::thread::spawn(move || run_threaded(theme, max_poll_attempts, event_rx, cmd_tx));

    let res = orchestrator::run_controller(
        client,
        ControllerSettings::from(&cfg),
        event_tx,
        cmd_rx,
    )
    .await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// What a key press asks the UI loop to do.
#[derive(Debug)]
enum KeyAction {
    Nothing,
    Command(UiCommand),
    CopyUrl,
    Quit,
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    theme: ThemeContext,
    max_poll_attempts: u32,
    mut event_rx: UnboundedReceiver<OrchestratorEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::new(theme, max_poll_attempts);
    // Kept alive for the session: some platforms drop clipboard contents with the handle.
    let mut clipboard: Option<arboard::Clipboard> = None;

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            match ev {
                OrchestratorEvent::PhaseChanged(phase) => state.apply_phase(phase),
                OrchestratorEvent::Info(info) => state.info = info.to_message(),
            }
            dirty = true;
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                dirty = true;
                match handle_key(&mut state, k) {
                    KeyAction::Nothing => {}
                    KeyAction::Command(cmd) => {
                        if cmd_tx.send(cmd).is_err() {
                            break Err(anyhow::anyhow!("controller stopped"));
                        }
                    }
                    KeyAction::CopyUrl => {
                        state.info = match state.media_url() {
                            Some(url) => match copy_to_clipboard(&mut clipboard, url) {
                                Ok(()) => format!("✓ Copied to clipboard: {url}"),
                                Err(e) => format!("Clipboard copy failed: {e:#}"),
                            },
                            None => "Nothing to copy yet.".into(),
                        };
                    }
                    KeyAction::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn copy_to_clipboard(slot: &mut Option<arboard::Clipboard>, text: &str) -> Result<()> {
    if slot.is_none() {
        *slot = Some(arboard::Clipboard::new().context("open clipboard")?);
    }
    if let Some(cb) = slot.as_mut() {
        cb.set_text(text.to_string()).context("set clipboard text")?;
    }
    Ok(())
}

fn handle_key(state: &mut UiState, k: KeyEvent) -> KeyAction {
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }

    if state.is_editing() {
        return match k.code {
            KeyCode::Enter => {
                if state.query.trim().is_empty() {
                    state.info = "Type something to search.".into();
                    KeyAction::Nothing
                } else {
                    state.info.clear();
                    KeyAction::Command(UiCommand::Search(state.query.clone()))
                }
            }
            KeyCode::Backspace => {
                state.query.pop();
                KeyAction::Nothing
            }
            KeyCode::Esc => {
                if matches!(state.phase, orchestrator::Phase::Results { .. }) {
                    state.editing = false;
                    KeyAction::Nothing
                } else {
                    KeyAction::Quit
                }
            }
            KeyCode::Char(c) if !k.modifiers.contains(KeyModifiers::CONTROL) => {
                state.query.push(c);
                KeyAction::Nothing
            }
            _ => KeyAction::Nothing,
        };
    }

    if state.show_help {
        if matches!(k.code, KeyCode::Char('?') | KeyCode::Esc) {
            state.show_help = false;
        }
        return KeyAction::Nothing;
    }

    let screen = Screen::from_phase(&state.phase);
    match k.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('?') => {
            state.show_help = true;
            KeyAction::Nothing
        }
        KeyCode::Char('t') => {
            state.info = match state.theme.toggle() {
                Ok(mode) => format!("Theme: {mode:?}"),
                Err(e) => format!("Theme change not saved: {e:#}"),
            };
            KeyAction::Nothing
        }
        KeyCode::Char('r') => KeyAction::Command(UiCommand::Reset),
        KeyCode::Up | KeyCode::Char('k') => {
            state.move_cursor(-1);
            KeyAction::Nothing
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.move_cursor(1);
            KeyAction::Nothing
        }
        KeyCode::Char('/') if matches!(screen, Screen::Results { .. }) => {
            state.editing = true;
            KeyAction::Nothing
        }
        KeyCode::Char(' ') if matches!(screen, Screen::Results { .. }) => {
            KeyAction::Command(UiCommand::SelectResult(state.cursor))
        }
        KeyCode::Char('a') if matches!(screen, Screen::Results { .. }) => {
            KeyAction::Command(UiCommand::SelectMode(Mode::Audio))
        }
        KeyCode::Char('v') if matches!(screen, Screen::Results { .. }) => {
            KeyAction::Command(UiCommand::SelectMode(Mode::Video))
        }
        KeyCode::Char('d') if matches!(screen, Screen::AudioPlayer { .. }) => {
            KeyAction::Command(UiCommand::Download)
        }
        KeyCode::Char('y') if screen.offers_search_again() => KeyAction::CopyUrl,
        KeyCode::Enter => match &screen {
            Screen::Results {
                mode_selector:
                    Some(ModeSelector {
                        confirm_enabled: true,
                        ..
                    }),
                ..
            } => KeyAction::Command(UiCommand::Fetch),
            Screen::Results { .. } => {
                state.info = "Select a result (Space) and a format (a/v) first.".into();
                KeyAction::Nothing
            }
            s if s.offers_search_again() => KeyAction::Command(UiCommand::Reset),
            _ => KeyAction::Nothing,
        },
        _ => KeyAction::Nothing,
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let palette = state.palette();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "BASKET",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            if state.theme.is_dark() {
                "  dark theme"
            } else {
                "  light theme"
            },
            Style::default().fg(palette.muted),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).title("basket"));
    f.render_widget(header, chunks[0]);

    let screen = Screen::from_phase(&state.phase);
    if state.show_help {
        help::draw_help(chunks[1], f, &palette);
    } else {
        draw_screen(chunks[1], f, state, &screen, &palette);
    }

    let footer = Paragraph::new(vec![Line::from(Span::styled(
        if state.info.is_empty() {
            key_hints(state, &screen).to_string()
        } else {
            state.info.clone()
        },
        Style::default().fg(palette.muted),
    ))])
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(footer, chunks[2]);
}

fn key_hints(state: &UiState, screen: &Screen) -> &'static str {
    if state.is_editing() {
        return "Enter search · Esc back/quit · ? help";
    }
    match screen {
        Screen::Search { .. } => "r cancel · q quit",
        Screen::Results { .. } => "↑/↓ move · Space select · a/v format · Enter fetch · / new search",
        Screen::Processing { .. } => "r cancel · q quit",
        Screen::AudioPlayer { .. } => "d save MP3 · y copy URL · Enter search again",
        Screen::VideoEmbed { .. } | Screen::Error { .. } => "Enter search again · q quit",
    }
}

fn search_box(state: &UiState, busy: bool, text: &str, palette: &Palette) -> Paragraph<'static> {
    let (title, style) = if busy {
        ("Searching…", Style::default().fg(palette.muted))
    } else {
        ("Search for music or videos", Style::default().fg(palette.text))
    };
    let cursor = if state.is_editing() { "▏" } else { "" };
    Paragraph::new(Line::from(vec![
        Span::styled(format!("🔍 {text}"), style),
        Span::styled(cursor.to_string(), Style::default().fg(palette.accent)),
    ]))
    .block(Block::default().borders(Borders::ALL).title(title))
}

fn draw_screen(area: Rect, f: &mut ratatui::Frame, state: &UiState, screen: &Screen, palette: &Palette) {
    match screen {
        Screen::Search { busy, query } => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
                .split(area);
            let text = if *busy {
                query.as_deref().unwrap_or_default()
            } else {
                state.query.as_str()
            };
            f.render_widget(search_box(state, *busy, text, palette), rows[0]);
        }
        Screen::Results {
            query,
            rows,
            mode_selector,
        } => draw_results(area, f, state, query, rows, mode_selector.as_ref(), palette),
        Screen::Processing {
            title,
            mode,
            status,
            attempt,
            progress,
        } => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(6), Constraint::Length(3), Constraint::Min(0)].as_ref())
                .split(area);
            let mut lines = vec![
                Line::from(Span::styled(
                    title.clone(),
                    Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("Preparing {mode}…"),
                    Style::default().fg(palette.muted),
                )),
            ];
            if let Some(s) = status {
                lines.push(Line::from(format!(
                    "Status: {s} (check {attempt}/{})",
                    state.max_poll_attempts
                )));
            }
            let p = Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title("Processing"));
            f.render_widget(p, rows[0]);
            if let Some(pct) = progress {
                let g = Gauge::default()
                    .block(Block::default().borders(Borders::ALL))
                    .gauge_style(Style::default().fg(palette.accent))
                    .percent((*pct).min(100) as u16);
                f.render_widget(g, rows[1]);
            }
        }
        Screen::AudioPlayer {
            title,
            url,
            download_url,
        } => {
            let p = Paragraph::new(vec![
                Line::from(Span::styled(
                    title.clone(),
                    Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(vec![
                    Span::styled("Stream:   ", Style::default().fg(palette.muted)),
                    Span::styled(url.clone(), Style::default().fg(palette.accent)),
                ]),
                Line::from(vec![
                    Span::styled("Download: ", Style::default().fg(palette.muted)),
                    Span::styled(download_url.clone(), Style::default().fg(palette.accent)),
                ]),
                Line::from(""),
                Line::from(Span::styled(
                    "[d] Save MP3   [y] Copy URL   [Enter] Search again",
                    Style::default().fg(palette.key),
                )),
            ])
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Audio ready"));
            f.render_widget(p, area);
        }
        Screen::VideoEmbed {
            title,
            embed_url,
            blocked,
        } => {
            let mut lines = vec![
                Line::from(Span::styled(
                    title.clone(),
                    Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(vec![
                    Span::styled("Embed: ", Style::default().fg(palette.muted)),
                    Span::styled(embed_url.clone(), Style::default().fg(palette.accent)),
                ]),
            ];
            if *blocked {
                lines.push(Line::from(Span::styled(
                    "The source restricts embedded playback.",
                    Style::default().fg(palette.error),
                )));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "[y] Copy URL   [Enter] Search again",
                Style::default().fg(palette.key),
            )));
            let p = Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("Video ready"));
            f.render_widget(p, area);
        }
        Screen::Error { message } => {
            let p = Paragraph::new(vec![
                Line::from(Span::styled(message.clone(), Style::default().fg(palette.error))),
                Line::from(""),
                Line::from(Span::styled(
                    "[Enter] Search again",
                    Style::default().fg(palette.key),
                )),
            ])
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Error"));
            f.render_widget(p, area);
        }
    }
}

fn draw_results(
    area: Rect,
    f: &mut ratatui::Frame,
    state: &UiState,
    query: &str,
    rows: &[ResultRow],
    mode_selector: Option<&ModeSelector>,
    palette: &Palette,
) {
    let selector_height = if mode_selector.is_some() { 6 } else { 0 };
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(selector_height),
            ]
            .as_ref(),
        )
        .split(area);

    let text = if state.is_editing() {
        state.query.as_str()
    } else {
        query
    };
    f.render_widget(search_box(state, false, text, palette), parts[0]);

    let items: Vec<ListItem> = rows
        .iter()
        .map(|r| {
            let mark = if r.selected { "✓ " } else { "  " };
            ListItem::new(Line::from(vec![
                Span::styled(mark, Style::default().fg(palette.ok)),
                Span::styled(r.title.clone(), Style::default().fg(palette.text)),
                Span::styled(
                    format!("  {} · {}", r.uploader, r.duration),
                    Style::default().fg(palette.muted),
                ),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Select a result"),
        )
        .highlight_style(Style::default().fg(palette.selected).add_modifier(Modifier::BOLD))
        .highlight_symbol("› ");
    let mut list_state = ListState::default().with_selected(Some(state.cursor));
    f.render_stateful_widget(list, parts[1], &mut list_state);

    if let Some(sel) = mode_selector {
        let option = |mode: Mode, key: &str, label: &str, desc: &str| {
            let style = if sel.selected == Some(mode) {
                Style::default().fg(palette.selected).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.text)
            };
            Line::from(vec![
                Span::styled(format!("[{key}] "), Style::default().fg(palette.key)),
                Span::styled(label.to_string(), style),
                Span::styled(format!("  {desc}"), Style::default().fg(palette.muted)),
            ])
        };
        let confirm_style = if sel.confirm_enabled {
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.muted).add_modifier(Modifier::DIM)
        };
        let p = Paragraph::new(vec![
            option(Mode::Audio, "a", "Audio", "Downloadable MP3"),
            option(Mode::Video, "v", "Video", "Embedded playback"),
            Line::from(""),
            Line::from(Span::styled(
                format!("[Enter] {}", sel.confirm_label),
                confirm_style,
            )),
        ])
        .block(Block::default().borders(Borders::ALL).title("Choose format"));
        f.render_widget(p, parts[2]);
    }
}
