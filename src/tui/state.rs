use crate::orchestrator::Phase;
use crate::theme::{ThemeContext, ThemeMode};
use ratatui::style::Color;

/// Colors for one theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub key: Color,
    pub selected: Color,
    pub error: Color,
    pub ok: Color,
}

impl Palette {
    pub fn for_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self {
                text: Color::White,
                muted: Color::Gray,
                accent: Color::Cyan,
                key: Color::Magenta,
                selected: Color::Yellow,
                error: Color::LightRed,
                ok: Color::LightGreen,
            },
            ThemeMode::Light => Self {
                text: Color::Black,
                muted: Color::DarkGray,
                accent: Color::Blue,
                key: Color::Magenta,
                selected: Color::Rgb(176, 96, 0),
                error: Color::Red,
                ok: Color::Green,
            },
        }
    }
}

/// UI-thread state. The phase is a mirror of the controller's; everything
/// else is presentation-only.
pub struct UiState {
    pub phase: Phase,
    pub query: String,
    pub editing: bool,
    pub cursor: usize,
    pub info: String,
    pub show_help: bool,
    pub max_poll_attempts: u32,
    pub theme: ThemeContext,
}

impl UiState {
    pub fn new(theme: ThemeContext, max_poll_attempts: u32) -> Self {
        Self {
            phase: Phase::Idle,
            query: String::new(),
            editing: true,
            cursor: 0,
            info: String::new(),
            show_help: false,
            max_poll_attempts,
            theme,
        }
    }

    pub fn palette(&self) -> Palette {
        Palette::for_mode(self.theme.mode())
    }

    pub fn apply_phase(&mut self, phase: Phase) {
        match &phase {
            Phase::Idle => {
                self.query.clear();
                self.editing = true;
                self.cursor = 0;
            }
            Phase::Searching { .. } => self.editing = false,
            Phase::Results { selection, .. } => {
                if !matches!(self.phase, Phase::Results { .. }) {
                    self.cursor = selection.map(|s| s.index).unwrap_or(0);
                }
            }
            Phase::Processing { .. } | Phase::Ready { .. } | Phase::Error { .. } => {
                self.editing = false;
            }
        }
        self.phase = phase;
    }

    /// The query box accepts input in `idle`, and in `results` after `/`.
    pub fn is_editing(&self) -> bool {
        self.editing && matches!(self.phase, Phase::Idle | Phase::Results { .. })
    }

    pub fn result_count(&self) -> usize {
        match &self.phase {
            Phase::Results { results, .. } => results.len(),
            _ => 0,
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let n = self.result_count();
        if n == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(n - 1);
    }

    /// URL to hand to the clipboard in `ready`.
    pub fn media_url(&self) -> Option<&str> {
        match &self.phase {
            Phase::Ready { media } => Some(media.url.as_str()),
            _ => None,
        }
    }
}
