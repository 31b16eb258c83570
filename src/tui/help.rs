use super::state::Palette;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(palette: &Palette, key: &str, pad: usize, desc: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key.to_string(), Style::default().fg(palette.key)),
        Span::raw(" ".repeat(pad)),
        Span::styled(desc.to_string(), Style::default().fg(palette.text)),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame, palette: &Palette) {
    let p = Paragraph::new(vec![
        Line::from("Search:"),
        key_line(palette, "type", 8, "Edit query"),
        key_line(palette, "Enter", 7, "Search"),
        key_line(palette, "/", 11, "New search from results"),
        Line::from(""),
        Line::from("Results:"),
        key_line(palette, "↑/↓ j/k", 5, "Move"),
        key_line(palette, "Space", 7, "Select result"),
        key_line(palette, "a", 11, "Audio (downloadable MP3)"),
        key_line(palette, "v", 11, "Video (embedded playback)"),
        key_line(palette, "Enter", 7, "Fetch"),
        Line::from(""),
        Line::from("Ready:"),
        key_line(palette, "d", 11, "Save MP3 to the download directory"),
        key_line(palette, "y", 11, "Copy playback URL to clipboard"),
        key_line(palette, "Enter", 7, "Search again"),
        Line::from(""),
        Line::from("Anywhere:"),
        key_line(palette, "r", 11, "Reset / search again"),
        key_line(palette, "t", 11, "Toggle light/dark theme"),
        key_line(palette, "?", 11, "Show/hide this help"),
        key_line(palette, "q / Esc", 5, "Quit"),
        key_line(palette, "Ctrl-C", 6, "Quit"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
