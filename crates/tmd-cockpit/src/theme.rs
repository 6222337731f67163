use ratatui::style::{Color, Modifier, Style};
use tmd_core::category::FileKind;
use tmd_core::view::RowStatus;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const MUTED: Color = Color::Rgb(146, 131, 116);

pub fn zebra_row_style(index: usize) -> Style {
    let bg = if index % 2 == 0 {
        Color::Rgb(18, 20, 26)
    } else {
        Color::Rgb(24, 27, 34)
    };
    Style::new().bg(bg)
}

pub mod icons {
    pub const VIDEO: &str = "v";
    pub const IMAGE: &str = "i";
    pub const AUDIO: &str = "a";
    pub const ARCHIVE: &str = "z";
    pub const DOCUMENT: &str = "-";
}

pub fn kind_glyph(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Video => icons::VIDEO,
        FileKind::Image => icons::IMAGE,
        FileKind::Audio => icons::AUDIO,
        FileKind::Archive => icons::ARCHIVE,
        FileKind::Document => icons::DOCUMENT,
    }
}

pub fn status_style(status: RowStatus) -> Style {
    let color = match status {
        RowStatus::Complete => Color::Rgb(184, 187, 38),
        RowStatus::InProgress => Color::Rgb(131, 165, 152),
        RowStatus::Paused => Color::Rgb(250, 189, 47),
        RowStatus::Waiting => MUTED,
    };
    Style::new().fg(color).add_modifier(Modifier::BOLD)
}

pub fn chip_style(active: bool) -> Style {
    if active {
        Style::new()
            .fg(Color::Black)
            .bg(Color::Rgb(131, 165, 152))
            .add_modifier(Modifier::BOLD)
    } else {
        Style::new().fg(MUTED)
    }
}

pub fn connection_color(connected: bool) -> Color {
    if connected {
        Color::Rgb(184, 187, 38)
    } else {
        Color::Rgb(254, 128, 25)
    }
}

pub fn note_style(note: &str) -> Style {
    if note.contains("failed") || note.contains("lost") {
        Style::new().fg(Color::Rgb(254, 128, 25))
    } else {
        Style::new().fg(MUTED)
    }
}
