use crate::state::{App, Tab};
use crate::theme::{self, icons};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};
use tmd_core::category::{CategoryFilter, FileKind, CATEGORY_CHIPS};
use tmd_core::view;
use tmd_core::wire::{TransferState, TransferTask};

pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    render_header(f, app, layout[0]);

    if app.show_help {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(layout[1]);
        render_body(f, app, body[0]);
        render_help(f, body[1]);
    } else {
        render_body(f, app, layout[1]);
    }

    render_status_line(f, app, layout[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let version = app.version.as_deref().unwrap_or("-");
    let stream = if app.connected {
        "connected"
    } else {
        "reconnecting"
    };
    let transfers = match app.transfer_state {
        TransferState::Running => "running",
        TransferState::Stopped => "stopped",
    };

    let summary = Line::from(vec![
        Span::styled("tmd-cockpit ", theme::HEADER_STYLE),
        Span::styled(format!("v{version}"), Style::default().fg(theme::MUTED)),
        Span::raw("  stream: "),
        Span::styled(
            stream,
            Style::default().fg(theme::connection_color(app.connected)),
        ),
        Span::raw("  transfers: "),
        Span::raw(transfers),
        Span::raw(format!(
            "  active: {}  history: {}",
            app.active_count(),
            app.history_count()
        )),
    ]);

    let mut chips: Vec<Span> = vec![Span::raw("filter: ")];
    for chip in CATEGORY_CHIPS {
        chips.push(Span::styled(
            format!(" {} ", chip.as_str()),
            theme::chip_style(chip == app.filter),
        ));
        chips.push(Span::raw(" "));
    }
    chips.push(Span::styled(
        "(f cycles, ? help)",
        Style::default().fg(theme::MUTED),
    ));

    let header = Paragraph::new(vec![summary, Line::from(chips)]).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled("Transfers", theme::HEADER_STYLE)),
    );
    f.render_widget(header, area);
}

fn render_body(f: &mut Frame, app: &mut App, area: Rect) {
    match app.tab {
        Tab::Active => render_active(f, app, area),
        Tab::History => render_history(f, app, area),
    }
}

fn tab_title(app: &App) -> Line<'static> {
    let active = format!(" {} ({}) ", Tab::Active.title(), app.active_count());
    let history = format!(" {} ({}) ", Tab::History.title(), app.history_count());
    let highlight = Style::default()
        .fg(Color::Black)
        .bg(Color::Rgb(142, 192, 124))
        .add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(theme::MUTED);
    match app.tab {
        Tab::Active => Line::from(vec![
            Span::styled(active, highlight),
            Span::styled(history, dim),
        ]),
        Tab::History => Line::from(vec![
            Span::styled(active, dim),
            Span::styled(history, highlight),
        ]),
    }
}

fn render_active(f: &mut Frame, app: &mut App, area: Rect) {
    let visible: Vec<&TransferTask> = app.filter.apply(&app.tasks);

    if visible.is_empty() {
        render_placeholder(
            f,
            area,
            tab_title(app),
            if app.filter == CategoryFilter::All {
                "no active transfers"
            } else {
                "no active transfers match this filter"
            },
        );
        return;
    }

    let rows: Vec<Row> = visible
        .iter()
        .enumerate()
        .map(|(idx, task)| {
            let status = view::task_row_status(task);
            let glyph = theme::kind_glyph(FileKind::of(&task.filename));
            let progress = match task.upload_progress {
                Some(up) => format!("{}% / {}%", task.download_progress, up),
                None => format!("{}%", task.download_progress),
            };
            let speed = match task.upload_speed.as_deref() {
                Some(up) => format!("{} / {}", task.download_speed, up),
                None => task.download_speed.clone(),
            };
            Row::new(vec![
                Cell::from(glyph),
                Cell::from(task.chat.clone()),
                Cell::from(task.filename.clone()),
                Cell::from(Span::styled(status.label(), theme::status_style(status))),
                Cell::from(task.total_size.clone()),
                Cell::from(progress),
                Cell::from(speed),
            ])
            .style(theme::zebra_row_style(idx))
        })
        .collect();

    let widths = [
        Constraint::Length(2),
        Constraint::Length(12),
        Constraint::Min(20),
        Constraint::Length(11),
        Constraint::Length(10),
        Constraint::Length(16),
        Constraint::Length(20),
    ];

    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["", "Chat", "File", "Status", "Size", "Progress", "Speed"])
                .style(theme::HEADER_STYLE),
        )
        .block(Block::default().borders(Borders::ALL).title(tab_title(app)))
        .highlight_style(theme::SELECTED_STYLE);

    f.render_stateful_widget(table, area, &mut app.active_table);
}

fn render_history(f: &mut Frame, app: &mut App, area: Rect) {
    let visible: Vec<&TransferTask> = view::project_history(&app.history);

    if visible.is_empty() {
        render_placeholder(f, area, tab_title(app), "no completed transfers yet");
        return;
    }

    let rows: Vec<Row> = visible
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let glyph = theme::kind_glyph(FileKind::of(&entry.filename));
            let completed = entry
                .completed_at_utc()
                .map(|at| at.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            let path = entry.save_path.as_deref().unwrap_or("-").to_string();
            Row::new(vec![
                Cell::from(glyph),
                Cell::from(entry.id.clone()),
                Cell::from(entry.filename.clone()),
                Cell::from(entry.total_size.clone()),
                Cell::from(completed),
                Cell::from(path),
            ])
            .style(theme::zebra_row_style(idx))
        })
        .collect();

    let widths = [
        Constraint::Length(2),
        Constraint::Length(10),
        Constraint::Min(20),
        Constraint::Length(10),
        Constraint::Length(9),
        Constraint::Min(16),
    ];

    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["", "Msg", "File", "Size", "Done", "Saved to"])
                .style(theme::HEADER_STYLE),
        )
        .block(Block::default().borders(Borders::ALL).title(tab_title(app)))
        .highlight_style(theme::SELECTED_STYLE);

    f.render_stateful_widget(table, area, &mut app.history_table);
}

fn render_placeholder(f: &mut Frame, area: Rect, title: Line<'static>, message: &str) {
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);
    let placeholder = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message, Style::default().fg(theme::MUTED))),
    ])
    .wrap(Wrap { trim: true });
    f.render_widget(placeholder, inner);
}

fn render_status_line(f: &mut Frame, app: &App, area: Rect) {
    let (text, style) = match app.status_note.as_deref() {
        Some(note) => (note.to_string(), theme::note_style(note)),
        None => (
            "ready (q quit, tab switch, ? help)".to_string(),
            Style::default().fg(theme::MUTED),
        ),
    };
    let status = Paragraph::new(Line::from(Span::styled(text, style))).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled("Status", theme::HEADER_STYLE)),
    );
    f.render_widget(status, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("j / Down", Color::Cyan),
            Span::raw("   Next row"),
        ]),
        Line::from(vec![
            Span::styled("k / Up", Color::Cyan),
            Span::raw("     Previous row"),
        ]),
        Line::from(vec![
            Span::styled("Tab / t", Color::Cyan),
            Span::raw("    Switch active/history"),
        ]),
        Line::from(vec![
            Span::styled("f", Color::Cyan),
            Span::raw("          Cycle category filter"),
        ]),
        Line::from(vec![
            Span::styled("p", Color::Cyan),
            Span::raw("          Pause selected transfer"),
        ]),
        Line::from(vec![
            Span::styled("r", Color::Cyan),
            Span::raw("          Resume selected transfer"),
        ]),
        Line::from(vec![
            Span::styled("d", Color::Cyan),
            Span::raw("          Delete selected transfer"),
        ]),
        Line::from(vec![
            Span::styled("x", Color::Cyan),
            Span::raw("          Remove selected history entry"),
        ]),
        Line::from(vec![
            Span::styled("c", Color::Cyan),
            Span::raw("          Clear history"),
        ]),
        Line::from(vec![
            Span::styled("s", Color::Cyan),
            Span::raw("          Toggle global transfer state"),
        ]),
        Line::from(vec![
            Span::styled("R", Color::Cyan),
            Span::raw("          Refresh from server"),
        ]),
        Line::from(vec![
            Span::styled("?", Color::Cyan),
            Span::raw("          Toggle help"),
        ]),
        Line::from(vec![
            Span::styled("q", Color::Cyan),
            Span::raw("          Quit"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "glyphs: {} video {} image {} audio {} archive",
                icons::VIDEO,
                icons::IMAGE,
                icons::AUDIO,
                icons::ARCHIVE
            ),
            Style::default().fg(theme::MUTED),
        )),
    ];

    let p = Paragraph::new(text).wrap(Wrap { trim: true });
    f.render_widget(p, inner);
}
