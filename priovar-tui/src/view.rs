use crate::{activity::ActivityLine, styles};
use anyhow::Result;
use priovar_portal::{AnnotationConfig, LoadState, Modal, NoteMode, TableRow, TableSnapshot};
use priovar_portal::table::DELETE_WARNING;
use ratatui::{
    Terminal,
    backend::Backend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, TableState, Wrap},
};
use textwrap::wrap;

const COLUMNS: [&str; 9] = [
    "Uploaded At",
    "Completed At",
    "Patient",
    "Clinician",
    "Comments",
    "Status",
    "State",
    "Details",
    "Analysis",
];

pub struct ViewSnap {
    pub table: TableSnapshot,
    pub selected: usize,
    pub lines: Vec<ActivityLine>,
    pub scroll: usize,
    pub input: String,
    pub input_cursor: usize,
    pub command_focus: bool,
    pub busy: u32,
    pub spinner: &'static str,
    pub last_nav: Option<String>,
}

/// Draws one frame and returns how far the activity log can scroll back.
pub fn draw<B: Backend>(term: &mut Terminal<B>, snap: &ViewSnap) -> Result<usize> {
    let mut max_scroll = 0;
    term.draw(|frame| {
        let area = frame.area();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(6),
                Constraint::Length(7),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);

        let header = Paragraph::new(Line::from(vec![Span::styled(
            format!(" {} ", snap.table.title),
            styles::title(),
        )]));
        frame.render_widget(header, layout[0]);

        // Patient table
        let rows: Vec<Row> = snap
            .table
            .rows
            .iter()
            .map(|r| table_row(r, snap.spinner))
            .collect();
        let widths = [
            Constraint::Length(17),
            Constraint::Length(17),
            Constraint::Min(14),
            Constraint::Length(14),
            Constraint::Min(16),
            Constraint::Length(17),
            Constraint::Length(14),
            Constraint::Length(9),
            Constraint::Length(22),
        ];
        let table = Table::new(rows, widths)
            .header(Row::new(COLUMNS).style(styles::header()))
            .row_highlight_style(styles::selected())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Patients ({}) ", snap.table.scope)),
            );
        let mut state = TableState::default();
        if !snap.table.rows.is_empty() {
            state.select(Some(snap.selected.min(snap.table.rows.len() - 1)));
        }
        frame.render_stateful_widget(table, layout[1], &mut state);

        // Activity log
        let visible_h = layout[2].height.saturating_sub(2) as usize;
        let content_width = layout[2].width.saturating_sub(2) as usize;
        let wrapped = wrap_activity(&snap.lines, content_width);
        let (start, end) = log_window(wrapped.len(), visible_h, snap.scroll);
        max_scroll = wrapped.len().saturating_sub(visible_h);
        let items: Vec<ListItem> = wrapped[start..end]
            .iter()
            .map(|(text, style)| ListItem::new(Line::from(Span::styled(text.clone(), *style))))
            .collect();
        let log = List::new(items).block(Block::default().borders(Borders::ALL).title(" Activity "));
        frame.render_widget(log, layout[2]);

        // Command line
        let input_title = if snap.command_focus {
            " Command "
        } else {
            " ↑↓ select  enter run  d delete  n note  f finish  p details  s similar  tab scope  / command  q quit "
        };
        let input_box = Paragraph::new(snap.input.clone())
            .block(Block::default().borders(Borders::ALL).title(input_title));
        frame.render_widget(Clear, layout[3]);
        frame.render_widget(input_box, layout[3]);
        if snap.command_focus {
            frame.set_cursor_position(Position {
                x: layout[3].x + 1 + visual_caret_col(&snap.input, snap.input_cursor),
                y: layout[3].y + 1,
            });
        }

        // Status bar
        let mut status = vec![
            Span::raw(" "),
            Span::styled(snap.spinner, Style::default().fg(Color::Yellow)),
            Span::raw(" "),
        ];
        status.push(match &snap.table.load {
            LoadState::Idle => Span::styled("Idle", styles::dim()),
            LoadState::Loading => Span::styled("Loading…", Style::default().fg(Color::Yellow)),
            LoadState::Ready => Span::styled(
                format!("Ready • {} rows", snap.table.rows.len()),
                styles::success(),
            ),
            LoadState::Failed(msg) => Span::styled(format!("× {msg}"), styles::error()),
        });
        status.push(Span::raw(format!(" • ops: {}", snap.busy)));
        if let Some(nav) = &snap.last_nav {
            status.push(Span::raw(" • "));
            status.push(Span::styled(format!("→ {nav}"), styles::navigation()));
        }
        let status = Paragraph::new(Line::from(status))
            .block(Block::default().borders(Borders::ALL).title(" Status "));
        frame.render_widget(status, layout[4]);

        if let Some(modal) = &snap.table.modal {
            let (title, lines) = modal_lines(modal);
            let popup = centered_rect(area, 70, lines.len() as u16 + 4);
            let text: Vec<Line> = lines
                .into_iter()
                .map(|(t, s)| Line::from(Span::styled(t, s)))
                .collect();
            let body = Paragraph::new(text)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(Clear, popup);
            frame.render_widget(body, popup);
        }
    })?;

    Ok(max_scroll)
}

/// Slice of the wrapped log shown `scroll` lines back from the tail.
fn log_window(total: usize, visible: usize, scroll: usize) -> (usize, usize) {
    let scroll = scroll.min(total.saturating_sub(visible));
    let end = total - scroll;
    (end.saturating_sub(visible), end)
}

/// Plain text of each cell, in column order.
pub(crate) fn row_texts(row: &TableRow, spinner: &str) -> [String; 9] {
    let comments = match row.comments.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [.., last] => format!("{last} (+{})", row.comments.len() - 1),
    };
    let control = match &row.control {
        Some(c) if c.spinner => format!("{spinner} {}", c.label),
        Some(c) => format!("[ {} ]", c.label),
        None => String::new(),
    };
    [
        row.uploaded_at.clone(),
        row.completed_at.clone(),
        row.patient_name().to_string(),
        row.clinician_name.clone(),
        comments,
        row.badge.map(|b| b.label.to_string()).unwrap_or_default(),
        row.derived_status.clone().unwrap_or_default(),
        if row.details.is_some() { "details".into() } else { String::new() },
        control,
    ]
}

fn table_row(row: &TableRow, spinner: &str) -> Row<'static> {
    let [uploaded, completed, patient, clinician, comments, badge, state, details, control] =
        row_texts(row, spinner);
    let badge_style = row.badge.map(|b| styles::tone(b.tone)).unwrap_or_default();
    let control_style = row
        .control
        .as_ref()
        .map(|c| styles::control(c.enabled))
        .unwrap_or_default();
    Row::new(vec![
        Cell::from(uploaded),
        Cell::from(completed),
        Cell::from(patient).style(styles::value()),
        Cell::from(clinician),
        Cell::from(comments).style(styles::dim()),
        Cell::from(badge).style(badge_style),
        Cell::from(state),
        Cell::from(details).style(styles::navigation()),
        Cell::from(control).style(control_style),
    ])
}

pub(crate) fn modal_lines(modal: &Modal) -> (String, Vec<(String, Style)>) {
    match modal {
        Modal::ConfirmDelete { patient_name, .. } => (
            " Delete patient ".into(),
            vec![
                (format!("Delete {patient_name}?"), styles::value()),
                (String::new(), styles::value()),
                (DELETE_WARNING.to_string(), styles::error()),
                (String::new(), styles::value()),
                ("[y] delete   [n] cancel".into(), styles::dim()),
            ],
        ),
        Modal::ConfirmAnnotation { file, .. } => {
            let cfg = AnnotationConfig::default();
            (
                " Start analysis ".into(),
                vec![
                    (format!("Submit annotation for {file}?"), styles::value()),
                    (String::new(), styles::value()),
                    (
                        format!(
                            "{} • {} • {} • {} • germline: {} • CNV: {}",
                            cfg.kind,
                            cfg.machine,
                            cfg.alignment,
                            cfg.reference,
                            cfg.germline,
                            cfg.cnv_analysis
                        ),
                        styles::system(),
                    ),
                    (String::new(), styles::value()),
                    ("[y] submit   [n] cancel".into(), styles::dim()),
                ],
            )
        }
        Modal::Note(editor) => {
            let mut lines: Vec<(String, Style)> = editor
                .history()
                .into_iter()
                .map(|h| (h, styles::system()))
                .collect();
            if !lines.is_empty() {
                lines.push(("─".repeat(20), styles::dim()));
            }
            match editor.mode() {
                NoteMode::Display => {
                    lines.push((editor.text().to_string(), styles::value()));
                    if let Some(caption) = editor.caption() {
                        lines.push((caption, styles::dim()));
                    }
                    lines.push((String::new(), styles::value()));
                    lines.push(("[e] edit   [esc] close".into(), styles::dim()));
                }
                NoteMode::Editing => {
                    lines.push((format!("{}▏", editor.text()), styles::header()));
                    lines.push((String::new(), styles::value()));
                    lines.push(("[enter] save   [esc] discard".into(), styles::dim()));
                }
            }
            (format!(" Notes • {} ", editor.file()), lines)
        }
    }
}

fn centered_rect(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = area.width.saturating_mul(percent_x) / 100;
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn visual_caret_col(input: &str, cursor: usize) -> u16 {
    use unicode_width::UnicodeWidthStr;
    UnicodeWidthStr::width(&input[..cursor]) as u16
}

fn wrap_activity(lines: &[ActivityLine], width: usize) -> Vec<(String, Style)> {
    let effective_width = width.max(1);
    let mut out = Vec::new();
    for entry in lines {
        let rendered = entry.rendered();
        let segments = wrap(&rendered, effective_width);
        if segments.is_empty() {
            out.push((String::new(), entry.style));
        } else {
            out.extend(segments.into_iter().map(|seg| (seg.into_owned(), entry.style)));
        }
    }
    out
}
