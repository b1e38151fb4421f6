use crate::app::{App, AppMode};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

const HELP: &[(&str, &str)] = &[
    ("/", "edit filter of selected column"),
    ("Tab", "next column (also while filtering)"),
    ("Enter", "apply filters now"),
    ("Esc (filtering)", "clear the selected column's filter"),
    ("Esc / Ctrl-r", "clear all filters"),
    ("arrows hjkl", "move selection"),
    ("PgUp PgDn g G", "scroll"),
    ("c C Ctrl-c", "copy cell / row / shown rows"),
    ("E", "export matched rows as CSV"),
    ("v", "toggle cell viewer"),
    ("r", "reload source"),
    ("q", "quit"),
];

pub fn draw(f: &mut Frame, app: &App) {
    let viewer_height = if app.show_cell_viewer { 5 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(viewer_height),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(f.size());

    draw_filters(f, chunks[0], app);
    draw_data(f, chunks[1], app);
    if app.show_cell_viewer {
        draw_cell_viewer(f, chunks[2], app);
    }
    draw_status(f, chunks[3], app);
    if app.show_help {
        draw_help(f, f.size());
    }
}

fn draw_filters(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    for (idx, header) in app.headers.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::raw(" | "));
        }
        let value = app.filters.get(header).unwrap_or_default();
        let selected = idx == app.sel_col;
        let editing = selected && app.mode == AppMode::Filtering;
        let name_style = if selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        spans.push(Span::styled(format!("{header}: "), name_style));
        let text = if editing {
            format!("{value}_")
        } else {
            value.to_string()
        };
        spans.push(Span::raw(text));
    }
    let title = if app.debouncer.is_pending() || app.filters_stale {
        "Filters (pending)"
    } else {
        "Filters"
    };
    let p = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_data(f: &mut Frame, area: Rect, app: &App) {
    let title = format!(
        "{} ({} shown / {} matched / {} total)",
        app.source_label,
        app.visible_rows().len(),
        app.matched.len(),
        app.rows.len()
    );
    let block = Block::default().borders(Borders::ALL).title(title);

    if let Some(err) = &app.load_error
        && app.rows.is_empty()
    {
        let p = Paragraph::new(format!("Could not load data: {err}"))
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true })
            .block(block);
        f.render_widget(p, area);
        return;
    }
    if app.headers.is_empty() {
        let msg = if app.loading {
            "Loading..."
        } else {
            "No data (press r to reload)"
        };
        f.render_widget(Paragraph::new(msg).block(block), area);
        return;
    }

    let widths = column_widths(area.width, app.headers.len());
    let header = Row::new(app.headers.iter().map(|c| Cell::from(c.as_str()))).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    let visible = app.visible_rows();
    let mut rows = Vec::with_capacity(visible.len());
    for (r_idx, row) in visible.iter().enumerate() {
        let cells = app.headers.iter().enumerate().map(|(c_idx, h)| {
            let cell = Cell::from(row.get(h).unwrap_or_default());
            if r_idx == app.sel_row && c_idx == app.sel_col {
                cell.style(Style::default().bg(Color::Blue).fg(Color::Black))
            } else {
                cell
            }
        });
        rows.push(Row::new(cells));
    }

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .column_spacing(1)
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));

    let mut state = TableState::default();
    if !visible.is_empty() {
        state.select(Some(app.sel_row));
    }
    f.render_stateful_widget(table, area, &mut state);
}

fn draw_cell_viewer(f: &mut Frame, area: Rect, app: &App) {
    let title = format!("Cell: {}", app.current_column().unwrap_or_default());
    let p = Paragraph::new(app.current_cell_text().unwrap_or_default())
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let mode = match app.mode {
        AppMode::Normal => "NORMAL",
        AppMode::Filtering => "FILTER",
        AppMode::Exporting => "EXPORT",
    };
    let style = if app.load_error.is_some() {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    let text = Line::from(vec![
        Span::styled(
            format!("[{mode}] "),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(app.status.as_str(), style),
    ]);
    let p = Paragraph::new(text).block(Block::default().borders(Borders::TOP));
    f.render_widget(p, area);
}

fn draw_help(f: &mut Frame, screen: Rect) {
    let area = centered(screen, 60, HELP.len() as u16 + 2);
    let lines: Vec<Line> = HELP
        .iter()
        .map(|(keys, what)| {
            Line::from(vec![
                Span::styled(
                    format!("{keys:>15}  "),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw(*what),
            ])
        })
        .collect();
    f.render_widget(Clear, area);
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(p, area);
}

fn centered(screen: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(screen.width);
    let height = height.min(screen.height);
    Rect {
        x: screen.x + (screen.width - width) / 2,
        y: screen.y + (screen.height - height) / 2,
        width,
        height,
    }
}

fn column_widths(total_width: u16, cols: usize) -> Vec<Constraint> {
    if cols == 0 {
        return vec![];
    }
    // Evenly divide; borders and spacing come off first.
    let n = u16::try_from(cols).unwrap_or(u16::MAX);
    let w = total_width.saturating_sub(2u16.saturating_add(n - 1));
    let per = (w / n).max(1);
    vec![Constraint::Length(per); cols]
}
