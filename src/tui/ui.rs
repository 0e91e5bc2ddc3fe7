//! Order book screen layout and rendering.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};

use super::app::{App, BOOK_COLUMNS, FeedStatus, SUMMARY_COLUMNS};

/// Renders the entire application UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title
            Constraint::Length(4), // Summary
            Constraint::Min(5),    // Book
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Keybindings help
        ])
        .split(area);

    render_title(frame, layout[0], app);
    render_summary(frame, layout[1], app);
    render_book(frame, layout[2], app);
    render_status_bar(frame, layout[3], app);
    render_keybindings(frame, layout[4]);
}

fn render_title(frame: &mut Frame, area: Rect, app: &App) {
    let title = Paragraph::new(Line::from(Span::styled(
        format!(" MBP Order Book : {}", app.ric),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(title, area);
}

fn render_summary(frame: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(SUMMARY_COLUMNS.iter().map(|c| Cell::from(*c)))
        .style(Style::default().fg(Color::Yellow));
    let values = Row::new(SUMMARY_COLUMNS.iter().map(|c| Cell::from(app.summary_cell(c))));
    let widths = [Constraint::Ratio(1, SUMMARY_COLUMNS.len() as u32); SUMMARY_COLUMNS.len()];

    let table = Table::new(vec![values], widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(" Summary "));
    frame.render_widget(table, area);
}

fn render_book(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title(" Book ");

    if !app.book_complete {
        let (text, color) = if app.refresh_timed_out {
            ("Refresh did not complete in time, still waiting...", Color::Red)
        } else {
            ("Waiting for complete refresh...", Color::DarkGray)
        };
        let waiting = Paragraph::new(text)
            .style(Style::default().fg(color))
            .block(block);
        frame.render_widget(waiting, area);
        return;
    }

    let header = Row::new(BOOK_COLUMNS.iter().enumerate().map(|(i, name)| {
        let label = if i == app.sort.column {
            let arrow = if app.sort.reverse { "v" } else { "^" };
            format!("{name} {arrow}")
        } else {
            (*name).to_string()
        };
        Cell::from(label)
    }))
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = app
        .sorted_rows()
        .into_iter()
        .map(|entry| {
            let side_color = match entry.side() {
                Some("BID") => Color::Green,
                Some("ASK") => Color::Red,
                _ => Color::White,
            };
            let mut style = Style::default().fg(side_color);
            if app.highlighted.contains(&entry.key) {
                style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
            }
            Row::new(BOOK_COLUMNS.iter().map(|c| Cell::from(App::cell(entry, c)))).style(style)
        })
        .collect();

    let widths = [Constraint::Ratio(1, BOOK_COLUMNS.len() as u32); BOOK_COLUMNS.len()];
    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}

fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let status_color = match app.feed_status {
        FeedStatus::Streaming => Color::Green,
        FeedStatus::Connecting => Color::Yellow,
        FeedStatus::Closed(_) => Color::Red,
    };
    let refresh_label = if app.book_complete {
        Span::styled(" Complete ", Style::default().fg(Color::Green))
    } else if app.refresh_timed_out {
        Span::styled(" Refresh timed out ", Style::default().fg(Color::Red))
    } else {
        Span::styled(" Refreshing ", Style::default().fg(Color::Yellow))
    };
    let anomaly_color = if app.anomalies.is_clean() {
        Color::White
    } else {
        Color::Red
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", app.feed_status.label()),
            Style::default().fg(status_color),
        ),
        Span::raw("│"),
        refresh_label,
        Span::raw("│"),
        Span::raw(format!(" Depth : {} ", app.entry_count)),
        Span::raw("│"),
        Span::raw(format!(" Queued : {} ", app.queue_depth)),
        Span::raw("│"),
        Span::styled(
            format!(" Anomalies : {} ", app.anomalies.total()),
            Style::default().fg(anomaly_color),
        ),
    ]);

    let para = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(para, area);
}

fn render_keybindings(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(" [1-6] sort column (again to reverse)  [q] quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}
