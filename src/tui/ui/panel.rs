//! Side panel rendering
//!
//! Current configuration of the Slurm kernel, its countdown, and the list of
//! allocations with their kernel counts.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap};

use crate::display::{NOTHING_CONFIGURED, allocation_summary, current_config_rows};
use crate::tui::app::App;
use crate::tui::event::TimerSlot;
use crate::tui::theme::Theme;

use super::widgets::{calculate_scroll_offset, countdown_span, create_table_header, detail_row};

pub fn render_panel(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let Some(status) = &app.status else {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .title(" Slurm Wrapper ");
        let para = Paragraph::new("Loading status...")
            .block(block)
            .style(Style::default().fg(theme.border))
            .alignment(Alignment::Center);
        frame.render_widget(para, area);
        return;
    };

    let config_height = if status.current_config.is_empty() {
        4
    } else {
        // rows + time left + borders
        current_config_rows(&status.current_config, &app.kernels).len() as u16 + 3
    };
    let layout = Layout::vertical([
        Constraint::Length(config_height),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .split(area);

    render_current_config(app, frame, layout[0], theme);
    render_allocations(app, frame, layout[1], theme);

    if !status.documentation_href.is_empty() {
        let docs = Line::from(vec![
            Span::styled(" Documentation: ", Style::default().fg(theme.border)),
            Span::styled(
                status.documentation_href.clone(),
                Style::default().fg(theme.highlight).underlined(),
            ),
        ]);
        frame.render_widget(Paragraph::new(docs), layout[2]);
    }
}

fn render_current_config(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .title(" Current Configuration ");

    let Some(status) = &app.status else {
        return;
    };
    let config = &status.current_config;

    if config.is_empty() {
        let para = Paragraph::new(NOTHING_CONFIGURED)
            .block(block)
            .style(Style::default().fg(theme.warn))
            .wrap(Wrap { trim: true });
        frame.render_widget(para, area);
        return;
    }

    let mut lines: Vec<Line> = current_config_rows(config, &app.kernels)
        .into_iter()
        .map(|(label, value)| detail_row(label, Span::raw(value), theme))
        .collect();

    if let Some(tick) = app.timers.tick(TimerSlot::Panel) {
        lines.push(detail_row("Time left", countdown_span(tick, theme), theme));
    }

    let para = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(theme.fg));
    frame.render_widget(para, area);
}

fn render_allocations(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused))
        .title(" Allocations ");

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(status) = &app.status else {
        return;
    };

    if status.allocations.is_empty() {
        let para = Paragraph::new("No allocations")
            .style(Style::default().fg(theme.border))
            .alignment(Alignment::Center);
        frame.render_widget(para, inner);
        return;
    }

    let header = create_table_header(&["Allocation", "Nodes", "Partition"], theme);

    let available_height = inner.height.saturating_sub(1) as usize; // -1 for header
    let selected = app.allocations.selected;
    let scroll_offset =
        calculate_scroll_offset(selected, available_height, status.allocations.len());

    let rows: Vec<Row> = status
        .allocations
        .iter()
        .enumerate()
        .skip(scroll_offset)
        .take(available_height)
        .map(|(idx, (id, alloc))| {
            let style = if idx == selected {
                Style::default().bg(theme.selected_bg).fg(theme.selected_fg)
            } else {
                Style::default().fg(theme.fg)
            };
            let nodes = if alloc.nodelist.is_empty() {
                "-".to_string()
            } else {
                alloc.nodelist.join(",")
            };

            Row::new(vec![
                Cell::from(allocation_summary(id, alloc))
                    .style(Style::default().fg(theme.allocation_state_color(&alloc.state))),
                Cell::from(nodes),
                Cell::from(alloc.config.partition.clone()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(45),
        Constraint::Percentage(35),
        Constraint::Percentage(20),
    ];
    let table = Table::new(rows, widths).header(header);
    frame.render_widget(table, inner);
}
