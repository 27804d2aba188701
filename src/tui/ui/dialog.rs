//! Configuration dialog rendering
//!
//! Controls are drawn in form order. Fields fixed by an existing allocation
//! become read-only info rows, and the allocation's countdown is shown above
//! the buttons.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::display::{display_allocation, display_node};
use crate::resolver::FormField;
use crate::tui::app::{App, DialogState};
use crate::tui::event::TimerSlot;
use crate::tui::theme::Theme;

use super::widgets::{centered_rect, countdown_span, detail_row};

pub fn render_dialog(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let Some(dialog) = app.modal.dialog() else {
        return;
    };

    let popup_area = centered_rect(70, 80, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused))
        .title(" Configure Slurm Wrapper ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if dialog.loading {
        let para = Paragraph::new("Loading options...")
            .style(Style::default().fg(theme.border))
            .alignment(Alignment::Center);
        frame.render_widget(para, inner);
        return;
    }

    let mut lines = vec![Line::from("")];
    lines.extend(
        dialog
            .form
            .visible_fields()
            .into_iter()
            .map(|field| field_line(app, dialog, field, theme)),
    );

    lines.push(Line::from(""));
    if let Some(tick) = app.timers.tick(TimerSlot::Dialog) {
        lines.push(detail_row("Time left", countdown_span(tick, theme), theme));
    }
    if let Some(error) = &dialog.error {
        lines.push(Line::from(Span::styled(
            format!("  {error}"),
            Style::default().fg(theme.failed),
        )));
    }
    if !dialog.catalog.documentation_href.is_empty() {
        lines.push(detail_row(
            "Docs",
            Span::styled(
                dialog.catalog.documentation_href.clone(),
                Style::default().fg(theme.highlight),
            ),
            theme,
        ));
    }

    lines.push(Line::from(""));
    lines.push(button_line(app, theme));

    let para = Paragraph::new(lines).style(Style::default().fg(theme.fg));
    frame.render_widget(para, inner);
}

fn field_line<'a>(app: &App, dialog: &'a DialogState, field: FormField, theme: &Theme) -> Line<'a> {
    let value = dialog.display_value(field);
    let shown = match field {
        FormField::Allocation => display_allocation(value).to_string(),
        FormField::Node => display_node(value).to_string(),
        FormField::Kernel => app
            .kernels
            .get(value)
            .map_or_else(|| value.to_string(), |k| k.display_name.clone()),
        _ => value.to_string(),
    };

    if !dialog.form.is_editable(field) {
        return detail_row(
            field.label(),
            Span::styled(shown, Style::default().fg(theme.inactive)),
            theme,
        );
    }

    let focused = dialog.focus == Some(field);
    let mut spans = vec![Span::styled(
        format!("{} {:<13}", if focused { ">" } else { " " }, field.label()),
        if focused {
            Style::default().fg(theme.highlight).bold()
        } else {
            Style::default().fg(theme.border)
        },
    )];

    let value_style = if focused {
        Style::default().bg(theme.selected_bg).fg(theme.selected_fg)
    } else {
        Style::default().fg(theme.fg)
    };

    match field.resource() {
        Some(resource) => {
            let bounds = dialog.form.resource(resource);
            spans.push(Span::styled(format!(" {shown} "), value_style));
            spans.push(Span::styled(
                format!("  ({} - {})", bounds.min, bounds.max),
                Style::default().fg(theme.border),
            ));
        }
        None => {
            let count = dialog.form.choice(field).map_or(0, |c| c.options.len());
            if focused && count > 1 {
                spans.push(Span::styled(format!("< {shown} >"), value_style));
            } else {
                spans.push(Span::styled(format!("  {shown}  "), value_style));
            }
        }
    }

    Line::from(spans)
}

fn button_line(app: &App, theme: &Theme) -> Line<'static> {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(theme.highlight).bold());

    let mut spans = vec![
        Span::raw("  "),
        key("[Esc]"),
        Span::raw(" Cancel   "),
        key("[Enter]"),
        Span::raw(" Save"),
    ];
    if app.session.is_some() {
        spans.push(Span::raw("   "));
        spans.push(key("[Ctrl+R]"));
        spans.push(Span::raw(" (Re)Start"));
    }
    Line::from(spans)
}
