//! UI rendering for the TUI
//!
//! This module handles all rendering using ratatui. The rendering is event-driven -
//! we only render when an event triggers a state change, not at a fixed frame rate.

mod dialog;
mod overlays;
mod panel;
mod widgets;

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::tui::app::{App, ModalState};
use crate::tui::event::TimerSlot;
use crate::tui::theme::Theme;

use dialog::render_dialog;
use overlays::{render_confirm_dialog, render_help_overlay, render_toast};
use panel::render_panel;
use widgets::countdown_span;

/// Render the entire TUI
pub fn render(app: &App, frame: &mut Frame) {
    let theme = Theme::from_name(&app.config.display.theme);
    let area = frame.area();

    // Main layout: toolbar, content, footer
    let layout = Layout::vertical([
        Constraint::Length(1), // Toolbar
        Constraint::Min(0),    // Side panel
        Constraint::Length(2), // Status bar
    ])
    .split(area);

    render_toolbar(app, frame, layout[0], &theme);
    render_content(app, frame, layout[1], &theme);
    render_status_bar(app, frame, layout[2], &theme);

    // Overlays (render in order of z-index)
    match &app.modal {
        ModalState::Help => render_help_overlay(frame, area, &theme),
        ModalState::Configure(_) => render_dialog(app, frame, area, &theme),
        ModalState::Confirm { .. } => render_confirm_dialog(app, frame, area, &theme),
        ModalState::None => {}
    }

    if let Some(toast) = app.feedback.current_toast() {
        render_toast(toast, frame, area, &theme);
    }
}

fn render_toolbar(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let mut spans = vec![
        Span::styled(" skconf ", Style::default().fg(theme.highlight).bold()),
        Span::styled(app.base_url().to_string(), Style::default().fg(theme.border)),
    ];

    if app.session.is_some() {
        let kernel = app
            .session_kernel
            .as_ref()
            .map_or("No kernel", |k| k.name.as_str());
        spans.push(Span::raw(" | "));
        spans.push(Span::raw(kernel.to_string()));
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("({})", app.connection),
            Style::default().fg(theme.connection_color(app.connection)),
        ));
    }

    if let (Some(countdown), Some(tick)) =
        (app.toolbar_countdown(), app.timers.tick(TimerSlot::Toolbar))
    {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            countdown.label(),
            Style::default().fg(theme.border),
        ));
        spans.push(countdown_span(tick, theme));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_content(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    if app.show_panel {
        render_panel(app, frame, area, theme);
    } else {
        let para = Paragraph::new("Panel hidden (p to show)")
            .style(Style::default().fg(theme.border))
            .alignment(Alignment::Center);
        frame.render_widget(para, area);
    }
}

fn render_status_bar(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let layout = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).split(area);

    // Keybindings line - context-sensitive
    let keybinds = match &app.modal {
        ModalState::Configure(_) if app.session.is_some() => {
            " Tab:field  h/l:option  Enter:save  Ctrl+R:(re)start  Esc:cancel "
        }
        ModalState::Configure(_) => " Tab:field  h/l:option  Enter:save  Esc:cancel ",
        ModalState::Confirm { .. } => " y:confirm  n:cancel ",
        _ => " j/k:move  c:configure  Enter:use allocation  x:kill  r:refresh  p:panel  ?:help  q:quit ",
    };
    let keybinds_para = Paragraph::new(keybinds).style(Style::default().fg(theme.border));
    frame.render_widget(keybinds_para, layout[0]);

    let mut status_parts = Vec::new();

    if app.modal.is_blocking() {
        let mode_name = match &app.modal {
            ModalState::Configure(_) => "CONFIGURE",
            ModalState::Confirm { .. } => "CONFIRM",
            _ => "",
        };
        if !mode_name.is_empty() {
            status_parts.push(Span::styled(
                format!(" [{}]", mode_name),
                Style::default().fg(theme.warn).bold(),
            ));
        }
    }

    match &app.status {
        Some(status) => status_parts.push(Span::styled(
            format!(" Allocations: {}", status.allocations.len()),
            Style::default().fg(theme.border),
        )),
        None => status_parts.push(Span::styled(
            " Loading...",
            Style::default().fg(theme.pending),
        )),
    }

    // Config warnings display (persistent until fixed)
    if let Some(first) = app.feedback.config_warnings.first() {
        let warning_text = match app.feedback.config_warnings.len() {
            1 => format!(" | WARN: {}", first),
            n => format!(" | WARN: {} (+{} more)", first, n - 1),
        };
        status_parts.push(Span::styled(warning_text, Style::default().fg(theme.warn)));
    }

    // Error display (temporary, auto-dismisses)
    if let Some(error) = app.current_error() {
        status_parts.push(Span::styled(
            format!(" | ERROR: {} ", error),
            Style::default().fg(theme.failed),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(status_parts)), layout[1]);
}
