//! Overlay and popup rendering
//!
//! Handles rendering of help, confirm dialog, and toast notifications.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::tui::app::{App, Toast};
use crate::tui::theme::Theme;

use super::widgets::centered_rect;

pub fn render_help_overlay(frame: &mut Frame, area: Rect, theme: &Theme) {
    let popup_area = centered_rect(60, 75, area);

    // Clear the area first
    frame.render_widget(Clear, popup_area);

    let section = |title: &'static str| {
        Line::from(vec![Span::styled(
            title,
            Style::default().fg(theme.highlight).bold(),
        )])
    };

    let help_text = vec![
        Line::from(vec![Span::styled(
            "skconf TUI - Keyboard Shortcuts",
            Style::default().bold(),
        )]),
        Line::from(""),
        section("Side Panel"),
        Line::from("  j / Down       Move selection down"),
        Line::from("  k / Up         Move selection up"),
        Line::from("  g / Home       Jump to top"),
        Line::from("  G / End        Jump to bottom"),
        Line::from("  Enter          Configure using selected allocation"),
        Line::from("  x / Delete     Kill selected allocation"),
        Line::from("  c              Configure Slurm kernel"),
        Line::from("  p              Toggle side panel"),
        Line::from(""),
        section("Configure Dialog"),
        Line::from("  Tab / j / k    Move between fields"),
        Line::from("  h / l          Previous / next option"),
        Line::from("  0-9, Bksp      Edit numeric field"),
        Line::from("  Enter          Save configuration"),
        Line::from("  Ctrl+R         Save and (re)start kernel"),
        Line::from("  Esc            Cancel"),
        Line::from(""),
        section("General"),
        Line::from("  r              Refresh status now"),
        Line::from("  ?/F1           Show this help"),
        Line::from("  Esc            Close overlay / cancel"),
        Line::from("  q              Quit application"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press ? or Esc to close this help",
            Style::default().fg(theme.border),
        )]),
    ];

    let help_para = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border_focused))
                .title(" Help "),
        )
        .style(Style::default().fg(theme.fg));

    frame.render_widget(help_para, popup_area);
}

/// Render the confirmation dialog
pub fn render_confirm_dialog(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let popup_area = centered_rect(50, 25, area);
    frame.render_widget(Clear, popup_area);

    let Some(action) = app.modal.confirm_action() else {
        return;
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.warn))
        .title(" Confirm Action ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(action.description(), Style::default().bold()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::raw("  Press "),
            Span::styled("[y/Enter]", Style::default().fg(theme.warn).bold()),
            Span::raw(" to confirm, "),
            Span::styled("[n/Esc]", Style::default().fg(theme.border).bold()),
            Span::raw(" to cancel"),
        ]),
    ];

    let para = Paragraph::new(lines)
        .style(Style::default().fg(theme.fg))
        .alignment(Alignment::Left);
    frame.render_widget(para, inner);
}

/// Render a toast at the bottom-right
pub fn render_toast(toast: &Toast, frame: &mut Frame, area: Rect, theme: &Theme) {
    let toast_width = (toast.message.len() + 4).min(60) as u16;
    let toast_area = Rect {
        x: area.width.saturating_sub(toast_width + 2),
        y: area.height.saturating_sub(5),
        width: toast_width.min(area.width),
        height: 3.min(area.height),
    };

    frame.render_widget(Clear, toast_area);

    let border_color = if toast.success {
        theme.running
    } else {
        theme.failed
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let para = Paragraph::new(format!(" {} ", toast.message))
        .block(block)
        .style(Style::default().fg(theme.fg))
        .alignment(Alignment::Center);

    frame.render_widget(para, toast_area);
}
