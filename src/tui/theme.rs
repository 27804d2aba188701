//! Theme definitions for the TUI
//!
//! This module provides colorblind-safe themes for both dark and light terminals.
//! The default is "dark" but users can configure "light" via config file or env var.

use ratatui::style::Color;

use crate::countdown::Tick;
use crate::session::ConnectionStatus;

/// Available theme names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeName {
    #[default]
    Dark,
    Light,
}

impl ThemeName {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "light" => ThemeName::Light,
            _ => ThemeName::Dark,
        }
    }
}

/// Color theme for the TUI
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: ThemeName,

    // Base colors
    pub fg: Color,
    pub border: Color,
    pub border_focused: Color,

    // Allocation state colors (colorblind-safe)
    pub running: Color,
    pub pending: Color,
    pub failed: Color,
    pub inactive: Color,

    // UI elements
    pub selected_bg: Color,
    pub selected_fg: Color,
    pub header_bg: Color,
    pub header_fg: Color,
    pub highlight: Color,
    pub warn: Color,

    // Countdown
    pub time_ok: Color,
    pub time_urgent: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Create a dark theme (default)
    pub fn dark() -> Self {
        Self {
            name: ThemeName::Dark,

            fg: Color::White,
            border: Color::DarkGray,
            border_focused: Color::Cyan,

            running: Color::Rgb(0, 200, 0),   // Bright green
            pending: Color::Rgb(255, 180, 0), // Orange (not yellow - better visibility)
            failed: Color::Rgb(255, 80, 80),  // Bright red
            inactive: Color::DarkGray,

            selected_bg: Color::Rgb(60, 60, 80),
            selected_fg: Color::White,
            header_bg: Color::Rgb(40, 80, 120),
            header_fg: Color::White,
            highlight: Color::Cyan,
            warn: Color::Rgb(255, 180, 0),

            time_ok: Color::Rgb(0, 200, 0),
            time_urgent: Color::Rgb(255, 80, 80),
        }
    }

    /// Create a light theme
    /// Uses darker, more saturated colors for visibility on light backgrounds
    pub fn light() -> Self {
        Self {
            name: ThemeName::Light,

            fg: Color::Black,
            border: Color::Rgb(120, 120, 120),
            border_focused: Color::Rgb(0, 100, 180),

            running: Color::Rgb(0, 140, 0),     // Dark green
            pending: Color::Rgb(200, 120, 0),   // Dark orange
            failed: Color::Rgb(200, 0, 0),      // Dark red
            inactive: Color::Rgb(100, 100, 100),

            selected_bg: Color::Rgb(200, 220, 255),
            selected_fg: Color::Black,
            header_bg: Color::Rgb(180, 200, 230),
            header_fg: Color::Black,
            highlight: Color::Rgb(0, 100, 180),
            warn: Color::Rgb(200, 120, 0),

            time_ok: Color::Rgb(0, 140, 0),
            time_urgent: Color::Rgb(200, 0, 0),
        }
    }

    /// Create theme from name string
    pub fn from_name(name: &str) -> Self {
        match ThemeName::parse(name) {
            ThemeName::Dark => Self::dark(),
            ThemeName::Light => Self::light(),
        }
    }

    /// Get color for an allocation state string
    pub fn allocation_state_color(&self, state: &str) -> Color {
        match state.to_ascii_uppercase().as_str() {
            "RUNNING" => self.running,
            "PENDING" | "CONFIGURING" => self.pending,
            "FAILED" | "TIMEOUT" | "NODE_FAIL" | "OUT_OF_MEMORY" => self.failed,
            "" => self.fg,
            _ => self.inactive,
        }
    }

    /// Red below the urgency threshold, green otherwise
    pub fn countdown_color(&self, tick: &Tick) -> Color {
        if tick.urgent {
            self.time_urgent
        } else {
            self.time_ok
        }
    }

    pub fn connection_color(&self, status: ConnectionStatus) -> Color {
        match status {
            ConnectionStatus::Connected => self.running,
            ConnectionStatus::Connecting => self.pending,
            ConnectionStatus::Disconnected => self.inactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_from_name() {
        let dark = Theme::from_name("dark");
        assert_eq!(dark.name, ThemeName::Dark);

        let light = Theme::from_name("LIGHT");
        assert_eq!(light.name, ThemeName::Light);

        // Unknown defaults to dark
        let unknown = Theme::from_name("unknown");
        assert_eq!(unknown.name, ThemeName::Dark);
    }

    #[test]
    fn test_allocation_state_colors() {
        let theme = Theme::dark();
        assert_eq!(theme.allocation_state_color("RUNNING"), theme.running);
        assert_eq!(theme.allocation_state_color("pending"), theme.pending);
        assert_eq!(theme.allocation_state_color("COMPLETED"), theme.inactive);
    }

    #[test]
    fn test_countdown_color() {
        let theme = Theme::dark();
        assert_eq!(theme.countdown_color(&Tick::new(299)), theme.time_urgent);
        assert_eq!(theme.countdown_color(&Tick::new(3600)), theme.time_ok);
    }
}
