//! Event types for the TUI
//!
//! This module implements a dual-channel event architecture:
//! - InputEvent: Priority channel for user input (never dropped)
//! - DataEvent: Data channel for updates (may be dropped under load)

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::countdown::Tick;
use crate::models::OptionCatalog;
use crate::poller::Snapshot;
use crate::session::{ConnectionStatus, KernelRef};

/// Input events from the terminal (priority channel - never dropped)
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Keyboard input
    Key(KeyEvent),
    /// Terminal gained (`true`) or lost (`false`) focus
    Focus(bool),
    /// Terminal resize
    Resize(u16, u16),
}

/// Which countdown a tick belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    /// Allocation of the current configuration, shown in the panel
    Panel,
    /// Locked allocation inside the configuration dialog
    Dialog,
    /// Allocation running the session's kernel, shown in the toolbar
    Toolbar,
}

/// Data and control events (data channel - may be dropped under load)
#[derive(Debug)]
pub enum DataEvent {
    /// Fresh catalog from the status poller or a manual refresh
    StatusUpdated(Snapshot),

    /// Full catalog for the configuration dialog
    DialogLoaded(OptionCatalog),

    /// One second passed on a countdown
    CountdownTick {
        slot: TimerSlot,
        generation: u64,
        tick: Tick,
    },

    /// The session switched kernels
    SessionKernelChanged(Option<KernelRef>),

    /// The session's connection state changed
    SessionStatusChanged(ConnectionStatus),

    /// A fetch failed; the view fell back to the empty catalog
    FetchError {
        source: &'static str,
        error: String,
    },

    /// Configuration submission finished
    SubmitResult { restart: bool, saved: bool },

    /// Allocation cancellation finished
    CancelResult {
        allocation: String,
        error: Option<String>,
    },
}

/// Result of processing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// Continue running, UI needs redraw
    Continue,
    /// Continue running, no UI change needed
    Unchanged,
    /// Quit the application
    Quit,
}

/// Which key map applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    #[default]
    Normal,
    /// Configuration dialog is open
    Dialog,
    /// A yes/no question is open
    Confirm,
}

/// Key action mappings for the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    // Navigation
    MoveUp,
    MoveDown,
    MoveToTop,
    MoveToBottom,

    // Actions
    Select,
    Configure,
    KillAllocation,
    Refresh,
    TogglePanel,

    // Dialog
    PrevOption,
    NextOption,
    Restart,
    InputBackspace,
    InputChar(char),

    // UI
    ShowHelp,
    Escape,
    Quit,

    // Unknown/unhandled
    Unknown,
}

impl KeyAction {
    /// Map a key event to an action based on current mode
    pub fn from_key_event(event: KeyEvent, mode: KeyMode) -> Self {
        let KeyEvent {
            code, modifiers, ..
        } = event;
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);

        match mode {
            KeyMode::Dialog => match code {
                KeyCode::Esc => KeyAction::Escape,
                KeyCode::Enter => KeyAction::Select,
                KeyCode::Char('r') if ctrl => KeyAction::Restart,
                KeyCode::Char('c') if ctrl => KeyAction::Escape,
                KeyCode::Up | KeyCode::BackTab | KeyCode::Char('k') => KeyAction::MoveUp,
                KeyCode::Down | KeyCode::Tab | KeyCode::Char('j') => KeyAction::MoveDown,
                KeyCode::Left | KeyCode::Char('h') => KeyAction::PrevOption,
                KeyCode::Right | KeyCode::Char('l') => KeyAction::NextOption,
                KeyCode::Backspace => KeyAction::InputBackspace,
                KeyCode::Char(c) if c.is_ascii_digit() => KeyAction::InputChar(c),
                _ => KeyAction::Unknown,
            },
            KeyMode::Confirm => match code {
                KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => KeyAction::Select,
                KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => KeyAction::Escape,
                _ => KeyAction::Unknown,
            },
            KeyMode::Normal => match code {
                // Quit
                KeyCode::Char('q') => KeyAction::Quit,

                // Ctrl+ combinations must come before bare character matches
                KeyCode::Char('c') if ctrl => KeyAction::Quit,

                // Navigation
                KeyCode::Char('j') | KeyCode::Down => KeyAction::MoveDown,
                KeyCode::Char('k') | KeyCode::Up => KeyAction::MoveUp,
                KeyCode::Char('g') | KeyCode::Home => KeyAction::MoveToTop,
                KeyCode::Char('G') | KeyCode::End => KeyAction::MoveToBottom,

                // Actions
                KeyCode::Enter => KeyAction::Select,
                KeyCode::Char('c') => KeyAction::Configure,
                KeyCode::Char('x') | KeyCode::Delete => KeyAction::KillAllocation,
                KeyCode::Char('r') => KeyAction::Refresh,
                KeyCode::Char('p') => KeyAction::TogglePanel,

                // Help
                KeyCode::Char('?') | KeyCode::F(1) => KeyAction::ShowHelp,
                KeyCode::Esc => KeyAction::Escape,

                _ => KeyAction::Unknown,
            },
        }
    }
}
