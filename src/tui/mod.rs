//! Terminal User Interface for skconf
//!
//! This module provides an interactive front end for the Slurm wrapper:
//! - Side panel with the current configuration, its countdown, and allocations
//! - Configuration dialog with cascading option lists
//! - Dual-channel event architecture (priority input, backpressure-aware data)
//! - Status polling that slows down while the panel is hidden or unfocused

pub mod app;
pub mod event;
pub mod runtime;
pub mod theme;
pub mod ui;

use std::io::{self, stdout, IsTerminal};
use std::sync::Arc;

use anyhow::{bail, Result};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

use crate::client::{ProvisionerClient, Scope};
use crate::kernelspec::available_kernels;
use crate::models::AppConfig;
use crate::poller::{PollSettings, StatusPoller};
use crate::session::{KernelRef, LocalSession, SessionContext};
use crate::tui::app::App;
use crate::tui::runtime::{
    create_channels, run_event_loop, spawn_input_task, spawn_session_watcher,
    spawn_snapshot_forwarder, TuiRuntime,
};

/// Terminal capability requirements for TUI mode
#[derive(Debug)]
pub struct TerminalCapabilities {
    pub is_tty: bool,
    pub term_type: String,
    pub supports_alternate_screen: bool,
}

impl TerminalCapabilities {
    /// Detect terminal capabilities
    pub fn detect() -> Self {
        let is_tty = stdout().is_terminal();
        let term_type = std::env::var("TERM").unwrap_or_default();

        // Check for known problematic terminals
        let supports_alternate_screen = !matches!(term_type.as_str(), "dumb" | "" | "unknown");

        Self {
            is_tty,
            term_type,
            supports_alternate_screen,
        }
    }

    /// Check if terminal is suitable for TUI mode
    pub fn is_suitable(&self) -> bool {
        self.is_tty && self.supports_alternate_screen
    }

    /// Get error message for unsuitable terminal
    pub fn error_message(&self) -> String {
        if !self.is_tty {
            "TUI mode requires an interactive terminal (stdout is not a TTY).\n\
             Hint: Use non-TUI commands like 'skconf show' or 'skconf allocations' instead."
                .to_string()
        } else if !self.supports_alternate_screen {
            format!(
                "Terminal type '{}' may not support TUI mode.\n\
                 Hint: Set TERM to a supported value (e.g., xterm-256color) or use CLI mode.",
                if self.term_type.is_empty() { "(unset)" } else { &self.term_type }
            )
        } else {
            "Unknown terminal capability issue.".to_string()
        }
    }
}

/// Session and panel settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct TuiOptions {
    /// Kernel the session starts with; enables the toolbar and (re)start
    pub kernel_id: Option<String>,
    pub kernel_name: Option<String>,
    /// Overrides `display.side_panel`
    pub show_panel: Option<bool>,
}

impl TuiOptions {
    fn session(&self) -> Option<Arc<dyn SessionContext>> {
        let id = self.kernel_id.clone()?;
        let name = self
            .kernel_name
            .clone()
            .unwrap_or_else(|| crate::models::SLURM_KERNEL_NAME.to_string());
        let session: Arc<dyn SessionContext> =
            Arc::new(LocalSession::new(Some(KernelRef { id, name })));
        Some(session)
    }
}

/// Run the TUI application
pub async fn run_tui(config: AppConfig, warnings: Vec<String>, options: TuiOptions) -> Result<()> {
    // Check terminal capabilities before attempting TUI mode
    let capabilities = TerminalCapabilities::detect();
    if !capabilities.is_suitable() {
        bail!("{}", capabilities.error_message());
    }

    let api = Arc::new(ProvisionerClient::new(&config.server)?);
    let refresh = config.refresh.clone();

    // Create dual channels and the runtime
    let (input_tx, input_rx, data_tx, data_rx) = create_channels();
    let mut runtime = TuiRuntime::new();

    let mut app = App::new(
        config,
        warnings,
        api.clone(),
        data_tx.clone(),
        runtime.cancel_token(),
    )
    .with_kernels(available_kernels());
    if let Some(show) = options.show_panel {
        app = app.with_panel(show);
    }
    let session = options.session();
    if let Some(session) = &session {
        app = app.with_session(session.clone());
    }

    // Spawn background tasks
    let poller = StatusPoller::new(api, PollSettings::from_config(Scope::Local, &refresh));
    let snapshots = poller.subscribe();
    let poller = poller.spawn(app.visibility(), runtime.cancel_token());
    runtime.track(poller.into_task());

    runtime.track(spawn_snapshot_forwarder(
        snapshots,
        data_tx.clone(),
        runtime.cancel_token(),
    ));

    if let Some(session) = session {
        runtime.track(spawn_session_watcher(
            session,
            data_tx.clone(),
            runtime.cancel_token(),
        ));
    }

    runtime.track(spawn_input_task(input_tx, runtime.cancel_token()));
    drop(data_tx);

    // Setup terminal
    let mut terminal = setup_terminal()?;

    // Run the main event loop
    let result = run_event_loop(app, input_rx, data_rx, |app| {
        terminal.draw(|frame| ui::render(app, frame))?;
        Ok(())
    })
    .await;

    // Shutdown background tasks
    runtime.shutdown().await;

    // Restore terminal
    restore_terminal(&mut terminal)?;

    result
}

/// Setup the terminal for TUI mode
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to normal mode
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the TUI with the tokio runtime (entry point from main)
pub fn run(config: AppConfig, warnings: Vec<String>, options: TuiOptions) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_tui(config, warnings, options))
}
