//! Application state and core logic for the TUI
//!
//! This module contains the main App struct and all associated state management.
//! The architecture follows a TEA-inspired pattern with mutable state and method-based updates.

mod state;

pub use state::{
    ConfirmAction, DialogState, FeedbackState, ListState, ModalState, TimerState, Toast,
};

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::client::{ProvisionerApi, ProvisionerClient, Scope, spawn_cancel, submit_and_log};
use crate::countdown::{Countdown, KernelCountdown};
use crate::display::allocation_summary;
use crate::models::{AppConfig, AvailableKernels, OptionCatalog};
use crate::poller::Snapshot;
use crate::session::{ConnectionStatus, KernelRef, SessionContext, ensure_slurm_kernel};
use crate::tui::event::{DataEvent, EventResult, InputEvent, KeyAction, KeyMode, TimerSlot};
use crate::tui::runtime::spawn_countdown_ticker;

/// Main application state
///
/// Owned by the event loop; background tasks report back over the data
/// channel.
pub struct App {
    // Lifecycle
    pub running: bool,

    pub modal: ModalState,

    // Data
    pub status: Option<Snapshot>,
    pub kernels: AvailableKernels,
    pub allocations: ListState,

    // Session
    pub session: Option<Arc<dyn SessionContext>>,
    pub session_kernel: Option<KernelRef>,
    pub connection: ConnectionStatus,

    // Visibility
    pub show_panel: bool,
    pub focused: bool,

    pub timers: TimerState,
    pub feedback: FeedbackState,

    // Configuration
    pub config: AppConfig,

    // Communication
    api: Arc<ProvisionerClient>,
    data_tx: mpsc::Sender<DataEvent>,
    visible: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl App {
    /// Create a new App.
    ///
    /// `cancel` is the runtime's token; countdowns and requests spawned by the
    /// app stop with it.
    pub fn new(
        config: AppConfig,
        config_warnings: Vec<String>,
        api: Arc<ProvisionerClient>,
        data_tx: mpsc::Sender<DataEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let show_panel = config.display.side_panel;

        Self {
            running: true,
            modal: ModalState::None,
            status: None,
            kernels: AvailableKernels::new(),
            allocations: ListState::default(),
            session: None,
            session_kernel: None,
            connection: ConnectionStatus::Disconnected,
            show_panel,
            focused: true,
            timers: TimerState::default(),
            feedback: FeedbackState::new(config_warnings),
            config,
            api,
            data_tx,
            visible: watch::Sender::new(show_panel),
            cancel,
        }
    }

    /// Kernels offered in the configuration dialog
    pub fn with_kernels(mut self, kernels: AvailableKernels) -> Self {
        self.kernels = kernels;
        self
    }

    /// Attach the session whose kernel the toolbar tracks
    pub fn with_session(mut self, session: Arc<dyn SessionContext>) -> Self {
        self.session_kernel = session
            .current_kernel_id()
            .zip(session.current_kernel_name())
            .map(|(id, name)| KernelRef { id, name });
        self.connection = *session.connection_status_changed().borrow();
        self.session = Some(session);
        self
    }

    /// Override the configured side panel setting
    pub fn with_panel(mut self, show: bool) -> Self {
        self.show_panel = show;
        self.update_visibility();
        self
    }

    /// Visibility signal for the status poller
    pub fn visibility(&self) -> watch::Receiver<bool> {
        self.visible.subscribe()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }

    fn key_mode(&self) -> KeyMode {
        match self.modal {
            ModalState::Configure(_) => KeyMode::Dialog,
            ModalState::Confirm { .. } => KeyMode::Confirm,
            ModalState::Help | ModalState::None => KeyMode::Normal,
        }
    }

    /// Handle an input event
    pub fn handle_input(&mut self, event: InputEvent) -> EventResult {
        match event {
            InputEvent::Key(key_event) => {
                let action = KeyAction::from_key_event(key_event, self.key_mode());
                self.handle_action(action)
            }
            InputEvent::Focus(gained) => {
                self.focused = gained;
                self.update_visibility();
                EventResult::Continue
            }
            InputEvent::Resize(_, _) => EventResult::Continue,
        }
    }

    /// Handle a key action
    fn handle_action(&mut self, action: KeyAction) -> EventResult {
        // Help overlay takes priority
        if matches!(self.modal, ModalState::Help) {
            match action {
                KeyAction::Escape | KeyAction::ShowHelp | KeyAction::Quit => {
                    self.modal = ModalState::None;
                    return EventResult::Continue;
                }
                _ => return EventResult::Unchanged,
            }
        }

        match &self.modal {
            ModalState::Confirm { .. } => return self.handle_confirm_action(action),
            ModalState::Configure(_) => return self.handle_dialog_action(action),
            _ => {}
        }

        let len = self.allocation_count();
        match action {
            KeyAction::Quit => {
                self.running = false;
                EventResult::Quit
            }
            KeyAction::MoveUp => {
                self.allocations.move_up(len);
                EventResult::Continue
            }
            KeyAction::MoveDown => {
                self.allocations.move_down(len);
                EventResult::Continue
            }
            KeyAction::MoveToTop => {
                self.allocations.move_to_top();
                EventResult::Continue
            }
            KeyAction::MoveToBottom => {
                self.allocations.move_to_bottom(len);
                EventResult::Continue
            }
            KeyAction::Configure => {
                self.open_dialog(None);
                EventResult::Continue
            }
            KeyAction::Select => {
                // Configure with the highlighted allocation selected
                let id = self.selected_allocation().map(str::to_string);
                self.open_dialog(id);
                EventResult::Continue
            }
            KeyAction::KillAllocation => {
                self.request_kill();
                EventResult::Continue
            }
            KeyAction::Refresh => {
                self.refresh();
                EventResult::Continue
            }
            KeyAction::TogglePanel => {
                self.show_panel = !self.show_panel;
                self.update_visibility();
                EventResult::Continue
            }
            KeyAction::ShowHelp => {
                self.modal = ModalState::Help;
                EventResult::Continue
            }
            _ => EventResult::Unchanged,
        }
    }

    /// Handle actions in confirm dialog mode
    fn handle_confirm_action(&mut self, action: KeyAction) -> EventResult {
        match action {
            KeyAction::Escape => {
                self.modal = ModalState::None;
                EventResult::Continue
            }
            KeyAction::Select => {
                if let ModalState::Confirm { action } = std::mem::take(&mut self.modal) {
                    self.execute_kill(action.allocation().to_string());
                }
                EventResult::Continue
            }
            _ => EventResult::Unchanged,
        }
    }

    /// Handle actions while the configuration dialog is open
    fn handle_dialog_action(&mut self, action: KeyAction) -> EventResult {
        let kernels = &self.kernels;
        let Some(dialog) = self.modal.dialog_mut() else {
            return EventResult::Unchanged;
        };

        match action {
            KeyAction::Escape => {
                self.close_dialog();
                return EventResult::Continue;
            }
            KeyAction::Select => {
                self.save(false);
                return EventResult::Continue;
            }
            KeyAction::Restart => {
                if self.session.is_some() {
                    self.save(true);
                } else {
                    self.feedback
                        .set_error("(Re)Start needs a session (--kernel-id)".to_string());
                }
                return EventResult::Continue;
            }
            _ if dialog.loading => return EventResult::Unchanged,
            KeyAction::MoveUp => dialog.move_focus(false),
            KeyAction::MoveDown => dialog.move_focus(true),
            KeyAction::PrevOption => dialog.cycle(kernels, false),
            KeyAction::NextOption => dialog.cycle(kernels, true),
            KeyAction::InputChar(c) => dialog.push_digit(c),
            KeyAction::InputBackspace => dialog.backspace(),
            _ => return EventResult::Unchanged,
        }

        self.sync_dialog_timer();
        EventResult::Continue
    }

    /// Open the configuration dialog and fetch the full catalog for it
    fn open_dialog(&mut self, preselect: Option<String>) {
        self.modal = ModalState::Configure(Box::new(DialogState::loading(preselect)));

        let api = Arc::clone(&self.api);
        let tx = self.data_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let catalog = tokio::select! {
                _ = cancel.cancelled() => return,
                catalog = fetch_catalog(&*api, Scope::All, &tx, "configure") => catalog,
            };
            let _ = tx.send(DataEvent::DialogLoaded(catalog)).await;
        });
    }

    fn close_dialog(&mut self) {
        self.modal = ModalState::None;
        self.timers.stop(TimerSlot::Dialog);
    }

    /// Submit the dialog's configuration in the background and close it
    fn save(&mut self, restart: bool) {
        let kernels = &self.kernels;
        let Some(dialog) = self.modal.dialog_mut() else {
            return;
        };
        if dialog.loading {
            return;
        }
        let config = dialog.finish(kernels);
        self.close_dialog();

        let api = Arc::clone(&self.api);
        let tx = self.data_tx.clone();
        tokio::spawn(async move {
            let saved = submit_and_log(&*api, &config).await;
            let _ = tx.send(DataEvent::SubmitResult { restart, saved }).await;
        });
    }

    /// Ask for confirmation (if configured) before killing the highlighted allocation
    fn request_kill(&mut self) {
        let Some(id) = self.selected_allocation().map(str::to_string) else {
            return;
        };

        if self.config.behavior.confirm_cancel {
            let summary = self
                .status
                .as_ref()
                .and_then(|s| s.allocation(&id))
                .map_or_else(|| id.clone(), |alloc| allocation_summary(&id, alloc));
            self.modal = ModalState::Confirm {
                action: ConfirmAction::KillAllocation {
                    allocation: id,
                    summary,
                },
            };
        } else {
            self.execute_kill(id);
        }
    }

    /// Cancel an allocation without blocking the UI
    fn execute_kill(&mut self, id: String) {
        self.feedback
            .set_toast(Toast::success(format!("Cancelling allocation {id}...")));

        let tx = self.data_tx.clone();
        let allocation = id.clone();
        spawn_cancel(Arc::clone(&self.api), id, move |result| {
            let _ = tx.try_send(DataEvent::CancelResult {
                allocation,
                error: result.err().map(|e| e.to_string()),
            });
        });
    }

    /// One-off status fetch outside the poller's schedule
    fn refresh(&self) {
        let api = Arc::clone(&self.api);
        let tx = self.data_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let catalog = tokio::select! {
                _ = cancel.cancelled() => return,
                catalog = fetch_catalog(&*api, Scope::Local, &tx, "status") => catalog,
            };
            let _ = tx.send(DataEvent::StatusUpdated(Arc::new(catalog))).await;
        });
    }

    fn update_visibility(&self) {
        let visible = self.focused && self.show_panel;
        self.visible.send_if_modified(|current| {
            let changed = *current != visible;
            *current = visible;
            changed
        });
    }

    /// Handle a data event
    pub fn handle_data(&mut self, event: DataEvent) -> EventResult {
        match event {
            DataEvent::StatusUpdated(snapshot) => {
                self.allocations.clamp(snapshot.allocations.len());
                self.status = Some(snapshot);
                self.sync_status_timers();
                EventResult::Continue
            }
            DataEvent::DialogLoaded(catalog) => {
                let kernels = &self.kernels;
                match self.modal.dialog_mut() {
                    Some(dialog) if dialog.loading => {
                        dialog.load(catalog, kernels);
                        self.sync_dialog_timer();
                        EventResult::Continue
                    }
                    // Dialog was closed before the catalog arrived
                    _ => EventResult::Unchanged,
                }
            }
            DataEvent::CountdownTick {
                slot,
                generation,
                tick,
            } => {
                if self.timers.apply(slot, generation, tick) {
                    EventResult::Continue
                } else {
                    EventResult::Unchanged
                }
            }
            DataEvent::SessionKernelChanged(kernel) => {
                self.session_kernel = kernel;
                self.sync_status_timers();
                EventResult::Continue
            }
            DataEvent::SessionStatusChanged(status) => {
                self.connection = status;
                EventResult::Continue
            }
            DataEvent::FetchError { source, error } => {
                self.feedback.set_error(format!("{source}: {error}"));
                EventResult::Continue
            }
            DataEvent::SubmitResult { restart, saved } => {
                if saved {
                    self.feedback
                        .set_toast(Toast::success("Configuration saved".to_string()));
                } else {
                    self.feedback
                        .set_error("Could not save configuration (see log)".to_string());
                }
                if restart {
                    self.restart_session();
                }
                self.refresh();
                EventResult::Continue
            }
            DataEvent::CancelResult { allocation, error } => {
                match error {
                    None => self
                        .feedback
                        .set_toast(Toast::success(format!("Cancelled allocation {allocation}"))),
                    Some(e) => {
                        self.feedback
                            .set_toast(Toast::failure(format!("Could not cancel {allocation}")));
                        self.feedback
                            .set_error(format!("Failed to cancel allocation {allocation}: {e}"));
                    }
                }
                self.refresh();
                EventResult::Continue
            }
        }
    }

    /// Move the session onto the Slurm kernel after a (Re)Start
    fn restart_session(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        if !ensure_slurm_kernel(session.as_ref()) {
            self.feedback.set_toast(Toast::success(
                "Slurm kernel already selected; restart it to apply".to_string(),
            ));
        }
    }

    /// Restart the panel and toolbar countdowns if their allocation changed
    fn sync_status_timers(&mut self) {
        let panel = self.status.as_ref().and_then(|s| s.current_endtime());
        self.sync_timer(TimerSlot::Panel, panel);

        let toolbar = self.toolbar_countdown().map(|k| k.countdown.endtime());
        self.sync_timer(TimerSlot::Toolbar, toolbar);
    }

    fn sync_dialog_timer(&mut self) {
        let endtime = self.modal.dialog().and_then(DialogState::locked_endtime);
        self.sync_timer(TimerSlot::Dialog, endtime);
    }

    fn sync_timer(&mut self, slot: TimerSlot, endtime: Option<i64>) {
        if self.timers.endtime(slot) == endtime {
            return;
        }
        match endtime {
            Some(endtime) => {
                let cancel = self.cancel.child_token();
                let generation = self.timers.start(slot, endtime, cancel.clone());
                spawn_countdown_ticker(
                    Countdown::new(endtime),
                    slot,
                    generation,
                    self.data_tx.clone(),
                    cancel,
                );
            }
            None => self.timers.stop(slot),
        }
    }

    /// Stop every running countdown
    pub fn stop_timers(&mut self) {
        self.timers.stop_all();
    }

    /// Countdown of the allocation running the session's kernel
    #[must_use]
    pub fn toolbar_countdown(&self) -> Option<KernelCountdown> {
        // An empty id means the new kernel has not reported its id yet
        let kernel = self.session_kernel.as_ref().filter(|k| !k.id.is_empty())?;
        KernelCountdown::for_kernel(self.status.as_ref()?, &kernel.id)
    }

    fn allocation_count(&self) -> usize {
        self.status.as_ref().map_or(0, |s| s.allocations.len())
    }

    /// Id of the highlighted allocation in the panel
    #[must_use]
    pub fn selected_allocation(&self) -> Option<&str> {
        self.status
            .as_ref()?
            .allocations
            .keys()
            .nth(self.allocations.selected)
            .map(String::as_str)
    }

    /// Get the current error message if it should be shown
    #[must_use]
    pub fn current_error(&self) -> Option<&str> {
        self.feedback.current_error()
    }
}

/// Fetch a catalog, reporting failures and falling back to the empty catalog
async fn fetch_catalog<A: ProvisionerApi>(
    api: &A,
    scope: Scope,
    tx: &mpsc::Sender<DataEvent>,
    source: &'static str,
) -> OptionCatalog {
    match api.fetch_options(scope).await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::warn!(scope = scope.endpoint(), error = %e, "fetch failed, using empty catalog");
            let _ = tx.try_send(DataEvent::FetchError {
                source,
                error: e.to_string(),
            });
            OptionCatalog::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use super::*;
    use crate::models::{KernelChoice, SLURM_KERNEL_NAME, ServerConfig};
    use crate::resolver::FormField;
    use crate::session::LocalSession;

    fn status() -> OptionCatalog {
        serde_json::from_str(
            r#"{
            "allocations": {
                "100": {"config": {"project": "alpha", "partition": "batch"},
                        "endtime": 4000000000, "kernel_ids": ["k-1"], "state": "RUNNING"},
                "200": {"endtime": 4000000000, "kernel_ids": [], "state": "PENDING"}
            },
            "current_config": {"jobid": "100", "kernel": "python3", "project": "alpha",
                               "partition": "batch", "nodes": "1", "runtime": "60"}
        }"#,
        )
        .unwrap()
    }

    fn app() -> (App, mpsc::Receiver<DataEvent>) {
        let (tx, rx) = mpsc::channel(32);
        // Nothing listens here; requests fail fast and fall back
        let server = ServerConfig {
            url: "http://127.0.0.1:9/".to_string(),
            ..Default::default()
        };
        let api = Arc::new(ProvisionerClient::new(&server).unwrap());
        let kernels = AvailableKernels::from([(
            "python3".to_string(),
            KernelChoice {
                display_name: "Python 3".to_string(),
                argv: vec!["python".to_string()],
                language: "python".to_string(),
            },
        )]);
        let app = App::new(AppConfig::default(), Vec::new(), api, tx, CancellationToken::new())
            .with_kernels(kernels);
        (app, rx)
    }

    fn key(code: KeyCode) -> InputEvent {
        InputEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn test_status_update_starts_panel_timer() {
        let (mut app, _rx) = app();
        assert_eq!(
            app.handle_data(DataEvent::StatusUpdated(Arc::new(status()))),
            EventResult::Continue
        );
        assert_eq!(app.timers.endtime(TimerSlot::Panel), Some(4_000_000_000));
        assert_eq!(app.timers.endtime(TimerSlot::Toolbar), None);

        app.handle_input(key(KeyCode::Char('j')));
        assert_eq!(app.selected_allocation(), Some("200"));
        app.stop_timers();
    }

    #[tokio::test]
    async fn test_toolbar_timer_follows_session_kernel() {
        let (app, _rx) = app();
        let session = Arc::new(LocalSession::new(Some(KernelRef {
            id: "k-1".to_string(),
            name: "slurm-provisioner-kernel".to_string(),
        })));
        let mut app = app.with_session(session);
        assert_eq!(app.connection, ConnectionStatus::Connected);

        app.handle_data(DataEvent::StatusUpdated(Arc::new(status())));
        let countdown = app.toolbar_countdown().unwrap();
        assert_eq!(countdown.allocation_id, "100");
        assert_eq!(app.timers.endtime(TimerSlot::Toolbar), Some(4_000_000_000));

        app.handle_data(DataEvent::SessionKernelChanged(None));
        assert_eq!(app.timers.endtime(TimerSlot::Toolbar), None);
        app.stop_timers();
    }

    #[tokio::test]
    async fn test_restart_reconnects_session() {
        let (app, _rx) = app();
        let session = Arc::new(LocalSession::new(Some(KernelRef {
            id: "k-1".to_string(),
            name: "python3".to_string(),
        })));
        let mut app = app.with_session(session.clone());
        app.handle_data(DataEvent::StatusUpdated(Arc::new(status())));
        assert!(app.toolbar_countdown().is_some());

        app.handle_data(DataEvent::SubmitResult {
            restart: true,
            saved: true,
        });
        let status = *session.connection_status_changed().borrow();
        assert_eq!(status, ConnectionStatus::Connected);
        assert_eq!(session.current_kernel_name().as_deref(), Some(SLURM_KERNEL_NAME));

        app.handle_data(DataEvent::SessionStatusChanged(status));
        app.handle_data(DataEvent::SessionKernelChanged(
            session.kernel_changed().borrow().clone(),
        ));
        assert_eq!(app.connection, ConnectionStatus::Connected);
        // the pre-restart kernel's allocation no longer drives the toolbar
        assert!(app.toolbar_countdown().is_none());
        app.stop_timers();
    }

    #[tokio::test]
    async fn test_dialog_flow() {
        let (mut app, _rx) = app();
        app.handle_data(DataEvent::StatusUpdated(Arc::new(status())));

        // Enter opens the dialog for the highlighted allocation
        app.handle_input(key(KeyCode::Enter));
        assert!(app.modal.dialog().is_some_and(|d| d.loading));

        app.handle_data(DataEvent::DialogLoaded(status()));
        let dialog = app.modal.dialog().unwrap();
        assert_eq!(dialog.form.allocation.value, "100");
        assert!(!dialog.form.resources_editable);
        assert_eq!(app.timers.endtime(TimerSlot::Dialog), Some(4_000_000_000));

        // Switching to a new allocation unlocks the form and drops the timer
        app.handle_input(key(KeyCode::Left));
        let dialog = app.modal.dialog().unwrap();
        assert_eq!(dialog.form.allocation.value, "New");
        assert_eq!(dialog.focus, Some(FormField::Allocation));
        assert_eq!(app.timers.endtime(TimerSlot::Dialog), None);

        app.handle_input(key(KeyCode::Esc));
        assert!(app.modal.dialog().is_none());
        app.stop_timers();
    }

    #[tokio::test]
    async fn test_late_dialog_catalog_is_ignored() {
        let (mut app, _rx) = app();
        app.handle_input(key(KeyCode::Char('c')));
        app.handle_input(key(KeyCode::Esc));
        assert_eq!(
            app.handle_data(DataEvent::DialogLoaded(status())),
            EventResult::Unchanged
        );
    }

    #[tokio::test]
    async fn test_kill_requires_confirmation() {
        let (mut app, _rx) = app();
        app.handle_data(DataEvent::StatusUpdated(Arc::new(status())));

        app.handle_input(key(KeyCode::Char('x')));
        let action = app.modal.confirm_action().unwrap();
        assert_eq!(action.allocation(), "100");
        assert_eq!(action.description(), "Kill allocation 100 (#1): RUNNING?");

        app.handle_input(key(KeyCode::Char('n')));
        assert!(matches!(app.modal, ModalState::None));
        app.stop_timers();
    }

    #[tokio::test]
    async fn test_focus_and_panel_drive_visibility() {
        let (mut app, _rx) = app();
        let visible = app.visibility();
        assert!(*visible.borrow());

        app.handle_input(InputEvent::Focus(false));
        assert!(!*visible.borrow());

        app.handle_input(InputEvent::Focus(true));
        app.handle_input(key(KeyCode::Char('p')));
        assert!(!app.show_panel);
        assert!(!*visible.borrow());
    }

    #[tokio::test]
    async fn test_restart_without_session_is_refused() {
        let (mut app, _rx) = app();
        app.handle_input(key(KeyCode::Char('c')));
        app.handle_data(DataEvent::DialogLoaded(status()));

        let restart = InputEvent::Key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL));
        app.handle_input(restart);
        assert!(app.modal.dialog().is_some());
        assert!(app.current_error().is_some());
        app.stop_timers();
    }

    #[test]
    fn test_quit() {
        let (mut app, _rx) = app();
        assert_eq!(app.handle_input(key(KeyCode::Char('q'))), EventResult::Quit);
        assert!(!app.running);
    }
}
