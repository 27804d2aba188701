//! Application state types for the TUI
//!
//! This module contains all the state management types:
//! - Modal states (Help, Configure dialog, Confirm)
//! - The configuration dialog and its resolver-backed form
//! - Selection and navigation state (ListState)
//! - Countdown timers keyed by display slot
//! - Feedback state for errors and notifications

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::countdown::{Countdown, Tick};
use crate::models::{AvailableKernels, KernelConfig, OptionCatalog, ResourceField};
use crate::resolver::{FormField, FormState, ResolveError, Resolver, set_number};
use crate::tui::event::TimerSlot;

// ============================================================================
// Confirmation and Action Types
// ============================================================================

/// Confirmation action types
#[derive(Debug, Clone)]
pub enum ConfirmAction {
    KillAllocation { allocation: String, summary: String },
}

impl ConfirmAction {
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            ConfirmAction::KillAllocation { summary, .. } => {
                format!("Kill allocation {summary}?")
            }
        }
    }

    #[must_use]
    pub fn allocation(&self) -> &str {
        match self {
            ConfirmAction::KillAllocation { allocation, .. } => allocation,
        }
    }
}

// ============================================================================
// Toast Feedback
// ============================================================================

/// Short-lived notification shown in the bottom-right corner
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub success: bool,
    pub timestamp: Instant,
}

impl Toast {
    pub fn success(message: String) -> Self {
        Self {
            message,
            success: true,
            timestamp: Instant::now(),
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            message,
            success: false,
            timestamp: Instant::now(),
        }
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.timestamp.elapsed() < Duration::from_secs(3)
    }
}

// ============================================================================
// List Navigation State
// ============================================================================

/// List state with selection and scroll tracking
#[derive(Debug, Clone, Default)]
pub struct ListState {
    pub selected: usize,
    pub scroll_offset: usize,
    pub visible_count: usize,
}

impl ListState {
    pub fn clamp(&mut self, list_len: usize) {
        if list_len == 0 {
            self.selected = 0;
            self.scroll_offset = 0;
        } else {
            self.selected = self.selected.min(list_len - 1);
            if self.selected < self.scroll_offset {
                self.scroll_offset = self.selected;
            } else if self.visible_count > 0
                && self.selected >= self.scroll_offset + self.visible_count
            {
                self.scroll_offset = self.selected.saturating_sub(self.visible_count - 1);
            }
        }
    }

    pub fn move_up(&mut self, list_len: usize) {
        if self.selected > 0 {
            self.selected -= 1;
            self.clamp(list_len);
        }
    }

    pub fn move_down(&mut self, list_len: usize) {
        if list_len > 0 && self.selected < list_len - 1 {
            self.selected += 1;
            self.clamp(list_len);
        }
    }

    pub fn move_to_top(&mut self) {
        self.selected = 0;
        self.scroll_offset = 0;
    }

    pub fn move_to_bottom(&mut self, list_len: usize) {
        if list_len > 0 {
            self.selected = list_len - 1;
            self.clamp(list_len);
        }
    }
}

// ============================================================================
// Configuration Dialog
// ============================================================================

/// Configuration dialog: the catalog it was opened with and the form on top
#[derive(Debug, Default)]
pub struct DialogState {
    /// Waiting for the full catalog
    pub loading: bool,
    pub catalog: OptionCatalog,
    pub form: FormState,
    pub focus: Option<FormField>,
    /// Digits typed into the focused numeric field, not yet applied
    pub input: Option<String>,
    pub error: Option<String>,
    /// Allocation to select once the catalog arrives
    preselect: Option<String>,
}

impl DialogState {
    pub fn loading(preselect: Option<String>) -> Self {
        Self {
            loading: true,
            preselect,
            ..Default::default()
        }
    }

    /// Fill the form from a freshly fetched catalog
    pub fn load(&mut self, catalog: OptionCatalog, kernels: &AvailableKernels) {
        self.catalog = catalog;
        self.loading = false;
        let resolver = Resolver::new(&self.catalog, kernels);
        self.form = resolver.resolve_current();

        if let Some(id) = self.preselect.take()
            && let Err(e) = resolver.select_allocation(&mut self.form, &id)
        {
            tracing::debug!(allocation = %id, error = %e, "preselected allocation not offered");
        }
        self.focus = self.focusable_fields().first().copied();
    }

    /// Visible fields that accept edits, in display order
    #[must_use]
    pub fn focusable_fields(&self) -> Vec<FormField> {
        self.form
            .visible_fields()
            .into_iter()
            .filter(|f| self.form.is_editable(*f))
            .collect()
    }

    /// Move focus, applying any pending numeric input first
    pub fn move_focus(&mut self, down: bool) {
        self.commit_input();
        let fields = self.focusable_fields();
        let current = self
            .focus
            .and_then(|f| fields.iter().position(|x| *x == f));

        let next = match current {
            Some(i) if down => (i + 1).min(fields.len().saturating_sub(1)),
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.focus = fields.get(next).copied();
    }

    /// Step the focused control to its previous/next value
    pub fn cycle(&mut self, kernels: &AvailableKernels, forward: bool) {
        self.input = None;
        let Some(field) = self.focus else {
            return;
        };

        let result = match field.resource() {
            Some(resource) => self.step_number(resource, forward),
            None => self.step_choice(field, kernels, forward),
        };
        self.record(result);
        self.refocus();
    }

    fn step_choice(
        &mut self,
        field: FormField,
        kernels: &AvailableKernels,
        forward: bool,
    ) -> Result<(), ResolveError> {
        let Some(choice) = self.form.choice(field) else {
            return Ok(());
        };
        let len = choice.options.len();
        if len == 0 {
            return Ok(());
        }
        let current = choice
            .options
            .iter()
            .position(|o| *o == choice.value)
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        let value = choice.options[next].clone();

        Resolver::new(&self.catalog, kernels).select(&mut self.form, field, &value)
    }

    fn step_number(&mut self, field: ResourceField, forward: bool) -> Result<(), ResolveError> {
        let current: u64 = self.form.resource(field).value.parse().unwrap_or(0);
        let next = if forward {
            current.saturating_add(1)
        } else {
            current.saturating_sub(1)
        };
        set_number(&mut self.form, field, &next.to_string())
    }

    pub fn push_digit(&mut self, c: char) {
        if self.focus.and_then(FormField::resource).is_none() {
            return;
        }
        self.input.get_or_insert_with(String::new).push(c);
    }

    pub fn backspace(&mut self) {
        let Some(field) = self.focus.and_then(FormField::resource) else {
            return;
        };
        let current = self.form.resource(field).value.clone();
        let input = self.input.get_or_insert(current);
        input.pop();
    }

    /// Apply pending numeric input; invalid input keeps the old value
    pub fn commit_input(&mut self) {
        let (Some(input), Some(field)) = (
            self.input.take(),
            self.focus.and_then(FormField::resource),
        ) else {
            return;
        };
        let result = set_number(&mut self.form, field, &input);
        self.record(result);
    }

    /// Text shown for a field, including pending input
    #[must_use]
    pub fn display_value(&self, field: FormField) -> &str {
        match &self.input {
            Some(input) if self.focus == Some(field) => input,
            _ => self.form.value(field),
        }
    }

    /// Commit pending input and build the configuration to submit
    pub fn finish(&mut self, kernels: &AvailableKernels) -> KernelConfig {
        self.commit_input();
        self.form.to_kernel_config(kernels)
    }

    /// End time to count down while the allocation locks the form
    #[must_use]
    pub fn locked_endtime(&self) -> Option<i64> {
        if self.form.resources_editable {
            None
        } else {
            self.form.endtime
        }
    }

    fn record(&mut self, result: Result<(), ResolveError>) {
        self.error = result.err().map(|e| e.to_string());
    }

    /// Keep focus on a field that is still shown after a cascade
    fn refocus(&mut self) {
        let fields = self.focusable_fields();
        if !self.focus.is_some_and(|f| fields.contains(&f)) {
            self.focus = fields.first().copied();
        }
    }
}

// ============================================================================
// Modal State
// ============================================================================

/// Unified modal state: at most one overlay is open
#[derive(Debug, Default)]
pub enum ModalState {
    #[default]
    None,
    Help,
    Configure(Box<DialogState>),
    Confirm {
        action: ConfirmAction,
    },
}

impl ModalState {
    /// Check if the modal is blocking (requires explicit dismissal)
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ModalState::Confirm { .. } | ModalState::Configure(_))
    }

    /// Get the confirm action if in confirm mode
    #[must_use]
    pub fn confirm_action(&self) -> Option<&ConfirmAction> {
        match self {
            ModalState::Confirm { action } => Some(action),
            _ => None,
        }
    }

    #[must_use]
    pub fn dialog(&self) -> Option<&DialogState> {
        match self {
            ModalState::Configure(dialog) => Some(dialog.as_ref()),
            _ => None,
        }
    }

    pub fn dialog_mut(&mut self) -> Option<&mut DialogState> {
        match self {
            ModalState::Configure(dialog) => Some(dialog.as_mut()),
            _ => None,
        }
    }
}

// ============================================================================
// Countdown Timers
// ============================================================================

/// One running countdown
#[derive(Debug)]
pub struct CountdownTimer {
    pub endtime: i64,
    pub generation: u64,
    pub tick: Tick,
    cancel: CancellationToken,
}

/// Countdowns by display slot
///
/// Each (re)start bumps a generation counter so ticks from a replaced
/// countdown are ignored.
#[derive(Debug, Default)]
pub struct TimerState {
    timers: HashMap<TimerSlot, CountdownTimer>,
    next_generation: u64,
}

impl TimerState {
    #[must_use]
    pub fn endtime(&self, slot: TimerSlot) -> Option<i64> {
        self.timers.get(&slot).map(|t| t.endtime)
    }

    #[must_use]
    pub fn tick(&self, slot: TimerSlot) -> Option<&Tick> {
        self.timers.get(&slot).map(|t| &t.tick)
    }

    /// Register a countdown for `slot`, replacing any previous one
    ///
    /// Returns the generation the new countdown's ticks must carry.
    pub fn start(&mut self, slot: TimerSlot, endtime: i64, cancel: CancellationToken) -> u64 {
        self.stop(slot);
        self.next_generation += 1;
        let generation = self.next_generation;
        self.timers.insert(
            slot,
            CountdownTimer {
                endtime,
                generation,
                tick: Countdown::new(endtime).tick(),
                cancel,
            },
        );
        generation
    }

    pub fn stop(&mut self, slot: TimerSlot) {
        if let Some(timer) = self.timers.remove(&slot) {
            timer.cancel.cancel();
        }
    }

    pub fn stop_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.cancel.cancel();
        }
    }

    /// Record a tick; returns whether it belonged to a live countdown
    pub fn apply(&mut self, slot: TimerSlot, generation: u64, tick: Tick) -> bool {
        match self.timers.get_mut(&slot) {
            Some(timer) if timer.generation == generation => {
                timer.tick = tick;
                true
            }
            _ => false,
        }
    }
}

// ============================================================================
// Feedback State
// ============================================================================

/// Unified feedback state for errors, warnings, and transient messages
#[derive(Debug)]
pub struct FeedbackState {
    last_error: Option<(String, Instant)>,
    error_display_duration: Duration,
    pub config_warnings: Vec<String>,
    toast: Option<Toast>,
}

impl FeedbackState {
    /// Create a new FeedbackState with config warnings
    pub fn new(config_warnings: Vec<String>) -> Self {
        Self {
            last_error: None,
            error_display_duration: Duration::from_secs(10),
            config_warnings,
            toast: None,
        }
    }

    /// Set an error message to display
    pub fn set_error(&mut self, msg: String) {
        self.last_error = Some((msg, Instant::now()));
    }

    /// Get the current error message if it should still be shown
    #[must_use]
    pub fn current_error(&self) -> Option<&str> {
        self.last_error
            .as_ref()
            .filter(|(_, t)| t.elapsed() < self.error_display_duration)
            .map(|(msg, _)| msg.as_str())
    }

    pub fn set_toast(&mut self, toast: Toast) {
        self.toast = Some(toast);
    }

    #[must_use]
    pub fn current_toast(&self) -> Option<&Toast> {
        self.toast.as_ref().filter(|t| t.is_visible())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KernelChoice;

    fn catalog() -> OptionCatalog {
        serde_json::from_str(
            r#"{
            "dropdown_lists": {
                "projects": ["alpha", "beta"],
                "partitions": {"alpha": ["batch", "gpus"], "beta": ["batch"]},
                "reservations": {"alpha": {"gpus": ["None", "maint"]}}
            },
            "resources": {
                "batch": {"nodes": {"default": 1, "minmax": [1, 4]},
                          "runtime": {"default": 60, "minmax": [10, 120]}},
                "gpus": {"nodes": {"default": 1, "minmax": [1, 2]},
                         "gpus": {"default": 1, "minmax": [1, 4]},
                         "runtime": {"default": 30, "minmax": [10, 60]}}
            },
            "allocations": {
                "4711": {"config": {"project": "beta", "partition": "batch", "nodes": "2",
                                    "gpus": "0", "runtime": "90", "reservation": "None"},
                         "endtime": 1700000000, "kernel_ids": [], "nodelist": ["n01", "n02"],
                         "state": "RUNNING"}
            }
        }"#,
        )
        .unwrap()
    }

    fn kernels() -> AvailableKernels {
        AvailableKernels::from([(
            "python3".to_string(),
            KernelChoice {
                display_name: "Python 3".to_string(),
                argv: vec!["python".to_string()],
                language: "python".to_string(),
            },
        )])
    }

    fn loaded(preselect: Option<&str>) -> DialogState {
        let mut dialog = DialogState::loading(preselect.map(str::to_string));
        dialog.load(catalog(), &kernels());
        dialog
    }

    #[test]
    fn test_list_state_navigation() {
        let mut state = ListState {
            visible_count: 10,
            ..Default::default()
        };

        state.move_down(5);
        assert_eq!(state.selected, 1);

        state.move_to_bottom(5);
        assert_eq!(state.selected, 4);

        state.move_to_top();
        assert_eq!(state.selected, 0);

        state.selected = 9;
        state.clamp(3);
        assert_eq!(state.selected, 2);
    }

    #[test]
    fn test_dialog_load_and_focus() {
        let mut dialog = loaded(None);
        assert!(!dialog.loading);
        assert_eq!(dialog.focus, Some(FormField::Allocation));
        assert_eq!(dialog.form.project.value, "alpha");

        dialog.move_focus(true);
        assert_eq!(dialog.focus, Some(FormField::Node));
        dialog.move_focus(false);
        dialog.move_focus(false);
        assert_eq!(dialog.focus, Some(FormField::Allocation));
    }

    #[test]
    fn test_cycling_project_cascades() {
        let mut dialog = loaded(None);
        dialog.focus = Some(FormField::Project);

        dialog.cycle(&kernels(), true);
        assert_eq!(dialog.form.project.value, "beta");
        assert_eq!(dialog.form.partition.value, "batch");
        assert_eq!(dialog.form.runtime.value, "60");
        assert!(dialog.error.is_none());
    }

    #[test]
    fn test_numeric_input_clamps_and_rejects() {
        let mut dialog = loaded(None);
        dialog.focus = Some(FormField::Runtime);

        dialog.push_digit('5');
        dialog.push_digit('0');
        dialog.push_digit('0');
        assert_eq!(dialog.display_value(FormField::Runtime), "500");
        dialog.commit_input();
        assert_eq!(dialog.form.runtime.value, "120");

        // Emptying the field is rejected and the value kept
        dialog.backspace();
        dialog.backspace();
        dialog.backspace();
        dialog.commit_input();
        assert_eq!(dialog.form.runtime.value, "120");
        assert!(dialog.error.is_some());

        dialog.cycle(&kernels(), false);
        assert_eq!(dialog.form.runtime.value, "119");
        assert!(dialog.error.is_none());
    }

    #[test]
    fn test_preselected_allocation_locks_resources() {
        let dialog = loaded(Some("4711"));
        assert_eq!(dialog.form.allocation.value, "4711");
        assert_eq!(dialog.form.nodes.value, "2");
        assert_eq!(dialog.locked_endtime(), Some(1_700_000_000));

        let fields = dialog.focusable_fields();
        assert!(fields.contains(&FormField::Kernel));
        assert!(!fields.contains(&FormField::Project));
    }

    #[test]
    fn test_timer_generations() {
        let mut timers = TimerState::default();
        let first = timers.start(TimerSlot::Panel, 100, CancellationToken::new());
        let token = CancellationToken::new();
        let second = timers.start(TimerSlot::Panel, 200, token.clone());
        assert_ne!(first, second);

        assert!(!timers.apply(TimerSlot::Panel, first, Tick::new(5)));
        assert!(timers.apply(TimerSlot::Panel, second, Tick::new(5)));
        assert_eq!(timers.tick(TimerSlot::Panel).unwrap().text, "00:00:05");

        timers.stop_all();
        assert!(token.is_cancelled());
        assert_eq!(timers.endtime(TimerSlot::Panel), None);
    }
}
