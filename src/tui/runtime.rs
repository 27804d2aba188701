//! Async runtime and task management for the TUI
//!
//! This module implements the dual-channel event-driven architecture:
//! - Input channel (priority): User input events that are never dropped
//! - Data channel: Data updates that may be dropped under backpressure
//!
//! The main loop uses `tokio::select!` with bias toward the input channel
//! to prevent input starvation under heavy data update loads.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::countdown::{Countdown, Tick};
use crate::poller::Snapshot;
use crate::session::SessionContext;
use crate::tui::app::App;
use crate::tui::event::{DataEvent, EventResult, InputEvent, TimerSlot};

/// Channel capacities
const INPUT_CHANNEL_CAPACITY: usize = 16;
const DATA_CHANNEL_CAPACITY: usize = 32;

/// How long shutdown waits for background tasks
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// TUI runtime managing all background tasks
pub struct TuiRuntime {
    cancel_token: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
}

impl TuiRuntime {
    /// Create a new TUI runtime
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            task_handles: Vec::new(),
        }
    }

    /// Get a clone of the cancellation token for spawning tasks
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Add a task handle to track
    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.task_handles.push(handle);
    }

    /// Signal shutdown and wait for tasks to complete
    pub async fn shutdown(self) {
        self.cancel_token.cancel();

        let shutdown = async {
            for handle in self.task_handles {
                let _ = handle.await;
            }
        };

        tokio::select! {
            _ = shutdown => {}
            _ = tokio::time::sleep(SHUTDOWN_TIMEOUT) => {
                tracing::warn!("background tasks did not stop in time");
            }
        }
    }
}

/// Spawn the input event reader task
pub fn spawn_input_task(tx: mpsc::Sender<InputEvent>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = EventStream::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe_event = reader.next() => {
                    match maybe_event {
                        Some(Ok(event)) => {
                            let input_event = match event {
                                Event::Key(key) => Some(InputEvent::Key(key)),
                                Event::FocusGained => Some(InputEvent::Focus(true)),
                                Event::FocusLost => Some(InputEvent::Focus(false)),
                                Event::Resize(w, h) => Some(InputEvent::Resize(w, h)),
                                _ => None,
                            };

                            if let Some(evt) = input_event
                                && tx.send(evt).await.is_err()
                            {
                                break; // Receiver dropped
                            }
                        }
                        Some(Err(e)) => {
                            let is_fatal = matches!(
                                e.kind(),
                                std::io::ErrorKind::BrokenPipe
                                    | std::io::ErrorKind::ConnectionReset
                                    | std::io::ErrorKind::UnexpectedEof
                            );

                            if is_fatal {
                                tracing::info!("Terminal disconnected: {:?}", e);
                                break;
                            }
                            tracing::warn!("Terminal event read error: {:?}", e);
                        }
                        None => break, // Stream ended
                    }
                }
            }
        }
    })
}

/// Forward poller snapshots into the data channel
///
/// A full data channel drops the snapshot; the next poll replaces it anyway.
pub fn spawn_snapshot_forwarder(
    mut snapshots: broadcast::Receiver<Snapshot>,
    tx: mpsc::Sender<DataEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let snapshot = tokio::select! {
                _ = cancel.cancelled() => break,
                received = snapshots.recv() => match received {
                    Ok(snapshot) => snapshot,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "status snapshots skipped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            match tx.try_send(DataEvent::StatusUpdated(snapshot)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!("Could not forward status snapshot (channel full)");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
    })
}

/// Forward session kernel and connection changes into the data channel
pub fn spawn_session_watcher(
    session: Arc<dyn SessionContext>,
    tx: mpsc::Sender<DataEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    // Subscribe before spawning so changes made in the meantime still fire
    let mut kernel = session.kernel_changed();
    let mut status = session.connection_status_changed();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                changed = kernel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    DataEvent::SessionKernelChanged(kernel.borrow_and_update().clone())
                }
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    DataEvent::SessionStatusChanged(*status.borrow_and_update())
                }
            };

            if tx.send(event).await.is_err() {
                break;
            }
        }
    })
}

/// Run a countdown whose ticks arrive as [`DataEvent::CountdownTick`]
///
/// Ticks that do not fit into the channel are skipped; the task stops once the
/// receiver is gone.
pub fn spawn_countdown_ticker(
    countdown: Countdown,
    slot: TimerSlot,
    generation: u64,
    tx: mpsc::Sender<DataEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    countdown.spawn(cancel, move |tick: Tick| {
        let _ = tx.try_send(DataEvent::CountdownTick {
            slot,
            generation,
            tick,
        });
        !tx.is_closed()
    })
}

/// Run the main TUI event loop
pub async fn run_event_loop(
    mut app: App,
    mut input_rx: mpsc::Receiver<InputEvent>,
    mut data_rx: mpsc::Receiver<DataEvent>,
    mut render_fn: impl FnMut(&App) -> Result<()>,
) -> Result<()> {
    let mut needs_render = true;

    loop {
        if needs_render {
            render_fn(&app)?;
            needs_render = false;
        }

        if !app.running {
            break;
        }

        tokio::select! {
            // Bias toward input channel to prevent input starvation
            biased;

            Some(input) = input_rx.recv() => {
                match app.handle_input(input) {
                    EventResult::Continue => needs_render = true,
                    EventResult::Unchanged => {}
                    EventResult::Quit => break,
                }
            }

            Some(data) = data_rx.recv() => {
                match app.handle_data(data) {
                    EventResult::Continue => needs_render = true,
                    EventResult::Unchanged => {}
                    EventResult::Quit => break,
                }
            }

            else => break,
        }
    }

    app.stop_timers();
    Ok(())
}

/// Create the dual channels for the TUI
pub fn create_channels() -> (
    mpsc::Sender<InputEvent>,
    mpsc::Receiver<InputEvent>,
    mpsc::Sender<DataEvent>,
    mpsc::Receiver<DataEvent>,
) {
    let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    let (data_tx, data_rx) = mpsc::channel(DATA_CHANNEL_CAPACITY);
    (input_tx, input_rx, data_tx, data_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OptionCatalog;
    use crate::session::{ConnectionStatus, KernelRef, LocalSession};

    #[tokio::test]
    async fn test_snapshot_forwarder() {
        let (snap_tx, snap_rx) = broadcast::channel(4);
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = spawn_snapshot_forwarder(snap_rx, tx, cancel.clone());

        let catalog = OptionCatalog {
            documentation_href: "docs".to_string(),
            ..Default::default()
        };
        snap_tx.send(Arc::new(catalog)).unwrap();

        match rx.recv().await {
            Some(DataEvent::StatusUpdated(snapshot)) => {
                assert_eq!(snapshot.documentation_href, "docs");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // Closing the broadcast side ends the forwarder
        drop(snap_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_session_watcher() {
        let session = Arc::new(LocalSession::new(None));
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = spawn_session_watcher(session.clone(), tx, cancel.clone());

        // the watcher task has not run yet when the kernel changes

        let kernel = KernelRef {
            id: "k-9".to_string(),
            name: "python3".to_string(),
        };
        session.set_kernel(Some(kernel.clone()));
        match rx.recv().await {
            Some(DataEvent::SessionKernelChanged(Some(k))) => assert_eq!(k, kernel),
            other => panic!("unexpected event: {other:?}"),
        }

        session.set_status(ConnectionStatus::Connected);
        match rx.recv().await {
            Some(DataEvent::SessionStatusChanged(status)) => {
                assert_eq!(status, ConnectionStatus::Connected);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticker_stops_when_receiver_gone() {
        let (tx, mut rx) = mpsc::channel(4);
        let endtime = crate::countdown::unix_now() + 3600;
        let handle = spawn_countdown_ticker(
            Countdown::new(endtime),
            TimerSlot::Panel,
            7,
            tx,
            CancellationToken::new(),
        );

        match rx.recv().await {
            Some(DataEvent::CountdownTick {
                slot, generation, ..
            }) => {
                assert_eq!(slot, TimerSlot::Panel);
                assert_eq!(generation, 7);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        drop(rx);
        handle.await.unwrap();
    }
}
