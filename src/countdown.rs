//! Allocation countdown.
//!
//! Remaining time is `max(endtime - now, 0)` rendered as `HH:MM:SS`, where the
//! hour field counts total hours. A running countdown ticks once per second
//! and stops for good when it reaches zero; the last tick stays `00:00:00`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::OptionCatalog;

/// Below this many seconds the countdown is shown as urgent.
pub const URGENT_THRESHOLD_SECS: u64 = 300;

const TICK: Duration = Duration::from_secs(1);

/// Format seconds as `HH:MM:SS`, every field at least two digits.
#[must_use]
pub fn format_hms(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[must_use]
pub const fn is_urgent(remaining_secs: u64) -> bool {
    remaining_secs < URGENT_THRESHOLD_SECS
}

/// Current wall-clock time as Unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// One rendered countdown state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub remaining: u64,
    pub text: String,
    pub urgent: bool,
}

impl Tick {
    #[must_use]
    pub fn new(remaining: u64) -> Self {
        Self {
            remaining,
            text: format_hms(remaining),
            urgent: is_urgent(remaining),
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }
}

/// Countdown towards an absolute Unix end time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    endtime: i64,
}

impl Countdown {
    #[must_use]
    pub const fn new(endtime: i64) -> Self {
        Self { endtime }
    }

    #[must_use]
    pub const fn endtime(&self) -> i64 {
        self.endtime
    }

    /// Remaining seconds at `now`, floored at zero.
    #[must_use]
    pub fn remaining_at(&self, now: i64) -> u64 {
        u64::try_from(self.endtime.saturating_sub(now)).unwrap_or(0)
    }

    #[must_use]
    pub fn tick_at(&self, now: i64) -> Tick {
        Tick::new(self.remaining_at(now))
    }

    #[must_use]
    pub fn tick(&self) -> Tick {
        self.tick_at(unix_now())
    }

    /// Start ticking, measuring from the wall clock.
    pub fn spawn<F>(self, cancel: CancellationToken, on_tick: F) -> JoinHandle<()>
    where
        F: FnMut(Tick) -> bool + Send + 'static,
    {
        spawn_countdown(self, unix_now(), cancel, on_tick)
    }
}

/// Run a countdown task.
///
/// `on_tick` is called immediately and then once per second; returning
/// `false` stops the task (e.g. the receiving view is gone). The task also
/// ends after delivering the zero tick, or when `cancel` fires. Elapsed time
/// is measured on the runtime clock from `now`.
pub fn spawn_countdown<F>(
    countdown: Countdown,
    now: i64,
    cancel: CancellationToken,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut(Tick) -> bool + Send + 'static,
{
    let deadline = Instant::now() + Duration::from_secs(countdown.remaining_at(now));

    tokio::spawn(async move {
        let mut next = Instant::now();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            // Round up so a partially elapsed second still shows
            let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            let tick = Tick::new(secs);
            let expired = tick.is_expired();

            if !on_tick(tick) || expired {
                break;
            }

            next += TICK;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next) => {}
            }
        }
        tracing::trace!(endtime = countdown.endtime(), "countdown stopped");
    })
}

/// Countdown of the allocation a kernel runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelCountdown {
    pub allocation_id: String,
    pub countdown: Countdown,
}

impl KernelCountdown {
    /// Find the allocation holding `kernel_id`; `None` hides the display.
    #[must_use]
    pub fn for_kernel(catalog: &OptionCatalog, kernel_id: &str) -> Option<Self> {
        catalog
            .allocation_for_kernel(kernel_id)
            .map(|(id, alloc)| Self {
                allocation_id: id.to_string(),
                countdown: Countdown::new(alloc.endtime),
            })
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!("Remaining time ( allocation {} ): ", self.allocation_id)
    }
}
