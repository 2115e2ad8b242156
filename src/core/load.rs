//! Foreground load signal.
//!
//! The execution loop reads it to gate background work. [`ForegroundLoad`]
//! also triggers preemption when a foreground request begins.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::Preemptor;

/// Foreground activity as seen by the scheduler.
pub trait LoadSignal: Send + Sync {
    /// Number of foreground requests in flight.
    fn active_foreground_count(&self) -> u32;

    /// Time since the last foreground activity.
    fn idle_duration(&self) -> Duration;

    /// Whether foreground has been idle for at least `duration`.
    fn is_idle_for(&self, duration: Duration) -> bool {
        self.idle_duration() >= duration
    }
}

/// Reference load signal tracking in-flight foreground requests.
///
/// ```rust,ignore
/// let load = Arc::new(ForegroundLoad::new());
/// load.attach_preemptor(scheduler.preemptor());
///
/// // In the request handler:
/// let _guard = load.begin_request(); // preempts background work
/// ```
#[derive(Debug)]
pub struct ForegroundLoad {
    active: AtomicU32,
    last_activity: Mutex<Instant>,
    preemptor: OnceLock<Preemptor>,
}

impl Default for ForegroundLoad {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundLoad {
    /// Create a signal with no requests in flight.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: AtomicU32::new(0),
            last_activity: Mutex::new(Instant::now()),
            preemptor: OnceLock::new(),
        }
    }

    /// Wire the scheduler's preemption trigger. Only the first call takes effect.
    pub fn attach_preemptor(&self, preemptor: Preemptor) -> bool {
        self.preemptor.set(preemptor).is_ok()
    }

    /// Begin a foreground request: count it, record activity and preempt the slot.
    pub fn begin_request(self: &Arc<Self>) -> ForegroundRequestGuard {
        self.active.fetch_add(1, Ordering::AcqRel);
        self.touch();
        if let Some(preemptor) = self.preemptor.get() {
            preemptor.interrupt_now();
        }
        ForegroundRequestGuard {
            load: Arc::clone(self),
        }
    }

    /// Record foreground activity without changing the request count.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    fn end_request(&self) {
        // Saturating: never wrap below zero on a stray double end.
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        self.touch();
    }
}

impl LoadSignal for ForegroundLoad {
    fn active_foreground_count(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }

    fn idle_duration(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }
}

/// Ends the foreground request on drop.
#[derive(Debug)]
pub struct ForegroundRequestGuard {
    load: Arc<ForegroundLoad>,
}

impl Drop for ForegroundRequestGuard {
    fn drop(&mut self) {
        self.load.end_request();
    }
}
