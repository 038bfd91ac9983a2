//! Repeating timers bound to a runtime handle.
//!
//! [`TimerService`] is a small injectable facility: every timer it creates
//! runs its callback on the runtime it was given, at a fixed period, until
//! the returned [`IntervalTimer`] is suspended or dropped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::TimerError;

/// Creates and suspends repeating timers.
#[derive(Debug, Clone, Default)]
pub struct TimerService {
    /// Number of timers created and not yet suspended.
    live: Arc<AtomicUsize>,
}

impl TimerService {
    /// Creates a new timer service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a timer that runs `callback` on `context` every `interval`.
    ///
    /// The first firing happens one full interval after creation.
    pub fn create_interval_timer<F>(
        &self,
        interval: Duration,
        context: &Handle,
        mut callback: F,
    ) -> Result<IntervalTimer, TimerError>
    where
        F: FnMut() + Send + 'static,
    {
        if interval.is_zero() {
            return Err(TimerError::ZeroInterval);
        }

        let cancel = CancellationToken::new();
        let gate = Arc::new(Mutex::new(()));

        let task_cancel = cancel.clone();
        let task_gate = gate.clone();
        context.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let _firing = task_gate.lock().unwrap_or_else(PoisonError::into_inner);
                        if task_cancel.is_cancelled() {
                            break;
                        }
                        callback();
                    }
                }
            }
        });

        self.live.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(interval_ms = interval.as_millis() as u64, "Interval timer created");

        Ok(IntervalTimer {
            interval,
            cancel,
            gate,
            suspended: AtomicBool::new(false),
            live: self.live.clone(),
        })
    }

    /// Stops future firings of `timer`. Safe to call more than once.
    pub fn suspend_interval_timer(&self, timer: &IntervalTimer) {
        timer.suspend();
    }

    /// Number of timers that are currently running.
    pub fn active_timers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Handle to a running repeating timer. Dropping it suspends the timer.
#[derive(Debug)]
pub struct IntervalTimer {
    interval: Duration,
    cancel: CancellationToken,
    /// Held for the duration of each firing.
    gate: Arc<Mutex<()>>,
    suspended: AtomicBool,
    live: Arc<AtomicUsize>,
}

impl IntervalTimer {
    /// The firing period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether [`suspend`](Self::suspend) has been called.
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Stops future firings.
    ///
    /// When this returns, no firing is in progress and none will start.
    /// Must not be called from this timer's own callback.
    pub fn suspend(&self) {
        if self.suspended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        // Wait out a firing that started before the cancel was visible.
        drop(self.gate.lock().unwrap_or_else(PoisonError::into_inner));
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.suspend();
    }
}

/// Resolves at `deadline`, or never when there is none.
pub(crate) async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
