use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::ToastError;
use crate::shared_cache::ToastCache;
use crate::types::{SharedMut, lock};

// Roughly 30 years, what tokio itself uses for "never"
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

pub type RepeatingTask = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Periodic timer facility
pub trait Scheduler: Send + Sync {
    fn schedule_repeating(
        &self,
        interval: Duration,
        task: RepeatingTask,
    ) -> Result<TimerToken, ToastError>;

    fn cancel(&self, token: TimerToken);
}

// responsible for periodically removing expired toast records
pub fn spawn_cleanup_task(
    cache: &SharedMut<ToastCache>,
    scheduler: &dyn Scheduler,
    interval: Duration,
) -> Result<TimerToken, ToastError> {
    let cache = Arc::downgrade(cache);
    scheduler.schedule_repeating(
        interval,
        Arc::new(move || {
            if let Some(cache) = cache.upgrade() {
                lock(&cache).sweep_expired();
            }
        }),
    )
}

fn check_interval(interval: Duration) -> Result<(), ToastError> {
    if interval.is_zero() {
        return Err(ToastError::invalid_request("timer interval must be non-zero"));
    }
    Ok(())
}

/// Runs each task on its own tokio task with `time::interval`.
#[derive(Debug, Default)]
pub struct TokioScheduler {
    next_token: AtomicU64,
    timers: Mutex<HashMap<TimerToken, JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        lock(&self.timers).len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(
        &self,
        interval: Duration,
        task: RepeatingTask,
    ) -> Result<TimerToken, ToastError> {
        check_interval(interval)?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| ToastError::TimerUnavailable {
                reason: e.to_string(),
            })?;

        let token = TimerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let join = runtime.spawn(async move {
            // First tick one full interval from now, not immediately
            let start = Instant::now()
                .checked_add(interval)
                .unwrap_or_else(|| Instant::now() + FAR_FUTURE);
            let mut ticker = time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task();
            }
        });

        lock(&self.timers).insert(token, join);
        debug!("Scheduled timer {:?} every {:?}", token, interval);
        Ok(token)
    }

    fn cancel(&self, token: TimerToken) {
        if let Some(join) = lock(&self.timers).remove(&token) {
            join.abort();
            debug!("Cancelled timer {:?}", token);
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, join) in lock(&self.timers).drain() {
            join.abort();
        }
    }
}

struct ManualTimer {
    token: TimerToken,
    interval: Duration,
    elapsed: Duration,
    task: RepeatingTask,
}

/// Scheduler driven by explicit [`ManualScheduler::advance`] calls.
#[derive(Default)]
pub struct ManualScheduler {
    next_token: AtomicU64,
    timers: Mutex<Vec<ManualTimer>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        lock(&self.timers).len()
    }

    /// Moves simulated time forward, firing each timer once per interval
    /// that elapsed. Returns how many callbacks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let mut due = Vec::new();
        {
            let mut timers = lock(&self.timers);
            for timer in timers.iter_mut() {
                timer.elapsed += by;
                while timer.elapsed >= timer.interval {
                    timer.elapsed -= timer.interval;
                    due.push(timer.task.clone());
                }
            }
        }

        // Callbacks may cancel timers, so run them unlocked
        for task in &due {
            task();
        }
        due.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(
        &self,
        interval: Duration,
        task: RepeatingTask,
    ) -> Result<TimerToken, ToastError> {
        check_interval(interval)?;
        let token = TimerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        lock(&self.timers).push(ManualTimer {
            token,
            interval,
            elapsed: Duration::ZERO,
            task,
        });
        Ok(token)
    }

    fn cancel(&self, token: TimerToken) {
        lock(&self.timers).retain(|timer| timer.token != token);
    }
}
