use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::cleanup::{Scheduler, TimerToken, TokioScheduler, spawn_cleanup_task};
use crate::clock::{Clock, SystemClock};
use crate::error::ToastError;
use crate::renderer::{CloseHook, Renderer, ToastOptions, TracingRenderer};
use crate::shared_cache::{CacheSettings, Persistence, ToastCache};
use crate::storage::{MemoryStorage, Storage};
use crate::types::{DisplayHandle, NotificationRecord, Severity, SharedMut, lock};

/// The notification subsystem: a de-duplicating toast cache together with
/// the renderer, storage, clock and timer it runs against.
///
/// Clones share the same cache.
#[derive(Clone)]
pub struct Notifier {
    cache: SharedMut<ToastCache>,
    renderer: Arc<dyn Renderer>,
    scheduler: Arc<dyn Scheduler>,
    sweep_interval: Duration,
    default_duration: Duration,
    lifecycle: SharedMut<Lifecycle>,
}

#[derive(Debug, Default)]
struct Lifecycle {
    loaded: bool,
    sweep_timer: Option<TimerToken>,
}

pub struct NotifierBuilder {
    settings: CacheSettings,
    storage: Option<Box<dyn Storage>>,
    renderer: Option<Arc<dyn Renderer>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    clock: Option<Arc<dyn Clock>>,
}

impl NotifierBuilder {
    pub fn storage<S: Storage + 'static>(mut self, storage: S) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Notifier {
        let storage = self
            .storage
            .unwrap_or_else(|| Box::new(MemoryStorage::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sweep_interval = self.settings.sweep_interval;
        let default_duration = self.settings.default_duration;

        Notifier {
            cache: Arc::new(Mutex::new(ToastCache::new(storage, clock, self.settings))),
            renderer: self
                .renderer
                .unwrap_or_else(|| Arc::new(TracingRenderer)),
            scheduler: self
                .scheduler
                .unwrap_or_else(|| Arc::new(TokioScheduler::new())),
            sweep_interval,
            default_duration,
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
        }
    }
}

impl Notifier {
    pub fn builder(settings: CacheSettings) -> NotifierBuilder {
        NotifierBuilder {
            settings,
            storage: None,
            renderer: None,
            scheduler: None,
            clock: None,
        }
    }

    /// Loads the persisted mirror (once) and starts the periodic sweep.
    pub fn init(&self) -> Result<(), ToastError> {
        let mut lifecycle = lock(&self.lifecycle);
        if !lifecycle.loaded {
            self.load_from_storage();
            lifecycle.loaded = true;
        }
        if lifecycle.sweep_timer.is_none() {
            let token =
                spawn_cleanup_task(&self.cache, self.scheduler.as_ref(), self.sweep_interval)?;
            lifecycle.sweep_timer = Some(token);
            info!("Toast cache sweep running every {:?}", self.sweep_interval);
        }
        Ok(())
    }

    /// Stops the sweep. Cached state stays in memory and in storage.
    pub fn teardown(&self) {
        if let Some(token) = lock(&self.lifecycle).sweep_timer.take() {
            self.scheduler.cancel(token);
            info!("Toast cache sweep stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.lifecycle).sweep_timer.is_some()
    }

    /// Shows `message` unless a toast with the same `key` was displayed
    /// within the suppression window, in which case `Ok(None)` is returned
    /// and nothing is rendered. Without a key (or with an empty one) the
    /// toast is always shown.
    pub fn request_show(
        &self,
        message: &str,
        severity: Severity,
        key: Option<&str>,
        duration: Option<Duration>,
    ) -> Result<Option<DisplayHandle>, ToastError> {
        validate_message(message)?;
        let duration = duration.unwrap_or(self.default_duration);

        let key = match key.filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => {
                let options = ToastOptions::new(duration);
                return Ok(Some(self.renderer.show(message, severity, options)));
            }
        };

        if !lock(&self.cache).reserve(key, message, severity) {
            return Ok(None);
        }

        // The renderer may call back into the cache, so it runs unlocked
        let options =
            ToastOptions::new(duration).with_close_hook(CloseHook::new(key, &self.cache));
        let handle = self.renderer.show(message, severity, options);
        if !lock(&self.cache).attach_handle(key, handle.clone()) {
            debug!("Toast {} was closed or replaced before its handle was attached", key);
        }
        Ok(Some(handle))
    }

    /// Hides the toast currently shown for `key`, if any.
    pub fn dismiss(&self, key: &str) {
        let handle = lock(&self.cache).take_handle(key);
        if let Some(handle) = handle {
            handle.dismiss();
        }
    }

    pub fn load_from_storage(&self) -> usize {
        lock(&self.cache).load_from_storage()
    }

    pub fn sweep_expired(&self) -> usize {
        lock(&self.cache).sweep_expired()
    }

    pub fn record(&self, key: &str) -> Option<NotificationRecord> {
        lock(&self.cache).get(key).cloned()
    }

    pub fn records(&self) -> Vec<NotificationRecord> {
        lock(&self.cache).records().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.cache).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.cache).is_empty()
    }

    pub fn persistence(&self) -> Persistence {
        lock(&self.cache).persistence()
    }
}

fn validate_message(message: &str) -> Result<(), ToastError> {
    if message.trim().is_empty() {
        return Err(ToastError::invalid_request("message must not be empty"));
    }
    Ok(())
}
