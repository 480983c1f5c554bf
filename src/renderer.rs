use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::shared_cache::ToastCache;
use crate::types::{DisplayHandle, HandleId, Severity, SharedMut, ToastElement, lock};

/// Visual layer that puts toasts on screen.
///
/// Implementations report the end of a toast (timeout or user action)
/// through [`ToastOptions::on_close`]. That may happen on another thread
/// before `show` has returned.
pub trait Renderer: Send + Sync {
    fn show(&self, message: &str, severity: Severity, options: ToastOptions) -> DisplayHandle;
}

#[derive(Debug, Clone)]
pub struct ToastOptions {
    pub duration: Duration,
    pub on_close: Option<CloseHook>,
}

impl ToastOptions {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            on_close: None,
        }
    }

    pub fn with_close_hook(mut self, hook: CloseHook) -> Self {
        self.on_close = Some(hook);
        self
    }
}

/// Clears a record's handle when its toast goes away. Holds the cache
/// weakly so an orphaned toast never keeps a torn-down cache alive.
#[derive(Clone)]
pub struct CloseHook {
    key: String,
    cache: Weak<Mutex<ToastCache>>,
}

impl CloseHook {
    pub fn new(key: &str, cache: &SharedMut<ToastCache>) -> Self {
        Self {
            key: key.to_string(),
            cache: Arc::downgrade(cache),
        }
    }

    pub fn closed(&self, handle: HandleId) {
        if let Some(cache) = self.cache.upgrade() {
            lock(&cache).clear_handle(&self.key, handle);
        }
    }
}

impl fmt::Debug for CloseHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHook")
            .field("key", &self.key)
            .finish()
    }
}

/// Renders toasts as log events and closes them after their duration on
/// the ambient tokio runtime. Without a runtime toasts stay open until
/// dismissed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn show(&self, message: &str, severity: Severity, options: ToastOptions) -> DisplayHandle {
        match severity {
            Severity::Error => error!(target: "toast", "{}", message),
            Severity::Warning => warn!(target: "toast", "{}", message),
            Severity::Info | Severity::Success => {
                info!(target: "toast", "[{}] {}", severity, message)
            }
        }

        let id = HandleId::next();
        let toast = Arc::new(LoggedToast {
            id,
            message: message.to_string(),
            closed: AtomicBool::new(false),
            on_close: options.on_close,
            timer: Mutex::new(None),
        });

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let expiring = toast.clone();
            let duration = options.duration;
            let task = runtime.spawn(async move {
                tokio::time::sleep(duration).await;
                expiring.close("expired");
            });
            *lock(&toast.timer) = Some(task.abort_handle());
        }

        DisplayHandle::new(id, toast)
    }
}

struct LoggedToast {
    id: HandleId,
    message: String,
    closed: AtomicBool,
    on_close: Option<CloseHook>,
    timer: Mutex<Option<AbortHandle>>,
}

impl LoggedToast {
    fn close(&self, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(timer) = lock(&self.timer).take() {
            timer.abort();
        }
        debug!(target: "toast", "Toast {} {}: {}", self.id.value(), reason, self.message);
        if let Some(hook) = &self.on_close {
            hook.closed(self.id);
        }
    }
}

impl ToastElement for LoggedToast {
    fn dismiss(&self) {
        self.close("dismissed");
    }
}
