use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::ToastError;

pub type SharedMut<T> = Arc<Mutex<T>>;

/// Locks a shared value, recovering the data if a previous holder panicked.
pub fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Visual severity of a toast. Written lowercase, read case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ToastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "success" => Ok(Severity::Success),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(ToastError::invalid_request(format!(
                "unrecognized severity: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = ToastError;

    fn try_from(value: String) -> Result<Self, <Severity as TryFrom<String>>::Error> {
        value.parse()
    }
}

/// A displayed visual element that can be hidden before it times out.
pub trait ToastElement: Send + Sync {
    fn dismiss(&self);
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn next() -> Self {
        HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Opaque reference to a toast currently on screen
#[derive(Clone)]
pub struct DisplayHandle {
    id: HandleId,
    element: Arc<dyn ToastElement>,
}

impl DisplayHandle {
    pub fn new(id: HandleId, element: Arc<dyn ToastElement>) -> Self {
        Self { id, element }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn dismiss(&self) {
        self.element.dismiss();
    }
}

impl fmt::Debug for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayHandle")
            .field("id", &self.id)
            .field("element", &"<ToastElement>")
            .finish()
    }
}

impl PartialEq for DisplayHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Bookkeeping for one notification key
#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub key: String,
    pub message: String,
    pub severity: Severity,
    /// Unix timestamp in milliseconds
    pub shown_at: u64,
    /// Unix timestamp in milliseconds
    pub expire_at: u64,
    pub active_handle: Option<DisplayHandle>,
}

impl NotificationRecord {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expire_at <= now
    }

    pub fn is_active(&self) -> bool {
        self.active_handle.is_some()
    }

    /// Compares everything that survives a reload.
    pub fn same_persisted_state(&self, other: &NotificationRecord) -> bool {
        self.key == other.key
            && self.message == other.message
            && self.severity == other.severity
            && self.shown_at == other.shown_at
            && self.expire_at == other.expire_at
    }
}
