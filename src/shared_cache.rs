use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::ToastError;
use crate::persist::Snapshot;
use crate::storage::Storage;
use crate::types::{DisplayHandle, HandleId, NotificationRecord, Severity};

pub const DEFAULT_STORAGE_KEY: &str = "toastCache";

pub type Cache = HashMap<String, NotificationRecord>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Key the whole mirror is stored under
    pub storage_key: String,
    /// Minimum gap between two displays sharing a key
    pub min_interval: Duration,
    /// How long a record is kept after its latest display
    pub retention: Duration,
    pub sweep_interval: Duration,
    /// How long a toast stays on screen unless the caller says otherwise
    pub default_duration: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            min_interval: Duration::from_secs(30),
            retention: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60),
            default_duration: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Enabled,
    /// Storage failed; the mirror is no longer read or written this session
    MemoryOnly,
}

/// Key -> last-shown bookkeeping, mirrored write-through into [`Storage`].
pub struct ToastCache {
    records: Cache,
    storage: Box<dyn Storage>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    persistence: Persistence,
    /// Keys reserved but not yet attached, with the ids of any elements
    /// that closed in between
    attaching: HashMap<String, HashSet<HandleId>>,
}

impl ToastCache {
    pub fn new(storage: Box<dyn Storage>, clock: Arc<dyn Clock>, settings: CacheSettings) -> Self {
        Self {
            records: HashMap::new(),
            storage,
            clock,
            settings,
            persistence: Persistence::Enabled,
            attaching: HashMap::new(),
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn persistence(&self) -> Persistence {
        self.persistence
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&NotificationRecord> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &NotificationRecord> {
        self.records.values()
    }

    pub fn should_show(&self, key: &str, now: u64) -> bool {
        match self.records.get(key) {
            None => true,
            Some(record) if record.is_expired(now) => true,
            Some(record) => {
                now.saturating_sub(record.shown_at) > self.settings.min_interval.as_millis() as u64
            }
        }
    }

    /// Claims the display slot for `key` if the suppression window allows
    /// it. The record is written before anything is rendered, so a second
    /// caller racing on the same key sees it and backs off.
    pub fn reserve(&mut self, key: &str, message: &str, severity: Severity) -> bool {
        let now = self.now();
        if !self.should_show(key, now) {
            debug!(
                "Suppressing toast {}: shown within the last {:?}",
                key, self.settings.min_interval
            );
            return false;
        }

        // A zero retention would break expire_at > shown_at
        let retention = (self.settings.retention.as_millis() as u64).max(1);
        self.records.insert(
            key.to_string(),
            NotificationRecord {
                key: key.to_string(),
                message: message.to_string(),
                severity,
                shown_at: now,
                expire_at: now.saturating_add(retention),
                active_handle: None,
            },
        );
        self.attaching.entry(key.to_string()).or_default();

        self.persist();
        true
    }

    /// Attaches the on-screen element to a freshly reserved record. An
    /// element that already closed while being rendered is not attached.
    pub fn attach_handle(&mut self, key: &str, handle: DisplayHandle) -> bool {
        let closed_early = self
            .attaching
            .remove(key)
            .is_some_and(|closed| closed.contains(&handle.id()));
        if closed_early {
            debug!("Toast {} closed before its handle was attached", key);
            return false;
        }

        match self.records.get_mut(key) {
            Some(record) if record.active_handle.is_none() => {
                record.active_handle = Some(handle);
                true
            }
            _ => false,
        }
    }

    /// Called when an element closes on its own. Only clears the handle if
    /// it still belongs to that element; a newer display keeps its handle.
    pub fn clear_handle(&mut self, key: &str, id: HandleId) -> bool {
        let cleared = match self.records.get_mut(key) {
            Some(record) if record.active_handle.as_ref().map(|h| h.id()) == Some(id) => {
                record.active_handle = None;
                true
            }
            _ => {
                if let Some(closed) = self.attaching.get_mut(key) {
                    closed.insert(id);
                }
                false
            }
        };
        if cleared {
            self.persist();
        }
        cleared
    }

    /// Detaches the active handle so the caller can hide it.
    pub fn take_handle(&mut self, key: &str) -> Option<DisplayHandle> {
        let handle = self.records.get_mut(key)?.active_handle.take()?;
        self.persist();
        Some(handle)
    }

    /// Reconstructs non-expired records from the mirror. Records already in
    /// memory win over persisted ones, and expired in-memory records are
    /// dropped, so repeated calls converge on the same set.
    pub fn load_from_storage(&mut self) -> usize {
        let now = self.now();
        self.records.retain(|_, record| !record.is_expired(now));

        if self.persistence == Persistence::MemoryOnly {
            return 0;
        }

        let raw = match self.storage.get(&self.settings.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return 0,
            Err(e) => {
                self.degrade(&ToastError::from(e));
                return 0;
            }
        };

        let snapshot = match Snapshot::decode(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring persisted toast cache: {}", e);
                return 0;
            }
        };

        let mut loaded = 0;
        for (key, entry) in snapshot.entries {
            if now >= entry.expire_at || self.records.contains_key(&key) {
                continue;
            }
            self.records.insert(key.clone(), entry.into_record(key));
            loaded += 1;
        }

        info!(
            "Loaded {} toast record(s) from storage ({} malformed skipped)",
            loaded, snapshot.skipped
        );
        loaded
    }

    /// Removes every record with `expire_at <= now`.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));

        let removed = before - self.records.len();
        if removed > 0 {
            debug!("Swept {} expired toast record(s)", removed);
            self.persist();
        }
        removed
    }

    /// Write-through of the whole mapping. Failures switch the cache to
    /// memory-only; they never reach the caller.
    pub fn persist(&mut self) {
        if self.persistence == Persistence::MemoryOnly {
            return;
        }

        let encoded = match Snapshot::encode(&self.records) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Failed to encode toast cache: {}", e);
                return;
            }
        };

        if let Err(e) = self.storage.set(&self.settings.storage_key, &encoded) {
            self.degrade(&ToastError::from(e));
        }
    }

    fn degrade(&mut self, err: &ToastError) {
        warn!("{}; continuing with an in-memory toast cache", err);
        self.persistence = Persistence::MemoryOnly;
    }
}
