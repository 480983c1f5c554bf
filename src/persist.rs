//! JSON layout of the persisted cache mirror.
//!
//! The mirror is a single JSON object keyed by notification key:
//!
//! ```json
//! {"high-priority-42": {"message": "...", "type": "error",
//!                       "shownAt": 0, "expireAt": 3600000, "toastId": null}}
//! ```
//!
//! Display handles never survive a reload, so `toastId` is always written as
//! null and ignored on read.

use std::collections::{BTreeMap, HashMap};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::ToastError;
use crate::types::{NotificationRecord, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry {
    pub message: String,
    #[serde(rename = "type", alias = "severity")]
    pub severity: Severity,
    #[serde(deserialize_with = "deserialize_millis")]
    pub shown_at: u64,
    #[serde(deserialize_with = "deserialize_millis")]
    pub expire_at: u64,
    #[serde(default, skip_deserializing)]
    pub toast_id: Option<u64>,
}

impl PersistedEntry {
    pub fn from_record(record: &NotificationRecord) -> Self {
        Self {
            message: record.message.clone(),
            severity: record.severity,
            shown_at: record.shown_at,
            expire_at: record.expire_at,
            toast_id: None,
        }
    }

    pub fn into_record(self, key: String) -> NotificationRecord {
        NotificationRecord {
            key,
            message: self.message,
            severity: self.severity,
            shown_at: self.shown_at,
            expire_at: self.expire_at,
            active_handle: None,
        }
    }
}

/// Browsers store `Date.now()` values that may come back as floats.
fn deserialize_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(ms) = number.as_u64() {
        return Ok(ms);
    }
    match number.as_f64() {
        Some(ms) if ms.is_finite() && ms >= 0.0 => Ok(ms as u64),
        _ => Err(D::Error::custom(format!("invalid timestamp: {}", number))),
    }
}

/// Result of decoding a mirror; entries that failed to parse are counted,
/// not fatal.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub entries: Vec<(String, PersistedEntry)>,
    pub skipped: usize,
}

impl Snapshot {
    pub fn decode(raw: &str) -> Result<Snapshot, ToastError> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)?;

        let mut snapshot = Snapshot::default();
        for (key, value) in object {
            match serde_json::from_value::<PersistedEntry>(value) {
                Ok(entry) if entry.expire_at > entry.shown_at => {
                    snapshot.entries.push((key, entry))
                }
                Ok(_) => {
                    warn!("Skipping persisted toast {}: expireAt not after shownAt", key);
                    snapshot.skipped += 1;
                }
                Err(e) => {
                    warn!("Skipping persisted toast {}: {}", key, e);
                    snapshot.skipped += 1;
                }
            }
        }
        Ok(snapshot)
    }

    pub fn encode(records: &HashMap<String, NotificationRecord>) -> Result<String, ToastError> {
        let ordered: BTreeMap<&str, PersistedEntry> = records
            .iter()
            .map(|(key, record)| (key.as_str(), PersistedEntry::from_record(record)))
            .collect();
        Ok(serde_json::to_string(&ordered)?)
    }
}
