/// Failures raised by a durable key/value storage provider
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage quota exceeded while writing {key} ({size} bytes)")]
    QuotaExceeded { key: String, size: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the notification cache and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum ToastError {
    #[error("Persistence unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("Malformed persisted state: {reason}")]
    MalformedPersistedState { reason: String },

    #[error("Invalid notification request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Timer facility unavailable: {reason}")]
    TimerUnavailable { reason: String },
}

impl ToastError {
    pub fn invalid_request<S: Into<String>>(reason: S) -> Self {
        ToastError::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        ToastError::MalformedPersistedState {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ToastError {
    fn from(err: serde_json::Error) -> Self {
        ToastError::malformed(err.to_string())
    }
}
