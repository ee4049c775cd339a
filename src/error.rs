//! Error type for the knowledge store.

use thiserror::Error;

use crate::knowledge::index::DriftReport;
use crate::knowledge::types::EntityKind;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Input rejected before any storage attempt.
    #[error("invalid {field}: {message}")]
    ValidationFailed {
        field: &'static str,
        message: String,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    /// The store stayed locked through every retry.
    #[error("storage unavailable after {attempts} attempts, try again later: {source}")]
    StorageUnavailable {
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("malformed search query {query:?}: {reason}")]
    MalformedQuery { query: String, reason: String },

    #[error(
        "text index for {} has drifted: {} orphaned, {} missing, {} stale postings",
        .0.kind,
        .0.orphaned.len(),
        .0.missing.len(),
        .0.stale.len()
    )]
    IndexDrift(DriftReport),

    /// A composite step needed an entity id no earlier step produced.
    #[error("composite step {0:?} ran before its entity existed")]
    StepOrder(&'static str),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field,
            message: message.into(),
        }
    }

    /// Lock contention that is expected to clear on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(err) => is_busy(err),
            _ => false,
        }
    }
}

/// `SQLITE_BUSY` / `SQLITE_LOCKED`, including an expired busy timeout.
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
