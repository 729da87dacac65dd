use thiserror::Error;

/// Failure modes of the storage layer.
///
/// None of these escape [`crate::store::Store`]'s public operations, which log
/// them and fall back to a default. Backends and the migration layer return
/// them directly.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no persistence medium is available")]
    StorageUnavailable,

    #[error("malformed record `{key}`: {reason}")]
    MalformedRecord { key: String, reason: String },

    #[error("malformed import document: {0}")]
    MalformedImportDocument(String),

    #[error("storage quota exceeded writing `{key}` ({needed} bytes, {available} available)")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub(crate) fn malformed(key: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::MalformedRecord {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
