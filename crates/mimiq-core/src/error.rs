//! Error types shared by every mimiq crate.
//!
//! Single-item operations fail closed: an error means nothing was mutated.
//! Batch operations never surface these directly per item; see
//! [`crate::batch`].

use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, MimiqError>;

/// All failure kinds the engines can return.
#[derive(Debug, Error)]
pub enum MimiqError {
    /// Queue, schedule, or message does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Create collided with an existing queue/schedule of different shape.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Receipt handle is no longer the current one for its message
    /// (redelivered under a new handle, or the message is gone).
    #[error("receipt handle expired: {0}")]
    HandleExpired(String),

    /// Message body exceeds the queue's size limit.
    #[error("payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Schedule time is not strictly in the future.
    #[error("scheduled time is in the past: {0}")]
    InPast(String),

    /// Malformed interval, timeout, batch, or other argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying SQLite store failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl MimiqError {
    /// Stable machine-readable name for the error kind, used in batch
    /// failure entries and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            MimiqError::NotFound(_) => "NotFound",
            MimiqError::AlreadyExists(_) => "AlreadyExists",
            MimiqError::HandleExpired(_) => "HandleExpired",
            MimiqError::PayloadTooLarge { .. } => "PayloadTooLarge",
            MimiqError::InPast(_) => "InPast",
            MimiqError::InvalidArgument(_) => "InvalidArgument",
            MimiqError::StoreUnavailable(_) => "StoreUnavailable",
        }
    }
}

impl From<rusqlite::Error> for MimiqError {
    fn from(e: rusqlite::Error) -> Self {
        MimiqError::StoreUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(MimiqError::NotFound("q".into()).kind(), "NotFound");
        assert_eq!(
            MimiqError::PayloadTooLarge { size: 10, limit: 5 }.kind(),
            "PayloadTooLarge"
        );
    }

    #[test]
    fn test_sqlite_error_maps_to_store_unavailable() {
        let e: MimiqError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(e.kind(), "StoreUnavailable");
    }
}
