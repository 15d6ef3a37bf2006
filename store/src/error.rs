use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A write-once record already exists.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The call did not finish within the caller's bound. The backend may
    /// still complete it.
    #[error("{op} timed out after {after_ms}ms")]
    Timeout { op: &'static str, after_ms: u64 },
}
