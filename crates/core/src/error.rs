use thiserror::Error;

/// Errors surfaced by the read paths of a [`crate::sink::DurableStore`].
///
/// Write-path (`event`) failures are never returned to callers (see the
/// propagation policy in the design doc); they are only observable through
/// [`crate::metrics::AuditMetrics`].
#[derive(Debug, Error)]
pub enum AuditError {
    /// The underlying storage engine reported an I/O failure.
    #[error("audit storage error: {0}")]
    Storage(String),

    /// `details` or a stored row could not be (de)serialized as JSON.
    #[error("audit serialization error: {0}")]
    Serialization(String),

    /// The sink does not implement the requested read operation (e.g. the
    /// ring sink does not support `query_logs_filtered`).
    #[error("operation not supported by this sink")]
    NotSupported,

    /// A requested anchor or row does not exist.
    #[error("not found")]
    NotFound,

    /// `verify_chain` / `verify_from_anchor` found a row whose stored hash
    /// disagrees with the recomputed hash.
    #[error(
        "chain mismatch at index {index} (seq {seq}): stored {stored}, expected {expected}"
    )]
    ChainMismatch {
        /// Zero-based position within the verified range.
        index: u64,
        /// The row's sequence number.
        seq: i64,
        /// The hash as stored in the row.
        stored: String,
        /// The hash recomputed from the row's fields and the prior hash.
        expected: String,
    },

    /// The read operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
