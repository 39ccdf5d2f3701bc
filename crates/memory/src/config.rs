use vaultlog_core::RetentionPolicy;

/// Construction-time configuration for [`crate::MemoryDurableStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreConfig {
    /// Global retention bounds applied synchronously after every insert.
    pub retention: RetentionPolicy,
    /// Insert an anchor every `anchor_interval`-th sequence number.
    /// `0` disables anchoring entirely.
    pub anchor_interval: u64,
    /// Pseudonymization secrets, active key first. Empty means identifiers
    /// are stored as the literal `[redacted]`.
    pub hash_secrets: Vec<Vec<u8>>,
}
