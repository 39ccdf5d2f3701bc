use std::time::Duration;

use vaultlog_core::RetentionPolicy;

/// Configuration for [`crate::PostgresDurableStore`].
pub struct PostgresStoreConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Global retention bounds applied synchronously after every insert, and
    /// again on the background sweep interval as defense-in-depth.
    pub retention: RetentionPolicy,
    /// Insert an anchor every `anchor_interval`-th sequence number. `0`
    /// disables anchoring.
    pub anchor_interval: u64,
    /// Pseudonymization secrets, active key first. Empty means identifiers
    /// are stored as the literal `[redacted]`.
    pub hash_secrets: Vec<Vec<u8>>,
    /// Background retention sweep interval. `None` disables the background
    /// sweep; the synchronous per-insert pass still runs.
    pub cleanup_interval: Option<Duration>,
}

impl PostgresStoreConfig {
    /// Minimal configuration: no retention, no anchoring, no pseudonymization.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retention: RetentionPolicy::none(),
            anchor_interval: 0,
            hash_secrets: Vec::new(),
            cleanup_interval: Some(Duration::from_secs(3600)),
        }
    }

    #[must_use]
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    #[must_use]
    pub fn with_anchor_interval(mut self, anchor_interval: u64) -> Self {
        self.anchor_interval = anchor_interval;
        self
    }

    #[must_use]
    pub fn with_hash_secrets(mut self, hash_secrets: Vec<Vec<u8>>) -> Self {
        self.hash_secrets = hash_secrets;
        self
    }

    #[must_use]
    pub fn with_cleanup_interval(mut self, interval: Option<Duration>) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
