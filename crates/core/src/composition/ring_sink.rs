//! Bounded in-memory ring sink for tests and ephemeral deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::AuditContext;
use crate::sink::Sink;

/// One entry recorded by [`InMemoryRingSink`]. Deliberately not
/// [`crate::record::EventRecord`]: the ring sink assigns no `seq` and
/// computes no chain hash, so its entries are not chain-verifiable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingEntry {
    pub ts: DateTime<Utc>,
    pub tenant_id: String,
    pub action: String,
    pub actor: String,
    pub object: String,
    pub details: Value,
}

/// Append-only bounded buffer of the last `capacity` events. On overflow,
/// the oldest entry is evicted. Supports a point-in-time `list()` snapshot
/// and `clear()`. No chain, no persistence, no retention policy — intended
/// for local development and test fixtures, not as a durable backend.
///
/// Uses the same hasher as the durable stores, so even this ephemeral
/// buffer never holds a raw actor/object string: `new` takes the same
/// pseudonymization secrets as [`crate::record`]'s durable backends, and an
/// empty secret list falls back to the shared `[redacted]` sentinel.
pub struct InMemoryRingSink {
    capacity: usize,
    hasher: Option<vaultlog_crypto::SecretSet>,
    entries: Mutex<std::collections::VecDeque<RingEntry>>,
}

impl InMemoryRingSink {
    /// `capacity` is clamped to `>= 1`. `hash_secrets` is the active-key-first
    /// pseudonymization key set; empty means identifiers are stored as the
    /// literal `[redacted]`.
    #[must_use]
    pub fn new(capacity: usize, hash_secrets: Vec<Vec<u8>>) -> Self {
        let hasher = (!hash_secrets.is_empty()).then(|| vaultlog_crypto::SecretSet::new(hash_secrets));
        Self {
            capacity: capacity.max(1),
            hasher,
            entries: Mutex::new(std::collections::VecDeque::new()),
        }
    }

    fn pseudonymize(&self, raw: &str) -> String {
        match &self.hasher {
            Some(set) => set.hash(raw),
            None => crate::record::REDACTED.to_owned(),
        }
    }

    /// Snapshot of currently buffered entries, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<RingEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Discard all buffered entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[async_trait]
impl Sink for InMemoryRingSink {
    async fn event(&self, _ctx: &AuditContext, tenant_id: &str, action: &str, actor: &str, object: &str, details: Value) {
        let entry = RingEntry {
            ts: Utc::now(),
            tenant_id: tenant_id.to_owned(),
            action: action.to_owned(),
            actor: self.pseudonymize(actor),
            object: self.pseudonymize(object),
            details,
        };
        let mut guard = self.entries.lock();
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evicts_oldest_on_overflow() {
        let ring = InMemoryRingSink::new(3, vec![]);
        let ctx = AuditContext::default();
        for i in 0..5 {
            ring.event(&ctx, "t", "ACTION", "a", "o", serde_json::json!({"i": i})).await;
        }
        let entries = ring.list();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].details, serde_json::json!({"i": 2}));
        assert_eq!(entries[2].details, serde_json::json!({"i": 4}));
    }

    #[tokio::test]
    async fn clear_empties_the_buffer() {
        let ring = InMemoryRingSink::new(10, vec![]);
        ring.event(&AuditContext::default(), "t", "ACTION", "a", "o", Value::Null).await;
        ring.clear();
        assert!(ring.list().is_empty());
    }

    #[tokio::test]
    async fn pseudonymizes_actor_and_object_like_the_durable_stores() {
        let ring = InMemoryRingSink::new(10, vec![b"secret".to_vec()]);
        ring.event(&AuditContext::default(), "t", "ACTION", "alice", "net-1", Value::Null).await;
        let entry = &ring.list()[0];
        assert_ne!(entry.actor, "alice");
        assert_ne!(entry.object, "net-1");
        assert_eq!(entry.actor, vaultlog_crypto::hash_with(b"secret", "alice"));
    }

    #[tokio::test]
    async fn redacts_when_no_secrets_configured() {
        let ring = InMemoryRingSink::new(10, vec![]);
        ring.event(&AuditContext::default(), "t", "ACTION", "alice", "net-1", Value::Null).await;
        let entry = &ring.list()[0];
        assert_eq!(entry.actor, crate::record::REDACTED);
    }
}
