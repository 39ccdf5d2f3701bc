use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;
use vaultlog_core::chain::{self, compute_chain_hash, format_ts};
use vaultlog_core::context::run_cancellable;
use vaultlog_core::{
    Anchor, AuditContext, AuditError, AuditFilter, AuditMetrics, AuditPage, AuditQuery, ChainHead, DurableStore,
    EventRecord, IntegrityExport, RetentionPolicy, RetentionStats, Sink,
};
use vaultlog_crypto::SecretSet;

use crate::config::MemoryStoreConfig;

struct State {
    rows: Vec<EventRecord>,
    anchors: Vec<Anchor>,
    next_seq: i64,
}

impl State {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            anchors: Vec::new(),
            next_seq: 1,
        }
    }
}

/// In-process, order-preserving [`DurableStore`].
///
/// All mutation and chain-extending reads go through a single
/// `parking_lot::Mutex<State>`, which is how single-writer discipline is
/// enforced here (the Postgres backend uses a `tokio::sync::Mutex` over the
/// same read-head/write/anchor/prune sequence for the same reason).
pub struct MemoryDurableStore {
    state: Mutex<State>,
    hasher: Option<SecretSet>,
    retention: RetentionPolicy,
    anchor_interval: u64,
    metrics: std::sync::Arc<AuditMetrics>,
}

impl MemoryDurableStore {
    #[must_use]
    pub fn new(config: MemoryStoreConfig, metrics: std::sync::Arc<AuditMetrics>) -> Self {
        let hasher = (!config.hash_secrets.is_empty()).then(|| SecretSet::new(config.hash_secrets));
        Self {
            state: Mutex::new(State::new()),
            hasher,
            retention: config.retention,
            anchor_interval: config.anchor_interval,
            metrics,
        }
    }

    fn pseudonymize(&self, raw: &str) -> String {
        match &self.hasher {
            Some(set) => set.hash(raw),
            None => vaultlog_core::record::REDACTED.to_owned(),
        }
    }
}

fn apply_retention(rows: &mut Vec<EventRecord>, anchors: &mut Vec<Anchor>, policy: &RetentionPolicy) -> RetentionStats {
    let mut rows_pruned = 0u64;

    if let Some(max_rows) = policy.row_bound() {
        let max_rows = (max_rows as usize).max(1);
        while rows.len() > max_rows {
            rows.remove(0);
            rows_pruned += 1;
        }
    }

    if let Some(max_age) = policy.age_bound() {
        if let Ok(max_age) = chrono::Duration::from_std(max_age) {
            let cutoff = Utc::now() - max_age;
            while rows.len() > 1 && rows[0].ts < cutoff {
                rows.remove(0);
                rows_pruned += 1;
            }
        }
    }

    let earliest_seq = rows.first().map_or(i64::MAX, |r| r.seq);
    let before = anchors.len();
    anchors.retain(|a| a.seq >= earliest_seq);
    let anchors_pruned = (before - anchors.len()) as u64;

    RetentionStats {
        rows_pruned,
        anchors_pruned,
    }
}

#[async_trait]
impl Sink for MemoryDurableStore {
    async fn event(&self, ctx: &AuditContext, tenant_id: &str, action: &str, actor: &str, object: &str, details: Value) {
        let start = Instant::now();
        let ts = Utc::now();
        let formatted_ts = format_ts(ts);
        let stored_actor = self.pseudonymize(actor);
        let stored_object = self.pseudonymize(object);
        let canonical_details = vaultlog_core::canonical::canonicalize(&details);
        let request_id = ctx.request_id.clone();

        let mut state = self.state.lock();
        let prev_hash = state.rows.last().map_or_else(String::new, |r| r.chain_hash.clone());
        let chain_hash = compute_chain_hash(
            &prev_hash,
            &formatted_ts,
            tenant_id,
            action,
            &stored_actor,
            &stored_object,
            &canonical_details,
            &request_id,
        );
        let seq = state.next_seq;
        state.next_seq += 1;

        let row = EventRecord {
            seq,
            ts,
            tenant_id: tenant_id.to_owned(),
            action: action.to_owned(),
            actor: stored_actor,
            object: stored_object,
            details,
            request_id,
            chain_hash: chain_hash.clone(),
        };
        state.rows.push(row);
        self.metrics.record_chain_head_advance();

        if self.anchor_interval > 0 && (seq as u64) % self.anchor_interval == 0 {
            state.anchors.push(Anchor { seq, ts, chain_hash });
            self.metrics.record_anchor();
        }

        let stats = apply_retention(&mut state.rows, &mut state.anchors, &self.retention);
        drop(state);

        self.metrics.record_evictions("memory_rows", stats.rows_pruned);
        self.metrics.record_evictions("memory_anchors", stats.anchors_pruned);
        self.metrics
            .observe_insert("memory", "ok", start.elapsed());
    }
}

fn matches_filter(filter: &AuditFilter, row: &EventRecord) -> bool {
    if let Some(actor) = &filter.actor {
        if &row.actor != actor {
            return false;
        }
    }
    if let Some(action) = &filter.action {
        if &row.action != action {
            return false;
        }
    }
    if let Some(object_type) = &filter.object_type {
        let matches = row
            .details
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t == object_type);
        if !matches {
            return false;
        }
    }
    if let Some(from) = filter.from {
        if row.ts < from {
            return false;
        }
    }
    if let Some(to) = filter.to {
        if row.ts > to {
            return false;
        }
    }
    true
}

#[async_trait]
impl DurableStore for MemoryDurableStore {
    async fn count(&self, ctx: &AuditContext) -> Result<i64, AuditError> {
        run_cancellable(ctx, async { Ok(self.state.lock().rows.len() as i64) }).await
    }

    async fn list_recent(&self, ctx: &AuditContext, limit: i64) -> Result<Vec<EventRecord>, AuditError> {
        run_cancellable(ctx, async {
            let limit = limit.max(0) as usize;
            let state = self.state.lock();
            Ok(state.rows.iter().rev().take(limit).cloned().collect())
        })
        .await
    }

    async fn query_logs_filtered(&self, ctx: &AuditContext, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        run_cancellable(ctx, async {
            let state = self.state.lock();
            let mut matching: Vec<&EventRecord> = state
                .rows
                .iter()
                .filter(|r| r.tenant_id == query.tenant_id && matches_filter(&query.filter, r))
                .collect();
            matching.sort_by(|a, b| b.seq.cmp(&a.seq));

            let total = matching.len() as i64;
            let offset = query.effective_offset() as usize;
            let limit = query.effective_limit() as usize;
            let records: Vec<EventRecord> = matching.into_iter().skip(offset).take(limit).cloned().collect();
            drop(state);

            Ok(AuditPage { records, total })
        })
        .await
    }

    async fn list_anchors(&self, ctx: &AuditContext) -> Result<Vec<Anchor>, AuditError> {
        run_cancellable(ctx, async { Ok(self.state.lock().anchors.clone()) }).await
    }

    async fn verify_chain(&self, ctx: &AuditContext) -> Result<(), AuditError> {
        let start = Instant::now();
        run_cancellable(ctx, async {
            let state = self.state.lock();
            let result = chain::verify_sequence(&state.rows);
            drop(state);
            let status = if result.is_ok() { "ok" } else { "mismatch" };
            if let Err(err) = &result {
                warn!(?err, "audit chain verification failed");
            }
            self.metrics.observe_verification(status, start.elapsed());
            result
        })
        .await
    }

    async fn verify_from_anchor(&self, ctx: &AuditContext, anchor_seq: i64) -> Result<(), AuditError> {
        let start = Instant::now();
        run_cancellable(ctx, async {
            let state = self.state.lock();
            let idx = state
                .rows
                .iter()
                .position(|r| r.seq == anchor_seq)
                .ok_or(AuditError::NotFound)?;
            let prev_hash = if idx == 0 {
                String::new()
            } else {
                state.rows[idx - 1].chain_hash.clone()
            };
            let result = chain::verify_from(&prev_hash, &state.rows[idx..]);
            drop(state);
            let status = if result.is_ok() { "ok" } else { "mismatch" };
            if let Err(err) = &result {
                warn!(?err, anchor_seq, "audit chain verification from anchor failed");
            }
            self.metrics.observe_verification(status, start.elapsed());
            result
        })
        .await
    }

    async fn export_integrity(&self, ctx: &AuditContext, anchor_limit: i64) -> Result<IntegrityExport, AuditError> {
        let start = Instant::now();
        run_cancellable(ctx, async {
            let anchor_limit = anchor_limit.clamp(1, 500) as usize;
            let state = self.state.lock();
            let Some(head_row) = state.rows.last() else {
                return Err(AuditError::NotFound);
            };
            let head = ChainHead {
                seq: head_row.seq,
                hash: head_row.chain_hash.clone(),
                ts: head_row.ts,
            };
            let latest_seq = head_row.seq;
            let earliest_seq = state.rows.first().map_or(0, |r| r.seq);
            let anchors: Vec<Anchor> = state
                .anchors
                .iter()
                .rev()
                .take(anchor_limit)
                .rev()
                .copied()
                .collect();
            drop(state);

            let export = IntegrityExport {
                head,
                anchors,
                latest_seq,
                earliest_seq,
                generated_at: Utc::now(),
                kid: None,
                signature: None,
            };
            self.metrics.observe_integrity_export(start.elapsed());
            Ok(export)
        })
        .await
    }
}

// Signing is layered on top by the caller (vaultlog-server), which knows
// about the configured `vaultlog_crypto::Signer`; this crate only produces
// the unsigned export so it stays independent of key material.

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx() -> AuditContext {
        AuditContext::default()
    }

    fn store() -> MemoryDurableStore {
        MemoryDurableStore::new(
            MemoryStoreConfig {
                retention: RetentionPolicy::none(),
                anchor_interval: 2,
                hash_secrets: vec![b"secret-a".to_vec()],
            },
            Arc::new(AuditMetrics::new()),
        )
    }

    #[tokio::test]
    async fn two_events_one_anchor_chain_verifies() {
        let store = store();
        let ctx = ctx();
        store
            .event(&ctx, "t1", "NETWORK_CREATED", "alice", "net-1", serde_json::json!({"foo": "bar"}))
            .await;
        store
            .event(&ctx, "t1", "IP_ALLOCATED", "alice", "net-1", serde_json::json!({"ip": "10.0.0.2"}))
            .await;

        assert_eq!(store.count(&ctx).await.unwrap(), 2);
        let anchors = store.list_anchors(&ctx).await.unwrap();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].seq, 2);
        assert!(store.verify_chain(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn tampering_a_row_breaks_verify_from_anchor() {
        let store = MemoryDurableStore::new(
            MemoryStoreConfig {
                retention: RetentionPolicy::none(),
                anchor_interval: 1,
                hash_secrets: vec![],
            },
            Arc::new(AuditMetrics::new()),
        );
        let ctx = ctx();
        store.event(&ctx, "t1", "A", "a", "o", Value::Null).await;
        store.event(&ctx, "t1", "B", "a", "o", Value::Null).await;
        {
            let mut state = store.state.lock();
            let idx = state.rows.len() - 1;
            state.rows[idx].chain_hash = "deadbeef".to_owned();
        }
        let err = store.verify_from_anchor(&ctx, 2).await.unwrap_err();
        assert!(matches!(err, AuditError::ChainMismatch { seq: 2, .. }));
    }

    #[tokio::test]
    async fn pseudonymization_is_stable_per_secret_and_redacted_without_one() {
        let hashed = store();
        let ctx = ctx();
        hashed.event(&ctx, "t1", "A", "alice", "o", Value::Null).await;
        let row = &hashed.list_recent(&ctx, 1).await.unwrap()[0];
        assert_ne!(row.actor, "alice");

        let plain = MemoryDurableStore::new(
            MemoryStoreConfig {
                retention: RetentionPolicy::none(),
                anchor_interval: 0,
                hash_secrets: vec![],
            },
            Arc::new(AuditMetrics::new()),
        );
        plain.event(&ctx, "t1", "A", "alice", "o", Value::Null).await;
        assert_eq!(plain.list_recent(&ctx, 1).await.unwrap()[0].actor, vaultlog_core::record::REDACTED);
    }

    #[tokio::test]
    async fn request_id_is_propagated_from_context() {
        let store = store();
        store
            .event(&AuditContext::with_request_id("req-42"), "t1", "A", "a", "o", Value::Null)
            .await;
        let row = &store.list_recent(&ctx(), 1).await.unwrap()[0];
        assert_eq!(row.request_id, "req-42");
    }

    #[tokio::test]
    async fn row_count_retention_never_drops_the_head() {
        let store = MemoryDurableStore::new(
            MemoryStoreConfig {
                retention: RetentionPolicy::max_rows(2),
                anchor_interval: 0,
                hash_secrets: vec![],
            },
            Arc::new(AuditMetrics::new()),
        );
        let ctx = ctx();
        for i in 0..5 {
            store
                .event(&ctx, "t1", "A", "a", "o", serde_json::json!({"i": i}))
                .await;
        }
        assert_eq!(store.count(&ctx).await.unwrap(), 2);
        let recent = store.list_recent(&ctx, 10).await.unwrap();
        assert_eq!(recent[0].seq, 5);
        assert!(store.verify_chain(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn query_filters_by_tenant_and_action() {
        let store = store();
        let ctx = ctx();
        store.event(&ctx, "t1", "A", "a", "o", Value::Null).await;
        store.event(&ctx, "t2", "A", "a", "o", Value::Null).await;
        store.event(&ctx, "t1", "B", "a", "o", Value::Null).await;

        let page = store
            .query_logs_filtered(
                &ctx,
                &AuditQuery {
                    tenant_id: "t1".to_owned(),
                    filter: AuditFilter {
                        action: Some("A".to_owned()),
                        ..Default::default()
                    },
                    limit: None,
                    offset: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].action, "A");
        assert_eq!(page.records[0].tenant_id, "t1");
    }

    #[tokio::test]
    async fn export_integrity_reports_head_and_bounds() {
        let store = store();
        let ctx = ctx();
        store.event(&ctx, "t1", "A", "a", "o", Value::Null).await;
        store.event(&ctx, "t1", "B", "a", "o", Value::Null).await;
        let export = store.export_integrity(&ctx, 20).await.unwrap();
        assert_eq!(export.head.seq, 2);
        assert_eq!(export.latest_seq, 2);
        assert_eq!(export.earliest_seq, 1);
        assert_eq!(export.anchors.len(), 1);
    }

    #[tokio::test]
    async fn export_integrity_on_empty_store_is_not_found() {
        let store = store();
        assert!(matches!(store.export_integrity(&ctx(), 20).await, Err(AuditError::NotFound)));
    }

    #[tokio::test]
    async fn cancelled_context_aborts_a_read() {
        let store = store();
        let ctx = ctx();
        store.event(&ctx, "t1", "A", "a", "o", Value::Null).await;
        ctx.cancellation.cancel();
        assert!(matches!(store.count(&ctx).await, Err(AuditError::Cancelled)));
    }
}
