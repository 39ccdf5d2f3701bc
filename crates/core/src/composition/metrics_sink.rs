//! Decorator that observes [`AuditMetrics`] around any inner [`Sink`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::AuditContext;
use crate::error::AuditError;
use crate::metrics::AuditMetrics;
use crate::record::{Anchor, AuditPage, AuditQuery, EventRecord, IntegrityExport};
use crate::sink::{DurableStore, Sink};

/// Wraps any [`Sink`] and increments `audit_events_total{action}` after each
/// call completes. Insert latency and failure reasons are observed inside
/// the durable store itself, not here, so that those labels stay specific
/// to the backend that produced them.
pub struct MetricsSink<S> {
    inner: Arc<S>,
    metrics: Arc<AuditMetrics>,
}

impl<S> MetricsSink<S> {
    #[must_use]
    pub fn new(inner: Arc<S>, metrics: Arc<AuditMetrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl<S: Sink> Sink for MetricsSink<S> {
    async fn event(&self, ctx: &AuditContext, tenant_id: &str, action: &str, actor: &str, object: &str, details: Value) {
        self.inner.event(ctx, tenant_id, action, actor, object, details).await;
        self.metrics.record_event(action);
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

#[async_trait]
impl<S: DurableStore> DurableStore for MetricsSink<S> {
    async fn count(&self, ctx: &AuditContext) -> Result<i64, AuditError> {
        self.inner.count(ctx).await
    }

    async fn list_recent(&self, ctx: &AuditContext, limit: i64) -> Result<Vec<EventRecord>, AuditError> {
        self.inner.list_recent(ctx, limit).await
    }

    async fn query_logs_filtered(&self, ctx: &AuditContext, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        self.inner.query_logs_filtered(ctx, query).await
    }

    async fn list_anchors(&self, ctx: &AuditContext) -> Result<Vec<Anchor>, AuditError> {
        self.inner.list_anchors(ctx).await
    }

    async fn verify_chain(&self, ctx: &AuditContext) -> Result<(), AuditError> {
        self.inner.verify_chain(ctx).await
    }

    async fn verify_from_anchor(&self, ctx: &AuditContext, anchor_seq: i64) -> Result<(), AuditError> {
        self.inner.verify_from_anchor(ctx, anchor_seq).await
    }

    async fn export_integrity(&self, ctx: &AuditContext, anchor_limit: i64) -> Result<IntegrityExport, AuditError> {
        self.inner.export_integrity(ctx, anchor_limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Sink for NoopSink {
        async fn event(&self, _: &AuditContext, _: &str, _: &str, _: &str, _: &str, _: Value) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn increments_events_total_by_action() {
        let inner = Arc::new(NoopSink {
            calls: AtomicUsize::new(0),
        });
        let metrics = Arc::new(AuditMetrics::new());
        let sink = MetricsSink::new(inner.clone(), metrics.clone());
        let ctx = AuditContext::default();
        sink.event(&ctx, "t", "NETWORK_CREATED", "a", "o", Value::Null).await;
        sink.event(&ctx, "t", "NETWORK_CREATED", "a", "o", Value::Null).await;
        sink.event(&ctx, "t", "IP_ALLOCATED", "a", "o", Value::Null).await;

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        let snap = metrics.snapshot();
        assert_eq!(snap.events_total["NETWORK_CREATED"], 2);
        assert_eq!(snap.events_total["IP_ALLOCATED"], 1);
    }
}
