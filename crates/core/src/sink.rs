use async_trait::async_trait;
use serde_json::Value;

use crate::context::AuditContext;
use crate::error::AuditError;
use crate::record::{Anchor, AuditPage, AuditQuery, EventRecord, IntegrityExport};

/// The single-method capability every audit sink satisfies.
///
/// Business services hold an `Arc<dyn Sink>` and call `event` without
/// knowing whether it is wired directly to a durable store, an async
/// buffer, a metrics decorator, or a fan-out to several of the above. Sinks
/// compose by wrapping a value, never by inheritance.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Record one event. This is a fire-and-forget contract: the sink
    /// returns no value and signals problems only through metrics.
    ///
    /// `ctx.request_id` is stored verbatim as the row's `request_id`;
    /// `ctx.cancellation` is not consulted here (writes are not cancellable
    /// once accepted).
    async fn event(&self, ctx: &AuditContext, tenant_id: &str, action: &str, actor: &str, object: &str, details: Value);

    /// Drain and release any buffering this sink owns (e.g. an async
    /// worker pool's queue). Sinks with nothing to drain return immediately.
    /// Decorators forward this to their inner sink.
    async fn close(&self) {}
}

/// A [`Sink`] that also persists and can be queried: the append-only log
/// plus its anchor checkpoints.
///
/// Implemented by `vaultlog-memory` and `vaultlog-postgres`. Decorators in
/// [`crate::composition`] forward these methods to their inner store when
/// it implements `DurableStore`; sinks that cannot support querying (the
/// ring sink, a bare stdout sink) simply do not implement this trait, and
/// callers at the HTTP boundary translate that absence into `501`.
#[async_trait]
pub trait DurableStore: Sink {
    /// Total row count.
    async fn count(&self, ctx: &AuditContext) -> Result<i64, AuditError>;

    /// Most recent `limit` rows, newest first (`seq DESC`).
    async fn list_recent(&self, ctx: &AuditContext, limit: i64) -> Result<Vec<EventRecord>, AuditError>;

    /// Paginated, filtered query over one tenant. See [`AuditQuery`] for the
    /// clamping rules applied to `limit`/`offset`.
    async fn query_logs_filtered(&self, ctx: &AuditContext, query: &AuditQuery) -> Result<AuditPage, AuditError>;

    /// All anchors, ascending by `seq`.
    async fn list_anchors(&self, ctx: &AuditContext) -> Result<Vec<Anchor>, AuditError>;

    /// Recompute the chain from the retained baseline and compare against
    /// stored hashes.
    async fn verify_chain(&self, ctx: &AuditContext) -> Result<(), AuditError>;

    /// Recompute the chain starting at `anchor_seq`, using the row at
    /// `anchor_seq - 1` (or the empty prefix if `anchor_seq` is the
    /// retained baseline) as the verification's previous hash.
    async fn verify_from_anchor(&self, ctx: &AuditContext, anchor_seq: i64) -> Result<(), AuditError>;

    /// Assemble a (optionally signed) integrity snapshot.
    async fn export_integrity(&self, ctx: &AuditContext, anchor_limit: i64) -> Result<IntegrityExport, AuditError>;
}
