//! Bounded-queue async auditor with worker supervision.
//!
//! Decouples event producers from sink latency without unbounded
//! buffering. Reads bypass the queue entirely and are forwarded straight to
//! the inner store when it implements [`DurableStore`] — only the write
//! path (`event`) is asynchronous.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::context::AuditContext;
use crate::error::AuditError;
use crate::metrics::AuditMetrics;
use crate::record::{Anchor, AuditPage, AuditQuery, EventRecord, IntegrityExport};
use crate::sink::{DurableStore, Sink};

/// Configuration for [`AsyncAuditor`].
#[derive(Debug, Clone, Copy)]
pub struct AsyncAuditorConfig {
    /// Bounded channel capacity. Clamped to `>= 1`.
    pub queue_size: usize,
    /// Number of concurrent worker tasks. Clamped to `>= 1`.
    pub workers: usize,
}

impl Default for AsyncAuditorConfig {
    fn default() -> Self {
        Self {
            queue_size: 1024,
            workers: 1,
        }
    }
}

struct QueuedEvent {
    ctx: AuditContext,
    tenant_id: String,
    action: String,
    actor: String,
    object: String,
    details: Value,
}

/// Wraps any [`Sink`] with a bounded queue and `W` supervised workers.
///
/// `W = 1` preserves producer-order delivery to the inner sink; `W > 1`
/// gives no cross-worker ordering guarantee (producers needing order must
/// use `W = 1`).
pub struct AsyncAuditor<S> {
    inner: Arc<S>,
    tx: SyncMutex<Option<mpsc::Sender<QueuedEvent>>>,
    queue_size: usize,
    metrics: Arc<AuditMetrics>,
    closed: AtomicBool,
    supervisors: SyncMutex<Vec<JoinHandle<()>>>,
}

impl<S: Sink + 'static> AsyncAuditor<S> {
    /// Spawn `config.workers` supervised worker tasks consuming a bounded
    /// channel of capacity `config.queue_size`, each invoking `inner.event`.
    #[must_use]
    pub fn new(inner: Arc<S>, config: AsyncAuditorConfig, metrics: Arc<AuditMetrics>) -> Arc<Self> {
        let queue_size = config.queue_size.max(1);
        let workers = config.workers.max(1);
        let (tx, rx) = mpsc::channel(queue_size);
        let rx = Arc::new(AsyncMutex::new(rx));

        let this = Arc::new(Self {
            inner,
            tx: SyncMutex::new(Some(tx)),
            queue_size,
            metrics,
            closed: AtomicBool::new(false),
            supervisors: SyncMutex::new(Vec::new()),
        });

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = rx.clone();
            let inner = this.inner.clone();
            let metrics = this.metrics.clone();
            handles.push(tokio::spawn(supervisor_loop(rx, inner, metrics)));
        }
        *this.supervisors.lock() = handles;
        this
    }
}

async fn supervisor_loop<S: Sink + 'static>(
    rx: Arc<AsyncMutex<mpsc::Receiver<QueuedEvent>>>,
    inner: Arc<S>,
    metrics: Arc<AuditMetrics>,
) {
    loop {
        let rx = rx.clone();
        let inner = inner.clone();
        match tokio::spawn(worker_loop(rx, inner)).await {
            Ok(()) => return,
            Err(join_err) if join_err.is_panic() => {
                warn!("audit async worker panicked, restarting");
                metrics.record_worker_restart();
                metrics.record_dropped("panic");
            }
            Err(_) => return, // task was cancelled (e.g. runtime shutting down)
        }
    }
}

async fn worker_loop<S: Sink + 'static>(rx: Arc<AsyncMutex<mpsc::Receiver<QueuedEvent>>>, inner: Arc<S>) {
    loop {
        let next = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        match next {
            Some(ev) => {
                inner
                    .event(&ev.ctx, &ev.tenant_id, &ev.action, &ev.actor, &ev.object, ev.details)
                    .await;
            }
            None => return,
        }
    }
}

#[async_trait]
impl<S: Sink + 'static> Sink for AsyncAuditor<S> {
    async fn event(&self, ctx: &AuditContext, tenant_id: &str, action: &str, actor: &str, object: &str, details: Value) {
        let tx = {
            let guard = self.tx.lock();
            guard.clone()
        };
        let Some(tx) = tx else {
            self.metrics.record_dropped("full");
            return;
        };
        let ev = QueuedEvent {
            ctx: ctx.clone(),
            tenant_id: tenant_id.to_owned(),
            action: action.to_owned(),
            actor: actor.to_owned(),
            object: object.to_owned(),
            details,
        };
        match tx.try_send(ev) {
            Ok(()) => {
                let current_len = self.queue_size.saturating_sub(tx.capacity());
                self.metrics.observe_queue_len(current_len as i64);
            }
            Err(_) => {
                self.metrics.record_dropped("full");
            }
        }
    }

    /// Stop accepting new events, drain the queue by letting the worker
    /// tasks finish consuming what was already enqueued, then return.
    ///
    /// Idempotent: a second call observes `closed` already set and returns
    /// immediately without waiting on the (already-resolved) drain.
    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the sender lets `recv()` return `None` once the
        // already-enqueued items are drained, which ends each worker loop.
        self.tx.lock().take();
        let handles = std::mem::take(&mut *self.supervisors.lock());
        for handle in handles {
            let _ = handle.await;
        }
        self.inner.close().await;
    }
}

#[async_trait]
impl<S: DurableStore + 'static> DurableStore for AsyncAuditor<S> {
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
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingSink {
        count: AtomicUsize,
    }

    #[async_trait]
    impl Sink for CountingSink {
        async fn event(&self, _: &AuditContext, _: &str, _: &str, _: &str, _: &str, _: Value) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct SlowSink;

    #[async_trait]
    impl Sink for SlowSink {
        async fn event(&self, _: &AuditContext, _: &str, _: &str, _: &str, _: &str, _: Value) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    struct PanicOnceSink {
        panicked: AtomicBool,
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl Sink for PanicOnceSink {
        async fn event(&self, _: &AuditContext, _: &str, _: &str, _: &str, _: &str, _: Value) {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("simulated panic on first event");
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn w1_preserves_producer_order_and_delivers_all() {
        let inner = Arc::new(CountingSink {
            count: AtomicUsize::new(0),
        });
        let metrics = Arc::new(AuditMetrics::new());
        let auditor = AsyncAuditor::new(
            inner.clone(),
            AsyncAuditorConfig {
                queue_size: 100,
                workers: 1,
            },
            metrics,
        );
        let ctx = AuditContext::default();
        for i in 0..20 {
            auditor
                .event(&ctx, "t", "ACTION", "a", "o", serde_json::json!({"i": i}))
                .await;
        }
        auditor.close().await;
        assert_eq!(inner.count.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let inner = Arc::new(SlowSink);
        let metrics = Arc::new(AuditMetrics::new());
        let auditor = AsyncAuditor::new(
            inner,
            AsyncAuditorConfig {
                queue_size: 1,
                workers: 1,
            },
            metrics.clone(),
        );
        let ctx = AuditContext::default();
        for _ in 0..50 {
            auditor.event(&ctx, "t", "ACTION", "a", "o", serde_json::Value::Null).await;
        }
        auditor.close().await;
        let snap = metrics.snapshot();
        assert!(snap.dropped_reason_total.get("full").copied().unwrap_or(0) > 0);
    }

    #[tokio::test]
    async fn worker_panic_restarts_and_delivers_next_event() {
        let inner = Arc::new(PanicOnceSink {
            panicked: AtomicBool::new(false),
            delivered: AtomicUsize::new(0),
        });
        let metrics = Arc::new(AuditMetrics::new());
        let auditor = AsyncAuditor::new(
            inner.clone(),
            AsyncAuditorConfig {
                queue_size: 10,
                workers: 1,
            },
            metrics.clone(),
        );
        let ctx = AuditContext::default();
        auditor.event(&ctx, "t", "ACTION", "a", "o", serde_json::Value::Null).await;
        auditor.event(&ctx, "t", "ACTION", "a", "o", serde_json::Value::Null).await;
        auditor.close().await;

        assert_eq!(metrics.snapshot().worker_restarts_total, 1);
        assert_eq!(inner.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let inner = Arc::new(CountingSink {
            count: AtomicUsize::new(0),
        });
        let metrics = Arc::new(AuditMetrics::new());
        let auditor = AsyncAuditor::new(inner, AsyncAuditorConfig::default(), metrics);
        auditor.close().await;
        auditor.close().await;
    }
}
