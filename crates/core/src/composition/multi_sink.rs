//! Best-effort fan-out to several sinks.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::AuditContext;
use crate::sink::Sink;

/// Fans an event out to every inner sink, sequentially and best-effort: one
/// sink's failure (observed only through its own metrics, since [`Sink`] is
/// fire-and-forget) does not stop delivery to the rest.
///
/// Intentionally does not implement [`crate::sink::DurableStore`] — the
/// fanned-out sinks may be heterogeneous backends with no single coherent
/// read path, so query endpoints see this as write-only and answer `501`.
pub struct MultiSink {
    inner: Vec<Arc<dyn Sink>>,
}

impl MultiSink {
    #[must_use]
    pub fn new(inner: Vec<Arc<dyn Sink>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Sink for MultiSink {
    async fn event(&self, ctx: &AuditContext, tenant_id: &str, action: &str, actor: &str, object: &str, details: Value) {
        for sink in &self.inner {
            sink.event(ctx, tenant_id, action, actor, object, details.clone()).await;
        }
    }

    async fn close(&self) {
        for sink in &self.inner {
            sink.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(AtomicUsize);

    #[async_trait]
    impl Sink for CountingSink {
        async fn event(&self, _: &AuditContext, _: &str, _: &str, _: &str, _: &str, _: Value) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn delivers_to_every_inner_sink() {
        let a = Arc::new(CountingSink(AtomicUsize::new(0)));
        let b = Arc::new(CountingSink(AtomicUsize::new(0)));
        let multi = MultiSink::new(vec![a.clone(), b.clone()]);
        multi
            .event(&AuditContext::default(), "t", "NETWORK_CREATED", "actor", "obj", Value::Null)
            .await;
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }
}
