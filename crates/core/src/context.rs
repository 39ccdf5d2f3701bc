//! Per-call context threaded through every [`crate::sink::Sink`] operation.
//!
//! Writes and reads use the same context type but honor different halves of
//! it: `event` consults only `request_id` (audit writes are best-effort
//! durable, not cancellable, once the enqueue/write has started), while read
//! operations race their storage I/O against `cancellation`.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::AuditError;

/// Request-scoped context passed to every sink call.
#[derive(Debug, Clone)]
pub struct AuditContext {
    /// Correlation id propagated from the invoking request, stored verbatim
    /// as the row's `request_id`. Ignored by read operations.
    pub request_id: String,
    /// Cancellation signal checked by read operations at storage boundaries.
    pub cancellation: CancellationToken,
}

impl Default for AuditContext {
    fn default() -> Self {
        Self {
            request_id: String::new(),
            cancellation: CancellationToken::new(),
        }
    }
}

impl AuditContext {
    /// A context carrying `request_id` and a fresh, never-cancelled token.
    #[must_use]
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }
}

/// Race `fut` against `ctx`'s cancellation signal. Whichever resolves first
/// wins; a cancellation always reports [`AuditError::Cancelled`] rather than
/// a partial result, per the read-path cancellation contract.
pub async fn run_cancellable<T>(ctx: &AuditContext, fut: impl Future<Output = Result<T, AuditError>>) -> Result<T, AuditError> {
    tokio::select! {
        biased;
        () = ctx.cancellation.cancelled() => Err(AuditError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_inner_future_when_not_cancelled() {
        let ctx = AuditContext::default();
        let result = run_cancellable(&ctx, async { Ok::<_, AuditError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn reports_cancelled_once_token_is_cancelled() {
        let ctx = AuditContext::default();
        ctx.cancellation.cancel();
        let result = run_cancellable(&ctx, std::future::pending::<Result<i32, AuditError>>()).await;
        assert!(matches!(result, Err(AuditError::Cancelled)));
    }
}
