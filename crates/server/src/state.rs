use std::sync::Arc;

use vaultlog_core::{AuditMetrics, DurableStore};
use vaultlog_crypto::Signer;

/// Shared application state passed to all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The composed audit sink's read surface. `None` when the configured
    /// sink does not implement [`DurableStore`] (e.g. a debug ring-buffer
    /// deployment) — handlers translate that into `501`.
    pub audit: Option<Arc<dyn DurableStore>>,
    /// Optional signer for integrity exports. `None` leaves exports
    /// unsigned.
    pub signer: Option<Arc<Signer>>,
    pub metrics: Arc<AuditMetrics>,
}
