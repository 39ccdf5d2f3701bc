//! Core types and algorithms for the tamper-evident audit log.
//!
//! This crate is backend-agnostic: it defines the record shapes, the
//! canonicalization and hash-chain algorithms, the [`sink::Sink`] /
//! [`sink::DurableStore`] capability traits, the decorators that compose
//! them, process metrics, and the retention policy shape. Durable
//! persistence lives in `vaultlog-memory` and `vaultlog-postgres`; HTTP
//! exposure lives in `vaultlog-server`.

pub mod canonical;
pub mod chain;
pub mod compliance;
pub mod composition;
pub mod context;
pub mod error;
pub mod metrics;
pub mod record;
pub mod retention;
pub mod sink;

pub use compliance::{ComplianceConfig, ComplianceMode};
pub use context::{run_cancellable, AuditContext};
pub use error::AuditError;
pub use metrics::{AuditMetrics, AuditMetricsSnapshot};
pub use record::{Anchor, AuditFilter, AuditPage, AuditQuery, ChainHead, EventRecord, IntegrityExport};
pub use retention::{RetentionPolicy, RetentionStats};
pub use sink::{DurableStore, Sink};
