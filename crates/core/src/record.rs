use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Literal stored in `actor`/`object` when no pseudonymization hasher is configured.
pub const REDACTED: &str = "[redacted]";

/// A single row of the append-only audit log.
///
/// `seq` is assigned by the store on insert and is the authoritative
/// ordering key; every other field is fixed at construction time and the
/// row is never updated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EventRecord {
    /// Monotonically increasing sequence number assigned by the store.
    pub seq: i64,
    /// Event timestamp, recorded by the store at insert time.
    pub ts: DateTime<Utc>,
    /// Tenancy scope; may be empty for system-wide events.
    #[serde(default)]
    pub tenant_id: String,
    /// Short symbolic action identifier (e.g. `NETWORK_CREATED`).
    pub action: String,
    /// Pseudonymized (or `[redacted]`) actor identifier. Never the raw value.
    pub actor: String,
    /// Pseudonymized (or `[redacted]`) object identifier. Never the raw value.
    pub object: String,
    /// Free-form event details.
    #[serde(default)]
    pub details: serde_json::Value,
    /// Correlation identifier propagated from the invoking request context.
    #[serde(default)]
    pub request_id: String,
    /// 64-hex-character SHA-256 over the chain input (see [`crate::chain`]).
    pub chain_hash: String,
}

/// A checkpoint of the chain head, inserted whenever `seq mod anchor_interval == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Anchor {
    /// The event row's sequence number this anchor snapshots.
    pub seq: i64,
    /// The event row's timestamp.
    pub ts: DateTime<Utc>,
    /// The event row's chain hash, duplicated here for fast partial verification.
    pub chain_hash: String,
}

/// The current chain head: the most recently inserted row's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChainHead {
    /// Sequence number of the head row.
    pub seq: i64,
    /// Chain hash of the head row.
    pub hash: String,
    /// Timestamp of the head row.
    pub ts: DateTime<Utc>,
}

/// A signed (optionally) snapshot of the chain head and a suffix of anchors,
/// produced on demand for an external auditor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IntegrityExport {
    /// The current chain head.
    pub head: ChainHead,
    /// Anchors, oldest first, truncated to the requested limit.
    pub anchors: Vec<Anchor>,
    /// Largest `seq` present in the store.
    pub latest_seq: i64,
    /// Smallest `seq` present in the store (the retained baseline).
    pub earliest_seq: i64,
    /// When this export was assembled.
    pub generated_at: DateTime<Utc>,
    /// Identifier of the signing key, present iff one is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Base64url (no padding) Ed25519 signature, present iff signing succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Filter fields accepted by `query_logs_filtered`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditFilter {
    /// Exact match on the stored (pseudonymized) actor.
    #[serde(default)]
    pub actor: Option<String>,
    /// Exact match on `action`.
    #[serde(default)]
    pub action: Option<String>,
    /// Exact match on `details.type`.
    #[serde(default)]
    pub object_type: Option<String>,
    /// Inclusive lower bound on `ts`.
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `ts`.
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

/// Pagination parameters for `query_logs_filtered`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditQuery {
    /// Tenant scope for the query.
    pub tenant_id: String,
    /// Filter fields.
    #[serde(flatten)]
    pub filter: AuditFilter,
    /// Requested page size before clamping.
    #[serde(default)]
    pub limit: Option<i64>,
    /// Requested offset before clamping.
    #[serde(default)]
    pub offset: Option<i64>,
}

impl AuditQuery {
    /// `limit` clamped to `[1, 100]`, defaulting to 20.
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }

    /// `offset` clamped to be non-negative.
    #[must_use]
    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// A page of results from `query_logs_filtered`, with the unpaginated total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditPage {
    /// The page of matching rows.
    pub records: Vec<EventRecord>,
    /// Total matching rows across all pages (same filters, unpaginated).
    pub total: i64,
}
