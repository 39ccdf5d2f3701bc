//! Rolling SHA-256 chain over the fixed event field layout.
//!
//! The chain input is `prev_hash | ts | tenant_id | action | stored_actor |
//! stored_object | canonical(details) | request_id`, using the literal `|`
//! byte as separator. This module only computes and verifies hashes; reading
//! the previous head, persisting the row, and serializing retention live in
//! the store backends (`vaultlog-memory`, `vaultlog-postgres`), which must
//! serialize calls into this module per the single-writer discipline in the
//! design doc's concurrency section.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::canonical::canonicalize;
use crate::error::AuditError;
use crate::record::EventRecord;

const SEPARATOR: u8 = b'|';

/// Format a timestamp the way it is recorded on a row: UTC, ISO-8601, with
/// nanosecond precision.
#[must_use]
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Build the raw chain input bytes for a new row.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn chain_input(
    prev_hash: &str,
    ts: &str,
    tenant_id: &str,
    action: &str,
    stored_actor: &str,
    stored_object: &str,
    canonical_details: &str,
    request_id: &str,
) -> Vec<u8> {
    let fields = [
        prev_hash,
        ts,
        tenant_id,
        action,
        stored_actor,
        stored_object,
        canonical_details,
        request_id,
    ];
    let mut buf = Vec::with_capacity(fields.iter().map(|f| f.len() + 1).sum());
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            buf.push(SEPARATOR);
        }
        buf.extend_from_slice(field.as_bytes());
    }
    buf
}

/// Compute `hex(SHA256(chain_input))`.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn compute_chain_hash(
    prev_hash: &str,
    ts: &str,
    tenant_id: &str,
    action: &str,
    stored_actor: &str,
    stored_object: &str,
    canonical_details: &str,
    request_id: &str,
) -> String {
    let input = chain_input(
        prev_hash,
        ts,
        tenant_id,
        action,
        stored_actor,
        stored_object,
        canonical_details,
        request_id,
    );
    hex::encode(Sha256::digest(&input))
}

/// Recompute the chain hash that a stored row should carry, given the
/// previous row's chain hash (or `""` for the retained baseline).
#[must_use]
pub fn recompute_hash(prev_hash: &str, row: &EventRecord) -> String {
    compute_chain_hash(
        prev_hash,
        &format_ts(row.ts),
        &row.tenant_id,
        &row.action,
        &row.actor,
        &row.object,
        &canonicalize(&row.details),
        &row.request_id,
    )
}

/// Sequentially verify a contiguous, `seq`-ascending slice of rows.
///
/// The first row in `rows` is treated as the retained baseline: its stored
/// hash is accepted as-is (its true predecessor may have been pruned).
/// `baseline_prev_hash` is the previous hash to verify the baseline's
/// successor against when `rows.len() > 1`; pass `""` when verifying from
/// the very first row the store has ever held.
pub fn verify_sequence(rows: &[EventRecord]) -> Result<(), AuditError> {
    for (index, window) in rows.windows(2).enumerate() {
        let [prev, cur] = window else { unreachable!() };
        let expected = recompute_hash(&prev.chain_hash, cur);
        if expected != cur.chain_hash {
            return Err(AuditError::ChainMismatch {
                // +1: the baseline row occupies index 0.
                index: index as u64 + 1,
                seq: cur.seq,
                stored: cur.chain_hash.clone(),
                expected,
            });
        }
    }
    Ok(())
}

/// Verify a `seq`-ascending slice of rows starting at an anchor, given the
/// chain hash of the row immediately preceding `rows[0]` (or `""` if
/// `rows[0]` is the retained baseline).
pub fn verify_from(prev_hash: &str, rows: &[EventRecord]) -> Result<(), AuditError> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    let expected = recompute_hash(prev_hash, first);
    if expected != first.chain_hash {
        return Err(AuditError::ChainMismatch {
            index: 0,
            seq: first.seq,
            stored: first.chain_hash.clone(),
            expected,
        });
    }
    verify_sequence(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(seq: i64, prev: &str, action: &str) -> EventRecord {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, seq as u32 % 60).unwrap();
        let details = json!({"n": seq});
        let chain_hash = compute_chain_hash(
            prev,
            &format_ts(ts),
            "tenant-1",
            action,
            "actor-h",
            "object-h",
            &canonicalize(&details),
            "req-1",
        );
        EventRecord {
            seq,
            ts,
            tenant_id: "tenant-1".into(),
            action: action.into(),
            actor: "actor-h".into(),
            object: "object-h".into(),
            details,
            request_id: "req-1".into(),
            chain_hash,
        }
    }

    #[test]
    fn fresh_chain_verifies_ok() {
        let r1 = row(1, "", "NETWORK_CREATED");
        let r2 = row(2, &r1.chain_hash, "IP_ALLOCATED");
        assert!(verify_sequence(&[r1, r2]).is_ok());
    }

    #[test]
    fn tampered_field_breaks_chain() {
        let r1 = row(1, "", "NETWORK_CREATED");
        let mut r2 = row(2, &r1.chain_hash, "IP_ALLOCATED");
        r2.action = "TAMPERED".to_owned();
        let err = verify_sequence(&[r1, r2]).unwrap_err();
        assert!(matches!(err, AuditError::ChainMismatch { seq: 2, .. }));
    }

    #[test]
    fn tampered_hash_breaks_chain() {
        let r1 = row(1, "", "NETWORK_CREATED");
        let mut r2 = row(2, &r1.chain_hash, "IP_ALLOCATED");
        r2.chain_hash = "deadbeef".to_owned();
        let err = verify_sequence(&[r1, r2]).unwrap_err();
        assert!(matches!(err, AuditError::ChainMismatch { seq: 2, stored, .. } if stored == "deadbeef"));
    }

    #[test]
    fn verify_from_anchor_checks_predecessor() {
        let r1 = row(1, "", "NETWORK_CREATED");
        let r2 = row(2, &r1.chain_hash, "IP_ALLOCATED");
        let r3 = row(3, &r2.chain_hash, "MEMBER_JOINED");
        assert!(verify_from(&r1.chain_hash, &[r2, r3]).is_ok());
    }

    #[test]
    fn single_row_is_trivially_valid() {
        let r1 = row(1, "", "NETWORK_CREATED");
        assert!(verify_sequence(&[r1]).is_ok());
    }
}
