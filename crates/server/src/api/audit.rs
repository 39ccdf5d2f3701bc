use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use vaultlog_core::{AuditContext, AuditFilter, AuditQuery};

use crate::state::AppState;
use crate::tenant::TenantId;

use super::schemas::ErrorResponse;

fn not_supported() -> impl IntoResponse {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(serde_json::json!(ErrorResponse {
            error: "this sink does not support querying".into(),
        })),
    )
}

fn internal_error(err: impl std::fmt::Display) -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!(ErrorResponse { error: err.to_string() })),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    page: Option<i64>,
    limit: Option<i64>,
    actor: Option<String>,
    action: Option<String>,
    object_type: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

fn parse_rfc3339(raw: &Option<String>) -> Result<Option<DateTime<Utc>>, String> {
    raw.as_deref()
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| format!("invalid timestamp {s:?}: {e}"))
        })
        .transpose()
}

/// `GET /audit?page=P&limit=L&actor=&action=&object_type=&from=&to=` --
/// paginated, filtered query scoped to the caller's tenant.
pub async fn list(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Query(params): Query<ListParams>,
) -> axum::response::Response {
    let Some(audit) = &state.audit else {
        return not_supported().into_response();
    };

    let from = match parse_rfc3339(&params.from) {
        Ok(v) => v,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!(ErrorResponse { error: e }))).into_response()
        }
    };
    let to = match parse_rfc3339(&params.to) {
        Ok(v) => v,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!(ErrorResponse { error: e }))).into_response()
        }
    };

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let query = AuditQuery {
        tenant_id,
        filter: AuditFilter {
            actor: params.actor.clone(),
            action: params.action.clone(),
            object_type: params.object_type.clone(),
            from,
            to,
        },
        limit: Some(limit),
        offset: Some((page - 1) * limit),
    };

    // axum does not currently plumb a request-scoped cancellation signal
    // into handlers, so reads get a fresh token that is never cancelled.
    let ctx = AuditContext::default();
    match audit.query_logs_filtered(&ctx, &query).await {
        Ok(result) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "data": result.records,
                "pagination": { "page": page, "limit": limit, "total": result.total },
                "filters": {
                    "actor": params.actor,
                    "action": params.action,
                    "object_type": params.object_type,
                    "from": params.from,
                    "to": params.to,
                },
            })),
        )
            .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct IntegrityParams {
    anchors: Option<i64>,
}

/// `GET /audit/integrity?anchors=N` -- the (optionally signed) integrity
/// export.
pub async fn integrity(
    State(state): State<AppState>,
    _tenant: TenantId,
    Query(params): Query<IntegrityParams>,
) -> axum::response::Response {
    let Some(audit) = &state.audit else {
        return not_supported().into_response();
    };

    let anchor_limit = params.anchors.unwrap_or(20).clamp(1, 500);
    let ctx = AuditContext::default();
    match audit.export_integrity(&ctx, anchor_limit).await {
        Ok(mut export) => {
            if let Some(signer) = &state.signer {
                sign_export(&mut export, signer);
                state.metrics.record_integrity_signed();
            }
            (StatusCode::OK, Json(serde_json::json!(export))).into_response()
        }
        Err(e) => internal_error(e).into_response(),
    }
}

/// `GET /audit/verify` -- full-chain verification result.
pub async fn verify(State(state): State<AppState>, _tenant: TenantId) -> axum::response::Response {
    let Some(audit) = &state.audit else {
        return not_supported().into_response();
    };

    match audit.verify_chain(&AuditContext::default()).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "verified": true }))).into_response(),
        Err(e) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "verified": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Sign `export` over its canonical JSON with `signature` blanked to `""`,
/// per the integrity-export signing contract.
fn sign_export(export: &mut vaultlog_core::IntegrityExport, signer: &vaultlog_crypto::Signer) {
    export.kid = Some(signer.kid().to_owned());
    export.signature = Some(String::new());
    let bytes = serde_json::to_vec(export).expect("IntegrityExport always serializes");
    export.signature = Some(signer.sign(&bytes));
}
