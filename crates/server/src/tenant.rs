use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

const HEADER: &str = "x-tenant-id";

/// Tenant identity carried by the `X-Tenant-Id` header.
///
/// There is no platform-wide auth service in scope here, so this is a
/// single-header identity model rather than the grant-based `CallerIdentity`
/// a fuller deployment would extract — every request must still name the
/// tenant it is reading audit data for.
pub struct TenantId(pub String);

pub struct MissingTenantHeader;

impl IntoResponse for MissingTenantHeader {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": format!("missing {HEADER} header") })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = MissingTenantHeader;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_owned()))
            .ok_or(MissingTenantHeader)
    }
}
