use serde::Serialize;

/// Uniform error body returned by every handler on failure.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
