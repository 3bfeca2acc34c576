//! Maps the shared error taxonomy onto HTTP responses for the admin REST
//! surface, grounded on the teacher's `GatewayError`/`IntoResponse` pattern.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use topology_types::CoreError;

/// Newtype so we can impl `IntoResponse` for the shared error without
/// violating the orphan rule.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CoreError::InvariantViolation(_) => StatusCode::CONFLICT,
            CoreError::ShardReadOnly(_) | CoreError::ShardMigrating(_) => StatusCode::CONFLICT,
            CoreError::NotLeader { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::StaleTopology { .. } => StatusCode::CONFLICT,
            CoreError::NodeUnreachable(_) | CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
