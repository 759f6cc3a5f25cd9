//! Maps [`PlatformError`] onto HTTP status codes for the RPC surface
//! (spec §4.13/§7), mirroring the teacher's `ErrorResponse -> IntoResponse`
//! pattern for its OpenAI-compatible API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{ErrorKind, PlatformError};

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

pub struct RpcError(pub PlatformError);

impl From<PlatformError> for RpcError {
    fn from(err: PlatformError) -> Self {
        RpcError(err)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::FailedPrecondition => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Cancelled => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind);
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.0.kind.as_str(),
                message: self.0.message,
            },
        };
        (status, Json(body)).into_response()
    }
}
