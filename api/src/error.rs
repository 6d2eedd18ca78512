use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// Request-level failure. Upstream (feed, KV, enricher) errors are handled
/// inside the pipeline and never bubble up here; what remains is bad client
/// input and genuinely unexpected internal failures.
pub enum AppError {
    BadRequest(String),
    Internal(eyre::Report),
}

#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(report) => {
                tracing::error!(?report, "request failed");
                // top-level message only, never the chain or a backtrace
                (StatusCode::INTERNAL_SERVER_ERROR, report.to_string())
            }
        };

        (status, Json(ErrorResponse { ok: false, error })).into_response()
    }
}

impl From<eyre::Report> for AppError {
    fn from(report: eyre::Report) -> Self {
        AppError::Internal(report)
    }
}
