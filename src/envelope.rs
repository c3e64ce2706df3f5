use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Envelope
///
/// The uniform body of every handler response. `code` is `1` on success and `0`
/// on any business failure; both travel with HTTP 200, so clients branch on
/// `code` alone. `data` is omitted on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub msg: String,
}

impl<T> Envelope<T> {
    pub fn success(data: Option<T>, msg: impl Into<String>) -> Self {
        Self {
            code: 1,
            data,
            msg: msg.into(),
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            code: 0,
            data: None,
            msg: msg.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// render
///
/// The single place where an operation outcome becomes an HTTP response.
/// `Ok(Some(data))` renders with a payload, `Ok(None)` renders a bare success
/// (the write endpoints), and any `AppError` renders as `{code: 0, msg}`.
pub fn render<T: Serialize>(result: Result<Option<T>, AppError>, success_msg: &str) -> Response {
    match result {
        Ok(data) => Envelope::success(data, success_msg).into_response(),
        Err(err) => {
            tracing::debug!(error = %err, "request failed");
            Envelope::<T>::failure(err.to_string()).into_response()
        }
    }
}
