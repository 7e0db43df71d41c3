// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mapping from library errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use ticketpress_core::error::TicketpressError;

/// Handler error: a `TicketpressError` rendered as `{ "error": "..." }`.
#[derive(Debug)]
pub struct ApiError(pub TicketpressError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<TicketpressError> for ApiError {
    fn from(err: TicketpressError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            TicketpressError::NotFound { .. } => StatusCode::NOT_FOUND,
            TicketpressError::Validation(_) => StatusCode::BAD_REQUEST,
            TicketpressError::Authenticity(_) => StatusCode::UNAUTHORIZED,
            TicketpressError::TransientDelivery(_)
            | TicketpressError::ExhaustedRetries { .. }
            | TicketpressError::Upstream(_) => StatusCode::BAD_GATEWAY,
            TicketpressError::Database(_)
            | TicketpressError::Io(_)
            | TicketpressError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_input_errors_are_client_errors() {
        assert_eq!(
            ApiError(TicketpressError::job_not_found("x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(TicketpressError::Validation("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn printer_trouble_is_bad_gateway() {
        let err = ApiError(TicketpressError::TransientDelivery("refused".into()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ApiError(TicketpressError::Database("locked".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
