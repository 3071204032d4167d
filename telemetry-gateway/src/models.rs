//! HTTP response models and error mapping for the gateway's REST API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use telemetry_core::Error;
use tracing::error;

/// Body returned by `POST /ingest` on success.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub device_id: String,
    pub current: f64,
}

/// Every failure leaves the gateway as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidQuery(_) | Error::InvalidSample(_) => StatusCode::BAD_REQUEST,
            Error::CredentialUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if !self.0.is_client_error() {
            error!(error = %self.0, %status, "request failed");
        }
        (status, Json(serde_json::json!({"error": self.0.to_string()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn client_and_server_errors_map_to_distinct_statuses() {
        let cases = [
            (Error::invalid_query("x"), StatusCode::BAD_REQUEST),
            (Error::invalid_sample("x"), StatusCode::BAD_REQUEST),
            (Error::CredentialUnavailable("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::BackendUnavailable("x".into()), StatusCode::BAD_GATEWAY),
            (Error::Timeout(Duration::from_secs(1)), StatusCode::GATEWAY_TIMEOUT),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
