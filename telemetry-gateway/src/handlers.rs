//! Axum HTTP handlers for the telemetry gateway.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use telemetry_core::{Error, IngestRequest, QueryParams};
use tracing::info;

use crate::{
    models::{ApiError, IngestResponse},
    AppState,
};

/// Run `fut` under the per-request deadline. An expired deadline abandons
/// the in-flight backend call; nothing is retried.
async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = telemetry_core::Result<T>>,
) -> telemetry_core::Result<T> {
    tokio::time::timeout(deadline, fut)
        .await
        .unwrap_or(Err(Error::Timeout(deadline)))
}

// ------------------------------------------------------------------ //
//  GET /data                                                          //
// ------------------------------------------------------------------ //

/// Dashboard reads: `?type=latest|range|summary|history|devices`.
pub async fn get_data(
    State(state): State<Arc<AppState>>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| Error::invalid_query(e.body_text()))?;
    let payload = with_deadline(state.deadline, state.service.query(&params)).await?;
    Ok((StatusCode::OK, Json(payload)))
}

// ------------------------------------------------------------------ //
//  POST /ingest                                                       //
// ------------------------------------------------------------------ //

/// Device ingestion: `{"device_id": "...", "current": 1.23}`.
pub async fn post_ingest(
    State(state): State<Arc<AppState>>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| Error::invalid_sample(e.body_text()))?;
    let written = with_deadline(state.deadline, state.service.ingest(req)).await?;

    info!(device = %written.device_id, "POST /ingest processed");
    Ok((
        StatusCode::OK,
        Json(IngestResponse {
            status: "ok",
            device_id: written.device_id,
            current: written.current,
        }),
    ))
}

// ------------------------------------------------------------------ //
//  Health                                                             //
// ------------------------------------------------------------------ //

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
