//! Telemetry gateway: HTTP front for the dashboard and the devices.
//!
//! Dashboard reads arrive as `GET /data?type=...` and are answered from
//! InfluxDB through `telemetry-core`. Devices post samples to `/ingest`.
//!
//! # Configuration
//! Settings come from `GATEWAY_*` env vars (see `telemetry_core::Settings`).
//! InfluxDB credentials are resolved once, lazily, via Bitwarden Secrets
//! Manager (when `BWS_ACCESS_TOKEN` is set) or plain environment variables.
//!
//! | Env var                         | Default                 |
//! |---------------------------------|-------------------------|
//! | `GATEWAY_BIND_ADDR`             | `0.0.0.0:8080`          |
//! | `GATEWAY_INFLUXDB_URL`          | `http://localhost:8086` |
//! | `GATEWAY_TIMEZONE`              | `America/Sao_Paulo`     |
//! | `GATEWAY_REQUEST_DEADLINE_SECS` | `25`                    |

mod handlers;
mod models;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use telemetry_core::{
    influx::InfluxStore, secrets::SecretsClient, CredentialCache, Settings, TelemetryService,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

// ------------------------------------------------------------------ //
//  Shared application state                                           //
// ------------------------------------------------------------------ //

/// Shared state injected into every Axum handler via `State`.
pub struct AppState {
    pub service: TelemetryService,
    /// Upper bound on the backend work done for one request.
    pub deadline: Duration,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/data", get(handlers::get_data))
        .route("/ingest", post(handlers::post_ingest))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ------------------------------------------------------------------ //
//  Entry point                                                        //
// ------------------------------------------------------------------ //

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telemetry_gateway=info".parse()?)
                .add_directive("telemetry_core=info".parse()?),
        )
        .json()
        .init();

    let settings = Settings::load()?;
    info!(
        influxdb_url = %settings.influxdb_url,
        timezone = %settings.timezone,
        accumulation = ?settings.daily_energy_accumulation,
        "settings loaded"
    );

    // Credentials are fetched on the first request that needs them.
    let credentials = Arc::new(CredentialCache::new(Arc::new(SecretsClient::new(
        settings.secret_id.clone(),
    ))));
    let store = InfluxStore::new(
        &settings.influxdb_url,
        &settings.longterm_bucket_suffix,
        credentials,
    );

    let state = Arc::new(AppState {
        service: TelemetryService::new(settings.planner(), Arc::new(store)),
        deadline: settings.request_deadline(),
    });

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!(addr = %settings.bind_addr, "telemetry gateway listening");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
