//! Query translation and aggregation core of the telemetry gateway.
//!
//! Turns a small closed set of read intents (latest, range, summary,
//! history, devices) into timezone-aware InfluxDB queries, normalizes the
//! rows into stable payloads, and writes validated device samples.

pub mod calendar;
pub mod config;
pub mod credentials;
pub mod error;
pub mod flux;
pub mod influx;
pub mod ingest;
pub mod intent;
pub mod normalizer;
pub mod planner;
pub mod rollup;
pub mod secrets;
pub mod service;
pub mod store;

pub use config::{Accumulation, PlannerConfig, Settings};
pub use credentials::{CredentialCache, CredentialProvider, Credentials};
pub use error::{Error, Result};
pub use ingest::{IngestRequest, WriteResult};
pub use intent::{Period, QueryIntent, QueryParams, QueryRequest};
pub use normalizer::OutputPayload;
pub use service::TelemetryService;
pub use store::{FakeStore, QuerySpec, RawRow, TimeSeriesStore};
