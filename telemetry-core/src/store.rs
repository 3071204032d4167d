//! Time-series store boundary: typed query specs, raw rows, and the
//! `TimeSeriesStore` trait with an in-memory fake for tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};

// ------------------------------------------------------------------ //
//  Query side                                                         //
// ------------------------------------------------------------------ //

/// Which bucket a spec targets; resolved against the credentials by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketRef {
    /// Raw device samples (the credential bucket itself).
    Raw,
    /// Pre-aggregated daily energy (credential bucket + long-term suffix).
    LongTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFn {
    Mean,
    Sum,
    Last,
}

impl AggFn {
    pub fn as_str(self) -> &'static str {
        match self {
            AggFn::Mean => "mean",
            AggFn::Sum => "sum",
            AggFn::Last => "last",
        }
    }
}

/// Exact-match tag predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    /// `None` means "up to now".
    pub stop: Option<DateTime<Utc>>,
}

/// One declarative backend query.
///
/// With `window` set, `agg` is applied per window; without it, `agg` is
/// applied over the whole range. `timezone` anchors window boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub bucket: BucketRef,
    pub measurement: String,
    pub field: String,
    pub tag_filter: Option<TagFilter>,
    pub range: TimeRange,
    pub window: Option<Duration>,
    pub agg: Option<AggFn>,
    pub timezone: Option<Tz>,
}

/// One result row as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub time: DateTime<FixedOffset>,
    pub value: Option<f64>,
    pub tags: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new(time: DateTime<FixedOffset>, value: Option<f64>) -> Self {
        Self {
            time,
            value,
            tags: BTreeMap::new(),
        }
    }
}

// ------------------------------------------------------------------ //
//  Write side                                                         //
// ------------------------------------------------------------------ //

/// A single point to persist. `timestamp_ns: None` lets the backend stamp it.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePoint {
    pub bucket: BucketRef,
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub timestamp_ns: Option<i64>,
}

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn query(&self, spec: &QuerySpec) -> Result<Vec<RawRow>>;

    /// Synchronous write: returns once the backend acknowledged the point.
    async fn write(&self, point: WritePoint) -> Result<()>;

    /// Distinct values of `tag` in `bucket`.
    async fn tag_values(&self, bucket: BucketRef, tag: &str) -> Result<Vec<String>>;
}

// ------------------------------------------------------------------ //
//  FakeStore (for tests)                                              //
// ------------------------------------------------------------------ //

/// In-memory store that records calls and replays scripted responses.
///
/// Query responses are consumed in FIFO order; once exhausted every query
/// returns no rows.
#[derive(Debug, Default, Clone)]
pub struct FakeStore {
    pub queries: Arc<Mutex<Vec<QuerySpec>>>,
    pub writes: Arc<Mutex<Vec<WritePoint>>>,
    responses: Arc<Mutex<VecDeque<Result<Vec<RawRow>, String>>>>,
    devices: Arc<Mutex<Vec<String>>>,
    fail_writes: Arc<Mutex<Option<String>>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the rows returned by the next unanswered query.
    pub fn push_rows(&self, rows: Vec<RawRow>) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(rows));
        self
    }

    /// Queue a backend failure for the next unanswered query.
    pub fn push_failure(&self, msg: &str) -> &Self {
        self.responses.lock().unwrap().push_back(Err(msg.to_string()));
        self
    }

    pub fn set_devices(&self, devices: &[&str]) {
        *self.devices.lock().unwrap() = devices.iter().map(|d| d.to_string()).collect();
    }

    pub fn fail_writes(&self, msg: &str) {
        *self.fail_writes.lock().unwrap() = Some(msg.to_string());
    }

    /// Non-destructive snapshot of the specs queried so far.
    pub fn queried(&self) -> Vec<QuerySpec> {
        self.queries.lock().unwrap().clone()
    }

    /// Non-destructive snapshot of the points written so far.
    pub fn written(&self) -> Vec<WritePoint> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimeSeriesStore for FakeStore {
    async fn query(&self, spec: &QuerySpec) -> Result<Vec<RawRow>> {
        self.queries.lock().unwrap().push(spec.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(msg)) => Err(Error::BackendUnavailable(msg)),
            None => Ok(Vec::new()),
        }
    }

    async fn write(&self, point: WritePoint) -> Result<()> {
        if let Some(msg) = self.fail_writes.lock().unwrap().clone() {
            return Err(Error::BackendUnavailable(msg));
        }
        self.writes.lock().unwrap().push(point);
        Ok(())
    }

    async fn tag_values(&self, _bucket: BucketRef, _tag: &str) -> Result<Vec<String>> {
        Ok(self.devices.lock().unwrap().clone())
    }
}
