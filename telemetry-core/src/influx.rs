//! InfluxDB 2.x implementation of [`TimeSeriesStore`].

use std::sync::Arc;

use async_trait::async_trait;
use influxdb2::api::query::FluxRecord;
use influxdb2::models::Query;
use influxdb2::Client;
use influxdb2_structmap::value::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

use crate::credentials::{CredentialCache, Credentials};
use crate::error::{Error, Result};
use crate::flux;
use crate::store::{BucketRef, QuerySpec, RawRow, TimeSeriesStore, WritePoint};

/// Store backed by the [`influxdb2::Client`], authenticated lazily from the
/// credential cache on first use.
pub struct InfluxStore {
    url: String,
    longterm_suffix: String,
    credentials: Arc<CredentialCache>,
    client: OnceCell<Client>,
}

impl InfluxStore {
    pub fn new(url: &str, longterm_suffix: &str, credentials: Arc<CredentialCache>) -> Self {
        Self {
            url: url.to_string(),
            longterm_suffix: longterm_suffix.to_string(),
            credentials,
            client: OnceCell::new(),
        }
    }

    async fn session(&self) -> Result<(&Client, &Credentials)> {
        let creds = self.credentials.get().await?;
        let client = self
            .client
            .get_or_init(|| async {
                Client::new(self.url.as_str(), creds.org.as_str(), creds.token.as_str())
            })
            .await;
        Ok((client, creds))
    }

    fn bucket_name(&self, creds: &Credentials, bucket: BucketRef) -> String {
        match bucket {
            BucketRef::Raw => creds.bucket.clone(),
            BucketRef::LongTerm => format!("{}{}", creds.bucket, self.longterm_suffix),
        }
    }

    async fn run_flux(&self, client: &Client, flux: String) -> Result<Vec<FluxRecord>> {
        debug!(%flux, "running flux query");
        client.query_raw(Some(Query::new(flux))).await.map_err(|e| {
            error!(error = %e, "InfluxDB query failed");
            Error::BackendUnavailable(format!("InfluxDB query failed: {e}"))
        })
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxStore {
    async fn query(&self, spec: &QuerySpec) -> Result<Vec<RawRow>> {
        let (client, creds) = self.session().await?;
        let flux = flux::render(spec, &self.bucket_name(creds, spec.bucket));
        let records = self.run_flux(client, flux).await?;
        Ok(records.iter().filter_map(to_raw_row).collect())
    }

    async fn write(&self, point: WritePoint) -> Result<()> {
        let line = to_line_protocol(&point)?;
        let (client, creds) = self.session().await?;
        let bucket = self.bucket_name(creds, point.bucket);
        client
            .write_line_protocol(&creds.org, &bucket, line)
            .await
            .map_err(|e| {
                error!(error = %e, "InfluxDB write failed");
                Error::BackendUnavailable(format!("InfluxDB write failed: {e}"))
            })
    }

    async fn tag_values(&self, bucket: BucketRef, tag: &str) -> Result<Vec<String>> {
        let (client, creds) = self.session().await?;
        let flux = flux::render_tag_values(&self.bucket_name(creds, bucket), tag);
        let records = self.run_flux(client, flux).await?;
        Ok(records
            .iter()
            .filter_map(|r| match r.values.get("_value") {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                _ => None,
            })
            .collect())
    }
}

// ------------------------------------------------------------------ //
//  FluxRecord → RawRow                                                //
// ------------------------------------------------------------------ //

/// Columns that describe the result table rather than a series tag.
const RESERVED_COLUMNS: &[&str] = &["result", "table"];

/// Whole-range aggregates (`sum()`) drop `_time`; `_stop` stands in for it.
fn to_raw_row(record: &FluxRecord) -> Option<RawRow> {
    let time = ["_time", "_stop"]
        .iter()
        .find_map(|col| match record.values.get(*col) {
            Some(Value::TimeRFC(t)) => Some(*t),
            _ => None,
        });
    let Some(time) = time else {
        warn!(table = record.table, "dropping flux record without a timestamp");
        return None;
    };

    let value = record.values.get("_value").and_then(numeric);

    let tags = record
        .values
        .iter()
        .filter(|(k, _)| !k.starts_with('_') && !RESERVED_COLUMNS.contains(&k.as_str()))
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.clone(), s.clone())),
            _ => None,
        })
        .collect();

    Some(RawRow { time, value, tags })
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Double(d) => Some((*d).into()),
        Value::Long(l) => Some(*l as f64),
        Value::UnsignedLong(u) => Some(*u as f64),
        _ => None,
    }
}

// ------------------------------------------------------------------ //
//  WritePoint → line protocol                                         //
// ------------------------------------------------------------------ //

/// Exactly one line per point; names that could break the line are refused.
fn to_line_protocol(pt: &WritePoint) -> Result<String> {
    // measurement,tag1=v1,tag2=v2 field1=1.0,field2=2.0 <timestamp>
    let names = std::iter::once(pt.measurement.as_str())
        .chain(pt.tags.iter().flat_map(|(k, v)| [k.as_str(), v.as_str()]))
        .chain(pt.fields.keys().map(String::as_str));
    for name in names {
        if name.chars().any(char::is_control) {
            return Err(Error::invalid_sample(format!(
                "{name:?} contains a control character"
            )));
        }
    }

    let tags: String = pt
        .tags
        .iter()
        .map(|(k, v)| format!(",{}={}", escape_lp(k), escape_lp(v)))
        .collect();

    let fields: String = pt
        .fields
        .iter()
        .enumerate()
        .map(|(i, (k, v))| {
            let sep = if i == 0 { "" } else { "," };
            format!("{}{}={}", sep, escape_lp(k), v)
        })
        .collect();

    Ok(match pt.timestamp_ns {
        Some(ts) => format!("{}{} {} {}", escape_lp(&pt.measurement), tags, fields, ts),
        None => format!("{}{} {}", escape_lp(&pt.measurement), tags, fields),
    })
}

fn escape_lp(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(' ', "\\ ")
        .replace(',', "\\,")
        .replace('=', "\\=")
}
