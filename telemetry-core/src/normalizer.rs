//! Raw backend rows → stable output payloads.
//!
//! Timestamps leave this module as RFC 3339 strings only: raw samples in
//! UTC (`Z`), day and month buckets at local midnight with their offset.
//! Rows without a value never reach the output.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::calendar;
use crate::rollup::{self, DailyTotal};
use crate::store::RawRow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentReading {
    pub time: String,
    pub current: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergySummary {
    pub today: f64,
    pub month: f64,
}

/// Chart-ready bucket: `x` is the bucket's first instant, `y` its kWh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: String,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputPayload {
    /// `None` serializes as an empty object.
    Latest(Option<CurrentReading>),
    Range(Vec<CurrentReading>),
    Summary(EnergySummary),
    History(Vec<ChartPoint>),
    Devices(Vec<String>),
}

impl Serialize for OutputPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OutputPayload::Latest(Some(reading)) => reading.serialize(serializer),
            OutputPayload::Latest(None) => serializer.serialize_map(Some(0))?.end(),
            OutputPayload::Range(readings) => readings.serialize(serializer),
            OutputPayload::Summary(summary) => summary.serialize(serializer),
            OutputPayload::History(points) => points.serialize(serializer),
            OutputPayload::Devices(devices) => devices.serialize(serializer),
        }
    }
}

/// Most recent non-null sample across all returned series.
pub fn latest(rows: Vec<RawRow>) -> Option<CurrentReading> {
    rows.into_iter()
        .filter_map(|r| r.value.map(|v| (r.time, v)))
        .max_by_key(|(time, _)| *time)
        .map(|(time, current)| CurrentReading {
            time: canonical_time(time),
            current,
        })
}

/// Chronological samples, nulls dropped. Equal timestamps keep backend order.
pub fn range(rows: Vec<RawRow>) -> Vec<CurrentReading> {
    let mut samples: Vec<(DateTime<FixedOffset>, f64)> = rows
        .into_iter()
        .filter_map(|r| r.value.map(|v| (r.time, v)))
        .collect();
    samples.sort_by_key(|(time, _)| *time);
    samples
        .into_iter()
        .map(|(time, current)| CurrentReading {
            time: canonical_time(time),
            current,
        })
        .collect()
}

/// Today's and month-to-date totals.
///
/// A month without data falls back to today's value: early in the month
/// the backend may only have today's partial total.
pub fn summary(today_rows: Vec<RawRow>, month_rows: Vec<RawRow>) -> EnergySummary {
    let today = total(&today_rows);
    let month = total(&month_rows).or(today);
    EnergySummary {
        today: today.unwrap_or(0.0),
        month: month.unwrap_or(0.0),
    }
}

fn total(rows: &[RawRow]) -> Option<f64> {
    rows.iter()
        .filter_map(|r| r.value)
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Fold rows into one total per local calendar day, ascending.
///
/// Several series (one per device) landing on the same day are summed. A
/// day whose rows are all null stays `None`.
pub fn daily_totals(rows: &[RawRow], tz: Tz) -> Vec<DailyTotal> {
    let mut days: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
    for row in rows {
        let day = calendar::local_date(row.time.with_timezone(&Utc), tz);
        let slot = days.entry(day).or_insert(None);
        if let Some(v) = row.value {
            *slot = Some(slot.unwrap_or(0.0) + v);
        }
    }
    days.into_iter()
        .map(|(day, kwh)| DailyTotal { day, kwh })
        .collect()
}

/// The last `limit` days that have data, oldest first.
pub fn daily_history(rows: &[RawRow], limit: usize, tz: Tz) -> Vec<ChartPoint> {
    let with_data: Vec<(NaiveDate, f64)> = daily_totals(rows, tz)
        .into_iter()
        .filter_map(|d| d.kwh.map(|kwh| (d.day, kwh)))
        .collect();
    let skip = with_data.len().saturating_sub(limit);
    with_data
        .into_iter()
        .skip(skip)
        .map(|(day, kwh)| ChartPoint {
            x: bucket_time(calendar::local_midnight_fixed(day, tz)),
            y: kwh,
        })
        .collect()
}

/// Daily rows rolled up into the last `limit` local months, oldest first.
pub fn monthly_history(rows: &[RawRow], limit: usize, tz: Tz) -> Vec<ChartPoint> {
    rollup::rollup_monthly(&daily_totals(rows, tz), limit, tz)
        .into_iter()
        .map(|m| ChartPoint {
            x: bucket_time(m.starts_at),
            y: m.kwh,
        })
        .collect()
}

/// Sorted, de-duplicated device ids.
pub fn devices(mut values: Vec<String>) -> Vec<String> {
    values.retain(|v| !v.is_empty());
    values.sort();
    values.dedup();
    values
}

/// Sample timestamps are reported in UTC.
pub fn canonical_time(t: DateTime<FixedOffset>) -> String {
    t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn bucket_time(t: DateTime<FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, false)
}
