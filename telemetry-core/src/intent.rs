//! Caller intents and their validation.

use chrono::Duration;
use serde::Deserialize;

use crate::config::PlannerConfig;
use crate::error::{Error, Result};

pub const DEFAULT_RANGE_SECS: i64 = 5 * 60;
pub const DEFAULT_HISTORY_LIMIT: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    Monthly,
}

impl Period {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Period::Daily),
            "monthly" => Ok(Period::Monthly),
            other => Err(Error::invalid_query(format!("unknown period '{other}'"))),
        }
    }
}

/// The closed set of read intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    Latest,
    Range { window: Duration },
    Summary,
    History { period: Period, limit: u32 },
    Devices,
}

/// Raw query-string parameters as received from the transport.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryParams {
    #[serde(rename = "type", alias = "intent")]
    pub intent: Option<String>,
    pub range: Option<String>,
    pub period: Option<String>,
    pub limit: Option<String>,
    #[serde(alias = "deviceId")]
    pub device_id: Option<String>,
}

/// A validated read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub intent: QueryIntent,
    pub device: Option<String>,
}

impl QueryRequest {
    pub fn parse(params: &QueryParams, config: &PlannerConfig) -> Result<Self> {
        let intent = match params.intent.as_deref().map(str::trim) {
            None | Some("") => return Err(Error::invalid_query("missing query type")),
            Some("latest") => QueryIntent::Latest,
            Some("range") => QueryIntent::Range {
                window: match non_blank(&params.range) {
                    Some(spec) => parse_range(spec, config.max_range)?,
                    None => Duration::seconds(DEFAULT_RANGE_SECS),
                },
            },
            Some("summary") => QueryIntent::Summary,
            Some("history") => QueryIntent::History {
                period: match non_blank(&params.period) {
                    Some(p) => Period::parse(p)?,
                    None => Period::Daily,
                },
                limit: match non_blank(&params.limit) {
                    Some(l) => parse_limit(l, config.max_history_limit)?,
                    None => DEFAULT_HISTORY_LIMIT,
                },
            },
            Some("devices") => QueryIntent::Devices,
            Some(other) => return Err(Error::invalid_query(format!("unknown query type '{other}'"))),
        };

        let device = non_blank(&params.device_id).map(str::to_string);

        Ok(Self { intent, device })
    }
}

/// A present but blank parameter counts as absent.
fn non_blank(param: &Option<String>) -> Option<&str> {
    param.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_limit(raw: &str, max: u32) -> Result<u32> {
    let limit: u32 = raw
        .trim()
        .parse()
        .map_err(|_| Error::invalid_query(format!("limit '{raw}' is not a positive integer")))?;
    if limit == 0 || limit > max {
        return Err(Error::invalid_query(format!(
            "limit must be between 1 and {max}, got {limit}"
        )));
    }
    Ok(limit)
}

/// Parse a lookback such as `-5m`, `30s`, `2h`, `1d` or `1w`.
pub fn parse_range(spec: &str, max: Duration) -> Result<Duration> {
    let trimmed = spec.trim();
    let body = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let invalid = || Error::invalid_query(format!("unsupported range '{spec}'"));

    let split = body
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (amount, unit) = body.split_at(split);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;

    let window = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        _ => None,
    }
    .ok_or_else(invalid)?;

    if window <= Duration::zero() {
        return Err(Error::invalid_query(format!("range '{spec}' must be positive")));
    }
    if window > max {
        return Err(Error::invalid_query(format!(
            "range '{spec}' exceeds the maximum of {}s",
            max.num_seconds()
        )));
    }
    Ok(window)
}
