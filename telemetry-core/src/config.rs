//! Gateway settings.
//!
//! Loaded from defaults overlaid with `GATEWAY_*` environment variables,
//! e.g. `GATEWAY_TIMEZONE=America/Sao_Paulo` or `GATEWAY_MAX_HISTORY_LIMIT=90`.
//!
//! | Key                          | Default                  |
//! |------------------------------|--------------------------|
//! | `bind_addr`                  | `0.0.0.0:8080`           |
//! | `influxdb_url`               | `http://localhost:8086`  |
//! | `secret_id`                  | `influxdb-credentials`   |
//! | `timezone`                   | `America/Sao_Paulo`      |
//! | `max_history_limit`          | `366`                    |
//! | `history_slack_days`         | `3`                      |
//! | `history_slack_months`       | `1`                      |
//! | `max_range_secs`             | `604800` (7 days)        |
//! | `longterm_bucket_suffix`     | `_longterm`              |
//! | `daily_energy_accumulation`  | `cumulative`             |
//! | `request_deadline_secs`      | `25`                     |

use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;

/// How the daily energy field accumulates within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accumulation {
    /// Each point is the running total so far today; the last one is the day's total.
    Cumulative,
    /// Each point is an increment; the day's total is their sum.
    Incremental,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub influxdb_url: String,
    pub secret_id: String,
    pub timezone: Tz,
    pub max_history_limit: u32,
    pub history_slack_days: u32,
    pub history_slack_months: u32,
    pub max_range_secs: u64,
    pub longterm_bucket_suffix: String,
    pub daily_energy_accumulation: Accumulation,
    pub request_deadline_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_builder(
            config::Config::builder().add_source(
                config::Environment::with_prefix("GATEWAY").try_parsing(true),
            ),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let settings = builder
            .set_default("bind_addr", "0.0.0.0:8080")?
            .set_default("influxdb_url", "http://localhost:8086")?
            .set_default("secret_id", "influxdb-credentials")?
            .set_default("timezone", "America/Sao_Paulo")?
            .set_default("max_history_limit", 366)?
            .set_default("history_slack_days", 3)?
            .set_default("history_slack_months", 1)?
            .set_default("max_range_secs", 7 * 24 * 3600)?
            .set_default("longterm_bucket_suffix", "_longterm")?
            .set_default("daily_energy_accumulation", "cumulative")?
            .set_default("request_deadline_secs", 25)?
            .build()?
            .try_deserialize()
            .context("invalid gateway settings")?;
        Ok(settings)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    pub fn planner(&self) -> PlannerConfig {
        PlannerConfig {
            timezone: self.timezone,
            max_history_limit: self.max_history_limit,
            history_slack_days: self.history_slack_days,
            history_slack_months: self.history_slack_months,
            max_range: chrono::Duration::seconds(self.max_range_secs as i64),
            daily_energy_accumulation: self.daily_energy_accumulation,
            ..PlannerConfig::default()
        }
    }
}

/// Series coordinates within a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub measurement: String,
    pub field: String,
}

impl Series {
    pub fn new(measurement: &str, field: &str) -> Self {
        Self {
            measurement: measurement.to_string(),
            field: field.to_string(),
        }
    }
}

/// Everything the planner needs to turn an intent into query specs.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub timezone: Tz,
    pub max_history_limit: u32,
    pub history_slack_days: u32,
    pub history_slack_months: u32,
    pub max_range: chrono::Duration,
    pub daily_energy_accumulation: Accumulation,
    /// Raw current samples written by devices.
    pub current: Series,
    /// Per-day energy totals kept in the long-term bucket.
    pub daily_energy: Series,
    /// Tag that identifies the reporting device.
    pub device_tag: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Sao_Paulo,
            max_history_limit: 366,
            history_slack_days: 3,
            history_slack_months: 1,
            max_range: chrono::Duration::days(7),
            daily_energy_accumulation: Accumulation::Cumulative,
            current: Series::new("environment", "current"),
            daily_energy: Series::new("energia_diaria", "kwh_total_diario"),
            device_tag: "device".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_overrides() {
        let s = Settings::from_builder(config::Config::builder()).unwrap();
        assert_eq!(s.bind_addr, "0.0.0.0:8080");
        assert_eq!(s.timezone, chrono_tz::America::Sao_Paulo);
        assert_eq!(s.max_history_limit, 366);
        assert_eq!(s.daily_energy_accumulation, Accumulation::Cumulative);
        assert_eq!(s.request_deadline(), Duration::from_secs(25));
    }

    #[test]
    fn overrides_are_applied() {
        let builder = config::Config::builder()
            .set_override("timezone", "Europe/Lisbon")
            .unwrap()
            .set_override("daily_energy_accumulation", "incremental")
            .unwrap()
            .set_override("max_history_limit", 30)
            .unwrap();
        let s = Settings::from_builder(builder).unwrap();
        let planner = s.planner();
        assert_eq!(planner.timezone, chrono_tz::Europe::Lisbon);
        assert_eq!(planner.daily_energy_accumulation, Accumulation::Incremental);
        assert_eq!(planner.max_history_limit, 30);
        assert_eq!(planner.current, Series::new("environment", "current"));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let builder = config::Config::builder()
            .set_override("timezone", "Mars/Olympus_Mons")
            .unwrap();
        assert!(Settings::from_builder(builder).is_err());
    }
}
