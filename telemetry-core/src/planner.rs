//! Intent → backend query plan.
//!
//! | Intent            | Bucket    | Series                 | Range                        | Window | Agg                |
//! |-------------------|-----------|------------------------|------------------------------|--------|--------------------|
//! | Latest            | raw       | environment/current    | last 5 minutes               | -      | last               |
//! | Range{w}          | raw       | environment/current    | last `w`                     | 10s    | mean               |
//! | Summary (today)   | long-term | daily energy           | local midnight → now         | -      | per accumulation   |
//! | Summary (month)   | long-term | daily energy           | local month start → now      | 1d/-   | last per day / sum |
//! | History{daily}    | long-term | daily energy           | `limit` + slack local days   | 1d     | per accumulation   |
//! | History{monthly}  | long-term | daily energy           | `limit` + slack local months | 1d     | per accumulation   |
//!
//! Monthly history never uses backend monthly windows; the daily rows are
//! rolled up in-process (see [`crate::rollup`]).

use chrono::{DateTime, Duration, Utc};

use crate::calendar;
use crate::config::{Accumulation, PlannerConfig, Series};
use crate::intent::{Period, QueryIntent, QueryRequest};
use crate::store::{AggFn, BucketRef, QuerySpec, TagFilter, TimeRange};

const LATEST_LOOKBACK_SECS: i64 = 5 * 60;
const RANGE_WINDOW_SECS: i64 = 10;

/// Backend work for one request, shaped per intent.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    Latest(QuerySpec),
    Range(QuerySpec),
    Summary { today: QuerySpec, month: QuerySpec },
    History { period: Period, limit: u32, daily: QuerySpec },
    Devices { bucket: BucketRef, tag: String },
}

impl QueryPlan {
    /// Every spec the plan will execute, in execution order.
    pub fn specs(&self) -> Vec<&QuerySpec> {
        match self {
            QueryPlan::Latest(s) | QueryPlan::Range(s) => vec![s],
            QueryPlan::Summary { today, month } => vec![today, month],
            QueryPlan::History { daily, .. } => vec![daily],
            QueryPlan::Devices { .. } => Vec::new(),
        }
    }
}

pub struct QueryPlanner {
    config: PlannerConfig,
}

impl QueryPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, request: &QueryRequest, now: DateTime<Utc>) -> QueryPlan {
        let tag_filter = request.device.as_ref().map(|d| TagFilter {
            key: self.config.device_tag.clone(),
            value: d.clone(),
        });
        let tz = self.config.timezone;

        match request.intent {
            QueryIntent::Latest => QueryPlan::Latest(QuerySpec {
                tag_filter,
                agg: Some(AggFn::Last),
                ..self.spec(
                    BucketRef::Raw,
                    &self.config.current,
                    since(now - Duration::seconds(LATEST_LOOKBACK_SECS)),
                )
            }),

            QueryIntent::Range { window } => QueryPlan::Range(QuerySpec {
                tag_filter,
                window: Some(Duration::seconds(RANGE_WINDOW_SECS)),
                agg: Some(AggFn::Mean),
                ..self.spec(BucketRef::Raw, &self.config.current, since(now - window))
            }),

            QueryIntent::Summary => {
                let today = QuerySpec {
                    tag_filter: tag_filter.clone(),
                    agg: Some(self.daily_agg()),
                    ..self.spec(
                        BucketRef::LongTerm,
                        &self.config.daily_energy,
                        since(calendar::start_of_local_day(now, tz)),
                    )
                };
                let month_range = since(calendar::start_of_local_month(now, tz));
                let month = match self.config.daily_energy_accumulation {
                    // Running totals: one value per local day, summed in-process.
                    Accumulation::Cumulative => self.daily_spec(month_range, tag_filter),
                    Accumulation::Incremental => QuerySpec {
                        tag_filter,
                        agg: Some(AggFn::Sum),
                        ..self.spec(BucketRef::LongTerm, &self.config.daily_energy, month_range)
                    },
                };
                QueryPlan::Summary { today, month }
            }

            QueryIntent::History { period, limit } => {
                let today = calendar::local_date(now, tz);
                let first_day = match period {
                    Period::Daily => {
                        let lookback = (limit.saturating_sub(1) + self.config.history_slack_days) as i64;
                        today - Duration::days(lookback)
                    }
                    Period::Monthly => {
                        calendar::months_back(
                            today,
                            limit.saturating_sub(1) + self.config.history_slack_months,
                        )
                    }
                };
                let range = since(calendar::local_midnight(first_day, tz));
                QueryPlan::History {
                    period,
                    limit,
                    daily: self.daily_spec(range, tag_filter),
                }
            }

            QueryIntent::Devices => QueryPlan::Devices {
                bucket: BucketRef::Raw,
                tag: self.config.device_tag.clone(),
            },
        }
    }

    /// The per-day aggregate that yields a day's total.
    fn daily_agg(&self) -> AggFn {
        match self.config.daily_energy_accumulation {
            Accumulation::Cumulative => AggFn::Last,
            Accumulation::Incremental => AggFn::Sum,
        }
    }

    /// One row per local day of daily energy.
    fn daily_spec(&self, range: TimeRange, tag_filter: Option<TagFilter>) -> QuerySpec {
        QuerySpec {
            tag_filter,
            window: Some(Duration::days(1)),
            agg: Some(self.daily_agg()),
            timezone: Some(self.config.timezone),
            ..self.spec(BucketRef::LongTerm, &self.config.daily_energy, range)
        }
    }

    fn spec(&self, bucket: BucketRef, series: &Series, range: TimeRange) -> QuerySpec {
        QuerySpec {
            bucket,
            measurement: series.measurement.clone(),
            field: series.field.clone(),
            tag_filter: None,
            range,
            window: None,
            agg: None,
            timezone: None,
        }
    }
}

fn since(start: DateTime<Utc>) -> TimeRange {
    TimeRange { start, stop: None }
}
