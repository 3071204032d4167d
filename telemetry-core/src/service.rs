//! Request orchestration: plan → execute → normalize.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::PlannerConfig;
use crate::error::Result;
use crate::ingest::{self, IngestRequest, WriteResult};
use crate::intent::{Period, QueryParams, QueryRequest};
use crate::normalizer::{self, OutputPayload};
use crate::planner::{QueryPlan, QueryPlanner};
use crate::store::TimeSeriesStore;

/// The gateway core. One instance per process, shared across requests.
pub struct TelemetryService {
    planner: QueryPlanner,
    store: Arc<dyn TimeSeriesStore>,
}

impl TelemetryService {
    pub fn new(config: PlannerConfig, store: Arc<dyn TimeSeriesStore>) -> Self {
        Self {
            planner: QueryPlanner::new(config),
            store,
        }
    }

    /// Validate, plan and run a read request against the current clock.
    pub async fn query(&self, params: &QueryParams) -> Result<OutputPayload> {
        self.query_at(params, Utc::now()).await
    }

    pub async fn query_at(&self, params: &QueryParams, now: DateTime<Utc>) -> Result<OutputPayload> {
        let request = QueryRequest::parse(params, self.planner.config())?;
        let plan = self.planner.plan(&request, now);
        self.execute(plan).await
    }

    /// Specs run one after another; a failure aborts the whole request.
    async fn execute(&self, plan: QueryPlan) -> Result<OutputPayload> {
        let tz = self.planner.config().timezone;
        let payload = match plan {
            QueryPlan::Latest(spec) => {
                OutputPayload::Latest(normalizer::latest(self.store.query(&spec).await?))
            }
            QueryPlan::Range(spec) => {
                OutputPayload::Range(normalizer::range(self.store.query(&spec).await?))
            }
            QueryPlan::Summary { today, month } => {
                let today_rows = self.store.query(&today).await?;
                let month_rows = self.store.query(&month).await?;
                if month_rows.is_empty() && !today_rows.is_empty() {
                    warn!("month-to-date query returned no rows, falling back to today's total");
                }
                OutputPayload::Summary(normalizer::summary(today_rows, month_rows))
            }
            QueryPlan::History {
                period,
                limit,
                daily,
            } => {
                let rows = self.store.query(&daily).await?;
                let limit = limit as usize;
                OutputPayload::History(match period {
                    Period::Daily => normalizer::daily_history(&rows, limit, tz),
                    Period::Monthly => normalizer::monthly_history(&rows, limit, tz),
                })
            }
            QueryPlan::Devices { bucket, tag } => {
                OutputPayload::Devices(normalizer::devices(self.store.tag_values(bucket, &tag).await?))
            }
        };
        Ok(payload)
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<WriteResult> {
        let sample = request.into_sample()?;
        ingest::ingest(self.store.as_ref(), self.planner.config(), sample).await
    }
}
