//! ClickHouse-backed implementation of the event store contract.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use beacon_core::config::ClickHouseConfig;
use beacon_core::error::{BeaconError, BeaconResult};
use beacon_core::store::{EventStore, ParamValue, QuerySpec, StepEventRow};
use beacon_core::types::QueryContext;

/// Event store client over the ClickHouse HTTP interface. Queries are
/// bound with server-side `{name:Type}` parameters, never interpolated.
#[derive(Clone)]
pub struct ClickHouseEventStore {
    client: clickhouse::Client,
}

/// Wire row for the unioned step query. Field order must match the
/// SELECT column order (RowBinary is positional).
#[derive(Debug, clickhouse::Row, Deserialize)]
struct EventRowRecord {
    step_number: u32,
    step_name: String,
    anonymous_id: String,
    first_occurrence: i64,
    referrer: String,
}

impl ClickHouseEventStore {
    pub fn new(config: &ClickHouseConfig) -> Self {
        let client = clickhouse::Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.username)
            .with_password(&config.password);

        Self { client }
    }

    fn bind(&self, spec: &QuerySpec) -> clickhouse::query::Query {
        let mut query = self.client.query(&spec.sql);
        for (name, value) in &spec.params {
            query = match value {
                ParamValue::Str(s) => query.param(name, s),
                ParamValue::StrList(list) => query.param(name, list.as_slice()),
            };
        }
        query
    }
}

#[async_trait]
impl EventStore for ClickHouseEventStore {
    async fn fetch_step_events(&self, spec: &QuerySpec) -> BeaconResult<Vec<StepEventRow>> {
        metrics::counter!("store.queries").increment(1);

        let rows = self
            .bind(spec)
            .fetch_all::<EventRowRecord>()
            .await
            .map_err(|e| {
                metrics::counter!("store.query_errors").increment(1);
                BeaconError::QueryFailed(e.to_string())
            })?;

        metrics::counter!("store.rows_fetched").increment(rows.len() as u64);
        debug!(rows = rows.len(), "Step event query returned");

        Ok(rows
            .into_iter()
            .map(|r| StepEventRow {
                step_number: r.step_number,
                step_name: r.step_name,
                visitor_id: r.anonymous_id,
                timestamp: r.first_occurrence,
                referrer: r.referrer,
            })
            .collect())
    }

    async fn distinct_visitors(&self, ctx: &QueryContext) -> BeaconResult<u64> {
        metrics::counter!("store.queries").increment(1);

        let total = self
            .client
            .query(
                "SELECT COUNT(DISTINCT anonymous_id)
                 FROM analytics.events
                 WHERE client_id = {website_id:String}
                   AND time >= parseDateTimeBestEffort({start_date:String})
                   AND time <= parseDateTimeBestEffort({end_date:String})
                   AND event_name = 'screen_view'",
            )
            .param("website_id", &ctx.website_id)
            .param("start_date", &ctx.start_date)
            .param("end_date", &ctx.end_date)
            .fetch_one::<u64>()
            .await
            .map_err(|e| {
                metrics::counter!("store.query_errors").increment(1);
                BeaconError::QueryFailed(e.to_string())
            })?;

        Ok(total)
    }
}
