//! Event store contract. The engine talks to the columnar store only
//! through this trait: a query template plus named parameters in, typed
//! rows out, one terminal error on failure (no partial delivery).

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::BeaconResult;
use crate::types::QueryContext;

/// A value bound to a named query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    StrList(Vec<String>),
}

/// Named parameter map. Ordered so that generated queries are
/// reproducible in tests.
pub type Params = BTreeMap<String, ParamValue>;

/// One executable query: template string with `{name:Type}` placeholders
/// plus the parameter map that fills them server-side.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub sql: String,
    pub params: Params,
}

/// One (visitor, step-match) row returned by the store. `referrer` is the
/// visitor's first-touch referrer when attribution was requested, empty
/// otherwise. May contain duplicates per visitor/step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEventRow {
    pub step_number: u32,
    pub step_name: String,
    pub visitor_id: String,
    pub timestamp: i64,
    pub referrer: String,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Execute a unioned step query and return all matching rows.
    async fn fetch_step_events(&self, spec: &QuerySpec) -> BeaconResult<Vec<StepEventRow>>;

    /// Count distinct visitors site-wide in the requested date range.
    /// Used as the baseline for goal conversion rates.
    async fn distinct_visitors(&self, ctx: &QueryContext) -> BeaconResult<u64>;
}
