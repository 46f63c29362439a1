//! Funnel engine orchestration: validate the request, dispatch the unioned
//! query, assemble timelines, match, aggregate. Stateless and
//! request-scoped; a store failure aborts the whole computation, so no
//! partial report is ever produced.

use std::sync::Arc;

use tracing::debug;

use beacon_core::error::{BeaconError, BeaconResult};
use beacon_core::store::EventStore;
use beacon_core::types::{Filter, FunnelReport, QueryContext, ReferrerReport, Step};

use crate::matcher::run_matcher;
use crate::metrics::{build_report, goal_report};
use crate::query::build_funnel_query;
use crate::referrer::{KnownReferrerTable, ReferrerLookup};
use crate::segment::segment_by_referrer;
use crate::timeline::assemble;

pub struct FunnelEngine<S> {
    store: S,
    referrers: Arc<dyn ReferrerLookup>,
}

impl<S: EventStore> FunnelEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            referrers: Arc::new(KnownReferrerTable),
        }
    }

    pub fn with_referrer_lookup(store: S, referrers: Arc<dyn ReferrerLookup>) -> Self {
        Self { store, referrers }
    }

    /// Distinct visitors site-wide in range; the goal-conversion baseline.
    pub async fn total_website_users(&self, ctx: &QueryContext) -> BeaconResult<u64> {
        self.store.distinct_visitors(ctx).await
    }

    /// Whole-population funnel analysis.
    pub async fn analyze(
        &self,
        steps: &[Step],
        filters: &[Filter],
        ctx: &QueryContext,
    ) -> BeaconResult<FunnelReport> {
        validate_steps(steps)?;

        let spec = build_funnel_query(steps, filters, ctx, false)?;
        let rows = self.store.fetch_step_events(&spec).await?;
        let timelines = assemble(rows);
        let matched = run_matcher(timelines.iter(), steps.len());

        debug!(
            website_id = %ctx.website_id,
            steps = steps.len(),
            visitors = timelines.len(),
            "Funnel analysis complete"
        );

        Ok(build_report(steps, &matched))
    }

    /// Funnel analysis segmented by first-touch referrer. Reuses the
    /// assembled timelines; the matcher reruns per referrer group.
    pub async fn analyze_by_referrer(
        &self,
        steps: &[Step],
        filters: &[Filter],
        ctx: &QueryContext,
    ) -> BeaconResult<ReferrerReport> {
        validate_steps(steps)?;

        let spec = build_funnel_query(steps, filters, ctx, true)?;
        let rows = self.store.fetch_step_events(&spec).await?;
        let timelines = assemble(rows);
        let referrer_analytics =
            segment_by_referrer(&timelines, steps.len(), self.referrers.as_ref());

        debug!(
            website_id = %ctx.website_id,
            segments = referrer_analytics.len(),
            "Referrer segmentation complete"
        );

        Ok(ReferrerReport { referrer_analytics })
    }

    /// Goal evaluation: a single-step funnel measured against the supplied
    /// site-wide visitor baseline rather than the funnel-entry count.
    pub async fn analyze_goal(
        &self,
        step: &Step,
        filters: &[Filter],
        ctx: &QueryContext,
        total_website_users: u64,
    ) -> BeaconResult<FunnelReport> {
        let steps = std::slice::from_ref(step);
        validate_steps(steps)?;

        let spec = build_funnel_query(steps, filters, ctx, false)?;
        let rows = self.store.fetch_step_events(&spec).await?;
        let timelines = assemble(rows);
        let matched = run_matcher(timelines.iter(), 1);
        let completions = matched.completions[0].len() as u64;

        Ok(goal_report(step, completions, total_website_users))
    }
}

fn validate_steps(steps: &[Step]) -> BeaconResult<()> {
    if steps.is_empty() {
        return Err(BeaconError::InvalidArgument(
            "funnel must have at least one step".to_string(),
        ));
    }
    for (position, step) in steps.iter().enumerate() {
        let expected = (position + 1) as u32;
        if step.step_number != expected {
            return Err(BeaconError::InvalidArgument(format!(
                "step numbers must be contiguous from 1: expected {expected}, found {}",
                step.step_number
            )));
        }
    }
    Ok(())
}
