//! Engine-level tests for the full funnel analysis flow, driven through a
//! mock event store with fixture rows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use beacon_core::error::{BeaconError, BeaconResult};
use beacon_core::store::{EventStore, QuerySpec, StepEventRow};
use beacon_core::types::{QueryContext, Step, StepKind};
use beacon_funnel::FunnelEngine;

struct MockStore {
    rows: Vec<StepEventRow>,
    visitors: u64,
    fail: bool,
    queries_issued: Arc<AtomicUsize>,
}

impl MockStore {
    fn with_rows(rows: Vec<StepEventRow>) -> Self {
        Self {
            rows,
            visitors: 0,
            fail: false,
            queries_issued: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing() -> Self {
        let mut store = Self::with_rows(Vec::new());
        store.fail = true;
        store
    }
}

#[async_trait]
impl EventStore for MockStore {
    async fn fetch_step_events(&self, _spec: &QuerySpec) -> BeaconResult<Vec<StepEventRow>> {
        self.queries_issued.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BeaconError::QueryFailed("connection reset".to_string()));
        }
        Ok(self.rows.clone())
    }

    async fn distinct_visitors(&self, _ctx: &QueryContext) -> BeaconResult<u64> {
        Ok(self.visitors)
    }
}

fn row(step: u32, visitor: &str, ts: i64, referrer: &str) -> StepEventRow {
    StepEventRow {
        step_number: step,
        step_name: format!("step {step}"),
        visitor_id: visitor.to_string(),
        timestamp: ts,
        referrer: referrer.to_string(),
    }
}

fn steps() -> Vec<Step> {
    [
        (1, "view_landing", "/landing", StepKind::PageView),
        (2, "signup", "signup", StepKind::Event),
        (3, "purchase", "purchase", StepKind::Event),
    ]
    .into_iter()
    .map(|(n, name, target, kind)| Step {
        step_number: n,
        name: name.to_string(),
        kind,
        target: target.to_string(),
    })
    .collect()
}

fn ctx() -> QueryContext {
    QueryContext {
        website_id: "site-1".into(),
        start_date: "2026-07-01".into(),
        end_date: "2026-07-31 23:59:59".into(),
    }
}

#[tokio::test]
async fn test_three_step_funnel_end_to_end() {
    // Visitor a completes every step; visitor b skips signup.
    let store = MockStore::with_rows(vec![
        row(1, "a", 0, ""),
        row(2, "a", 10, ""),
        row(3, "a", 20, ""),
        row(1, "b", 0, ""),
        row(3, "b", 5, ""),
    ]);
    let engine = FunnelEngine::new(store);

    let report = engine.analyze(&steps(), &[], &ctx()).await.unwrap();

    let users: Vec<u64> = report.steps_analytics.iter().map(|s| s.users).collect();
    assert_eq!(users, vec![2, 1, 1]);
    assert_eq!(report.steps_analytics[2].avg_time_to_complete, 10.0);
    assert_eq!(report.avg_completion_time, 20.0);
    assert_eq!(report.avg_completion_time_formatted, "20s");
    assert_eq!(report.overall_conversion_rate, 50.0);
}

#[tokio::test]
async fn test_duplicate_rows_do_not_inflate_counts() {
    let store = MockStore::with_rows(vec![
        row(1, "a", 0, ""),
        row(1, "a", 0, ""),
        row(2, "a", 10, ""),
    ]);
    let engine = FunnelEngine::new(store);

    let mut two_steps = steps();
    two_steps.truncate(2);
    let report = engine.analyze(&two_steps, &[], &ctx()).await.unwrap();

    assert_eq!(report.total_users_entered, 1);
    assert_eq!(report.total_users_completed, 1);
}

#[tokio::test]
async fn test_invalid_steps_rejected_before_any_query() {
    let store = MockStore::with_rows(vec![]);
    let queries_issued = store.queries_issued.clone();
    let engine = FunnelEngine::new(store);

    let mut bad_steps = steps();
    bad_steps[1].step_number = 5;

    let result = engine.analyze(&bad_steps, &[], &ctx()).await;
    assert!(matches!(result, Err(BeaconError::InvalidArgument(_))));
    assert_eq!(queries_issued.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_store_failure_propagates_without_partial_report() {
    let engine = FunnelEngine::new(MockStore::failing());
    let result = engine.analyze(&steps(), &[], &ctx()).await;
    assert!(matches!(result, Err(BeaconError::QueryFailed(_))));
}

#[tokio::test]
async fn test_referrer_segmentation_end_to_end() {
    // Both visitors first-touched from google; only one finishes.
    let store = MockStore::with_rows(vec![
        row(1, "a", 0, "https://google.com/"),
        row(2, "a", 10, "https://google.com/"),
        row(3, "a", 20, "https://google.com/"),
        row(1, "b", 0, "https://google.com/"),
        row(2, "b", 10, "https://google.com/"),
    ]);
    let engine = FunnelEngine::new(store);

    let report = engine
        .analyze_by_referrer(&steps(), &[], &ctx())
        .await
        .unwrap();

    assert_eq!(report.referrer_analytics.len(), 1);
    let segment = &report.referrer_analytics[0];
    assert_eq!(segment.referrer, "google.com");
    assert_eq!(segment.total_users, 2);
    assert_eq!(segment.completed_users, 1);
    assert_eq!(segment.conversion_rate, 50.0);
}

#[tokio::test]
async fn test_goal_against_site_baseline() {
    let rows: Vec<StepEventRow> = (0..37)
        .map(|i| row(1, &format!("v{i}"), i, ""))
        .collect();
    let mut store = MockStore::with_rows(rows);
    store.visitors = 100;
    let engine = FunnelEngine::new(store);

    let goal_step = Step {
        step_number: 1,
        name: "signup".to_string(),
        kind: StepKind::Event,
        target: "signup".to_string(),
    };
    let context = ctx();
    let baseline = engine.total_website_users(&context).await.unwrap();
    let report = engine
        .analyze_goal(&goal_step, &[], &context, baseline)
        .await
        .unwrap();

    assert_eq!(report.overall_conversion_rate, 37.0);
    assert_eq!(report.total_users_entered, 100);
    assert_eq!(report.total_users_completed, 37);
    assert_eq!(report.steps_analytics.len(), 1);
}

#[tokio::test]
async fn test_identical_input_in_any_order_yields_identical_report() {
    let fixture = vec![
        row(1, "a", 0, ""),
        row(2, "a", 10, ""),
        row(3, "a", 20, ""),
        row(1, "b", 0, ""),
        row(2, "b", 7, ""),
        row(1, "c", 3, ""),
    ];
    let mut shuffled = fixture.clone();
    shuffled.reverse();
    shuffled.swap(0, 3);

    let first = FunnelEngine::new(MockStore::with_rows(fixture))
        .analyze(&steps(), &[], &ctx())
        .await
        .unwrap();
    let second = FunnelEngine::new(MockStore::with_rows(shuffled))
        .analyze(&steps(), &[], &ctx())
        .await
        .unwrap();

    assert_eq!(first, second);
}
