//! Step query dispatcher: builds one parameterized SELECT per funnel step
//! and unions them into a single request against the event store. Page
//! view steps match the path exactly or as a substring pattern (tolerates
//! trailing slashes and query strings); event steps union the generic and
//! custom event streams, which may live in separate tables.

use beacon_core::error::BeaconResult;
use beacon_core::store::{ParamValue, Params, QuerySpec};
use beacon_core::types::{Filter, QueryContext, Step, StepKind};

use crate::filters::{compile_filters, escape_like};

/// Build the unioned funnel query. All parameters share one map; filter
/// and step parameters are index-qualified so nothing collides.
pub fn build_funnel_query(
    steps: &[Step],
    filters: &[Filter],
    ctx: &QueryContext,
    include_referrer: bool,
) -> BeaconResult<QuerySpec> {
    let mut params = Params::new();
    params.insert(
        "website_id".to_string(),
        ParamValue::Str(ctx.website_id.clone()),
    );
    params.insert(
        "start_date".to_string(),
        ParamValue::Str(ctx.start_date.clone()),
    );
    params.insert("end_date".to_string(), ParamValue::Str(ctx.end_date.clone()));

    let filter_conditions = compile_filters(filters, "f", &mut params)?;

    let step_queries: Vec<String> = steps
        .iter()
        .enumerate()
        .map(|(index, step)| build_step_query(step, index, &filter_conditions, &mut params))
        .collect();
    let unioned = step_queries.join("\nUNION ALL\n");

    let sql = if include_referrer {
        format!(
            "WITH visitor_referrers AS (
    SELECT anonymous_id, argMin(referrer, time) AS visitor_referrer
    FROM analytics.events
    WHERE client_id = {{website_id:String}}
      AND time >= parseDateTimeBestEffort({{start_date:String}})
      AND time <= parseDateTimeBestEffort({{end_date:String}})
      AND event_name = 'screen_view'
      AND referrer != ''
    GROUP BY anonymous_id
),
all_step_events AS (
{unioned}
)
SELECT DISTINCT
    s.step_number,
    s.step_name,
    s.anonymous_id,
    s.first_occurrence,
    COALESCE(vr.visitor_referrer, '') AS referrer
FROM all_step_events AS s
LEFT JOIN visitor_referrers AS vr ON s.anonymous_id = vr.anonymous_id
ORDER BY s.anonymous_id, s.first_occurrence"
        )
    } else {
        format!(
            "WITH all_step_events AS (
{unioned}
)
SELECT DISTINCT
    step_number,
    step_name,
    anonymous_id,
    first_occurrence,
    '' AS referrer
FROM all_step_events
ORDER BY anonymous_id, first_occurrence"
        )
    };

    Ok(QuerySpec { sql, params })
}

fn build_step_query(
    step: &Step,
    index: usize,
    filter_conditions: &str,
    params: &mut Params,
) -> String {
    let step_number = step.step_number;
    let name_key = format!("step_name_{index}");
    params.insert(name_key.clone(), ParamValue::Str(step.name.clone()));
    let target_key = format!("target_{index}");
    params.insert(target_key.clone(), ParamValue::Str(step.target.clone()));

    match step.kind {
        StepKind::PageView => {
            let like_key = format!("{target_key}_like");
            params.insert(
                like_key.clone(),
                ParamValue::Str(format!("%{}%", escape_like(&step.target))),
            );
            format!(
                "SELECT
    {step_number} AS step_number,
    {{{name_key}:String}} AS step_name,
    anonymous_id,
    toInt64(toUnixTimestamp(MIN(time))) AS first_occurrence
FROM analytics.events
WHERE client_id = {{website_id:String}}
  AND time >= parseDateTimeBestEffort({{start_date:String}})
  AND time <= parseDateTimeBestEffort({{end_date:String}})
  AND event_name = 'screen_view'
  AND (path = {{{target_key}:String}} OR path LIKE {{{like_key}:String}}){filter_conditions}
GROUP BY anonymous_id"
            )
        }
        StepKind::Event => format!(
            "SELECT
    {step_number} AS step_number,
    {{{name_key}:String}} AS step_name,
    anonymous_id,
    toInt64(toUnixTimestamp(MIN(first_occurrence))) AS first_occurrence
FROM (
    SELECT anonymous_id, time AS first_occurrence
    FROM analytics.events
    WHERE client_id = {{website_id:String}}
      AND time >= parseDateTimeBestEffort({{start_date:String}})
      AND time <= parseDateTimeBestEffort({{end_date:String}})
      AND event_name = {{{target_key}:String}}{filter_conditions}
    UNION ALL
    SELECT anonymous_id, timestamp AS first_occurrence
    FROM analytics.custom_events
    WHERE client_id = {{website_id:String}}
      AND timestamp >= parseDateTimeBestEffort({{start_date:String}})
      AND timestamp <= parseDateTimeBestEffort({{end_date:String}})
      AND event_name = {{{target_key}:String}}
) AS event_union
GROUP BY anonymous_id"
        ),
    }
}
