//! Metrics aggregator: turns completion sets and transition timings into
//! the funnel report consumed by the dashboard. All rates go through the
//! zero-safe `pct` helper, so no NaN or Infinity ever surfaces.

use beacon_core::types::{FunnelReport, Step, StepMetrics};

use crate::matcher::MatchResult;

/// Placeholder rendered when a duration is zero or undefined.
pub const EMPTY_DURATION: &str = "—";

/// Percentage of `num` over `denom`, rounded to two decimals.
/// `pct(x, 0)` is 0 for any x.
pub fn pct(num: u64, denom: u64) -> f64 {
    if denom == 0 {
        return 0.0;
    }
    round2(num as f64 / denom as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean_secs(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round2(values.iter().sum::<i64>() as f64 / values.len() as f64)
}

/// Human-readable duration: "Xh Ym", "Xm Ys", or "Xs".
pub fn format_duration(seconds: f64) -> String {
    if seconds <= 0.0 || !seconds.is_finite() {
        return EMPTY_DURATION.to_string();
    }

    let total = seconds.round() as u64;
    if total >= 3600 {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    } else if total >= 60 {
        format!("{}m {}s", total / 60, total % 60)
    } else {
        format!("{total}s")
    }
}

/// Assemble the full funnel report from a match result.
pub fn build_report(steps: &[Step], matched: &MatchResult) -> FunnelReport {
    let users: Vec<u64> = matched
        .completions
        .iter()
        .map(|set| set.len() as u64)
        .collect();
    let total_users = users.first().copied().unwrap_or(0);

    let mut steps_analytics = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let previous = if i == 0 { users[0] } else { users[i - 1] };
        let dropoffs = if i == 0 { 0 } else { previous - users[i] };

        steps_analytics.push(StepMetrics {
            step_number: step.step_number,
            step_name: step.name.clone(),
            users: users[i],
            total_users,
            conversion_rate: if i == 0 { 100.0 } else { pct(users[i], previous) },
            dropoffs,
            dropoff_rate: if i == 0 { 0.0 } else { pct(dropoffs, previous) },
            avg_time_to_complete: mean_secs(&matched.transitions[i]),
        });
    }

    let completed = users.last().copied().unwrap_or(0);
    let avg_completion_time = mean_secs(&matched.completion_durations);

    // Worst transition, earliest step on ties. Single-step funnels have
    // no transitions to compare.
    let (biggest_dropoff_step, biggest_dropoff_rate) = if steps_analytics.len() < 2 {
        (1, 0.0)
    } else {
        let mut worst = (steps_analytics[1].step_number, steps_analytics[1].dropoff_rate);
        for metrics in &steps_analytics[2..] {
            if metrics.dropoff_rate > worst.1 {
                worst = (metrics.step_number, metrics.dropoff_rate);
            }
        }
        worst
    };

    FunnelReport {
        overall_conversion_rate: pct(completed, total_users),
        total_users_entered: total_users,
        total_users_completed: completed,
        avg_completion_time,
        avg_completion_time_formatted: format_duration(avg_completion_time),
        biggest_dropoff_step,
        biggest_dropoff_rate,
        steps_analytics,
    }
}

/// Single-step goal report, measured against the site-wide visitor
/// baseline instead of the funnel-entry count. No dropoff semantics.
pub fn goal_report(step: &Step, completions: u64, total_website_users: u64) -> FunnelReport {
    let conversion_rate = pct(completions, total_website_users);

    FunnelReport {
        overall_conversion_rate: conversion_rate,
        total_users_entered: total_website_users,
        total_users_completed: completions,
        avg_completion_time: 0.0,
        avg_completion_time_formatted: EMPTY_DURATION.to_string(),
        biggest_dropoff_step: 1,
        biggest_dropoff_rate: 0.0,
        steps_analytics: vec![StepMetrics {
            step_number: 1,
            step_name: step.name.clone(),
            users: completions,
            total_users: total_website_users,
            conversion_rate,
            dropoffs: 0,
            dropoff_rate: 0.0,
            avg_time_to_complete: 0.0,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::run_matcher;
    use crate::timeline::TimelineEvent;
    use beacon_core::types::StepKind;

    fn step(n: u32, name: &str) -> Step {
        Step {
            step_number: n,
            name: name.to_string(),
            kind: StepKind::PageView,
            target: format!("/{name}"),
        }
    }

    fn event(step: u32, ts: i64) -> TimelineEvent {
        TimelineEvent {
            step_number: step,
            timestamp: ts,
            referrer: String::new(),
        }
    }

    #[test]
    fn test_pct_is_zero_safe() {
        assert_eq!(pct(5, 0), 0.0);
        assert_eq!(pct(0, 0), 0.0);
        assert_eq!(pct(1, 3), 33.33);
        assert_eq!(pct(2, 3), 66.67);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), EMPTY_DURATION);
        assert_eq!(format_duration(f64::NAN), EMPTY_DURATION);
        assert_eq!(format_duration(45.0), "45s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(3660.0), "1h 1m");
    }

    #[test]
    fn test_three_step_funnel_with_skipping_visitor() {
        // Visitor a completes all three steps; visitor b skips signup, so
        // the purchase event is never credited.
        let a = "a".to_string();
        let b = "b".to_string();
        let a_timeline = vec![event(1, 0), event(2, 10), event(3, 20)];
        let b_timeline = vec![event(1, 0), event(3, 5)];
        let matched = run_matcher(
            vec![(&a, &a_timeline), (&b, &b_timeline)],
            3,
        );

        let steps = [
            step(1, "view_landing"),
            step(2, "signup"),
            step(3, "purchase"),
        ];
        let report = build_report(&steps, &matched);

        let users: Vec<u64> = report.steps_analytics.iter().map(|s| s.users).collect();
        assert_eq!(users, vec![2, 1, 1]);

        let rates: Vec<f64> = report
            .steps_analytics
            .iter()
            .map(|s| s.conversion_rate)
            .collect();
        assert_eq!(rates, vec![100.0, 50.0, 100.0]);

        assert_eq!(report.steps_analytics[1].dropoff_rate, 50.0);
        assert_eq!(report.steps_analytics[2].avg_time_to_complete, 10.0);
        assert_eq!(report.avg_completion_time, 20.0);
        assert_eq!(report.total_users_entered, 2);
        assert_eq!(report.total_users_completed, 1);
        assert_eq!(report.overall_conversion_rate, 50.0);
        assert_eq!(report.biggest_dropoff_step, 2);
        assert_eq!(report.biggest_dropoff_rate, 50.0);
    }

    #[test]
    fn test_first_step_is_always_full_conversion() {
        let matched = run_matcher(std::iter::empty(), 2);
        let report = build_report(&[step(1, "a"), step(2, "b")], &matched);

        assert_eq!(report.steps_analytics[0].conversion_rate, 100.0);
        assert_eq!(report.steps_analytics[0].dropoffs, 0);
        assert_eq!(report.overall_conversion_rate, 0.0);
        assert_eq!(report.avg_completion_time_formatted, EMPTY_DURATION);
    }

    #[test]
    fn test_user_counts_never_increase() {
        let a = "a".to_string();
        let b = "b".to_string();
        let a_timeline = vec![event(1, 0), event(2, 1), event(3, 2)];
        let b_timeline = vec![event(1, 0), event(2, 1)];
        let matched = run_matcher(vec![(&a, &a_timeline), (&b, &b_timeline)], 3);
        let report = build_report(&[step(1, "a"), step(2, "b"), step(3, "c")], &matched);

        for pair in report.steps_analytics.windows(2) {
            assert!(pair[1].users <= pair[0].users);
        }
    }

    #[test]
    fn test_dropoff_tie_breaks_to_earliest_step() {
        let a = "a".to_string();
        let b = "b".to_string();
        let c = "c".to_string();
        let d = "d".to_string();
        // 4 -> 2 -> 1: both transitions drop 50%.
        let t_a = vec![event(1, 0), event(2, 1), event(3, 2)];
        let t_b = vec![event(1, 0), event(2, 1)];
        let t_c = vec![event(1, 0)];
        let t_d = vec![event(1, 0)];
        let matched = run_matcher(
            vec![(&a, &t_a), (&b, &t_b), (&c, &t_c), (&d, &t_d)],
            3,
        );
        let report = build_report(&[step(1, "a"), step(2, "b"), step(3, "c")], &matched);

        assert_eq!(report.biggest_dropoff_step, 2);
        assert_eq!(report.biggest_dropoff_rate, 50.0);
    }

    #[test]
    fn test_single_step_funnel_defaults() {
        let a = "a".to_string();
        let t_a = vec![event(1, 0)];
        let matched = run_matcher(vec![(&a, &t_a)], 1);
        let report = build_report(&[step(1, "only")], &matched);

        assert_eq!(report.biggest_dropoff_step, 1);
        assert_eq!(report.biggest_dropoff_rate, 0.0);
        assert_eq!(report.overall_conversion_rate, 100.0);
    }

    #[test]
    fn test_goal_report_uses_site_baseline() {
        let report = goal_report(&step(1, "signup"), 37, 100);

        assert_eq!(report.overall_conversion_rate, 37.0);
        assert_eq!(report.total_users_entered, 100);
        assert_eq!(report.total_users_completed, 37);
        assert_eq!(report.steps_analytics.len(), 1);
        assert_eq!(report.steps_analytics[0].dropoffs, 0);
        assert_eq!(report.steps_analytics[0].avg_time_to_complete, 0.0);
    }

    #[test]
    fn test_goal_report_with_zero_baseline() {
        let report = goal_report(&step(1, "signup"), 5, 0);
        assert_eq!(report.overall_conversion_rate, 0.0);
    }

    #[test]
    fn test_report_building_is_pure() {
        let a = "a".to_string();
        let timeline = vec![event(1, 0), event(2, 30)];
        let matched = run_matcher(vec![(&a, &timeline), (&a, &timeline)], 2);
        let steps = [step(1, "enter"), step(2, "convert")];

        assert_eq!(build_report(&steps, &matched), build_report(&steps, &matched));
    }
}
