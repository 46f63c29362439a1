//! Referrer segmenter: partitions visitors by first-touch referrer and
//! reruns the matcher per partition against the already-assembled
//! timeline map. No re-query.

use std::collections::HashMap;

use beacon_core::types::{ParsedReferrer, ReferrerSegment};

use crate::matcher::run_matcher;
use crate::metrics::pct;
use crate::referrer::{parse_referrer, ReferrerLookup};
use crate::timeline::VisitorTimelines;

/// Segments with this many entrants or fewer are dropped as noise.
const MIN_SEGMENT_USERS: u64 = 1;

struct ReferrerGroup {
    parsed: ParsedReferrer,
    visitors: Vec<String>,
}

/// Build per-referrer conversion segments. The segmentation key is the
/// referrer carried on each visitor's first chronological event across
/// all steps (not necessarily their step-1 event).
pub fn segment_by_referrer(
    timelines: &VisitorTimelines,
    step_count: usize,
    lookup: &dyn ReferrerLookup,
) -> Vec<ReferrerSegment> {
    let mut groups: HashMap<String, ReferrerGroup> = HashMap::new();

    for (visitor_id, events) in timelines {
        let Some(first) = events.first() else {
            continue;
        };
        let raw = if first.referrer.is_empty() {
            "Direct"
        } else {
            first.referrer.as_str()
        };
        let parsed = parse_referrer(raw, lookup);
        let key = if parsed.domain.is_empty() {
            "direct".to_string()
        } else {
            parsed.domain.to_ascii_lowercase()
        };

        groups
            .entry(key)
            .or_insert_with(|| ReferrerGroup {
                parsed,
                visitors: Vec::new(),
            })
            .visitors
            .push(visitor_id.clone());
    }

    let mut segments: Vec<ReferrerSegment> = Vec::with_capacity(groups.len());
    for (key, group) in groups {
        let matched = run_matcher(
            group
                .visitors
                .iter()
                .filter_map(|visitor| timelines.get_key_value(visitor)),
            step_count,
        );

        let total_users = matched.completions.first().map_or(0, |set| set.len()) as u64;
        if total_users <= MIN_SEGMENT_USERS {
            continue;
        }

        let completed_users = matched.completions.last().map_or(0, |set| set.len()) as u64;
        segments.push(ReferrerSegment {
            referrer: key,
            referrer_parsed: group.parsed,
            total_users,
            completed_users,
            conversion_rate: pct(completed_users, total_users),
        });
    }

    segments.sort_by(|a, b| {
        b.total_users
            .cmp(&a.total_users)
            .then_with(|| a.referrer.cmp(&b.referrer))
    });
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referrer::KnownReferrerTable;
    use crate::timeline::TimelineEvent;

    fn timeline(events: &[(u32, i64, &str)]) -> Vec<TimelineEvent> {
        events
            .iter()
            .map(|&(step, ts, referrer)| TimelineEvent {
                step_number: step,
                timestamp: ts,
                referrer: referrer.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_google_segment_conversion() {
        // Two visitors first-touched from google.com; one completes the
        // funnel, one drops at step 2.
        let mut timelines = VisitorTimelines::new();
        timelines.insert(
            "a".into(),
            timeline(&[
                (1, 0, "https://google.com/"),
                (2, 10, "https://google.com/"),
            ]),
        );
        timelines.insert("b".into(), timeline(&[(1, 0, "https://google.com/")]));

        let segments = segment_by_referrer(&timelines, 2, &KnownReferrerTable);

        assert_eq!(segments.len(), 1);
        let google = &segments[0];
        assert_eq!(google.referrer, "google.com");
        assert_eq!(google.referrer_parsed.name, "Google");
        assert_eq!(google.total_users, 2);
        assert_eq!(google.completed_users, 1);
        assert_eq!(google.conversion_rate, 50.0);
    }

    #[test]
    fn test_single_visitor_groups_are_dropped() {
        let mut timelines = VisitorTimelines::new();
        timelines.insert("a".into(), timeline(&[(1, 0, "https://lonely.example/")]));

        assert!(segment_by_referrer(&timelines, 1, &KnownReferrerTable).is_empty());
    }

    #[test]
    fn test_segments_sorted_by_size_descending() {
        let mut timelines = VisitorTimelines::new();
        for (visitor, referrer) in [
            ("a", "https://google.com/"),
            ("b", "https://google.com/"),
            ("c", "https://google.com/"),
            ("d", ""),
            ("e", ""),
        ] {
            timelines.insert(visitor.into(), timeline(&[(1, 0, referrer)]));
        }

        let segments = segment_by_referrer(&timelines, 1, &KnownReferrerTable);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].referrer, "google.com");
        assert_eq!(segments[1].referrer, "direct");
        assert_eq!(segments[1].referrer_parsed.name, "Direct");
    }

    #[test]
    fn test_first_touch_anchor_is_earliest_event_overall() {
        // The visitor's earliest recorded event is a step-2 event; its
        // referrer wins over the later step-1 event's referrer.
        let mut timelines = VisitorTimelines::new();
        for visitor in ["a", "b"] {
            timelines.insert(
                visitor.into(),
                timeline(&[
                    (2, 0, "https://bing.com/"),
                    (1, 5, "https://google.com/"),
                ]),
            );
        }

        let segments = segment_by_referrer(&timelines, 2, &KnownReferrerTable);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].referrer, "bing.com");
        // Entered via step 1 at t=5; the early step-2 event is not
        // credited, so nobody completes.
        assert_eq!(segments[0].total_users, 2);
        assert_eq!(segments[0].completed_users, 0);
    }
}
