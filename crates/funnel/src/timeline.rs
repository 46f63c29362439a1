//! Visitor timeline assembler: groups raw step-event rows into per-visitor
//! chronological step lists. One linear pass over the rows.

use std::collections::{HashMap, HashSet};

use beacon_core::store::StepEventRow;

/// One step-matching event on a visitor's timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    pub step_number: u32,
    pub timestamp: i64,
    pub referrer: String,
}

/// Per-visitor timelines, each sorted ascending by timestamp.
pub type VisitorTimelines = HashMap<String, Vec<TimelineEvent>>;

/// Group rows by visitor, deduplicating by (step, name, visitor, time).
/// The per-visitor sort is stable, so timestamp ties keep arrival order.
pub fn assemble(rows: Vec<StepEventRow>) -> VisitorTimelines {
    let mut seen: HashSet<(u32, String, String, i64)> = HashSet::with_capacity(rows.len());
    let mut timelines: VisitorTimelines = HashMap::new();

    for row in rows {
        let dedup_key = (
            row.step_number,
            row.step_name.clone(),
            row.visitor_id.clone(),
            row.timestamp,
        );
        if !seen.insert(dedup_key) {
            continue;
        }

        timelines
            .entry(row.visitor_id)
            .or_default()
            .push(TimelineEvent {
                step_number: row.step_number,
                timestamp: row.timestamp,
                referrer: row.referrer,
            });
    }

    for events in timelines.values_mut() {
        events.sort_by_key(|e| e.timestamp);
    }

    timelines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(step: u32, visitor: &str, ts: i64) -> StepEventRow {
        StepEventRow {
            step_number: step,
            step_name: format!("step {step}"),
            visitor_id: visitor.to_string(),
            timestamp: ts,
            referrer: String::new(),
        }
    }

    #[test]
    fn test_groups_by_visitor_and_sorts_by_time() {
        let timelines = assemble(vec![
            row(2, "a", 50),
            row(1, "a", 10),
            row(1, "b", 30),
        ]);

        assert_eq!(timelines.len(), 2);
        let a: Vec<u32> = timelines["a"].iter().map(|e| e.step_number).collect();
        assert_eq!(a, vec![1, 2]);
    }

    #[test]
    fn test_duplicate_rows_are_dropped() {
        let timelines = assemble(vec![row(1, "a", 10), row(1, "a", 10), row(1, "a", 20)]);
        assert_eq!(timelines["a"].len(), 2);
    }

    #[test]
    fn test_timestamp_ties_keep_arrival_order() {
        let timelines = assemble(vec![row(2, "a", 10), row(1, "a", 10)]);
        let steps: Vec<u32> = timelines["a"].iter().map(|e| e.step_number).collect();
        assert_eq!(steps, vec![2, 1]);
    }
}
