//! Sequential funnel matcher. Each visitor's sorted timeline is scanned
//! once with a single cursor holding the next expected step: an event
//! advances the cursor only on an exact match, and everything else is
//! ignored. Doing a later step early never credits it, and repeating an
//! already-credited step never regresses the cursor.

use std::collections::HashSet;

use crate::timeline::TimelineEvent;

/// Completion record for one visitor: the timestamps at which each step
/// was credited, in step order. Length is the number of steps completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorCompletion {
    pub step_times: Vec<i64>,
}

impl VisitorCompletion {
    pub fn steps_completed(&self) -> usize {
        self.step_times.len()
    }
}

/// Walk one sorted timeline and determine which steps were completed in
/// order. Pure function; O(timeline length).
pub fn match_timeline(timeline: &[TimelineEvent], step_count: usize) -> VisitorCompletion {
    let mut step_times = Vec::new();
    let mut expected: u32 = 1;

    for event in timeline {
        if expected as usize > step_count {
            break;
        }
        if event.step_number == expected {
            step_times.push(event.timestamp);
            expected += 1;
        }
    }

    VisitorCompletion { step_times }
}

/// Aggregate match output over a population of visitors.
#[derive(Debug)]
pub struct MatchResult {
    /// Index i holds the visitors who, in order, reached step i + 1.
    pub completions: Vec<HashSet<String>>,
    /// Index i holds the per-visitor deltas (seconds) from completing
    /// step i to completing step i + 1. Index 0 is always empty.
    pub transitions: Vec<Vec<i64>>,
    /// Entry-to-final durations for visitors who completed every step.
    pub completion_durations: Vec<i64>,
}

/// Run the matcher over an iterator of (visitor, sorted timeline) pairs.
/// O(total events) across all visitors.
pub fn run_matcher<'a, I>(visitors: I, step_count: usize) -> MatchResult
where
    I: IntoIterator<Item = (&'a String, &'a Vec<TimelineEvent>)>,
{
    let mut result = MatchResult {
        completions: vec![HashSet::new(); step_count],
        transitions: vec![Vec::new(); step_count],
        completion_durations: Vec::new(),
    };

    for (visitor_id, timeline) in visitors {
        let completion = match_timeline(timeline, step_count);

        for (i, time) in completion.step_times.iter().enumerate() {
            result.completions[i].insert(visitor_id.clone());
            if i > 0 {
                result.transitions[i].push(time - completion.step_times[i - 1]);
            }
        }

        if step_count > 0 && completion.steps_completed() == step_count {
            result
                .completion_durations
                .push(completion.step_times[step_count - 1] - completion.step_times[0]);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::assemble;
    use beacon_core::store::StepEventRow;

    fn event(step: u32, ts: i64) -> TimelineEvent {
        TimelineEvent {
            step_number: step,
            timestamp: ts,
            referrer: String::new(),
        }
    }

    #[test]
    fn test_in_order_completion() {
        let completion = match_timeline(&[event(1, 0), event(2, 10), event(3, 20)], 3);
        assert_eq!(completion.step_times, vec![0, 10, 20]);
    }

    #[test]
    fn test_skipped_step_blocks_later_steps() {
        // Step 2 never happens, so the step-3 event cannot be credited.
        let completion = match_timeline(&[event(1, 0), event(3, 5)], 3);
        assert_eq!(completion.step_times, vec![0]);
    }

    #[test]
    fn test_later_step_done_early_is_ignored() {
        let completion = match_timeline(&[event(3, 0), event(1, 5), event(2, 10)], 3);
        assert_eq!(completion.step_times, vec![5, 10]);
    }

    #[test]
    fn test_repeated_step_does_not_regress_cursor() {
        let completion = match_timeline(
            &[event(1, 0), event(2, 10), event(2, 15), event(3, 20)],
            3,
        );
        assert_eq!(completion.step_times, vec![0, 10, 20]);
    }

    #[test]
    fn test_events_after_full_completion_are_ignored() {
        let completion = match_timeline(&[event(1, 0), event(2, 5), event(1, 50)], 2);
        assert_eq!(completion.step_times, vec![0, 5]);
    }

    #[test]
    fn test_visitor_without_step_one_is_absent_everywhere() {
        let timelines = assemble(vec![StepEventRow {
            step_number: 2,
            step_name: "signup".into(),
            visitor_id: "v".into(),
            timestamp: 10,
            referrer: String::new(),
        }]);
        let result = run_matcher(timelines.iter(), 2);
        assert!(result.completions.iter().all(|set| set.is_empty()));
    }

    #[test]
    fn test_transitions_and_durations() {
        let visitor = "a".to_string();
        let timeline = vec![event(1, 100), event(2, 130), event(3, 190)];
        let pairs = vec![(&visitor, &timeline)];
        let result = run_matcher(pairs, 3);

        assert_eq!(result.transitions[1], vec![30]);
        assert_eq!(result.transitions[2], vec![60]);
        assert_eq!(result.completion_durations, vec![90]);
    }

    #[test]
    fn test_determinism_under_row_shuffling() {
        let rows = |order: &[usize]| -> Vec<StepEventRow> {
            let base = [
                (1u32, "a", 0i64),
                (2, "a", 10),
                (3, "a", 20),
                (1, "b", 0),
                (3, "b", 5),
            ];
            order
                .iter()
                .map(|&i| {
                    let (step, visitor, ts) = base[i];
                    StepEventRow {
                        step_number: step,
                        step_name: format!("s{step}"),
                        visitor_id: visitor.into(),
                        timestamp: ts,
                        referrer: String::new(),
                    }
                })
                .collect()
        };

        let first = run_matcher(assemble(rows(&[0, 1, 2, 3, 4])).iter(), 3);
        let second = run_matcher(assemble(rows(&[4, 2, 0, 3, 1])).iter(), 3);

        assert_eq!(first.completions, second.completions);
    }
}
