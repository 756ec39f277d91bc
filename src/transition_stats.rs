use serde::{Deserialize, Serialize};

use crate::match_processor::{TotalTransitions, TransitionKey, Transitions};

/// One row of the set-score transition matrix, shaped for a bulk upsert keyed
/// by `(current_set, next_set, event_gender, event_type_id, tournament_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRow {
    pub current_set: String,
    pub next_set: String,
    pub event_gender: String,
    pub event_type_id: i64,
    pub tournament_id: i64,
    pub transition_count: u64,
    pub transition_probability: f64,
}

impl TransitionRow {
    pub fn key(&self) -> TransitionKey {
        TransitionKey {
            current_set: self.current_set.clone(),
            next_set: self.next_set.clone(),
            event_gender: self.event_gender.clone(),
            tournament_id: self.tournament_id,
            event_type_id: self.event_type_id,
        }
    }
}

/// `count / total`, or 0 when the marginal total is zero.
pub fn transition_probability(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64
}

pub fn compute_transition_rows(
    transitions: &Transitions,
    total_transitions: &TotalTransitions,
) -> Vec<TransitionRow> {
    let mut keys = transitions.keys().collect::<Vec<_>>();
    keys.sort_unstable();

    keys.into_iter()
        .map(|key| {
            let count = transitions.get(key).copied().unwrap_or_default();
            let total = total_transitions
                .get(&key.marginal())
                .copied()
                .unwrap_or_default();
            TransitionRow {
                current_set: key.current_set.clone(),
                next_set: key.next_set.clone(),
                event_gender: key.event_gender.clone(),
                event_type_id: key.event_type_id,
                tournament_id: key.tournament_id,
                transition_count: count,
                transition_probability: transition_probability(count, total),
            }
        })
        .collect()
}
