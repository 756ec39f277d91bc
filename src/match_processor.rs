use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub type PermutationCounts = HashMap<String, u64>;
pub type PermutationMatches = HashMap<String, Vec<i64>>;
pub type Transitions = HashMap<TransitionKey, u64>;
pub type TotalTransitions = HashMap<TotalTransitionKey, u64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: i64,
    pub tournament_id: i64,
    pub event_type_id: i64,
    pub event_gender: String,
    pub player_a_scores: Vec<u32>,
    pub player_b_scores: Vec<u32>,
    #[serde(default)]
    pub player_a_full_name: Option<String>,
    #[serde(default)]
    pub player_b_full_name: Option<String>,
    #[serde(default)]
    pub round_name: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub event_year: Option<i32>,
    #[serde(default)]
    pub match_start_time: Option<String>,
}

impl MatchRecord {
    pub fn new(
        match_id: i64,
        sets: &[(u32, u32)],
        event_gender: &str,
        tournament_id: i64,
        event_type_id: i64,
    ) -> Self {
        Self {
            match_id,
            tournament_id,
            event_type_id,
            event_gender: event_gender.to_string(),
            player_a_scores: sets.iter().map(|(a, _)| *a).collect(),
            player_b_scores: sets.iter().map(|(_, b)| *b).collect(),
            player_a_full_name: None,
            player_b_full_name: None,
            round_name: None,
            event_name: None,
            event_year: None,
            match_start_time: None,
        }
    }

    pub fn set_scores(&self) -> Result<Vec<String>, AnalysisError> {
        if self.player_a_scores.len() != self.player_b_scores.len() {
            return Err(AnalysisError::InputShape {
                match_id: self.match_id,
                player_a_sets: self.player_a_scores.len(),
                player_b_sets: self.player_b_scores.len(),
            });
        }
        if self.player_a_scores.is_empty() {
            return Err(AnalysisError::EmptyScores {
                match_id: self.match_id,
            });
        }
        Ok(self
            .player_a_scores
            .iter()
            .zip(&self.player_b_scores)
            .map(|(a, b)| format!("{a}-{b}"))
            .collect())
    }

    pub fn permutation_string(&self) -> Result<String, AnalysisError> {
        Ok(self.set_scores()?.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionKey {
    pub current_set: String,
    pub next_set: String,
    pub event_gender: String,
    pub tournament_id: i64,
    pub event_type_id: i64,
}

impl TransitionKey {
    pub fn marginal(&self) -> TotalTransitionKey {
        TotalTransitionKey {
            current_set: self.current_set.clone(),
            event_gender: self.event_gender.clone(),
            tournament_id: self.tournament_id,
            event_type_id: self.event_type_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TotalTransitionKey {
    pub current_set: String,
    pub event_gender: String,
    pub tournament_id: i64,
    pub event_type_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedMatches {
    pub permutation_counts: PermutationCounts,
    pub permutation_matches: PermutationMatches,
    pub transitions: Transitions,
    pub total_transitions: TotalTransitions,
}

impl ProcessedMatches {
    pub fn matches_processed(&self) -> u64 {
        self.permutation_counts.values().sum()
    }

    pub fn record(&mut self, record: &MatchRecord) -> Result<(), AnalysisError> {
        let set_scores = record.set_scores()?;
        let permutation = set_scores.join(",");

        *self
            .permutation_counts
            .entry(permutation.clone())
            .or_insert(0) += 1;
        self.permutation_matches
            .entry(permutation)
            .or_default()
            .push(record.match_id);

        for pair in set_scores.windows(2) {
            let key = TransitionKey {
                current_set: pair[0].clone(),
                next_set: pair[1].clone(),
                event_gender: record.event_gender.clone(),
                tournament_id: record.tournament_id,
                event_type_id: record.event_type_id,
            };
            *self.total_transitions.entry(key.marginal()).or_insert(0) += 1;
            *self.transitions.entry(key).or_insert(0) += 1;
        }
        Ok(())
    }

    /// Match ids from `other` are appended after the ones already held.
    pub fn merge(&mut self, other: ProcessedMatches) {
        for (permutation, count) in other.permutation_counts {
            *self.permutation_counts.entry(permutation).or_insert(0) += count;
        }
        for (permutation, ids) in other.permutation_matches {
            self.permutation_matches
                .entry(permutation)
                .or_default()
                .extend(ids);
        }
        for (key, count) in other.transitions {
            *self.transitions.entry(key).or_insert(0) += count;
        }
        for (key, count) in other.total_transitions {
            *self.total_transitions.entry(key).or_insert(0) += count;
        }
    }
}

/// The first malformed record aborts the pass; nothing partial is returned.
pub fn process_matches(
    matches: &[MatchRecord],
    mut progress: Option<&mut dyn FnMut(usize)>,
) -> Result<ProcessedMatches, AnalysisError> {
    let mut out = ProcessedMatches::default();
    for (idx, record) in matches.iter().enumerate() {
        out.record(record)?;
        if let Some(sink) = progress.as_mut() {
            sink(idx + 1);
        }
    }
    Ok(out)
}

pub fn process_matches_sharded(
    matches: &[MatchRecord],
    shard_size: usize,
) -> Result<ProcessedMatches, AnalysisError> {
    let shard_size = shard_size.max(1);
    let shards: Vec<Result<ProcessedMatches, AnalysisError>> = matches
        .par_chunks(shard_size)
        .map(|shard| process_matches(shard, None))
        .collect();

    // Merge in input order so match lists and the reported error match a
    // sequential pass.
    shards
        .into_iter()
        .try_fold(ProcessedMatches::default(), |mut merged, shard| {
            merged.merge(shard?);
            Ok(merged)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_scores_formats_each_set() {
        let m = MatchRecord::new(7, &[(6, 3), (4, 6), (7, 5)], "M", 1, 1);
        assert_eq!(m.set_scores().unwrap(), vec!["6-3", "4-6", "7-5"]);
        assert_eq!(m.permutation_string().unwrap(), "6-3,4-6,7-5");
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut m = MatchRecord::new(9, &[(6, 3), (6, 4)], "W", 2, 1);
        m.player_b_scores.pop();
        assert_eq!(
            m.set_scores(),
            Err(AnalysisError::InputShape {
                match_id: 9,
                player_a_sets: 2,
                player_b_sets: 1,
            })
        );
    }

    #[test]
    fn empty_scores_are_rejected() {
        let m = MatchRecord::new(3, &[], "W", 2, 1);
        assert_eq!(
            m.set_scores(),
            Err(AnalysisError::EmptyScores { match_id: 3 })
        );
    }

    #[test]
    fn single_set_match_has_no_transitions() {
        let m = MatchRecord::new(1, &[(6, 0)], "M", 1, 1);
        let out = process_matches(&[m], None).unwrap();
        assert_eq!(out.permutation_counts.get("6-0"), Some(&1));
        assert!(out.transitions.is_empty());
        assert!(out.total_transitions.is_empty());
    }

    #[test]
    fn marginal_drops_next_set_only() {
        let key = TransitionKey {
            current_set: "6-3".to_string(),
            next_set: "4-6".to_string(),
            event_gender: "M".to_string(),
            tournament_id: 4,
            event_type_id: 2,
        };
        assert_eq!(
            key.marginal(),
            TotalTransitionKey {
                current_set: "6-3".to_string(),
                event_gender: "M".to_string(),
                tournament_id: 4,
                event_type_id: 2,
            }
        );
    }
}
