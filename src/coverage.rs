use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::match_processor::{MatchRecord, PermutationCounts};
use crate::perm_generator::{MatchFormat, classify_permutation, format_reference};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermutationCoverage {
    pub reference_total: usize,
    pub observed_reference: usize,
    pub best_of_three_observed: usize,
    pub best_of_five_observed: usize,
    pub unscored: Vec<String>,
    /// Observed permutations outside every supported format (retirements,
    /// walkovers recorded with partial sets, data entry errors).
    pub irregular: Vec<String>,
}

impl PermutationCoverage {
    pub fn unscored_share(&self) -> f64 {
        if self.reference_total == 0 {
            return 0.0;
        }
        self.unscored.len() as f64 / self.reference_total as f64
    }
}

pub fn permutation_coverage(
    reference: &BTreeSet<String>,
    counts: &PermutationCounts,
) -> PermutationCoverage {
    let mut out = PermutationCoverage {
        reference_total: reference.len(),
        ..PermutationCoverage::default()
    };

    for permutation in counts.keys() {
        if reference.contains(permutation) {
            out.observed_reference += 1;
        }
        match classify_permutation(permutation) {
            Some(MatchFormat::BestOfThree) => out.best_of_three_observed += 1,
            Some(MatchFormat::BestOfFive) => out.best_of_five_observed += 1,
            None => out.irregular.push(permutation.clone()),
        }
    }
    out.irregular.sort_unstable();

    out.unscored = reference
        .iter()
        .filter(|permutation| !counts.contains_key(*permutation))
        .cloned()
        .collect();
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormatCompletion {
    pub event_gender: String,
    pub format: MatchFormat,
    pub total_possible: usize,
    pub total_occurred: usize,
    pub total_never_occurred: usize,
    pub completion_pct: f64,
}

/// One row per gender seen in `matches` and per supported format, ordered by
/// gender then best-of. Irregular and malformed matches count toward no row.
pub fn format_completion(matches: &[MatchRecord]) -> Vec<FormatCompletion> {
    let mut occurred: BTreeMap<(String, MatchFormat), HashSet<String>> = BTreeMap::new();
    for record in matches {
        for format in MatchFormat::ALL {
            occurred
                .entry((record.event_gender.clone(), format))
                .or_default();
        }
        let Ok(permutation) = record.permutation_string() else {
            continue;
        };
        if let Some(format) = classify_permutation(&permutation) {
            occurred
                .entry((record.event_gender.clone(), format))
                .or_default()
                .insert(permutation);
        }
    }

    occurred
        .into_iter()
        .map(|((event_gender, format), seen)| {
            let reference = format_reference(format);
            let total_possible = reference.len();
            let total_occurred = seen.iter().filter(|p| reference.contains(*p)).count();
            let completion_pct = if total_possible == 0 {
                0.0
            } else {
                total_occurred as f64 * 100.0 / total_possible as f64
            };
            FormatCompletion {
                event_gender,
                format,
                total_possible,
                total_occurred,
                total_never_occurred: total_possible - total_occurred,
                completion_pct,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_observed_into_formats_and_irregular() {
        let reference = BTreeSet::from([
            "6-0,6-0,6-0".to_string(),
            "0-6,0-6,0-6".to_string(),
            "6-4,4-6,6-4,6-4".to_string(),
        ]);
        let counts = PermutationCounts::from([
            ("6-0,6-0,6-0".to_string(), 4),
            ("6-3,6-2".to_string(), 2),
            ("6-3,2-1".to_string(), 1),
        ]);

        let cov = permutation_coverage(&reference, &counts);
        assert_eq!(cov.reference_total, 3);
        assert_eq!(cov.observed_reference, 1);
        assert_eq!(cov.best_of_five_observed, 1);
        assert_eq!(cov.best_of_three_observed, 1);
        assert_eq!(cov.irregular, vec!["6-3,2-1".to_string()]);
        assert_eq!(
            cov.unscored,
            vec!["0-6,0-6,0-6".to_string(), "6-4,4-6,6-4,6-4".to_string()]
        );
        assert!((cov.unscored_share() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn completion_is_split_by_gender_and_format() {
        let matches = vec![
            MatchRecord::new(1, &[(6, 3), (6, 4), (6, 2)], "M", 1, 1),
            MatchRecord::new(2, &[(6, 3), (6, 4), (6, 2)], "M", 1, 1),
            MatchRecord::new(3, &[(3, 6), (6, 4), (7, 5), (6, 0)], "M", 1, 1),
            MatchRecord::new(4, &[(6, 3), (6, 4)], "W", 1, 2),
            MatchRecord::new(5, &[(6, 3), (2, 1)], "W", 1, 2),
        ];

        let rows = format_completion(&matches);
        let keys = rows
            .iter()
            .map(|r| (r.event_gender.as_str(), r.format.best_of()))
            .collect::<Vec<_>>();
        assert_eq!(keys, vec![("M", 3), ("M", 5), ("W", 3), ("W", 5)]);

        let men_five = &rows[1];
        assert_eq!(men_five.total_possible, 216_776);
        assert_eq!(men_five.total_occurred, 2);
        assert_eq!(men_five.total_never_occurred, 216_774);
        assert!((men_five.completion_pct - 200.0 / 216_776.0).abs() < 1e-9);

        assert_eq!(rows[0].total_occurred, 0);
        assert_eq!(rows[2].total_possible, 1_470);
        assert_eq!(rows[2].total_occurred, 1);
        assert_eq!(rows[3].total_occurred, 0);
    }
}
