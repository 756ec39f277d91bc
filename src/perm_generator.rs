use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use once_cell::sync::Lazy;

pub const SET_SCORES_A_WINS: [&str; 7] = ["6-0", "6-1", "6-2", "6-3", "6-4", "7-5", "7-6"];
pub const SET_SCORES_B_WINS: [&str; 7] = ["0-6", "1-6", "2-6", "3-6", "4-6", "5-7", "6-7"];

static REFERENCE_PERMUTATIONS: Lazy<BTreeSet<String>> = Lazy::new(generate_all_permutations);
static BEST_OF_THREE_PERMUTATIONS: Lazy<BTreeSet<String>> =
    Lazy::new(|| generate_format_permutations(MatchFormat::BestOfThree));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SetOutcome {
    Loss,
    Win,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchFormat {
    BestOfThree,
    BestOfFive,
}

impl MatchFormat {
    pub const ALL: [MatchFormat; 2] = [MatchFormat::BestOfThree, MatchFormat::BestOfFive];

    pub fn sets_to_win(self) -> usize {
        match self {
            MatchFormat::BestOfThree => 2,
            MatchFormat::BestOfFive => 3,
        }
    }

    pub fn max_sets(self) -> usize {
        2 * self.sets_to_win() - 1
    }

    pub fn best_of(self) -> u32 {
        self.max_sets() as u32
    }

    pub fn lengths(self) -> RangeInclusive<usize> {
        self.sets_to_win()..=self.max_sets()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

impl Side {
    fn vocabulary(self) -> (&'static [&'static str], &'static [&'static str]) {
        match self {
            Side::A => (&SET_SCORES_A_WINS[..], &SET_SCORES_B_WINS[..]),
            Side::B => (&SET_SCORES_B_WINS[..], &SET_SCORES_A_WINS[..]),
        }
    }
}

/// Distinct orderings of a multiset of set outcomes, `Loss` before `Win`.
pub fn unique_permutations(elements: &[SetOutcome]) -> Vec<Vec<SetOutcome>> {
    let wins = elements
        .iter()
        .filter(|outcome| **outcome == SetOutcome::Win)
        .count();
    let losses = elements.len() - wins;

    let mut out = Vec::new();
    let mut prefix = Vec::with_capacity(elements.len());
    permute_unique(&mut prefix, wins, losses, &mut out);
    out
}

fn permute_unique(
    prefix: &mut Vec<SetOutcome>,
    wins: usize,
    losses: usize,
    out: &mut Vec<Vec<SetOutcome>>,
) {
    if wins == 0 && losses == 0 {
        out.push(prefix.clone());
        return;
    }
    if losses > 0 {
        prefix.push(SetOutcome::Loss);
        permute_unique(prefix, wins, losses - 1, out);
        prefix.pop();
    }
    if wins > 0 {
        prefix.push(SetOutcome::Win);
        permute_unique(prefix, wins - 1, losses, out);
        prefix.pop();
    }
}

/// Win/loss sequences of `total_sets` sets in which the match winner takes
/// their `sets_to_win`-th set on the final set and not before.
pub fn valid_set_winner_sequences(total_sets: usize, sets_to_win: usize) -> Vec<Vec<SetOutcome>> {
    if sets_to_win == 0 || total_sets < sets_to_win || total_sets > 2 * sets_to_win - 1 {
        return Vec::new();
    }

    let mut elements = vec![SetOutcome::Win; sets_to_win];
    elements.extend(std::iter::repeat_n(
        SetOutcome::Loss,
        total_sets - sets_to_win,
    ));

    unique_permutations(&elements)
        .into_iter()
        .filter(|seq| decided_on_last_set(seq, sets_to_win))
        .collect()
}

fn decided_on_last_set(seq: &[SetOutcome], sets_to_win: usize) -> bool {
    let mut wins = 0usize;
    for (idx, outcome) in seq.iter().enumerate() {
        if *outcome == SetOutcome::Win {
            wins += 1;
        }
        if wins == sets_to_win {
            return idx + 1 == seq.len();
        }
    }
    false
}

pub fn generate_all_permutations() -> BTreeSet<String> {
    generate_format_permutations(MatchFormat::BestOfFive)
}

pub fn generate_format_permutations(format: MatchFormat) -> BTreeSet<String> {
    let mut permutations = BTreeSet::new();

    for winner in [Side::A, Side::B] {
        let (winner_scores, loser_scores) = winner.vocabulary();
        for total_sets in format.lengths() {
            for seq in valid_set_winner_sequences(total_sets, format.sets_to_win()) {
                let options = seq
                    .iter()
                    .map(|outcome| match outcome {
                        SetOutcome::Win => winner_scores,
                        SetOutcome::Loss => loser_scores,
                    })
                    .collect::<Vec<_>>();
                extend_with_products(&options, &mut permutations);
            }
        }
    }

    permutations
}

fn extend_with_products(options: &[&[&str]], out: &mut BTreeSet<String>) {
    if options.is_empty() || options.iter().any(|choices| choices.is_empty()) {
        return;
    }

    let mut cursor = vec![0usize; options.len()];
    loop {
        let permutation = cursor
            .iter()
            .zip(options)
            .map(|(idx, choices)| choices[*idx])
            .collect::<Vec<_>>()
            .join(",");
        out.insert(permutation);

        // Odometer step, rightmost position fastest.
        let mut pos = options.len();
        loop {
            if pos == 0 {
                return;
            }
            pos -= 1;
            cursor[pos] += 1;
            if cursor[pos] < options[pos].len() {
                break;
            }
            cursor[pos] = 0;
        }
    }
}

pub fn reference_permutations() -> &'static BTreeSet<String> {
    &REFERENCE_PERMUTATIONS
}

pub fn format_reference(format: MatchFormat) -> &'static BTreeSet<String> {
    match format {
        MatchFormat::BestOfThree => &BEST_OF_THREE_PERMUTATIONS,
        MatchFormat::BestOfFive => &REFERENCE_PERMUTATIONS,
    }
}

pub fn parse_set_score(score: &str) -> Option<(u32, u32)> {
    let (a, b) = score.trim().split_once('-')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

pub fn mirror_set_score(score: &str) -> Option<String> {
    let (a, b) = parse_set_score(score)?;
    Some(format!("{b}-{a}"))
}

pub fn mirror_permutation(permutation: &str) -> Option<String> {
    let sets = permutation
        .split(',')
        .map(mirror_set_score)
        .collect::<Option<Vec<_>>>()?;
    Some(sets.join(","))
}

pub fn set_count(permutation: &str) -> usize {
    if permutation.is_empty() {
        return 0;
    }
    permutation.split(',').count()
}

pub fn is_valid_permutation(permutation: &str, format: MatchFormat) -> bool {
    let target = format.sets_to_win();
    let sets = permutation.split(',').collect::<Vec<_>>();
    if !format.lengths().contains(&sets.len()) {
        return false;
    }

    let mut a_sets = 0usize;
    let mut b_sets = 0usize;
    for (idx, set) in sets.iter().enumerate() {
        if SET_SCORES_A_WINS.contains(set) {
            a_sets += 1;
        } else if SET_SCORES_B_WINS.contains(set) {
            b_sets += 1;
        } else {
            return false;
        }

        let decided = a_sets == target || b_sets == target;
        if decided {
            return idx + 1 == sets.len();
        }
    }
    false
}

pub fn classify_permutation(permutation: &str) -> Option<MatchFormat> {
    MatchFormat::ALL
        .into_iter()
        .find(|format| is_valid_permutation(permutation, *format))
}
