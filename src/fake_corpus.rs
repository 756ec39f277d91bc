use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::match_processor::MatchRecord;
use crate::perm_generator::{MatchFormat, SET_SCORES_A_WINS, parse_set_score};

const GENDERS: [&str; 2] = ["M", "W"];
const TOURNAMENT_IDS: [i64; 4] = [1, 2, 3, 4];
const EVENT_TYPE_IDS: [i64; 2] = [1, 2];
const RETIREMENT_RATE: f64 = 0.01;

/// Deterministic corpus of plausible completed matches, used for dry runs and
/// benchmarks. Men's grand slam draws (event type 1) play best of five; every
/// other draw plays best of three. About one match in a hundred ends in a
/// retirement with a partial final set.
pub fn synthetic_matches(count: usize, seed: u64) -> Vec<MatchRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|idx| synthetic_match(idx as i64 + 1, &mut rng))
        .collect()
}

fn synthetic_match(match_id: i64, rng: &mut impl Rng) -> MatchRecord {
    let gender = GENDERS[rng.gen_range(0..GENDERS.len())];
    let tournament_id = TOURNAMENT_IDS[rng.gen_range(0..TOURNAMENT_IDS.len())];
    let event_type_id = EVENT_TYPE_IDS[rng.gen_range(0..EVENT_TYPE_IDS.len())];
    let format = if gender == "M" && event_type_id == 1 {
        MatchFormat::BestOfFive
    } else {
        MatchFormat::BestOfThree
    };

    // Favourite's chance of taking any single set.
    let edge = rng.gen_range(0.35..0.8);
    let target = format.sets_to_win();
    let mut sets: Vec<(u32, u32)> = Vec::with_capacity(format.max_sets());
    let (mut a_sets, mut b_sets) = (0usize, 0usize);
    while a_sets < target && b_sets < target {
        if !sets.is_empty() && rng.gen_bool(RETIREMENT_RATE) {
            let games = (rng.gen_range(0..6), rng.gen_range(0..6));
            sets.push(games);
            break;
        }
        let (games_won, games_lost) = random_set_score(rng);
        if rng.gen_bool(edge) {
            a_sets += 1;
            sets.push((games_won, games_lost));
        } else {
            b_sets += 1;
            sets.push((games_lost, games_won));
        }
    }

    let mut record = MatchRecord::new(match_id, &sets, gender, tournament_id, event_type_id);
    record.event_year = Some(2015 + (match_id % 10) as i32);
    record
}

fn random_set_score(rng: &mut impl Rng) -> (u32, u32) {
    let score = SET_SCORES_A_WINS[rng.gen_range(0..SET_SCORES_A_WINS.len())];
    parse_set_score(score).unwrap_or((6, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_corpus() {
        assert_eq!(synthetic_matches(50, 7), synthetic_matches(50, 7));
        assert_ne!(synthetic_matches(50, 7), synthetic_matches(50, 8));
    }

    #[test]
    fn generated_matches_have_balanced_sides() {
        for m in synthetic_matches(500, 1) {
            assert_eq!(m.player_a_scores.len(), m.player_b_scores.len());
            assert!(!m.player_a_scores.is_empty());
            assert!(m.player_a_scores.len() <= 5);
        }
    }
}
