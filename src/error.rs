use thiserror::Error;

/// Failures raised by the analysis core and its store boundary.
///
/// Shape errors abort the whole aggregation pass: no aggregate is returned for
/// a corpus containing a malformed record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(
        "match {match_id}: player A has {player_a_sets} set scores but player B has {player_b_sets}"
    )]
    InputShape {
        match_id: i64,
        player_a_sets: usize,
        player_b_sets: usize,
    },

    #[error("match {match_id}: no set scores recorded")]
    EmptyScores { match_id: i64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("persistence conflict: {0}")]
    PersistenceConflict(String),
}
