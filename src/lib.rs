pub mod config;
pub mod coverage;
pub mod error;
pub mod fake_corpus;
pub mod match_processor;
pub mod match_store;
pub mod perm_generator;
pub mod pipeline;
pub mod transition_stats;

pub use error::AnalysisError;
pub use match_processor::{
    MatchRecord, ProcessedMatches, TotalTransitionKey, TransitionKey, process_matches,
};
pub use perm_generator::generate_all_permutations;
pub use transition_stats::{TransitionRow, compute_transition_rows};

/// Installs the fmt subscriber used by every binary; `RUST_LOG` overrides the
/// default `info` level.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
