use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::coverage::{
    FormatCompletion, PermutationCoverage, format_completion, permutation_coverage,
};
use crate::fake_corpus;
use crate::match_processor::{
    MatchRecord, ProcessedMatches, process_matches, process_matches_sharded,
};
use crate::match_store::{self, PersistSummary};
use crate::perm_generator::reference_permutations;
use crate::transition_stats::{TransitionRow, compute_transition_rows};

const SYNTHETIC_SEED: u64 = 0x5e7_5c0e;
const PROGRESS_STEPS: usize = 10;

#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub matches_processed: usize,
    pub processed: ProcessedMatches,
    pub transition_rows: Vec<TransitionRow>,
    pub coverage: PermutationCoverage,
    pub completion: Vec<FormatCompletion>,
}

#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub db_path: PathBuf,
    /// `None` for synthetic dry runs, which leave the store untouched.
    pub run_id: Option<i64>,
    pub matches_loaded: usize,
    pub distinct_permutations: usize,
    pub persisted: Option<PersistSummary>,
    pub coverage: PermutationCoverage,
    pub completion: Vec<FormatCompletion>,
    pub fetch_elapsed: Duration,
    pub analyze_elapsed: Duration,
    pub persist_elapsed: Duration,
}

/// Logs at every tenth of the corpus instead of once per match.
struct ProgressLog {
    total: usize,
    step: usize,
}

impl ProgressLog {
    fn new(total: usize) -> Self {
        Self {
            total,
            step: (total / PROGRESS_STEPS).max(1),
        }
    }

    fn tick(&self, done: usize) {
        if done % self.step == 0 || done == self.total {
            debug!(done, total = self.total, "processing matches");
        }
    }
}

pub fn analyze(matches: &[MatchRecord], shard_size: Option<usize>) -> Result<AnalysisOutput> {
    let processed = match shard_size {
        Some(size) => {
            info!(matches = matches.len(), shard_size = size, "aggregating in shards");
            process_matches_sharded(matches, size)?
        }
        None => {
            let progress = ProgressLog::new(matches.len());
            let mut tick = |done: usize| progress.tick(done);
            let sink: &mut dyn FnMut(usize) = &mut tick;
            process_matches(matches, Some(sink))?
        }
    };

    let transition_rows =
        compute_transition_rows(&processed.transitions, &processed.total_transitions);
    let coverage = permutation_coverage(reference_permutations(), &processed.permutation_counts);
    for permutation in coverage.irregular.iter().take(8) {
        warn!(%permutation, "observed permutation fits no supported match format");
    }
    let completion = format_completion(matches);

    Ok(AnalysisOutput {
        matches_processed: matches.len(),
        processed,
        transition_rows,
        coverage,
        completion,
    })
}

pub fn persist_analysis(conn: &mut Connection, output: &AnalysisOutput) -> Result<PersistSummary> {
    match_store::persist_aggregates(conn, &output.processed, &output.transition_rows)
}

/// fetch → aggregate → compute → persist, with an `analysis_runs` audit row.
/// A failed pass closes its audit row with the error. `--synthetic` runs
/// analyze generated matches only and never write to the store.
pub fn run_permutation_analysis(
    conn: &mut Connection,
    cfg: &AnalysisConfig,
) -> Result<PipelineSummary> {
    if let Some(count) = cfg.synthetic_matches {
        return synthetic_dry_run(cfg, count);
    }

    let run_id = match_store::start_run(conn)?;
    match stored_pass(conn, cfg, run_id) {
        Ok(summary) => Ok(summary),
        Err(err) => {
            if let Err(audit_err) = match_store::fail_run(conn, run_id, &format!("{err:#}")) {
                warn!(run_id, error = %audit_err, "could not record failed run");
            }
            Err(err)
        }
    }
}

fn stored_pass(
    conn: &mut Connection,
    cfg: &AnalysisConfig,
    run_id: i64,
) -> Result<PipelineSummary> {
    let started = Instant::now();
    let matches = match_store::fetch_aggregated_match_data(conn, &cfg.filter)
        .context("load aggregated match data")?;
    let fetch_elapsed = started.elapsed();
    info!(
        matches = matches.len(),
        elapsed_ms = fetch_elapsed.as_millis() as u64,
        "loaded match data"
    );

    let (output, analyze_elapsed) = timed_analyze(&matches, cfg.shard_size)?;

    let started = Instant::now();
    let persisted = persist_analysis(conn, &output)?;
    let persist_elapsed = started.elapsed();
    info!(
        permutations = persisted.permutations_upserted,
        permutation_matches = persisted.permutation_matches_inserted,
        transitions = persisted.transitions_upserted,
        elapsed_ms = persist_elapsed.as_millis() as u64,
        "persisted aggregates"
    );

    match_store::finish_run(conn, run_id, output.matches_processed, &persisted)?;

    Ok(PipelineSummary {
        db_path: cfg.db_path.clone(),
        run_id: Some(run_id),
        matches_loaded: matches.len(),
        distinct_permutations: output.processed.permutation_counts.len(),
        persisted: Some(persisted),
        coverage: output.coverage,
        completion: output.completion,
        fetch_elapsed,
        analyze_elapsed,
        persist_elapsed,
    })
}

fn synthetic_dry_run(cfg: &AnalysisConfig, count: usize) -> Result<PipelineSummary> {
    let started = Instant::now();
    info!(count, "generating synthetic corpus; the store is not touched");
    let matches = fake_corpus::synthetic_matches(count, SYNTHETIC_SEED);
    let fetch_elapsed = started.elapsed();

    let (output, analyze_elapsed) = timed_analyze(&matches, cfg.shard_size)?;

    Ok(PipelineSummary {
        db_path: cfg.db_path.clone(),
        run_id: None,
        matches_loaded: matches.len(),
        distinct_permutations: output.processed.permutation_counts.len(),
        persisted: None,
        coverage: output.coverage,
        completion: output.completion,
        fetch_elapsed,
        analyze_elapsed,
        persist_elapsed: Duration::ZERO,
    })
}

fn timed_analyze(
    matches: &[MatchRecord],
    shard_size: Option<usize>,
) -> Result<(AnalysisOutput, Duration)> {
    let started = Instant::now();
    let output = analyze(matches, shard_size).context("aggregate matches")?;
    let elapsed = started.elapsed();
    info!(
        permutations = output.processed.permutation_counts.len(),
        transitions = output.transition_rows.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "processed matches"
    );
    Ok((output, elapsed))
}
