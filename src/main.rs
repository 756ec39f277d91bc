use anyhow::{Context, Result};

use set_scorigami::config::AnalysisConfig;
use set_scorigami::{init_tracing, match_store, pipeline};

fn main() -> Result<()> {
    init_tracing();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = AnalysisConfig::load(&args).context("resolve analysis config")?;

    let mut conn = match_store::open_db(&cfg.db_path)?;
    let summary = pipeline::run_permutation_analysis(&mut conn, &cfg)?;

    match summary.run_id {
        Some(run_id) => println!("Permutation analysis complete (run {run_id})"),
        None => println!("Synthetic dry run complete (store untouched)"),
    }
    println!("DB: {}", summary.db_path.display());
    println!(
        "Matches: {} loaded in {:.2}s, processed in {:.2}s",
        summary.matches_loaded,
        summary.fetch_elapsed.as_secs_f64(),
        summary.analyze_elapsed.as_secs_f64()
    );
    println!("Permutations: {} distinct", summary.distinct_permutations);
    if let Some(persisted) = &summary.persisted {
        println!(
            "Persisted: {} permutations, {} new match links, {} transitions in {:.2}s",
            persisted.permutations_upserted,
            persisted.permutation_matches_inserted,
            persisted.transitions_upserted,
            summary.persist_elapsed.as_secs_f64()
        );
    }

    println!("Completion:");
    for row in &summary.completion {
        println!(
            " - {} best-of-{}: {}/{} occurred, {} never ({:.3}%)",
            row.event_gender,
            row.format.best_of(),
            row.total_occurred,
            row.total_possible,
            row.total_never_occurred,
            row.completion_pct
        );
    }

    let coverage = &summary.coverage;
    println!(
        "Coverage: {}/{} best-of-five permutations seen ({:.1}% unscored), {} best-of-three",
        coverage.best_of_five_observed,
        coverage.reference_total,
        coverage.unscored_share() * 100.0,
        coverage.best_of_three_observed
    );
    if !coverage.irregular.is_empty() {
        println!("Irregular permutations: {}", coverage.irregular.len());
        for permutation in coverage.irregular.iter().take(6) {
            println!(" - {permutation}");
        }
    }

    Ok(())
}
