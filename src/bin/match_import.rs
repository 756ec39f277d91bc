use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use set_scorigami::config::{self, arg_value};
use set_scorigami::match_processor::MatchRecord;
use set_scorigami::{init_tracing, match_store};

fn main() -> Result<()> {
    init_tracing();
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let input = parse_input_arg(&args)
        .ok_or_else(|| anyhow!("usage: match_import <matches.json> [--db PATH]"))?;
    let db_path = arg_value(&args, "--db")
        .or_else(|| std::env::var(config::ENV_DB_PATH).ok())
        .map(PathBuf::from)
        .or_else(config::default_db_path)
        .context("unable to resolve sqlite path")?;

    let raw = fs::read_to_string(&input)
        .with_context(|| format!("read match file {}", input.display()))?;
    let records: Vec<MatchRecord> =
        serde_json::from_str(&raw).context("invalid match record json")?;
    let records = dedup_by_match_id(records);
    info!(matches = records.len(), file = %input.display(), "importing match records");

    let mut conn = match_store::open_db(&db_path)?;
    let tx = conn.transaction().context("begin import transaction")?;
    let mut imported = 0usize;
    for record in &records {
        if record.player_a_scores.len() != record.player_b_scores.len() {
            warn!(
                match_id = record.match_id,
                "set score sequences differ in length; stored as recorded"
            );
        }
        match_store::upsert_match_record(&tx, record)?;
        imported += 1;
    }
    tx.commit().context("commit import transaction")?;

    println!("Match import complete");
    println!("DB: {}", db_path.display());
    println!("Matches upserted: {imported}");

    Ok(())
}

fn parse_input_arg(args: &[String]) -> Option<PathBuf> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--db" {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        return Some(PathBuf::from(arg));
    }
    None
}

/// Keeps the last record for each match id, in first-seen order, so the
/// store (and every later analysis pass) sees each match once.
fn dedup_by_match_id(records: Vec<MatchRecord>) -> Vec<MatchRecord> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(records.len());
    for record in records.into_iter().rev() {
        if seen.insert(record.match_id) {
            out.push(record);
        }
    }
    out.reverse();
    out
}
