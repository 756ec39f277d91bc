use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use set_scorigami::config::{self, arg_value};
use set_scorigami::perm_generator::{MatchFormat, generate_format_permutations};
use set_scorigami::{generate_all_permutations, init_tracing, match_store};

fn main() -> Result<()> {
    init_tracing();
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let db_path = arg_value(&args, "--db")
        .or_else(|| std::env::var(config::ENV_DB_PATH).ok())
        .map(PathBuf::from)
        .or_else(config::default_db_path)
        .context("unable to resolve sqlite path")?;
    let include_best_of_three = args.iter().any(|a| a == "--best-of-three");

    let mut permutations = generate_all_permutations();
    if include_best_of_three {
        permutations.extend(generate_format_permutations(MatchFormat::BestOfThree));
    }
    info!(permutations = permutations.len(), "generated reference permutations");

    let mut conn = match_store::open_db(&db_path)?;
    let tx = conn.transaction().context("begin seed transaction")?;
    let inserted = match_store::seed_permutations(&tx, &permutations)?;
    tx.commit().context("commit seed transaction")?;

    println!("Permutation seed complete");
    println!("DB: {}", db_path.display());
    println!("Generated: {}", permutations.len());
    println!("Newly inserted: {inserted}");

    Ok(())
}
