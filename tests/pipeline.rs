use set_scorigami::config::AnalysisConfig;
use set_scorigami::match_processor::MatchRecord;
use set_scorigami::match_store::{self, MatchFilter};
use set_scorigami::perm_generator::MatchFormat;
use set_scorigami::pipeline::{analyze, run_permutation_analysis};

fn config(db_path: std::path::PathBuf) -> AnalysisConfig {
    AnalysisConfig {
        db_path,
        filter: MatchFilter::default(),
        shard_size: None,
        synthetic_matches: None,
    }
}

#[test]
fn store_to_matrix_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("scorigami.sqlite");
    let mut conn = match_store::open_db(&db_path).unwrap();

    let sets = [(6, 3), (4, 6), (7, 5)];
    for id in [1, 2] {
        match_store::upsert_match_record(&conn, &MatchRecord::new(id, &sets, "M", 1, 1)).unwrap();
    }
    match_store::upsert_match_record(&conn, &MatchRecord::new(3, &[(6, 3), (2, 1)], "W", 1, 1))
        .unwrap();

    let summary = run_permutation_analysis(&mut conn, &config(db_path.clone())).unwrap();
    assert_eq!(summary.matches_loaded, 3);
    assert_eq!(summary.distinct_permutations, 2);
    let persisted = summary.persisted.unwrap();
    assert_eq!(persisted.permutations_upserted, 2);
    assert_eq!(persisted.permutation_matches_inserted, 3);
    assert_eq!(persisted.transitions_upserted, 3);
    assert_eq!(summary.coverage.irregular, vec!["6-3,2-1".to_string()]);

    let men_three = summary
        .completion
        .iter()
        .find(|r| r.event_gender == "M" && r.format == MatchFormat::BestOfThree)
        .unwrap();
    assert_eq!(men_three.total_occurred, 1);
    assert_eq!(men_three.total_never_occurred, 1_469);
    assert_eq!(summary.completion.len(), 4);

    let rows = match_store::load_transition_rows(&conn).unwrap();
    let men = rows.iter().filter(|r| r.event_gender == "M").collect::<Vec<_>>();
    assert_eq!(men.len(), 2);
    assert!(men.iter().all(|r| r.transition_count == 2));

    let finished: Option<String> = conn
        .query_row(
            "SELECT finished_at FROM analysis_runs WHERE run_id = ?1",
            [summary.run_id.unwrap()],
            |row| row.get(0),
        )
        .unwrap();
    assert!(finished.is_some());
}

#[test]
fn malformed_match_publishes_nothing() {
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    match_store::init_schema(&conn).unwrap();

    let mut broken = MatchRecord::new(2, &[(6, 3), (6, 4)], "M", 1, 1);
    broken.player_b_scores.pop();
    match_store::upsert_match_record(&conn, &MatchRecord::new(1, &[(6, 1), (6, 1)], "M", 1, 1))
        .unwrap();
    match_store::upsert_match_record(&conn, &broken).unwrap();

    let err = run_permutation_analysis(&mut conn, &config("memory".into())).unwrap_err();
    assert!(format!("{err:#}").contains("match 2"));

    let permutations: i64 = conn
        .query_row("SELECT COUNT(*) FROM match_permutation", [], |row| row.get(0))
        .unwrap();
    let transitions: i64 = conn
        .query_row("SELECT COUNT(*) FROM set_score_transition_matrix", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(permutations, 0);
    assert_eq!(transitions, 0);

    let (finished, error): (Option<String>, Option<String>) = conn
        .query_row(
            "SELECT finished_at, error_message FROM analysis_runs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(finished.is_some());
    assert!(error.unwrap().contains("match 2"));
}

fn table_snapshot(conn: &rusqlite::Connection) -> (Vec<(String, i64)>, Vec<(i64, i64)>, i64, i64) {
    let mut stmt = conn
        .prepare(
            "SELECT permutation_string, occurrence_count FROM match_permutation
             ORDER BY permutation_string",
        )
        .unwrap();
    let permutations = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let mut stmt = conn
        .prepare("SELECT permutation_id, match_id FROM permutation_match ORDER BY 1, 2")
        .unwrap();
    let links = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let matrix: i64 = conn
        .query_row("SELECT COUNT(*) FROM set_score_transition_matrix", [], |row| {
            row.get(0)
        })
        .unwrap();
    let runs: i64 = conn
        .query_row("SELECT COUNT(*) FROM analysis_runs", [], |row| row.get(0))
        .unwrap();
    (permutations, links, matrix, runs)
}

#[test]
fn synthetic_run_leaves_the_store_untouched() {
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    match_store::init_schema(&conn).unwrap();
    match_store::upsert_match_record(&conn, &MatchRecord::new(1, &[(6, 3), (6, 4)], "W", 1, 1))
        .unwrap();
    run_permutation_analysis(&mut conn, &config("memory".into())).unwrap();
    let before = table_snapshot(&conn);

    let mut cfg = config("memory".into());
    cfg.synthetic_matches = Some(500);
    let summary = run_permutation_analysis(&mut conn, &cfg).unwrap();
    assert_eq!(summary.matches_loaded, 500);
    assert_eq!(summary.run_id, None);
    assert_eq!(summary.persisted, None);

    assert_eq!(table_snapshot(&conn), before);
    assert_eq!(
        match_store::matches_for_permutation(&conn, "6-3,6-4").unwrap(),
        vec![1]
    );
}

#[test]
fn synthetic_dry_run_uses_shards() {
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    match_store::init_schema(&conn).unwrap();

    let mut cfg = config("memory".into());
    cfg.synthetic_matches = Some(400);
    cfg.shard_size = Some(64);
    let summary = run_permutation_analysis(&mut conn, &cfg).unwrap();
    assert_eq!(summary.matches_loaded, 400);
    assert!(summary.coverage.best_of_five_observed > 0);
    assert!(summary.coverage.best_of_three_observed > 0);
    assert_eq!(
        summary.coverage.unscored.len() + summary.coverage.observed_reference,
        summary.coverage.reference_total
    );
}

#[test]
fn analyze_is_independent_of_sharding() {
    let corpus = set_scorigami::fake_corpus::synthetic_matches(600, 42);
    let sequential = analyze(&corpus, None).unwrap();
    let sharded = analyze(&corpus, Some(50)).unwrap();
    assert_eq!(sequential.processed, sharded.processed);
    assert_eq!(sequential.transition_rows, sharded.transition_rows);
    assert_eq!(sequential.coverage, sharded.coverage);
}
