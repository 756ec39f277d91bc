use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::AnalysisError;
use crate::match_processor::{
    MatchRecord, PermutationCounts, PermutationMatches, ProcessedMatches,
};
use crate::transition_stats::TransitionRow;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFilter {
    pub tournament_id: Option<i64>,
    pub event_year: Option<i32>,
    pub event_gender: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub permutations_upserted: usize,
    pub permutation_matches_inserted: usize,
    pub transitions_upserted: usize,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates every table used by ingestion and analysis. `event.event_year` is 0
/// when the year is unknown so that it can take part in the natural key.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS tournament (
            tournament_id INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS event_type (
            event_type_id INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS event (
            event_id INTEGER PRIMARY KEY AUTOINCREMENT,
            tournament_id INTEGER NOT NULL REFERENCES tournament(tournament_id),
            event_type_id INTEGER NOT NULL REFERENCES event_type(event_type_id),
            event_gender TEXT NOT NULL,
            event_year INTEGER NOT NULL DEFAULT 0,
            name TEXT NULL,
            UNIQUE (tournament_id, event_type_id, event_gender, event_year)
        );
        CREATE TABLE IF NOT EXISTS player (
            player_id INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS tennis_match (
            match_id INTEGER PRIMARY KEY,
            event_id INTEGER NOT NULL REFERENCES event(event_id),
            player_a_id INTEGER NULL REFERENCES player(player_id),
            player_b_id INTEGER NULL REFERENCES player(player_id),
            round_name TEXT NULL,
            match_start_time TEXT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tennis_match_event ON tennis_match(event_id);
        CREATE TABLE IF NOT EXISTS set_score (
            match_id INTEGER NOT NULL REFERENCES tennis_match(match_id),
            set_number INTEGER NOT NULL,
            player_a_score INTEGER NULL,
            player_b_score INTEGER NULL,
            PRIMARY KEY (match_id, set_number)
        );

        CREATE TABLE IF NOT EXISTS match_permutation (
            permutation_id INTEGER PRIMARY KEY AUTOINCREMENT,
            permutation_string TEXT NOT NULL UNIQUE,
            occurrence_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS permutation_match (
            permutation_id INTEGER NOT NULL REFERENCES match_permutation(permutation_id),
            match_id INTEGER NOT NULL,
            PRIMARY KEY (permutation_id, match_id)
        );
        CREATE INDEX IF NOT EXISTS idx_permutation_match_match ON permutation_match(match_id);
        CREATE TABLE IF NOT EXISTS set_score_transition_matrix (
            current_set_score TEXT NOT NULL,
            next_set_score TEXT NOT NULL,
            event_sex TEXT NOT NULL,
            event_type_id INTEGER NOT NULL,
            tournament_id INTEGER NOT NULL,
            transition_count INTEGER NOT NULL,
            transition_probability REAL NOT NULL,
            PRIMARY KEY (current_set_score, next_set_score, event_sex, event_type_id, tournament_id)
        );

        CREATE TABLE IF NOT EXISTS analysis_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            matches_processed INTEGER NOT NULL,
            permutations_upserted INTEGER NOT NULL,
            permutation_matches_inserted INTEGER NOT NULL,
            transitions_upserted INTEGER NOT NULL,
            error_message TEXT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn upsert_match_record(conn: &Connection, m: &MatchRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO tournament (tournament_id) VALUES (?1) ON CONFLICT DO NOTHING",
        params![m.tournament_id],
    )
    .context("upsert tournament")?;
    conn.execute(
        "INSERT INTO event_type (event_type_id) VALUES (?1) ON CONFLICT DO NOTHING",
        params![m.event_type_id],
    )
    .context("upsert event type")?;

    let event_id: i64 = conn
        .query_row(
            r#"
            INSERT INTO event (tournament_id, event_type_id, event_gender, event_year, name)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (tournament_id, event_type_id, event_gender, event_year) DO UPDATE SET
                name = COALESCE(excluded.name, event.name)
            RETURNING event_id
            "#,
            params![
                m.tournament_id,
                m.event_type_id,
                m.event_gender,
                m.event_year.unwrap_or(0),
                m.event_name,
            ],
            |row| row.get(0),
        )
        .context("upsert event")?;

    let player_a_id = upsert_player(conn, m.player_a_full_name.as_deref())?;
    let player_b_id = upsert_player(conn, m.player_b_full_name.as_deref())?;

    conn.execute(
        r#"
        INSERT INTO tennis_match (
            match_id, event_id, player_a_id, player_b_id, round_name, match_start_time, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT (match_id) DO UPDATE SET
            event_id = excluded.event_id,
            player_a_id = excluded.player_a_id,
            player_b_id = excluded.player_b_id,
            round_name = excluded.round_name,
            match_start_time = excluded.match_start_time,
            updated_at = excluded.updated_at
        "#,
        params![
            m.match_id,
            event_id,
            player_a_id,
            player_b_id,
            m.round_name,
            m.match_start_time,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert match")?;

    // Sides are stored as recorded; a missing score on one side is kept as
    // NULL so the analysis pass sees the inconsistency.
    let set_total = m.player_a_scores.len().max(m.player_b_scores.len());
    for idx in 0..set_total {
        conn.execute(
            r#"
            INSERT INTO set_score (match_id, set_number, player_a_score, player_b_score)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (match_id, set_number) DO UPDATE SET
                player_a_score = excluded.player_a_score,
                player_b_score = excluded.player_b_score
            "#,
            params![
                m.match_id,
                (idx + 1) as i64,
                m.player_a_scores.get(idx),
                m.player_b_scores.get(idx),
            ],
        )
        .context("upsert set score")?;
    }
    conn.execute(
        "DELETE FROM set_score WHERE match_id = ?1 AND set_number > ?2",
        params![m.match_id, set_total as i64],
    )
    .context("trim stale set scores")?;

    Ok(())
}

fn upsert_player(conn: &Connection, full_name: Option<&str>) -> Result<Option<i64>> {
    let Some(name) = full_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    let id = conn
        .query_row(
            r#"
            INSERT INTO player (full_name) VALUES (?1)
            ON CONFLICT (full_name) DO UPDATE SET full_name = excluded.full_name
            RETURNING player_id
            "#,
            params![name],
            |row| row.get(0),
        )
        .context("upsert player")?;
    Ok(Some(id))
}

struct SetRow {
    match_id: i64,
    tournament_id: i64,
    event_type_id: i64,
    event_gender: String,
    event_year: Option<i32>,
    event_name: Option<String>,
    round_name: Option<String>,
    match_start_time: Option<String>,
    player_a_full_name: Option<String>,
    player_b_full_name: Option<String>,
    player_a_score: Option<u32>,
    player_b_score: Option<u32>,
}

/// Folds set rows into one record. Each side keeps its scores up to its first
/// NULL, so a score missing on one side always leaves the sides with unequal
/// lengths instead of shifting later sets into the gap.
struct RecordFold {
    record: MatchRecord,
    a_open: bool,
    b_open: bool,
}

impl RecordFold {
    fn push_set(&mut self, a: Option<u32>, b: Option<u32>) {
        if a.is_none() && b.is_none() {
            return;
        }
        push_side(&mut self.record.player_a_scores, &mut self.a_open, a);
        push_side(&mut self.record.player_b_scores, &mut self.b_open, b);
    }
}

fn push_side(scores: &mut Vec<u32>, open: &mut bool, score: Option<u32>) {
    match score {
        Some(games) if *open => scores.push(games),
        Some(_) => {}
        None => *open = false,
    }
}

impl SetRow {
    fn into_fold(self) -> RecordFold {
        let record = MatchRecord {
            match_id: self.match_id,
            tournament_id: self.tournament_id,
            event_type_id: self.event_type_id,
            event_gender: self.event_gender,
            player_a_scores: Vec::new(),
            player_b_scores: Vec::new(),
            player_a_full_name: self.player_a_full_name,
            player_b_full_name: self.player_b_full_name,
            round_name: self.round_name,
            event_name: self.event_name,
            event_year: self.event_year,
            match_start_time: self.match_start_time,
        };
        let mut fold = RecordFold {
            record,
            a_open: true,
            b_open: true,
        };
        fold.push_set(self.player_a_score, self.player_b_score);
        fold
    }
}

/// One record per match with stored sets, in match id order.
pub fn fetch_aggregated_match_data(
    conn: &Connection,
    filter: &MatchFilter,
) -> Result<Vec<MatchRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                m.match_id, e.tournament_id, e.event_type_id, e.event_gender,
                NULLIF(e.event_year, 0), e.name, m.round_name, m.match_start_time,
                pa.full_name, pb.full_name,
                s.player_a_score, s.player_b_score
            FROM tennis_match m
            JOIN event e ON e.event_id = m.event_id
            JOIN set_score s ON s.match_id = m.match_id
            LEFT JOIN player pa ON pa.player_id = m.player_a_id
            LEFT JOIN player pb ON pb.player_id = m.player_b_id
            WHERE (?1 IS NULL OR e.tournament_id = ?1)
              AND (?2 IS NULL OR e.event_year = ?2)
              AND (?3 IS NULL OR e.event_gender = ?3)
            ORDER BY m.match_id ASC, s.set_number ASC
            "#,
        )
        .context("prepare aggregated match query")?;

    let rows = stmt
        .query_map(
            params![filter.tournament_id, filter.event_year, filter.event_gender],
            |row| {
                Ok(SetRow {
                    match_id: row.get(0)?,
                    tournament_id: row.get(1)?,
                    event_type_id: row.get(2)?,
                    event_gender: row.get(3)?,
                    event_year: row.get(4)?,
                    event_name: row.get(5)?,
                    round_name: row.get(6)?,
                    match_start_time: row.get(7)?,
                    player_a_full_name: row.get(8)?,
                    player_b_full_name: row.get(9)?,
                    player_a_score: row.get(10)?,
                    player_b_score: row.get(11)?,
                })
            },
        )
        .context("query aggregated matches")?;

    let mut folds: Vec<RecordFold> = Vec::new();
    for row in rows {
        let row = row.context("decode set score row")?;
        match folds.last_mut() {
            Some(current) if current.record.match_id == row.match_id => {
                current.push_set(row.player_a_score, row.player_b_score);
            }
            _ => folds.push(row.into_fold()),
        }
    }
    Ok(folds.into_iter().map(|fold| fold.record).collect())
}

pub fn seed_permutations(conn: &Connection, permutations: &BTreeSet<String>) -> Result<usize> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO match_permutation (permutation_string, occurrence_count)
             VALUES (?1, 0)
             ON CONFLICT (permutation_string) DO NOTHING",
        )
        .context("prepare permutation seed")?;
    let mut inserted = 0usize;
    for permutation in permutations {
        inserted += stmt
            .execute(params![permutation])
            .context("seed permutation")?;
    }
    Ok(inserted)
}

pub fn permutation_strings(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("SELECT permutation_string FROM match_permutation")
        .context("prepare permutation string query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query permutation strings")?;
    let mut out = HashSet::new();
    for row in rows {
        out.insert(row.context("decode permutation string")?);
    }
    Ok(out)
}

pub fn load_permutation_counts(conn: &Connection) -> Result<PermutationCounts> {
    let mut stmt = conn
        .prepare("SELECT permutation_string, occurrence_count FROM match_permutation")
        .context("prepare permutation count query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .context("query permutation counts")?;
    let mut out = PermutationCounts::new();
    for row in rows {
        let (permutation, count) = row.context("decode permutation count")?;
        out.insert(permutation, count.max(0) as u64);
    }
    Ok(out)
}

pub fn upsert_permutations(
    conn: &Connection,
    counts: &PermutationCounts,
) -> Result<HashMap<String, i64>> {
    let mut stmt = conn
        .prepare(
            r#"
            INSERT INTO match_permutation (permutation_string, occurrence_count)
            VALUES (?1, ?2)
            ON CONFLICT (permutation_string) DO UPDATE SET
                occurrence_count = match_permutation.occurrence_count + excluded.occurrence_count
            RETURNING permutation_id
            "#,
        )
        .context("prepare permutation upsert")?;

    let mut keys = counts.keys().collect::<Vec<_>>();
    keys.sort_unstable();

    let mut ids = HashMap::with_capacity(keys.len());
    for permutation in keys {
        let count = counts[permutation];
        let id = stmt
            .query_row(params![permutation, count as i64], |row| row.get::<_, i64>(0))
            .optional()
            .with_context(|| format!("upsert permutation {permutation}"))?
            .ok_or_else(|| {
                AnalysisError::PersistenceConflict(format!(
                    "no permutation id returned for {permutation}"
                ))
            })?;
        ids.insert(permutation.clone(), id);
    }
    Ok(ids)
}

pub fn insert_permutation_matches(
    conn: &Connection,
    permutation_matches: &PermutationMatches,
    permutation_ids: &HashMap<String, i64>,
) -> Result<usize> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO permutation_match (permutation_id, match_id)
             VALUES (?1, ?2)
             ON CONFLICT DO NOTHING",
        )
        .context("prepare permutation match insert")?;

    let mut inserted = 0usize;
    for (permutation, match_ids) in permutation_matches {
        let Some(permutation_id) = permutation_ids.get(permutation) else {
            return Err(AnalysisError::PersistenceConflict(format!(
                "permutation {permutation} has matches but no stored id"
            ))
            .into());
        };
        for match_id in match_ids {
            inserted += stmt
                .execute(params![permutation_id, match_id])
                .context("insert permutation match")?;
        }
    }
    Ok(inserted)
}

pub fn matches_for_permutation(conn: &Connection, permutation: &str) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT pm.match_id
            FROM permutation_match pm
            JOIN match_permutation p ON p.permutation_id = pm.permutation_id
            WHERE p.permutation_string = ?1
            ORDER BY pm.match_id ASC
            "#,
        )
        .context("prepare permutation match query")?;
    let rows = stmt
        .query_map(params![permutation], |row| row.get::<_, i64>(0))
        .context("query permutation matches")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode permutation match")?);
    }
    Ok(out)
}

/// Upserts matrix rows; a re-run replaces count and probability for each key.
pub fn upsert_transition_matrix(conn: &Connection, rows: &[TransitionRow]) -> Result<usize> {
    let mut stmt = conn
        .prepare(
            r#"
            INSERT INTO set_score_transition_matrix (
                current_set_score, next_set_score, event_sex, event_type_id, tournament_id,
                transition_count, transition_probability
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (current_set_score, next_set_score, event_sex, event_type_id, tournament_id)
            DO UPDATE SET
                transition_count = excluded.transition_count,
                transition_probability = excluded.transition_probability
            "#,
        )
        .context("prepare transition upsert")?;

    for row in rows {
        stmt.execute(params![
            row.current_set,
            row.next_set,
            row.event_gender,
            row.event_type_id,
            row.tournament_id,
            row.transition_count as i64,
            row.transition_probability,
        ])
        .context("upsert transition row")?;
    }
    Ok(rows.len())
}

pub fn load_transition_rows(conn: &Connection) -> Result<Vec<TransitionRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                current_set_score, next_set_score, event_sex, event_type_id, tournament_id,
                transition_count, transition_probability
            FROM set_score_transition_matrix
            ORDER BY current_set_score, next_set_score, event_sex, tournament_id, event_type_id
            "#,
        )
        .context("prepare transition matrix query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TransitionRow {
                current_set: row.get(0)?,
                next_set: row.get(1)?,
                event_gender: row.get(2)?,
                event_type_id: row.get(3)?,
                tournament_id: row.get(4)?,
                transition_count: row.get::<_, i64>(5)?.max(0) as u64,
                transition_probability: row.get(6)?,
            })
        })
        .context("query transition matrix")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode transition row")?);
    }
    Ok(out)
}

pub fn persist_aggregates(
    conn: &mut Connection,
    processed: &ProcessedMatches,
    rows: &[TransitionRow],
) -> Result<PersistSummary> {
    let tx = conn.transaction().context("begin analysis transaction")?;
    let ids = upsert_permutations(&tx, &processed.permutation_counts)?;
    let permutation_matches_inserted =
        insert_permutation_matches(&tx, &processed.permutation_matches, &ids)?;
    let transitions_upserted = upsert_transition_matrix(&tx, rows)?;
    tx.commit().context("commit analysis transaction")?;

    Ok(PersistSummary {
        permutations_upserted: ids.len(),
        permutation_matches_inserted,
        transitions_upserted,
    })
}

pub fn start_run(conn: &Connection) -> Result<i64> {
    conn.execute(
        "INSERT INTO analysis_runs (
            started_at, finished_at, matches_processed, permutations_upserted,
            permutation_matches_inserted, transitions_upserted
         ) VALUES (?1, NULL, 0, 0, 0, 0)",
        params![Utc::now().to_rfc3339()],
    )
    .context("insert analysis run")?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_run(
    conn: &Connection,
    run_id: i64,
    matches_processed: usize,
    summary: &PersistSummary,
) -> Result<()> {
    conn.execute(
        "UPDATE analysis_runs
         SET finished_at = ?1, matches_processed = ?2, permutations_upserted = ?3,
             permutation_matches_inserted = ?4, transitions_upserted = ?5
         WHERE run_id = ?6",
        params![
            Utc::now().to_rfc3339(),
            matches_processed as i64,
            summary.permutations_upserted as i64,
            summary.permutation_matches_inserted as i64,
            summary.transitions_upserted as i64,
            run_id,
        ],
    )
    .context("update analysis run")?;
    Ok(())
}

/// Closes a run that aborted; its counts stay at zero since nothing was
/// published.
pub fn fail_run(conn: &Connection, run_id: i64, error: &str) -> Result<()> {
    conn.execute(
        "UPDATE analysis_runs SET finished_at = ?1, error_message = ?2 WHERE run_id = ?3",
        params![Utc::now().to_rfc3339(), error, run_id],
    )
    .context("record failed analysis run")?;
    Ok(())
}
