use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AnalysisError;
use crate::match_store::MatchFilter;

const CACHE_DIR: &str = "set_scorigami";
const DB_FILE: &str = "scorigami.sqlite";

pub const ENV_DB_PATH: &str = "SCORIGAMI_DB_PATH";
pub const ENV_TOURNAMENT_ID: &str = "SCORIGAMI_TOURNAMENT_ID";
pub const ENV_EVENT_YEAR: &str = "SCORIGAMI_EVENT_YEAR";
pub const ENV_EVENT_GENDER: &str = "SCORIGAMI_EVENT_GENDER";
pub const ENV_SHARD_SIZE: &str = "SCORIGAMI_SHARD_SIZE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub db_path: PathBuf,
    pub filter: MatchFilter,
    /// `Some(n)` aggregates shards of `n` matches in parallel.
    pub shard_size: Option<usize>,
    /// Analyze this many generated matches instead of reading the store.
    pub synthetic_matches: Option<usize>,
}

impl AnalysisConfig {
    /// Loads `.env.local` and `.env`, then resolves every setting from CLI args first and the
    /// environment second. Unparseable values fail here, before any work.
    pub fn load(args: &[String]) -> Result<Self, AnalysisError> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    pub fn resolve(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AnalysisError> {
        let lookup = |flag: &str, key: &str| {
            arg_value(args, flag).or_else(|| env(key).filter(|v| !v.trim().is_empty()))
        };

        let db_path = lookup("--db", ENV_DB_PATH)
            .map(PathBuf::from)
            .or_else(default_db_path)
            .ok_or_else(|| {
                AnalysisError::Config(format!(
                    "no database path: pass --db or set {ENV_DB_PATH} (no cache dir available)"
                ))
            })?;

        let filter = MatchFilter {
            tournament_id: parse_opt(
                lookup("--tournament-id", ENV_TOURNAMENT_ID),
                "tournament id",
            )?,
            event_year: parse_opt(lookup("--event-year", ENV_EVENT_YEAR), "event year")?,
            event_gender: lookup("--gender", ENV_EVENT_GENDER).map(|g| g.trim().to_string()),
        };

        let shard_size =
            parse_opt::<usize>(lookup("--shard-size", ENV_SHARD_SIZE), "shard size")?;
        if shard_size == Some(0) {
            return Err(AnalysisError::Config("shard size must be positive".to_string()));
        }
        let synthetic_matches = parse_opt(arg_value(args, "--synthetic"), "synthetic match count")?;

        Ok(Self {
            db_path,
            filter,
            shard_size,
            synthetic_matches,
        })
    }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

/// Value of `--flag=value` or `--flag value`.
pub fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn parse_opt<T: FromStr>(raw: Option<String>, what: &str) -> Result<Option<T>, AnalysisError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| AnalysisError::Config(format!("invalid {what}: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cli_overrides_environment() {
        let env = HashMap::from([
            (ENV_DB_PATH, "/tmp/env.sqlite"),
            (ENV_TOURNAMENT_ID, "3"),
            (ENV_EVENT_GENDER, "W"),
        ]);
        let cfg = AnalysisConfig::resolve(
            &args(&["--db", "/tmp/cli.sqlite", "--tournament-id=9", "--shard-size", "500"]),
            |key| env.get(key).map(|v| v.to_string()),
        )
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/cli.sqlite"));
        assert_eq!(cfg.filter.tournament_id, Some(9));
        assert_eq!(cfg.filter.event_gender.as_deref(), Some("W"));
        assert_eq!(cfg.filter.event_year, None);
        assert_eq!(cfg.shard_size, Some(500));
        assert_eq!(cfg.synthetic_matches, None);
    }

    #[test]
    fn bad_numbers_fail_fast() {
        let err = AnalysisConfig::resolve(
            &args(&["--db=/tmp/x.sqlite", "--event-year", "soon"]),
            |_| None,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::Config(msg) if msg.contains("event year")));

        let err =
            AnalysisConfig::resolve(&args(&["--db=/tmp/x.sqlite", "--shard-size=0"]), |_| None)
                .unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn arg_value_supports_both_forms() {
        let a = args(&["--gender", "M", "--synthetic=2000"]);
        assert_eq!(arg_value(&a, "--gender").as_deref(), Some("M"));
        assert_eq!(arg_value(&a, "--synthetic").as_deref(), Some("2000"));
        assert_eq!(arg_value(&a, "--db"), None);
    }
}
