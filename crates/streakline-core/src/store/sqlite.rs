use super::AnalyticsStore;
use crate::{AnalyticsError, AnalyticsRecord, AnalyticsResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Columns written by earlier releases that are no longer maintained.
const LEGACY_COLUMNS: &[&str] = &["total_commits"];

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS github_analytics (
    username              TEXT PRIMARY KEY NOT NULL,
    total_repos           INTEGER NOT NULL DEFAULT 0,
    private_repos         INTEGER NOT NULL DEFAULT 0,
    forked_repos          INTEGER NOT NULL DEFAULT 0,
    total_stars           INTEGER NOT NULL DEFAULT 0,
    total_forks           INTEGER NOT NULL DEFAULT 0,
    total_commit_activity INTEGER NOT NULL DEFAULT 0,
    total_prs             INTEGER NOT NULL DEFAULT 0,
    total_issues          INTEGER NOT NULL DEFAULT 0,
    total_reviews         INTEGER NOT NULL DEFAULT 0,
    total_contributions   INTEGER NOT NULL DEFAULT 0,
    current_streak        INTEGER NOT NULL DEFAULT 0,
    longest_streak        INTEGER NOT NULL DEFAULT 0,
    active_weeks          INTEGER NOT NULL DEFAULT 0,
    last_updated          TEXT NOT NULL
);
";

const UPSERT: &str = "
INSERT INTO github_analytics (
    username, total_repos, private_repos, forked_repos, total_stars, total_forks,
    total_commit_activity, total_prs, total_issues, total_reviews,
    total_contributions, current_streak, longest_streak, active_weeks, last_updated
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
ON CONFLICT(username) DO UPDATE SET
    total_repos = excluded.total_repos,
    private_repos = excluded.private_repos,
    forked_repos = excluded.forked_repos,
    total_stars = excluded.total_stars,
    total_forks = excluded.total_forks,
    total_commit_activity = excluded.total_commit_activity,
    total_prs = excluded.total_prs,
    total_issues = excluded.total_issues,
    total_reviews = excluded.total_reviews,
    total_contributions = excluded.total_contributions,
    current_streak = excluded.current_streak,
    longest_streak = excluded.longest_streak,
    active_weeks = excluded.active_weeks,
    last_updated = excluded.last_updated
";

const SELECT_BY_USERNAME: &str = "
SELECT username, total_repos, private_repos, forked_repos, total_stars, total_forks,
       total_commit_activity, total_prs, total_issues, total_reviews,
       total_contributions, current_streak, longest_streak, active_weeks, last_updated
FROM github_analytics
WHERE username = ?1
";

/// SQLite-backed store. All statements run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub async fn open(path: impl Into<PathBuf>) -> AnalyticsResult<Self> {
        let path = path.into();
        let open_path = path.clone();

        let conn = tokio::task::spawn_blocking(move || -> AnalyticsResult<Connection> {
            if let Some(parent) = open_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AnalyticsError::Storage(format!(
                            "cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
            let conn = Connection::open(&open_path)?;
            initialize_schema(&conn)?;
            Ok(conn)
        })
        .await??;

        debug!(path = %path.display(), "Opened analytics database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Drop deprecated columns. Returns the names of the columns removed.
    pub async fn migrate(&self) -> AnalyticsResult<Vec<String>> {
        let removed = self.with_conn(|conn| Ok(migrate_legacy_columns(conn)?)).await?;
        for column in &removed {
            info!(path = %self.path.display(), column = %column, "Removed legacy column");
        }
        Ok(removed)
    }

    async fn with_conn<T, F>(&self, f: F) -> AnalyticsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> AnalyticsResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| AnalyticsError::Storage("connection lock poisoned".into()))?;
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl AnalyticsStore for SqliteStore {
    async fn upsert(&self, record: AnalyticsRecord) -> AnalyticsResult<AnalyticsRecord> {
        self.with_conn(move |conn| {
            conn.execute(
                UPSERT,
                params![
                    record.username,
                    to_sql_int(record.total_repos),
                    to_sql_int(record.private_repos),
                    to_sql_int(record.forked_repos),
                    to_sql_int(record.total_stars),
                    to_sql_int(record.total_forks),
                    to_sql_int(record.total_commit_activity),
                    to_sql_int(record.total_prs),
                    to_sql_int(record.total_issues),
                    to_sql_int(record.total_reviews),
                    to_sql_int(record.total_contributions),
                    record.current_streak,
                    record.longest_streak,
                    record.active_weeks,
                    record.last_updated.to_rfc3339(),
                ],
            )?;
            Ok(record)
        })
        .await
    }

    async fn find(&self, username: &str) -> AnalyticsResult<Option<AnalyticsRecord>> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(SELECT_BY_USERNAME, params![username], record_from_row)
                .optional()?)
        })
        .await
    }
}

fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    conn.execute_batch(SCHEMA)
}

/// Remove [`LEGACY_COLUMNS`] from `github_analytics` where present.
pub fn migrate_legacy_columns(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let existing = table_columns(conn, "github_analytics")?;
    let mut removed = Vec::new();

    for column in LEGACY_COLUMNS {
        if existing.iter().any(|c| c == column) {
            conn.execute_batch(&format!("ALTER TABLE github_analytics DROP COLUMN {}", column))?;
            removed.push(column.to_string());
        }
    }

    Ok(removed)
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AnalyticsRecord> {
    let last_updated: String = row.get(14)?;
    let last_updated = DateTime::parse_from_rfc3339(&last_updated)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(14, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(AnalyticsRecord {
        username: row.get(0)?,
        total_repos: from_sql_int(row.get(1)?),
        private_repos: from_sql_int(row.get(2)?),
        forked_repos: from_sql_int(row.get(3)?),
        total_stars: from_sql_int(row.get(4)?),
        total_forks: from_sql_int(row.get(5)?),
        total_commit_activity: from_sql_int(row.get(6)?),
        total_prs: from_sql_int(row.get(7)?),
        total_issues: from_sql_int(row.get(8)?),
        total_reviews: from_sql_int(row.get(9)?),
        total_contributions: from_sql_int(row.get(10)?),
        current_streak: row.get(11)?,
        longest_streak: row.get(12)?,
        active_weeks: row.get(13)?,
        last_updated,
    })
}
