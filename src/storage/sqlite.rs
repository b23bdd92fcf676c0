use super::{ActivityFilter, ActivityStore};
use crate::error::{PipelineError, Result};
use crate::types::{CleanedActivity, CleaningMode, CleaningRun, Platform, RawActivity, RawSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

const RAW_COLUMNS: &str = "id, activity_name, provider_name, location, city, country, region, \
    price_text, rating_text, review_count_text, duration_text, description, tags, category, \
    activity_type, venue, url, imported_at";

const CLEANED_COLUMNS: &str = "id, original_id, activity_name, provider_name, location, city, \
    country, region, price_text, price_numeric, price_currency, rating_text, rating_numeric, \
    review_count_text, review_count_numeric, duration_text, duration_hours, duration_days, \
    description, tags, category, activity_type, venue, url, quality_score, platform, \
    original_source, cleaned_at";

fn raw_table_ddl(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            activity_name     TEXT NOT NULL,
            provider_name     TEXT NOT NULL,
            location          TEXT,
            city              TEXT,
            country           TEXT,
            region            TEXT,
            price_text        TEXT,
            rating_text       TEXT,
            review_count_text TEXT,
            duration_text     TEXT,
            description       TEXT,
            tags              TEXT NOT NULL DEFAULT '[]',
            category          TEXT,
            activity_type     TEXT,
            venue             TEXT,
            url               TEXT,
            imported_at       TEXT NOT NULL
        );
        "#
    )
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS "CleanedActivity" (
        id                   TEXT PRIMARY KEY,
        original_id          INTEGER NOT NULL,
        activity_name        TEXT NOT NULL,
        provider_name        TEXT NOT NULL,
        location             TEXT,
        city                 TEXT NOT NULL,
        country              TEXT,
        region               TEXT,
        price_text           TEXT NOT NULL,
        price_numeric        REAL,
        price_currency       TEXT,
        rating_text          TEXT NOT NULL,
        rating_numeric       REAL,
        review_count_text    TEXT NOT NULL,
        review_count_numeric INTEGER,
        duration_text        TEXT NOT NULL,
        duration_hours       REAL,
        duration_days        REAL,
        description          TEXT,
        tags                 TEXT NOT NULL DEFAULT '[]',
        category             TEXT,
        activity_type        TEXT,
        venue                TEXT,
        url                  TEXT,
        quality_score        INTEGER NOT NULL,
        platform             TEXT NOT NULL,
        original_source      TEXT NOT NULL,
        cleaned_at           TEXT NOT NULL,
        UNIQUE (platform, original_id)
    );
    CREATE INDEX IF NOT EXISTS cleaned_activity_city ON "CleanedActivity" (city);
    CREATE TABLE IF NOT EXISTS import_batches (
        fingerprint TEXT PRIMARY KEY,
        source      TEXT NOT NULL,
        row_count   INTEGER NOT NULL,
        imported_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS cleaning_runs (
        id          TEXT PRIMARY KEY,
        mode        TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        finished_at TEXT,
        processed   INTEGER NOT NULL,
        failed      INTEGER NOT NULL
    );
"#;

/// SQLite-backed store holding both raw source tables and the cleaned table
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database file, creating parent directories as needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening activity database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        for source in RawSource::all() {
            conn.execute_batch(&raw_table_ddl(source.table_name()))?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PipelineError::Storage {
            message: "database connection lock poisoned".to_string(),
        })
    }
}

fn conversion_error<E>(index: usize, error: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}

fn time_at(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(index, e))
}

fn tags_at(row: &Row<'_>, index: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(index)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(index, e))
}

fn tags_json(tags: &[String]) -> Result<String> {
    Ok(serde_json::to_string(tags)?)
}

fn raw_from_row(row: &Row<'_>) -> rusqlite::Result<RawActivity> {
    Ok(RawActivity {
        id: Some(row.get(0)?),
        activity_name: row.get(1)?,
        provider_name: row.get(2)?,
        location: row.get(3)?,
        city: row.get(4)?,
        country: row.get(5)?,
        region: row.get(6)?,
        price_text: row.get(7)?,
        rating_text: row.get(8)?,
        review_count_text: row.get(9)?,
        duration_text: row.get(10)?,
        description: row.get(11)?,
        tags: tags_at(row, 12)?,
        category: row.get(13)?,
        activity_type: row.get(14)?,
        venue: row.get(15)?,
        url: row.get(16)?,
        imported_at: time_at(row, 17)?,
    })
}

fn cleaned_from_row(row: &Row<'_>) -> rusqlite::Result<CleanedActivity> {
    let id: String = row.get(0)?;
    let review_count: Option<i64> = row.get(14)?;
    let quality_score: i64 = row.get(24)?;
    let platform: String = row.get(25)?;

    Ok(CleanedActivity {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        original_id: row.get(1)?,
        activity_name: row.get(2)?,
        provider_name: row.get(3)?,
        location: row.get(4)?,
        city: row.get(5)?,
        country: row.get(6)?,
        region: row.get(7)?,
        price_text: row.get(8)?,
        price_numeric: row.get(9)?,
        price_currency: row.get(10)?,
        rating_text: row.get(11)?,
        rating_numeric: row.get(12)?,
        review_count_text: row.get(13)?,
        review_count_numeric: review_count
            .map(u32::try_from)
            .transpose()
            .map_err(|e| conversion_error(14, e))?,
        duration_text: row.get(15)?,
        duration_hours: row.get(16)?,
        duration_days: row.get(17)?,
        description: row.get(18)?,
        tags: tags_at(row, 19)?,
        category: row.get(20)?,
        activity_type: row.get(21)?,
        venue: row.get(22)?,
        url: row.get(23)?,
        quality_score: u8::try_from(quality_score).map_err(|e| conversion_error(24, e))?,
        platform: platform.parse::<Platform>().map_err(|e| conversion_error(25, e))?,
        original_source: row.get(26)?,
        cleaned_at: time_at(row, 27)?,
    })
}

fn mode_str(mode: CleaningMode) -> &'static str {
    match mode {
        CleaningMode::Incremental => "incremental",
        CleaningMode::Rebuild => "rebuild",
    }
}

#[async_trait]
impl ActivityStore for SqliteStorage {
    async fn create_raw_activity(&self, source: RawSource, activity: &mut RawActivity) -> Result<()> {
        let tags = tags_json(&activity.tags)?;
        let conn = self.conn()?;
        conn.execute(
            &format!(
                r#"INSERT INTO "{}" (activity_name, provider_name, location, city, country, region,
                    price_text, rating_text, review_count_text, duration_text, description, tags,
                    category, activity_type, venue, url, imported_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"#,
                source.table_name()
            ),
            params![
                activity.activity_name,
                activity.provider_name,
                activity.location,
                activity.city,
                activity.country,
                activity.region,
                activity.price_text,
                activity.rating_text,
                activity.review_count_text,
                activity.duration_text,
                activity.description,
                tags,
                activity.category,
                activity.activity_type,
                activity.venue,
                activity.url,
                activity.imported_at.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        activity.id = Some(id);

        debug!("Created raw activity: {} with id {} in {}", activity.activity_name, id, source);
        Ok(())
    }

    async fn get_raw_activities(&self, source: RawSource) -> Result<Vec<RawActivity>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {RAW_COLUMNS} FROM "{}" ORDER BY id ASC"#,
            source.table_name()
        ))?;
        let rows = stmt
            .query_map([], raw_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn delete_raw_activity(&self, source: RawSource, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(r#"DELETE FROM "{}" WHERE id = ?1"#, source.table_name()),
            params![id],
        )?;
        debug!("Deleted raw activity {} from {}", id, source);
        Ok(())
    }

    async fn get_cleaned_by_origin(
        &self,
        platform: Platform,
        original_id: i64,
    ) -> Result<Option<CleanedActivity>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    r#"SELECT {CLEANED_COLUMNS} FROM "CleanedActivity" WHERE platform = ?1 AND original_id = ?2"#
                ),
                params![platform.as_str(), original_id],
                cleaned_from_row,
            )
            .optional()?;
        Ok(row)
    }

    async fn create_cleaned_activity(&self, activity: &CleanedActivity) -> Result<()> {
        let tags = tags_json(&activity.tags)?;
        let conn = self.conn()?;
        conn.execute(
            &format!(
                r#"INSERT INTO "CleanedActivity" ({CLEANED_COLUMNS})
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                           ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)"#
            ),
            params![
                activity.id.to_string(),
                activity.original_id,
                activity.activity_name,
                activity.provider_name,
                activity.location,
                activity.city,
                activity.country,
                activity.region,
                activity.price_text,
                activity.price_numeric,
                activity.price_currency,
                activity.rating_text,
                activity.rating_numeric,
                activity.review_count_text,
                activity.review_count_numeric.map(i64::from),
                activity.duration_text,
                activity.duration_hours,
                activity.duration_days,
                activity.description,
                tags,
                activity.category,
                activity.activity_type,
                activity.venue,
                activity.url,
                i64::from(activity.quality_score),
                activity.platform.as_str(),
                activity.original_source,
                activity.cleaned_at.to_rfc3339(),
            ],
        )?;

        debug!("Created cleaned activity: {} with id {}", activity.activity_name, activity.id);
        Ok(())
    }

    async fn update_cleaned_activity(&self, activity: &CleanedActivity) -> Result<()> {
        let tags = tags_json(&activity.tags)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"UPDATE "CleanedActivity" SET
                original_id = ?2, activity_name = ?3, provider_name = ?4, location = ?5, city = ?6,
                country = ?7, region = ?8, price_text = ?9, price_numeric = ?10,
                price_currency = ?11, rating_text = ?12, rating_numeric = ?13,
                review_count_text = ?14, review_count_numeric = ?15, duration_text = ?16,
                duration_hours = ?17, duration_days = ?18, description = ?19, tags = ?20,
                category = ?21, activity_type = ?22, venue = ?23, url = ?24, quality_score = ?25,
                platform = ?26, original_source = ?27, cleaned_at = ?28
               WHERE id = ?1"#,
            params![
                activity.id.to_string(),
                activity.original_id,
                activity.activity_name,
                activity.provider_name,
                activity.location,
                activity.city,
                activity.country,
                activity.region,
                activity.price_text,
                activity.price_numeric,
                activity.price_currency,
                activity.rating_text,
                activity.rating_numeric,
                activity.review_count_text,
                activity.review_count_numeric.map(i64::from),
                activity.duration_text,
                activity.duration_hours,
                activity.duration_days,
                activity.description,
                tags,
                activity.category,
                activity.activity_type,
                activity.venue,
                activity.url,
                i64::from(activity.quality_score),
                activity.platform.as_str(),
                activity.original_source,
                activity.cleaned_at.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(PipelineError::Storage {
                message: format!("cannot update missing cleaned activity {}", activity.id),
            });
        }

        debug!("Updated cleaned activity: {} with id {}", activity.activity_name, activity.id);
        Ok(())
    }

    async fn delete_cleaned_activity(&self, id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"DELETE FROM "CleanedActivity" WHERE id = ?1"#,
            params![id.to_string()],
        )?;
        Ok(())
    }

    async fn clear_cleaned_activities(&self) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(r#"DELETE FROM "CleanedActivity""#, [])?;
        info!("Cleared {} cleaned activities", removed);
        Ok(removed)
    }

    async fn query_cleaned_activities(&self, filter: &ActivityFilter) -> Result<Vec<CleanedActivity>> {
        // SQLite's LOWER() only folds ASCII, so text filters run through
        // `ActivityFilter::matches` after the rows are read.
        let mut sql = format!(r#"SELECT {CLEANED_COLUMNS} FROM "CleanedActivity""#);
        let mut args: Vec<Value> = Vec::new();
        if let Some(platform) = filter.platform {
            sql.push_str(" WHERE platform = ?");
            args.push(Value::Text(platform.as_str().to_string()));
        }
        sql.push_str(
            " ORDER BY review_count_numeric IS NULL, review_count_numeric DESC, activity_name ASC, platform ASC, original_id ASC",
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows: Vec<CleanedActivity> = Vec::new();
        for row in stmt.query_map(params_from_iter(args), cleaned_from_row)? {
            if filter.limit.is_some_and(|limit| rows.len() >= limit) {
                break;
            }
            let activity = row?;
            if filter.matches(&activity) {
                rows.push(activity);
            }
        }
        Ok(rows)
    }

    async fn has_import_batch(&self, fingerprint: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM import_batches WHERE fingerprint = ?1",
                params![fingerprint],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn record_import_batch(&self, fingerprint: &str, source: RawSource, row_count: usize) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO import_batches (fingerprint, source, row_count, imported_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                fingerprint,
                source.table_name(),
                i64::try_from(row_count).unwrap_or(i64::MAX),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn create_cleaning_run(&self, run: &mut CleaningRun) -> Result<()> {
        let id = Uuid::new_v4();
        run.id = Some(id);

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cleaning_runs (id, mode, created_at, finished_at, processed, failed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                mode_str(run.mode),
                run.created_at.to_rfc3339(),
                run.finished_at.map(|t| t.to_rfc3339()),
                i64::try_from(run.processed).unwrap_or(i64::MAX),
                i64::try_from(run.failed).unwrap_or(i64::MAX),
            ],
        )?;

        debug!("Created cleaning run with id {}", id);
        Ok(())
    }

    async fn update_cleaning_run(&self, run: &CleaningRun) -> Result<()> {
        let run_id = run.id.ok_or_else(|| PipelineError::Storage {
            message: "Cannot update cleaning run without ID".to_string(),
        })?;

        let conn = self.conn()?;
        conn.execute(
            "UPDATE cleaning_runs SET finished_at = ?2, processed = ?3, failed = ?4 WHERE id = ?1",
            params![
                run_id.to_string(),
                run.finished_at.map(|t| t.to_rfc3339()),
                i64::try_from(run.processed).unwrap_or(i64::MAX),
                i64::try_from(run.failed).unwrap_or(i64::MAX),
            ],
        )?;

        debug!("Updated cleaning run with id {}", run_id);
        Ok(())
    }
}
