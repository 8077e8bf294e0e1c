//! SQLite implementation of the curbside schedule cache.
//!
//! One table, `schedules`, keyed by the caller's raw address and ZIP. Schedules are
//! stored as JSON text so both events and reference links round-trip unchanged.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use curbside_core::{
    model::{NewSchedule, Schedule, ScheduleRecord},
    ports::{PortError, ScheduleStore},
};

const CREATE_SCHEDULES: &str = r"
    CREATE TABLE IF NOT EXISTS schedules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        address TEXT NOT NULL,
        city TEXT,
        state TEXT,
        zip_code TEXT,
        schedule TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
";

const CREATE_LOOKUP_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_schedules_address_zip ON schedules (address, zip_code)";

/// Schedule cache persisted in a SQLite file.
#[derive(Clone)]
pub struct SqliteScheduleStore {
    pool: SqlitePool,
}

impl SqliteScheduleStore {
    /// Open (creating if needed) the database at `path` and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Storage`] if the file cannot be opened or the schema
    /// cannot be created.
    pub async fn connect(path: &Path) -> Result<Self, PortError> {
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&url)
            .await
            .map_err(storage)?;
        let store = Self::from_pool(pool).await?;
        info!(path = %path.display(), "schedule cache opened");
        Ok(store)
    }

    /// Wrap an existing pool, creating the schema if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Storage`] if the schema cannot be created.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, PortError> {
        sqlx::query(CREATE_SCHEDULES)
            .execute(&pool)
            .await
            .map_err(storage)?;
        sqlx::query(CREATE_LOOKUP_INDEX)
            .execute(&pool)
            .await
            .map_err(storage)?;
        Ok(Self { pool })
    }

    /// Number of cached rows, duplicates included.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Storage`] if the count query fails.
    pub async fn count(&self) -> Result<i64, PortError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM schedules")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)
    }
}

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
    async fn find(
        &self,
        address: &str,
        zip_code: Option<&str>,
    ) -> Result<Option<ScheduleRecord>, PortError> {
        // `IS` so a missing ZIP matches rows stored without one.
        let row = sqlx::query(
            "SELECT id, address, city, state, zip_code, schedule, created_at
             FROM schedules
             WHERE address = ? AND zip_code IS ?
             ORDER BY id
             LIMIT 1",
        )
        .bind(address)
        .bind(zip_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        let Some(row) = row else {
            debug!("schedule cache miss");
            return Ok(None);
        };
        decode_record(&row).map(Some)
    }

    async fn insert(&self, schedule: NewSchedule) -> Result<ScheduleRecord, PortError> {
        let payload = serde_json::to_string(&schedule.schedule)?;
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO schedules (address, city, state, zip_code, schedule, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&schedule.address)
        .bind(&schedule.city)
        .bind(&schedule.state)
        .bind(&schedule.zip_code)
        .bind(&payload)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        let id = result.last_insert_rowid();
        debug!(id, "schedule cached");
        Ok(ScheduleRecord {
            id,
            address: schedule.address,
            city: schedule.city,
            state: schedule.state,
            zip_code: schedule.zip_code,
            schedule: schedule.schedule,
            created_at,
        })
    }
}

fn decode_record(row: &SqliteRow) -> Result<ScheduleRecord, PortError> {
    let payload: String = row.try_get("schedule").map_err(storage)?;
    let schedule: Schedule = serde_json::from_str(&payload)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(storage)?;
    Ok(ScheduleRecord {
        id: row.try_get("id").map_err(storage)?,
        address: row.try_get("address").map_err(storage)?,
        city: row.try_get("city").map_err(storage)?,
        state: row.try_get("state").map_err(storage)?,
        zip_code: row.try_get("zip_code").map_err(storage)?,
        schedule,
        created_at,
    })
}

fn storage(err: sqlx::Error) -> PortError {
    PortError::Storage(err.to_string())
}
