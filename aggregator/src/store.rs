use std::collections::HashMap;
use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::event::LogEvent;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode payload: {0}")]
    PayloadEncoding(#[from] serde_json::Error),
    #[error("failed to format timestamp: {0}")]
    TimestampEncoding(#[from] time::error::Format),
    #[error("failed to parse stored timestamp: {0}")]
    TimestampDecoding(#[from] time::error::Parse),
}

/// Durable record of every admitted event, keyed by `(topic, event_id)`.
///
/// The primary key makes the insert the dedup decision: whoever inserts
/// the row first wins, for the lifetime of the store. Connections are
/// acquired from the pool per operation, there is no long-held handle.
#[derive(Clone)]
pub struct DedupStore {
    pool: SqlitePool,
}

impl DedupStore {
    pub async fn new(path: &str) -> Result<DedupStore, StoreError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Ok(DedupStore { pool })
    }

    /// Idempotently ensures the table exists. Safe against stores created
    /// by the pre-payload schema version: the missing column is added,
    /// existing rows are never touched.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_events (
                topic TEXT NOT NULL,
                event_id TEXT NOT NULL,
                timestamp TEXT,
                source TEXT,
                payload TEXT,
                admitted_at TEXT NOT NULL,
                PRIMARY KEY (topic, event_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let columns = sqlx::query("PRAGMA table_info(processed_events)")
            .fetch_all(&self.pool)
            .await?;
        let has_payload = columns
            .iter()
            .any(|row| row.get::<String, _>("name") == "payload");
        if !has_payload {
            info!("adding payload column to processed_events");
            sqlx::query("ALTER TABLE processed_events ADD COLUMN payload TEXT")
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Atomically persists the event unless its identity key is already
    /// present. Returns true iff this call inserted the row; a conflict
    /// on the primary key is the expected duplicate case, not an error.
    pub async fn insert_if_absent(&self, event: &LogEvent) -> Result<bool, StoreError> {
        let payload = serde_json::to_string(&event.payload)?;
        let timestamp = event.timestamp.format(&Rfc3339)?;
        let admitted_at = OffsetDateTime::now_utc().format(&Rfc3339)?;

        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (topic, event_id, timestamp, source, payload, admitted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (topic, event_id) DO NOTHING
            "#,
        )
        .bind(&event.topic)
        .bind(&event.event_id)
        .bind(timestamp)
        .bind(&event.source)
        .bind(payload)
        .bind(admitted_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Full scan in admission order, for startup rehydration. Rows that
    /// fail to decode are skipped with a warning instead of failing the
    /// whole load.
    pub async fn load_all_ordered(&self) -> Result<Vec<LogEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT topic, event_id, timestamp, source, payload \
             FROM processed_events ORDER BY rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            match decode_row(&row) {
                Ok(event) => events.push(event),
                Err(err) => warn!("skipping unreadable stored event: {}", err),
            }
        }
        Ok(events)
    }
}

fn decode_row(row: &SqliteRow) -> Result<LogEvent, StoreError> {
    let timestamp = match row.get::<Option<String>, _>("timestamp") {
        Some(raw) => OffsetDateTime::parse(&raw, &Rfc3339)?,
        None => OffsetDateTime::now_utc(),
    };
    let payload = match row.get::<Option<String>, _>("payload") {
        Some(raw) => serde_json::from_str(&raw)?,
        None => HashMap::new(),
    };

    Ok(LogEvent {
        topic: row.get("topic"),
        event_id: row.get("event_id"),
        timestamp,
        source: row
            .get::<Option<String>, _>("source")
            .unwrap_or_default(),
        payload,
    })
}
