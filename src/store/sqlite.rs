//! SQLite-backed store.
//!
//! One table per operation:
//!
//! - `profiles`: `track_id` primary key, one `REAL` column per emotion label.
//! - `tags`: composite primary key `(track_id, emotion)`, tagged text column.
//!
//! A profile is stored column-wise, so what reads back is the normalized
//! label map: fields other than the 15 labels are dropped, and a label
//! that was missing or not a number comes back absent. Distributions that
//! already passed validation read back unchanged.
//!
//! Both tables carry a `created_at` RFC 3339 timestamp. Primary-key
//! violations on insert are reported as [`StorageError::KeyConflict`]; any
//! other SQLite failure as [`StorageError::Unavailable`].
//!
//! rusqlite is synchronous, so every call runs on tokio's blocking pool
//! and never stalls the async workers.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, params_from_iter};

use super::KeyValueStore;
use crate::types::{AnalysisKey, CacheEntry, Emotion, Operation, Payload};
use crate::{MuninnError, Result, StorageError};

/// Insert-only store over a single SQLite connection.
///
/// Profiles read back as their label columns only; see the module docs.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the tables exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(unavailable)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(&schema_sql()).map_err(unavailable)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StorageError::Unavailable("connection lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("storage task failed: {e}")))?
    }
}

fn schema_sql() -> String {
    let emotion_columns: Vec<String> = Emotion::ALL
        .iter()
        .map(|e| format!("    {} REAL,", e.as_str()))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS profiles (
    track_id TEXT PRIMARY KEY,
{}
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    track_id TEXT NOT NULL,
    emotion TEXT NOT NULL,
    tagged_lyrics TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (track_id, emotion)
);",
        emotion_columns.join("\n")
    )
}

fn unavailable(err: rusqlite::Error) -> MuninnError {
    StorageError::Unavailable(err.to_string()).into()
}

fn write_error(key: &AnalysisKey, err: rusqlite::Error) -> MuninnError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::KeyConflict(key.clone()).into()
        }
        other => unavailable(other),
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn select_profile(conn: &Connection, key: &AnalysisKey) -> Result<Option<CacheEntry>> {
    let columns: Vec<&str> = Emotion::ALL.iter().map(|e| e.as_str()).collect();
    let sql = format!(
        "SELECT {}, created_at FROM profiles WHERE track_id = ?1",
        columns.join(", ")
    );
    conn.query_row(&sql, params![key.track_id()], |row| {
        let mut values = serde_json::Map::new();
        for (i, emotion) in Emotion::ALL.iter().enumerate() {
            let value: Option<f64> = row.get(i)?;
            if let Some(value) = value {
                values.insert(emotion.as_str().to_string(), value.into());
            }
        }
        let created_at: String = row.get(Emotion::ALL.len())?;
        Ok(CacheEntry {
            key: key.clone(),
            payload: Payload::Structured(serde_json::Value::Object(values)),
            created_at: parse_timestamp(&created_at),
        })
    })
    .optional()
    .map_err(unavailable)
}

fn select_tags(conn: &Connection, key: &AnalysisKey) -> Result<Option<CacheEntry>> {
    conn.query_row(
        "SELECT tagged_lyrics, created_at FROM tags WHERE track_id = ?1 AND emotion = ?2",
        params![key.track_id(), key.discriminator()],
        |row| {
            let tagged: String = row.get(0)?;
            let created_at: String = row.get(1)?;
            Ok(CacheEntry {
                key: key.clone(),
                payload: Payload::Text(tagged),
                created_at: parse_timestamp(&created_at),
            })
        },
    )
    .optional()
    .map_err(unavailable)
}

fn insert_profile(conn: &Connection, entry: &CacheEntry) -> Result<()> {
    let object = entry
        .payload
        .as_structured()
        .and_then(|v| v.as_object())
        .ok_or_else(|| {
            MuninnError::Validation(format!("{} payload must be a JSON object", entry.key))
        })?;

    let columns: Vec<&str> = Emotion::ALL.iter().map(|e| e.as_str()).collect();
    let placeholders: Vec<String> = (1..=columns.len() + 2).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO profiles (track_id, {}, created_at) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );

    let mut values = Vec::with_capacity(columns.len() + 2);
    values.push(Value::Text(entry.key.track_id().to_string()));
    for emotion in Emotion::ALL {
        values.push(
            object
                .get(emotion.as_str())
                .and_then(|v| v.as_f64())
                .map(Value::Real)
                .unwrap_or(Value::Null),
        );
    }
    values.push(Value::Text(entry.created_at.to_rfc3339()));

    conn.execute(&sql, params_from_iter(values))
        .map(|_| ())
        .map_err(|e| write_error(&entry.key, e))
}

fn insert_tags(conn: &Connection, entry: &CacheEntry) -> Result<()> {
    let tagged = entry.payload.as_text().ok_or_else(|| {
        MuninnError::Validation(format!("{} payload must be text", entry.key))
    })?;
    conn.execute(
        "INSERT INTO tags (track_id, emotion, tagged_lyrics, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.key.track_id(),
            entry.key.discriminator(),
            tagged,
            entry.created_at.to_rfc3339()
        ],
    )
    .map(|_| ())
    .map_err(|e| write_error(&entry.key, e))
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &AnalysisKey) -> Result<Option<CacheEntry>> {
        let key = key.clone();
        self.with_conn(move |conn| match key.operation() {
            Operation::Profile => select_profile(conn, &key),
            Operation::Tags => select_tags(conn, &key),
        })
        .await
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let entry = entry.clone();
        self.with_conn(move |conn| match entry.key.operation() {
            Operation::Profile => insert_profile(conn, &entry),
            Operation::Tags => insert_tags(conn, &entry),
        })
        .await
    }
}
