use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::debug;

use mobench_benchmark::{RunSink, RunStatus};
use mobench_core::MobenchError;

mod embedded {
    refinery::embed_migrations!("migrations");
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),
    #[error("Lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct StoredBenchmark {
    pub id: String,
    pub timestamp: i64,
    pub model: String,
    pub family: String,
    pub payload_json: String,
    pub status: String,
}

/// Local store for benchmark results and settings, one SQLite database
/// under the user data directory.
pub struct ResultStore {
    conn: Arc<Mutex<Connection>>,
}

impl ResultStore {
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = db_path.unwrap_or_else(default_db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(&path)?;
        embedded::migrations::runner().run(&mut conn)?;

        tracing::info!("result store initialized at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        embedded::migrations::runner().run(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;

        let result: std::result::Result<String, _> = conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        debug!("setting saved: {}", key);
        Ok(())
    }

    /// Stores one benchmark result, replacing any earlier row for the same
    /// family + model pair.
    pub fn record_run(
        &self,
        model: &str,
        family: &str,
        payload_json: &str,
        status: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;

        conn.execute(
            "DELETE FROM benchmark_history WHERE model = ?1 AND family = ?2",
            params![model, family],
        )?;
        conn.execute(
            "INSERT INTO benchmark_history (id, timestamp, model, family, payload_json, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uuid::Uuid::new_v4().to_string(),
                epoch_secs(),
                model,
                family,
                payload_json,
                status,
            ],
        )?;

        debug!(model, family, status, "benchmark result stored");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<StoredBenchmark>> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, model, family, payload_json, status
             FROM benchmark_history ORDER BY timestamp DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredBenchmark {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                model: row.get(2)?,
                family: row.get(3)?,
                payload_json: row.get(4)?,
                status: row.get(5)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

impl RunSink for ResultStore {
    fn record(
        &self,
        model: &str,
        family: &str,
        payload: &serde_json::Value,
        status: RunStatus,
    ) -> mobench_core::Result<()> {
        self.record_run(model, family, &payload.to_string(), status.as_str())
            .map_err(|e| MobenchError::Metrics(e.to_string()))
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mobench")
        .join("mobench.db")
}

fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
