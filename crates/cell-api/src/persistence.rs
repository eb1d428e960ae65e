//! SQLite-backed run store: planning inputs, outputs, and audit events
//! persisted as JSON blobs keyed by run id, for replay and inspection.

use std::fmt;
use std::path::Path;

use cell_core::planner::PlanEvent;
use contracts::snapshot::CellSnapshot;
use contracts::Millis;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    RunAlreadyExists(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::RunAlreadyExists(run_id) => write!(f, "run already exists: {run_id}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// One persisted planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRun {
    pub run_id: String,
    #[serde(with = "contracts::serde_iso8601_ms")]
    pub started_at: Millis,
    pub horizon_ms: Millis,
    pub input: CellSnapshot,
    pub output: CellSnapshot,
    pub events: Vec<PlanEvent>,
}

#[derive(Debug)]
pub struct SqliteRunStore {
    conn: Connection,
}

impl SqliteRunStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                started_at INTEGER NOT NULL,
                horizon_ms INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS run_snapshots (
                run_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (run_id, kind)
            );
            CREATE TABLE IF NOT EXISTS run_events (
                run_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (run_id, seq)
            );",
        )?;
        Ok(())
    }

    pub fn run_exists(&self, run_id: &str) -> Result<bool, PersistenceError> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT run_id FROM runs WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn persist_run(&mut self, run: &PersistedRun) -> Result<(), PersistenceError> {
        if self.run_exists(&run.run_id)? {
            return Err(PersistenceError::RunAlreadyExists(run.run_id.clone()));
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO runs (run_id, started_at, horizon_ms) VALUES (?1, ?2, ?3)",
            params![run.run_id, run.started_at, run.horizon_ms],
        )?;
        tx.execute(
            "INSERT INTO run_snapshots (run_id, kind, payload) VALUES (?1, 'input', ?2)",
            params![run.run_id, serde_json::to_string(&run.input)?],
        )?;
        tx.execute(
            "INSERT INTO run_snapshots (run_id, kind, payload) VALUES (?1, 'output', ?2)",
            params![run.run_id, serde_json::to_string(&run.output)?],
        )?;
        for (seq, event) in run.events.iter().enumerate() {
            tx.execute(
                "INSERT INTO run_events (run_id, seq, payload) VALUES (?1, ?2, ?3)",
                params![run.run_id, seq as i64, serde_json::to_string(event)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_run(&self, run_id: &str) -> Result<Option<PersistedRun>, PersistenceError> {
        let header: Option<(i64, i64)> = self
            .conn
            .query_row(
                "SELECT started_at, horizon_ms FROM runs WHERE run_id = ?1",
                params![run_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((started_at, horizon_ms)) = header else {
            return Ok(None);
        };

        let input = self.load_snapshot(run_id, "input")?;
        let output = self.load_snapshot(run_id, "output")?;

        let mut statement = self
            .conn
            .prepare("SELECT payload FROM run_events WHERE run_id = ?1 ORDER BY seq")?;
        let mut events = Vec::new();
        let rows = statement.query_map(params![run_id], |row| row.get::<_, String>(0))?;
        for payload in rows {
            events.push(serde_json::from_str(&payload?)?);
        }

        Ok(Some(PersistedRun {
            run_id: run_id.to_string(),
            started_at,
            horizon_ms,
            input,
            output,
            events,
        }))
    }

    fn load_snapshot(&self, run_id: &str, kind: &str) -> Result<CellSnapshot, PersistenceError> {
        let payload: String = self.conn.query_row(
            "SELECT payload FROM run_snapshots WHERE run_id = ?1 AND kind = ?2",
            params![run_id, kind],
            |row| row.get(0),
        )?;
        Ok(serde_json::from_str(&payload)?)
    }

    pub fn list_runs(&self) -> Result<Vec<String>, PersistenceError> {
        let mut statement = self
            .conn
            .prepare("SELECT run_id FROM runs ORDER BY run_id")?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        let mut run_ids = Vec::new();
        for run_id in rows {
            run_ids.push(run_id?);
        }
        Ok(run_ids)
    }

    pub fn delete_run(&mut self, run_id: &str) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM run_events WHERE run_id = ?1", params![run_id])?;
        tx.execute(
            "DELETE FROM run_snapshots WHERE run_id = ?1",
            params![run_id],
        )?;
        tx.execute("DELETE FROM runs WHERE run_id = ?1", params![run_id])?;
        tx.commit()?;
        Ok(())
    }
}
