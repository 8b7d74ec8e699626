//! SQLite-backed durable storage.
//!
//! One database may hold several experiments; every query is scoped by the
//! experiment id the backend was opened with. Requests carry an index on
//! `(experiment_id, created_at)`.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::core::errors::{AbError, Result};
use crate::ledger::records::{
    DuplicateOutcomePolicy, Outcome, OutcomeWrite, Request, RequestId, Variant,
};
use crate::ledger::storage::{StorageBackend, VariantOutcomes};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS requests (
    request_id    TEXT PRIMARY KEY,
    experiment_id TEXT NOT NULL,
    variant       TEXT NOT NULL CHECK (variant IN ('A', 'B')),
    input         TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_experiment_timestamp ON requests (experiment_id, created_at);
CREATE TABLE IF NOT EXISTS outcomes (
    request_id  TEXT PRIMARY KEY REFERENCES requests (request_id),
    value       REAL,
    recorded_at TEXT NOT NULL
);
";

/// Durable ledger storage for one experiment.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    experiment_id: String,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("experiment_id", &self.experiment_id)
            .finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Open (or create) a database file in WAL mode.
    pub fn open(path: &Path, experiment_id: impl Into<String>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        let storage = Self::init(conn, experiment_id.into())?;
        tracing::info!(
            path = %path.display(),
            experiment = %storage.experiment_id,
            "opened sqlite ledger"
        );
        Ok(storage)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory(experiment_id: impl Into<String>) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, experiment_id.into())
    }

    fn init(conn: Connection, experiment_id: String) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            experiment_id,
        })
    }

    /// Experiment this backend is scoped to.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| AbError::Serialization {
            context: "timestamp",
            details: format!("{raw:?}: {err}"),
        })
}

// SQLite stores NaN as NULL; map it back on read.
fn value_param(value: f64) -> Option<f64> {
    if value.is_nan() { None } else { Some(value) }
}

fn value_from_column(value: Option<f64>) -> f64 {
    value.unwrap_or(f64::NAN)
}

impl StorageBackend for SqliteStorage {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn save_request(&self, request: &Request) -> Result<()> {
        let input = serde_json::to_string(&request.input)?;
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO requests (request_id, experiment_id, variant, input, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                request.id.to_string(),
                self.experiment_id,
                request.variant.as_str(),
                input,
                format_ts(&request.created_at),
            ],
        )?;
        if inserted == 0 {
            return Err(AbError::DuplicateRequest {
                request_id: request.id,
            });
        }
        Ok(())
    }

    fn save_outcome(
        &self,
        outcome: &Outcome,
        policy: DuplicateOutcomePolicy,
    ) -> Result<OutcomeWrite> {
        let id = outcome.request_id.to_string();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM requests WHERE request_id = ?1 AND experiment_id = ?2)",
            params![id, self.experiment_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AbError::RequestNotFound {
                request_id: outcome.request_id,
            });
        }

        let previous: Option<Option<f64>> = tx
            .query_row(
                "SELECT value FROM outcomes WHERE request_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        let write = match (previous, policy) {
            (None, _) => {
                tx.execute(
                    "INSERT INTO outcomes (request_id, value, recorded_at) VALUES (?1, ?2, ?3)",
                    params![id, value_param(outcome.value), format_ts(&outcome.recorded_at)],
                )?;
                OutcomeWrite::Inserted
            }
            (Some(_), DuplicateOutcomePolicy::Reject) => {
                return Err(AbError::DuplicateOutcome {
                    request_id: outcome.request_id,
                });
            }
            (Some(previous), DuplicateOutcomePolicy::Overwrite) => {
                tx.execute(
                    "UPDATE outcomes SET value = ?2, recorded_at = ?3 WHERE request_id = ?1",
                    params![id, value_param(outcome.value), format_ts(&outcome.recorded_at)],
                )?;
                OutcomeWrite::Overwrote {
                    previous: value_from_column(previous),
                }
            }
        };
        tx.commit()?;
        Ok(write)
    }

    fn get_request(&self, request_id: RequestId) -> Result<Option<Request>> {
        let conn = self.conn.lock();
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT variant, input, created_at FROM requests
                 WHERE request_id = ?1 AND experiment_id = ?2",
                params![request_id.to_string(), self.experiment_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        drop(conn);

        let Some((variant, input, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(Request {
            id: request_id,
            experiment_id: self.experiment_id.clone(),
            variant: variant.parse()?,
            input: serde_json::from_str(&input)?,
            created_at: parse_ts(&created_at)?,
        }))
    }

    fn get_outcome(&self, request_id: RequestId) -> Result<Option<Outcome>> {
        let conn = self.conn.lock();
        let row: Option<(Option<f64>, String)> = conn
            .query_row(
                "SELECT o.value, o.recorded_at FROM outcomes o
                 JOIN requests r ON r.request_id = o.request_id
                 WHERE o.request_id = ?1 AND r.experiment_id = ?2",
                params![request_id.to_string(), self.experiment_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        drop(conn);

        row.map(|(value, recorded_at)| {
            Ok(Outcome {
                request_id,
                value: value_from_column(value),
                recorded_at: parse_ts(&recorded_at)?,
            })
        })
        .transpose()
    }

    fn get_all_outcomes(&self) -> Result<Vec<Outcome>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT o.request_id, o.value, o.recorded_at FROM outcomes o
             JOIN requests r ON r.request_id = o.request_id
             WHERE r.experiment_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![self.experiment_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, value, recorded_at)| {
                Ok(Outcome {
                    request_id: id.parse()?,
                    value: value_from_column(value),
                    recorded_at: parse_ts(&recorded_at)?,
                })
            })
            .collect()
    }

    fn get_outcomes_by_variant(&self, variant: Variant) -> Result<Vec<f64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT o.value FROM outcomes o
             JOIN requests r ON r.request_id = o.request_id
             WHERE r.experiment_id = ?1 AND r.variant = ?2",
        )?;
        let values = stmt
            .query_map(params![self.experiment_id, variant.as_str()], |row| {
                row.get::<_, Option<f64>>(0)
            })?
            .map(|value| value.map(value_from_column))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(values)
    }

    fn request_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM requests WHERE experiment_id = ?1",
            params![self.experiment_id],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|err| AbError::Sql {
            context: "request_count",
            details: err.to_string(),
        })
    }

    fn outcomes_partitioned(&self) -> Result<VariantOutcomes> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT r.variant, o.value FROM outcomes o
             JOIN requests r ON r.request_id = o.request_id
             WHERE r.experiment_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![self.experiment_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut split = VariantOutcomes::default();
        for (variant, value) in rows {
            match variant.parse::<Variant>()? {
                Variant::A => split.a.push(value_from_column(value)),
                Variant::B => split.b.push(value_from_column(value)),
            }
        }
        Ok(split)
    }
}
