//! Best-effort user-visible status log.
//!
//! Non-authoritative: the state machine never depends on this log, and a
//! failure to record is traced and dropped rather than propagated. The
//! terminal entries ("registered", "stopped") are what the user checks after
//! leaving the daemon unattended.

use rusqlite::params;
use serde::Serialize;
use uuid::Uuid;

use crate::storage::{Pool, StoreError};

#[derive(Clone)]
pub struct StatusLog {
    pool: Pool,
}

#[derive(Debug, Serialize)]
pub struct StatusEntry {
    pub course: String,
    pub run_id: Option<String>,
    pub state: String,
    pub message: String,
    pub created_at: String,
}

impl StatusLog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Record one line. Must never block or fail the state machine.
    pub fn record(&self, course: &str, run_id: Option<Uuid>, state: &str, message: &str) {
        tracing::info!(course = %course, state = %state, "{message}");
        if let Err(e) = self.try_record(course, run_id, state, message) {
            tracing::warn!(course = %course, error = %e, "status log write failed");
        }
    }

    fn try_record(
        &self,
        course: &str,
        run_id: Option<Uuid>,
        state: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO status_log (course, run_id, state, message) VALUES (?1, ?2, ?3, ?4)",
            params![course, run_id.map(|id| id.to_string()), state, message],
        )?;
        Ok(())
    }

    /// Most recent entries, newest first, optionally scoped to one course.
    pub fn recent(
        &self,
        course: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StatusEntry>, StoreError> {
        let conn = self.pool.get()?;
        let mut entries = Vec::new();

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<StatusEntry> {
            Ok(StatusEntry {
                course: row.get(0)?,
                run_id: row.get(1)?,
                state: row.get(2)?,
                message: row.get(3)?,
                created_at: row.get(4)?,
            })
        };

        match course {
            Some(course) => {
                let mut stmt = conn.prepare(
                    "SELECT course, run_id, state, message, created_at FROM status_log
                     WHERE course = ?1 ORDER BY id DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![course, limit], map_row)?;
                for r in rows {
                    entries.push(r?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT course, run_id, state, message, created_at FROM status_log
                     ORDER BY id DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], map_row)?;
                for r in rows {
                    entries.push(r?);
                }
            }
        }

        Ok(entries)
    }
}
