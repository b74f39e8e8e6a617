//! Persisted attempt counter for the armed schedule of one course.
//!
//! The counter must survive the full page reload that ends every failed
//! cycle, which is why it lives in SQLite instead of memory. The reload is
//! the system's continuation mechanism; this counter is the only state that
//! crosses it.

use rusqlite::params;

use super::{Pool, StoreError};

pub struct AttemptLedger {
    pool: Pool,
    course: String,
}

impl AttemptLedger {
    pub fn new(pool: Pool, course: impl Into<String>) -> Self {
        Self {
            pool,
            course: course.into(),
        }
    }

    /// Completed failed cycles for the current schedule. Zero when no row
    /// exists yet.
    pub fn get(&self) -> Result<u32, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT count FROM attempts WHERE course = ?1")?;
        let mut rows = stmt.query_map(params![self.course], |row| row.get::<_, u32>(0))?;
        Ok(rows.next().transpose()?.unwrap_or(0))
    }

    /// Record one more failed cycle; returns the new count after the write
    /// is durable.
    pub fn increment(&self) -> Result<u32, StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO attempts (course, count, updated_at)
             VALUES (?1, 1, datetime('now'))
             ON CONFLICT(course) DO UPDATE SET
                count = count + 1,
                updated_at = excluded.updated_at",
            params![self.course],
        )?;
        self.get()
    }

    /// Invoked when the owning schedule changes.
    pub fn reset(&self) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE attempts SET count = 0, updated_at = datetime('now') WHERE course = ?1",
            params![self.course],
        )?;
        Ok(())
    }

    /// The stored per-course budget, when the user has set one. Callers fall
    /// back to their configured default otherwise.
    pub fn max_attempts_override(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT max_attempts FROM attempts WHERE course = ?1")?;
        let mut rows = stmt.query_map(params![self.course], |row| row.get::<_, Option<u32>>(0))?;
        Ok(rows.next().transpose()?.flatten())
    }
}
