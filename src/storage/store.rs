//! Typed per-course configuration store with change notifications.
//!
//! Everything the user configures is keyed by course: the target schedule,
//! the ordered priority list, the attempt budget, plus the scraped session
//! inventory. Writers commit first and notify after, so a subscriber
//! re-reading on a notification always observes the durable value.

use rusqlite::params;
use tokio::sync::broadcast;

use super::{Pool, StoreError};
use crate::scheduler::target::TargetSchedule;

/// Attempt budget used when the user has not overridden it.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Which logical key changed for a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey {
    Schedule,
    PriorityList,
    Attempts,
    Sessions,
}

/// A committed change, fanned out to watch engines so they can re-arm.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub course: String,
    pub key: StoreKey,
}

#[derive(Clone)]
pub struct ConfigStore {
    pool: Pool,
    changes: broadcast::Sender<StoreChange>,
}

impl ConfigStore {
    pub fn new(pool: Pool) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self { pool, changes }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn notify(&self, course: &str, key: StoreKey) {
        // Nobody listening is fine (CLI one-shot commands).
        let _ = self.changes.send(StoreChange {
            course: course.to_string(),
            key,
        });
    }

    // -----------------------------------------------------------------
    // Schedule
    // -----------------------------------------------------------------

    pub fn schedule(&self, course: &str) -> Result<Option<TargetSchedule>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT date, time, millis FROM schedules WHERE course = ?1")?;
        let mut rows = stmt.query_map(params![course], |row| {
            Ok(TargetSchedule {
                date: row.get(0)?,
                time: row.get(1)?,
                millis: row.get::<_, Option<u32>>(2)?,
            })
        })?;
        rows.next().transpose().map_err(StoreError::from)
    }

    /// Save a schedule. Replacing the schedule zeroes the attempt counter:
    /// a new armed instant starts with a fresh budget.
    pub fn set_schedule(&self, course: &str, schedule: &TargetSchedule) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO schedules (course, date, time, millis, updated_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(course) DO UPDATE SET
                date = excluded.date,
                time = excluded.time,
                millis = excluded.millis,
                updated_at = excluded.updated_at",
            params![course, schedule.date, schedule.time, schedule.millis],
        )?;
        tx.execute(
            "INSERT INTO attempts (course, count, updated_at)
             VALUES (?1, 0, datetime('now'))
             ON CONFLICT(course) DO UPDATE SET
                count = 0,
                updated_at = excluded.updated_at",
            params![course],
        )?;
        tx.commit()?;
        self.notify(course, StoreKey::Schedule);
        Ok(())
    }

    pub fn clear_schedule(&self, course: &str) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let changed = conn.execute("DELETE FROM schedules WHERE course = ?1", params![course])?;
        if changed > 0 {
            self.notify(course, StoreKey::Schedule);
        }
        Ok(changed > 0)
    }

    // -----------------------------------------------------------------
    // Priority list
    // -----------------------------------------------------------------

    pub fn priority_list(&self, course: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT session_id FROM priority_lists WHERE course = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![course], |row| row.get::<_, String>(0))?;
        let mut list = Vec::new();
        for r in rows {
            list.push(r?);
        }
        Ok(list)
    }

    /// Replace the whole ordered list for a course.
    pub fn set_priority_list(&self, course: &str, list: &[String]) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM priority_lists WHERE course = ?1",
            params![course],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO priority_lists (course, position, session_id) VALUES (?1, ?2, ?3)",
            )?;
            // First occurrence wins; later duplicates are dropped.
            let mut inserted: Vec<&String> = Vec::new();
            for session_id in list {
                if inserted.contains(&session_id) {
                    continue;
                }
                stmt.execute(params![course, inserted.len() as i64, session_id])?;
                inserted.push(session_id);
            }
        }
        tx.commit()?;
        self.notify(course, StoreKey::PriorityList);
        Ok(())
    }

    pub fn priority_add(&self, course: &str, session_id: &str) -> Result<bool, StoreError> {
        let mut list = self.priority_list(course)?;
        if list.iter().any(|s| s == session_id) {
            return Ok(false);
        }
        list.push(session_id.to_string());
        self.set_priority_list(course, &list)?;
        Ok(true)
    }

    pub fn priority_remove(&self, course: &str, session_id: &str) -> Result<bool, StoreError> {
        let mut list = self.priority_list(course)?;
        let before = list.len();
        list.retain(|s| s != session_id);
        if list.len() == before {
            return Ok(false);
        }
        self.set_priority_list(course, &list)?;
        Ok(true)
    }

    /// Move an entry one rank up (towards position 0) or down.
    pub fn priority_shift(
        &self,
        course: &str,
        session_id: &str,
        up: bool,
    ) -> Result<bool, StoreError> {
        let mut list = self.priority_list(course)?;
        let Some(idx) = list.iter().position(|s| s == session_id) else {
            return Ok(false);
        };
        let swapped = if up && idx > 0 {
            list.swap(idx, idx - 1);
            true
        } else if !up && idx + 1 < list.len() {
            list.swap(idx, idx + 1);
            true
        } else {
            false
        };
        if swapped {
            self.set_priority_list(course, &list)?;
        }
        Ok(swapped)
    }

    // -----------------------------------------------------------------
    // Attempt budget
    // -----------------------------------------------------------------

    /// The effective budget for a course: the stored override, or the
    /// compiled-in default.
    pub fn max_attempts(&self, course: &str) -> Result<u32, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT max_attempts FROM attempts WHERE course = ?1")?;
        let mut rows = stmt.query_map(params![course], |row| row.get::<_, Option<u32>>(0))?;
        Ok(rows
            .next()
            .transpose()?
            .flatten()
            .unwrap_or(DEFAULT_MAX_ATTEMPTS))
    }

    pub fn set_max_attempts(&self, course: &str, max: u32) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO attempts (course, count, max_attempts, updated_at)
             VALUES (?1, 0, ?2, datetime('now'))
             ON CONFLICT(course) DO UPDATE SET
                max_attempts = excluded.max_attempts,
                updated_at = excluded.updated_at",
            params![course, max],
        )?;
        self.notify(course, StoreKey::Attempts);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Scraped session inventory
    // -----------------------------------------------------------------

    /// Merge session ids seen on the page. Returns how many were new.
    pub fn merge_sessions(&self, course: &str, ids: &[String]) -> Result<usize, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let mut added = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO sessions (course, session_id) VALUES (?1, ?2)",
            )?;
            for id in ids {
                added += stmt.execute(params![course, id])?;
            }
        }
        tx.commit()?;
        if added > 0 {
            self.notify(course, StoreKey::Sessions);
        }
        Ok(added)
    }

    pub fn sessions(&self, course: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT session_id FROM sessions WHERE course = ?1 ORDER BY first_seen ASC, session_id ASC",
        )?;
        let rows = stmt.query_map(params![course], |row| row.get::<_, String>(0))?;
        let mut list = Vec::new();
        for r in rows {
            list.push(r?);
        }
        Ok(list)
    }

    /// All course keys that appear anywhere in storage.
    pub fn courses(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT course FROM schedules
             UNION SELECT course FROM priority_lists
             UNION SELECT course FROM sessions
             ORDER BY course ASC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut list = Vec::new();
        for r in rows {
            list.push(r?);
        }
        Ok(list)
    }
}
