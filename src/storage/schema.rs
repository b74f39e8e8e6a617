//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS schedules (
            course TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            millis INTEGER,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS priority_lists (
            course TEXT NOT NULL,
            position INTEGER NOT NULL,
            session_id TEXT NOT NULL,
            PRIMARY KEY (course, position)
        );

        CREATE TABLE IF NOT EXISTS attempts (
            course TEXT PRIMARY KEY,
            count INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sessions (
            course TEXT NOT NULL,
            session_id TEXT NOT NULL,
            first_seen TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (course, session_id)
        );

        CREATE TABLE IF NOT EXISTS status_log (
            id INTEGER PRIMARY KEY,
            course TEXT NOT NULL,
            run_id TEXT,
            state TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_priority_lists_course ON priority_lists(course);
        CREATE INDEX IF NOT EXISTS idx_sessions_course ON sessions(course);
        CREATE INDEX IF NOT EXISTS idx_status_log_course ON status_log(course, created_at);",
    )?;

    Ok(())
}
