//! Table definitions and schema upgrades.
//!
//! The applied step count lives in `PRAGMA user_version`.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Number of migration steps
pub const SCHEMA_VERSION: i32 = 2;

/// Step `n` (1-based) upgrades a version `n - 1` database
const MIGRATIONS: &[&str] = &[
    // Version 1: companions, call history and conversation transcripts
    r#"
    -- ============================================
    -- Shared, read-mostly
    -- ============================================

    CREATE TABLE IF NOT EXISTS companions (
        id                        TEXT PRIMARY KEY,
        name                      TEXT NOT NULL,
        subject                   TEXT NOT NULL,
        topic                     TEXT NOT NULL,
        expected_duration_minutes INTEGER NOT NULL CHECK (expected_duration_minutes > 0),
        voice                     TEXT NOT NULL,
        style                     TEXT NOT NULL,
        author_id                 TEXT NOT NULL,
        created_at                DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_companions_author ON companions(author_id);
    CREATE INDEX IF NOT EXISTS idx_companions_subject ON companions(subject);

    -- ============================================
    -- Per-user records (immutable except deletion)
    -- ============================================

    CREATE TABLE IF NOT EXISTS session_history (
        id               TEXT PRIMARY KEY,
        companion_id     TEXT NOT NULL,
        user_id          TEXT NOT NULL,
        duration_seconds INTEGER,
        created_at       DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_session_history_user
        ON session_history(user_id, created_at DESC);

    -- No FK to companions: a deleted companion must not take history with it
    CREATE TABLE IF NOT EXISTS conversation_history (
        id               TEXT PRIMARY KEY,
        session_id       TEXT NOT NULL,
        companion_id     TEXT NOT NULL,
        user_id          TEXT NOT NULL,
        messages         JSON NOT NULL,
        duration_seconds INTEGER CHECK (duration_seconds IS NULL OR duration_seconds >= 0),
        created_at       DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_conversation_history_user
        ON conversation_history(user_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_conversation_history_companion
        ON conversation_history(user_id, companion_id);
    "#,
    // Version 2: derived snapshots and preferences
    r#"
    -- ============================================
    -- Derived (regenerable)
    -- ============================================

    CREATE TABLE IF NOT EXISTS monthly_reports (
        id                     TEXT PRIMARY KEY,
        user_id                TEXT NOT NULL,
        month                  INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
        year                   INTEGER NOT NULL,
        total_sessions         INTEGER NOT NULL,
        total_duration_seconds INTEGER NOT NULL,
        subjects_studied       JSON NOT NULL,   -- subject -> session count
        report_data            JSON NOT NULL,   -- full derived body
        content_hash           TEXT NOT NULL,
        created_at             DATETIME NOT NULL,
        updated_at             DATETIME NOT NULL,

        UNIQUE(user_id, month, year)
    );

    CREATE INDEX IF NOT EXISTS idx_monthly_reports_user
        ON monthly_reports(user_id, year DESC, month DESC);

    -- ============================================
    -- Preferences
    -- ============================================

    CREATE TABLE IF NOT EXISTS reminder_settings (
        user_id     TEXT PRIMARY KEY,
        enabled     INTEGER NOT NULL,
        time        TEXT NOT NULL,
        frequency   TEXT NOT NULL,
        custom_days JSON,
        updated_at  DATETIME NOT NULL
    );
    "#,
];

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// Each step runs in its own transaction together with its `user_version`
/// bump, so an interrupted run resumes at the first missing step. A database
/// written by a newer thuto is refused.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let from = get_schema_version(conn)?;
    if from > SCHEMA_VERSION {
        return Err(Error::Storage(format!(
            "database schema version {} is newer than supported version {}",
            from, SCHEMA_VERSION
        )));
    }

    let pending = MIGRATIONS.iter().zip(1..).skip(from.max(0) as usize);
    for (sql, version) in pending {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::info!(version, "Applied schema migration");
    }

    if from < SCHEMA_VERSION {
        tracing::info!(from, to = SCHEMA_VERSION, "Schema up to date");
    }
    Ok(())
}

/// Schema version recorded in the database (0 for a fresh file).
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |r| r.get(0))?)
}
