//! Database repository layer
//!
//! SQLite implementation of [`RecordStore`].

use crate::analytics::ReportPeriod;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc, Weekday};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{CompanionFilter, ConversationFilter, RecordStore};

/// Database handle (single connection behind a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

/// Storage form of a timestamp: RFC 3339, UTC, whole seconds.
///
/// Fixed width, so string comparison in SQL is chronological.
pub(crate) fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_error(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, message.into())
}

fn parse_ts(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn parse_enum<T: std::str::FromStr<Err = String>>(value: &str) -> rusqlite::Result<T> {
    value.parse().map_err(conversion_error)
}

/// Escape LIKE wildcards in user-supplied patterns.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;  -- 16MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.connection()?;
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("database connection lock poisoned".to_string()))
    }

    fn row_to_companion(row: &Row) -> rusqlite::Result<Companion> {
        let subject: String = row.get("subject")?;
        let voice: String = row.get("voice")?;
        let style: String = row.get("style")?;
        let created_at: String = row.get("created_at")?;

        Ok(Companion {
            id: row.get("id")?,
            name: row.get("name")?,
            subject: parse_enum(&subject)?,
            topic: row.get("topic")?,
            expected_duration_minutes: row.get("expected_duration_minutes")?,
            voice: parse_enum(&voice)?,
            style: parse_enum(&style)?,
            author_id: row.get("author_id")?,
            created_at: parse_ts(&created_at)?,
        })
    }

    fn row_to_session(row: &Row) -> rusqlite::Result<SessionRecord> {
        let created_at: String = row.get("created_at")?;
        Ok(SessionRecord {
            id: row.get("id")?,
            companion_id: row.get("companion_id")?,
            user_id: row.get("user_id")?,
            duration_seconds: row.get("duration_seconds")?,
            created_at: parse_ts(&created_at)?,
        })
    }

    fn row_to_conversation(row: &Row) -> rusqlite::Result<ConversationRecord> {
        let messages: String = row.get("messages")?;
        let created_at: String = row.get("created_at")?;
        Ok(ConversationRecord {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            companion_id: row.get("companion_id")?,
            user_id: row.get("user_id")?,
            messages: parse_json(&messages)?,
            duration_seconds: row.get("duration_seconds")?,
            created_at: parse_ts(&created_at)?,
        })
    }

    fn row_to_joined(row: &Row) -> rusqlite::Result<ConversationWithCompanion> {
        let subject: Option<String> = row.get("subject")?;
        let created_at: String = row.get("created_at")?;
        Ok(ConversationWithCompanion {
            conversation_id: row.get("id")?,
            companion_id: row.get("companion_id")?,
            companion_name: row.get("name")?,
            // Unrecognised subjects are not attributed
            subject: subject.and_then(|s| s.parse().ok()),
            expected_duration_minutes: row.get("expected_duration_minutes")?,
            duration_seconds: row.get("duration_seconds")?,
            created_at: parse_ts(&created_at)?,
        })
    }

    fn decode_report(
        id: String,
        user_id: String,
        month: u32,
        year: i32,
        report_data: &str,
        content_hash: String,
    ) -> Result<MonthlyReport> {
        ReportPeriod::new(year, month)?;
        let data: ReportData = serde_json::from_str(report_data)?;
        Ok(MonthlyReport {
            id,
            user_id,
            month,
            year,
            data,
            content_hash,
        })
    }
}

type RawReportRow = (String, String, u32, i32, String, String);

fn raw_report_row(row: &Row) -> rusqlite::Result<RawReportRow> {
    Ok((
        row.get("id")?,
        row.get("user_id")?,
        row.get("month")?,
        row.get("year")?,
        row.get("report_data")?,
        row.get("content_hash")?,
    ))
}

impl RecordStore for Database {
    // ============================================
    // Companion operations
    // ============================================

    fn insert_companion(&self, companion: &Companion) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            r#"
            INSERT INTO companions (id, name, subject, topic, expected_duration_minutes,
                                    voice, style, author_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                companion.id,
                companion.name,
                companion.subject.as_str(),
                companion.topic,
                companion.expected_duration_minutes,
                companion.voice.as_str(),
                companion.style.as_str(),
                companion.author_id,
                ts_to_sql(&companion.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_companion(&self, id: &str) -> Result<Option<Companion>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT * FROM companions WHERE id = ?",
            [id],
            Self::row_to_companion,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_companions(&self, filter: &CompanionFilter) -> Result<Vec<Companion>> {
        let conn = self.connection()?;

        let mut sql = String::from("SELECT * FROM companions WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(subject) = &filter.subject {
            sql.push_str(" AND subject LIKE ? ESCAPE '\\'");
            params.push(Box::new(like_pattern(subject)));
        }

        if let Some(topic) = &filter.topic {
            sql.push_str(" AND (topic LIKE ? ESCAPE '\\' OR name LIKE ? ESCAPE '\\')");
            params.push(Box::new(like_pattern(topic)));
            params.push(Box::new(like_pattern(topic)));
        }

        if let Some(author_id) = &filter.author_id {
            sql.push_str(" AND author_id = ?");
            params.push(Box::new(author_id.clone()));
        }

        let limit = filter.limit.max(1);
        let offset = filter.page.saturating_sub(1) * limit;
        sql.push_str(&format!(
            " ORDER BY created_at ASC, id ASC LIMIT {} OFFSET {}",
            limit, offset
        ));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let companions = stmt
            .query_map(params_refs.as_slice(), Self::row_to_companion)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(companions)
    }

    fn count_companions_by_author(&self, author_id: &str) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM companions WHERE author_id = ?",
            [author_id],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    // ============================================
    // Session history operations
    // ============================================

    fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            r#"
            INSERT INTO session_history (id, companion_id, user_id, duration_seconds, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                session.id,
                session.companion_id,
                session.user_id,
                session.duration_seconds,
                ts_to_sql(&session.created_at),
            ],
        )?;
        Ok(())
    }

    fn list_sessions(&self, user_id: &str, limit: usize) -> Result<Vec<SessionRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM session_history
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )?;
        let sessions = stmt
            .query_map(params![user_id, limit as i64], Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    // ============================================
    // Conversation operations
    // ============================================

    fn insert_conversation(&self, conversation: &ConversationRecord) -> Result<()> {
        let messages = serde_json::to_string(&conversation.messages)?;
        let conn = self.connection()?;
        conn.execute(
            r#"
            INSERT INTO conversation_history (id, session_id, companion_id, user_id,
                                              messages, duration_seconds, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                conversation.id,
                conversation.session_id,
                conversation.companion_id,
                conversation.user_id,
                messages,
                conversation.duration_seconds,
                ts_to_sql(&conversation.created_at),
            ],
        )?;
        Ok(())
    }

    fn list_conversations(&self, filter: &ConversationFilter) -> Result<Vec<ConversationRecord>> {
        let conn = self.connection()?;

        let mut sql = String::from("SELECT * FROM conversation_history WHERE user_id = ?");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(filter.user_id.clone())];

        if let Some(companion_id) = &filter.companion_id {
            sql.push_str(" AND companion_id = ?");
            params.push(Box::new(companion_id.clone()));
        }

        if let Some(since) = &filter.since {
            sql.push_str(" AND created_at >= ?");
            params.push(Box::new(ts_to_sql(since)));
        }

        if let Some(until) = &filter.until {
            sql.push_str(" AND created_at <= ?");
            params.push(Box::new(ts_to_sql(until)));
        }

        let order = filter.order.as_sql();
        sql.push_str(&format!(" ORDER BY created_at {}, id {}", order, order));

        match filter.limit {
            Some(limit) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, filter.offset)),
            None if filter.offset > 0 => {
                sql.push_str(&format!(" LIMIT -1 OFFSET {}", filter.offset))
            }
            None => {}
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let conversations = stmt
            .query_map(params_refs.as_slice(), Self::row_to_conversation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(
            user_id = %filter.user_id,
            rows = conversations.len(),
            "Listed conversations"
        );

        Ok(conversations)
    }

    fn get_conversation(&self, user_id: &str, id: &str) -> Result<Option<ConversationRecord>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT * FROM conversation_history WHERE id = ?1 AND user_id = ?2",
            [id, user_id],
            Self::row_to_conversation,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_conversation(&self, user_id: &str, id: &str) -> Result<bool> {
        let conn = self.connection()?;
        let removed = conn.execute(
            "DELETE FROM conversation_history WHERE id = ?1 AND user_id = ?2",
            [id, user_id],
        )?;
        Ok(removed > 0)
    }

    fn conversations_with_companions(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ConversationWithCompanion>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                c.id,
                c.companion_id,
                c.duration_seconds,
                c.created_at,
                p.name,
                p.subject,
                p.expected_duration_minutes
            FROM conversation_history c
            LEFT JOIN companions p ON p.id = c.companion_id
            WHERE c.user_id = ?1
              AND c.created_at >= ?2
              AND c.created_at <= ?3
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                params![user_id, ts_to_sql(&start), ts_to_sql(&end)],
                Self::row_to_joined,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(user_id, rows = rows.len(), "Loaded month conversations");
        Ok(rows)
    }

    // ============================================
    // Monthly report operations
    // ============================================

    // An unchanged rebuild leaves the row untouched, `updated_at` included
    fn upsert_monthly_report(&self, report: &MonthlyReport) -> Result<()> {
        let subjects: BTreeMap<&str, u64> = report
            .data
            .subjects_studied
            .iter()
            .map(|(subject, summary)| (subject.as_str(), summary.sessions))
            .collect();
        let subjects_json = serde_json::to_string(&subjects)?;
        let data_json = serde_json::to_string(&report.data)?;
        let now = ts_to_sql(&now_secs());

        let conn = self.connection()?;
        conn.execute(
            r#"
            INSERT INTO monthly_reports (id, user_id, month, year, total_sessions,
                                         total_duration_seconds, subjects_studied, report_data,
                                         content_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            ON CONFLICT(user_id, month, year) DO UPDATE SET
                total_sessions = excluded.total_sessions,
                total_duration_seconds = excluded.total_duration_seconds,
                subjects_studied = excluded.subjects_studied,
                report_data = excluded.report_data,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at
            WHERE monthly_reports.content_hash != excluded.content_hash
               OR monthly_reports.report_data != excluded.report_data
            "#,
            params![
                report.id,
                report.user_id,
                report.month,
                report.year,
                report.data.total_sessions as i64,
                report.data.total_duration_seconds as i64,
                subjects_json,
                data_json,
                report.content_hash,
                now,
            ],
        )?;
        Ok(())
    }

    fn get_monthly_report(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlyReport>> {
        let conn = self.connection()?;
        let raw = conn
            .query_row(
                "SELECT * FROM monthly_reports WHERE user_id = ?1 AND year = ?2 AND month = ?3",
                params![user_id, year, month],
                raw_report_row,
            )
            .optional()?;

        match raw {
            Some((id, user_id, month, year, data, hash)) => {
                Self::decode_report(id, user_id, month, year, &data, hash).map(Some)
            }
            None => Ok(None),
        }
    }

    fn list_monthly_reports(&self, user_id: &str) -> Result<Vec<MonthlyReport>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM monthly_reports
            WHERE user_id = ?1
            ORDER BY year DESC, month DESC
            "#,
        )?;
        let rows = stmt
            .query_map([user_id], raw_report_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut reports = Vec::with_capacity(rows.len());
        for (id, user_id, month, year, data, hash) in rows {
            match Self::decode_report(id, user_id, month, year, &data, hash) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    // A damaged snapshot carries no signal; it is rebuilt on the next build
                    tracing::warn!(year, month, error = %e, "Skipping unreadable monthly report");
                }
            }
        }
        Ok(reports)
    }

    // ============================================
    // Reminder settings operations
    // ============================================

    fn upsert_reminder_settings(&self, user_id: &str, settings: &ReminderSettings) -> Result<()> {
        let custom_days = serde_json::to_string(&settings.custom_days)?;
        let conn = self.connection()?;
        conn.execute(
            r#"
            INSERT INTO reminder_settings (user_id, enabled, time, frequency, custom_days, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id) DO UPDATE SET
                enabled = excluded.enabled,
                time = excluded.time,
                frequency = excluded.frequency,
                custom_days = excluded.custom_days,
                updated_at = excluded.updated_at
            "#,
            params![
                user_id,
                settings.enabled,
                settings.time,
                settings.frequency.as_str(),
                custom_days,
                ts_to_sql(&now_secs()),
            ],
        )?;
        Ok(())
    }

    fn get_reminder_settings(&self, user_id: &str) -> Result<Option<ReminderSettings>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT * FROM reminder_settings WHERE user_id = ?",
            [user_id],
            |row| {
                let frequency: String = row.get("frequency")?;
                let custom_days: Option<String> = row.get("custom_days")?;
                let custom_days: Vec<Weekday> = match custom_days {
                    Some(json) => parse_json(&json)?,
                    None => Vec::new(),
                };
                Ok(ReminderSettings {
                    enabled: row.get("enabled")?,
                    time: row.get("time")?,
                    frequency: parse_enum(&frequency)?,
                    custom_days,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SortOrder;
    use chrono::TimeZone;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn create_test_companion(id: &str, subject: Subject, name: &str) -> Companion {
        Companion {
            id: id.to_string(),
            name: name.to_string(),
            subject,
            topic: "Derivatives & Integrals".to_string(),
            expected_duration_minutes: 30,
            voice: Voice::Female,
            style: TeachingStyle::Casual,
            author_id: "author-1".to_string(),
            created_at: at(1, 8),
        }
    }

    fn create_test_conversation(id: &str, user: &str, created_at: DateTime<Utc>) -> ConversationRecord {
        ConversationRecord {
            id: id.to_string(),
            session_id: format!("{}-session", id),
            companion_id: "comp-1".to_string(),
            user_id: user.to_string(),
            messages: vec![
                TranscriptMessage {
                    role: Role::Assistant,
                    content: "Hello! Ready to learn?".to_string(),
                },
                TranscriptMessage {
                    role: Role::User,
                    content: "Yes".to_string(),
                },
            ],
            duration_seconds: Some(600),
            created_at,
        }
    }

    #[test]
    fn test_companion_crud_and_filters() {
        let db = test_db();
        db.insert_companion(&create_test_companion("comp-1", Subject::Maths, "Neura"))
            .unwrap();
        db.insert_companion(&create_test_companion("comp-2", Subject::Science, "Countsy"))
            .unwrap();
        db.insert_companion(&create_test_companion("comp-3", Subject::Maths, "Algebrina"))
            .unwrap();

        let companion = db.get_companion("comp-1").unwrap().unwrap();
        assert_eq!(companion.name, "Neura");
        assert_eq!(companion.subject, Subject::Maths);
        assert!(db.get_companion("missing").unwrap().is_none());

        let maths = db
            .list_companions(&CompanionFilter {
                subject: Some("MATH".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(maths.len(), 2);

        let by_name = db
            .list_companions(&CompanionFilter {
                topic: Some("countsy".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "comp-2");

        let page_two = db
            .list_companions(&CompanionFilter {
                page: 2,
                limit: 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].id, "comp-3");

        assert_eq!(db.count_companions_by_author("author-1").unwrap(), 3);
        assert_eq!(db.count_companions_by_author("nobody").unwrap(), 0);
    }

    #[test]
    fn test_like_wildcards_are_literal() {
        let db = test_db();
        db.insert_companion(&create_test_companion("comp-1", Subject::Maths, "Neura"))
            .unwrap();

        let result = db
            .list_companions(&CompanionFilter {
                topic: Some("%".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_conversation_insert_and_filters() {
        let db = test_db();
        db.insert_conversation(&create_test_conversation("c1", "u1", at(1, 9)))
            .unwrap();
        db.insert_conversation(&create_test_conversation("c2", "u1", at(2, 9)))
            .unwrap();
        db.insert_conversation(&create_test_conversation("c3", "u1", at(3, 9)))
            .unwrap();
        db.insert_conversation(&create_test_conversation("other", "u2", at(2, 9)))
            .unwrap();

        let all = db
            .list_conversations(&ConversationFilter::for_user("u1"))
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, "c3");
        assert_eq!(all[0].messages.len(), 2);

        let oldest_first = db
            .list_conversations(&ConversationFilter::for_user("u1").order(SortOrder::Ascending))
            .unwrap();
        assert_eq!(oldest_first[0].id, "c1");

        let ranged = db
            .list_conversations(
                &ConversationFilter::for_user("u1")
                    .since(at(2, 9))
                    .until(at(2, 9)),
            )
            .unwrap();
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].id, "c2");

        let second_page = db
            .list_conversations(&ConversationFilter::for_user("u1").page(2, 2))
            .unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].id, "c1");
    }

    #[test]
    fn test_conversation_access_is_owner_scoped() {
        let db = test_db();
        db.insert_conversation(&create_test_conversation("c1", "u1", at(1, 9)))
            .unwrap();

        assert!(db.get_conversation("u2", "c1").unwrap().is_none());
        assert!(!db.delete_conversation("u2", "c1").unwrap());
        assert!(db.get_conversation("u1", "c1").unwrap().is_some());

        assert!(db.delete_conversation("u1", "c1").unwrap());
        assert!(db.get_conversation("u1", "c1").unwrap().is_none());
    }

    #[test]
    fn test_join_tolerates_missing_companion() {
        let db = test_db();
        db.insert_companion(&create_test_companion("comp-1", Subject::Maths, "Neura"))
            .unwrap();
        db.insert_conversation(&create_test_conversation("c1", "u1", at(5, 9)))
            .unwrap();
        let mut orphan = create_test_conversation("c2", "u1", at(6, 9));
        orphan.companion_id = "deleted".to_string();
        db.insert_conversation(&orphan).unwrap();

        let rows = db
            .conversations_with_companions("u1", at(1, 0), at(31, 23))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].subject, Some(Subject::Maths));
        assert_eq!(rows[0].expected_duration_minutes, Some(30));
        assert_eq!(rows[1].subject, None);
        assert_eq!(rows[1].companion_name, None);
    }

    #[test]
    fn test_monthly_report_upsert_replaces() {
        let db = test_db();
        let mut report = MonthlyReport {
            id: "report-1".to_string(),
            user_id: "u1".to_string(),
            month: 3,
            year: 2024,
            data: ReportData {
                total_sessions: 1,
                ..Default::default()
            },
            content_hash: "a".to_string(),
        };
        db.upsert_monthly_report(&report).unwrap();

        report.data.total_sessions = 4;
        report.content_hash = "b".to_string();
        db.upsert_monthly_report(&report).unwrap();

        let reports = db.list_monthly_reports("u1").unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].data.total_sessions, 4);
        assert_eq!(reports[0].content_hash, "b");

        let fetched = db.get_monthly_report("u1", 2024, 3).unwrap().unwrap();
        assert_eq!(fetched, report);
        assert!(db.get_monthly_report("u1", 2024, 4).unwrap().is_none());
    }

    #[test]
    fn test_monthly_reports_ordered_newest_first() {
        let db = test_db();
        for (year, month) in [(2023, 12), (2024, 2), (2024, 1)] {
            db.upsert_monthly_report(&MonthlyReport {
                id: format!("{}-{}", year, month),
                user_id: "u1".to_string(),
                month,
                year,
                data: ReportData::default(),
                content_hash: String::new(),
            })
            .unwrap();
        }

        let keys: Vec<(i32, u32)> = db
            .list_monthly_reports("u1")
            .unwrap()
            .iter()
            .map(|r| (r.year, r.month))
            .collect();
        assert_eq!(keys, vec![(2024, 2), (2024, 1), (2023, 12)]);
    }

    #[test]
    fn test_unreadable_report_is_skipped() {
        let db = test_db();
        db.upsert_monthly_report(&MonthlyReport {
            id: "good".to_string(),
            user_id: "u1".to_string(),
            month: 1,
            year: 2024,
            data: ReportData::default(),
            content_hash: String::new(),
        })
        .unwrap();
        db.connection()
            .unwrap()
            .execute(
                r#"
                INSERT INTO monthly_reports (id, user_id, month, year, total_sessions,
                    total_duration_seconds, subjects_studied, report_data, content_hash,
                    created_at, updated_at)
                VALUES ('bad', 'u1', 2, 2024, 0, 0, '{}', 'not json', '',
                    '2024-02-01T00:00:00Z', '2024-02-01T00:00:00Z')
                "#,
                [],
            )
            .unwrap();

        let reports = db.list_monthly_reports("u1").unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, "good");
    }

    #[test]
    fn test_report_with_unsupported_year_is_skipped() {
        let db = test_db();
        db.connection()
            .unwrap()
            .execute(
                r#"
                INSERT INTO monthly_reports (id, user_id, month, year, total_sessions,
                    total_duration_seconds, subjects_studied, report_data, content_hash,
                    created_at, updated_at)
                VALUES ('far', 'u1', 1, 10000, 0, 0, '{}', ?1, '',
                    '2024-02-01T00:00:00Z', '2024-02-01T00:00:00Z')
                "#,
                [serde_json::to_string(&ReportData::default()).unwrap()],
            )
            .unwrap();

        assert!(db.list_monthly_reports("u1").unwrap().is_empty());
        assert!(matches!(
            db.get_monthly_report("u1", 10000, 1),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_reminder_settings_last_write_wins() {
        let db = test_db();
        assert!(db.get_reminder_settings("u1").unwrap().is_none());

        let mut settings = ReminderSettings {
            enabled: true,
            time: "07:30".to_string(),
            frequency: ReminderFrequency::Custom,
            custom_days: vec![Weekday::Mon, Weekday::Thu],
        };
        db.upsert_reminder_settings("u1", &settings).unwrap();

        settings.enabled = false;
        settings.frequency = ReminderFrequency::Weekdays;
        settings.custom_days.clear();
        db.upsert_reminder_settings("u1", &settings).unwrap();

        let stored = db.get_reminder_settings("u1").unwrap().unwrap();
        assert_eq!(stored, settings);

        let count: i64 = db
            .connection()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM reminder_settings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_timestamps_stored_at_second_precision() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(ts_to_sql(&ts), "2024-03-01T00:00:00Z");
    }

    #[test]
    fn test_sessions_newest_first() {
        let db = test_db();
        for (id, day) in [("s1", 1), ("s2", 3), ("s3", 2)] {
            db.insert_session(&SessionRecord {
                id: id.to_string(),
                companion_id: "comp-1".to_string(),
                user_id: "u1".to_string(),
                duration_seconds: None,
                created_at: at(day, 9),
            })
            .unwrap();
        }

        let ids: Vec<String> = db
            .list_sessions("u1", 2)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s2", "s3"]);
    }
}
