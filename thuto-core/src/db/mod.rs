//! Database layer for thuto
//!
//! This module provides the storage layer:
//! - [`RecordStore`], the query capability the pipeline is written against
//! - [`Database`], its SQLite implementation
//! - Schema migrations
//!
//! Every write is a single statement. Nothing here opens a multi-statement
//! transaction; report builds rely on upsert idempotence instead.

pub mod repo;
pub mod schema;

pub use repo::Database;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    Companion, ConversationRecord, ConversationWithCompanion, MonthlyReport, ReminderSettings,
    SessionRecord,
};

/// Result ordering on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Filter for conversation queries. Always scoped to one user.
#[derive(Debug, Clone)]
pub struct ConversationFilter {
    pub user_id: String,
    pub companion_id: Option<String>,
    /// Inclusive lower bound on `created_at`
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub until: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ConversationFilter {
    /// All of a user's conversations, newest first.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            companion_id: None,
            since: None,
            until: None,
            order: SortOrder::Descending,
            limit: None,
            offset: 0,
        }
    }

    /// Range pagination: rows `[(page-1)*limit, page*limit-1]`. Page 0 is treated as 1.
    pub fn page(mut self, page: usize, limit: usize) -> Self {
        self.offset = page.saturating_sub(1) * limit;
        self.limit = Some(limit);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn companion(mut self, companion_id: impl Into<String>) -> Self {
        self.companion_id = Some(companion_id.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }
}

/// Filter for the shared companion catalogue.
#[derive(Debug, Clone)]
pub struct CompanionFilter {
    /// Case-insensitive substring match on subject
    pub subject: Option<String>,
    /// Case-insensitive substring match on topic or name
    pub topic: Option<String>,
    pub author_id: Option<String>,
    /// 1-based
    pub page: usize,
    pub limit: usize,
}

impl Default for CompanionFilter {
    fn default() -> Self {
        Self {
            subject: None,
            topic: None,
            author_id: None,
            page: 1,
            limit: 10,
        }
    }
}

/// The record store the pipeline reads from and writes to.
///
/// All per-user queries take the owning user id; there are no cross-user
/// reads. Errors surface as [`crate::Error::Storage`] carrying the store's
/// message.
pub trait RecordStore: Send + Sync {
    // Companions
    fn insert_companion(&self, companion: &Companion) -> Result<()>;
    fn get_companion(&self, id: &str) -> Result<Option<Companion>>;
    fn list_companions(&self, filter: &CompanionFilter) -> Result<Vec<Companion>>;
    fn count_companions_by_author(&self, author_id: &str) -> Result<usize>;

    // Session history
    fn insert_session(&self, session: &SessionRecord) -> Result<()>;
    /// Newest first
    fn list_sessions(&self, user_id: &str, limit: usize) -> Result<Vec<SessionRecord>>;

    // Conversations
    fn insert_conversation(&self, conversation: &ConversationRecord) -> Result<()>;
    fn list_conversations(&self, filter: &ConversationFilter) -> Result<Vec<ConversationRecord>>;
    fn get_conversation(&self, user_id: &str, id: &str) -> Result<Option<ConversationRecord>>;
    /// Returns whether a row was removed
    fn delete_conversation(&self, user_id: &str, id: &str) -> Result<bool>;
    /// Conversations created in `[start, end]` joined with their companion,
    /// oldest first with ties broken by id.
    fn conversations_with_companions(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ConversationWithCompanion>>;

    // Monthly reports
    /// Insert, or fully replace the snapshot for the same (user, month, year)
    fn upsert_monthly_report(&self, report: &MonthlyReport) -> Result<()>;
    fn get_monthly_report(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlyReport>>;
    /// Ordered by year desc, month desc
    fn list_monthly_reports(&self, user_id: &str) -> Result<Vec<MonthlyReport>>;

    // Reminder settings
    fn upsert_reminder_settings(&self, user_id: &str, settings: &ReminderSettings) -> Result<()>;
    fn get_reminder_settings(&self, user_id: &str) -> Result<Option<ReminderSettings>>;
}
