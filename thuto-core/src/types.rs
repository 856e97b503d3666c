//! Core domain types for thuto
//!
//! These types are the records the learning pipeline reads and writes.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Companion** | A configured tutoring persona (subject, topic, voice, style, expected session length) |
//! | **Session** | One completed voice call with a companion |
//! | **Conversation** | The saved transcript and duration of a session |
//! | **Monthly report** | A rebuildable snapshot of one user's conversations in a calendar month |
//! | **Reminder settings** | A user's notification preference (time, frequency) |
//!
//! Per-user records are always scoped to their owner; companions are shared
//! and read-only from the pipeline's point of view.

use chrono::{DateTime, SubsecRound, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::analytics::ReportPeriod;

/// Anything with a creation instant, for day-bucketing.
pub trait Timestamped {
    fn created_at(&self) -> DateTime<Utc>;
}

impl<T: Timestamped> Timestamped for &T {
    fn created_at(&self) -> DateTime<Utc> {
        (*self).created_at()
    }
}

/// Current time truncated to whole seconds, the precision records are stored at.
pub fn now_secs() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

// ============================================
// Companions
// ============================================

/// Subjects a companion can teach
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Maths,
    Science,
    Language,
    History,
    Coding,
    Economics,
}

impl Subject {
    pub const ALL: [Subject; 6] = [
        Subject::Maths,
        Subject::Science,
        Subject::Language,
        Subject::History,
        Subject::Coding,
        Subject::Economics,
    ];

    /// Identifier used in storage and as the report map key
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Maths => "maths",
            Subject::Science => "science",
            Subject::Language => "language",
            Subject::History => "history",
            Subject::Coding => "coding",
            Subject::Economics => "economics",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Maths => "Maths",
            Subject::Science => "Science",
            Subject::Language => "Language",
            Subject::History => "History",
            Subject::Coding => "Coding",
            Subject::Economics => "Economics",
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maths" | "math" => Ok(Subject::Maths),
            "science" => Ok(Subject::Science),
            "language" => Ok(Subject::Language),
            "history" => Ok(Subject::History),
            "coding" => Ok(Subject::Coding),
            "economics" => Ok(Subject::Economics),
            _ => Err(format!("unknown subject: {}", s)),
        }
    }
}

/// Voice used by a companion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Voice {
    Male,
    Female,
}

impl Voice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Male => "male",
            Voice::Female => "female",
        }
    }
}

impl std::str::FromStr for Voice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Voice::Male),
            "female" => Ok(Voice::Female),
            _ => Err(format!("unknown voice: {}", s)),
        }
    }
}

/// Teaching style of a companion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeachingStyle {
    Casual,
    Formal,
}

impl TeachingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeachingStyle::Casual => "casual",
            TeachingStyle::Formal => "formal",
        }
    }
}

impl std::str::FromStr for TeachingStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "casual" => Ok(TeachingStyle::Casual),
            "formal" => Ok(TeachingStyle::Formal),
            _ => Err(format!("unknown teaching style: {}", s)),
        }
    }
}

/// A tutoring persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companion {
    pub id: String,
    pub name: String,
    pub subject: Subject,
    pub topic: String,
    /// Expected length of one session with this companion
    pub expected_duration_minutes: u32,
    pub voice: Voice,
    pub style: TeachingStyle,
    /// User who created the companion
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a companion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCompanion {
    pub name: String,
    pub subject: Subject,
    pub topic: String,
    pub expected_duration_minutes: u32,
    pub voice: Voice,
    pub style: TeachingStyle,
}

// ============================================
// Sessions and conversations
// ============================================

/// A completed voice call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub companion_id: String,
    pub user_id: String,
    pub duration_seconds: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Timestamped for SessionRecord {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Speaker of a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
}

/// One line of a conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: String,
}

/// A saved conversation with a companion.
///
/// Immutable once created; the only mutation is deletion by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub session_id: String,
    pub companion_id: String,
    pub user_id: String,
    /// Transcript in speaking order
    pub messages: Vec<TranscriptMessage>,
    /// Call length; missing counts as zero
    pub duration_seconds: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// Duration with missing treated as zero
    pub fn duration_or_zero(&self) -> u64 {
        u64::from(self.duration_seconds.unwrap_or(0))
    }
}

impl Timestamped for ConversationRecord {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Input for saving a conversation at the end of a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversation {
    pub session_id: String,
    pub companion_id: String,
    pub messages: Vec<TranscriptMessage>,
    pub duration_seconds: Option<u32>,
}

/// A month's conversation joined with its companion.
///
/// Companion columns are `None` when the companion has been removed or its
/// subject is not one the pipeline recognises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationWithCompanion {
    pub conversation_id: String,
    pub companion_id: String,
    pub companion_name: Option<String>,
    pub subject: Option<Subject>,
    pub expected_duration_minutes: Option<u32>,
    pub duration_seconds: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Timestamped for ConversationWithCompanion {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ============================================
// Monthly reports
// ============================================

/// Per-subject totals within one monthly report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub sessions: u64,
    pub total_duration_seconds: u64,
    /// Sum of the companions' expected durations over these sessions
    pub expected_duration_seconds: u64,
    /// `round(total / expected * 100)`, or 100 when nothing was expected
    pub completion_percentage: u32,
    pub companion_names: BTreeSet<String>,
}

/// Derived body of a monthly report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportData {
    pub total_sessions: u64,
    pub total_duration_seconds: u64,
    pub average_duration_seconds: u64,
    /// Keyed by subject identifier
    pub subjects_studied: BTreeMap<String, SubjectSummary>,
    pub most_studied_subject: Option<String>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub companions_used: BTreeSet<String>,
}

/// Persisted monthly snapshot; at most one per (user, month, year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyReport {
    /// Stable across rebuilds of the same month
    pub id: String,
    pub user_id: String,
    pub month: u32,
    pub year: i32,
    pub data: ReportData,
    /// SHA-256 (hex) of the serialized `data`
    pub content_hash: String,
}

impl MonthlyReport {
    pub fn period(&self) -> ReportPeriod {
        ReportPeriod::from_parts(self.year, self.month)
    }
}

// ============================================
// Reminders
// ============================================

/// How often reminders fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderFrequency {
    Daily,
    Weekdays,
    Custom,
}

impl ReminderFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderFrequency::Daily => "daily",
            ReminderFrequency::Weekdays => "weekdays",
            ReminderFrequency::Custom => "custom",
        }
    }
}

impl std::str::FromStr for ReminderFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ReminderFrequency::Daily),
            "weekdays" => Ok(ReminderFrequency::Weekdays),
            "custom" => Ok(ReminderFrequency::Custom),
            _ => Err(format!("unknown reminder frequency: {}", s)),
        }
    }
}

/// A user's reminder preference. One row per user, last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSettings {
    pub enabled: bool,
    /// 24-hour "HH:MM"
    pub time: String,
    pub frequency: ReminderFrequency,
    /// Only meaningful for [`ReminderFrequency::Custom`]
    #[serde(default)]
    pub custom_days: Vec<Weekday>,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            time: "09:00".to_string(),
            frequency: ReminderFrequency::Daily,
            custom_days: Vec::new(),
        }
    }
}
