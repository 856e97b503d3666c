//! Performance dashboard composition.
//!
//! Gathers live stats, stored reports and reminder settings into a single
//! view for the Pro dashboard.

use chrono::{NaiveDate, TimeZone};
use serde::Serialize;

use super::insights::{generate_insights, Insights};
use super::performance::{
    monthly_progress, subject_minutes, subject_performance, weekly_activity, DayActivity,
    MonthlyProgress, SubjectMinutes, SubjectPerformance,
};
use super::stats::{compute_stats, ConversationStats};
use super::streak::compute_streak;
use crate::config::AnalyticsConfig;
use crate::db::{ConversationFilter, RecordStore};
use crate::entitlement::{Capability, RequestContext};
use crate::error::Result;
use crate::types::{ConversationRecord, MonthlyReport, ReminderSettings};

/// Everything the dashboard shows.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    // Key metrics
    pub stats: ConversationStats,
    /// One decimal
    pub total_hours: f64,
    pub average_session_minutes: u64,
    pub learning_streak: u32,

    // History
    /// Newest first
    pub recent_conversations: Vec<ConversationRecord>,
    /// Newest first
    pub reports: Vec<MonthlyReport>,

    // Charts
    pub subject_performance: Vec<SubjectPerformance>,
    pub monthly_progress: Vec<MonthlyProgress>,
    pub weekly_activity: Vec<DayActivity>,
    pub top_subjects: Vec<SubjectMinutes>,

    /// `None` until the user first saves settings
    pub reminders: Option<ReminderSettings>,
    pub insights: Insights,
}

impl DashboardView {
    /// Format the streak for display (e.g., "5 days").
    pub fn format_streak(&self) -> String {
        match self.learning_streak {
            1 => "1 day".to_string(),
            n => format!("{} days", n),
        }
    }

    /// Busiest weekday of the last seven days, if any sessions happened.
    pub fn busiest_day(&self) -> Option<&'static str> {
        self.weekly_activity
            .iter()
            .filter(|d| d.sessions > 0)
            .max_by(|a, b| a.sessions.cmp(&b.sessions))
            .map(|d| d.day)
    }
}

/// Load the dashboard for the caller. Requires Pro.
///
/// `today` and `tz` define the calendar days used by the streak, weekly
/// activity and the daily-habit insight.
pub fn load_dashboard<Tz: TimeZone>(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    today: NaiveDate,
    tz: &Tz,
    config: &AnalyticsConfig,
) -> Result<DashboardView> {
    let user_id = ctx.require(Capability::PerformanceDashboard)?;

    let conversations = store.list_conversations(&ConversationFilter::for_user(user_id))?;
    let reports = store.list_monthly_reports(user_id)?;
    let reminders = store.get_reminder_settings(user_id)?;

    let stats = compute_stats(&conversations);
    let learning_streak = compute_streak(&conversations, today, tz, config.streak_window_days);
    let weekly_activity = weekly_activity(&conversations, today, tz);

    let recent_conversations: Vec<ConversationRecord> = conversations
        .into_iter()
        .take(config.recent_conversations)
        .collect();
    let insights = generate_insights(&stats, &reports, &recent_conversations, tz);

    tracing::debug!(
        user_id,
        conversations = stats.total_conversations,
        reports = reports.len(),
        learning_streak,
        "Loaded dashboard"
    );

    Ok(DashboardView {
        total_hours: stats.total_hours(),
        average_session_minutes: stats.average_minutes(),
        learning_streak,
        subject_performance: subject_performance(&reports),
        monthly_progress: monthly_progress(&reports, config.progress_months),
        top_subjects: subject_minutes(&reports, config.top_subjects),
        weekly_activity,
        stats,
        recent_conversations,
        reports,
        reminders,
        insights,
    })
}
