//! Rule-based learning insights.
//!
//! Every rule is evaluated independently; within each bucket messages keep
//! rule order. Missing or empty report history is "no signal", never an error.

use chrono::{NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::stats::{round_div, ConversationStats};
use crate::types::{MonthlyReport, Timestamped};

const MILESTONE_SESSIONS: u64 = 50;
const PROGRESS_SESSIONS: u64 = 20;
const INVESTED_SECONDS: u64 = 10 * 3600;
const EXPLORER_COMPANIONS: u64 = 5;
const SHORT_SESSION_SECONDS: u64 = 300;
const WEEKLY_TARGET_SESSIONS: usize = 3;
const VARIETY_COMPANIONS: u64 = 3;
const HABIT_RECENT_SESSIONS: usize = 7;
const HABIT_DISTINCT_DAYS: usize = 5;

/// Display strings grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insights {
    pub positive: Vec<String>,
    pub recommendations: Vec<String>,
    pub patterns: Vec<String>,
}

impl Insights {
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.recommendations.is_empty() && self.patterns.is_empty()
    }
}

/// Derive insights from live stats, stored reports (newest first) and the
/// user's most recent conversations. Recent conversations are bucketed to
/// calendar days in `tz`.
pub fn generate_insights<T, Tz>(
    stats: &ConversationStats,
    reports: &[MonthlyReport],
    recent: &[T],
    tz: &Tz,
) -> Insights
where
    T: Timestamped,
    Tz: TimeZone,
{
    let mut insights = Insights::default();

    // Positive
    if stats.total_conversations >= MILESTONE_SESSIONS {
        insights.positive.push(format!(
            "Amazing! You've completed {} learning sessions.",
            stats.total_conversations
        ));
    } else if stats.total_conversations >= PROGRESS_SESSIONS {
        insights.positive.push(format!(
            "Great progress! {} sessions completed.",
            stats.total_conversations
        ));
    }

    if stats.total_duration_seconds >= INVESTED_SECONDS {
        insights.positive.push(format!(
            "You've invested {} hours in learning!",
            round_div(stats.total_duration_seconds, 3600)
        ));
    }

    if stats.unique_companions >= EXPLORER_COMPANIONS {
        insights.positive.push(format!(
            "Exploring diverse topics with {} different companions.",
            stats.unique_companions
        ));
    }

    // Recommendations
    if stats.average_duration_seconds < SHORT_SESSION_SECONDS {
        insights
            .recommendations
            .push("Try extending your sessions to 10-15 minutes for better retention.".to_string());
    }

    if recent.len() < WEEKLY_TARGET_SESSIONS {
        insights
            .recommendations
            .push("Stay consistent! Aim for at least 3 sessions per week.".to_string());
    }

    if let Some(latest) = reports.first() {
        if latest.data.subjects_studied.len() == 1 {
            insights
                .recommendations
                .push("Diversify your learning by exploring other subjects.".to_string());
        }
    }

    if stats.total_conversations > 0 && stats.unique_companions < VARIETY_COMPANIONS {
        insights
            .recommendations
            .push("Try different companions to discover new learning styles.".to_string());
    }

    // Patterns
    if recent.len() >= HABIT_RECENT_SESSIONS {
        let days: HashSet<NaiveDate> = recent
            .iter()
            .map(|c| c.created_at().with_timezone(tz).date_naive())
            .collect();
        if days.len() >= HABIT_DISTINCT_DAYS {
            insights
                .patterns
                .push("You're building a strong daily learning habit!".to_string());
        }
    }

    if let [current, previous, ..] = reports {
        let current = current.data.total_sessions;
        let previous = previous.data.total_sessions;
        if current > previous {
            insights.patterns.push(format!(
                "Your session count increased by {}% this month!",
                growth_percent(previous, current)
            ));
        }
    }

    insights
}

/// Month-over-month growth, rounded. Growth from zero reports as 100%.
fn growth_percent(previous: u64, current: u64) -> u64 {
    if previous == 0 {
        return 100;
    }
    round_div((current - previous) * 100, previous)
}
