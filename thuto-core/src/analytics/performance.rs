//! Cross-report performance breakdowns for the dashboard.

use chrono::{Datelike, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stats::{round_div, round_tenths};
use crate::types::{MonthlyReport, Timestamped};

const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// One subject summed across all stored reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPerformance {
    pub subject: String,
    pub sessions: u64,
    pub total_duration_seconds: u64,
    /// Mean of the per-report completion over reports containing the subject
    pub completion_percentage: u32,
}

/// One point of the monthly progress series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyProgress {
    pub label: String,
    pub sessions: u64,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectMinutes {
    pub subject: String,
    pub minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayActivity {
    pub day: &'static str,
    pub sessions: u64,
}

/// Per-subject totals across reports, most sessions first (ties by name).
pub fn subject_performance(reports: &[MonthlyReport]) -> Vec<SubjectPerformance> {
    // subject -> (sessions, duration, completion sum, reports containing it)
    let mut totals: BTreeMap<&str, (u64, u64, u64, u64)> = BTreeMap::new();

    for report in reports {
        for (subject, summary) in &report.data.subjects_studied {
            let entry = totals.entry(subject.as_str()).or_default();
            entry.0 += summary.sessions;
            entry.1 += summary.total_duration_seconds;
            entry.2 += u64::from(summary.completion_percentage);
            entry.3 += 1;
        }
    }

    let mut performance: Vec<SubjectPerformance> = totals
        .into_iter()
        .map(|(subject, (sessions, duration, completion, count))| SubjectPerformance {
            subject: subject.to_string(),
            sessions,
            total_duration_seconds: duration,
            completion_percentage: u32::try_from(round_div(completion, count.max(1)))
                .unwrap_or(u32::MAX),
        })
        .collect();

    performance.sort_by(|a, b| b.sessions.cmp(&a.sessions).then_with(|| a.subject.cmp(&b.subject)));
    performance
}

/// The newest `months` reports as a chronological series.
///
/// `reports` must be ordered newest first, as the store lists them.
pub fn monthly_progress(reports: &[MonthlyReport], months: usize) -> Vec<MonthlyProgress> {
    reports
        .iter()
        .take(months)
        .rev()
        .map(|report| MonthlyProgress {
            label: report.period().short_label().to_string(),
            sessions: report.data.total_sessions,
            hours: round_tenths(report.data.total_duration_seconds as f64 / 3600.0),
        })
        .collect()
}

/// Minutes per subject across reports, largest first, at most `top` entries.
pub fn subject_minutes(reports: &[MonthlyReport], top: usize) -> Vec<SubjectMinutes> {
    let mut seconds: BTreeMap<&str, u64> = BTreeMap::new();
    for report in reports {
        for (subject, summary) in &report.data.subjects_studied {
            *seconds.entry(subject.as_str()).or_default() += summary.total_duration_seconds;
        }
    }

    let mut minutes: Vec<SubjectMinutes> = seconds
        .into_iter()
        .map(|(subject, secs)| SubjectMinutes {
            subject: subject.to_string(),
            minutes: round_div(secs, 60),
        })
        .collect();

    // Stable sort keeps name order among equals
    minutes.sort_by(|a, b| b.minutes.cmp(&a.minutes));
    minutes.truncate(top);
    minutes
}

/// Sessions per weekday (Sunday first) over the seven days ending `today`.
pub fn weekly_activity<T, Tz>(conversations: &[T], today: NaiveDate, tz: &Tz) -> Vec<DayActivity>
where
    T: Timestamped,
    Tz: TimeZone,
{
    let mut counts = [0u64; 7];

    for conversation in conversations {
        let day = conversation.created_at().with_timezone(tz).date_naive();
        let days_ago = (today - day).num_days();
        if (0..7).contains(&days_ago) {
            counts[day.weekday().num_days_from_sunday() as usize] += 1;
        }
    }

    WEEKDAY_LABELS
        .iter()
        .zip(counts)
        .map(|(&day, sessions)| DayActivity { day, sessions })
        .collect()
}
