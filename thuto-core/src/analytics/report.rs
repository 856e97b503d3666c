//! Monthly report generation.
//!
//! A report is a point-in-time snapshot of one user's conversations in one
//! calendar month. Building is idempotent: the report id is derived from
//! `(user, year, month)` and the store upserts on that key, so rebuilding
//! an unchanged month stores exactly the same snapshot.

use chrono::{Datelike, DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::stats::round_div;
use crate::db::{ConversationFilter, RecordStore};
use crate::entitlement::{Capability, RequestContext};
use crate::error::{Error, Result};
use crate::types::{ConversationWithCompanion, MonthlyReport, ReportData, Subject, SubjectSummary};

/// Completion at or above this is a strength.
pub const STRONG_COMPLETION_PERCENT: u32 = 80;
/// Completion below this needs improvement.
pub const WEAK_COMPLETION_PERCENT: u32 = 50;
/// Sessions at or above this count as consistent practice.
pub const CONSISTENT_SESSIONS: u64 = 3;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

// ============================================
// Report period
// ============================================

/// Highest year whose timestamps keep the fixed-width storage form.
const MAX_YEAR: i32 = 9999;

/// A calendar month (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct ReportPeriod {
    year: i32,
    month: u32,
}

/// Unchecked wire form; deserialization goes through [`ReportPeriod::new`].
#[derive(Deserialize)]
struct RawPeriod {
    year: i32,
    month: u32,
}

impl TryFrom<RawPeriod> for ReportPeriod {
    type Error = Error;

    fn try_from(raw: RawPeriod) -> Result<Self> {
        Self::new(raw.year, raw.month)
    }
}

impl ReportPeriod {
    /// Validated constructor; month must be in `1..=12` and year in
    /// `0..=9999`.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::Validation(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        if !(0..=MAX_YEAR).contains(&year) {
            return Err(Error::Validation(format!(
                "year must be between 0 and {}, got {}",
                MAX_YEAR, year
            )));
        }
        Ok(Self { year, month })
    }

    /// Period from stored values the store has already checked.
    pub(crate) fn from_parts(year: i32, month: u32) -> Self {
        debug_assert!(
            Self::new(year, month).is_ok(),
            "unchecked report period {}-{}",
            year,
            month
        );
        Self { year, month }
    }

    /// The month containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current UTC month.
    pub fn current() -> Self {
        Self::containing(Utc::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day().pred_opt().unwrap_or_default()
    }

    /// First day, 00:00:00 UTC.
    pub fn first_instant(&self) -> DateTime<Utc> {
        self.first_day().and_time(NaiveTime::MIN).and_utc()
    }

    /// Last day, 23:59:59 UTC. The month is the closed interval
    /// `[first_instant, last_instant]` at whole-second precision.
    pub fn last_instant(&self) -> DateTime<Utc> {
        self.next().first_instant() - Duration::seconds(1)
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// e.g. "March 2024"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.month_name(), self.year)
    }

    /// e.g. "Mar"
    pub fn short_label(&self) -> &'static str {
        &self.month_name()[..3]
    }

    fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month as usize).saturating_sub(1).min(11)]
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for ReportPeriod {
    type Err = Error;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| Error::Validation(format!("expected YYYY-MM, got {:?}", s)))?;
        let year: i32 = year
            .parse()
            .map_err(|_| Error::Validation(format!("invalid year in {:?}", s)))?;
        let month: u32 = month
            .parse()
            .map_err(|_| Error::Validation(format!("invalid month in {:?}", s)))?;
        Self::new(year, month)
    }
}

/// Stable report id for `(user, period)`.
pub fn report_id(user_id: &str, period: ReportPeriod) -> String {
    let name = format!("thuto:monthly-report:{}:{}", user_id, period);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// SHA-256 (hex) of the serialized report body.
pub fn content_hash(data: &ReportData) -> Result<String> {
    let bytes = serde_json::to_vec(data)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

// ============================================
// Builder
// ============================================

#[derive(Debug)]
struct SubjectTally {
    subject: Subject,
    sessions: u64,
    total_duration_seconds: u64,
    expected_duration_seconds: u64,
    companion_names: BTreeSet<String>,
}

impl SubjectTally {
    fn completion_percentage(&self) -> u32 {
        if self.expected_duration_seconds == 0 {
            return 100;
        }
        let pct = round_div(
            self.total_duration_seconds * 100,
            self.expected_duration_seconds,
        );
        u32::try_from(pct).unwrap_or(u32::MAX)
    }
}

/// Accumulates a month's conversations, then freezes into [`ReportData`].
///
/// Subjects are tallied in first-seen order; feed conversations oldest first
/// (ties by id) for a stable most-studied tie-break.
#[derive(Debug, Default)]
pub struct MonthlyReportBuilder {
    subjects: Vec<SubjectTally>,
    total_sessions: u64,
    total_duration_seconds: u64,
    companions_used: BTreeSet<String>,
}

impl MonthlyReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one conversation. Conversations without a recognised subject
    /// still count toward totals and companions used.
    pub fn add(&mut self, row: &ConversationWithCompanion) {
        let duration = u64::from(row.duration_seconds.unwrap_or(0));

        self.total_sessions += 1;
        self.total_duration_seconds += duration;
        self.companions_used.insert(row.companion_id.clone());

        let Some(subject) = row.subject else {
            return;
        };

        let index = match self.subjects.iter().position(|t| t.subject == subject) {
            Some(index) => index,
            None => {
                self.subjects.push(SubjectTally {
                    subject,
                    sessions: 0,
                    total_duration_seconds: 0,
                    expected_duration_seconds: 0,
                    companion_names: BTreeSet::new(),
                });
                self.subjects.len() - 1
            }
        };

        let tally = &mut self.subjects[index];
        tally.sessions += 1;
        tally.total_duration_seconds += duration;
        tally.expected_duration_seconds +=
            u64::from(row.expected_duration_minutes.unwrap_or(0)) * 60;
        if let Some(name) = &row.companion_name {
            tally.companion_names.insert(name.clone());
        }
    }

    /// Freeze into the immutable report body.
    pub fn build(self) -> ReportData {
        let mut strengths = Vec::new();
        let mut areas_for_improvement = Vec::new();
        let mut most_studied: Option<&SubjectTally> = None;

        for tally in &self.subjects {
            let subject = tally.subject.as_str();
            let completion = tally.completion_percentage();

            if completion >= STRONG_COMPLETION_PERCENT {
                strengths.push(format!(
                    "Excellent completion rate in {} ({}%)",
                    subject, completion
                ));
            }
            if tally.sessions >= CONSISTENT_SESSIONS {
                strengths.push(format!(
                    "Consistent practice in {} ({} sessions)",
                    subject, tally.sessions
                ));
            }
            if tally.sessions > 0 && completion < WEAK_COMPLETION_PERCENT {
                areas_for_improvement.push(format!(
                    "Spend more time on {} sessions (only {}% of expected time completed)",
                    subject, completion
                ));
            }

            // Strict comparison: first seen wins ties
            if most_studied.map_or(true, |best| tally.sessions > best.sessions) {
                most_studied = Some(tally);
            }
        }

        if areas_for_improvement.is_empty() && self.total_sessions > 0 {
            areas_for_improvement
                .push("Try exploring new subjects to broaden your learning".to_string());
        }

        let most_studied_subject = most_studied.map(|t| t.subject.as_str().to_string());

        let average_duration_seconds = if self.total_sessions > 0 {
            round_div(self.total_duration_seconds, self.total_sessions)
        } else {
            0
        };

        let subjects_studied: BTreeMap<String, SubjectSummary> = self
            .subjects
            .into_iter()
            .map(|tally| {
                let completion_percentage = tally.completion_percentage();
                (
                    tally.subject.as_str().to_string(),
                    SubjectSummary {
                        sessions: tally.sessions,
                        total_duration_seconds: tally.total_duration_seconds,
                        expected_duration_seconds: tally.expected_duration_seconds,
                        completion_percentage,
                        companion_names: tally.companion_names,
                    },
                )
            })
            .collect();

        ReportData {
            total_sessions: self.total_sessions,
            total_duration_seconds: self.total_duration_seconds,
            average_duration_seconds,
            subjects_studied,
            most_studied_subject,
            strengths,
            areas_for_improvement,
            companions_used: self.companions_used,
        }
    }
}

// ============================================
// Operations
// ============================================

/// Build (or rebuild) and persist the report for `period`.
///
/// Requires Core or Pro. Access is checked before the store is touched.
pub fn build_monthly_report(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    period: ReportPeriod,
) -> Result<MonthlyReport> {
    let user_id = ctx.require(Capability::MonthlyReports)?;

    let rows =
        store.conversations_with_companions(user_id, period.first_instant(), period.last_instant())?;

    let mut builder = MonthlyReportBuilder::new();
    for row in &rows {
        builder.add(row);
    }
    let data = builder.build();

    let report = MonthlyReport {
        id: report_id(user_id, period),
        user_id: user_id.to_string(),
        month: period.month(),
        year: period.year(),
        content_hash: content_hash(&data)?,
        data,
    };

    let previous_hash = match store.get_monthly_report(user_id, period.year(), period.month()) {
        Ok(existing) => existing.map(|existing| existing.content_hash),
        // Undecodable snapshot: overwrite it
        Err(Error::Json(e)) => {
            tracing::warn!(user_id, period = %period, error = %e, "Replacing unreadable monthly report");
            None
        }
        Err(e) => return Err(e),
    };

    store.upsert_monthly_report(&report)?;

    match previous_hash {
        None => tracing::info!(
            user_id,
            period = %period,
            sessions = report.data.total_sessions,
            "Created monthly report"
        ),
        Some(hash) if hash == report.content_hash => tracing::info!(
            user_id,
            period = %period,
            "Monthly report unchanged"
        ),
        Some(_) => tracing::info!(
            user_id,
            period = %period,
            sessions = report.data.total_sessions,
            "Updated monthly report"
        ),
    }

    Ok(report)
}

/// All of the caller's reports, newest first. Requires Core or Pro.
pub fn list_monthly_reports(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
) -> Result<Vec<MonthlyReport>> {
    let user_id = ctx.require(Capability::MonthlyReports)?;
    store.list_monthly_reports(user_id)
}

/// Build the report for the UTC month containing `now` if the user has any
/// conversations and that month has no report yet.
///
/// Returns the newly built report, or `None` when nothing was built.
pub fn ensure_current_report(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    now: DateTime<Utc>,
) -> Result<Option<MonthlyReport>> {
    let user_id = ctx.require(Capability::MonthlyReports)?;
    let period = ReportPeriod::containing(now.date_naive());

    if store
        .get_monthly_report(user_id, period.year(), period.month())?
        .is_some()
    {
        return Ok(None);
    }

    let any = store.list_conversations(&ConversationFilter::for_user(user_id).limit(1))?;
    if any.is_empty() {
        return Ok(None);
    }

    build_monthly_report(store, ctx, period).map(Some)
}
