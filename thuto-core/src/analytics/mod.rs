//! Analytics module for thuto
//!
//! Turns conversation history into learning analytics:
//! - Live conversation statistics
//! - Learning streaks
//! - Monthly report snapshots (build, list, auto-generate)
//! - Rule-based insights
//! - Performance breakdowns and the Pro dashboard
//!
//! Stats are always computed on read; monthly reports are persisted
//! snapshots that can be rebuilt at any time.

pub mod dashboard;
pub mod insights;
pub mod performance;
pub mod report;
pub mod stats;
pub mod streak;

pub use dashboard::{load_dashboard, DashboardView};
pub use insights::{generate_insights, Insights};
pub use performance::{
    monthly_progress, subject_minutes, subject_performance, weekly_activity, DayActivity,
    MonthlyProgress, SubjectMinutes, SubjectPerformance,
};
pub use report::{
    build_monthly_report, content_hash, ensure_current_report, list_monthly_reports, report_id,
    MonthlyReportBuilder, ReportPeriod,
};
pub use stats::{compute_stats, ConversationStats};
pub use streak::compute_streak;
