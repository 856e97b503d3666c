//! thuto-report - learning progress from companion conversations
//!
//! Seeds the store from a JSON export and prints live stats, monthly
//! reports, insights, the Pro dashboard and reminder settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveTime, Utc, Weekday};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use thuto_core::analytics::{
    build_monthly_report, ensure_current_report, generate_insights, list_monthly_reports,
    load_dashboard, ConversationStats, DashboardView, Insights, ReportPeriod,
};
use thuto_core::history::{get_conversation_stats, list_conversations};
use thuto_core::reminders::{get_reminder_settings, save_reminder_settings};
use thuto_core::{
    Companion, Config, ConversationFilter, ConversationRecord, Database, MonthlyReport,
    PlanEntitlement, RecordStore, ReminderFrequency, ReminderSettings, RequestContext,
    SessionRecord, Tier,
};

#[derive(Parser, Debug)]
#[command(name = "thuto-report")]
#[command(about = "Thuto - learning progress, reports and insights")]
#[command(version)]
struct Args {
    /// User to act as
    #[arg(long, global = true)]
    user: Option<String>,

    /// Subscription plan of the user (free, core, pro)
    #[arg(long, global = true, default_value = "free")]
    plan: Tier,

    /// Database file (default: from config, else ~/.local/share/thuto/data.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Export format (md = markdown, json = JSON)
    #[arg(long, global = true)]
    export: Option<String>,

    /// Treat this date as today (format: YYYY-MM-DD)
    #[arg(long, global = true)]
    date: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load companions, sessions and conversations from a JSON export
    Import {
        /// Path to the export file
        file: PathBuf,
    },
    /// Live conversation statistics
    Stats,
    /// List saved conversations, newest first
    Conversations {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Build (or rebuild) a monthly report
    Report {
        /// Month to build (format: YYYY-MM, default: current month)
        #[arg(long)]
        month: Option<ReportPeriod>,
    },
    /// List stored monthly reports, building the current month's if missing
    Reports,
    /// Learning insights from stats and report history
    Insights,
    /// Pro performance dashboard
    Dashboard,
    /// Learning reminder settings
    Reminders {
        #[command(subcommand)]
        action: ReminderAction,
    },
}

#[derive(Subcommand, Debug)]
enum ReminderAction {
    /// Show the saved settings
    Show,
    /// Save new settings
    Set {
        /// Reminder time (HH:MM, 24-hour)
        #[arg(long, default_value = "09:00")]
        time: String,
        /// daily, weekdays or custom
        #[arg(long, default_value = "daily")]
        frequency: ReminderFrequency,
        /// Days for custom frequency (e.g. mon,wed,fri)
        #[arg(long, value_delimiter = ',')]
        days: Vec<Weekday>,
        /// Save the settings switched off
        #[arg(long)]
        disabled: bool,
    },
}

/// Shape of an import file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
struct ImportFile {
    #[serde(default)]
    companions: Vec<Companion>,
    #[serde(default)]
    sessions: Vec<SessionRecord>,
    #[serde(default)]
    conversations: Vec<ConversationRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Terminal,
    Markdown,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration and database
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = thuto_core::logging::init(&config.logging).ok();

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.resolved_database_path());
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    db.migrate().context("failed to run migrations")?;

    let format = match args.export.as_deref() {
        Some("json") => Format::Json,
        Some("md") => Format::Markdown,
        Some(other) => anyhow::bail!("Unknown export format: {}. Use 'md' or 'json'", other),
        None => Format::Terminal,
    };

    let plan = PlanEntitlement::new(args.plan);
    let ctx = match &args.user {
        Some(user) => RequestContext::new(user.as_str(), &plan),
        None => RequestContext::anonymous(&plan),
    };
    let today = args.date.unwrap_or_else(|| Local::now().date_naive());
    // Report months are UTC; --date pins the clock to that day's UTC midnight
    let now = args
        .date
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .unwrap_or_else(Utc::now);

    match args.command {
        Command::Import { file } => import(&db, &file)?,
        Command::Stats => {
            let stats = get_conversation_stats(&db, &ctx).context("failed to load stats")?;
            print_stats(&stats, format)?;
        }
        Command::Conversations { page, limit } => {
            let conversations = list_conversations(&db, &ctx, page, limit)
                .context("failed to list conversations")?;
            print_conversations(&conversations, format)?;
        }
        Command::Report { month } => {
            let period = month.unwrap_or_else(|| ReportPeriod::containing(now.date_naive()));
            let report = build_monthly_report(&db, &ctx, period)
                .with_context(|| format!("failed to build report for {}", period))?;
            print_report(&report, format)?;
        }
        Command::Reports => {
            ensure_current_report(&db, &ctx, now)
                .context("failed to build current month's report")?;
            let reports = list_monthly_reports(&db, &ctx).context("failed to list reports")?;
            print_reports(&reports, format)?;
        }
        Command::Insights => {
            let user_id = ctx.user_id()?;
            let stats = get_conversation_stats(&db, &ctx).context("failed to load stats")?;
            let reports = list_monthly_reports(&db, &ctx).context("failed to list reports")?;
            let recent = db
                .list_conversations(
                    &ConversationFilter::for_user(user_id)
                        .limit(config.analytics.recent_conversations),
                )
                .context("failed to load recent conversations")?;
            let insights = generate_insights(&stats, &reports, &recent, &Local);
            print_insights(&insights, format)?;
        }
        Command::Dashboard => {
            let view = load_dashboard(&db, &ctx, today, &Local, &config.analytics)
                .context("failed to load dashboard")?;
            print_dashboard(&view, format)?;
        }
        Command::Reminders { action } => match action {
            ReminderAction::Show => {
                let settings = get_reminder_settings(&db, &ctx)
                    .context("failed to load reminder settings")?;
                print_reminders(settings.as_ref(), format)?;
            }
            ReminderAction::Set {
                time,
                frequency,
                days,
                disabled,
            } => {
                let settings = ReminderSettings {
                    enabled: !disabled,
                    time,
                    frequency,
                    custom_days: days,
                };
                let saved = save_reminder_settings(&db, &ctx, settings)
                    .context("failed to save reminder settings")?;
                print_reminders(Some(&saved), format)?;
            }
        },
    }

    Ok(())
}

fn import(db: &Database, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let data: ImportFile = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    for companion in &data.companions {
        db.insert_companion(companion)
            .with_context(|| format!("failed to import companion {}", companion.id))?;
    }
    for session in &data.sessions {
        db.insert_session(session)
            .with_context(|| format!("failed to import session {}", session.id))?;
    }
    for conversation in &data.conversations {
        db.insert_conversation(conversation)
            .with_context(|| format!("failed to import conversation {}", conversation.id))?;
    }

    tracing::info!(
        companions = data.companions.len(),
        sessions = data.sessions.len(),
        conversations = data.conversations.len(),
        "Import complete"
    );

    println!("Import complete:");
    println!("  Companions:    {}", data.companions.len());
    println!("  Sessions:      {}", data.sessions.len());
    println!("  Conversations: {}", data.conversations.len());
    Ok(())
}

// ============================================
// Output
// ============================================

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_header(title: &str) {
    println!();
    println!("╭{}╮", "─".repeat(60));
    println!("│{:^60}│", title);
    println!("╰{}╯", "─".repeat(60));
    println!();
}

fn print_stats(stats: &ConversationStats, format: Format) -> Result<()> {
    match format {
        Format::Json => return print_json(stats),
        Format::Markdown => {
            println!("# Learning Stats");
            println!();
            println!("| Metric | Value |");
            println!("|--------|-------|");
            println!("| Sessions | {} |", stats.total_conversations);
            println!("| Total time | {} |", format_duration(stats.total_duration_seconds));
            println!("| Average session | {} |", format_duration(stats.average_duration_seconds));
            println!("| Companions | {} |", stats.unique_companions);
        }
        Format::Terminal => {
            print_header("Learning Stats");
            println!(
                "   Sessions:   {:<12} Total Time: {}",
                stats.total_conversations,
                format_duration(stats.total_duration_seconds)
            );
            println!(
                "   Average:    {:<12} Companions: {}",
                format_duration(stats.average_duration_seconds),
                stats.unique_companions
            );
            println!();
        }
    }
    Ok(())
}

fn print_conversations(conversations: &[ConversationRecord], format: Format) -> Result<()> {
    if format == Format::Json {
        return print_json(&conversations);
    }

    if conversations.is_empty() {
        println!("No conversations yet.");
        return Ok(());
    }
    for conversation in conversations {
        println!(
            "{}  {}  {:<10} {} messages",
            conversation.created_at.format("%Y-%m-%d %H:%M"),
            conversation.companion_id,
            format_duration(conversation.duration_or_zero()),
            conversation.messages.len()
        );
    }
    Ok(())
}

fn print_report(report: &MonthlyReport, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(report),
        Format::Markdown => {
            print_report_markdown(report);
            Ok(())
        }
        Format::Terminal => {
            print_report_terminal(report);
            Ok(())
        }
    }
}

fn print_report_terminal(report: &MonthlyReport) {
    let data = &report.data;
    print_header(&format!("Monthly Report: {}", report.period().display_name()));

    if data.total_sessions == 0 {
        println!("  No sessions found for this month.");
        println!();
        return;
    }

    println!("SUMMARY");
    println!(
        "   Sessions: {:<12} Total Time: {}",
        data.total_sessions,
        format_duration(data.total_duration_seconds)
    );
    println!(
        "   Average:  {:<12} Most studied: {}",
        format_duration(data.average_duration_seconds),
        data.most_studied_subject.as_deref().unwrap_or("N/A")
    );
    println!("   Companions used: {}", data.companions_used.len());
    println!();

    if !data.subjects_studied.is_empty() {
        println!("SUBJECTS");
        for (subject, summary) in &data.subjects_studied {
            println!(
                "   {:<10} {:>3} sessions  {:>8} of {:<8} {:>4}%",
                subject,
                summary.sessions,
                format_duration(summary.total_duration_seconds),
                format_duration(summary.expected_duration_seconds),
                summary.completion_percentage
            );
        }
        println!();
    }

    if !data.strengths.is_empty() {
        println!("STRENGTHS");
        for strength in &data.strengths {
            println!("   + {}", strength);
        }
        println!();
    }

    if !data.areas_for_improvement.is_empty() {
        println!("AREAS FOR IMPROVEMENT");
        for area in &data.areas_for_improvement {
            println!("   - {}", area);
        }
        println!();
    }
}

fn print_report_markdown(report: &MonthlyReport) {
    let data = &report.data;
    println!("# Monthly Report: {}", report.period().display_name());
    println!();
    println!("## Summary");
    println!();
    println!("| Metric | Value |");
    println!("|--------|-------|");
    println!("| Sessions | {} |", data.total_sessions);
    println!("| Total time | {} |", format_duration(data.total_duration_seconds));
    println!(
        "| Average session | {} |",
        format_duration(data.average_duration_seconds)
    );
    println!(
        "| Most studied | {} |",
        data.most_studied_subject.as_deref().unwrap_or("N/A")
    );
    println!("| Companions used | {} |", data.companions_used.len());
    println!();

    if !data.subjects_studied.is_empty() {
        println!("## Subjects");
        println!();
        println!("| Subject | Sessions | Time | Expected | Completion |");
        println!("|---------|----------|------|----------|------------|");
        for (subject, summary) in &data.subjects_studied {
            println!(
                "| {} | {} | {} | {} | {}% |",
                subject,
                summary.sessions,
                format_duration(summary.total_duration_seconds),
                format_duration(summary.expected_duration_seconds),
                summary.completion_percentage
            );
        }
        println!();
    }

    if !data.strengths.is_empty() {
        println!("## Strengths");
        println!();
        for strength in &data.strengths {
            println!("- {}", strength);
        }
        println!();
    }

    if !data.areas_for_improvement.is_empty() {
        println!("## Areas for Improvement");
        println!();
        for area in &data.areas_for_improvement {
            println!("- {}", area);
        }
        println!();
    }

    println!("---");
    println!("*Generated by thuto-report*");
}

fn print_reports(reports: &[MonthlyReport], format: Format) -> Result<()> {
    if format == Format::Json {
        return print_json(&reports);
    }

    if reports.is_empty() {
        println!("No monthly reports yet. Complete some sessions to generate your first report!");
        return Ok(());
    }

    for report in reports {
        match format {
            Format::Markdown => print_report_markdown(report),
            _ => print_report_terminal(report),
        }
    }
    Ok(())
}

fn print_insights(insights: &Insights, format: Format) -> Result<()> {
    if format == Format::Json {
        return print_json(insights);
    }

    let sections = [
        ("Achievements", &insights.positive),
        ("Recommendations", &insights.recommendations),
        ("Patterns", &insights.patterns),
    ];

    if format == Format::Terminal {
        print_header("Learning Insights");
    } else {
        println!("# Learning Insights");
        println!();
    }

    if insights.is_empty() {
        println!("Keep learning to unlock personalized insights!");
        return Ok(());
    }

    for (title, messages) in sections {
        if messages.is_empty() {
            continue;
        }
        match format {
            Format::Markdown => {
                println!("## {}", title);
                println!();
                for message in messages {
                    println!("- {}", message);
                }
            }
            _ => {
                println!("{}", title.to_uppercase());
                for message in messages {
                    println!("   * {}", message);
                }
            }
        }
        println!();
    }
    Ok(())
}

fn print_dashboard(view: &DashboardView, format: Format) -> Result<()> {
    if format == Format::Json {
        return print_json(view);
    }
    let markdown = format == Format::Markdown;

    if markdown {
        println!("# Performance Dashboard");
        println!();
        println!("| Metric | Value |");
        println!("|--------|-------|");
        println!("| Sessions | {} |", view.stats.total_conversations);
        println!("| Total hours | {:.1} |", view.total_hours);
        println!("| Average session | {} min |", view.average_session_minutes);
        println!("| Learning streak | {} |", view.format_streak());
        println!();
    } else {
        print_header("Performance Dashboard");
        println!("KEY METRICS");
        println!(
            "   Sessions: {:<12} Total hours: {:.1}",
            view.stats.total_conversations, view.total_hours
        );
        println!(
            "   Average:  {:<12} Streak: {}",
            format!("{} min", view.average_session_minutes),
            view.format_streak()
        );
        println!();
    }

    if !view.monthly_progress.is_empty() {
        println!("{}", section_title("Monthly Progress", markdown));
        for point in &view.monthly_progress {
            println!(
                "{}{:<4} {:>4} sessions  {:>5.1} h",
                bullet(markdown),
                point.label,
                point.sessions,
                point.hours
            );
        }
        println!();
    }

    println!("{}", section_title("Weekly Activity", markdown));
    for day in &view.weekly_activity {
        println!(
            "{}{} {:>3} {}",
            bullet(markdown),
            day.day,
            day.sessions,
            "#".repeat(day.sessions as usize)
        );
    }
    if let Some(busiest) = view.busiest_day() {
        println!("{}Busiest day: {}", bullet(markdown), busiest);
    }
    println!();

    if !view.subject_performance.is_empty() {
        println!("{}", section_title("Subject Breakdown", markdown));
        for subject in &view.subject_performance {
            println!(
                "{}{:<10} {:>3} sessions  {:>8}  {:>3}% completion",
                bullet(markdown),
                subject.subject,
                subject.sessions,
                format_duration(subject.total_duration_seconds),
                subject.completion_percentage
            );
        }
        println!();
    }

    if !view.top_subjects.is_empty() {
        println!("{}", section_title("Time by Subject", markdown));
        for subject in &view.top_subjects {
            println!("{}{:<10} {} min", bullet(markdown), subject.subject, subject.minutes);
        }
        println!();
    }

    println!("{}", section_title("Reminders", markdown));
    print_reminder_lines(view.reminders.as_ref(), bullet(markdown));
    println!();

    for (title, messages) in [
        ("Achievements", &view.insights.positive),
        ("Recommendations", &view.insights.recommendations),
        ("Patterns", &view.insights.patterns),
    ] {
        if messages.is_empty() {
            continue;
        }
        println!("{}", section_title(title, markdown));
        for message in messages {
            println!("{}{}", bullet(markdown), message);
        }
        println!();
    }

    Ok(())
}

fn print_reminders(settings: Option<&ReminderSettings>, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(&settings),
        Format::Markdown => {
            println!("## Learning Reminders");
            println!();
            print_reminder_lines(settings, "- ");
            Ok(())
        }
        Format::Terminal => {
            println!("LEARNING REMINDERS");
            print_reminder_lines(settings, "   ");
            Ok(())
        }
    }
}

fn print_reminder_lines(settings: Option<&ReminderSettings>, prefix: &str) {
    let Some(settings) = settings else {
        let defaults = ReminderSettings::default();
        println!(
            "{}Not set (default: {}, {})",
            prefix,
            defaults.display_time(),
            defaults.frequency.as_str()
        );
        return;
    };

    println!(
        "{}Status:    {}",
        prefix,
        if settings.enabled { "enabled" } else { "disabled" }
    );
    println!("{}Time:      {}", prefix, settings.display_time());
    println!("{}Frequency: {}", prefix, settings.frequency.as_str());
    if settings.frequency == ReminderFrequency::Custom {
        let days: Vec<String> = settings.custom_days.iter().map(|d| d.to_string()).collect();
        println!("{}Days:      {}", prefix, days.join(", "));
    }
}

fn section_title(title: &str, markdown: bool) -> String {
    if markdown {
        format!("## {}\n", title)
    } else {
        title.to_uppercase()
    }
}

fn bullet(markdown: bool) -> &'static str {
    if markdown {
        "- "
    } else {
        "   "
    }
}

/// Format seconds as "1h 30m", "10m" or "45s".
fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", secs)
    }
}
