//! # thuto-core
//!
//! Core library for Thuto - learning analytics for AI tutoring companions.
//!
//! This library provides:
//! - Domain types for companions, sessions, conversations and reports
//! - Record storage with SQLite
//! - Plan entitlements and per-request context
//! - Live stats, streaks, monthly reports, insights and the Pro dashboard
//! - Reminder preferences
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Records:** companions, session history and conversation transcripts
//! - **Live analytics:** stats, streaks and insights, recomputed on every read
//! - **Snapshots:** monthly reports, persisted and idempotently rebuildable
//!
//! Every user-facing operation takes a [`RequestContext`] carrying the caller's
//! identity and entitlements; nothing reads an ambient "current user".
//!
//! ## Example
//!
//! ```rust,no_run
//! use thuto_core::analytics::{build_monthly_report, ReportPeriod};
//! use thuto_core::{Config, Database, PlanEntitlement, RequestContext, Tier};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let plan = PlanEntitlement::new(Tier::Core);
//! let ctx = RequestContext::new("user_123", &plan);
//! let period = ReportPeriod::new(2024, 3).expect("valid month");
//! let report = build_monthly_report(&db, &ctx, period).expect("failed to build report");
//! println!("{} sessions", report.data.total_sessions);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{CompanionFilter, ConversationFilter, Database, RecordStore, SortOrder};
pub use entitlement::{Capability, Entitlement, PlanEntitlement, RequestContext, Tier};
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod entitlement;
pub mod error;
pub mod history;
pub mod logging;
pub mod reminders;
pub mod types;
