//! Consecutive-day learning streak.

use chrono::{Duration, NaiveDate, TimeZone};
use std::collections::HashSet;

use crate::types::Timestamped;

/// Count consecutive active days walking backwards from `as_of`.
///
/// Each item is bucketed to its calendar day in `tz`. The walk covers at most
/// `window_days` days (`as_of` included). Empty days before the first active
/// day are skipped, so a user who has not studied yet today keeps yesterday's
/// streak; the first empty day after an active one ends the count.
///
/// The scan does not require the streak to reach `as_of` or the day before:
/// activity ending a week ago still counts as a streak while inside the
/// window.
pub fn compute_streak<I, Tz>(items: I, as_of: NaiveDate, tz: &Tz, window_days: u32) -> u32
where
    I: IntoIterator,
    I::Item: Timestamped,
    Tz: TimeZone,
{
    let active_days: HashSet<NaiveDate> = items
        .into_iter()
        .map(|item| item.created_at().with_timezone(tz).date_naive())
        .collect();

    let mut streak = 0u32;
    for offset in 0..window_days {
        let day = as_of - Duration::days(i64::from(offset));
        if active_days.contains(&day) {
            streak += 1;
        } else if streak > 0 {
            break;
        }
    }

    streak
}
