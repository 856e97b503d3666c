//! Learning reminder preferences.
//!
//! Only the data contract lives here: one settings row per user, last write
//! wins. Nothing in thuto delivers reminders.

use chrono::{NaiveTime, Timelike, Weekday};

use crate::db::RecordStore;
use crate::entitlement::{Capability, RequestContext};
use crate::error::{Error, Result};
use crate::types::{ReminderFrequency, ReminderSettings};

impl ReminderSettings {
    /// Parsed reminder time, if `time` is a valid 24-hour "HH:MM".
    pub fn parsed_time(&self) -> Option<NaiveTime> {
        parse_time(&self.time).ok()
    }

    /// 12-hour display form, e.g. "9:00 AM". Falls back to the raw value.
    pub fn display_time(&self) -> String {
        match self.parsed_time() {
            Some(time) => {
                let (pm, hour) = time.hour12();
                format!(
                    "{}:{:02} {}",
                    hour,
                    time.minute(),
                    if pm { "PM" } else { "AM" }
                )
            }
            None => self.time.clone(),
        }
    }

    /// Whether a reminder is due on `day`. Disabled settings never apply.
    pub fn applies_on(&self, day: Weekday) -> bool {
        if !self.enabled {
            return false;
        }
        match self.frequency {
            ReminderFrequency::Daily => true,
            ReminderFrequency::Weekdays => !matches!(day, Weekday::Sat | Weekday::Sun),
            ReminderFrequency::Custom => self.custom_days.contains(&day),
        }
    }

    /// Check the settings and return them in canonical form: custom days
    /// sorted Monday first without duplicates, and cleared for other
    /// frequencies.
    pub fn validated(mut self) -> Result<Self> {
        parse_time(&self.time)?;

        if self.frequency == ReminderFrequency::Custom {
            self.custom_days.sort_by_key(|d| d.num_days_from_monday());
            self.custom_days.dedup();
            if self.custom_days.is_empty() {
                return Err(Error::Validation(
                    "custom reminders need at least one day".to_string(),
                ));
            }
        } else {
            self.custom_days.clear();
        }

        Ok(self)
    }
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    let invalid = || Error::Validation(format!("reminder time must be HH:MM (24-hour), got {:?}", value));

    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(invalid());
    }
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| invalid())
}

/// Save the caller's reminder settings. Requires Pro.
pub fn save_reminder_settings(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    settings: ReminderSettings,
) -> Result<ReminderSettings> {
    let user_id = ctx.require(Capability::Reminders)?;
    let settings = settings.validated()?;

    store.upsert_reminder_settings(user_id, &settings)?;

    tracing::info!(
        user_id,
        enabled = settings.enabled,
        time = %settings.time,
        frequency = settings.frequency.as_str(),
        "Saved reminder settings"
    );
    Ok(settings)
}

/// The caller's reminder settings.
///
/// `None` both when nothing has been saved and when the caller is not on
/// Pro; the two cases are deliberately indistinguishable.
pub fn get_reminder_settings(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
) -> Result<Option<ReminderSettings>> {
    let user_id = ctx.user_id()?;
    if !ctx.can(Capability::Reminders) {
        return Ok(None);
    }
    store.get_reminder_settings(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::entitlement::{PlanEntitlement, Tier};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn settings(time: &str, frequency: ReminderFrequency, days: Vec<Weekday>) -> ReminderSettings {
        ReminderSettings {
            enabled: true,
            time: time.to_string(),
            frequency,
            custom_days: days,
        }
    }

    #[test]
    fn test_display_time() {
        assert_eq!(ReminderSettings::default().display_time(), "9:00 AM");
        assert_eq!(
            settings("18:05", ReminderFrequency::Daily, vec![]).display_time(),
            "6:05 PM"
        );
        assert_eq!(
            settings("00:30", ReminderFrequency::Daily, vec![]).display_time(),
            "12:30 AM"
        );
        assert_eq!(
            settings("12:00", ReminderFrequency::Daily, vec![]).display_time(),
            "12:00 PM"
        );
    }

    #[test]
    fn test_time_validation() {
        for bad in ["9:00", "24:00", "12:60", "noon", "12:00:00", ""] {
            assert!(
                matches!(
                    settings(bad, ReminderFrequency::Daily, vec![]).validated(),
                    Err(Error::Validation(_))
                ),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(settings("23:59", ReminderFrequency::Daily, vec![])
            .validated()
            .is_ok());
    }

    #[test]
    fn test_custom_days_normalized() {
        let normalized = settings(
            "07:00",
            ReminderFrequency::Custom,
            vec![Weekday::Fri, Weekday::Mon, Weekday::Fri],
        )
        .validated()
        .unwrap();
        assert_eq!(normalized.custom_days, vec![Weekday::Mon, Weekday::Fri]);

        assert!(matches!(
            settings("07:00", ReminderFrequency::Custom, vec![]).validated(),
            Err(Error::Validation(_))
        ));

        let daily = settings("07:00", ReminderFrequency::Daily, vec![Weekday::Tue])
            .validated()
            .unwrap();
        assert!(daily.custom_days.is_empty());
    }

    #[test]
    fn test_applies_on() {
        let weekdays = settings("07:00", ReminderFrequency::Weekdays, vec![]);
        assert!(weekdays.applies_on(Weekday::Mon));
        assert!(!weekdays.applies_on(Weekday::Sun));

        let custom = settings("07:00", ReminderFrequency::Custom, vec![Weekday::Wed]);
        assert!(custom.applies_on(Weekday::Wed));
        assert!(!custom.applies_on(Weekday::Thu));

        let mut off = settings("07:00", ReminderFrequency::Daily, vec![]);
        off.enabled = false;
        assert!(!off.applies_on(Weekday::Mon));
    }

    #[test]
    fn test_save_requires_pro() {
        let db = test_db();
        let core = PlanEntitlement::new(Tier::Core);
        let ctx = RequestContext::new("u1", &core);

        let result = save_reminder_settings(
            &db,
            &ctx,
            settings("07:00", ReminderFrequency::Daily, vec![]),
        );
        assert!(matches!(
            result,
            Err(Error::AccessDenied {
                capability: Capability::Reminders
            })
        ));
        assert!(db.get_reminder_settings("u1").unwrap().is_none());
    }

    #[test]
    fn test_get_hides_settings_without_pro() {
        let db = test_db();
        let pro = PlanEntitlement::new(Tier::Pro);
        let pro_ctx = RequestContext::new("u1", &pro);
        assert!(get_reminder_settings(&db, &pro_ctx).unwrap().is_none());

        save_reminder_settings(
            &db,
            &pro_ctx,
            settings("20:15", ReminderFrequency::Weekdays, vec![]),
        )
        .unwrap();
        let stored = get_reminder_settings(&db, &pro_ctx).unwrap().unwrap();
        assert_eq!(stored.time, "20:15");

        // Downgraded users read nothing, same as never having saved
        let core = PlanEntitlement::new(Tier::Core);
        let core_ctx = RequestContext::new("u1", &core);
        assert!(get_reminder_settings(&db, &core_ctx).unwrap().is_none());

        let anon = RequestContext::anonymous(&pro);
        assert!(matches!(
            get_reminder_settings(&db, &anon),
            Err(Error::NotAuthenticated)
        ));
    }
}
