//! Live conversation statistics.
//!
//! Always recomputed from the current conversation set; never cached.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::ConversationRecord;

/// Aggregate totals over a user's conversations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_conversations: u64,
    pub total_duration_seconds: u64,
    pub average_duration_seconds: u64,
    pub unique_companions: u64,
}

impl ConversationStats {
    /// Total time as hours with one decimal (e.g. 2.5)
    pub fn total_hours(&self) -> f64 {
        round_tenths(self.total_duration_seconds as f64 / 3600.0)
    }

    /// Average session length in whole minutes
    pub fn average_minutes(&self) -> u64 {
        round_div(self.average_duration_seconds, 60)
    }
}

/// Compute stats over any set of conversations. Empty input yields all zeros.
pub fn compute_stats<'a, I>(conversations: I) -> ConversationStats
where
    I: IntoIterator<Item = &'a ConversationRecord>,
{
    let mut total_conversations = 0u64;
    let mut total_duration_seconds = 0u64;
    let mut companions = HashSet::new();

    for conversation in conversations {
        total_conversations += 1;
        total_duration_seconds += conversation.duration_or_zero();
        companions.insert(conversation.companion_id.as_str());
    }

    let average_duration_seconds = if total_conversations > 0 {
        round_div(total_duration_seconds, total_conversations)
    } else {
        0
    };

    ConversationStats {
        total_conversations,
        total_duration_seconds,
        average_duration_seconds,
        unique_companions: companions.len() as u64,
    }
}

/// `num / den` rounded half up. `den` must be non-zero.
pub(crate) fn round_div(num: u64, den: u64) -> u64 {
    (2 * num + den) / (2 * den)
}

/// Round to one decimal place, for display values.
pub(crate) fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::now_secs;

    fn conversation(companion: &str, duration: Option<u32>) -> ConversationRecord {
        ConversationRecord {
            id: format!("{}-{:?}", companion, duration),
            session_id: "s".to_string(),
            companion_id: companion.to_string(),
            user_id: "u1".to_string(),
            messages: vec![],
            duration_seconds: duration,
            created_at: now_secs(),
        }
    }

    #[test]
    fn test_empty_is_all_zero() {
        let stats = compute_stats(&Vec::<ConversationRecord>::new());
        assert_eq!(stats, ConversationStats::default());
        assert_eq!(stats.total_hours(), 0.0);
    }

    #[test]
    fn test_totals_and_average() {
        let conversations = vec![
            conversation("a", Some(600)),
            conversation("b", Some(301)),
            conversation("a", None),
        ];
        let stats = compute_stats(&conversations);

        assert_eq!(stats.total_conversations, 3);
        assert_eq!(stats.total_duration_seconds, 901);
        // 300.33 rounds down
        assert_eq!(stats.average_duration_seconds, 300);
        assert_eq!(stats.unique_companions, 2);
    }

    #[test]
    fn test_round_div_half_up() {
        assert_eq!(round_div(5, 2), 3);
        assert_eq!(round_div(1800 * 100, 5400), 33);
        assert_eq!(round_div(2, 3), 1);
        assert_eq!(round_div(1, 3), 0);
    }

    #[test]
    fn test_display_helpers() {
        let stats = ConversationStats {
            total_conversations: 4,
            total_duration_seconds: 9000,
            average_duration_seconds: 2250,
            unique_companions: 1,
        };
        assert_eq!(stats.total_hours(), 2.5);
        assert_eq!(stats.average_minutes(), 38);
    }
}
