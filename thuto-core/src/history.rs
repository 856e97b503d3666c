//! Conversation history, session history and the companion catalogue.
//!
//! Writes need only an identity. Reading transcripts and live statistics
//! needs [`Capability::ConversationHistory`].

use uuid::Uuid;

use crate::analytics::{compute_stats, ConversationStats};
use crate::db::{CompanionFilter, ConversationFilter, RecordStore};
use crate::entitlement::{companion_limit, Capability, RequestContext};
use crate::error::{Error, Result};
use crate::types::{
    now_secs, Companion, ConversationRecord, NewCompanion, NewConversation, SessionRecord,
};

// ============================================
// Conversations
// ============================================

/// Save a finished call's transcript for the caller.
pub fn save_conversation(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    new: NewConversation,
) -> Result<ConversationRecord> {
    let user_id = ctx.user_id()?;

    if new.companion_id.trim().is_empty() {
        return Err(Error::Validation("companion id is required".to_string()));
    }

    let conversation = ConversationRecord {
        id: Uuid::new_v4().to_string(),
        session_id: new.session_id,
        companion_id: new.companion_id,
        user_id: user_id.to_string(),
        messages: new.messages,
        duration_seconds: new.duration_seconds,
        created_at: now_secs(),
    };
    store.insert_conversation(&conversation)?;

    tracing::info!(
        user_id,
        conversation_id = %conversation.id,
        companion_id = %conversation.companion_id,
        messages = conversation.messages.len(),
        "Saved conversation"
    );
    Ok(conversation)
}

/// One page of the caller's conversations, newest first. Pages are 1-based.
pub fn list_conversations(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    page: usize,
    limit: usize,
) -> Result<Vec<ConversationRecord>> {
    let user_id = ctx.require(Capability::ConversationHistory)?;
    store.list_conversations(&ConversationFilter::for_user(user_id).page(page, limit))
}

/// The caller's newest conversations with one companion.
pub fn companion_conversations(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    companion_id: &str,
    limit: usize,
) -> Result<Vec<ConversationRecord>> {
    let user_id = ctx.require(Capability::ConversationHistory)?;
    store.list_conversations(
        &ConversationFilter::for_user(user_id)
            .companion(companion_id)
            .limit(limit),
    )
}

/// One of the caller's conversations. Other users' conversations are `None`.
pub fn get_conversation(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    id: &str,
) -> Result<Option<ConversationRecord>> {
    let user_id = ctx.require(Capability::ConversationHistory)?;
    store.get_conversation(user_id, id)
}

/// Delete one of the caller's conversations. Returns whether it existed.
pub fn delete_conversation(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    id: &str,
) -> Result<bool> {
    let user_id = ctx.user_id()?;
    let removed = store.delete_conversation(user_id, id)?;
    if removed {
        tracing::info!(user_id, conversation_id = id, "Deleted conversation");
    }
    Ok(removed)
}

/// Live statistics over all of the caller's conversations.
pub fn get_conversation_stats(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
) -> Result<ConversationStats> {
    let user_id = ctx.require(Capability::ConversationHistory)?;
    let conversations = store.list_conversations(&ConversationFilter::for_user(user_id))?;
    Ok(compute_stats(&conversations))
}

// ============================================
// Sessions
// ============================================

/// Record a completed call in the caller's session history.
pub fn record_session(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    companion_id: &str,
    duration_seconds: Option<u32>,
) -> Result<SessionRecord> {
    let user_id = ctx.user_id()?;
    let session = SessionRecord {
        id: Uuid::new_v4().to_string(),
        companion_id: companion_id.to_string(),
        user_id: user_id.to_string(),
        duration_seconds,
        created_at: now_secs(),
    };
    store.insert_session(&session)?;
    Ok(session)
}

/// Companions from the caller's newest sessions, most recent first, each once.
///
/// Looks at up to `limit * 3` sessions; companions that no longer exist are
/// skipped.
pub fn recent_companions(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    limit: usize,
) -> Result<Vec<Companion>> {
    let user_id = ctx.user_id()?;
    let sessions = store.list_sessions(user_id, limit.saturating_mul(3))?;

    let mut companions: Vec<Companion> = Vec::new();
    for session in sessions {
        if companions.len() >= limit {
            break;
        }
        if companions.iter().any(|c| c.id == session.companion_id) {
            continue;
        }
        if let Some(companion) = get_companion(store, &session.companion_id) {
            companions.push(companion);
        }
    }
    Ok(companions)
}

// ============================================
// Companions
// ============================================

/// Look up a companion. Store failures are logged and read as "not found".
pub fn get_companion(store: &dyn RecordStore, id: &str) -> Option<Companion> {
    match store.get_companion(id) {
        Ok(companion) => companion,
        Err(e) => {
            tracing::warn!(companion_id = id, error = %e, "Companion lookup failed");
            None
        }
    }
}

/// Search the shared companion catalogue.
pub fn search_companions(store: &dyn RecordStore, filter: &CompanionFilter) -> Result<Vec<Companion>> {
    store.list_companions(filter)
}

/// Whether the caller may author another companion.
pub fn can_create_companion(store: &dyn RecordStore, ctx: &RequestContext<'_>) -> Result<bool> {
    let user_id = ctx.user_id()?;
    match companion_limit(ctx.entitlement()) {
        None => Ok(true),
        Some(limit) => Ok(store.count_companions_by_author(user_id)? < limit),
    }
}

/// Create a companion authored by the caller, enforcing the plan's limit.
pub fn create_companion(
    store: &dyn RecordStore,
    ctx: &RequestContext<'_>,
    new: NewCompanion,
) -> Result<Companion> {
    let user_id = ctx.user_id()?;

    if new.name.trim().is_empty() {
        return Err(Error::Validation("companion name is required".to_string()));
    }
    if new.topic.trim().is_empty() {
        return Err(Error::Validation("companion topic is required".to_string()));
    }
    if new.expected_duration_minutes == 0 {
        return Err(Error::Validation(
            "expected duration must be at least 1 minute".to_string(),
        ));
    }

    if !can_create_companion(store, ctx)? {
        tracing::debug!(user_id, "Companion limit reached");
        return Err(Error::AccessDenied {
            capability: Capability::AdditionalCompanions,
        });
    }

    let companion = Companion {
        id: Uuid::new_v4().to_string(),
        name: new.name.trim().to_string(),
        subject: new.subject,
        topic: new.topic.trim().to_string(),
        expected_duration_minutes: new.expected_duration_minutes,
        voice: new.voice,
        style: new.style,
        author_id: user_id.to_string(),
        created_at: now_secs(),
    };
    store.insert_companion(&companion)?;

    tracing::info!(user_id, companion_id = %companion.id, "Created companion");
    Ok(companion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::entitlement::{PlanEntitlement, Tier};
    use crate::types::{Role, Subject, TeachingStyle, TranscriptMessage, Voice};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn new_companion(name: &str) -> NewCompanion {
        NewCompanion {
            name: name.to_string(),
            subject: Subject::Science,
            topic: "The water cycle".to_string(),
            expected_duration_minutes: 15,
            voice: Voice::Male,
            style: TeachingStyle::Formal,
        }
    }

    fn new_conversation(companion_id: &str, duration: u32) -> NewConversation {
        NewConversation {
            session_id: Uuid::new_v4().to_string(),
            companion_id: companion_id.to_string(),
            messages: vec![TranscriptMessage {
                role: Role::Assistant,
                content: "Welcome back!".to_string(),
            }],
            duration_seconds: Some(duration),
        }
    }

    #[test]
    fn test_save_requires_identity() {
        let db = test_db();
        let free = PlanEntitlement::new(Tier::Free);
        let anon = RequestContext::anonymous(&free);

        let result = save_conversation(&db, &anon, new_conversation("comp-1", 60));
        assert!(matches!(result, Err(Error::NotAuthenticated)));
    }

    #[test]
    fn test_history_reads_are_gated() {
        let db = test_db();
        let free = PlanEntitlement::new(Tier::Free);
        let ctx = RequestContext::new("u1", &free);

        // Free users can still save; reading back needs Core/Pro
        save_conversation(&db, &ctx, new_conversation("comp-1", 60)).unwrap();
        assert!(matches!(
            list_conversations(&db, &ctx, 1, 20),
            Err(Error::AccessDenied { .. })
        ));
        assert!(matches!(
            get_conversation_stats(&db, &ctx),
            Err(Error::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_save_list_stats_delete() {
        let db = test_db();
        let core = PlanEntitlement::new(Tier::Core);
        let ctx = RequestContext::new("u1", &core);

        let first = save_conversation(&db, &ctx, new_conversation("comp-1", 600)).unwrap();
        save_conversation(&db, &ctx, new_conversation("comp-2", 300)).unwrap();
        save_conversation(&db, &ctx, new_conversation("comp-1", 0)).unwrap();

        assert_eq!(list_conversations(&db, &ctx, 1, 20).unwrap().len(), 3);
        assert_eq!(list_conversations(&db, &ctx, 2, 2).unwrap().len(), 1);
        assert_eq!(
            companion_conversations(&db, &ctx, "comp-1", 10).unwrap().len(),
            2
        );

        let stats = get_conversation_stats(&db, &ctx).unwrap();
        assert_eq!(stats.total_conversations, 3);
        assert_eq!(stats.total_duration_seconds, 900);
        assert_eq!(stats.average_duration_seconds, 300);
        assert_eq!(stats.unique_companions, 2);

        let fetched = get_conversation(&db, &ctx, &first.id).unwrap().unwrap();
        assert_eq!(fetched, first);

        assert!(delete_conversation(&db, &ctx, &first.id).unwrap());
        assert!(!delete_conversation(&db, &ctx, &first.id).unwrap());
        assert_eq!(get_conversation_stats(&db, &ctx).unwrap().total_conversations, 2);
    }

    #[test]
    fn test_other_users_conversations_invisible() {
        let db = test_db();
        let core = PlanEntitlement::new(Tier::Core);
        let alice = RequestContext::new("alice", &core);
        let bob = RequestContext::new("bob", &core);

        let saved = save_conversation(&db, &alice, new_conversation("comp-1", 600)).unwrap();

        assert!(get_conversation(&db, &bob, &saved.id).unwrap().is_none());
        assert!(!delete_conversation(&db, &bob, &saved.id).unwrap());
        assert_eq!(get_conversation_stats(&db, &bob).unwrap().total_conversations, 0);
    }

    #[test]
    fn test_companion_limit_enforced() {
        let db = test_db();
        let free = PlanEntitlement::new(Tier::Free);
        let ctx = RequestContext::new("u1", &free);

        for i in 0..3 {
            create_companion(&db, &ctx, new_companion(&format!("Tutor {}", i))).unwrap();
        }
        assert!(!can_create_companion(&db, &ctx).unwrap());
        assert!(matches!(
            create_companion(&db, &ctx, new_companion("One too many")),
            Err(Error::AccessDenied {
                capability: Capability::AdditionalCompanions
            })
        ));

        let pro = PlanEntitlement::new(Tier::Pro);
        let pro_ctx = RequestContext::new("u1", &pro);
        assert!(can_create_companion(&db, &pro_ctx).unwrap());
    }

    #[test]
    fn test_create_companion_validation() {
        let db = test_db();
        let pro = PlanEntitlement::new(Tier::Pro);
        let ctx = RequestContext::new("u1", &pro);

        let mut bad = new_companion("  ");
        assert!(matches!(
            create_companion(&db, &ctx, bad.clone()),
            Err(Error::Validation(_))
        ));

        bad.name = "Neura".to_string();
        bad.expected_duration_minutes = 0;
        assert!(matches!(
            create_companion(&db, &ctx, bad),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_recent_companions_deduplicated() {
        let db = test_db();
        let pro = PlanEntitlement::new(Tier::Pro);
        let ctx = RequestContext::new("u1", &pro);

        let a = create_companion(&db, &ctx, new_companion("A")).unwrap();
        let b = create_companion(&db, &ctx, new_companion("B")).unwrap();

        for (id, companion, second) in [
            ("s1", &a, 1),
            ("s2", &b, 2),
            ("s3", &a, 3),
            ("s4", &b, 4),
        ] {
            db.insert_session(&SessionRecord {
                id: id.to_string(),
                companion_id: companion.id.clone(),
                user_id: "u1".to_string(),
                duration_seconds: None,
                created_at: chrono::DateTime::from_timestamp(1_700_000_000 + second, 0).unwrap(),
            })
            .unwrap();
        }
        db.insert_session(&SessionRecord {
            id: "s5".to_string(),
            companion_id: "deleted".to_string(),
            user_id: "u1".to_string(),
            duration_seconds: None,
            created_at: chrono::DateTime::from_timestamp(1_700_000_010, 0).unwrap(),
        })
        .unwrap();

        let recent = recent_companions(&db, &ctx, 5).unwrap();
        let names: Vec<&str> = recent.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);

        assert_eq!(recent_companions(&db, &ctx, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_get_companion_swallows_storage_errors() {
        let db = test_db();
        db.connection()
            .unwrap()
            .execute("DROP TABLE companions", [])
            .unwrap();

        assert!(get_companion(&db, "comp-1").is_none());
    }
}
