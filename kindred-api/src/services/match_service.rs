use std::cmp::Ordering;

use chrono::Utc;
use serde::Serialize;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{canonical_pair, Conversation, DocStore, Document, Id, Match, Message, Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    NoConversation,
    NoMessages,
}

/// Preview of the matched partner. `id` is the profile id, the same id the
/// conversation list reports for that partner.
#[derive(Debug, Clone, Serialize)]
pub struct OtherUser {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    #[serde(flatten)]
    pub match_record: Match,
    #[serde(rename = "otherUser")]
    pub other_user: OtherUser,
    pub status: QueueStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchedProfile {
    pub match_record: Match,
    pub profile: Profile,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    #[serde(rename = "otherUser")]
    pub other_user: Option<Profile>,
    #[serde(rename = "lastMessage")]
    pub last_message: Option<Message>,
}

/// Appends a match for the unordered pair unless an active one already exists.
pub(crate) fn insert_match(doc: &mut Document, a: Id, b: Id) -> Option<Match> {
    if doc.active_match_for_pair(a, b).is_some() {
        return None;
    }
    let (user1_id, user2_id) = canonical_pair(a, b);
    let record = Match {
        id: doc.next_id(),
        user1_id,
        user2_id,
        created_at: Utc::now(),
        is_active: true,
    };
    doc.matches.push(record.clone());
    Some(record)
}

/// `None` when the pair is already matched.
pub async fn create_match(store: &DocStore, a: Id, b: Id) -> AppResult<Option<Match>> {
    if a == b {
        return Err(AppError::Validation("a user cannot match with themselves".into()));
    }

    let created = store
        .transaction(|doc| Ok::<_, AppError>(insert_match(doc, a, b)))
        .await?;

    if let Some(m) = &created {
        metrics::counter!("matches_created_total").increment(1);
        tracing::info!(match_id = m.id, user1_id = m.user1_id, user2_id = m.user2_id, "match created");
    }
    Ok(created)
}

/// Active matches with the other user's current profile, newest first.
pub async fn list_matches_for_user(store: &DocStore, user_id: Id) -> AppResult<Vec<MatchedProfile>> {
    let mut matched = store
        .read(|doc| {
            doc.matches
                .iter()
                .filter(|m| m.is_active && m.involves(user_id))
                .filter_map(|m| {
                    let profile = doc.latest_profile(m.other_user(user_id))?;
                    Some(MatchedProfile {
                        match_record: m.clone(),
                        profile: profile.clone(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .await?;

    matched.sort_by(|a, b| {
        b.match_record
            .created_at
            .cmp(&a.match_record.created_at)
            .then(b.match_record.id.cmp(&a.match_record.id))
    });
    Ok(matched)
}

/// Matches still waiting for a first conversation or a first message.
pub async fn get_match_queue(store: &DocStore, user_id: Id) -> AppResult<Vec<QueueEntry>> {
    let queue = store.read(|doc| match_queue(doc, user_id)).await?;
    tracing::debug!(user_id, queued = queue.len(), "match queue built");
    Ok(queue)
}

fn match_queue(doc: &Document, user_id: Id) -> Vec<QueueEntry> {
    doc.matches
        .iter()
        .filter(|m| m.is_active && m.involves(user_id))
        .filter_map(|m| {
            let status = match doc.conversation_for_match(m.id) {
                None => QueueStatus::NoConversation,
                Some(c) if doc.message_count(c.id) == 0 => QueueStatus::NoMessages,
                Some(_) => return None,
            };

            let other_id = m.other_user(user_id);
            let profile = doc.latest_profile(other_id)?;
            Some(QueueEntry {
                match_record: m.clone(),
                other_user: OtherUser {
                    id: profile.id,
                    user_id: other_id,
                    name: profile.name.clone(),
                    photos: profile.photos.clone(),
                },
                status,
            })
        })
        .collect()
}

pub async fn get_or_create_conversation_for_match(store: &DocStore, match_id: Id) -> AppResult<Conversation> {
    let (conversation, created) = store
        .transaction(|doc| conversation_for_match(doc, match_id))
        .await?;

    if created {
        tracing::info!(conversation_id = conversation.id, match_id, "conversation created");
    }
    Ok(conversation)
}

/// Returns the match's conversation, creating it when absent. The flag is
/// true when a new row was written.
pub(crate) fn conversation_for_match(doc: &mut Document, match_id: Id) -> AppResult<(Conversation, bool)> {
    let Some(record) = doc.matches.iter().find(|m| m.id == match_id && m.is_active).cloned() else {
        return Err(AppError::new(ErrorCode::MatchNotFound, "match not found"));
    };

    if let Some(existing) = doc.conversation_for_match(match_id) {
        return Ok((existing.clone(), false));
    }

    let conversation = Conversation {
        id: doc.next_id(),
        match_id,
        participants: vec![record.user1_id, record.user2_id],
        last_message_id: None,
        last_message_at: None,
        created_at: Utc::now(),
        is_active: true,
    };
    doc.conversations.push(conversation.clone());
    Ok((conversation, true))
}

/// Active conversations of the user, most recent activity first; silent
/// conversations go last.
pub async fn list_conversations_for_user(store: &DocStore, user_id: Id) -> AppResult<Vec<ConversationSummary>> {
    let mut summaries = store
        .read(|doc| {
            doc.conversations
                .iter()
                .filter(|c| c.is_active && c.has_participant(user_id))
                .map(|c| ConversationSummary {
                    conversation: c.clone(),
                    other_user: c
                        .other_participant(user_id)
                        .and_then(|other| doc.latest_profile(other))
                        .cloned(),
                    last_message: c
                        .last_message_id
                        .and_then(|id| doc.messages.iter().find(|m| m.id == id))
                        .cloned(),
                })
                .collect::<Vec<_>>()
        })
        .await?;

    summaries.sort_by(|a, b| {
        match (a.conversation.last_message_at, b.conversation.last_message_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwipePolicy;
    use crate::models::{ActionType, Gender, LookingFor, ProfileGender};
    use crate::services::testing::{discoverable_user, signup};
    use crate::services::{messaging_service, swipe_service};

    async fn matched_pair(store: &DocStore) -> (Id, Id, Match) {
        let x = discoverable_user(store, "x@x.com", Gender::Male, ProfileGender::Male, LookingFor::Female).await;
        let y = discoverable_user(store, "y@x.com", Gender::Female, ProfileGender::Female, LookingFor::Male).await;
        swipe_service::record_swipe(store, x, y, ActionType::Like, SwipePolicy::Reject).await.unwrap();
        let outcome = swipe_service::record_swipe(store, y, x, ActionType::Like, SwipePolicy::Reject)
            .await
            .unwrap();
        (x, y, outcome.new_match.unwrap())
    }

    #[tokio::test]
    async fn create_match_is_idempotent_for_the_pair() {
        let store = DocStore::ephemeral();
        let a = signup(&store, "a@x.com", Gender::Male).await;
        let b = signup(&store, "b@x.com", Gender::Female).await;

        let first = create_match(&store, b, a).await.unwrap().unwrap();
        assert_eq!((first.user1_id, first.user2_id), (a.min(b), a.max(b)));
        assert!(create_match(&store, a, b).await.unwrap().is_none());
        assert!(create_match(&store, b, a).await.unwrap().is_none());
        assert_eq!(store.read(|doc| doc.matches.len()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn queue_tracks_conversation_progress() {
        let store = DocStore::ephemeral();
        let (x, y, m) = matched_pair(&store).await;

        let queue = get_match_queue(&store, x).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].other_user.user_id, y);
        assert_eq!(queue[0].status, QueueStatus::NoConversation);

        let conversation = get_or_create_conversation_for_match(&store, m.id).await.unwrap();
        let queue = get_match_queue(&store, y).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].other_user.user_id, x);
        assert_eq!(queue[0].status, QueueStatus::NoMessages);

        messaging_service::send_message(&store, conversation.id, x, "hi", Default::default())
            .await
            .unwrap();
        assert!(get_match_queue(&store, x).await.unwrap().is_empty());
        assert!(get_match_queue(&store, y).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn queue_drops_matches_without_profile() {
        let store = DocStore::ephemeral();
        let a = signup(&store, "a@x.com", Gender::Male).await;
        let b = signup(&store, "b@x.com", Gender::Female).await;
        create_match(&store, a, b).await.unwrap();

        assert!(get_match_queue(&store, a).await.unwrap().is_empty());
        assert!(list_matches_for_user(&store, a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn queue_entry_shape() {
        let store = DocStore::ephemeral();
        let (x, y, m) = matched_pair(&store).await;

        let queue = get_match_queue(&store, x).await.unwrap();
        let value = serde_json::to_value(&queue[0]).unwrap();
        assert_eq!(value["id"], m.id);
        assert_eq!(value["is_active"], true);
        assert_eq!(value["otherUser"]["user_id"], y);
        assert!(value["otherUser"]["photos"].is_array());
        assert_eq!(value["status"], "no_conversation");
    }

    #[tokio::test]
    async fn queue_and_conversations_agree_on_partner_id() {
        let store = DocStore::ephemeral();
        let (x, y, m) = matched_pair(&store).await;
        get_or_create_conversation_for_match(&store, m.id).await.unwrap();

        let queue = get_match_queue(&store, x).await.unwrap();
        let conversations = list_conversations_for_user(&store, x).await.unwrap();
        let partner = conversations[0].other_user.as_ref().unwrap();

        assert_eq!(queue[0].status, QueueStatus::NoMessages);
        assert_eq!(queue[0].other_user.id, partner.id);
        assert_eq!(queue[0].other_user.user_id, partner.user_id);
        assert_eq!(partner.user_id, y);
        assert_ne!(partner.id, y);
    }

    #[tokio::test]
    async fn conversation_is_created_once() {
        let store = DocStore::ephemeral();
        let (x, y, m) = matched_pair(&store).await;

        let first = get_or_create_conversation_for_match(&store, m.id).await.unwrap();
        let second = get_or_create_conversation_for_match(&store, m.id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.participants, vec![x.min(y), x.max(y)]);
        assert!(first.last_message_id.is_none());
        assert_eq!(store.read(|doc| doc.conversations.len()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_match_has_no_conversation() {
        let store = DocStore::ephemeral();
        let err = get_or_create_conversation_for_match(&store, 77).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::MatchNotFound));
    }

    #[tokio::test]
    async fn conversations_sort_by_last_activity() {
        let store = DocStore::ephemeral();
        let (x, _y, m) = matched_pair(&store).await;
        let z = discoverable_user(&store, "z@x.com", Gender::Female, ProfileGender::Female, LookingFor::Male).await;
        let second = create_match(&store, x, z).await.unwrap().unwrap();

        let quiet = get_or_create_conversation_for_match(&store, m.id).await.unwrap();
        let busy = get_or_create_conversation_for_match(&store, second.id).await.unwrap();
        messaging_service::send_message(&store, busy.id, z, "hello", Default::default())
            .await
            .unwrap();

        let list = list_conversations_for_user(&store, x).await.unwrap();
        let ids: Vec<Id> = list.iter().map(|c| c.conversation.id).collect();
        assert_eq!(ids, vec![busy.id, quiet.id]);
        assert_eq!(list[0].other_user.as_ref().map(|p| p.user_id), Some(z));
        assert_eq!(list[0].last_message.as_ref().map(|msg| msg.content.as_str()), Some("hello"));
        assert!(list[1].last_message.is_none());
    }

    #[tokio::test]
    async fn matches_list_newest_first() {
        let store = DocStore::ephemeral();
        let (x, y, _) = matched_pair(&store).await;
        let z = discoverable_user(&store, "z@x.com", Gender::Female, ProfileGender::Female, LookingFor::Male).await;
        create_match(&store, x, z).await.unwrap();

        let others: Vec<Id> = list_matches_for_user(&store, x)
            .await
            .unwrap()
            .iter()
            .map(|m| m.profile.user_id)
            .collect();
        assert_eq!(others, vec![z, y]);
    }
}
