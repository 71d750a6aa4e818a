use chrono::Utc;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Conversation, DocStore, Document, Id, Message, MessageType};
use crate::services::match_service;

pub async fn send_message(
    store: &DocStore,
    conversation_id: Id,
    sender_id: Id,
    content: &str,
    message_type: MessageType,
) -> AppResult<Message> {
    let message = store
        .transaction(|doc| append_message(doc, conversation_id, sender_id, content, message_type))
        .await?;

    record_sent(&message);
    Ok(message)
}

/// Sends into the match's conversation, creating it first when needed. A
/// rejected send leaves no conversation behind.
pub async fn send_message_for_match(
    store: &DocStore,
    match_id: Id,
    sender_id: Id,
    content: &str,
    message_type: MessageType,
) -> AppResult<(Conversation, Message)> {
    let (conversation, message, created) = store
        .transaction(|doc| {
            let (conversation, created) = match_service::conversation_for_match(doc, match_id)?;
            let message = append_message(doc, conversation.id, sender_id, content, message_type)?;
            Ok::<_, AppError>((conversation, message, created))
        })
        .await?;

    if created {
        tracing::info!(conversation_id = conversation.id, match_id, "conversation created");
    }
    record_sent(&message);
    Ok((conversation, message))
}

fn append_message(
    doc: &mut Document,
    conversation_id: Id,
    sender_id: Id,
    content: &str,
    message_type: MessageType,
) -> AppResult<Message> {
    let Some(conversation) = doc.conversations.iter().find(|c| c.id == conversation_id) else {
        return Err(AppError::new(ErrorCode::ConversationNotFound, "conversation not found"));
    };
    if !conversation.has_participant(sender_id) {
        return Err(AppError::new(
            ErrorCode::NotConversationMember,
            "sender is not a participant of this conversation",
        ));
    }
    if content.trim().is_empty() {
        return Err(AppError::new(ErrorCode::EmptyContent, "message content is empty"));
    }

    let message = Message {
        id: doc.next_id(),
        conversation_id,
        sender_id,
        content: content.to_string(),
        message_type,
        created_at: Utc::now(),
        is_read: false,
    };
    doc.messages.push(message.clone());

    if let Some(conversation) = doc.conversations.iter_mut().find(|c| c.id == conversation_id) {
        conversation.last_message_id = Some(message.id);
        conversation.last_message_at = Some(message.created_at);
    }
    Ok(message)
}

fn record_sent(message: &Message) {
    metrics::counter!("messages_sent_total", "type" => message.message_type.as_str()).increment(1);
    tracing::info!(
        message_id = message.id,
        conversation_id = message.conversation_id,
        sender_id = message.sender_id,
        "message sent"
    );
}

/// Chat order: oldest first.
pub async fn list_messages(store: &DocStore, conversation_id: Id) -> AppResult<Vec<Message>> {
    let mut messages = store
        .read(|doc| {
            doc.messages
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .cloned()
                .collect::<Vec<_>>()
        })
        .await?;

    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Ok(messages)
}

/// The conversation, if `user_id` takes part in it.
pub async fn conversation_for_participant(
    store: &DocStore,
    conversation_id: Id,
    user_id: Id,
) -> AppResult<Conversation> {
    let conversation = store
        .read(|doc| doc.conversations.iter().find(|c| c.id == conversation_id).cloned())
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ConversationNotFound, "conversation not found"))?;

    if !conversation.has_participant(user_id) {
        return Err(AppError::new(
            ErrorCode::NotConversationMember,
            "not a participant of this conversation",
        ));
    }
    Ok(conversation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwipePolicy;
    use crate::models::{ActionType, Gender};
    use crate::services::testing::signup;
    use crate::services::{match_service, swipe_service};

    struct Chat {
        x: Id,
        y: Id,
        match_id: Id,
    }

    async fn matched(store: &DocStore) -> Chat {
        let x = signup(store, "x@x.com", Gender::Male).await;
        let y = signup(store, "y@x.com", Gender::Female).await;
        swipe_service::record_swipe(store, x, y, ActionType::Like, SwipePolicy::Reject).await.unwrap();
        let outcome = swipe_service::record_swipe(store, y, x, ActionType::Like, SwipePolicy::Reject)
            .await
            .unwrap();
        Chat { x, y, match_id: outcome.new_match.unwrap().id }
    }

    #[tokio::test]
    async fn sent_message_comes_back_last() {
        let store = DocStore::ephemeral();
        let chat = matched(&store).await;
        let conversation = match_service::get_or_create_conversation_for_match(&store, chat.match_id)
            .await
            .unwrap();

        send_message(&store, conversation.id, chat.x, "hey", MessageType::Text).await.unwrap();
        let sent = send_message(&store, conversation.id, chat.y, "sticker:wave", MessageType::Sticker)
            .await
            .unwrap();

        let messages = list_messages(&store, conversation.id).await.unwrap();
        let last = messages.last().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(last.id, sent.id);
        assert_eq!(last.content, "sticker:wave");
        assert_eq!(last.message_type, MessageType::Sticker);
        assert!(!last.is_read);

        let pointer = store
            .read(|doc| doc.conversations[0].last_message_id)
            .await
            .unwrap();
        assert_eq!(pointer, Some(sent.id));
    }

    #[tokio::test]
    async fn outsiders_cannot_send() {
        let store = DocStore::ephemeral();
        let chat = matched(&store).await;
        let outsider = signup(&store, "o@x.com", Gender::Male).await;
        let conversation = match_service::get_or_create_conversation_for_match(&store, chat.match_id)
            .await
            .unwrap();

        let err = send_message(&store, conversation.id, outsider, "hi", MessageType::Text)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotConversationMember));

        let err = conversation_for_participant(&store, conversation.id, outsider)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotConversationMember));
    }

    #[tokio::test]
    async fn blank_content_is_rejected() {
        let store = DocStore::ephemeral();
        let chat = matched(&store).await;
        let conversation = match_service::get_or_create_conversation_for_match(&store, chat.match_id)
            .await
            .unwrap();

        let err = send_message(&store, conversation.id, chat.x, "   ", MessageType::Text)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::EmptyContent));
        assert!(list_messages(&store, conversation.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let store = DocStore::ephemeral();
        let err = send_message(&store, 5, 1, "hi", MessageType::Text).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ConversationNotFound));
    }

    #[tokio::test]
    async fn existence_then_membership_then_content() {
        let store = DocStore::ephemeral();
        let chat = matched(&store).await;
        let outsider = signup(&store, "o@x.com", Gender::Male).await;
        let conversation = match_service::get_or_create_conversation_for_match(&store, chat.match_id)
            .await
            .unwrap();

        let err = send_message(&store, 999, outsider, "  ", MessageType::Text)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ConversationNotFound));

        let err = send_message(&store, conversation.id, outsider, "  ", MessageType::Text)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotConversationMember));
    }

    #[tokio::test]
    async fn send_for_match_creates_conversation_lazily() {
        let store = DocStore::ephemeral();
        let chat = matched(&store).await;

        let (conversation, message) =
            send_message_for_match(&store, chat.match_id, chat.y, "first!", MessageType::Text)
                .await
                .unwrap();
        assert_eq!(message.conversation_id, conversation.id);

        let (again, _) = send_message_for_match(&store, chat.match_id, chat.x, "second", MessageType::Text)
            .await
            .unwrap();
        assert_eq!(again.id, conversation.id);
        assert_eq!(list_messages(&store, conversation.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejected_send_for_match_leaves_no_conversation() {
        let store = DocStore::ephemeral();
        let chat = matched(&store).await;

        let err = send_message_for_match(&store, chat.match_id, chat.x, "", MessageType::Text)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::EmptyContent));
        assert!(store.read(|doc| doc.conversations.is_empty()).await.unwrap());
    }
}
