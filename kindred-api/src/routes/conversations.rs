use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use kindred_shared::errors::{AppError, AppResult};
use kindred_shared::types::ApiResponse;

use crate::models::{Id, Message, MessageType};
use crate::routes::{parse_body, required};
use crate::services::match_service::{self, ConversationSummary};
use crate::services::messaging_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConversationsQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<Id>,
    #[serde(rename = "conversationId")]
    pub conversation_id: Option<Id>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub user_id: Id,
    pub conversation_id: Option<Id>,
    pub match_id: Option<Id>,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct SentMessageResponse {
    pub message: Message,
    #[serde(rename = "conversationId")]
    pub conversation_id: Id,
}

/// GET /api/conversations?userId=&conversationId= (messages) or ?userId= (list)
pub async fn get_conversations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConversationsQuery>,
) -> AppResult<Response> {
    let user_id = required(query.user_id, "userId")?;

    if let Some(conversation_id) = query.conversation_id {
        messaging_service::conversation_for_participant(&state.store, conversation_id, user_id).await?;
        let messages = messaging_service::list_messages(&state.store, conversation_id).await?;
        return Ok(Json(ApiResponse::ok(MessagesResponse { messages })).into_response());
    }

    let conversations = match_service::list_conversations_for_user(&state.store, user_id).await?;
    Ok(Json(ApiResponse::ok(ConversationsResponse { conversations })).into_response())
}

/// POST /api/conversations - send into a conversation, or into a match's
/// conversation which is created on first use.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<Json<ApiResponse<SentMessageResponse>>> {
    let req: SendMessageRequest = parse_body(&body)?;

    let message = match (req.conversation_id, req.match_id) {
        (Some(conversation_id), _) => {
            messaging_service::send_message(
                &state.store,
                conversation_id,
                req.user_id,
                &req.content,
                req.message_type,
            )
            .await?
        }
        (None, Some(match_id)) => {
            let (_, message) = messaging_service::send_message_for_match(
                &state.store,
                match_id,
                req.user_id,
                &req.content,
                req.message_type,
            )
            .await?;
            message
        }
        (None, None) => {
            return Err(AppError::Validation("conversationId or matchId is required".into()));
        }
    };

    let conversation_id = message.conversation_id;
    Ok(Json(ApiResponse::ok(SentMessageResponse { message, conversation_id })))
}
