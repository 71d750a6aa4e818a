use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use kindred_shared::errors::AppResult;
use kindred_shared::types::ApiResponse;

use crate::routes::matches::MatchesQuery;
use crate::routes::required;
use crate::services::match_service::{self, QueueEntry};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MatchQueueResponse {
    #[serde(rename = "matchQueue")]
    pub match_queue: Vec<QueueEntry>,
}

/// GET /api/match-queue?userId=
pub async fn get_match_queue(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MatchesQuery>,
) -> AppResult<Json<ApiResponse<MatchQueueResponse>>> {
    let user_id = required(query.user_id, "userId")?;
    let match_queue = match_service::get_match_queue(&state.store, user_id).await?;

    Ok(Json(ApiResponse::ok(MatchQueueResponse { match_queue })))
}
