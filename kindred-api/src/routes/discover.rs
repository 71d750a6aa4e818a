use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use kindred_shared::errors::AppResult;
use kindred_shared::types::ApiResponse;

use crate::models::{ActionType, Id, LookingFor, Match, Profile, SwipeAction};
use crate::routes::{parse_body, required};
use crate::services::swipe_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<Id>,
    /// Overrides the viewer's own `looking_for`.
    pub preference: Option<LookingFor>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum DiscoverAction {
    Swipe {
        #[serde(rename = "userId")]
        user_id: Id,
        #[serde(rename = "targetUserId")]
        target_user_id: Id,
        #[serde(rename = "actionType")]
        action_type: ActionType,
    },
}

#[derive(Debug, Serialize)]
pub struct SwipeResponse {
    #[serde(rename = "isMatch")]
    pub is_match: bool,
    pub swipe: SwipeAction,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub new_match: Option<Match>,
}

/// GET /api/discover?userId=
pub async fn candidates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DiscoverQuery>,
) -> AppResult<Json<ApiResponse<Vec<Profile>>>> {
    let user_id = required(query.user_id, "userId")?;
    let profiles = swipe_service::list_candidates(
        &state.store,
        user_id,
        query.preference,
        state.config.discover_batch_size,
    )
    .await?;

    Ok(Json(ApiResponse::ok(profiles)))
}

/// POST /api/discover - `swipe`
pub async fn swipe(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<Json<ApiResponse<SwipeResponse>>> {
    let DiscoverAction::Swipe { user_id, target_user_id, action_type } = parse_body::<DiscoverAction>(&body)?;

    let outcome = swipe_service::record_swipe(
        &state.store,
        user_id,
        target_user_id,
        action_type,
        state.config.swipe_policy,
    )
    .await?;

    Ok(Json(ApiResponse::ok(SwipeResponse {
        is_match: outcome.is_match,
        swipe: outcome.swipe,
        new_match: outcome.new_match,
    })))
}
