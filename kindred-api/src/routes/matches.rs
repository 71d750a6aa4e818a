use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use kindred_shared::errors::AppResult;
use kindred_shared::types::ApiResponse;

use crate::models::{Id, Match, Profile};
use crate::routes::required;
use crate::services::match_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MatchesQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<Id>,
}

/// `matches[i]` pairs with `matchedProfiles[i]`.
#[derive(Debug, Serialize)]
pub struct MatchesResponse {
    pub matches: Vec<Match>,
    #[serde(rename = "matchedProfiles")]
    pub matched_profiles: Vec<Profile>,
}

/// GET /api/matches?userId=
pub async fn list_matches(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MatchesQuery>,
) -> AppResult<Json<ApiResponse<MatchesResponse>>> {
    let user_id = required(query.user_id, "userId")?;
    let matched = match_service::list_matches_for_user(&state.store, user_id).await?;

    let (matches, matched_profiles): (Vec<Match>, Vec<Profile>) = matched
        .into_iter()
        .map(|m| (m.match_record, m.profile))
        .unzip();

    Ok(Json(ApiResponse::ok(MatchesResponse { matches, matched_profiles })))
}
