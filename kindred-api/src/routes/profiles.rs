use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use kindred_shared::errors::AppResult;
use kindred_shared::types::ApiResponse;

use crate::models::Id;
use crate::routes::users::Changes;
use crate::routes::{parse_body, required};
use crate::services::profile_service::{self, ProfileInput, ProfileUpdate};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum ProfileAction {
    Create {
        #[serde(alias = "userId")]
        user_id: Id,
        #[serde(flatten)]
        profile: ProfileInput,
    },
    Update {
        #[serde(rename = "userId", alias = "user_id")]
        user_id: Id,
        #[serde(flatten)]
        changes: ProfileUpdate,
    },
    GetByUserId {
        #[serde(rename = "userId", alias = "user_id")]
        user_id: Id,
    },
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<Id>,
}

/// POST /api/profiles
pub async fn handle(State(state): State<Arc<AppState>>, body: Bytes) -> AppResult<Response> {
    let store = &state.store;

    let response = match parse_body::<ProfileAction>(&body)? {
        ProfileAction::Create { user_id, profile } => {
            let profile = profile_service::create(store, user_id, profile).await?;
            Json(ApiResponse::ok_with_message(profile, "profile created")).into_response()
        }
        ProfileAction::Update { user_id, changes } => {
            let changes = profile_service::update(store, user_id, changes).await?;
            Json(ApiResponse::ok(Changes { changes })).into_response()
        }
        ProfileAction::GetByUserId { user_id } => {
            let profile = profile_service::get_latest_by_user_id(store, user_id).await?;
            Json(ApiResponse::found_or(profile, "profile not found")).into_response()
        }
    };

    Ok(response)
}

/// GET /api/profiles?userId=
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProfileQuery>,
) -> AppResult<Response> {
    let user_id = required(query.user_id, "userId")?;
    let profile = profile_service::get_latest_by_user_id(&state.store, user_id).await?;
    Ok(Json(ApiResponse::found_or(profile, "profile not found")).into_response())
}
