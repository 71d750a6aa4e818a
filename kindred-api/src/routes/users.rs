use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use kindred_shared::errors::{AppError, AppResult};
use kindred_shared::types::ApiResponse;

use crate::models::{Id, Profile, PublicUser, VerificationStatus};
use crate::routes::parse_body;
use crate::services::user_service::{self, NewUser};
use crate::services::profile_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum UserAction {
    Create(NewUser),
    GetByWallet {
        #[serde(rename = "walletAddress")]
        wallet_address: String,
    },
    GetByEmail {
        email: String,
    },
    GetById {
        id: Id,
    },
    UpdateVerificationStatus {
        id: Id,
        status: VerificationStatus,
    },
    UpdateWalletInfo {
        id: Id,
        #[serde(alias = "walletAddress")]
        wallet_address: String,
        verification_status: Option<VerificationStatus>,
    },
    UpdateProfileCompleted {
        id: Id,
        completed: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct Changes {
    pub changes: usize,
}

#[derive(Debug, Serialize)]
pub struct UserWithProfile {
    pub user: PublicUser,
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub id: Option<Id>,
    #[serde(rename = "walletAddress")]
    pub wallet_address: Option<String>,
    pub email: Option<String>,
}

/// POST /api/users
pub async fn handle(State(state): State<Arc<AppState>>, body: Bytes) -> AppResult<Response> {
    let store = &state.store;

    let response = match parse_body::<UserAction>(&body)? {
        UserAction::Create(new_user) => {
            let user = user_service::create_user(store, new_user).await?;
            Json(ApiResponse::ok_with_message(user, "user created")).into_response()
        }
        UserAction::GetByWallet { wallet_address } => {
            let user = user_service::get_by_wallet(store, &wallet_address).await?;
            Json(ApiResponse::found_or(user, "user not found")).into_response()
        }
        UserAction::GetByEmail { email } => {
            let user = user_service::get_by_email(store, &email).await?;
            Json(ApiResponse::found_or(user, "user not found")).into_response()
        }
        UserAction::GetById { id } => {
            let user = user_service::get_by_id(store, id).await?;
            Json(ApiResponse::found_or(user, "user not found")).into_response()
        }
        UserAction::UpdateVerificationStatus { id, status } => {
            let changes = user_service::update_verification_status(store, id, status).await?;
            Json(ApiResponse::ok(Changes { changes })).into_response()
        }
        UserAction::UpdateWalletInfo { id, wallet_address, verification_status } => {
            let changes =
                user_service::attach_wallet_info(store, id, &wallet_address, verification_status).await?;
            Json(ApiResponse::ok(Changes { changes })).into_response()
        }
        UserAction::UpdateProfileCompleted { id, completed } => {
            let changes = user_service::update_profile_completed(store, id, completed).await?;
            Json(ApiResponse::ok(Changes { changes })).into_response()
        }
    };

    Ok(response)
}

/// GET /api/users?id= | ?walletAddress= | ?email=
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> AppResult<Response> {
    let store = &state.store;

    if let Some(id) = query.id {
        let found = match user_service::get_by_id(store, id).await? {
            Some(user) => {
                let profile = profile_service::get_latest_by_user_id(store, id).await?;
                Some(UserWithProfile { user, profile })
            }
            None => None,
        };
        return Ok(Json(ApiResponse::found_or(found, "user not found")).into_response());
    }

    let user = if let Some(wallet_address) = query.wallet_address.as_deref() {
        user_service::get_by_wallet(store, wallet_address).await?
    } else if let Some(email) = query.email.as_deref() {
        user_service::get_by_email(store, email).await?
    } else {
        return Err(AppError::Validation("id, walletAddress or email is required".into()));
    };

    Ok(Json(ApiResponse::found_or(user, "user not found")).into_response())
}
