use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};
use kindred_shared::types::ApiResponse;

use crate::models::{Gender, Id, PublicUser};
use crate::routes::parse_body;
use crate::services::user_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum AuthAction {
    Signup(SignupRequest),
    Login(LoginRequest),
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    pub gender: Gender,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    #[serde(rename = "userId")]
    pub user_id: Id,
    pub user: PublicUser,
}

/// POST /api/auth - `signup` or `login`
pub async fn handle(State(state): State<Arc<AppState>>, body: Bytes) -> AppResult<Response> {
    match parse_body::<AuthAction>(&body)? {
        AuthAction::Signup(req) => {
            req.validate()?;
            let user = user_service::create_user_with_email_password(
                &state.store,
                &req.email,
                &req.password,
                &req.first_name,
                req.gender,
            )
            .await?;

            let response = SignupResponse { user_id: user.id, user };
            Ok(Json(ApiResponse::ok_with_message(response, "user created")).into_response())
        }
        AuthAction::Login(req) => {
            req.validate()?;
            let user = user_service::authenticate(&state.store, &req.email, &req.password)
                .await?
                .ok_or_else(|| AppError::new(ErrorCode::InvalidCredentials, "invalid email or password"))?;

            Ok(Json(ApiResponse::ok(user)).into_response())
        }
    }
}
