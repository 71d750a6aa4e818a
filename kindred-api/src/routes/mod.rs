pub mod auth;
pub mod conversations;
pub mod discover;
pub mod health;
pub mod match_queue;
pub mod matches;
pub mod profiles;
pub mod users;
pub mod verification;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use kindred_shared::errors::{AppError, AppResult};

/// Decodes a JSON body, usually an `action`-tagged request. Malformed JSON,
/// an unknown action or a missing field all surface as a validation error.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| AppError::Validation(e.to_string()))
}

pub(crate) fn required<T>(value: Option<T>, name: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::Validation(format!("{name} is required")))
}
