use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use kindred_shared::errors::AppResult;
use kindred_shared::types::ApiResponse;

use crate::models::Id;
use crate::routes::parse_body;
use crate::services::verification_service::{
    self, FaceDetection, NewFaceVerification, NewWalletVerification,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum VerificationAction {
    CreateFaceVerification(NewFaceVerification),
    CreateWalletVerification(NewWalletVerification),
    /// Omitting `detection` runs the built-in simulation.
    VerifyFace {
        #[serde(rename = "userId")]
        user_id: Id,
        detection: Option<FaceDetection>,
    },
    VerifyWallet {
        #[serde(rename = "userId")]
        user_id: Id,
        #[serde(rename = "walletAddress")]
        wallet_address: String,
        #[serde(rename = "ethBalance")]
        eth_balance: Option<String>,
    },
}

/// POST /api/verification
pub async fn handle(State(state): State<Arc<AppState>>, body: Bytes) -> AppResult<Response> {
    let store = &state.store;

    let response = match parse_body::<VerificationAction>(&body)? {
        VerificationAction::CreateFaceVerification(input) => {
            let row = verification_service::create_face_verification(store, input).await?;
            Json(ApiResponse::ok(row)).into_response()
        }
        VerificationAction::CreateWalletVerification(input) => {
            let row = verification_service::create_wallet_verification(store, input).await?;
            Json(ApiResponse::ok(row)).into_response()
        }
        VerificationAction::VerifyFace { user_id, detection } => {
            let outcome = verification_service::complete_face_verification(
                store,
                user_id,
                detection,
                state.config.face_min_confidence,
            )
            .await?;
            Json(ApiResponse::ok(outcome)).into_response()
        }
        VerificationAction::VerifyWallet { user_id, wallet_address, eth_balance } => {
            let user = verification_service::complete_wallet_verification(
                store,
                user_id,
                &wallet_address,
                eth_balance,
            )
            .await?;
            Json(ApiResponse::ok(user)).into_response()
        }
    };

    Ok(response)
}
