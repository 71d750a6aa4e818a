use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use kindred_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    DocStore, Document, FaceVerification, Gender, Id, PublicUser, User, VerificationStatus,
    VerificationType, WalletVerification,
};
use crate::services::user_service;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewFaceVerification {
    pub user_id: Id,
    pub face_token: Option<String>,
    pub confidence_score: Option<f64>,
    pub verification_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWalletVerification {
    pub user_id: Id,
    pub wallet_address: String,
    pub signature: Option<String>,
    pub nonce: Option<String>,
    pub eth_balance: Option<String>,
    pub verification_data: Option<serde_json::Value>,
}

/// Result of a face-attribute inference, supplied by the client or simulated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetection {
    pub face_detected: bool,
    pub gender: Option<Gender>,
    pub confidence: f64,
}

impl FaceDetection {
    /// Stand-in for the external detector: a face is found 98% of the time,
    /// gender is a coin flip and confidence lands in 80..100.
    pub fn simulate<R: Rng>(rng: &mut R) -> Self {
        let face_detected = rng.gen_bool(0.98);
        if !face_detected {
            return Self { face_detected, gender: None, confidence: 0.0 };
        }
        let gender = if rng.gen_bool(0.5) { Gender::Female } else { Gender::Male };
        Self {
            face_detected,
            gender: Some(gender),
            confidence: rng.gen_range(80.0..100.0),
        }
    }

    pub fn passes(&self, min_confidence: f64) -> bool {
        self.face_detected && self.gender == Some(Gender::Female) && self.confidence >= min_confidence
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FaceVerificationOutcome {
    pub user: PublicUser,
    pub passed: bool,
    /// Absent when the user was already verified and nothing was evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<FaceDetection>,
}

pub async fn create_face_verification(
    store: &DocStore,
    input: NewFaceVerification,
) -> AppResult<FaceVerification> {
    let row = store
        .transaction(|doc| {
            require_user(doc, input.user_id)?;
            let row = FaceVerification {
                id: doc.next_id(),
                user_id: input.user_id,
                face_token: input.face_token,
                confidence_score: input.confidence_score,
                verification_data: input.verification_data,
                created_at: Utc::now(),
            };
            doc.face_verifications.push(row.clone());
            Ok::<_, AppError>(row)
        })
        .await?;

    tracing::info!(verification_id = row.id, user_id = row.user_id, "face verification recorded");
    Ok(row)
}

pub async fn create_wallet_verification(
    store: &DocStore,
    input: NewWalletVerification,
) -> AppResult<WalletVerification> {
    if input.wallet_address.trim().is_empty() {
        return Err(AppError::Validation("wallet_address is required".into()));
    }

    let row = store
        .transaction(|doc| {
            require_user(doc, input.user_id)?;
            let row = WalletVerification {
                id: doc.next_id(),
                user_id: input.user_id,
                wallet_address: input.wallet_address,
                signature: input.signature,
                nonce: input.nonce,
                eth_balance: input.eth_balance,
                verification_data: input.verification_data,
                created_at: Utc::now(),
            };
            doc.wallet_verifications.push(row.clone());
            Ok::<_, AppError>(row)
        })
        .await?;

    tracing::info!(
        verification_id = row.id,
        user_id = row.user_id,
        wallet_address = %row.wallet_address,
        "wallet verification recorded"
    );
    Ok(row)
}

/// Runs the face check for a `face` user. A failed user is moved back to
/// pending before the new attempt; a verified user is returned as is.
pub async fn complete_face_verification(
    store: &DocStore,
    user_id: Id,
    detection: Option<FaceDetection>,
    min_confidence: f64,
) -> AppResult<FaceVerificationOutcome> {
    let detection = detection.unwrap_or_else(|| FaceDetection::simulate(&mut rand::thread_rng()));

    let outcome = store
        .transaction(|doc| {
            let user = require_user(doc, user_id)?;
            require_type(user, VerificationType::Face)?;
            if user.verification_status == VerificationStatus::Verified {
                return Ok::<_, AppError>(FaceVerificationOutcome {
                    user: PublicUser::from(user),
                    passed: true,
                    detection: None,
                });
            }

            let passed = detection.passes(min_confidence);
            let audit_id = doc.next_id();
            doc.face_verifications.push(FaceVerification {
                id: audit_id,
                user_id,
                face_token: None,
                confidence_score: Some(detection.confidence),
                verification_data: Some(serde_json::json!({
                    "gender_detected": detection.gender,
                    "face_detected": detection.face_detected,
                })),
                created_at: Utc::now(),
            });

            let user = doc
                .user_mut(user_id)
                .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;
            if user.verification_status == VerificationStatus::Failed {
                user_service::apply_status(user, VerificationStatus::Pending)?;
            }
            let next = if passed { VerificationStatus::Verified } else { VerificationStatus::Failed };
            user_service::apply_status(user, next)?;

            Ok(FaceVerificationOutcome {
                user: PublicUser::from(&*user),
                passed,
                detection: Some(detection),
            })
        })
        .await?;

    tracing::info!(
        user_id,
        passed = outcome.passed,
        status = outcome.user.verification_status.as_str(),
        "face verification completed"
    );
    Ok(outcome)
}

/// Links the wallet to a `wallet` user and marks them verified.
pub async fn complete_wallet_verification(
    store: &DocStore,
    user_id: Id,
    wallet_address: &str,
    eth_balance: Option<String>,
) -> AppResult<PublicUser> {
    if wallet_address.trim().is_empty() {
        return Err(AppError::Validation("wallet_address is required".into()));
    }

    let user = store
        .transaction(|doc| {
            require_type(require_user(doc, user_id)?, VerificationType::Wallet)?;
            user_service::attach_wallet(doc, user_id, wallet_address, None)?;

            let audit_id = doc.next_id();
            doc.wallet_verifications.push(WalletVerification {
                id: audit_id,
                user_id,
                wallet_address: wallet_address.to_string(),
                signature: None,
                nonce: None,
                eth_balance,
                verification_data: None,
                created_at: Utc::now(),
            });

            let user = doc
                .user_mut(user_id)
                .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;
            if user.verification_status == VerificationStatus::Failed {
                user_service::apply_status(user, VerificationStatus::Pending)?;
            }
            user_service::apply_status(user, VerificationStatus::Verified)?;
            Ok::<_, AppError>(PublicUser::from(&*user))
        })
        .await?;

    tracing::info!(user_id, wallet_address, "wallet verification completed");
    Ok(user)
}

fn require_user(doc: &Document, user_id: Id) -> AppResult<&User> {
    doc.user(user_id)
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))
}

fn require_type(user: &User, expected: VerificationType) -> AppResult<()> {
    if user.verification_type != expected {
        return Err(AppError::with_details(
            ErrorCode::VerificationTypeMismatch,
            "this verification method is not available for this user",
            serde_json::json!({ "verification_type": user.verification_type }),
        ));
    }
    Ok(())
}
