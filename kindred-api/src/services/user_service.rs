use chrono::Utc;
use serde::Deserialize;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    DocStore, Document, Gender, Id, PublicUser, User, VerificationStatus, VerificationType,
};
use crate::services::auth_service;

/// Attributes for the placeholder creation path used by the verification flows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub wallet_address: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<Gender>,
    pub verification_type: Option<VerificationType>,
    pub verification_status: Option<VerificationStatus>,
}

pub async fn create_user_with_email_password(
    store: &DocStore,
    email: &str,
    password: &str,
    first_name: &str,
    gender: Gender,
) -> AppResult<PublicUser> {
    create_user(
        store,
        NewUser {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            first_name: Some(first_name.to_string()),
            gender: Some(gender),
            ..NewUser::default()
        },
    )
    .await
}

pub async fn create_user(store: &DocStore, new_user: NewUser) -> AppResult<PublicUser> {
    // Hash outside the write lock.
    let password_hash = new_user.password.as_deref().map(auth_service::hash_password);

    let user = store
        .transaction(|doc| insert_user(doc, new_user, password_hash))
        .await?;

    tracing::info!(
        user_id = user.id,
        verification_type = ?user.verification_type,
        "user created"
    );

    Ok(PublicUser::from(&user))
}

fn insert_user(doc: &mut Document, new_user: NewUser, password_hash: Option<String>) -> AppResult<User> {
    let verification_type = new_user
        .verification_type
        .or(new_user.gender.map(VerificationType::from))
        .ok_or_else(|| AppError::Validation("gender or verification_type is required".into()))?;

    if let Some(email) = new_user.email.as_deref() {
        if doc.users.iter().any(|u| u.email.as_deref() == Some(email)) {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
        }
    }
    if let Some(wallet) = new_user.wallet_address.as_deref() {
        ensure_wallet_free(doc, wallet, None)?;
    }

    let now = Utc::now();
    let user = User {
        id: doc.next_id(),
        wallet_address: new_user.wallet_address,
        email: new_user.email,
        password_hash,
        first_name: new_user.first_name,
        gender: new_user.gender,
        verification_type,
        verification_status: new_user.verification_status.unwrap_or(VerificationStatus::Pending),
        profile_completed: false,
        created_at: now,
        updated_at: now,
    };
    doc.users.push(user.clone());
    Ok(user)
}

/// `None` when no user has that email or the password does not verify.
pub async fn authenticate(store: &DocStore, email: &str, password: &str) -> AppResult<Option<PublicUser>> {
    let user = store
        .read(|doc| doc.users.iter().find(|u| u.email.as_deref() == Some(email)).cloned())
        .await?;

    let Some(user) = user else {
        return Ok(None);
    };
    let Some(stored) = user.password_hash.as_deref() else {
        return Ok(None);
    };

    if auth_service::verify_password(password, stored)? {
        tracing::info!(user_id = user.id, "user authenticated");
        Ok(Some(PublicUser::from(&user)))
    } else {
        tracing::debug!(user_id = user.id, "password mismatch");
        Ok(None)
    }
}

pub async fn get_by_id(store: &DocStore, id: Id) -> AppResult<Option<PublicUser>> {
    Ok(store.read(|doc| doc.user(id).map(PublicUser::from)).await?)
}

pub async fn get_by_email(store: &DocStore, email: &str) -> AppResult<Option<PublicUser>> {
    let user = store
        .read(|doc| {
            doc.users
                .iter()
                .find(|u| u.email.as_deref() == Some(email))
                .map(PublicUser::from)
        })
        .await?;
    Ok(user)
}

pub async fn get_by_wallet(store: &DocStore, wallet_address: &str) -> AppResult<Option<PublicUser>> {
    let user = store
        .read(|doc| {
            doc.users
                .iter()
                .find(|u| u.wallet_address.as_deref() == Some(wallet_address))
                .map(PublicUser::from)
        })
        .await?;
    Ok(user)
}

/// Returns the number of rows changed: 0 for an unknown id.
pub async fn update_verification_status(
    store: &DocStore,
    id: Id,
    status: VerificationStatus,
) -> AppResult<usize> {
    let changed = store
        .transaction(|doc| match doc.user_mut(id) {
            Some(user) => apply_status(user, status).map(|_| 1),
            None => Ok(0),
        })
        .await?;

    if changed > 0 {
        tracing::info!(user_id = id, status = status.as_str(), "verification status updated");
    }
    Ok(changed)
}

/// Moves the user through the verification state machine. Re-applying the
/// current status is accepted and leaves the row untouched.
pub(crate) fn apply_status(user: &mut User, status: VerificationStatus) -> AppResult<bool> {
    if user.verification_status == status {
        return Ok(false);
    }
    if !user.verification_status.can_transition_to(status) {
        return Err(AppError::with_details(
            ErrorCode::InvalidStatusTransition,
            format!(
                "cannot move verification from {} to {}",
                user.verification_status.as_str(),
                status.as_str()
            ),
            serde_json::json!({
                "from": user.verification_status,
                "to": status,
            }),
        ));
    }
    user.verification_status = status;
    user.updated_at = Utc::now();
    Ok(true)
}

pub async fn attach_wallet_info(
    store: &DocStore,
    id: Id,
    wallet_address: &str,
    status: Option<VerificationStatus>,
) -> AppResult<usize> {
    let changed = store
        .transaction(|doc| attach_wallet(doc, id, wallet_address, status))
        .await?;

    if changed > 0 {
        tracing::info!(user_id = id, wallet_address, "wallet attached");
    }
    Ok(changed)
}

pub(crate) fn attach_wallet(
    doc: &mut Document,
    id: Id,
    wallet_address: &str,
    status: Option<VerificationStatus>,
) -> AppResult<usize> {
    if doc.user(id).is_none() {
        return Ok(0);
    }
    ensure_wallet_free(doc, wallet_address, Some(id))?;

    let Some(user) = doc.user_mut(id) else {
        return Ok(0);
    };
    if let Some(status) = status {
        apply_status(user, status)?;
    }
    user.wallet_address = Some(wallet_address.to_string());
    user.updated_at = Utc::now();
    Ok(1)
}

fn ensure_wallet_free(doc: &Document, wallet_address: &str, owner: Option<Id>) -> AppResult<()> {
    let taken = doc
        .users
        .iter()
        .any(|u| u.wallet_address.as_deref() == Some(wallet_address) && Some(u.id) != owner);
    if taken {
        return Err(AppError::new(ErrorCode::WalletAlreadyExists, "wallet already linked to another user"));
    }
    Ok(())
}

pub async fn update_profile_completed(store: &DocStore, id: Id, completed: bool) -> AppResult<usize> {
    let changed = store
        .transaction(|doc| Ok::<_, AppError>(set_profile_completed(doc, id, completed)))
        .await?;

    if changed > 0 {
        tracing::info!(user_id = id, completed, "profile completion updated");
    }
    Ok(changed)
}

pub(crate) fn set_profile_completed(doc: &mut Document, id: Id, completed: bool) -> usize {
    match doc.user_mut(id) {
        Some(user) => {
            user.profile_completed = completed;
            user.updated_at = Utc::now();
            1
        }
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn signup(store: &DocStore, email: &str, gender: Gender) -> PublicUser {
        create_user_with_email_password(store, email, "secret1", "Ada", gender)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn signup_assigns_verification_type_from_gender() {
        let store = DocStore::ephemeral();
        let female = signup(&store, "a@x.com", Gender::Female).await;
        let male = signup(&store, "b@x.com", Gender::Male).await;

        assert_eq!(female.verification_type, VerificationType::Face);
        assert_eq!(female.verification_status, VerificationStatus::Pending);
        assert!(!female.profile_completed);
        assert_eq!(male.verification_type, VerificationType::Wallet);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = DocStore::ephemeral();
        signup(&store, "a@x.com", Gender::Female).await;

        let err = create_user_with_email_password(&store, "a@x.com", "other", "Bea", Gender::Female)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::EmailAlreadyExists));

        // Exact match only.
        signup(&store, "A@x.com", Gender::Female).await;
        assert_eq!(store.read(|doc| doc.users.len()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn authenticate_requires_matching_password() {
        let store = DocStore::ephemeral();
        let user = signup(&store, "a@x.com", Gender::Female).await;

        let found = authenticate(&store, "a@x.com", "secret1").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(authenticate(&store, "a@x.com", "secret2").await.unwrap().is_none());
        assert!(authenticate(&store, "nobody@x.com", "secret1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn placeholder_user_without_password_cannot_log_in() {
        let store = DocStore::ephemeral();
        create_user(
            &store,
            NewUser {
                email: Some("w@x.com".into()),
                wallet_address: Some("0xabc".into()),
                verification_type: Some(VerificationType::Wallet),
                ..NewUser::default()
            },
        )
        .await
        .unwrap();

        assert!(authenticate(&store, "w@x.com", "").await.unwrap().is_none());
        assert!(get_by_wallet(&store, "0xabc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn wallet_must_be_unique() {
        let store = DocStore::ephemeral();
        let a = signup(&store, "a@x.com", Gender::Male).await;
        let b = signup(&store, "b@x.com", Gender::Male).await;

        assert_eq!(attach_wallet_info(&store, a.id, "0x1", None).await.unwrap(), 1);
        // Re-attaching to the same owner is fine.
        assert_eq!(attach_wallet_info(&store, a.id, "0x1", None).await.unwrap(), 1);

        let err = attach_wallet_info(&store, b.id, "0x1", None).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::WalletAlreadyExists));
    }

    #[tokio::test]
    async fn status_follows_state_machine() {
        let store = DocStore::ephemeral();
        let user = signup(&store, "a@x.com", Gender::Female).await;

        assert_eq!(update_verification_status(&store, user.id, VerificationStatus::Failed).await.unwrap(), 1);
        assert_eq!(update_verification_status(&store, user.id, VerificationStatus::Pending).await.unwrap(), 1);
        assert_eq!(update_verification_status(&store, user.id, VerificationStatus::Verified).await.unwrap(), 1);
        // Idempotent re-apply.
        assert_eq!(update_verification_status(&store, user.id, VerificationStatus::Verified).await.unwrap(), 1);

        let err = update_verification_status(&store, user.id, VerificationStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidStatusTransition));

        let current = get_by_id(&store, user.id).await.unwrap().unwrap();
        assert_eq!(current.verification_status, VerificationStatus::Verified);
    }

    #[tokio::test]
    async fn unknown_id_changes_nothing() {
        let store = DocStore::ephemeral();
        assert_eq!(update_verification_status(&store, 99, VerificationStatus::Verified).await.unwrap(), 0);
        assert_eq!(update_profile_completed(&store, 99, true).await.unwrap(), 0);
        assert_eq!(attach_wallet_info(&store, 99, "0x9", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn public_user_never_carries_credential() {
        let store = DocStore::ephemeral();
        let user = signup(&store, "a@x.com", Gender::Female).await;
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());

        let stored = store.read(|doc| doc.users[0].password_hash.clone()).await.unwrap();
        assert!(stored.is_some());
    }
}
