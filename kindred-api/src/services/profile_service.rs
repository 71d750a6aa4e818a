use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{DocStore, Id, LookingFor, Profile, ProfileGender};
use crate::services::user_service;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileInput {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(range(min = 18, max = 120))]
    pub age: Option<u32>,
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    pub location: Option<String>,
    pub gender: Option<ProfileGender>,
    pub looking_for: Option<LookingFor>,
}

/// Partial update: only fields that are present are merged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, message = "name cannot be empty"))]
    pub name: Option<String>,
    #[validate(range(min = 18, max = 120))]
    pub age: Option<u32>,
    pub bio: Option<String>,
    pub interests: Option<Vec<String>>,
    pub photos: Option<Vec<String>>,
    pub location: Option<String>,
    pub gender: Option<ProfileGender>,
    pub looking_for: Option<LookingFor>,
}

/// Replaces whatever profile rows the user had and marks the user's profile
/// as completed, in one transaction.
pub async fn create(store: &DocStore, user_id: Id, input: ProfileInput) -> AppResult<Profile> {
    input.validate()?;

    let profile = store
        .transaction(|doc| {
            if doc.user(user_id).is_none() {
                return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
            }

            let before = doc.profiles.len();
            doc.profiles.retain(|p| p.user_id != user_id);
            let replaced = before - doc.profiles.len();

            let now = Utc::now();
            let profile = Profile {
                id: doc.next_id(),
                user_id,
                name: input.name,
                age: input.age,
                bio: input.bio,
                interests: dedup(input.interests),
                photos: input.photos,
                location: input.location,
                gender: input.gender,
                looking_for: input.looking_for,
                created_at: now,
                updated_at: now,
            };
            doc.profiles.push(profile.clone());
            user_service::set_profile_completed(doc, user_id, true);

            if replaced > 0 {
                tracing::debug!(user_id, replaced, "previous profile rows removed");
            }
            Ok(profile)
        })
        .await?;

    tracing::info!(profile_id = profile.id, user_id, "profile created");
    Ok(profile)
}

pub async fn get_latest_by_user_id(store: &DocStore, user_id: Id) -> AppResult<Option<Profile>> {
    Ok(store.read(|doc| doc.latest_profile(user_id).cloned()).await?)
}

/// Returns the number of rows changed: 0 when the user has no profile yet.
pub async fn update(store: &DocStore, user_id: Id, changes: ProfileUpdate) -> AppResult<usize> {
    changes.validate()?;

    let changed = store
        .transaction(|doc| {
            let Some(profile) = doc.latest_profile_mut(user_id) else {
                return Ok::<_, AppError>(0);
            };

            if let Some(name) = changes.name {
                profile.name = name;
            }
            if let Some(age) = changes.age {
                profile.age = Some(age);
            }
            if let Some(bio) = changes.bio {
                profile.bio = Some(bio);
            }
            if let Some(interests) = changes.interests {
                profile.interests = dedup(interests);
            }
            if let Some(photos) = changes.photos {
                profile.photos = photos;
            }
            if let Some(location) = changes.location {
                profile.location = Some(location);
            }
            if let Some(gender) = changes.gender {
                profile.gender = Some(gender);
            }
            if let Some(looking_for) = changes.looking_for {
                profile.looking_for = Some(looking_for);
            }
            profile.updated_at = Utc::now();
            Ok(1)
        })
        .await?;

    if changed > 0 {
        tracing::info!(user_id, "profile updated");
    }
    Ok(changed)
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(values.len());
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}
