use std::collections::HashSet;

use chrono::Utc;
use rand::seq::SliceRandom;
use serde::Serialize;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};

use crate::config::SwipePolicy;
use crate::models::{ActionType, DocStore, Document, Id, LookingFor, Match, Profile, SwipeAction};
use crate::services::match_service;

/// Preference applied when the viewer never said what they are looking for.
pub const DEFAULT_PREFERENCE: LookingFor = LookingFor::Female;

#[derive(Debug, Clone, Serialize)]
pub struct SwipeOutcome {
    pub swipe: SwipeAction,
    pub is_match: bool,
    /// Set only when this swipe produced a new match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_match: Option<Match>,
}

/// A random batch of at most `limit` profiles the viewer has not decided on yet.
/// `preference: None` reads the viewer's own `looking_for`.
pub async fn list_candidates(
    store: &DocStore,
    viewer_id: Id,
    preference: Option<LookingFor>,
    limit: usize,
) -> AppResult<Vec<Profile>> {
    let mut candidates = store
        .read(|doc| {
            if doc.user(viewer_id).is_none() {
                return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
            }
            let preference = preference
                .or_else(|| doc.latest_profile(viewer_id).and_then(|p| p.looking_for))
                .unwrap_or(DEFAULT_PREFERENCE);
            Ok(eligible_candidates(doc, viewer_id, preference))
        })
        .await??;

    candidates.shuffle(&mut rand::thread_rng());
    candidates.truncate(limit);

    tracing::debug!(viewer_id, returned = candidates.len(), "candidates listed");
    Ok(candidates)
}

/// One entry per discoverable user: their latest profile.
fn eligible_candidates(doc: &Document, viewer_id: Id, preference: LookingFor) -> Vec<Profile> {
    let swiped: HashSet<Id> = doc
        .swipe_actions
        .iter()
        .filter(|s| s.user_id == viewer_id)
        .map(|s| s.target_user_id)
        .collect();

    doc.users
        .iter()
        .filter(|u| u.id != viewer_id && u.is_discoverable() && !swiped.contains(&u.id))
        .filter_map(|u| doc.latest_profile(u.id))
        .filter(|p| preference.accepts(p.gender))
        .cloned()
        .collect()
}

/// Records the decision and, for a positive one that is reciprocated,
/// creates the match in the same transaction.
pub async fn record_swipe(
    store: &DocStore,
    actor_id: Id,
    target_id: Id,
    action: ActionType,
    policy: SwipePolicy,
) -> AppResult<SwipeOutcome> {
    if actor_id == target_id {
        return Err(AppError::new(ErrorCode::CannotSwipeSelf, "cannot swipe on yourself"));
    }

    let outcome = store
        .transaction(|doc| {
            for id in [actor_id, target_id] {
                if doc.user(id).is_none() {
                    return Err(AppError::with_details(
                        ErrorCode::UserNotFound,
                        "user not found",
                        serde_json::json!({ "user_id": id }),
                    ));
                }
            }

            let swipe = upsert_swipe(doc, actor_id, target_id, action, policy)?;

            let mut is_match = false;
            let mut new_match = None;
            if action.is_positive() && has_mutual_like(doc, actor_id, target_id) {
                is_match = true;
                new_match = match_service::insert_match(doc, actor_id, target_id);
            }

            Ok(SwipeOutcome { swipe, is_match, new_match })
        })
        .await?;

    metrics::counter!("swipes_total", "action" => action.as_str()).increment(1);
    tracing::info!(
        actor_id,
        target_id,
        action = action.as_str(),
        is_match = outcome.is_match,
        "swipe recorded"
    );
    if let Some(m) = &outcome.new_match {
        metrics::counter!("matches_created_total").increment(1);
        tracing::info!(match_id = m.id, user1_id = m.user1_id, user2_id = m.user2_id, "match created");
    }

    Ok(outcome)
}

fn upsert_swipe(
    doc: &mut Document,
    actor_id: Id,
    target_id: Id,
    action: ActionType,
    policy: SwipePolicy,
) -> AppResult<SwipeAction> {
    let now = Utc::now();
    let existing = doc
        .swipe_actions
        .iter_mut()
        .find(|s| s.user_id == actor_id && s.target_user_id == target_id);

    match (existing, policy) {
        (Some(previous), SwipePolicy::Reject) => Err(AppError::with_details(
            ErrorCode::AlreadySwiped,
            "already swiped on this user",
            serde_json::json!({ "previous_action": previous.action_type }),
        )),
        (Some(previous), SwipePolicy::Supersede) => {
            previous.action_type = action;
            previous.created_at = now;
            Ok(previous.clone())
        }
        (None, _) => {
            let swipe = SwipeAction {
                id: doc.next_id(),
                user_id: actor_id,
                target_user_id: target_id,
                action_type: action,
                created_at: now,
            };
            doc.swipe_actions.push(swipe.clone());
            Ok(swipe)
        }
    }
}

/// Whether the target's current decision about the actor is a like or super like.
pub fn has_mutual_like(doc: &Document, actor_id: Id, target_id: Id) -> bool {
    doc.swipe_actions
        .iter()
        .filter(|s| s.user_id == target_id && s.target_user_id == actor_id)
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        .is_some_and(|s| s.action_type.is_positive())
}
