use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kindred_shared::clients::store::{JsonStore, StoreDocument};

/// All entity ids come from the document's single `idCounter`.
pub type Id = u64;

pub type DocStore = JsonStore<Document>;

// --- Enumerations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileGender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookingFor {
    Male,
    Female,
    Both,
}

impl LookingFor {
    pub fn accepts(self, gender: Option<ProfileGender>) -> bool {
        match self {
            LookingFor::Both => true,
            LookingFor::Male => gender == Some(ProfileGender::Male),
            LookingFor::Female => gender == Some(ProfileGender::Female),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationType {
    Wallet,
    Face,
}

impl From<Gender> for VerificationType {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => VerificationType::Wallet,
            Gender::Female => VerificationType::Face,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed,
}

impl VerificationStatus {
    /// `pending -> verified | failed`, `failed -> pending`. Nothing leaves `verified`.
    pub fn can_transition_to(self, next: VerificationStatus) -> bool {
        use VerificationStatus::*;
        matches!(
            (self, next),
            (Pending, Verified) | (Pending, Failed) | (Failed, Pending)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Like,
    Pass,
    SuperLike,
}

impl ActionType {
    pub fn is_positive(self) -> bool {
        matches!(self, ActionType::Like | ActionType::SuperLike)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Like => "like",
            ActionType::Pass => "pass",
            ActionType::SuperLike => "super_like",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Sticker,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Sticker => "sticker",
        }
    }
}

// --- User ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    pub verification_type: VerificationType,
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub profile_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user as it leaves the service: never carries the credential.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PublicUser {
    pub id: Id,
    pub wallet_address: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<Gender>,
    pub verification_type: VerificationType,
    pub verification_status: VerificationStatus,
    pub profile_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            wallet_address: user.wallet_address.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            gender: user.gender,
            verification_type: user.verification_type,
            verification_status: user.verification_status,
            profile_completed: user.profile_completed,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl User {
    pub fn is_discoverable(&self) -> bool {
        self.verification_status == VerificationStatus::Verified && self.profile_completed
    }
}

// --- Profile ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<ProfileGender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looking_for: Option<LookingFor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Verification audit rows ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceVerification {
    pub id: Id,
    pub user_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletVerification {
    pub id: Id,
    pub user_id: Id,
    pub wallet_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_balance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// --- Swipes and matches ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwipeAction {
    pub id: Id,
    pub user_id: Id,
    pub target_user_id: Id,
    // Older documents wrote this field as `action`.
    #[serde(alias = "action")]
    pub action_type: ActionType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    pub id: Id,
    pub user1_id: Id,
    pub user2_id: Id,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Unordered pair in canonical `(min, max)` form.
pub fn canonical_pair(a: Id, b: Id) -> (Id, Id) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Match {
    pub fn involves(&self, user_id: Id) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    pub fn is_pair(&self, a: Id, b: Id) -> bool {
        canonical_pair(self.user1_id, self.user2_id) == canonical_pair(a, b)
    }

    pub fn other_user(&self, user_id: Id) -> Id {
        if self.user1_id == user_id { self.user2_id } else { self.user1_id }
    }
}

// --- Conversations and messages ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: Id,
    pub match_id: Id,
    pub participants: Vec<Id>,
    pub last_message_id: Option<Id>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Id) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn other_participant(&self, user_id: Id) -> Option<Id> {
        self.participants.iter().copied().find(|id| *id != user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Id,
    pub conversation_id: Id,
    pub sender_id: Id,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

// --- Document ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    pub users: Vec<User>,
    pub profiles: Vec<Profile>,
    pub face_verifications: Vec<FaceVerification>,
    pub wallet_verifications: Vec<WalletVerification>,
    pub swipe_actions: Vec<SwipeAction>,
    pub matches: Vec<Match>,
    pub conversations: Vec<Conversation>,
    pub messages: Vec<Message>,
    pub id_counter: Id,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            profiles: Vec::new(),
            face_verifications: Vec::new(),
            wallet_verifications: Vec::new(),
            swipe_actions: Vec::new(),
            matches: Vec::new(),
            conversations: Vec::new(),
            messages: Vec::new(),
            id_counter: 1,
        }
    }
}

impl StoreDocument for Document {
    fn after_load(&mut self) {
        let floor = self.max_id().map_or(1, |max| max + 1);
        self.id_counter = self.id_counter.max(floor);
    }
}

impl Document {
    /// Returns the current counter value and advances it.
    pub fn next_id(&mut self) -> Id {
        let id = self.id_counter;
        self.id_counter += 1;
        id
    }

    fn max_id(&self) -> Option<Id> {
        self.users
            .iter()
            .map(|r| r.id)
            .chain(self.profiles.iter().map(|r| r.id))
            .chain(self.face_verifications.iter().map(|r| r.id))
            .chain(self.wallet_verifications.iter().map(|r| r.id))
            .chain(self.swipe_actions.iter().map(|r| r.id))
            .chain(self.matches.iter().map(|r| r.id))
            .chain(self.conversations.iter().map(|r| r.id))
            .chain(self.messages.iter().map(|r| r.id))
            .max()
    }

    pub fn user(&self, id: Id) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_mut(&mut self, id: Id) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    /// Newest profile row for the user by `created_at`, ties going to the larger id.
    pub fn latest_profile(&self, user_id: Id) -> Option<&Profile> {
        self.profiles
            .iter()
            .filter(|p| p.user_id == user_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
    }

    pub fn latest_profile_mut(&mut self, user_id: Id) -> Option<&mut Profile> {
        self.profiles
            .iter_mut()
            .filter(|p| p.user_id == user_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
    }

    pub fn active_match_for_pair(&self, a: Id, b: Id) -> Option<&Match> {
        self.matches.iter().find(|m| m.is_active && m.is_pair(a, b))
    }

    pub fn conversation_for_match(&self, match_id: Id) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.match_id == match_id)
    }

    pub fn message_count(&self, conversation_id: Id) -> usize {
        self.messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .count()
    }
}
