use super::GroupId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A group row as stored, minus the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub introduction: Option<String>,
    pub like_count: u64,
    pub post_count: u64,
    pub badge_count: u64,
    pub created_at: DateTime<Utc>,
}

/// A badge earned by a group, as shown on the group detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EarnedBadge {
    pub badge_id: u8,
    pub name: String,
    pub granted_at: DateTime<Utc>,
}

/// Group detail: the group plus its earned badges, oldest grant first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: Group,
    pub badges: Vec<EarnedBadge>,
}

/// Input for creating a group.
#[derive(Debug, Clone, Default)]
pub struct NewGroup {
    pub name: String,
    pub password: String,
    pub image_url: Option<String>,
    pub is_public: Option<bool>,
    pub introduction: Option<String>,
}

/// Partial update for a group. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub is_public: Option<bool>,
    pub introduction: Option<String>,
}

impl GroupPatch {
    /// Returns true when the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.image_url.is_none()
            && self.is_public.is_none()
            && self.introduction.is_none()
    }
}
