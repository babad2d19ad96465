use super::{GroupId, PostId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A post ("memory") with its tags, minus the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub group_id: GroupId,
    pub nickname: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub moment: Option<NaiveDate>,
    pub is_public: bool,
    pub like_count: u64,
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Visibility probe result for a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostVisibility {
    pub id: PostId,
    pub is_public: bool,
}

/// Input for creating a post.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub nickname: String,
    pub title: String,
    pub content: String,
    pub password: Option<String>,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub moment: Option<NaiveDate>,
    pub is_public: Option<bool>,
}

/// Partial update for a post. `tags: Some(..)` replaces the whole tag set.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub nickname: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<String>,
    pub moment: Option<NaiveDate>,
    pub is_public: Option<bool>,
}

impl PostPatch {
    /// Returns true when the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nickname.is_none()
            && self.title.is_none()
            && self.content.is_none()
            && self.image_url.is_none()
            && self.tags.is_none()
            && self.location.is_none()
            && self.moment.is_none()
            && self.is_public.is_none()
    }
}
