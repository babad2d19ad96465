use super::{CommentId, PostId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A comment on a post, minus the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub nickname: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a comment. All fields are required.
#[derive(Debug, Clone, Default)]
pub struct NewComment {
    pub nickname: String,
    pub content: String,
    pub password: String,
}
