//! Persistence port consumed by the badge engine.

use super::catalog::BadgeId;
use crate::model::{GroupId, PostId};
use chrono::{DateTime, Utc};

/// Errors reported by a [`BadgeStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced row does not exist (or vanished mid-check).
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The (group, badge) grant already exists. Benign for the ledger.
    #[error("badge {badge} already granted to group {group_id}")]
    DuplicateGrant { group_id: GroupId, badge: BadgeId },

    /// A stored timestamp cannot be represented as a UTC instant.
    #[error("stored timestamp {0}us is out of range")]
    InvalidTimestamp(i64),

    /// Any other backend failure.
    #[error("storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Owning group and current like count of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostLikes {
    pub group_id: GroupId,
    pub like_count: u64,
}

/// Read/write operations the rule evaluators and the ledger need.
///
/// Implementations must make [`BadgeStore::insert_grant`] atomic: two
/// concurrent inserts for the same pair yield one row and one
/// [`StoreError::DuplicateGrant`].
pub trait BadgeStore {
    /// Number of posts belonging to the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    fn count_posts(&self, group_id: GroupId) -> Result<u64, StoreError>;

    /// Creation times of the group's posts with `from <= created_at <= to`,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    fn post_times_between(
        &self,
        group_id: GroupId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError>;

    /// Group creation time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the group does not exist.
    fn group_created_at(&self, group_id: GroupId) -> Result<DateTime<Utc>, StoreError>;

    /// Group like count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the group does not exist.
    fn group_like_count(&self, group_id: GroupId) -> Result<u64, StoreError>;

    /// Owning group and like count of a post.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the post does not exist.
    fn post_likes(&self, post_id: PostId) -> Result<PostLikes, StoreError>;

    /// Whether the grant row already exists. Read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    fn has_grant(&self, group_id: GroupId, badge: BadgeId) -> Result<bool, StoreError>;

    /// Insert a grant row stamped `at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateGrant`] if the row exists,
    /// [`StoreError::NotFound`] if the group does not exist.
    fn insert_grant(
        &self,
        group_id: GroupId,
        badge: BadgeId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Every group id, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    fn list_group_ids(&self) -> Result<Vec<GroupId>, StoreError>;
}
