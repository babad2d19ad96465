//! Static badge catalog and the thresholds each rule compares against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five badges a group can earn. Discriminants are the stored ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeId {
    /// A post on every calendar date of the trailing streak window.
    ConsecutiveDays = 1,
    /// Total post count at or above the threshold.
    PostCount = 2,
    /// Group has existed for at least the configured number of months.
    GroupAge = 3,
    /// Group like count at or above the threshold.
    GroupLikes = 4,
    /// Some post in the group has a like count at or above the threshold.
    PostLikes = 5,
}

impl BadgeId {
    /// Every badge, in id order.
    pub const ALL: [Self; 5] = [
        Self::ConsecutiveDays,
        Self::PostCount,
        Self::GroupAge,
        Self::GroupLikes,
        Self::PostLikes,
    ];

    /// Stored numeric id (1..=5).
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Display name, identical to the row seeded into `badges`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ConsecutiveDays => "7-day posting streak",
            Self::PostCount => "20+ memories posted",
            Self::GroupAge => "1 year anniversary",
            Self::GroupLikes => "10k group likes",
            Self::PostLikes => "10k memory likes",
        }
    }

    /// Look up a badge by stored id.
    #[must_use]
    pub const fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::ConsecutiveDays),
            2 => Some(Self::PostCount),
            3 => Some(Self::GroupAge),
            4 => Some(Self::GroupLikes),
            5 => Some(Self::PostLikes),
            _ => None,
        }
    }
}

impl TryFrom<i64> for BadgeId {
    type Error = UnknownBadge;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or(UnknownBadge(id))
    }
}

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id(), self.name())
    }
}

/// A badge id outside the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown badge id {0}: expected 1..=5")]
pub struct UnknownBadge(pub i64);

/// Named thresholds for every counting rule, loaded from `[badges]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeThresholds {
    /// Calendar dates in the trailing streak window.
    #[serde(default = "default_streak_days")]
    pub streak_days: u32,
    /// Minimum post count for [`BadgeId::PostCount`].
    #[serde(default = "default_post_count")]
    pub post_count: u64,
    /// Minimum group age, in calendar months, for [`BadgeId::GroupAge`].
    #[serde(default = "default_group_age_months")]
    pub group_age_months: u32,
    /// Minimum group like count for [`BadgeId::GroupLikes`].
    #[serde(default = "default_like_threshold")]
    pub group_likes: u64,
    /// Minimum single-post like count for [`BadgeId::PostLikes`].
    #[serde(default = "default_like_threshold")]
    pub post_likes: u64,
}

impl Default for BadgeThresholds {
    fn default() -> Self {
        Self {
            streak_days: default_streak_days(),
            post_count: default_post_count(),
            group_age_months: default_group_age_months(),
            group_likes: default_like_threshold(),
            post_likes: default_like_threshold(),
        }
    }
}

const fn default_streak_days() -> u32 {
    7
}

const fn default_post_count() -> u64 {
    20
}

const fn default_group_age_months() -> u32 {
    12
}

const fn default_like_threshold() -> u64 {
    10_000
}
