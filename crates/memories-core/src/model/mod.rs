//! Board domain types: identifiers, groups, posts, and comments.

pub mod comment;
pub mod group;
pub mod post;

use serde::{Deserialize, Serialize};
use std::{fmt, num::ParseIntError, str::FromStr};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

row_id!(
    /// Primary key of a row in `groups`.
    GroupId
);
row_id!(
    /// Primary key of a row in `posts`.
    PostId
);
row_id!(
    /// Primary key of a row in `comments`.
    CommentId
);

/// Convert a stored non-negative counter to `u64`, treating corrupt negative
/// values as zero.
#[must_use]
pub fn counter(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or_default()
}
