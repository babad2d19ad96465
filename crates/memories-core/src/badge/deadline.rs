//! Time budget for a single badge evaluation.

use super::BadgeError;
use std::time::{Duration, Instant};

/// Wall-clock budget carried through an evaluation.
///
/// Evaluators call [`Deadline::check`] before each store round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    pub const NONE: Self = Self { expires_at: None };

    /// Expire `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(budget),
        }
    }

    /// Returns true once the budget is spent.
    #[must_use]
    pub fn is_expired(self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }

    /// Time left, or `None` for an unbounded deadline.
    #[must_use]
    pub fn remaining(self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }

    /// Fail with [`BadgeError::DeadlineExceeded`] if expired.
    ///
    /// # Errors
    ///
    /// Returns an error naming `check` when the deadline has passed.
    pub fn check(self, check: &'static str) -> Result<(), BadgeError> {
        if self.is_expired() {
            return Err(BadgeError::DeadlineExceeded { check });
        }
        Ok(())
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::NONE
    }
}
