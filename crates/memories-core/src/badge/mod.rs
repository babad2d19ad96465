//! Badge-award engine.
//!
//! A mutation commits first; then a trigger runs the matching rule
//! evaluator(s) against freshly read aggregate state, and a satisfied rule
//! calls [`ledger::award`]. Each (group, badge) pair moves UNGRANTED →
//! GRANTED at most once: the store's uniqueness constraint decides races,
//! never an in-process lock.
//!
//! - [`catalog`]: badge ids, names, thresholds
//! - [`store`]: the persistence port ([`BadgeStore`])
//! - [`ledger`]: idempotent `award`
//! - [`rules`]: the five evaluators
//! - [`triggers`]: best-effort hooks called by board mutations
//! - [`sweep`]: daily age re-check over every group

pub mod catalog;
pub mod deadline;
#[cfg(test)]
pub(crate) mod fake;
pub mod ledger;
pub mod rules;
pub mod store;
pub mod sweep;
pub mod triggers;

pub use catalog::{BadgeId, BadgeThresholds};
pub use deadline::Deadline;
pub use ledger::{AwardOutcome, award};
pub use store::{BadgeStore, PostLikes, StoreError};

use crate::config::BadgeSettings;
use crate::error::ErrorCode;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Failure of a single badge evaluation.
#[derive(Debug, thiserror::Error)]
pub enum BadgeError {
    /// The group or post under evaluation does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The evaluation ran out of time before finishing.
    #[error("badge check {check} exceeded its deadline")]
    DeadlineExceeded { check: &'static str },

    /// A storage error other than a duplicate grant.
    #[error("badge storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl BadgeError {
    /// Machine-readable code for logs.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::BadgeTargetMissing,
            Self::DeadlineExceeded { .. } => ErrorCode::BadgeDeadlineExceeded,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// Storage failures are fatal to the evaluation; a vanished target or a
    /// spent deadline only skips it.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<StoreError> for BadgeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Storage(other),
        }
    }
}

/// Result of one evaluator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    /// The predicate does not hold yet.
    NotMet,
    /// The predicate holds and this run inserted the grant.
    Granted,
    /// The predicate holds (or was skipped) and the grant already existed.
    AlreadyGranted,
}

impl From<AwardOutcome> for Evaluation {
    fn from(outcome: AwardOutcome) -> Self {
        match outcome {
            AwardOutcome::Granted => Self::Granted,
            AwardOutcome::AlreadyGranted => Self::AlreadyGranted,
        }
    }
}

/// Everything an evaluator needs: the store, the thresholds, the evaluation
/// instant, and the deadline.
pub struct EvalContext<'a, S: BadgeStore + ?Sized> {
    pub store: &'a S,
    pub settings: &'a BadgeSettings,
    pub now: DateTime<Utc>,
    pub deadline: Deadline,
}

impl<'a, S: BadgeStore + ?Sized> EvalContext<'a, S> {
    #[must_use]
    pub const fn new(
        store: &'a S,
        settings: &'a BadgeSettings,
        now: DateTime<Utc>,
        deadline: Deadline,
    ) -> Self {
        Self {
            store,
            settings,
            now,
            deadline,
        }
    }

    /// Shorthand for the configured thresholds.
    #[must_use]
    pub const fn thresholds(&self) -> &BadgeThresholds {
        &self.settings.thresholds
    }
}
