//! The grant ledger: at most one grant per (group, badge).

use super::{BadgeError, BadgeId, BadgeStore, StoreError};
use crate::model::GroupId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// What [`award`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardOutcome {
    /// A new grant row was written.
    Granted,
    /// The row already existed; nothing changed.
    AlreadyGranted,
}

/// Grant `badge` to `group_id`, stamped `now`.
///
/// The store's insert is the only synchronization: a duplicate-key conflict
/// comes back as [`StoreError::DuplicateGrant`] and is turned into
/// [`AwardOutcome::AlreadyGranted`].
///
/// # Errors
///
/// Returns [`BadgeError::NotFound`] if the group vanished, and
/// [`BadgeError::Storage`] for any other store failure.
pub fn award<S: BadgeStore + ?Sized>(
    store: &S,
    group_id: GroupId,
    badge: BadgeId,
    now: DateTime<Utc>,
) -> Result<AwardOutcome, BadgeError> {
    match store.insert_grant(group_id, badge, now) {
        Ok(()) => {
            info!(group_id = %group_id, badge = badge.id(), name = badge.name(), "badge granted");
            Ok(AwardOutcome::Granted)
        }
        Err(StoreError::DuplicateGrant { .. }) => {
            debug!(group_id = %group_id, badge = badge.id(), "badge already granted");
            Ok(AwardOutcome::AlreadyGranted)
        }
        Err(err) => Err(err.into()),
    }
}
