//! Hooks the board calls after a successful mutation.
//!
//! Triggers never fail the parent operation: every evaluator error is logged
//! and counted in the returned [`TriggerReport`].

use super::rules::{
    check_consecutive_days, check_group_like_count, check_post_count, check_post_like_count,
};
use super::{BadgeError, BadgeId, BadgeStore, Deadline, EvalContext, Evaluation};
use crate::config::BadgeSettings;
use crate::model::{GroupId, PostId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};

/// What a trigger did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriggerReport {
    /// Badges this trigger newly granted.
    pub granted: Vec<BadgeId>,
    /// Evaluations that ended in an error.
    pub failures: usize,
}

impl TriggerReport {
    fn record(&mut self, badge: BadgeId, result: Result<Evaluation, BadgeError>) {
        match result {
            Ok(Evaluation::Granted) => self.granted.push(badge),
            Ok(Evaluation::NotMet | Evaluation::AlreadyGranted) => {}
            Err(err) => {
                self.failures += 1;
                log_failure(badge, &err);
            }
        }
    }
}

fn log_failure(badge: BadgeId, err: &BadgeError) {
    match err {
        BadgeError::NotFound { .. } => {
            warn!(
                badge = badge.id(),
                code = err.code().code(),
                error = %err,
                "badge check skipped"
            );
        }
        BadgeError::DeadlineExceeded { .. } | BadgeError::Storage(_) => {
            error!(
                badge = badge.id(),
                code = err.code().code(),
                error = %err,
                "badge check failed"
            );
        }
    }
}

fn inline_context<'a, S: BadgeStore + ?Sized>(
    store: &'a S,
    settings: &'a BadgeSettings,
    now: DateTime<Utc>,
) -> EvalContext<'a, S> {
    EvalContext::new(
        store,
        settings,
        now,
        Deadline::after(settings.inline_timeout()),
    )
}

/// After a post is created: post count, then streak.
pub fn after_post_created<S: BadgeStore + ?Sized>(
    store: &S,
    settings: &BadgeSettings,
    group_id: GroupId,
    now: DateTime<Utc>,
) -> TriggerReport {
    let ctx = inline_context(store, settings, now);
    let mut report = TriggerReport::default();
    report.record(BadgeId::PostCount, check_post_count(&ctx, group_id));
    report.record(
        BadgeId::ConsecutiveDays,
        check_consecutive_days(&ctx, group_id),
    );
    report
}

/// After a group like: group like count.
pub fn after_group_liked<S: BadgeStore + ?Sized>(
    store: &S,
    settings: &BadgeSettings,
    group_id: GroupId,
    now: DateTime<Utc>,
) -> TriggerReport {
    let ctx = inline_context(store, settings, now);
    let mut report = TriggerReport::default();
    report.record(BadgeId::GroupLikes, check_group_like_count(&ctx, group_id));
    report
}

/// After a post like: the post's like count, for its owning group.
pub fn after_post_liked<S: BadgeStore + ?Sized>(
    store: &S,
    settings: &BadgeSettings,
    post_id: PostId,
    now: DateTime<Utc>,
) -> TriggerReport {
    let ctx = inline_context(store, settings, now);
    let mut report = TriggerReport::default();
    report.record(BadgeId::PostLikes, check_post_like_count(&ctx, post_id));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::fake::{FakeGroup, FakeStore};
    use chrono::Duration;

    #[test]
    fn post_created_runs_count_then_streak() {
        let now = Utc::now();
        let mut group = FakeGroup::created(now - Duration::days(30));
        group.post_times = (0..20).map(|d| now - Duration::days(d)).collect();
        let store = FakeStore::default().with_group(1, group);

        let report = after_post_created(&store, &BadgeSettings::default(), GroupId::new(1), now);
        assert_eq!(
            report.granted,
            vec![BadgeId::PostCount, BadgeId::ConsecutiveDays]
        );
        assert_eq!(report.failures, 0);

        let again = after_post_created(&store, &BadgeSettings::default(), GroupId::new(1), now);
        assert!(again.granted.is_empty());
        assert_eq!(store.grant_count(), 2);
    }

    #[test]
    fn missing_post_is_absorbed() {
        let store = FakeStore::default();
        let report =
            after_post_liked(&store, &BadgeSettings::default(), PostId::new(3), Utc::now());
        assert!(report.granted.is_empty());
        assert_eq!(report.failures, 1);
    }

    #[test]
    fn storage_failure_is_absorbed() {
        let now = Utc::now();
        let mut group = FakeGroup::created(now);
        group.like_count = 50_000;
        let mut store = FakeStore::default().with_group(1, group);
        store.fail_inserts = true;

        let report = after_group_liked(&store, &BadgeSettings::default(), GroupId::new(1), now);
        assert!(report.granted.is_empty());
        assert_eq!(report.failures, 1);
    }

    #[test]
    fn already_granted_count_still_checks_streak() {
        let now = Utc::now();
        let mut group = FakeGroup::created(now);
        group.post_times = (0..7).map(|d| now - Duration::days(d)).collect();
        let store = FakeStore::default().with_group(1, group);
        let settings = BadgeSettings {
            thresholds: crate::badge::BadgeThresholds {
                post_count: 7,
                ..crate::badge::BadgeThresholds::default()
            },
            ..BadgeSettings::default()
        };
        store
            .grants
            .borrow_mut()
            .insert((GroupId::new(1), BadgeId::PostCount), now);

        let report = after_post_created(&store, &settings, GroupId::new(1), now);
        assert_eq!(report.granted, vec![BadgeId::ConsecutiveDays]);
    }
}
