//! The five rule evaluators.
//!
//! Each evaluator reads the aggregate it needs through the context's store,
//! compares it with the configured threshold, and calls [`award`] when the
//! predicate holds. Evaluators keep no state between calls; the deadline is
//! checked before every store round trip.

use super::{BadgeError, BadgeId, BadgeStore, EvalContext, Evaluation, award};
use crate::model::{GroupId, PostId};
use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::BTreeSet;
use tracing::debug;

/// The calendar dates a posting streak must cover, and the UTC instant the
/// first of them begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakWindow {
    pub dates: Vec<NaiveDate>,
    pub start: DateTime<Utc>,
    offset: FixedOffset,
}

impl StreakWindow {
    /// The `days` calendar dates (at least one) ending with the date of
    /// `now`, where dates are read at `offset` from UTC.
    ///
    /// Returns `None` only when the window falls outside chrono's range.
    #[must_use]
    pub fn ending_at(now: DateTime<Utc>, days: u32, offset: FixedOffset) -> Option<Self> {
        let today = now.with_timezone(&offset).date_naive();
        let first = today.checked_sub_days(Days::new(u64::from(days.max(1) - 1)))?;
        let start = offset
            .from_local_datetime(&first.and_time(NaiveTime::MIN))
            .single()?
            .with_timezone(&Utc);
        let dates = first.iter_days().take_while(|d| *d <= today).collect();

        Some(Self {
            dates,
            start,
            offset,
        })
    }

    /// True when every date of the window has at least one timestamp.
    /// Several timestamps on one date count once.
    #[must_use]
    pub fn is_covered_by(&self, times: &[DateTime<Utc>]) -> bool {
        let posted: BTreeSet<NaiveDate> = times
            .iter()
            .map(|t| t.with_timezone(&self.offset).date_naive())
            .collect();
        self.dates.iter().all(|d| posted.contains(d))
    }
}

/// Badge 1: a post on every date of the trailing streak window.
///
/// # Errors
///
/// Returns [`BadgeError`] on store failure or an expired deadline.
pub fn check_consecutive_days<S: BadgeStore + ?Sized>(
    ctx: &EvalContext<'_, S>,
    group_id: GroupId,
) -> Result<Evaluation, BadgeError> {
    const CHECK: &str = "consecutive_days";

    let Some(window) = StreakWindow::ending_at(
        ctx.now,
        ctx.thresholds().streak_days,
        ctx.settings.streak_offset(),
    ) else {
        return Ok(Evaluation::NotMet);
    };

    ctx.deadline.check(CHECK)?;
    let times = ctx.store.post_times_between(group_id, window.start, ctx.now)?;
    if !window.is_covered_by(&times) {
        debug!(
            group_id = %group_id,
            posts = times.len(),
            days = window.dates.len(),
            "streak not met"
        );
        return Ok(Evaluation::NotMet);
    }

    grant(ctx, group_id, BadgeId::ConsecutiveDays, CHECK)
}

/// Badge 2: the group's post count reaches the threshold.
///
/// # Errors
///
/// Returns [`BadgeError`] on store failure or an expired deadline.
pub fn check_post_count<S: BadgeStore + ?Sized>(
    ctx: &EvalContext<'_, S>,
    group_id: GroupId,
) -> Result<Evaluation, BadgeError> {
    const CHECK: &str = "post_count";

    ctx.deadline.check(CHECK)?;
    let posts = ctx.store.count_posts(group_id)?;
    if posts < ctx.thresholds().post_count {
        debug!(group_id = %group_id, posts, "post count not met");
        return Ok(Evaluation::NotMet);
    }

    grant(ctx, group_id, BadgeId::PostCount, CHECK)
}

/// `created_at` plus `months` calendar months. A day that does not exist in
/// the target month rolls over into the next one, so Feb 29 plus a year is
/// Mar 1.
fn anniversary(created_at: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    let clamped = created_at.checked_add_months(Months::new(months))?;
    let overflow = created_at.day().saturating_sub(clamped.day());
    clamped.checked_add_days(Days::new(u64::from(overflow)))
}

/// Badge 3: the group is at least the configured number of calendar months
/// old. A group created on Feb 29 reaches its anniversary on Mar 1.
///
/// # Errors
///
/// Returns [`BadgeError::NotFound`] if the group does not exist, and other
/// [`BadgeError`]s on store failure or an expired deadline.
pub fn check_group_age<S: BadgeStore + ?Sized>(
    ctx: &EvalContext<'_, S>,
    group_id: GroupId,
) -> Result<Evaluation, BadgeError> {
    const CHECK: &str = "group_age";

    ctx.deadline.check(CHECK)?;
    let created_at = ctx.store.group_created_at(group_id)?;
    let Some(anniversary) = anniversary(created_at, ctx.thresholds().group_age_months) else {
        return Ok(Evaluation::NotMet);
    };
    if ctx.now < anniversary {
        debug!(group_id = %group_id, %created_at, "group age not met");
        return Ok(Evaluation::NotMet);
    }

    grant(ctx, group_id, BadgeId::GroupAge, CHECK)
}

/// Badge 4: the group's like count reaches the threshold.
///
/// # Errors
///
/// Returns [`BadgeError::NotFound`] if the group does not exist, and other
/// [`BadgeError`]s on store failure or an expired deadline.
pub fn check_group_like_count<S: BadgeStore + ?Sized>(
    ctx: &EvalContext<'_, S>,
    group_id: GroupId,
) -> Result<Evaluation, BadgeError> {
    const CHECK: &str = "group_likes";

    ctx.deadline.check(CHECK)?;
    let likes = ctx.store.group_like_count(group_id)?;
    if likes < ctx.thresholds().group_likes {
        debug!(group_id = %group_id, likes, "group likes not met");
        return Ok(Evaluation::NotMet);
    }

    grant(ctx, group_id, BadgeId::GroupLikes, CHECK)
}

/// Badge 5: some post reaches the like threshold. Evaluated for one post and
/// granted to its owning group; once the group holds the badge no further
/// grant is attempted.
///
/// # Errors
///
/// Returns [`BadgeError::NotFound`] if the post does not exist, and other
/// [`BadgeError`]s on store failure or an expired deadline.
pub fn check_post_like_count<S: BadgeStore + ?Sized>(
    ctx: &EvalContext<'_, S>,
    post_id: PostId,
) -> Result<Evaluation, BadgeError> {
    const CHECK: &str = "post_likes";

    ctx.deadline.check(CHECK)?;
    let post = ctx.store.post_likes(post_id)?;

    ctx.deadline.check(CHECK)?;
    if ctx.store.has_grant(post.group_id, BadgeId::PostLikes)? {
        return Ok(Evaluation::AlreadyGranted);
    }
    if post.like_count < ctx.thresholds().post_likes {
        debug!(post_id = %post_id, likes = post.like_count, "post likes not met");
        return Ok(Evaluation::NotMet);
    }

    grant(ctx, post.group_id, BadgeId::PostLikes, CHECK)
}

fn grant<S: BadgeStore + ?Sized>(
    ctx: &EvalContext<'_, S>,
    group_id: GroupId,
    badge: BadgeId,
    check: &'static str,
) -> Result<Evaluation, BadgeError> {
    ctx.deadline.check(check)?;
    Ok(award(ctx.store, group_id, badge, ctx.now)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::Deadline;
    use crate::badge::fake::{FakeGroup, FakeStore};
    use crate::config::BadgeSettings;
    use chrono::{Duration, Offset};
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn ctx<'a>(
        store: &'a FakeStore,
        settings: &'a BadgeSettings,
        now: DateTime<Utc>,
    ) -> EvalContext<'a, FakeStore> {
        EvalContext::new(store, settings, now, Deadline::NONE)
    }

    fn group_with_posts(times: Vec<DateTime<Utc>>) -> FakeStore {
        let mut group = FakeGroup::created(at(2024, 1, 1, 0));
        group.post_times = times;
        FakeStore::default().with_group(1, group)
    }

    #[test]
    fn window_spans_seven_dates_ending_today() {
        let now = at(2024, 3, 10, 15);
        let window = StreakWindow::ending_at(now, 7, Utc.fix()).expect("window");
        assert_eq!(window.dates.len(), 7);
        assert_eq!(window.dates[0], NaiveDate::from_ymd_opt(2024, 3, 4).expect("date"));
        assert_eq!(window.start, at(2024, 3, 4, 0));
    }

    #[test]
    fn window_respects_offset() {
        // 20:00 UTC on Mar 10 is already Mar 11 at +09:00.
        let offset = FixedOffset::east_opt(9 * 3600).expect("offset");
        let window = StreakWindow::ending_at(at(2024, 3, 10, 20), 2, offset).expect("window");
        assert_eq!(
            window.dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 10).expect("date"),
                NaiveDate::from_ymd_opt(2024, 3, 11).expect("date"),
            ]
        );
        assert_eq!(window.start, at(2024, 3, 9, 15));
    }

    #[test]
    fn zero_day_window_is_one_day() {
        let window = StreakWindow::ending_at(at(2024, 3, 10, 1), 0, Utc.fix()).expect("window");
        assert_eq!(window.dates.len(), 1);
    }

    #[test]
    fn streak_of_seven_dates_grants() {
        let now = at(2024, 3, 10, 12);
        let times = (0..7).map(|d| now - Duration::days(d)).collect();
        let store = group_with_posts(times);
        let settings = BadgeSettings::default();

        let result = check_consecutive_days(&ctx(&store, &settings, now), GroupId::new(1))
            .expect("evaluate");
        assert_eq!(result, Evaluation::Granted);
        assert!(store.granted(1, BadgeId::ConsecutiveDays));
    }

    #[test]
    fn duplicate_posts_on_six_dates_do_not_grant() {
        let now = at(2024, 3, 10, 12);
        // Two posts per date on six dates, nothing three days ago.
        let times = (0..7)
            .filter(|d| *d != 3)
            .flat_map(|d| [now - Duration::days(d), now - Duration::days(d) - Duration::hours(2)])
            .collect();
        let store = group_with_posts(times);
        let settings = BadgeSettings::default();

        let result = check_consecutive_days(&ctx(&store, &settings, now), GroupId::new(1))
            .expect("evaluate");
        assert_eq!(result, Evaluation::NotMet);
        assert_eq!(store.grant_count(), 0);
    }

    #[test]
    fn posts_before_the_window_do_not_count() {
        let now = at(2024, 3, 10, 12);
        // Six dates inside the window plus one eight days back.
        let mut times: Vec<_> = (0..6).map(|d| now - Duration::days(d)).collect();
        times.push(now - Duration::days(8));
        let store = group_with_posts(times);
        let settings = BadgeSettings::default();

        let result = check_consecutive_days(&ctx(&store, &settings, now), GroupId::new(1))
            .expect("evaluate");
        assert_eq!(result, Evaluation::NotMet);
    }

    #[test]
    fn post_count_threshold_is_inclusive() {
        let now = at(2024, 3, 10, 12);
        let settings = BadgeSettings::default();

        let nineteen = group_with_posts(vec![now; 19]);
        assert_eq!(
            check_post_count(&ctx(&nineteen, &settings, now), GroupId::new(1)).expect("evaluate"),
            Evaluation::NotMet
        );

        let twenty = group_with_posts(vec![now; 20]);
        assert_eq!(
            check_post_count(&ctx(&twenty, &settings, now), GroupId::new(1)).expect("evaluate"),
            Evaluation::Granted
        );
        assert_eq!(
            check_post_count(&ctx(&twenty, &settings, now), GroupId::new(1)).expect("evaluate"),
            Evaluation::AlreadyGranted
        );
    }

    #[test]
    fn group_age_boundary() {
        let created = at(2023, 6, 15, 8);
        let store = FakeStore::default().with_group(1, FakeGroup::created(created));
        let settings = BadgeSettings::default();

        let almost = at(2024, 6, 15, 8) - Duration::seconds(1);
        assert_eq!(
            check_group_age(&ctx(&store, &settings, almost), GroupId::new(1)).expect("evaluate"),
            Evaluation::NotMet
        );

        let exactly = at(2024, 6, 15, 8);
        assert_eq!(
            check_group_age(&ctx(&store, &settings, exactly), GroupId::new(1)).expect("evaluate"),
            Evaluation::Granted
        );
    }

    #[test]
    fn leap_day_group_reaches_anniversary_on_mar_1() {
        let created = at(2024, 2, 29, 10);
        let store = FakeStore::default().with_group(1, FakeGroup::created(created));
        let settings = BadgeSettings::default();

        assert_eq!(
            check_group_age(&ctx(&store, &settings, at(2025, 2, 28, 23)), GroupId::new(1))
                .expect("evaluate"),
            Evaluation::NotMet
        );
        assert_eq!(
            check_group_age(&ctx(&store, &settings, at(2025, 3, 1, 10)), GroupId::new(1))
                .expect("evaluate"),
            Evaluation::Granted
        );
    }

    #[test]
    fn anniversary_rolls_missing_days_forward() {
        assert_eq!(anniversary(at(2024, 2, 29, 10), 12), Some(at(2025, 3, 1, 10)));
        assert_eq!(anniversary(at(2024, 2, 29, 10), 48), Some(at(2028, 2, 29, 10)));
        assert_eq!(anniversary(at(2023, 6, 15, 8), 12), Some(at(2024, 6, 15, 8)));
    }

    #[test]
    fn missing_group_is_not_found() {
        let store = FakeStore::default();
        let settings = BadgeSettings::default();

        let err = check_group_age(&ctx(&store, &settings, Utc::now()), GroupId::new(9))
            .expect_err("group is missing");
        assert!(matches!(err, BadgeError::NotFound { entity: "group", id: 9 }));
    }

    #[test]
    fn group_likes_cross_threshold() {
        let now = Utc::now();
        let mut group = FakeGroup::created(now);
        group.like_count = 9_999;
        let mut store = FakeStore::default().with_group(1, group);
        let settings = BadgeSettings::default();

        assert_eq!(
            check_group_like_count(&ctx(&store, &settings, now), GroupId::new(1))
                .expect("evaluate"),
            Evaluation::NotMet
        );

        if let Some(g) = store.groups.get_mut(&GroupId::new(1)) {
            g.like_count = 10_000;
        }
        assert_eq!(
            check_group_like_count(&ctx(&store, &settings, now), GroupId::new(1))
                .expect("evaluate"),
            Evaluation::Granted
        );
    }

    #[test]
    fn post_likes_grant_the_owning_group() {
        let now = Utc::now();
        let store = FakeStore::default()
            .with_group(4, FakeGroup::created(now))
            .with_post(40, 4, 10_000);
        let settings = BadgeSettings::default();

        assert_eq!(
            check_post_like_count(&ctx(&store, &settings, now), PostId::new(40))
                .expect("evaluate"),
            Evaluation::Granted
        );
        assert!(store.granted(4, BadgeId::PostLikes));
    }

    #[test]
    fn post_likes_short_circuit_when_already_granted() {
        let now = Utc::now();
        let store = FakeStore::default()
            .with_group(4, FakeGroup::created(now))
            .with_post(40, 4, 3)
            .with_post(41, 4, 20_000);
        let settings = BadgeSettings::default();

        check_post_like_count(&ctx(&store, &settings, now), PostId::new(41)).expect("grant");
        assert_eq!(
            check_post_like_count(&ctx(&store, &settings, now), PostId::new(40))
                .expect("evaluate"),
            Evaluation::AlreadyGranted
        );
        assert_eq!(store.grant_count(), 1);
    }

    #[test]
    fn configured_threshold_is_used() {
        let now = Utc::now();
        let store = FakeStore::default()
            .with_group(1, FakeGroup::created(now))
            .with_post(2, 1, 12);
        let mut settings = BadgeSettings::default();
        settings.thresholds.post_likes = 12;

        assert_eq!(
            check_post_like_count(&ctx(&store, &settings, now), PostId::new(2)).expect("evaluate"),
            Evaluation::Granted
        );
    }

    #[test]
    fn expired_deadline_stops_before_reading() {
        let store = group_with_posts(vec![Utc::now(); 25]);
        let settings = BadgeSettings::default();
        let ctx = EvalContext::new(
            &store,
            &settings,
            Utc::now(),
            Deadline::after(std::time::Duration::ZERO),
        );

        let err = check_post_count(&ctx, GroupId::new(1)).expect_err("deadline passed");
        assert!(matches!(err, BadgeError::DeadlineExceeded { check: "post_count" }));
        assert_eq!(store.calls.get(), 0);
        assert_eq!(store.grant_count(), 0);
    }

    #[test]
    fn storage_failure_on_insert_is_fatal() {
        let now = Utc::now();
        let mut store = group_with_posts(vec![now; 20]);
        store.fail_inserts = true;
        let settings = BadgeSettings::default();

        let err = check_post_count(&ctx(&store, &settings, now), GroupId::new(1))
            .expect_err("insert fails");
        assert!(err.is_fatal());
    }

    proptest! {
        #[test]
        fn streak_grants_iff_every_window_date_has_a_post(
            offsets in proptest::collection::vec(0_i64..10, 0..20),
            hours in proptest::collection::vec(0_i64..12, 20),
        ) {
            let now = at(2024, 5, 20, 12);
            let times: Vec<_> = offsets
                .iter()
                .zip(&hours)
                .map(|(d, h)| now - Duration::days(*d) - Duration::hours(*h))
                .collect();
            let expected = (0..7).all(|d| offsets.contains(&d));

            let store = group_with_posts(times);
            let settings = BadgeSettings::default();
            let result = check_consecutive_days(&ctx(&store, &settings, now), GroupId::new(1))
                .expect("evaluate");

            prop_assert_eq!(result == Evaluation::Granted, expected);
        }
    }
}
