//! Daily re-check of the group-age rule over every group.
//!
//! Age is the one rule no mutation advances, so it is re-evaluated on a
//! schedule. The sweep is safe to run concurrently with inline triggers and
//! with another sweep: the ledger resolves every race.

use super::rules::check_group_age;
use super::{BadgeError, BadgeStore, Deadline, EvalContext, Evaluation};
use crate::config::{BadgeSettings, SweepSettings};
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Longest single sleep in [`run_daily`], so shutdown is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// Tally of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub granted: usize,
    pub already_granted: usize,
    pub not_met: usize,
    pub failed: usize,
}

/// Run the age rule for every group at instant `now`.
///
/// Each group gets its own deadline. A failure on one group is logged and
/// counted; the sweep moves on to the next.
///
/// # Errors
///
/// Returns an error only if the group ids cannot be listed.
pub fn run_age_sweep<S: BadgeStore + ?Sized>(
    store: &S,
    badges: &BadgeSettings,
    sweep: &SweepSettings,
    now: DateTime<Utc>,
) -> Result<SweepReport, BadgeError> {
    let started = Instant::now();
    let group_ids = store.list_group_ids()?;
    let mut report = SweepReport::default();

    for group_id in group_ids {
        let ctx = EvalContext::new(
            store,
            badges,
            now,
            Deadline::after(sweep.per_group_timeout()),
        );
        report.checked += 1;
        match check_group_age(&ctx, group_id) {
            Ok(Evaluation::Granted) => report.granted += 1,
            Ok(Evaluation::AlreadyGranted) => report.already_granted += 1,
            Ok(Evaluation::NotMet) => report.not_met += 1,
            Err(err @ BadgeError::NotFound { .. }) => {
                report.failed += 1;
                warn!(group_id = %group_id, error = %err, "group vanished during sweep");
            }
            Err(err) => {
                report.failed += 1;
                error!(
                    group_id = %group_id,
                    code = err.code().code(),
                    error = %err,
                    "age check failed"
                );
            }
        }
    }

    info!(
        checked = report.checked,
        granted = report.granted,
        failed = report.failed,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "age sweep finished"
    );
    Ok(report)
}

/// The next daily fire time at `at` (UTC) strictly after `now`.
#[must_use]
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(at));
    if today > now {
        return today;
    }
    today
        .checked_add_days(Days::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Block, calling `job` once per day at `at` (UTC), until `shutdown` is set.
///
/// `clock` supplies the current instant. Returns the number of runs.
pub fn run_daily<C, J>(at: NaiveTime, shutdown: &AtomicBool, clock: C, mut job: J) -> usize
where
    C: Fn() -> DateTime<Utc>,
    J: FnMut(DateTime<Utc>),
{
    let mut runs = 0;
    let mut next = next_run_after(clock(), at);
    info!(next_run = %next, "daily sweep scheduled");

    while !shutdown.load(Ordering::Relaxed) {
        let now = clock();
        if now >= next {
            job(now);
            runs += 1;
            next = next_run_after(now, at);
            info!(next_run = %next, "daily sweep scheduled");
            continue;
        }
        let wait = (next - now).to_std().unwrap_or_default().min(SLEEP_SLICE);
        std::thread::sleep(wait);
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::BadgeId;
    use crate::badge::fake::{FakeGroup, FakeStore};
    use crate::model::GroupId;
    use chrono::Duration as TimeDelta;
    use std::cell::Cell;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn midnight() -> NaiveTime {
        NaiveTime::MIN
    }

    #[test]
    fn sweep_grants_old_groups_once() {
        let now = at(2025, 1, 10, 0);
        let store = FakeStore::default()
            .with_group(1, FakeGroup::created(at(2023, 12, 1, 0)))
            .with_group(2, FakeGroup::created(at(2024, 12, 1, 0)));
        let badges = BadgeSettings::default();
        let sweep = SweepSettings::default();

        let first = run_age_sweep(&store, &badges, &sweep, now).expect("sweep");
        assert_eq!(first.checked, 2);
        assert_eq!(first.granted, 1);
        assert_eq!(first.not_met, 1);
        assert!(store.granted(1, BadgeId::GroupAge));

        let second = run_age_sweep(&store, &badges, &sweep, now).expect("sweep");
        assert_eq!(second.granted, 0);
        assert_eq!(second.already_granted, 1);
        assert_eq!(store.grant_count(), 1);
    }

    #[test]
    fn failing_group_does_not_stop_the_sweep() {
        let now = at(2025, 1, 10, 0);
        let mut store = FakeStore::default()
            .with_group(1, FakeGroup::created(at(2020, 1, 1, 0)))
            .with_group(2, FakeGroup::created(at(2020, 1, 1, 0)))
            .with_group(3, FakeGroup::created(at(2020, 1, 1, 0)));
        store.broken.insert(GroupId::new(2));

        let report = run_age_sweep(
            &store,
            &BadgeSettings::default(),
            &SweepSettings::default(),
            now,
        )
        .expect("sweep");
        assert_eq!(report.checked, 3);
        assert_eq!(report.granted, 2);
        assert_eq!(report.failed, 1);
        assert!(store.granted(3, BadgeId::GroupAge));
    }

    #[test]
    fn listing_failure_is_returned() {
        let store = FakeStore {
            fail_listing: true,
            ..FakeStore::default()
        };
        let result = run_age_sweep(
            &store,
            &BadgeSettings::default(),
            &SweepSettings::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(BadgeError::Storage(_))));
    }

    #[test]
    fn next_run_is_strictly_after_now() {
        assert_eq!(next_run_after(at(2025, 3, 1, 10), midnight()), at(2025, 3, 2, 0));
        assert_eq!(next_run_after(at(2025, 3, 1, 0), midnight()), at(2025, 3, 2, 0));

        let three = NaiveTime::from_hms_opt(3, 0, 0).expect("valid time");
        assert_eq!(next_run_after(at(2025, 3, 1, 1), three), at(2025, 3, 1, 3));
        assert_eq!(next_run_after(at(2025, 12, 31, 4), three), at(2026, 1, 1, 3));
    }

    #[test]
    fn run_daily_fires_once_per_day_until_shutdown() {
        let shutdown = AtomicBool::new(false);
        let now = Cell::new(at(2025, 3, 1, 6));
        let clock = || {
            let current = now.get();
            now.set(current + TimeDelta::days(1));
            current
        };

        let mut fired = Vec::new();
        let runs = run_daily(midnight(), &shutdown, clock, |when| {
            fired.push(when);
            if fired.len() == 2 {
                shutdown.store(true, Ordering::Relaxed);
            }
        });

        assert_eq!(runs, 2);
        assert_eq!(fired, vec![at(2025, 3, 2, 6), at(2025, 3, 3, 6)]);
    }

    #[test]
    fn run_daily_returns_immediately_when_already_shut_down() {
        let shutdown = AtomicBool::new(true);
        let runs = run_daily(midnight(), &shutdown, Utc::now, |_| {});
        assert_eq!(runs, 0);
    }
}
