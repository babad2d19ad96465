//! `mg sweep` and `mg schedule`: the daily group-age re-check.

use super::Ctx;
use crate::output::{CliError, pretty_kv, pretty_section, render};
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use memories_core::badge::sweep::{SweepReport, run_age_sweep, run_daily};
use memories_core::db::store::SqliteStore;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Run one sweep now and exit.
    #[arg(long)]
    pub once: bool,

    /// Exit after this many scheduled sweeps (at least 1).
    #[arg(long, conflicts_with = "once", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_runs: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SweepOutput {
    ran_at: DateTime<Utc>,
    #[serde(flatten)]
    report: SweepReport,
}

fn sweep_at(ctx: &Ctx, now: DateTime<Utc>) -> Result<SweepReport> {
    let conn = ctx.open()?;
    let store = SqliteStore::new(&conn);
    let project = &ctx.config.project;
    run_age_sweep(&store, &project.badges, &project.sweep, now)
        .map_err(|err| ctx.fail(&CliError::from(&err)))
}

fn render_report(ctx: &Ctx, ran_at: DateTime<Utc>, report: SweepReport) -> Result<()> {
    render(ctx.output, &SweepOutput { ran_at, report }, |o, w| {
        pretty_section(w, &format!("Age sweep at {}", o.ran_at.to_rfc3339()))?;
        pretty_kv(w, "Checked", o.report.checked.to_string())?;
        pretty_kv(w, "Granted", o.report.granted.to_string())?;
        pretty_kv(w, "Already had", o.report.already_granted.to_string())?;
        pretty_kv(w, "Not yet", o.report.not_met.to_string())?;
        pretty_kv(w, "Failed", o.report.failed.to_string())
    })
}

/// Execute `mg sweep`: one age sweep over every group, for cron.
///
/// # Errors
///
/// Returns an error if the board is not initialized or group ids cannot be
/// listed. Per-group failures only show up in the report.
pub fn run_sweep(ctx: &Ctx) -> Result<()> {
    let now = Utc::now();
    let report = sweep_at(ctx, now)?;
    render_report(ctx, now, report)
}

/// Execute `mg schedule`: sweep daily at `sweep.run_at` (UTC) until stopped.
///
/// # Errors
///
/// Returns an error if the board is not initialized. Failures of individual
/// scheduled sweeps are logged and the schedule continues.
pub fn run_schedule(args: &ScheduleArgs, ctx: &Ctx) -> Result<()> {
    // Fail fast on a missing board instead of at the first fire time.
    drop(ctx.open()?);

    if args.once {
        return run_sweep(ctx);
    }

    let shutdown = AtomicBool::new(false);
    let mut completed = 0_u64;
    let runs = run_daily(ctx.config.project.sweep.run_at, &shutdown, Utc::now, |now| {
        match sweep_at(ctx, now) {
            Ok(report) => {
                info!(
                    checked = report.checked,
                    granted = report.granted,
                    failed = report.failed,
                    "scheduled sweep finished"
                );
                if let Err(err) = render_report(ctx, now, report) {
                    error!(error = %err, "failed to write sweep report");
                }
            }
            Err(err) => error!(error = %err, "scheduled sweep failed"),
        }
        completed += 1;
        if args.max_runs.is_some_and(|max| completed >= max) {
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    info!(runs, "schedule stopped");
    Ok(())
}
