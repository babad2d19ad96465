//! `mg config`: print the settings every other command runs with.

use super::Ctx;
use crate::output::{pretty_kv, pretty_section, render};
use anyhow::Result;
use std::io::Write;

/// Execute `mg config`.
///
/// # Errors
///
/// Returns an error if output fails.
pub fn run_config(ctx: &Ctx) -> Result<()> {
    render(ctx.output, &ctx.config, |c, w| {
        let badges = &c.project.badges;
        let t = &badges.thresholds;
        pretty_section(w, "Effective configuration")?;
        pretty_kv(w, "Database", c.db_path.display().to_string())?;
        pretty_kv(w, "Output", &c.resolved_output)?;
        let streak = format!(
            "{} days at UTC{:+} min",
            t.streak_days, badges.streak_utc_offset_minutes
        );
        pretty_kv(w, "Streak", streak)?;
        pretty_kv(w, "Post count", t.post_count.to_string())?;
        pretty_kv(w, "Group age", format!("{} months", t.group_age_months))?;
        pretty_kv(w, "Group likes", t.group_likes.to_string())?;
        pretty_kv(w, "Post likes", t.post_likes.to_string())?;
        pretty_kv(w, "Inline budget", format!("{} ms", badges.inline_timeout_ms))?;
        pretty_kv(w, "Sweep at", format!("{} UTC", c.project.sweep.run_at))?;
        pretty_kv(
            w,
            "Sweep budget",
            format!("{} s per group", c.project.sweep.per_group_timeout_secs),
        )?;
        pretty_kv(w, "Busy timeout", format!("{} ms", c.project.store.busy_timeout_ms))
    })
}
