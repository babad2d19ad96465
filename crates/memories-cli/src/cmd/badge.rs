//! `mg badge`: the badge catalog and a group's earned badges.

use super::Ctx;
use crate::output::{pretty_section, render, render_mode};
use anyhow::Result;
use clap::{Args, Subcommand};
use memories_core::badge::{BadgeId, BadgeThresholds};
use memories_core::board::group::get_group_detail;
use memories_core::model::GroupId;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct BadgeArgs {
    #[command(subcommand)]
    pub command: BadgeCommand,
}

#[derive(Subcommand, Debug)]
pub enum BadgeCommand {
    /// Every badge and the rule that grants it
    Catalog,
    /// Badges a group has earned, oldest first
    List { group_id: GroupId },
}

/// One catalog row with its configured rule.
#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    pub badge_id: u8,
    pub name: &'static str,
    pub rule: String,
}

pub fn catalog(thresholds: &BadgeThresholds) -> Vec<CatalogEntry> {
    BadgeId::ALL
        .into_iter()
        .map(|badge| CatalogEntry {
            badge_id: badge.id(),
            name: badge.name(),
            rule: rule_text(badge, thresholds),
        })
        .collect()
}

fn rule_text(badge: BadgeId, t: &BadgeThresholds) -> String {
    match badge {
        BadgeId::ConsecutiveDays => {
            format!("a post on each of the last {} calendar days", t.streak_days)
        }
        BadgeId::PostCount => format!("at least {} posts", t.post_count),
        BadgeId::GroupAge => format!("group at least {} months old", t.group_age_months),
        BadgeId::GroupLikes => format!("group has at least {} likes", t.group_likes),
        BadgeId::PostLikes => format!("a single post has at least {} likes", t.post_likes),
    }
}

/// Execute `mg badge <command>`.
///
/// # Errors
///
/// Returns an error if the group is unknown, the board is not initialized,
/// or output fails.
pub fn run_badge(args: &BadgeArgs, ctx: &Ctx) -> Result<()> {
    match &args.command {
        BadgeCommand::Catalog => {
            let entries = catalog(&ctx.config.project.badges.thresholds);
            render_mode(
                ctx.output,
                &entries,
                |rows, w| {
                    for e in rows {
                        writeln!(w, "{}\t{}\t{}", e.badge_id, e.name, e.rule)?;
                    }
                    Ok(())
                },
                |rows, w| {
                    pretty_section(w, "Badges")?;
                    for e in rows {
                        writeln!(w, "#{} {:<22} {}", e.badge_id, e.name, e.rule)?;
                    }
                    Ok(())
                },
            )
        }
        BadgeCommand::List { group_id } => {
            let conn = ctx.open()?;
            let earned = get_group_detail(&conn, *group_id)
                .map_err(|e| ctx.board_failure(&e))?
                .badges;
            render(ctx.output, &earned, |rows, w| {
                if rows.is_empty() {
                    return writeln!(w, "Group {group_id} has not earned any badges yet.");
                }
                for b in rows {
                    writeln!(w, "#{} {}\t{}", b.badge_id, b.name, b.granted_at.to_rfc3339())?;
                }
                Ok(())
            })
        }
    }
}
