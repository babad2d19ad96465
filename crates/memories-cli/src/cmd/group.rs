//! `mg group`: create, browse, edit, and like groups.

use super::{Ctx, PageArgs, or_dash};
use crate::output::{pretty_kv, pretty_section, render, render_mode, write_badges};
use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use memories_core::board::group::{
    GroupQuery, GroupSort, create_group, delete_group, get_group_detail, like_group, list_groups,
    update_group, verify_group_password,
};
use memories_core::model::GroupId;
use memories_core::model::group::{Group, GroupPatch, NewGroup};
use serde_json::json;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct GroupArgs {
    #[command(subcommand)]
    pub command: GroupCommand,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Create a group
    Create(CreateArgs),
    /// List groups
    List(ListArgs),
    /// Show a group with its earned badges
    Show {
        id: GroupId,
    },
    /// Change group fields (password required)
    Update(UpdateArgs),
    /// Delete a group and everything in it (password required)
    Delete(PasswordArgs),
    /// Check a group password
    Verify(PasswordArgs),
    /// Add one like to a group
    Like {
        id: GroupId,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub name: String,

    /// Password needed to edit or delete the group.
    #[arg(long)]
    pub password: String,

    #[arg(long)]
    pub image_url: Option<String>,

    /// Visibility; groups are public unless this is `false`.
    #[arg(long, value_name = "BOOL")]
    pub public: Option<bool>,

    #[arg(long)]
    pub introduction: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub page: PageArgs,

    /// latest, mostPosted, mostLiked, or mostBadge.
    #[arg(long, default_value_t = GroupSort::Latest)]
    pub sort: GroupSort,

    /// Case-insensitive substring of the group name.
    #[arg(long)]
    pub keyword: Option<String>,

    /// Only public (`true`) or only private (`false`) groups.
    #[arg(long, value_name = "BOOL")]
    pub public: Option<bool>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: GroupId,

    #[arg(long)]
    pub password: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub image_url: Option<String>,

    #[arg(long, value_name = "BOOL")]
    pub public: Option<bool>,

    #[arg(long)]
    pub introduction: Option<String>,
}

#[derive(Args, Debug)]
pub struct PasswordArgs {
    pub id: GroupId,

    #[arg(long)]
    pub password: String,
}

fn write_group(w: &mut dyn Write, group: &Group) -> io::Result<()> {
    pretty_section(w, &format!("Group {} · {}", group.id, group.name))?;
    pretty_kv(w, "Public", group.is_public.to_string())?;
    pretty_kv(w, "Introduction", or_dash(group.introduction.as_deref()))?;
    pretty_kv(w, "Image", or_dash(group.image_url.as_deref()))?;
    pretty_kv(w, "Likes", group.like_count.to_string())?;
    pretty_kv(w, "Posts", group.post_count.to_string())?;
    pretty_kv(w, "Badges", group.badge_count.to_string())?;
    pretty_kv(w, "Created", group.created_at.to_rfc3339())
}

fn write_group_row(w: &mut dyn Write, group: &Group) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}\t{}",
        group.id,
        group.name,
        if group.is_public { "public" } else { "private" },
        group.like_count,
        group.post_count,
        group.badge_count
    )
}

/// Execute `mg group <command>`.
///
/// # Errors
///
/// Returns an error if the board is not initialized, the operation is
/// rejected, or output fails.
pub fn run_group(args: &GroupArgs, ctx: &Ctx) -> Result<()> {
    let conn = ctx.open()?;
    let now = Utc::now();

    match &args.command {
        GroupCommand::Create(create) => {
            let new = NewGroup {
                name: create.name.clone(),
                password: create.password.clone(),
                image_url: create.image_url.clone(),
                is_public: create.public,
                introduction: create.introduction.clone(),
            };
            let group = create_group(&conn, &new, now).map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &group, |g, w| {
                writeln!(w, "Created group {}: {}", g.id, g.name)
            })
        }
        GroupCommand::List(list) => {
            let query = GroupQuery {
                page: list.page.into(),
                sort: list.sort,
                keyword: list.keyword.clone(),
                is_public: list.public,
            };
            let page = list_groups(&conn, &query).map_err(|e| ctx.board_failure(&e))?;
            render_mode(
                ctx.output,
                &page,
                |p, w| {
                    for group in &p.data {
                        write_group_row(w, group)?;
                    }
                    Ok(())
                },
                |p, w| {
                    if p.data.is_empty() {
                        return writeln!(w, "No groups found.");
                    }
                    for group in &p.data {
                        write_group(w, group)?;
                        writeln!(w)?;
                    }
                    writeln!(
                        w,
                        "page {}/{} · {} groups",
                        p.current_page, p.total_pages, p.total_item_count
                    )
                },
            )
        }
        GroupCommand::Show { id } => {
            let detail = get_group_detail(&conn, *id).map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &detail, |d, w| {
                write_group(w, &d.group)?;
                for badge in &d.badges {
                    let earned = format!(
                        "#{} {} ({})",
                        badge.badge_id,
                        badge.name,
                        badge.granted_at.date_naive()
                    );
                    pretty_kv(w, "Badge", earned)?;
                }
                Ok(())
            })
        }
        GroupCommand::Update(update) => {
            let patch = GroupPatch {
                name: update.name.clone(),
                image_url: update.image_url.clone(),
                is_public: update.public,
                introduction: update.introduction.clone(),
            };
            let group = update_group(&conn, update.id, &update.password, &patch)
                .map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &group, |g, w| writeln!(w, "Updated group {}", g.id))
        }
        GroupCommand::Delete(target) => {
            delete_group(&conn, target.id, &target.password).map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &json!({ "id": target.id, "deleted": true }), |_, w| {
                writeln!(w, "Deleted group {}", target.id)
            })
        }
        GroupCommand::Verify(target) => {
            verify_group_password(&conn, target.id, &target.password)
                .map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &json!({ "id": target.id, "verified": true }), |_, w| {
                writeln!(w, "Password verified for group {}", target.id)
            })
        }
        GroupCommand::Like { id } => {
            let liked = like_group(&conn, &ctx.config.project.badges, *id, now)
                .map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &liked, |t, w| {
                writeln!(w, "Group {} now has {} likes", t.value.id, t.value.like_count)?;
                write_badges(w, &t.badges)
            })
        }
    }
}
