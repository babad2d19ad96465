//! `mg post`: memories inside a group.

use super::{Ctx, PageArgs, or_dash};
use crate::output::{pretty_kv, pretty_section, render, render_mode, write_badges};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use memories_core::board::post::{
    PostQuery, PostSort, create_post, delete_post, get_post, is_post_public, like_post,
    list_posts, update_post, verify_post_password,
};
use memories_core::model::post::{NewPost, Post, PostPatch};
use memories_core::model::{GroupId, PostId};
use serde_json::json;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct PostArgs {
    #[command(subcommand)]
    pub command: PostCommand,
}

#[derive(Subcommand, Debug)]
pub enum PostCommand {
    /// Post a memory to a group
    Create(CreateArgs),
    /// List a group's posts
    List(ListArgs),
    /// Show one post with its tags
    Show { id: PostId },
    /// Change post fields
    Update(UpdateArgs),
    /// Delete a post
    Delete(AuthArgs),
    /// Check a post password
    Verify(AuthArgs),
    /// Report whether a post is public
    Public { id: PostId },
    /// Add one like to a post
    Like { id: PostId },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Group to post into.
    pub group_id: GroupId,

    #[arg(long)]
    pub nickname: String,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub content: String,

    /// Optional password; without one anybody may edit the post.
    #[arg(long)]
    pub password: Option<String>,

    #[arg(long)]
    pub image_url: Option<String>,

    /// Tag name; repeat for several tags.
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub location: Option<String>,

    /// Date the memory happened (YYYY-MM-DD).
    #[arg(long)]
    pub moment: Option<NaiveDate>,

    #[arg(long, value_name = "BOOL")]
    pub public: Option<bool>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    pub group_id: GroupId,

    #[command(flatten)]
    pub page: PageArgs,

    /// latest, mostCommented, or mostLiked.
    #[arg(long, default_value_t = PostSort::Latest)]
    pub sort: PostSort,

    /// Case-insensitive substring of the title, the content, or a tag.
    #[arg(long)]
    pub keyword: Option<String>,

    #[arg(long, value_name = "BOOL")]
    pub public: Option<bool>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: PostId,

    #[arg(long)]
    pub password: Option<String>,

    #[arg(long)]
    pub nickname: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub content: Option<String>,

    #[arg(long)]
    pub image_url: Option<String>,

    /// Replacement tag set; repeat for several tags.
    #[arg(long = "tag", value_name = "TAG", conflicts_with = "clear_tags")]
    pub tags: Vec<String>,

    /// Remove every tag.
    #[arg(long)]
    pub clear_tags: bool,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub moment: Option<NaiveDate>,

    #[arg(long, value_name = "BOOL")]
    pub public: Option<bool>,
}

impl UpdateArgs {
    fn patch(&self) -> PostPatch {
        let tags = if self.clear_tags {
            Some(Vec::new())
        } else if self.tags.is_empty() {
            None
        } else {
            Some(self.tags.clone())
        };
        PostPatch {
            nickname: self.nickname.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            image_url: self.image_url.clone(),
            tags,
            location: self.location.clone(),
            moment: self.moment,
            is_public: self.public,
        }
    }
}

#[derive(Args, Debug)]
pub struct AuthArgs {
    pub id: PostId,

    /// Required only when the post was created with a password.
    #[arg(long)]
    pub password: Option<String>,
}

fn write_post(w: &mut dyn Write, post: &Post) -> io::Result<()> {
    pretty_section(w, &format!("Post {} · {}", post.id, post.title))?;
    pretty_kv(w, "Group", post.group_id.to_string())?;
    pretty_kv(w, "By", &post.nickname)?;
    pretty_kv(w, "Public", post.is_public.to_string())?;
    let tags = if post.tags.is_empty() {
        "-".to_string()
    } else {
        post.tags.join(", ")
    };
    pretty_kv(w, "Tags", tags)?;
    pretty_kv(w, "Location", or_dash(post.location.as_deref()))?;
    pretty_kv(
        w,
        "Moment",
        post.moment.map_or_else(|| "-".to_string(), |d| d.to_string()),
    )?;
    pretty_kv(w, "Likes", post.like_count.to_string())?;
    pretty_kv(w, "Comments", post.comment_count.to_string())?;
    pretty_kv(w, "Created", post.created_at.to_rfc3339())?;
    writeln!(w)?;
    writeln!(w, "{}", post.content)
}

fn write_post_row(w: &mut dyn Write, post: &Post) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}\t{}",
        post.id,
        post.title,
        post.nickname,
        post.like_count,
        post.comment_count,
        post.tags.join(",")
    )
}

/// Execute `mg post <command>`.
///
/// # Errors
///
/// Returns an error if the board is not initialized, the operation is
/// rejected, or output fails.
pub fn run_post(args: &PostArgs, ctx: &Ctx) -> Result<()> {
    let conn = ctx.open()?;
    let now = Utc::now();
    let badges = &ctx.config.project.badges;

    match &args.command {
        PostCommand::Create(create) => {
            let new = NewPost {
                nickname: create.nickname.clone(),
                title: create.title.clone(),
                content: create.content.clone(),
                password: create.password.clone(),
                image_url: create.image_url.clone(),
                tags: create.tags.clone(),
                location: create.location.clone(),
                moment: create.moment,
                is_public: create.public,
            };
            let created = create_post(&conn, badges, create.group_id, &new, now)
                .map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &created, |t, w| {
                writeln!(
                    w,
                    "Created post {} in group {}: {}",
                    t.value.id, t.value.group_id, t.value.title
                )?;
                write_badges(w, &t.badges)
            })
        }
        PostCommand::List(list) => {
            let query = PostQuery {
                page: list.page.into(),
                sort: list.sort,
                keyword: list.keyword.clone(),
                is_public: list.public,
            };
            let page =
                list_posts(&conn, list.group_id, &query).map_err(|e| ctx.board_failure(&e))?;
            render_mode(
                ctx.output,
                &page,
                |p, w| {
                    for post in &p.data {
                        write_post_row(w, post)?;
                    }
                    Ok(())
                },
                |p, w| {
                    if p.data.is_empty() {
                        return writeln!(w, "No posts found.");
                    }
                    for post in &p.data {
                        write_post(w, post)?;
                        writeln!(w)?;
                    }
                    writeln!(
                        w,
                        "page {}/{} · {} posts",
                        p.current_page, p.total_pages, p.total_item_count
                    )
                },
            )
        }
        PostCommand::Show { id } => {
            let post = get_post(&conn, *id).map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &post, |p, w| write_post(w, p))
        }
        PostCommand::Update(update) => {
            let post = update_post(&conn, update.id, update.password.as_deref(), &update.patch())
                .map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &post, |p, w| writeln!(w, "Updated post {}", p.id))
        }
        PostCommand::Delete(target) => {
            delete_post(&conn, target.id, target.password.as_deref())
                .map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &json!({ "id": target.id, "deleted": true }), |_, w| {
                writeln!(w, "Deleted post {}", target.id)
            })
        }
        PostCommand::Verify(target) => {
            verify_post_password(&conn, target.id, target.password.as_deref())
                .map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &json!({ "id": target.id, "verified": true }), |_, w| {
                writeln!(w, "Password verified for post {}", target.id)
            })
        }
        PostCommand::Public { id } => {
            let visibility = is_post_public(&conn, *id).map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &visibility, |v, w| {
                writeln!(
                    w,
                    "Post {} is {}",
                    v.id,
                    if v.is_public { "public" } else { "private" }
                )
            })
        }
        PostCommand::Like { id } => {
            let liked = like_post(&conn, badges, *id, now).map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &liked, |t, w| {
                writeln!(w, "Post {} now has {} likes", t.value.id, t.value.like_count)?;
                write_badges(w, &t.badges)
            })
        }
    }
}
