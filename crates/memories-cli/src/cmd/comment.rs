//! `mg comment`: comments on posts.

use super::{Ctx, PageArgs};
use crate::output::{render, render_mode};
use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use memories_core::board::comment::{add_comment, delete_comment, list_comments};
use memories_core::model::comment::NewComment;
use memories_core::model::{CommentId, PostId};
use serde_json::json;
use std::io::Write;

#[derive(Args, Debug)]
pub struct CommentArgs {
    #[command(subcommand)]
    pub command: CommentCommand,
}

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
    /// Comment on a post
    Add {
        post_id: PostId,
        #[arg(long)]
        nickname: String,
        #[arg(long)]
        content: String,
        /// Needed later to delete the comment.
        #[arg(long)]
        password: String,
    },
    /// List a post's comments, newest first
    List {
        post_id: PostId,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Delete a comment
    Delete {
        id: CommentId,
        #[arg(long)]
        password: String,
    },
}

/// Execute `mg comment <command>`.
///
/// # Errors
///
/// Returns an error if the board is not initialized, the operation is
/// rejected, or output fails.
pub fn run_comment(args: &CommentArgs, ctx: &Ctx) -> Result<()> {
    let conn = ctx.open()?;

    match &args.command {
        CommentCommand::Add {
            post_id,
            nickname,
            content,
            password,
        } => {
            let new = NewComment {
                nickname: nickname.clone(),
                content: content.clone(),
                password: password.clone(),
            };
            let comment = add_comment(&conn, *post_id, &new, Utc::now())
                .map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &comment, |c, w| {
                writeln!(w, "Added comment {} to post {}", c.id, c.post_id)
            })
        }
        CommentCommand::List { post_id, page } => {
            let page = list_comments(&conn, *post_id, (*page).into())
                .map_err(|e| ctx.board_failure(&e))?;
            render_mode(
                ctx.output,
                &page,
                |p, w| {
                    for c in &p.data {
                        writeln!(
                            w,
                            "{}\t{}\t{}\t{}",
                            c.id,
                            c.nickname,
                            c.created_at.to_rfc3339(),
                            c.content
                        )?;
                    }
                    Ok(())
                },
                |p, w| {
                    if p.data.is_empty() {
                        return writeln!(w, "No comments yet.");
                    }
                    for c in &p.data {
                        let when = c.created_at.format("%Y-%m-%d %H:%M");
                        writeln!(w, "[{}] {} · {when}", c.id, c.nickname)?;
                        writeln!(w, "    {}", c.content)?;
                    }
                    writeln!(
                        w,
                        "page {}/{} · {} comments",
                        p.current_page, p.total_pages, p.total_item_count
                    )
                },
            )
        }
        CommentCommand::Delete { id, password } => {
            delete_comment(&conn, *id, password).map_err(|e| ctx.board_failure(&e))?;
            render(ctx.output, &json!({ "id": id, "deleted": true }), |_, w| {
                writeln!(w, "Deleted comment {id}")
            })
        }
    }
}
