//! Posts ("memories"), their tags, and post likes.

use super::{
    BoardError, Page, PageRequest, Triggered, check_password, like_pattern, required,
    timestamp_column, write_transaction,
};
use crate::badge::triggers::{after_post_created, after_post_liked};
use crate::config::BadgeSettings;
use crate::db::store::SqliteStore;
use crate::db::to_micros;
use crate::model::post::{NewPost, Post, PostPatch, PostVisibility};
use crate::model::{GroupId, PostId, counter};
use crate::password::hash_password;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::fmt;
use std::str::FromStr;
use tracing::info;

const MOMENT_FORMAT: &str = "%Y-%m-%d";

const POST_COLUMNS: &str = "p.post_id, p.group_id, p.nickname, p.title, p.content, p.image_url, \
     p.location, p.moment, p.is_public, p.like_count, p.comment_count, p.created_at_us";

/// Sort order for post listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostSort {
    #[default]
    Latest,
    MostCommented,
    MostLiked,
}

impl PostSort {
    const fn sql_clause(self) -> &'static str {
        match self {
            Self::Latest => "ORDER BY p.created_at_us DESC, p.post_id DESC",
            Self::MostCommented => {
                "ORDER BY p.comment_count DESC, p.created_at_us DESC, p.post_id DESC"
            }
            Self::MostLiked => "ORDER BY p.like_count DESC, p.created_at_us DESC, p.post_id DESC",
        }
    }
}

impl fmt::Display for PostSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::MostCommented => f.write_str("mostCommented"),
            Self::MostLiked => f.write_str("mostLiked"),
        }
    }
}

impl FromStr for PostSort {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "latest" => Ok(Self::Latest),
            "mostcommented" => Ok(Self::MostCommented),
            "mostliked" => Ok(Self::MostLiked),
            _ => Err(BoardError::InvalidInput(format!(
                "unknown post sort '{s}': expected one of latest, mostCommented, mostLiked"
            ))),
        }
    }
}

/// Filters and paging for [`list_posts`].
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub page: PageRequest,
    pub sort: PostSort,
    /// Case-insensitive substring of the title, the content, or a tag.
    pub keyword: Option<String>,
    pub is_public: Option<bool>,
}

/// Trimmed, non-blank, first-occurrence-order tag names.
fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !seen.iter().any(|s: &String| s == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

fn moment_text(moment: Option<NaiveDate>) -> Option<String> {
    moment.map(|d| d.format(MOMENT_FORMAT).to_string())
}

fn moment_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        NaiveDate::parse_from_str(&text, MOMENT_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId::new(row.get(0)?),
        group_id: GroupId::new(row.get(1)?),
        nickname: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        image_url: row.get(5)?,
        tags: Vec::new(),
        location: row.get(6)?,
        moment: moment_column(row, 7)?,
        is_public: row.get(8)?,
        like_count: counter(row.get(9)?),
        comment_count: counter(row.get(10)?),
        created_at: timestamp_column(row, 11)?,
    })
}

/// Connect the post to each tag, creating tags that do not exist yet.
fn attach_tags(conn: &Connection, post_id: PostId, tags: &[String]) -> rusqlite::Result<()> {
    let mut upsert = conn.prepare_cached("INSERT OR IGNORE INTO tags (tag_name) VALUES (?1)")?;
    let mut link = conn.prepare_cached(
        "INSERT OR IGNORE INTO post_tags (post_id, tag_id) \
         SELECT ?1, tag_id FROM tags WHERE tag_name = ?2",
    )?;
    for tag in tags {
        upsert.execute(params![tag])?;
        link.execute(params![post_id.get(), tag])?;
    }
    Ok(())
}

fn load_tags(conn: &Connection, post_id: PostId) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.tag_name FROM post_tags pt \
         INNER JOIN tags t ON t.tag_id = pt.tag_id \
         WHERE pt.post_id = ?1 ORDER BY pt.rowid ASC",
    )?;
    let rows = stmt.query_map(params![post_id.get()], |row| row.get(0))?;
    rows.collect()
}

fn group_exists(conn: &Connection, group_id: GroupId) -> Result<bool, BoardError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM groups WHERE group_id = ?1",
            params![group_id.get()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

/// Create a post in `group_id`, then run the post-created badge checks.
///
/// # Errors
///
/// Returns [`BoardError::InvalidInput`] when nickname, title, or content is
/// blank, [`BoardError::GroupNotFound`] for an unknown group, or a storage
/// error. Badge check failures never surface here.
pub fn create_post(
    conn: &Connection,
    settings: &BadgeSettings,
    group_id: GroupId,
    new: &NewPost,
    now: DateTime<Utc>,
) -> Result<Triggered<Post>, BoardError> {
    let nickname = required("nickname", &new.nickname)?;
    let title = required("title", &new.title)?;
    let content = required("content", &new.content)?;
    let password_hash = new
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(hash_password)
        .transpose()?;
    let tags = normalize_tags(&new.tags);

    let tx = write_transaction(conn)?;
    if !group_exists(&tx, group_id)? {
        return Err(BoardError::GroupNotFound(group_id));
    }
    tx.execute(
        "INSERT INTO posts (group_id, nickname, title, content, password_hash, image_url, \
         location, moment, is_public, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            group_id.get(),
            nickname,
            title,
            content,
            password_hash,
            new.image_url,
            new.location,
            moment_text(new.moment),
            new.is_public.unwrap_or(true),
            to_micros(now),
        ],
    )?;
    let post_id = PostId::new(tx.last_insert_rowid());
    attach_tags(&tx, post_id, &tags)?;
    tx.execute(
        "UPDATE groups SET post_count = post_count + 1 WHERE group_id = ?1",
        params![group_id.get()],
    )?;
    tx.commit()?;
    info!(post_id = %post_id, group_id = %group_id, "post created");

    let badges = after_post_created(&SqliteStore::new(conn), settings, group_id, now);
    Ok(Triggered {
        value: get_post(conn, post_id)?,
        badges,
    })
}

/// List a group's posts, one page at a time.
///
/// `total_item_count` counts the posts that match the same filters.
///
/// # Errors
///
/// Returns [`BoardError::GroupNotFound`] for an unknown group, or a storage
/// error.
pub fn list_posts(
    conn: &Connection,
    group_id: GroupId,
    query: &PostQuery,
) -> Result<Page<Post>, BoardError> {
    if !group_exists(conn, group_id)? {
        return Err(BoardError::GroupNotFound(group_id));
    }

    let mut conditions = vec!["p.group_id = ?1".to_string()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(group_id.get())];

    if let Some(keyword) = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        param_values.push(Box::new(like_pattern(keyword)));
        let n = param_values.len();
        conditions.push(format!(
            "(p.title LIKE ?{n} ESCAPE '\\' OR p.content LIKE ?{n} ESCAPE '\\' \
             OR EXISTS (SELECT 1 FROM post_tags pt INNER JOIN tags t ON t.tag_id = pt.tag_id \
             WHERE pt.post_id = p.post_id AND t.tag_name LIKE ?{n} ESCAPE '\\'))"
        ));
    }

    if let Some(is_public) = query.is_public {
        param_values.push(Box::new(is_public));
        conditions.push(format!("p.is_public = ?{}", param_values.len()));
    }

    let where_clause = format!(" WHERE {}", conditions.join(" AND "));
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(AsRef::as_ref).collect();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM posts p{where_clause}"),
        params_from_iter(params_ref.iter()),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts p{where_clause} {}{}",
        query.sort.sql_clause(),
        query.page.limit_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params_ref.iter()), row_to_post)?;

    let mut posts = Vec::new();
    for row in rows {
        let mut post = row?;
        post.tags = load_tags(conn, post.id)?;
        posts.push(post);
    }
    Ok(query.page.into_page(counter(total), posts))
}

/// Fetch one post with its tags.
///
/// # Errors
///
/// Returns [`BoardError::PostNotFound`] if the id is unknown.
pub fn get_post(conn: &Connection, id: PostId) -> Result<Post, BoardError> {
    let mut post = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.post_id = ?1"),
            params![id.get()],
            row_to_post,
        )
        .optional()?
        .ok_or(BoardError::PostNotFound(id))?;
    post.tags = load_tags(conn, id)?;
    Ok(post)
}

fn password_hash(conn: &Connection, id: PostId) -> Result<Option<String>, BoardError> {
    conn.query_row(
        "SELECT password_hash FROM posts WHERE post_id = ?1",
        params![id.get()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(BoardError::PostNotFound(id))
}

/// A post without a password is open to anyone; one with a password needs it.
fn authorize(conn: &Connection, id: PostId, password: Option<&str>) -> Result<(), BoardError> {
    match password_hash(conn, id)? {
        None => Ok(()),
        Some(hash) => match password.filter(|p| !p.is_empty()) {
            None => Err(BoardError::PasswordRequired),
            Some(password) => check_password(password, &hash),
        },
    }
}

/// Check a post's password.
///
/// # Errors
///
/// Returns [`BoardError::WrongPassword`] on mismatch,
/// [`BoardError::PasswordRequired`] when the post has one and none was given,
/// and [`BoardError::PostNotFound`] if the id is unknown.
pub fn verify_post_password(
    conn: &Connection,
    id: PostId,
    password: Option<&str>,
) -> Result<(), BoardError> {
    authorize(conn, id, password)
}

/// Whether the post is public.
///
/// # Errors
///
/// Returns [`BoardError::PostNotFound`] if the id is unknown.
pub fn is_post_public(conn: &Connection, id: PostId) -> Result<PostVisibility, BoardError> {
    conn.query_row(
        "SELECT is_public FROM posts WHERE post_id = ?1",
        params![id.get()],
        |row| row.get(0),
    )
    .optional()?
    .map(|is_public| PostVisibility { id, is_public })
    .ok_or(BoardError::PostNotFound(id))
}

/// Apply `patch` after checking the post password. `tags: Some(..)` replaces
/// the whole tag set.
///
/// # Errors
///
/// Returns [`BoardError::InvalidInput`] for an empty patch or a blank
/// required field, a password error, [`BoardError::PostNotFound`], or a
/// storage error.
pub fn update_post(
    conn: &Connection,
    id: PostId,
    password: Option<&str>,
    patch: &PostPatch,
) -> Result<Post, BoardError> {
    if patch.is_empty() {
        return Err(BoardError::InvalidInput("no fields to update".to_string()));
    }
    authorize(conn, id, password)?;

    let nickname = patch
        .nickname
        .as_deref()
        .map(|v| required("nickname", v))
        .transpose()?;
    let title = patch.title.as_deref().map(|v| required("title", v)).transpose()?;
    let content = patch
        .content
        .as_deref()
        .map(|v| required("content", v))
        .transpose()?;

    let tx = write_transaction(conn)?;
    tx.execute(
        "UPDATE posts SET \
         nickname = COALESCE(?2, nickname), \
         title = COALESCE(?3, title), \
         content = COALESCE(?4, content), \
         image_url = COALESCE(?5, image_url), \
         location = COALESCE(?6, location), \
         moment = COALESCE(?7, moment), \
         is_public = COALESCE(?8, is_public) \
         WHERE post_id = ?1",
        params![
            id.get(),
            nickname,
            title,
            content,
            patch.image_url,
            patch.location,
            moment_text(patch.moment),
            patch.is_public,
        ],
    )?;
    if let Some(tags) = &patch.tags {
        tx.execute("DELETE FROM post_tags WHERE post_id = ?1", params![id.get()])?;
        attach_tags(&tx, id, &normalize_tags(tags))?;
    }
    tx.commit()?;
    info!(post_id = %id, "post updated");

    get_post(conn, id)
}

/// Delete a post after checking its password, and decrement the group's
/// post count.
///
/// # Errors
///
/// Returns a password error, [`BoardError::PostNotFound`], or a storage
/// error.
pub fn delete_post(
    conn: &Connection,
    id: PostId,
    password: Option<&str>,
) -> Result<(), BoardError> {
    authorize(conn, id, password)?;

    let tx = write_transaction(conn)?;
    let group_id: i64 = tx.query_row(
        "SELECT group_id FROM posts WHERE post_id = ?1",
        params![id.get()],
        |row| row.get(0),
    )?;
    tx.execute("DELETE FROM posts WHERE post_id = ?1", params![id.get()])?;
    tx.execute(
        "UPDATE groups SET post_count = MAX(post_count - 1, 0) WHERE group_id = ?1",
        params![group_id],
    )?;
    tx.commit()?;
    info!(post_id = %id, group_id, "post deleted");
    Ok(())
}

/// Add one like, then check the post-likes badge for the owning group.
///
/// # Errors
///
/// Returns [`BoardError::PostNotFound`] if the id is unknown. Badge check
/// failures are reported in the result, never as an error.
pub fn like_post(
    conn: &Connection,
    settings: &BadgeSettings,
    id: PostId,
    now: DateTime<Utc>,
) -> Result<Triggered<Post>, BoardError> {
    let changed = conn.execute(
        "UPDATE posts SET like_count = like_count + 1 WHERE post_id = ?1",
        params![id.get()],
    )?;
    if changed == 0 {
        return Err(BoardError::PostNotFound(id));
    }

    let badges = after_post_liked(&SqliteStore::new(conn), settings, id, now);
    Ok(Triggered {
        value: get_post(conn, id)?,
        badges,
    })
}
