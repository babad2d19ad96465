//! Group CRUD and group likes.

use super::{
    BoardError, Page, PageRequest, Triggered, check_password, like_pattern, required,
    required_password, timestamp_column,
};
use crate::badge::triggers::after_group_liked;
use crate::config::BadgeSettings;
use crate::db::store::SqliteStore;
use crate::db::to_micros;
use crate::model::group::{EarnedBadge, Group, GroupDetail, GroupPatch, NewGroup};
use crate::model::{GroupId, counter};
use crate::password::hash_password;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::fmt;
use std::str::FromStr;
use tracing::info;

const GROUP_COLUMNS: &str = "g.group_id, g.name, g.image_url, g.is_public, g.introduction, \
     g.like_count, g.post_count, \
     (SELECT COUNT(*) FROM group_badges gb WHERE gb.group_id = g.group_id) AS badge_count, \
     g.created_at_us";

/// Sort order for group listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupSort {
    #[default]
    Latest,
    MostPosted,
    MostLiked,
    MostBadge,
}

impl GroupSort {
    const fn sql_clause(self) -> &'static str {
        match self {
            Self::Latest => "ORDER BY g.created_at_us DESC, g.group_id DESC",
            Self::MostPosted => "ORDER BY g.post_count DESC, g.created_at_us DESC, g.group_id DESC",
            Self::MostLiked => "ORDER BY g.like_count DESC, g.created_at_us DESC, g.group_id DESC",
            Self::MostBadge => "ORDER BY badge_count DESC, g.created_at_us DESC, g.group_id DESC",
        }
    }
}

impl fmt::Display for GroupSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::MostPosted => f.write_str("mostPosted"),
            Self::MostLiked => f.write_str("mostLiked"),
            Self::MostBadge => f.write_str("mostBadge"),
        }
    }
}

impl FromStr for GroupSort {
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
            "mostposted" => Ok(Self::MostPosted),
            "mostliked" => Ok(Self::MostLiked),
            "mostbadge" => Ok(Self::MostBadge),
            _ => Err(BoardError::InvalidInput(format!(
                "unknown group sort '{s}': expected one of latest, mostPosted, mostLiked, mostBadge"
            ))),
        }
    }
}

/// Filters and paging for [`list_groups`].
#[derive(Debug, Clone, Default)]
pub struct GroupQuery {
    pub page: PageRequest,
    pub sort: GroupSort,
    /// Case-insensitive substring of the group name.
    pub keyword: Option<String>,
    pub is_public: Option<bool>,
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: GroupId::new(row.get(0)?),
        name: row.get(1)?,
        image_url: row.get(2)?,
        is_public: row.get(3)?,
        introduction: row.get(4)?,
        like_count: counter(row.get(5)?),
        post_count: counter(row.get(6)?),
        badge_count: counter(row.get(7)?),
        created_at: timestamp_column(row, 8)?,
    })
}

/// Create a group. `is_public` defaults to true.
///
/// # Errors
///
/// Returns [`BoardError::InvalidInput`] for a blank name,
/// [`BoardError::PasswordRequired`] for an empty password, or a storage error.
pub fn create_group(
    conn: &Connection,
    new: &NewGroup,
    now: DateTime<Utc>,
) -> Result<Group, BoardError> {
    let name = required("name", &new.name)?;
    let password_hash = hash_password(required_password(&new.password)?)?;

    conn.execute(
        "INSERT INTO groups (name, password_hash, image_url, is_public, introduction, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            name,
            password_hash,
            new.image_url,
            new.is_public.unwrap_or(true),
            new.introduction,
            to_micros(now),
        ],
    )?;
    let id = GroupId::new(conn.last_insert_rowid());
    info!(group_id = %id, "group created");

    get_group(conn, id)
}

/// List groups, one page at a time.
///
/// # Errors
///
/// Returns a storage error if a query fails.
pub fn list_groups(conn: &Connection, query: &GroupQuery) -> Result<Page<Group>, BoardError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(keyword) = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        param_values.push(Box::new(like_pattern(keyword)));
        conditions.push(format!("g.name LIKE ?{} ESCAPE '\\'", param_values.len()));
    }

    if let Some(is_public) = query.is_public {
        param_values.push(Box::new(is_public));
        conditions.push(format!("g.is_public = ?{}", param_values.len()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(AsRef::as_ref).collect();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM groups g{where_clause}"),
        params_from_iter(params_ref.iter()),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {GROUP_COLUMNS} FROM groups g{where_clause} {}{}",
        query.sort.sql_clause(),
        query.page.limit_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params_ref.iter()), row_to_group)?;

    let mut groups = Vec::new();
    for row in rows {
        groups.push(row?);
    }
    Ok(query.page.into_page(counter(total), groups))
}

/// Fetch one group.
///
/// # Errors
///
/// Returns [`BoardError::GroupNotFound`] if the id is unknown.
pub fn get_group(conn: &Connection, id: GroupId) -> Result<Group, BoardError> {
    conn.query_row(
        &format!("SELECT {GROUP_COLUMNS} FROM groups g WHERE g.group_id = ?1"),
        params![id.get()],
        row_to_group,
    )
    .optional()?
    .ok_or(BoardError::GroupNotFound(id))
}

/// Fetch one group with its earned badges.
///
/// # Errors
///
/// Returns [`BoardError::GroupNotFound`] if the id is unknown.
pub fn get_group_detail(conn: &Connection, id: GroupId) -> Result<GroupDetail, BoardError> {
    let group = get_group(conn, id)?;
    let badges = group_badges(conn, id)?;
    Ok(GroupDetail { group, badges })
}

/// Badges a group has earned, oldest grant first.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn group_badges(conn: &Connection, id: GroupId) -> Result<Vec<EarnedBadge>, BoardError> {
    let mut stmt = conn.prepare(
        "SELECT gb.badge_id, b.name, gb.granted_at_us \
         FROM group_badges gb \
         INNER JOIN badges b ON b.badge_id = gb.badge_id \
         WHERE gb.group_id = ?1 \
         ORDER BY gb.granted_at_us ASC, gb.badge_id ASC",
    )?;
    let rows = stmt.query_map(params![id.get()], |row| {
        Ok(EarnedBadge {
            badge_id: row.get(0)?,
            name: row.get(1)?,
            granted_at: timestamp_column(row, 2)?,
        })
    })?;

    let mut badges = Vec::new();
    for row in rows {
        badges.push(row?);
    }
    Ok(badges)
}

fn password_hash(conn: &Connection, id: GroupId) -> Result<String, BoardError> {
    conn.query_row(
        "SELECT password_hash FROM groups WHERE group_id = ?1",
        params![id.get()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(BoardError::GroupNotFound(id))
}

/// Check a group's password.
///
/// # Errors
///
/// Returns [`BoardError::WrongPassword`] on mismatch and
/// [`BoardError::GroupNotFound`] if the id is unknown.
pub fn verify_group_password(
    conn: &Connection,
    id: GroupId,
    password: &str,
) -> Result<(), BoardError> {
    let hash = password_hash(conn, id)?;
    check_password(required_password(password)?, &hash)
}

/// Apply `patch` after checking the group password.
///
/// # Errors
///
/// Returns [`BoardError::InvalidInput`] for an empty patch or a blank new
/// name, [`BoardError::WrongPassword`], [`BoardError::GroupNotFound`], or a
/// storage error.
pub fn update_group(
    conn: &Connection,
    id: GroupId,
    password: &str,
    patch: &GroupPatch,
) -> Result<Group, BoardError> {
    if patch.is_empty() {
        return Err(BoardError::InvalidInput("no fields to update".to_string()));
    }
    verify_group_password(conn, id, password)?;

    let name = patch.name.as_deref().map(|n| required("name", n)).transpose()?;
    conn.execute(
        "UPDATE groups SET \
         name = COALESCE(?2, name), \
         image_url = COALESCE(?3, image_url), \
         is_public = COALESCE(?4, is_public), \
         introduction = COALESCE(?5, introduction) \
         WHERE group_id = ?1",
        params![
            id.get(),
            name,
            patch.image_url,
            patch.is_public,
            patch.introduction
        ],
    )?;
    info!(group_id = %id, "group updated");

    get_group(conn, id)
}

/// Delete a group after checking its password. Posts, comments, and badge
/// grants go with it.
///
/// # Errors
///
/// Returns [`BoardError::WrongPassword`] or [`BoardError::GroupNotFound`].
pub fn delete_group(conn: &Connection, id: GroupId, password: &str) -> Result<(), BoardError> {
    verify_group_password(conn, id, password)?;
    conn.execute("DELETE FROM groups WHERE group_id = ?1", params![id.get()])?;
    info!(group_id = %id, "group deleted");
    Ok(())
}

/// Add one like, then check the group-likes badge.
///
/// # Errors
///
/// Returns [`BoardError::GroupNotFound`] if the id is unknown. Badge check
/// failures are reported in the result, never as an error.
pub fn like_group(
    conn: &Connection,
    settings: &BadgeSettings,
    id: GroupId,
    now: DateTime<Utc>,
) -> Result<Triggered<Group>, BoardError> {
    let changed = conn.execute(
        "UPDATE groups SET like_count = like_count + 1 WHERE group_id = ?1",
        params![id.get()],
    )?;
    if changed == 0 {
        return Err(BoardError::GroupNotFound(id));
    }

    let badges = after_group_liked(&SqliteStore::new(conn), settings, id, now);
    Ok(Triggered {
        value: get_group(conn, id)?,
        badges,
    })
}
