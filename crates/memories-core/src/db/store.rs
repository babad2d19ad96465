//! [`BadgeStore`] backed by the board database.

use super::{from_micros, to_micros};
use crate::badge::{BadgeId, BadgeStore, PostLikes, StoreError};
use crate::model::{GroupId, PostId, counter};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, ffi, params};

/// Badge persistence over one connection.
///
/// Connections are not shared between threads; each worker opens its own and
/// wraps it here. The grant insert is a plain `INSERT`, so the
/// `group_badges` primary key is what decides concurrent awards.
#[derive(Debug, Clone, Copy)]
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    #[must_use]
    pub const fn connection(&self) -> &'c Connection {
        self.conn
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Which constraint a failed statement violated, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Violation {
    Unique,
    ForeignKey,
}

pub(crate) fn constraint_violation(err: &rusqlite::Error) -> Option<Violation> {
    let rusqlite::Error::SqliteFailure(failure, _) = err else {
        return None;
    };
    if failure.code != ErrorCode::ConstraintViolation {
        return None;
    }
    match failure.extended_code {
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
            Some(Violation::Unique)
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Violation::ForeignKey),
        _ => None,
    }
}

fn instant(us: i64) -> Result<DateTime<Utc>, StoreError> {
    from_micros(us).ok_or(StoreError::InvalidTimestamp(us))
}

const fn group_missing(group_id: GroupId) -> StoreError {
    StoreError::NotFound {
        entity: "group",
        id: group_id.get(),
    }
}

impl BadgeStore for SqliteStore<'_> {
    fn count_posts(&self, group_id: GroupId) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE group_id = ?1",
            params![group_id.get()],
            |row| row.get(0),
        )?;
        Ok(counter(count))
    }

    fn post_times_between(
        &self,
        group_id: GroupId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT created_at_us FROM posts \
             WHERE group_id = ?1 AND created_at_us BETWEEN ?2 AND ?3 \
             ORDER BY created_at_us ASC",
        )?;
        let rows = stmt.query_map(
            params![group_id.get(), to_micros(from), to_micros(to)],
            |row| row.get::<_, i64>(0),
        )?;

        let mut times = Vec::new();
        for row in rows {
            times.push(instant(row?)?);
        }
        Ok(times)
    }

    fn group_created_at(&self, group_id: GroupId) -> Result<DateTime<Utc>, StoreError> {
        let us: Option<i64> = self
            .conn
            .query_row(
                "SELECT created_at_us FROM groups WHERE group_id = ?1",
                params![group_id.get()],
                |row| row.get(0),
            )
            .optional()?;
        instant(us.ok_or_else(|| group_missing(group_id))?)
    }

    fn group_like_count(&self, group_id: GroupId) -> Result<u64, StoreError> {
        let likes: Option<i64> = self
            .conn
            .query_row(
                "SELECT like_count FROM groups WHERE group_id = ?1",
                params![group_id.get()],
                |row| row.get(0),
            )
            .optional()?;
        likes.map(counter).ok_or_else(|| group_missing(group_id))
    }

    fn post_likes(&self, post_id: PostId) -> Result<PostLikes, StoreError> {
        self.conn
            .query_row(
                "SELECT group_id, like_count FROM posts WHERE post_id = ?1",
                params![post_id.get()],
                |row| {
                    Ok(PostLikes {
                        group_id: GroupId::new(row.get(0)?),
                        like_count: counter(row.get(1)?),
                    })
                },
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                entity: "post",
                id: post_id.get(),
            })
    }

    fn has_grant(&self, group_id: GroupId, badge: BadgeId) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM group_badges WHERE group_id = ?1 AND badge_id = ?2",
                params![group_id.get(), badge.id()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_grant(
        &self,
        group_id: GroupId,
        badge: BadgeId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = self.conn.execute(
            "INSERT INTO group_badges (group_id, badge_id, granted_at_us) VALUES (?1, ?2, ?3)",
            params![group_id.get(), badge.id(), to_micros(at)],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) => match constraint_violation(&err) {
                Some(Violation::Unique) => Err(StoreError::DuplicateGrant { group_id, badge }),
                Some(Violation::ForeignKey) => Err(group_missing(group_id)),
                None => Err(err.into()),
            },
        }
    }

    fn list_group_ids(&self) -> Result<Vec<GroupId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT group_id FROM groups ORDER BY group_id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(GroupId::new(row?));
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::{Duration, TimeZone};

    fn insert_group(conn: &Connection, created: DateTime<Utc>) -> GroupId {
        conn.execute(
            "INSERT INTO groups (name, password_hash, created_at_us) VALUES ('trip', 'x', ?1)",
            params![to_micros(created)],
        )
        .expect("insert group");
        GroupId::new(conn.last_insert_rowid())
    }

    fn insert_post(
        conn: &Connection,
        group_id: GroupId,
        created: DateTime<Utc>,
        likes: i64,
    ) -> PostId {
        conn.execute(
            "INSERT INTO posts (group_id, nickname, title, content, like_count, created_at_us) \
             VALUES (?1, 'n', 't', 'c', ?2, ?3)",
            params![group_id.get(), likes, to_micros(created)],
        )
        .expect("insert post");
        PostId::new(conn.last_insert_rowid())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn duplicate_grant_is_classified() {
        let conn = open_in_memory().expect("open db");
        let store = SqliteStore::new(&conn);
        let group = insert_group(&conn, t0());

        store
            .insert_grant(group, BadgeId::GroupAge, t0())
            .expect("first insert");
        let err = store
            .insert_grant(group, BadgeId::GroupAge, t0())
            .expect_err("second insert conflicts");
        assert!(matches!(err, StoreError::DuplicateGrant { .. }));
        assert!(store.has_grant(group, BadgeId::GroupAge).expect("query"));
    }

    #[test]
    fn grant_for_missing_group_is_not_found() {
        let conn = open_in_memory().expect("open db");
        let store = SqliteStore::new(&conn);

        let err = store
            .insert_grant(GroupId::new(77), BadgeId::PostCount, t0())
            .expect_err("foreign key");
        assert!(matches!(err, StoreError::NotFound { entity: "group", id: 77 }));
    }

    #[test]
    fn post_times_are_bounded_and_ordered() {
        let conn = open_in_memory().expect("open db");
        let store = SqliteStore::new(&conn);
        let group = insert_group(&conn, t0());
        insert_post(&conn, group, t0() + Duration::hours(5), 0);
        insert_post(&conn, group, t0() - Duration::hours(1), 0);
        insert_post(&conn, group, t0(), 0);
        insert_post(&conn, group, t0() + Duration::days(3), 0);

        let times = store
            .post_times_between(group, t0(), t0() + Duration::days(1))
            .expect("query");
        assert_eq!(times, vec![t0(), t0() + Duration::hours(5)]);
        assert_eq!(store.count_posts(group).expect("count"), 4);
    }

    #[test]
    fn reads_report_missing_rows() {
        let conn = open_in_memory().expect("open db");
        let store = SqliteStore::new(&conn);

        assert!(matches!(
            store.group_created_at(GroupId::new(1)),
            Err(StoreError::NotFound { entity: "group", .. })
        ));
        assert!(matches!(
            store.group_like_count(GroupId::new(1)),
            Err(StoreError::NotFound { entity: "group", .. })
        ));
        assert!(matches!(
            store.post_likes(PostId::new(1)),
            Err(StoreError::NotFound { entity: "post", .. })
        ));
    }

    #[test]
    fn post_likes_report_owner() {
        let conn = open_in_memory().expect("open db");
        let store = SqliteStore::new(&conn);
        let group = insert_group(&conn, t0());
        let post = insert_post(&conn, group, t0(), 42);

        let likes = store.post_likes(post).expect("post likes");
        assert_eq!(likes.group_id, group);
        assert_eq!(likes.like_count, 42);
        assert_eq!(store.group_created_at(group).expect("created"), t0());
        assert_eq!(store.list_group_ids().expect("ids"), vec![group]);
    }
}
