//! Comments on posts.

use super::{
    BoardError, Page, PageRequest, check_password, required, required_password, timestamp_column,
    write_transaction,
};
use crate::db::to_micros;
use crate::model::comment::{Comment, NewComment};
use crate::model::{CommentId, PostId, counter};
use crate::password::hash_password;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: CommentId::new(row.get(0)?),
        post_id: PostId::new(row.get(1)?),
        nickname: row.get(2)?,
        content: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

fn post_exists(conn: &Connection, post_id: PostId) -> Result<bool, BoardError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM posts WHERE post_id = ?1",
            params![post_id.get()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

/// Add a comment and bump the post's comment count.
///
/// # Errors
///
/// Returns [`BoardError::InvalidInput`] or [`BoardError::PasswordRequired`]
/// for missing fields, [`BoardError::PostNotFound`] for an unknown post, or a
/// storage error.
pub fn add_comment(
    conn: &Connection,
    post_id: PostId,
    new: &NewComment,
    now: DateTime<Utc>,
) -> Result<Comment, BoardError> {
    let nickname = required("nickname", &new.nickname)?;
    let content = required("content", &new.content)?;
    let password_hash = hash_password(required_password(&new.password)?)?;

    let tx = write_transaction(conn)?;
    if !post_exists(&tx, post_id)? {
        return Err(BoardError::PostNotFound(post_id));
    }
    tx.execute(
        "INSERT INTO comments (post_id, nickname, content, password_hash, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![post_id.get(), nickname, content, password_hash, to_micros(now)],
    )?;
    let id = CommentId::new(tx.last_insert_rowid());
    tx.execute(
        "UPDATE posts SET comment_count = comment_count + 1 WHERE post_id = ?1",
        params![post_id.get()],
    )?;
    tx.commit()?;
    info!(comment_id = %id, post_id = %post_id, "comment added");

    Ok(Comment {
        id,
        post_id,
        nickname,
        content,
        created_at: now,
    })
}

/// A post's comments, newest first.
///
/// # Errors
///
/// Returns [`BoardError::PostNotFound`] for an unknown post, or a storage
/// error.
pub fn list_comments(
    conn: &Connection,
    post_id: PostId,
    page: PageRequest,
) -> Result<Page<Comment>, BoardError> {
    if !post_exists(conn, post_id)? {
        return Err(BoardError::PostNotFound(post_id));
    }

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
        params![post_id.get()],
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT comment_id, post_id, nickname, content, created_at_us FROM comments \
         WHERE post_id = ?1 ORDER BY created_at_us DESC, comment_id DESC{}",
        page.limit_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![post_id.get()], row_to_comment)?;

    let mut comments = Vec::new();
    for row in rows {
        comments.push(row?);
    }
    Ok(page.into_page(counter(total), comments))
}

/// Delete a comment after checking its password.
///
/// # Errors
///
/// Returns [`BoardError::WrongPassword`], [`BoardError::CommentNotFound`], or
/// a storage error.
pub fn delete_comment(conn: &Connection, id: CommentId, password: &str) -> Result<(), BoardError> {
    let (post_id, hash): (i64, String) = conn
        .query_row(
            "SELECT post_id, password_hash FROM comments WHERE comment_id = ?1",
            params![id.get()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or(BoardError::CommentNotFound(id))?;
    check_password(required_password(password)?, &hash)?;

    let tx = write_transaction(conn)?;
    tx.execute("DELETE FROM comments WHERE comment_id = ?1", params![id.get()])?;
    tx.execute(
        "UPDATE posts SET comment_count = MAX(comment_count - 1, 0) WHERE post_id = ?1",
        params![post_id],
    )?;
    tx.commit()?;
    info!(comment_id = %id, post_id, "comment deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::group::create_group;
    use crate::board::post::{create_post, get_post};
    use crate::config::BadgeSettings;
    use crate::model::group::NewGroup;
    use crate::model::post::NewPost;
    use chrono::Duration;

    fn setup() -> (Connection, PostId) {
        let conn = crate::db::open_in_memory().expect("open db");
        let group = create_group(
            &conn,
            &NewGroup {
                name: "g".to_string(),
                password: "pw".to_string(),
                ..NewGroup::default()
            },
            Utc::now(),
        )
        .expect("group");
        let post = create_post(
            &conn,
            &BadgeSettings::default(),
            group.id,
            &NewPost {
                nickname: "n".to_string(),
                title: "t".to_string(),
                content: "c".to_string(),
                ..NewPost::default()
            },
            Utc::now(),
        )
        .expect("post");
        (conn, post.value.id)
    }

    fn new_comment(content: &str) -> NewComment {
        NewComment {
            nickname: "aunt".to_string(),
            content: content.to_string(),
            password: "cpw".to_string(),
        }
    }

    #[test]
    fn add_and_list_newest_first() {
        let (conn, post_id) = setup();
        let now = Utc::now();
        add_comment(&conn, post_id, &new_comment("first"), now - Duration::minutes(5))
            .expect("first");
        add_comment(&conn, post_id, &new_comment("second"), now).expect("second");

        let page = list_comments(&conn, post_id, PageRequest::default()).expect("list");
        assert_eq!(page.total_item_count, 2);
        assert_eq!(page.data[0].content, "second");
        assert_eq!(get_post(&conn, post_id).expect("post").comment_count, 2);
    }

    #[test]
    fn every_field_is_required() {
        let (conn, post_id) = setup();
        let mut blank = new_comment("x");
        blank.password.clear();
        assert!(matches!(
            add_comment(&conn, post_id, &blank, Utc::now()),
            Err(BoardError::PasswordRequired)
        ));
        assert!(matches!(
            add_comment(&conn, post_id, &new_comment(""), Utc::now()),
            Err(BoardError::InvalidInput(_))
        ));
        assert!(matches!(
            add_comment(&conn, PostId::new(404), &new_comment("x"), Utc::now()),
            Err(BoardError::PostNotFound(_))
        ));
    }

    #[test]
    fn delete_checks_password_and_decrements() {
        let (conn, post_id) = setup();
        let comment = add_comment(&conn, post_id, &new_comment("bye"), Utc::now()).expect("add");

        assert!(matches!(
            delete_comment(&conn, comment.id, "nope"),
            Err(BoardError::WrongPassword)
        ));
        delete_comment(&conn, comment.id, "cpw").expect("delete");
        assert_eq!(get_post(&conn, post_id).expect("post").comment_count, 0);
        assert!(matches!(
            delete_comment(&conn, comment.id, "cpw"),
            Err(BoardError::CommentNotFound(_))
        ));
    }
}
