//! Board CRUD over groups, posts, and comments.
//!
//! Every write runs in one transaction that also maintains the denormalized
//! counters. Mutations that can advance a badge call the matching trigger
//! after their transaction commits; trigger outcomes ride along in
//! [`Triggered`] and never turn a successful mutation into an error.

pub mod comment;
pub mod group;
pub mod post;

use crate::badge::triggers::TriggerReport;
use crate::db::from_micros;
use crate::error::ErrorCode;
use crate::model::{CommentId, GroupId, PostId};
use crate::password::{PasswordError, verify_password};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    #[error("post {0} not found")]
    PostNotFound(PostId),

    #[error("comment {0} not found")]
    CommentNotFound(CommentId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("wrong password")]
    WrongPassword,

    #[error("password required")]
    PasswordRequired,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl BoardError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::GroupNotFound(_) => ErrorCode::GroupNotFound,
            Self::PostNotFound(_) => ErrorCode::PostNotFound,
            Self::CommentNotFound(_) => ErrorCode::CommentNotFound,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::WrongPassword => ErrorCode::WrongPassword,
            Self::PasswordRequired => ErrorCode::PasswordRequired,
            Self::Password(PasswordError::Hash(_)) => ErrorCode::PasswordHashFailed,
            Self::Password(PasswordError::Malformed(_)) => ErrorCode::CorruptStore,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_item_count: u64,
    pub data: Vec<T>,
}

/// Page number (1-based) and size. Out-of-range values are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

impl PageRequest {
    #[must_use]
    pub const fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub fn offset(self) -> u64 {
        let req = self.normalized();
        u64::from(req.page - 1) * u64::from(req.page_size)
    }

    pub(crate) fn into_page<T>(self, total_item_count: u64, data: Vec<T>) -> Page<T> {
        let req = self.normalized();
        let pages = total_item_count.div_ceil(u64::from(req.page_size)).max(1);
        Page {
            current_page: req.page,
            total_pages: u32::try_from(pages).unwrap_or(u32::MAX),
            total_item_count,
            data,
        }
    }

    pub(crate) fn limit_clause(self) -> String {
        let req = self.normalized();
        format!(" LIMIT {} OFFSET {}", req.page_size, self.offset())
    }
}

/// A mutation's result plus what its badge trigger did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Triggered<T> {
    #[serde(flatten)]
    pub value: T,
    pub badges: TriggerReport,
}

/// Begin a write transaction that takes the write lock up front.
///
/// A deferred transaction that reads before writing cannot wait on the busy
/// timeout when another connection commits first; it fails with
/// `SQLITE_BUSY` instead. Taking the lock at `BEGIN` lets it wait.
pub(crate) fn write_transaction(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// Trimmed copy of a required text field, or `InvalidInput` when blank.
pub(crate) fn required(field: &str, value: &str) -> Result<String, BoardError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BoardError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Reject a blank password before hashing it.
pub(crate) fn required_password(password: &str) -> Result<&str, BoardError> {
    if password.is_empty() {
        return Err(BoardError::PasswordRequired);
    }
    Ok(password)
}

pub(crate) fn check_password(password: &str, hash: &str) -> Result<(), BoardError> {
    if verify_password(password, hash)? {
        Ok(())
    } else {
        Err(BoardError::WrongPassword)
    }
}

/// `%keyword%` with LIKE metacharacters escaped by `\`.
pub(crate) fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Read a microsecond timestamp column.
pub(crate) fn timestamp_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    let us: i64 = row.get(idx)?;
    from_micros(us).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, us))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps() {
        let req = PageRequest::new(0, 500).normalized();
        assert_eq!(req, PageRequest::new(1, MAX_PAGE_SIZE));
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let page: Page<u8> = PageRequest::default().into_page(0, Vec::new());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.current_page, 1);
    }

    #[test]
    fn total_pages_round_up() {
        let page: Page<u8> = PageRequest::new(2, 10).into_page(21, Vec::new());
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(matches!(required("title", "  "), Err(BoardError::InvalidInput(_))));
        assert_eq!(required("title", " beach ").expect("valid"), "beach");
        assert!(matches!(required_password(""), Err(BoardError::PasswordRequired)));
    }
}
