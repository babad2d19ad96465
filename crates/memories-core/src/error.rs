use std::fmt;

/// Machine-readable error codes for scripting and log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    GroupNotFound,
    PostNotFound,
    CommentNotFound,
    InvalidInput,
    WrongPassword,
    PasswordRequired,
    PasswordHashFailed,
    BadgeTargetMissing,
    BadgeDeadlineExceeded,
    StorageFailure,
    CorruptStore,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::GroupNotFound => "E2001",
            Self::PostNotFound => "E2002",
            Self::CommentNotFound => "E2003",
            Self::InvalidInput => "E2004",
            Self::WrongPassword => "E3001",
            Self::PasswordRequired => "E3002",
            Self::PasswordHashFailed => "E3003",
            Self::BadgeTargetMissing => "E4001",
            Self::BadgeDeadlineExceeded => "E4002",
            Self::StorageFailure => "E5001",
            Self::CorruptStore => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Board not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::GroupNotFound => "Group not found",
            Self::PostNotFound => "Post not found",
            Self::CommentNotFound => "Comment not found",
            Self::InvalidInput => "Invalid request",
            Self::WrongPassword => "Wrong password",
            Self::PasswordRequired => "Password required",
            Self::PasswordHashFailed => "Password hashing failed",
            Self::BadgeTargetMissing => "Badge check target vanished",
            Self::BadgeDeadlineExceeded => "Badge check deadline exceeded",
            Self::StorageFailure => "Storage failure",
            Self::CorruptStore => "Corrupt SQLite store",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `mg init` to create the board database."),
            Self::ConfigParseError => Some("Fix syntax in .memories/config.toml and retry."),
            Self::GroupNotFound => Some("Check the group ID with `mg group list`."),
            Self::PostNotFound => Some("Check the post ID with `mg post list <group>`."),
            Self::CommentNotFound | Self::BadgeTargetMissing => None,
            Self::InvalidInput => Some("Required fields must be present and non-blank."),
            Self::WrongPassword => Some("Retry with the password set at creation time."),
            Self::PasswordRequired => Some("Pass --password for protected resources."),
            Self::PasswordHashFailed => Some("Retry once. If persistent, report a bug with logs."),
            Self::BadgeDeadlineExceeded => {
                Some("Raise badges.inline_timeout_ms or sweep.per_group_timeout_secs.")
            }
            Self::StorageFailure => Some("Check disk space and database file permissions."),
            Self::CorruptStore => Some("Restore the database from backup or re-run `mg init`."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::GroupNotFound,
            ErrorCode::PostNotFound,
            ErrorCode::CommentNotFound,
            ErrorCode::InvalidInput,
            ErrorCode::WrongPassword,
            ErrorCode::PasswordRequired,
            ErrorCode::PasswordHashFailed,
            ErrorCode::BadgeTargetMissing,
            ErrorCode::BadgeDeadlineExceeded,
            ErrorCode::StorageFailure,
            ErrorCode::CorruptStore,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::WrongPassword.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }
}
