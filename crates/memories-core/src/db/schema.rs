//! Canonical SQLite schema for the memories board.
//!
//! - `groups`, `posts`, `comments` hold board content plus maintained
//!   counters (`post_count`, `like_count`, `comment_count`)
//! - `tags` / `post_tags` model the many-to-many tag relationship
//! - `badges` is the seeded catalog; `group_badges` is the grant ledger whose
//!   composite primary key enforces at most one grant per (group, badge)
//! - `store_meta` tracks the schema version for diagnostics

/// Migration v1: board tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS groups (
    group_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    password_hash TEXT NOT NULL,
    image_url TEXT,
    is_public INTEGER NOT NULL DEFAULT 1 CHECK (is_public IN (0, 1)),
    introduction TEXT,
    like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
    post_count INTEGER NOT NULL DEFAULT 0 CHECK (post_count >= 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS posts (
    post_id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id INTEGER NOT NULL REFERENCES groups(group_id) ON DELETE CASCADE,
    nickname TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    password_hash TEXT,
    image_url TEXT,
    location TEXT,
    moment TEXT,
    is_public INTEGER NOT NULL DEFAULT 1 CHECK (is_public IN (0, 1)),
    like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
    comment_count INTEGER NOT NULL DEFAULT 0 CHECK (comment_count >= 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    tag_id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag_name TEXT NOT NULL UNIQUE CHECK (length(trim(tag_name)) > 0)
);

CREATE TABLE IF NOT EXISTS post_tags (
    post_id INTEGER NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(tag_id) ON DELETE CASCADE,
    PRIMARY KEY (post_id, tag_id)
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
    nickname TEXT NOT NULL,
    content TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: badge catalog, grant ledger, and read-path indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS badges (
    badge_id INTEGER PRIMARY KEY CHECK (badge_id BETWEEN 1 AND 5),
    name TEXT NOT NULL
);

INSERT OR IGNORE INTO badges (badge_id, name) VALUES
    (1, '7-day posting streak'),
    (2, '20+ memories posted'),
    (3, '1 year anniversary'),
    (4, '10k group likes'),
    (5, '10k memory likes');

CREATE TABLE IF NOT EXISTS group_badges (
    group_id INTEGER NOT NULL REFERENCES groups(group_id) ON DELETE CASCADE,
    badge_id INTEGER NOT NULL REFERENCES badges(badge_id),
    granted_at_us INTEGER NOT NULL,
    PRIMARY KEY (group_id, badge_id)
);

CREATE INDEX IF NOT EXISTS idx_posts_group_created
    ON posts(group_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_posts_group_likes
    ON posts(group_id, like_count DESC);

CREATE INDEX IF NOT EXISTS idx_comments_post_created
    ON comments(post_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_groups_created
    ON groups(created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_post_tags_tag
    ON post_tags(tag_id, post_id);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by list/sort query paths and badge evaluators.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_posts_group_created",
    "idx_posts_group_likes",
    "idx_comments_post_created",
    "idx_groups_created",
    "idx_post_tags_tag",
];
