//! Cursor Pagination
//!
//! Query types for paged reads and the statement builder that turns them into
//! parameterized SQL shared by the SQLite and PostgreSQL backends.
//!
//! ## Post Sort Modes
//!
//! - **flat**: `ORDER BY created_at, id`. The cursor is a post id and the
//!   boundary is exclusive on `id`.
//! - **tree**: `ORDER BY path`, i.e. depth-first pre-order over the whole
//!   thread. The cursor's stored path is the boundary.
//! - **parent_tree**: pick the first `limit` root posts past the cursor's root,
//!   then return every post under those roots. `limit` bounds root posts, not
//!   rows.
//!
//! ## Direction
//!
//! One [`Direction`] value produces both the boundary operator and the ORDER BY
//! keyword, so the two can never disagree:
//!
//! | direction | boundary | order |
//! |-----------|----------|-------|
//! | Asc       | `>`      | `ASC` |
//! | Desc      | `<`      | `DESC`|
//!
//! Statement text is only ever assembled from these enum-derived fragments;
//! thread ids, cursors, limits and nicknames are always bound parameters.

use crate::error::{ForumError, Result};
use crate::path::PostPath;
use crate::types::lookup_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Page size used when the caller does not pick one.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn from_desc(desc: bool) -> Self {
        if desc {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }

    pub fn is_desc(self) -> bool {
        self == Direction::Desc
    }

    /// Reverse `ordering` for descending traversal.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }

    pub(crate) fn order_keyword(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    /// Operator keeping rows strictly past the cursor.
    pub(crate) fn exclusive_op(self) -> &'static str {
        match self {
            Direction::Asc => ">",
            Direction::Desc => "<",
        }
    }

    /// Operator keeping rows at or past the cursor.
    pub(crate) fn inclusive_op(self) -> &'static str {
        match self {
            Direction::Asc => ">=",
            Direction::Desc => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Flat,
    Tree,
    ParentTree,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Flat => "flat",
            SortMode::Tree => "tree",
            SortMode::ParentTree => "parent_tree",
        }
    }
}

impl FromStr for SortMode {
    type Err = ForumError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flat" => Ok(SortMode::Flat),
            "tree" => Ok(SortMode::Tree),
            "parent_tree" => Ok(SortMode::ParentTree),
            other => Err(ForumError::InvalidSortMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page of a thread's posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostQuery {
    pub sort: SortMode,

    /// Id of the last post the caller has seen
    pub since: Option<i64>,

    /// Rows for flat/tree, root posts for parent_tree
    pub limit: u32,

    pub direction: Direction,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            sort: SortMode::Flat,
            since: None,
            limit: DEFAULT_PAGE_SIZE,
            direction: Direction::Asc,
        }
    }
}

impl PostQuery {
    pub fn new(sort: SortMode) -> Self {
        Self {
            sort,
            ..Default::default()
        }
    }

    pub fn since(mut self, post_id: i64) -> Self {
        self.since = Some(post_id);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn desc(mut self, desc: bool) -> Self {
        self.direction = Direction::from_desc(desc);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_limit(self.limit)
    }

    /// Tree modes compare against the cursor's stored path, which the backend
    /// must look up first.
    pub(crate) fn needs_cursor_path(&self) -> bool {
        self.since.is_some() && self.sort != SortMode::Flat
    }
}

/// A page of a forum's threads, ordered by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadQuery {
    /// Inclusive lower (or, descending, upper) bound on `created`
    pub since: Option<DateTime<Utc>>,
    pub limit: u32,
    pub direction: Direction,
}

impl Default for ThreadQuery {
    fn default() -> Self {
        Self {
            since: None,
            limit: DEFAULT_PAGE_SIZE,
            direction: Direction::Asc,
        }
    }
}

impl ThreadQuery {
    pub fn validate(&self) -> Result<()> {
        validate_limit(self.limit)
    }
}

/// A page of a forum's members, ordered by nickname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuery {
    /// Exclusive nickname boundary
    pub since: Option<String>,
    pub limit: u32,
    pub direction: Direction,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            since: None,
            limit: DEFAULT_PAGE_SIZE,
            direction: Direction::Asc,
        }
    }
}

impl UserQuery {
    pub fn validate(&self) -> Result<()> {
        validate_limit(self.limit)
    }
}

fn validate_limit(limit: u32) -> Result<()> {
    if limit == 0 {
        return Err(ForumError::InvalidLimit(0));
    }
    Ok(())
}

// ============================================================
// STATEMENT BUILDER
// ============================================================

/// SQL flavour differences the builder has to care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    Sqlite,
    #[cfg_attr(not(feature = "postgres"), allow(dead_code))]
    Postgres,
}

impl Dialect {
    /// Collation giving plain byte order for text comparisons.
    fn byte_collation(self) -> &'static str {
        match self {
            Dialect::Sqlite => "",
            Dialect::Postgres => " COLLATE \"C\"",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BindValue {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub(crate) struct Statement {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

struct StatementBuilder {
    dialect: Dialect,
    sql: String,
    binds: Vec<BindValue>,
}

impl StatementBuilder {
    fn new(dialect: Dialect, init: &str) -> Self {
        Self {
            dialect,
            sql: init.to_string(),
            binds: Vec::new(),
        }
    }

    fn push(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    fn push_bind(&mut self, value: BindValue) -> &mut Self {
        self.binds.push(value);
        match self.dialect {
            Dialect::Sqlite => self.sql.push('?'),
            Dialect::Postgres => {
                self.sql.push('$');
                self.sql.push_str(&self.binds.len().to_string());
            }
        }
        self
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            binds: self.binds,
        }
    }
}

pub(crate) const POST_COLUMNS: &str =
    "id, parent_id, thread_id, forum, author, message, is_edited, created_at, path";

pub(crate) const THREAD_COLUMNS: &str =
    "id, forum_id, forum, author, slug, title, message, created_at, votes";

/// Build the page query for `list_posts`.
///
/// `cursor_path` must be the stored path of `query.since` for the tree modes
/// and is ignored for flat.
pub(crate) fn post_page(
    dialect: Dialect,
    thread_id: i64,
    query: &PostQuery,
    cursor_path: Option<&PostPath>,
) -> Statement {
    let dir = query.direction;
    let mut b = StatementBuilder::new(dialect, "SELECT ");
    b.push(POST_COLUMNS).push(" FROM posts WHERE thread_id = ");
    b.push_bind(BindValue::Int(thread_id));

    match query.sort {
        SortMode::Flat => {
            if let Some(since) = query.since {
                b.push(" AND id ").push(dir.exclusive_op()).push(" ");
                b.push_bind(BindValue::Int(since));
            }
            b.push(" ORDER BY created_at ")
                .push(dir.order_keyword())
                .push(", id ")
                .push(dir.order_keyword());
            b.push(" LIMIT ");
            b.push_bind(BindValue::Int(i64::from(query.limit)));
        }
        SortMode::Tree => {
            if let Some(path) = cursor_path {
                b.push(" AND path ").push(dir.exclusive_op()).push(" ");
                b.push_bind(BindValue::Bytes(path.encode()));
            }
            b.push(" ORDER BY path ").push(dir.order_keyword());
            b.push(" LIMIT ");
            b.push_bind(BindValue::Int(i64::from(query.limit)));
        }
        SortMode::ParentTree => {
            b.push(" AND root_id IN (SELECT id FROM posts WHERE thread_id = ");
            b.push_bind(BindValue::Int(thread_id));
            b.push(" AND parent_id = 0");
            if let Some(root) = cursor_path.and_then(PostPath::root_id) {
                b.push(" AND path ").push(dir.exclusive_op()).push(" ");
                b.push_bind(BindValue::Bytes(PostPath::root(root).encode()));
            }
            b.push(" ORDER BY path ").push(dir.order_keyword());
            b.push(" LIMIT ");
            b.push_bind(BindValue::Int(i64::from(query.limit)));
            // Root groups follow the direction; inside a group replies stay in
            // pre-order so parents precede their children.
            b.push(") ORDER BY root_id ")
                .push(dir.order_keyword())
                .push(", path ASC");
        }
    }

    b.finish()
}

/// Build the page query for `forum_threads`.
pub(crate) fn thread_page(dialect: Dialect, forum_id: i64, query: &ThreadQuery) -> Statement {
    let dir = query.direction;
    let mut b = StatementBuilder::new(dialect, "SELECT ");
    b.push(THREAD_COLUMNS).push(" FROM threads WHERE forum_id = ");
    b.push_bind(BindValue::Int(forum_id));
    if let Some(since) = &query.since {
        b.push(" AND created_at ").push(dir.inclusive_op()).push(" ");
        b.push_bind(BindValue::Int(since.timestamp_millis()));
    }
    b.push(" ORDER BY created_at ")
        .push(dir.order_keyword())
        .push(", id ")
        .push(dir.order_keyword());
    b.push(" LIMIT ");
    b.push_bind(BindValue::Int(i64::from(query.limit)));
    b.finish()
}

/// Build the page query for `forum_users`.
pub(crate) fn member_page(dialect: Dialect, forum_id: i64, query: &UserQuery) -> Statement {
    let dir = query.direction;
    let collation = dialect.byte_collation();
    let mut b = StatementBuilder::new(
        dialect,
        "SELECT u.id, u.nickname, u.fullname, u.email, u.about \
         FROM users u JOIN forum_users fu ON fu.user_id = u.id \
         WHERE fu.forum_id = ",
    );
    b.push_bind(BindValue::Int(forum_id));
    if let Some(since) = &query.since {
        b.push(" AND u.nickname_key")
            .push(collation)
            .push(" ")
            .push(dir.exclusive_op())
            .push(" ");
        b.push_bind(BindValue::Text(lookup_key(since)));
        b.push(collation);
    }
    b.push(" ORDER BY u.nickname_key")
        .push(collation)
        .push(" ")
        .push(dir.order_keyword());
    b.push(" LIMIT ");
    b.push_bind(BindValue::Int(i64::from(query.limit)));
    b.finish()
}
