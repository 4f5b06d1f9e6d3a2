//! Forum Type Definitions
//!
//! Records returned by the store and the inputs accepted by it.
//!
//! ## Types Overview
//!
//! - [`User`], [`NewUser`], [`UserUpdate`]: forum members, looked up by
//!   nickname (case-insensitive)
//! - [`Forum`], [`NewForum`], [`ForumCounters`]: a forum carries its own
//!   running `threads`/`posts` totals
//! - [`Thread`], [`NewThread`], [`ThreadUpdate`], [`ThreadRef`]
//! - [`Post`], [`NewPost`], [`PostDetails`], [`Related`]
//! - [`Status`], [`AppliedVote`]
//!
//! ## Design Decisions
//!
//! - Internal surrogate ids of users and forums are kept on the records but
//!   never serialized; the external identity is the nickname / slug
//! - Timestamps are `DateTime<Utc>` here and i64 milliseconds in the database
//! - Related entities of a post are independent `Option`s, each present only
//!   when requested

use crate::error::{ForumError, Result};
use crate::path::PostPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered forum member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(skip)]
    pub id: i64,

    /// Unique, compared case-insensitively
    pub nickname: String,

    pub fullname: String,

    /// Unique, compared case-insensitively
    pub email: String,

    pub about: String,
}

/// Input for `ForumStore::create_user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub nickname: String,
    pub fullname: String,
    pub email: String,
    #[serde(default)]
    pub about: String,
}

/// Partial profile update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub about: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.fullname.is_none() && self.email.is_none() && self.about.is_none()
    }
}

/// A forum with its aggregate counters.
///
/// `threads` and `posts` are maintained incrementally by the counter
/// aggregator; reading them never scans threads or posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    #[serde(skip)]
    pub id: i64,

    pub slug: String,

    pub title: String,

    /// Canonical nickname of the owner
    pub user: String,

    pub threads: i64,

    pub posts: i64,
}

/// Input for `ForumStore::create_forum`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewForum {
    pub slug: String,
    pub title: String,
    /// Owner nickname, resolved case-insensitively
    pub user: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumCounters {
    pub threads: i64,
    pub posts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,

    /// Canonical nickname of the author
    pub author: String,

    pub created: DateTime<Utc>,

    /// Slug of the owning forum
    pub forum: String,

    #[serde(skip)]
    pub forum_id: i64,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    pub title: String,

    /// Sum of all vote voices on this thread
    pub votes: i32,
}

/// Input for `ForumStore::create_thread`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewThread {
    pub title: String,
    pub author: String,
    pub message: String,
    #[serde(default)]
    pub slug: Option<String>,
    /// Defaults to the time of insertion
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadUpdate {
    pub title: Option<String>,
    pub message: Option<String>,
}

impl ThreadUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.message.is_none()
    }
}

/// A thread addressed either by numeric id or by slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadRef {
    Id(i64),
    Slug(String),
}

impl ThreadRef {
    /// Anything that parses as an integer is an id, everything else a slug.
    pub fn parse(slug_or_id: &str) -> Self {
        match slug_or_id.parse::<i64>() {
            Ok(id) => ThreadRef::Id(id),
            Err(_) => ThreadRef::Slug(slug_or_id.to_string()),
        }
    }
}

impl std::fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadRef::Id(id) => write!(f, "{}", id),
            ThreadRef::Slug(slug) => write!(f, "{}", slug),
        }
    }
}

/// A stored post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,

    /// Id of the parent post, 0 for a root post
    pub parent: i64,

    pub thread: i64,

    /// Slug of the forum the thread belongs to
    pub forum: String,

    /// Canonical nickname of the author
    pub author: String,

    /// Shared by every post of the batch that created it
    pub created: DateTime<Utc>,

    pub message: String,

    pub is_edited: bool,

    /// Materialized ancestry path, ending with `id`
    #[serde(skip)]
    pub path: PostPath,
}

impl Post {
    pub fn is_root(&self) -> bool {
        self.parent == 0
    }
}

/// One element of a post batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    /// 0 (or absent) for a root post
    #[serde(default)]
    pub parent: i64,
    pub author: String,
    pub message: String,
}

/// Which related entities to load alongside a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Related {
    pub user: bool,
    pub forum: bool,
    pub thread: bool,
}

impl Related {
    /// Parse a comma separated list such as `"user,thread"`. Unknown names
    /// are ignored.
    pub fn parse(list: &str) -> Self {
        let mut related = Related::default();
        for item in list.split(',').map(str::trim) {
            match item {
                "user" => related.user = true,
                "forum" => related.forum = true,
                "thread" => related.thread = true,
                _ => {}
            }
        }
        related
    }
}

/// A post plus whichever related entities were requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetails {
    pub post: Post,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub forum: Option<Forum>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
}

/// Row counts across the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub user: i64,
    pub forum: i64,
    pub thread: i64,
    pub post: i64,
}

/// Result of `ForumStore::apply_vote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedVote {
    /// Amount added to the thread's vote total by this call
    pub delta: i32,

    /// The thread after the vote was applied
    pub thread: Thread,
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or(ForumError::CorruptTimestamp(ms))
}

/// Truncate to the millisecond resolution the database stores.
pub(crate) fn truncate_millis(ts: &DateTime<Utc>) -> Result<DateTime<Utc>> {
    from_millis(to_millis(ts))
}

/// Case-folded form of a nickname, email or slug. Uniqueness and lookups go
/// through this key on both backends.
pub(crate) fn lookup_key(value: &str) -> String {
    value.to_lowercase()
}
