//! forumdb Store
//!
//! Storage core of a discussion forum: users, forums, threads, hierarchical
//! posts and votes, behind one async [`ForumStore`] trait.
//!
//! ## What Lives Here
//!
//! - **Post trees**: every post stores its materialized ancestry path
//!   ([`PostPath`]), encoded so that the database orders paths in depth-first
//!   pre-order without decoding them
//! - **Batch insertion**: a batch of posts lands in a thread atomically, with
//!   the forum's post counter and membership rows updated in the same
//!   transaction
//! - **Pagination**: three traversal orders (flat, tree, parent_tree) with
//!   cursor boundaries and a direction flag ([`PostQuery`])
//! - **Vote ledger**: one vote per (user, thread); resubmissions adjust the
//!   thread total by the difference ([`Voice`], [`vote_delta`])
//! - **Counters**: forum `threads`/`posts` and thread `votes` are running
//!   totals, read in O(1)
//!
//! ## Architecture
//!
//! ```text
//!   caller (HTTP layer, forumctl)
//!          │  Arc<dyn ForumStore>
//!          ▼
//! ┌──────────────────────────────────────────┐
//! │ ForumStore                               │
//! │   create_posts ──► PostPath ──┐          │
//! │   list_posts ───► pagination  │          │
//! │   apply_vote ───► vote_delta  ▼          │
//! │                          counters        │
//! └──────────────┬───────────────────────────┘
//!                │ sqlx pool, one transaction per write
//!        ┌───────┴────────┐
//!        ▼                ▼
//!     SQLite          PostgreSQL
//!    (default)     (feature "postgres")
//! ```
//!
//! ## Usage Example
//!
//! ```ignore
//! use forumdb_store::{ForumStore, NewPost, PostQuery, SortMode, SqliteForumStore, ThreadRef};
//!
//! let store = SqliteForumStore::new("forum.db").await?;
//!
//! let thread = store.get_thread(&ThreadRef::parse("rust-2024")).await?;
//! let posts = store
//!     .create_posts(
//!         &thread,
//!         chrono::Utc::now(),
//!         vec![NewPost { parent: 0, author: "alice".into(), message: "first".into() }],
//!     )
//!     .await?;
//!
//! let page = store
//!     .list_posts(thread.id, &PostQuery::new(SortMode::Tree).limit(20))
//!     .await?;
//! ```
//!
//! ## Thread Safety
//!
//! - Both stores are Send + Sync and meant to be shared as `Arc<dyn ForumStore>`
//! - The sqlx pool is the only shared state
//! - Counter updates never read-then-write; concurrent batches and votes sum
//!   exactly

pub mod config;
pub mod error;
pub mod pagination;
pub mod path;
pub mod store;
pub mod types;
pub mod vote;

mod counters;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use config::StoreConfig;
pub use error::{ErrorKind, ForumError, Result};
pub use pagination::{Direction, PostQuery, SortMode, ThreadQuery, UserQuery, DEFAULT_PAGE_SIZE};
pub use path::PostPath;
pub use store::SqliteForumStore;
pub use types::*;
pub use vote::{vote_delta, Voice};

#[cfg(feature = "postgres")]
pub use postgres::PostgresForumStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Forum store trait - abstracts over the SQLite and PostgreSQL backends.
///
/// Lookups by nickname, email and slug are case-insensitive (full Unicode
/// lower-casing) on both backends. Records returned by the store carry the
/// canonical spelling.
///
/// ## Errors
///
/// Every method returns `Result<T>` (`Result<T, ForumError>`). Use
/// [`ForumError::kind`] to tell missing entities, conflicts, bad input and
/// internal failures apart.
#[async_trait]
pub trait ForumStore: Send + Sync {
    // ============================================================
    // USER OPERATIONS
    // ============================================================

    /// Register a user.
    ///
    /// # Errors
    ///
    /// - `UserExists`: the nickname or the email is taken; carries every
    ///   clashing user
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// # Errors
    ///
    /// - `UserNotFound`
    async fn get_user(&self, nickname: &str) -> Result<User>;

    /// Update the given profile fields, keeping the others.
    ///
    /// # Errors
    ///
    /// - `UserNotFound`
    /// - `EmailTaken`: the new email belongs to another user
    async fn update_user(&self, nickname: &str, update: UserUpdate) -> Result<User>;

    // ============================================================
    // FORUM OPERATIONS
    // ============================================================

    /// Create a forum owned by an existing user.
    ///
    /// # Errors
    ///
    /// - `UserNotFound`: the owner does not exist
    /// - `ForumExists`: the slug is taken; carries the existing forum
    async fn create_forum(&self, forum: NewForum) -> Result<Forum>;

    /// # Errors
    ///
    /// - `ForumNotFound`
    async fn get_forum(&self, slug: &str) -> Result<Forum>;

    /// Aggregate counters of a forum. Reads the forum row only.
    async fn forum_counters(&self, slug: &str) -> Result<ForumCounters> {
        let forum = self.get_forum(slug).await?;
        Ok(ForumCounters {
            threads: forum.threads,
            posts: forum.posts,
        })
    }

    /// Users who opened a thread or posted in the forum, ordered by nickname.
    ///
    /// # Errors
    ///
    /// - `ForumNotFound`
    /// - `InvalidLimit`
    async fn forum_users(&self, slug: &str, query: &UserQuery) -> Result<Vec<User>>;

    // ============================================================
    // THREAD OPERATIONS
    // ============================================================

    /// Open a thread in a forum and bump the forum's thread counter.
    ///
    /// # Errors
    ///
    /// - `ForumNotFound`, `UserNotFound`
    /// - `ThreadExists`: the slug is taken; carries the existing thread
    async fn create_thread(&self, forum_slug: &str, thread: NewThread) -> Result<Thread>;

    /// # Errors
    ///
    /// - `ThreadNotFound`
    async fn get_thread(&self, thread: &ThreadRef) -> Result<Thread>;

    async fn update_thread(&self, thread: &ThreadRef, update: ThreadUpdate) -> Result<Thread>;

    /// Threads of a forum ordered by creation time. `since` is inclusive.
    ///
    /// # Errors
    ///
    /// - `ForumNotFound`
    /// - `InvalidLimit`
    async fn forum_threads(&self, forum_slug: &str, query: &ThreadQuery) -> Result<Vec<Thread>>;

    // ============================================================
    // POST OPERATIONS
    // ============================================================

    /// Insert a batch of posts into `thread`, all sharing `created`.
    ///
    /// Posts are inserted in order, so a post may reply to one earlier in the
    /// same batch. Either every post is stored and the forum's post counter
    /// grows by the batch size, or nothing changes.
    ///
    /// # Returns
    ///
    /// The stored posts in submission order, with ids and paths assigned.
    ///
    /// # Errors
    ///
    /// - `AuthorNotFound`: an author nickname is unknown
    /// - `ParentNotFound`: a parent id does not exist
    /// - `CrossThreadParent`: a parent belongs to another thread
    async fn create_posts(
        &self,
        thread: &Thread,
        created: DateTime<Utc>,
        posts: Vec<NewPost>,
    ) -> Result<Vec<Post>>;

    /// # Errors
    ///
    /// - `PostNotFound`
    async fn get_post(&self, id: i64) -> Result<Post>;

    /// A post with the related entities selected by `related`.
    async fn post_details(&self, id: i64, related: Related) -> Result<PostDetails> {
        let post = self.get_post(id).await?;

        let author = if related.user {
            Some(self.get_user(&post.author).await?)
        } else {
            None
        };
        let forum = if related.forum {
            Some(self.get_forum(&post.forum).await?)
        } else {
            None
        };
        let thread = if related.thread {
            Some(self.get_thread(&ThreadRef::Id(post.thread)).await?)
        } else {
            None
        };

        Ok(PostDetails {
            post,
            author,
            forum,
            thread,
        })
    }

    /// Replace a post's message. The post is flagged as edited only when the
    /// message actually changes; `None` returns the post untouched.
    async fn update_post(&self, id: i64, message: Option<String>) -> Result<Post>;

    /// One page of a thread's posts.
    ///
    /// # Errors
    ///
    /// - `InvalidLimit`: `query.limit` is zero
    /// - `InvalidCursor`: tree modes only, the cursor post is not in the thread
    async fn list_posts(&self, thread_id: i64, query: &PostQuery) -> Result<Vec<Post>>;

    // ============================================================
    // VOTE OPERATIONS
    // ============================================================

    /// Record `nickname`'s vote on a thread, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// - `ThreadNotFound`, `UserNotFound`
    async fn apply_vote(&self, thread_id: i64, nickname: &str, voice: Voice)
        -> Result<AppliedVote>;

    // ============================================================
    // SERVICE OPERATIONS
    // ============================================================

    async fn status(&self) -> Result<Status>;

    /// Remove every row and restart id sequences.
    async fn clear(&self) -> Result<()>;
}

/// Open the store named by `config.database_url`.
///
/// `postgres://` and `postgresql://` URLs need the `postgres` feature;
/// everything else is treated as SQLite.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn ForumStore>> {
    config.validate()?;

    if config.is_postgres() {
        #[cfg(feature = "postgres")]
        {
            info!(backend = "postgres", "Opening forum store");
            return Ok(Arc::new(PostgresForumStore::from_config(config).await?));
        }
        #[cfg(not(feature = "postgres"))]
        {
            return Err(ForumError::Config(
                "PostgreSQL URL provided but the postgres feature is not enabled".to_string(),
            ));
        }
    }

    info!(backend = "sqlite", "Opening forum store");
    Ok(Arc::new(SqliteForumStore::from_config(config).await?))
}
