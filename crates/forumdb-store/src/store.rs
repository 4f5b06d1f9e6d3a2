//! SQLite Forum Store Implementation
//!
//! This module implements the [`ForumStore`] trait using SQLite as the backend.
//!
//! ## Usage
//!
//! ### File-Based
//! ```ignore
//! use forumdb_store::{ForumStore, SqliteForumStore};
//!
//! // Creates forum.db (or opens it) and applies the schema
//! let store = SqliteForumStore::new("forum.db").await?;
//! ```
//!
//! ### In-Memory (Testing)
//! ```ignore
//! let store = SqliteForumStore::new_in_memory().await?;
//! ```
//!
//! ## Implementation Details
//!
//! ### Connection Pool
//! - File databases run in WAL mode with a busy timeout, so readers never
//!   block and writers queue on the database lock instead of failing
//! - An in-memory database lives inside a single connection, so the pool is
//!   pinned to exactly one connection that never expires
//!
//! ### Transactions and Locking
//! - SQLite has one writer at a time. A deferred transaction that reads first
//!   and writes later can fail to upgrade its lock, so every write transaction
//!   here starts with a write:
//!   - `create_posts` starts with the forum post counter increment
//!   - `apply_vote` starts with `counters::lock_thread`, a no-op update of
//!     the thread row
//!   - `create_thread` starts with the thread insert
//! - Reads that feed those writes (authors, parents, previous votes) happen
//!   after the lock is held, inside the same transaction
//!
//! ### Case-Insensitive Keys
//! - `COLLATE NOCASE` only folds ASCII, so nicknames, emails and slugs are
//!   stored with a `*_key` column holding `lookup_key` of the value; the
//!   UNIQUE constraints and every lookup use that column
//!
//! ### Queries
//! - Runtime queries (`sqlx::query`) with `Row::try_get`
//! - Page queries come from the shared statement builder in
//!   [`crate::pagination`] and are bound here

use crate::{
    config::StoreConfig,
    counters,
    error::{is_unique_violation, ForumError, Result},
    pagination::{self, BindValue, Dialect, PostQuery, Statement, ThreadQuery, UserQuery},
    path::PostPath,
    types::*,
    vote::{vote_delta, Voice},
    ForumStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_COLUMNS: &str = "id, nickname, fullname, email, about";
const FORUM_COLUMNS: &str = "id, slug, title, owner, threads, posts";

/// SQLite-based forum store implementation
pub struct SqliteForumStore {
    pool: SqlitePool,
}

impl SqliteForumStore {
    /// Open (or create) the database file at `path`.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = StoreConfig::with_url(format!("sqlite://{}", path.as_ref().display()));
        Self::from_config(&config).await
    }

    /// Create in-memory database (for testing)
    pub async fn new_in_memory() -> Result<Self> {
        Self::from_config(&StoreConfig::with_url("sqlite::memory:")).await
    }

    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = if config.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!(
            url = %config.database_url,
            in_memory = config.is_in_memory(),
            "SQLite forum store opened"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_statement(&self, statement: Statement) -> Result<Vec<SqliteRow>> {
        let mut query = sqlx::query(&statement.sql);
        for value in statement.binds {
            query = match value {
                BindValue::Int(v) => query.bind(v),
                BindValue::Text(v) => query.bind(v),
                BindValue::Bytes(v) => query.bind(v),
            };
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Stored path of the cursor post, which must belong to the thread.
    async fn cursor_path(&self, thread_id: i64, post_id: i64) -> Result<PostPath> {
        let row = sqlx::query("SELECT path FROM posts WHERE id = ? AND thread_id = ?")
            .bind(post_id)
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ForumError::InvalidCursor(post_id))?;

        PostPath::decode(&row.try_get::<Vec<u8>, _>("path")?)
    }

    async fn insert_batch(
        &self,
        thread: &Thread,
        created: DateTime<Utc>,
        posts: Vec<NewPost>,
    ) -> Result<Vec<Post>> {
        let created = truncate_millis(&created)?;
        let created_ms = to_millis(&created);

        let mut tx = self.pool.begin().await?;

        counters::increment_posts(&mut *tx, &thread.forum, posts.len() as i64).await?;

        let mut authors: HashMap<String, (i64, String)> = HashMap::new();
        let mut members: HashSet<i64> = HashSet::new();
        let mut batch_paths: HashMap<i64, PostPath> = HashMap::new();
        let mut stored = Vec::with_capacity(posts.len());

        for new_post in posts {
            let key = lookup_key(&new_post.author);
            let (author_id, author) = match authors.get(&key) {
                Some(found) => found.clone(),
                None => {
                    let row = sqlx::query("SELECT id, nickname FROM users WHERE nickname_key = ?")
                        .bind(&key)
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or_else(|| ForumError::AuthorNotFound(new_post.author.clone()))?;
                    let found: (i64, String) = (row.try_get("id")?, row.try_get("nickname")?);
                    authors.insert(key, found.clone());
                    found
                }
            };

            let parent_path = if new_post.parent == 0 {
                None
            } else if let Some(path) = batch_paths.get(&new_post.parent) {
                Some(path.clone())
            } else {
                let row = sqlx::query("SELECT thread_id, path FROM posts WHERE id = ?")
                    .bind(new_post.parent)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or(ForumError::ParentNotFound(new_post.parent))?;

                let parent_thread: i64 = row.try_get("thread_id")?;
                if parent_thread != thread.id {
                    return Err(ForumError::CrossThreadParent {
                        parent: new_post.parent,
                        thread: thread.id,
                    });
                }
                Some(PostPath::decode(&row.try_get::<Vec<u8>, _>("path")?)?)
            };

            // The path needs the new id, so it is written in a second statement.
            let id: i64 = sqlx::query(
                r#"
                INSERT INTO posts
                    (parent_id, thread_id, forum, author, message, created_at, path, root_id)
                VALUES (?, ?, ?, ?, ?, ?, x'', 0)
                RETURNING id
                "#,
            )
            .bind(new_post.parent)
            .bind(thread.id)
            .bind(&thread.forum)
            .bind(&author)
            .bind(&new_post.message)
            .bind(created_ms)
            .fetch_one(&mut *tx)
            .await?
            .try_get("id")?;

            let path = match &parent_path {
                Some(parent) => parent.child(id),
                None => PostPath::root(id),
            };
            let root_id = path.root_id().unwrap_or(id);

            sqlx::query("UPDATE posts SET path = ?, root_id = ? WHERE id = ?")
                .bind(path.encode())
                .bind(root_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;

            if members.insert(author_id) {
                sqlx::query("INSERT OR IGNORE INTO forum_users (forum_id, user_id) VALUES (?, ?)")
                    .bind(thread.forum_id)
                    .bind(author_id)
                    .execute(&mut *tx)
                    .await?;
            }

            batch_paths.insert(id, path.clone());
            stored.push(Post {
                id,
                parent: new_post.parent,
                thread: thread.id,
                forum: thread.forum.clone(),
                author,
                created,
                message: new_post.message,
                is_edited: false,
                path,
            });
        }

        tx.commit().await?;
        Ok(stored)
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        nickname: row.try_get("nickname")?,
        fullname: row.try_get("fullname")?,
        email: row.try_get("email")?,
        about: row.try_get("about")?,
    })
}

fn forum_from_row(row: &SqliteRow) -> Result<Forum> {
    Ok(Forum {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        user: row.try_get("owner")?,
        threads: row.try_get("threads")?,
        posts: row.try_get("posts")?,
    })
}

fn thread_from_row(row: &SqliteRow) -> Result<Thread> {
    Ok(Thread {
        id: row.try_get("id")?,
        author: row.try_get("author")?,
        created: from_millis(row.try_get("created_at")?)?,
        forum: row.try_get("forum")?,
        forum_id: row.try_get("forum_id")?,
        message: row.try_get("message")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        votes: row.try_get("votes")?,
    })
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        parent: row.try_get("parent_id")?,
        thread: row.try_get("thread_id")?,
        forum: row.try_get("forum")?,
        author: row.try_get("author")?,
        created: from_millis(row.try_get("created_at")?)?,
        message: row.try_get("message")?,
        is_edited: row.try_get("is_edited")?,
        path: PostPath::decode(&row.try_get::<Vec<u8>, _>("path")?)?,
    })
}

#[async_trait]
impl ForumStore for SqliteForumStore {
    // ============================================================
    // USER OPERATIONS
    // ============================================================

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (nickname, nickname_key, fullname, email, email_key, about)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.nickname)
        .bind(lookup_key(&user.nickname))
        .bind(&user.fullname)
        .bind(&user.email)
        .bind(lookup_key(&user.email))
        .bind(&user.about)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(User {
                id: row.try_get("id")?,
                nickname: user.nickname,
                fullname: user.fullname,
                email: user.email,
                about: user.about,
            }),
            Err(e) if is_unique_violation(&e) => {
                let rows = sqlx::query(&format!(
                    "SELECT {} FROM users WHERE nickname_key = ? OR email_key = ? ORDER BY id",
                    USER_COLUMNS
                ))
                .bind(lookup_key(&user.nickname))
                .bind(lookup_key(&user.email))
                .fetch_all(&self.pool)
                .await?;

                let existing = rows.iter().map(user_from_row).collect::<Result<Vec<_>>>()?;
                Err(ForumError::UserExists(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, nickname: &str) -> Result<User> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE nickname_key = ?", USER_COLUMNS))
            .bind(lookup_key(nickname))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ForumError::UserNotFound(nickname.to_string()))?;

        user_from_row(&row)
    }

    async fn update_user(&self, nickname: &str, update: UserUpdate) -> Result<User> {
        if update.is_empty() {
            return self.get_user(nickname).await;
        }

        let result = sqlx::query(&format!(
            r#"
            UPDATE users
            SET fullname = COALESCE(?, fullname),
                email = COALESCE(?, email),
                email_key = COALESCE(?, email_key),
                about = COALESCE(?, about)
            WHERE nickname_key = ?
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&update.fullname)
        .bind(&update.email)
        .bind(update.email.as_deref().map(lookup_key))
        .bind(&update.about)
        .bind(lookup_key(nickname))
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => user_from_row(&row),
            Ok(None) => Err(ForumError::UserNotFound(nickname.to_string())),
            Err(e) if is_unique_violation(&e) => Err(ForumError::EmailTaken(
                update.email.unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    // ============================================================
    // FORUM OPERATIONS
    // ============================================================

    async fn create_forum(&self, forum: NewForum) -> Result<Forum> {
        let owner = self.get_user(&forum.user).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO forums (slug, slug_key, title, user_id, owner)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&forum.slug)
        .bind(lookup_key(&forum.slug))
        .bind(&forum.title)
        .bind(owner.id)
        .bind(&owner.nickname)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                debug!(forum = %forum.slug, owner = %owner.nickname, "Forum created");
                Ok(Forum {
                    id: row.try_get("id")?,
                    slug: forum.slug,
                    title: forum.title,
                    user: owner.nickname,
                    threads: 0,
                    posts: 0,
                })
            }
            Err(e) if is_unique_violation(&e) => {
                let existing = self.get_forum(&forum.slug).await?;
                Err(ForumError::ForumExists(Box::new(existing)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_forum(&self, slug: &str) -> Result<Forum> {
        let row = sqlx::query(&format!("SELECT {} FROM forums WHERE slug_key = ?", FORUM_COLUMNS))
            .bind(lookup_key(slug))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ForumError::ForumNotFound(slug.to_string()))?;

        forum_from_row(&row)
    }

    async fn forum_users(&self, slug: &str, query: &UserQuery) -> Result<Vec<User>> {
        query.validate()?;
        let forum = self.get_forum(slug).await?;

        let rows = self
            .fetch_statement(pagination::member_page(Dialect::Sqlite, forum.id, query))
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    // ============================================================
    // THREAD OPERATIONS
    // ============================================================

    async fn create_thread(&self, forum_slug: &str, thread: NewThread) -> Result<Thread> {
        let forum = self.get_forum(forum_slug).await?;
        let author = self.get_user(&thread.author).await?;
        let created = truncate_millis(&thread.created.unwrap_or_else(now))?;

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO threads
                (forum_id, forum, author, slug, slug_key, title, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(forum.id)
        .bind(&forum.slug)
        .bind(&author.nickname)
        .bind(&thread.slug)
        .bind(thread.slug.as_deref().map(lookup_key))
        .bind(&thread.title)
        .bind(&thread.message)
        .bind(to_millis(&created))
        .fetch_one(&mut *tx)
        .await;

        let id: i64 = match inserted {
            Ok(row) => row.try_get("id")?,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                let slug = thread.slug.clone().unwrap_or_default();
                let existing = self.get_thread(&ThreadRef::Slug(slug)).await?;
                return Err(ForumError::ThreadExists(Box::new(existing)));
            }
            Err(e) => return Err(e.into()),
        };

        counters::increment_threads(&mut *tx, forum.id).await?;

        sqlx::query("INSERT OR IGNORE INTO forum_users (forum_id, user_id) VALUES (?, ?)")
            .bind(forum.id)
            .bind(author.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(thread_id = id, forum = %forum.slug, "Thread created");

        Ok(Thread {
            id,
            author: author.nickname,
            created,
            forum: forum.slug,
            forum_id: forum.id,
            message: thread.message,
            slug: thread.slug,
            title: thread.title,
            votes: 0,
        })
    }

    async fn get_thread(&self, thread: &ThreadRef) -> Result<Thread> {
        let sql = match thread {
            ThreadRef::Id(_) => {
                format!("SELECT {} FROM threads WHERE id = ?", pagination::THREAD_COLUMNS)
            }
            ThreadRef::Slug(_) => {
                format!("SELECT {} FROM threads WHERE slug_key = ?", pagination::THREAD_COLUMNS)
            }
        };
        let query = match thread {
            ThreadRef::Id(id) => sqlx::query(&sql).bind(*id),
            ThreadRef::Slug(slug) => sqlx::query(&sql).bind(lookup_key(slug)),
        };

        let row = query
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ForumError::ThreadNotFound(thread.to_string()))?;

        thread_from_row(&row)
    }

    async fn update_thread(&self, thread: &ThreadRef, update: ThreadUpdate) -> Result<Thread> {
        let current = self.get_thread(thread).await?;
        if update.is_empty() {
            return Ok(current);
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE threads
            SET title = COALESCE(?, title),
                message = COALESCE(?, message)
            WHERE id = ?
            RETURNING {}
            "#,
            pagination::THREAD_COLUMNS
        ))
        .bind(&update.title)
        .bind(&update.message)
        .bind(current.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ForumError::ThreadNotFound(thread.to_string()))?;

        thread_from_row(&row)
    }

    async fn forum_threads(&self, forum_slug: &str, query: &ThreadQuery) -> Result<Vec<Thread>> {
        query.validate()?;
        let forum = self.get_forum(forum_slug).await?;

        let rows = self
            .fetch_statement(pagination::thread_page(Dialect::Sqlite, forum.id, query))
            .await?;
        rows.iter().map(thread_from_row).collect()
    }

    // ============================================================
    // POST OPERATIONS
    // ============================================================

    async fn create_posts(
        &self,
        thread: &Thread,
        created: DateTime<Utc>,
        posts: Vec<NewPost>,
    ) -> Result<Vec<Post>> {
        if posts.is_empty() {
            debug!(thread_id = thread.id, "Empty post batch");
            return Ok(Vec::new());
        }

        let count = posts.len();
        let result = self.insert_batch(thread, created, posts).await;
        match &result {
            Ok(_) => debug!(thread_id = thread.id, count, "Post batch stored"),
            Err(e) => warn!(thread_id = thread.id, count, error = %e, "Post batch rejected"),
        }
        result
    }

    async fn get_post(&self, id: i64) -> Result<Post> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM posts WHERE id = ?",
            pagination::POST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ForumError::PostNotFound(id))?;

        post_from_row(&row)
    }

    async fn update_post(&self, id: i64, message: Option<String>) -> Result<Post> {
        let post = self.get_post(id).await?;
        let message = match message {
            Some(message) if message != post.message => message,
            _ => return Ok(post),
        };

        sqlx::query("UPDATE posts SET message = ?, is_edited = ? WHERE id = ?")
            .bind(&message)
            .bind(true)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(Post {
            message,
            is_edited: true,
            ..post
        })
    }

    async fn list_posts(&self, thread_id: i64, query: &PostQuery) -> Result<Vec<Post>> {
        query.validate()?;

        let cursor_path = match query.since {
            Some(since) if query.needs_cursor_path() => {
                Some(self.cursor_path(thread_id, since).await?)
            }
            _ => None,
        };

        debug!(
            thread_id,
            sort = %query.sort,
            since = ?query.since,
            limit = query.limit,
            desc = query.direction.is_desc(),
            "Listing posts"
        );

        let statement =
            pagination::post_page(Dialect::Sqlite, thread_id, query, cursor_path.as_ref());
        let rows = self.fetch_statement(statement).await?;
        rows.iter().map(post_from_row).collect()
    }

    // ============================================================
    // VOTE OPERATIONS
    // ============================================================

    async fn apply_vote(
        &self,
        thread_id: i64,
        nickname: &str,
        voice: Voice,
    ) -> Result<AppliedVote> {
        let mut tx = self.pool.begin().await?;

        // Takes the write lock before the previous vote is read.
        counters::lock_thread(&mut *tx, thread_id).await?;

        let user_id: i64 = sqlx::query("SELECT id FROM users WHERE nickname_key = ?")
            .bind(lookup_key(nickname))
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ForumError::UserNotFound(nickname.to_string()))?
            .try_get("id")?;

        let previous = sqlx::query("SELECT voice FROM votes WHERE user_id = ? AND thread_id = ?")
            .bind(user_id)
            .bind(thread_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.try_get::<i32, _>("voice"))
            .transpose()?
            .map(Voice::try_from)
            .transpose()?;

        let delta = vote_delta(previous, voice);

        sqlx::query(
            r#"
            INSERT INTO votes (user_id, thread_id, voice) VALUES (?, ?, ?)
            ON CONFLICT (user_id, thread_id) DO UPDATE SET voice = excluded.voice
            "#,
        )
        .bind(user_id)
        .bind(thread_id)
        .bind(voice.value())
        .execute(&mut *tx)
        .await?;

        counters::increment_votes(&mut *tx, thread_id, delta).await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM threads WHERE id = ?",
            pagination::THREAD_COLUMNS
        ))
        .bind(thread_id)
        .fetch_one(&mut *tx)
        .await?;
        let thread = thread_from_row(&row)?;

        tx.commit().await?;

        debug!(thread_id, voter = %nickname, delta, votes = thread.votes, "Vote applied");
        Ok(AppliedVote { delta, thread })
    }

    // ============================================================
    // SERVICE OPERATIONS
    // ============================================================

    async fn status(&self) -> Result<Status> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM forums) AS forums,
                (SELECT COUNT(*) FROM threads) AS threads,
                (SELECT COUNT(*) FROM posts) AS posts
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Status {
            user: row.try_get("users")?,
            forum: row.try_get("forums")?,
            thread: row.try_get("threads")?,
            post: row.try_get("posts")?,
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for table in ["votes", "forum_users", "posts", "threads", "forums", "users"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM sqlite_sequence")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Forum store cleared");
        Ok(())
    }
}
