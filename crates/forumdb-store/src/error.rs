//! Forum Store Error Types
//!
//! Every store operation returns `Result<T>`, aliased to `Result<T, ForumError>`.
//! The HTTP layer in front of the store is expected to map errors to status
//! codes through [`ForumError::kind`] rather than matching every variant.
//!
//! ## Error Categories
//!
//! ### NotFound
//! - `UserNotFound`, `AuthorNotFound`, `ForumNotFound`, `ThreadNotFound`,
//!   `PostNotFound`, `ParentNotFound`
//!
//! ### Conflict
//! - `UserExists`, `EmailTaken`, `ForumExists`, `ThreadExists`: the row is
//!   already there; the existing entity travels with the error so callers can
//!   echo it back
//! - `CrossThreadParent`: a reply names a parent that lives in another thread
//!
//! ### Validation
//! - `InvalidSortMode`, `InvalidLimit`, `InvalidCursor`, `InvalidVoice`
//!
//! ### Internal
//! - `DatabaseError`, `MigrationError`, `CorruptPath`, `CorruptTimestamp`,
//!   `Config`
//!
//! ## Usage
//!
//! ```ignore
//! use forumdb_store::{ErrorKind, ForumError, ForumStore};
//!
//! match store.create_posts(&thread, now, batch).await {
//!     Ok(posts) => println!("created {}", posts.len()),
//!     Err(e) if e.kind() == ErrorKind::NotFound => println!("missing: {}", e),
//!     Err(ForumError::CrossThreadParent { parent, .. }) => {
//!         println!("post {} belongs to another thread", parent);
//!     }
//!     Err(e) => return Err(e),
//! }
//! ```

use crate::types::{Forum, Thread, User};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForumError>;

/// Coarse classification of a [`ForumError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Internal,
}

#[derive(Debug, Error)]
pub enum ForumError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Post author not found: {0}")]
    AuthorNotFound(String),

    #[error("Forum not found: {0}")]
    ForumNotFound(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Post not found: {0}")]
    PostNotFound(i64),

    #[error("Parent post not found: {0}")]
    ParentNotFound(i64),

    #[error("User already exists: {}", nicknames(.0))]
    UserExists(Vec<User>),

    #[error("Email already registered by another user: {0}")]
    EmailTaken(String),

    #[error("Forum already exists: {}", .0.slug)]
    ForumExists(Box<Forum>),

    #[error("Thread already exists: {}", .0.slug.as_deref().unwrap_or_default())]
    ThreadExists(Box<Thread>),

    #[error("Parent post {parent} was created in another thread (expected thread {thread})")]
    CrossThreadParent { parent: i64, thread: i64 },

    #[error("Invalid sort mode: {0}")]
    InvalidSortMode(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(i64),

    #[error("Invalid cursor: post {0} is not part of the thread")]
    InvalidCursor(i64),

    #[error("Invalid vote voice: {0} (expected -1 or 1)")]
    InvalidVoice(i32),

    #[error("Corrupt post path: {0}")]
    CorruptPath(String),

    #[error("Stored timestamp out of range: {0} ms")]
    CorruptTimestamp(i64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

impl ForumError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForumError::UserNotFound(_)
            | ForumError::AuthorNotFound(_)
            | ForumError::ForumNotFound(_)
            | ForumError::ThreadNotFound(_)
            | ForumError::PostNotFound(_)
            | ForumError::ParentNotFound(_) => ErrorKind::NotFound,

            ForumError::UserExists(_)
            | ForumError::EmailTaken(_)
            | ForumError::ForumExists(_)
            | ForumError::ThreadExists(_)
            | ForumError::CrossThreadParent { .. } => ErrorKind::Conflict,

            ForumError::InvalidSortMode(_)
            | ForumError::InvalidLimit(_)
            | ForumError::InvalidCursor(_)
            | ForumError::InvalidVoice(_) => ErrorKind::Validation,

            ForumError::CorruptPath(_)
            | ForumError::CorruptTimestamp(_)
            | ForumError::Config(_)
            | ForumError::DatabaseError(_)
            | ForumError::MigrationError(_) => ErrorKind::Internal,
        }
    }
}

impl From<sqlx::migrate::MigrateError> for ForumError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        ForumError::MigrationError(e.to_string())
    }
}

fn nicknames(users: &[User]) -> String {
    users
        .iter()
        .map(|u| u.nickname.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// True when `err` is a unique-constraint violation reported by the backend.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
