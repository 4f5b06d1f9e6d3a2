//! Counter Aggregator
//!
//! The only code that writes the denormalized counters: `forums.threads`,
//! `forums.posts` and `threads.votes`. Every helper is a single atomic
//! `SET c = c + n` statement executed on the caller's transaction connection,
//! so the counter moves together with the rows it summarizes or not at all.
//! A statement that matches no row reports the missing forum or thread.
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! counters::increment_posts(&mut *tx, &thread.forum, batch.len() as i64).await?;
//! // ... insert the posts ...
//! tx.commit().await?;
//! ```

use crate::error::{ForumError, Result};
use crate::types::lookup_key;
use sqlx::SqliteConnection;
use tracing::debug;

pub(crate) async fn increment_threads(conn: &mut SqliteConnection, forum_id: i64) -> Result<()> {
    let result = sqlx::query("UPDATE forums SET threads = threads + 1 WHERE id = ?")
        .bind(forum_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ForumError::ForumNotFound(forum_id.to_string()));
    }
    Ok(())
}

pub(crate) async fn increment_posts(
    conn: &mut SqliteConnection,
    forum_slug: &str,
    by: i64,
) -> Result<()> {
    let result = sqlx::query("UPDATE forums SET posts = posts + ? WHERE slug_key = ?")
        .bind(by)
        .bind(lookup_key(forum_slug))
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ForumError::ForumNotFound(forum_slug.to_string()));
    }
    debug!(forum = %forum_slug, by, "Forum post counter incremented");
    Ok(())
}

/// Take the write lock on a thread row without changing its vote counter.
///
/// SQLite has no `FOR UPDATE`; a no-op write as the first statement of the
/// transaction makes later reads of the thread's votes stable.
pub(crate) async fn lock_thread(conn: &mut SqliteConnection, thread_id: i64) -> Result<()> {
    let result = sqlx::query("UPDATE threads SET votes = votes WHERE id = ?")
        .bind(thread_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ForumError::ThreadNotFound(thread_id.to_string()));
    }
    Ok(())
}

pub(crate) async fn increment_votes(
    conn: &mut SqliteConnection,
    thread_id: i64,
    by: i32,
) -> Result<()> {
    if by == 0 {
        return Ok(());
    }

    let result = sqlx::query("UPDATE threads SET votes = votes + ? WHERE id = ?")
        .bind(by)
        .bind(thread_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ForumError::ThreadNotFound(thread_id.to_string()));
    }
    Ok(())
}

/// The same statements for PostgreSQL.
#[cfg(feature = "postgres")]
pub(crate) mod pg {
    use crate::error::{ForumError, Result};
    use crate::types::lookup_key;
    use sqlx::PgConnection;
    use tracing::debug;

    pub(crate) async fn increment_threads(conn: &mut PgConnection, forum_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE forums SET threads = threads + 1 WHERE id = $1")
            .bind(forum_id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ForumError::ForumNotFound(forum_id.to_string()));
        }
        Ok(())
    }

    pub(crate) async fn increment_posts(
        conn: &mut PgConnection,
        forum_slug: &str,
        by: i64,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE forums SET posts = posts + $1 WHERE slug_key = $2")
            .bind(by)
            .bind(lookup_key(forum_slug))
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ForumError::ForumNotFound(forum_slug.to_string()));
        }
        debug!(forum = %forum_slug, by, "Forum post counter incremented");
        Ok(())
    }

    /// Row-lock a thread so concurrent batches and votes on it apply one
    /// after another.
    pub(crate) async fn lock_thread(conn: &mut PgConnection, thread_id: i64) -> Result<()> {
        sqlx::query("SELECT id FROM threads WHERE id = $1 FOR UPDATE")
            .bind(thread_id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| ForumError::ThreadNotFound(thread_id.to_string()))?;
        Ok(())
    }

    pub(crate) async fn increment_votes(
        conn: &mut PgConnection,
        thread_id: i64,
        by: i32,
    ) -> Result<()> {
        if by == 0 {
            return Ok(());
        }

        let result = sqlx::query("UPDATE threads SET votes = votes + $1 WHERE id = $2")
            .bind(by)
            .bind(thread_id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ForumError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(())
    }
}
