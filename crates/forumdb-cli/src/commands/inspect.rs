//! Read-only inspection commands
//!
//! - forum: a forum with its counters
//! - thread: a thread by slug or id
//! - post: a post, optionally with its author, forum and thread
//! - posts: one page of a thread's posts in flat, tree or parent_tree order
//! - users: one page of a forum's members

use anyhow::{Context, Result};
use clap::Args;
use forumdb_store::{
    Direction, Forum, ForumStore, Post, PostDetails, PostQuery, Related, SortMode, Thread,
    ThreadRef, User, UserQuery,
};

#[derive(Args, Debug, Clone)]
pub struct PostsArgs {
    /// Thread slug or numeric id
    pub thread: String,

    /// Traversal order: flat, tree or parent_tree
    #[arg(short, long, default_value = "flat")]
    pub sort: String,

    /// Id of the last post already seen
    #[arg(long)]
    pub since: Option<i64>,

    /// Page size (root posts for parent_tree)
    #[arg(short, long)]
    pub limit: Option<u32>,

    /// Newest first
    #[arg(long)]
    pub desc: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UsersArgs {
    /// Forum slug
    pub forum: String,

    /// Nickname of the last user already seen
    #[arg(long)]
    pub since: Option<String>,

    /// Page size
    #[arg(short, long)]
    pub limit: Option<u32>,

    /// Reverse nickname order
    #[arg(long)]
    pub desc: bool,
}

pub async fn forum(store: &dyn ForumStore, slug: &str) -> Result<Forum> {
    store
        .get_forum(slug)
        .await
        .with_context(|| format!("Failed to get forum {}", slug))
}

pub async fn thread(store: &dyn ForumStore, slug_or_id: &str) -> Result<Thread> {
    store
        .get_thread(&ThreadRef::parse(slug_or_id))
        .await
        .with_context(|| format!("Failed to get thread {}", slug_or_id))
}

pub async fn post(store: &dyn ForumStore, id: i64, related: &str) -> Result<PostDetails> {
    store
        .post_details(id, Related::parse(related))
        .await
        .with_context(|| format!("Failed to get post {}", id))
}

pub async fn posts(store: &dyn ForumStore, args: &PostsArgs, page_size: u32) -> Result<Vec<Post>> {
    let sort: SortMode = args.sort.parse()?;
    let thread = thread(store, &args.thread).await?;

    let mut query = PostQuery::new(sort)
        .limit(args.limit.unwrap_or(page_size))
        .desc(args.desc);
    query.since = args.since;

    store
        .list_posts(thread.id, &query)
        .await
        .with_context(|| format!("Failed to list posts of thread {}", args.thread))
}

pub async fn users(store: &dyn ForumStore, args: &UsersArgs, page_size: u32) -> Result<Vec<User>> {
    let query = UserQuery {
        since: args.since.clone(),
        limit: args.limit.unwrap_or(page_size),
        direction: Direction::from_desc(args.desc),
    };

    store
        .forum_users(&args.forum, &query)
        .await
        .with_context(|| format!("Failed to list users of forum {}", args.forum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use forumdb_store::{ForumError, NewForum, NewPost, NewThread, NewUser, SqliteForumStore};

    async fn seeded_store() -> (SqliteForumStore, Thread) {
        let store = SqliteForumStore::new_in_memory().await.unwrap();
        store
            .create_user(NewUser {
                nickname: "alice".to_string(),
                fullname: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                about: String::new(),
            })
            .await
            .unwrap();
        store
            .create_forum(NewForum {
                slug: "rust".to_string(),
                title: "Rust".to_string(),
                user: "alice".to_string(),
            })
            .await
            .unwrap();
        let thread = store
            .create_thread(
                "rust",
                NewThread {
                    title: "Hi".to_string(),
                    author: "alice".to_string(),
                    message: "...".to_string(),
                    slug: Some("hi".to_string()),
                    created: None,
                },
            )
            .await
            .unwrap();
        (store, thread)
    }

    fn posts_args(sort: &str) -> PostsArgs {
        PostsArgs {
            thread: "hi".to_string(),
            sort: sort.to_string(),
            since: None,
            limit: None,
            desc: false,
        }
    }

    #[tokio::test]
    async fn test_posts_uses_page_size_and_sort() {
        let (store, thread) = seeded_store().await;
        let batch = (0..3)
            .map(|i| NewPost {
                parent: 0,
                author: "alice".to_string(),
                message: format!("m{}", i),
            })
            .collect();
        store.create_posts(&thread, Utc::now(), batch).await.unwrap();

        let page = posts(&store, &posts_args("tree"), 2).await.unwrap();
        assert_eq!(page.len(), 2);

        let mut args = posts_args("flat");
        args.desc = true;
        args.limit = Some(10);
        let page = posts(&store, &args, 2).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_posts_rejects_unknown_sort() {
        let (store, _) = seeded_store().await;
        let err = posts(&store, &posts_args("random"), 10).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ForumError>(),
            Some(ForumError::InvalidSortMode(_))
        ));
    }

    #[tokio::test]
    async fn test_thread_by_id_and_slug() {
        let (store, created) = seeded_store().await;
        let by_id = thread(&store, &created.id.to_string()).await.unwrap();
        let by_slug = thread(&store, "hi").await.unwrap();
        assert_eq!(by_id, by_slug);
        assert!(thread(&store, "unknown").await.is_err());
    }

    #[tokio::test]
    async fn test_users_lists_thread_authors() {
        let (store, _) = seeded_store().await;
        let args = UsersArgs {
            forum: "rust".to_string(),
            since: None,
            limit: None,
            desc: false,
        };
        let members = users(&store, &args, 100).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].nickname, "alice");
    }
}
