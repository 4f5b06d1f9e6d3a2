//! Shared fixtures for the store integration tests.

#![allow(dead_code)]

use forumdb_store::{
    ForumStore, NewForum, NewPost, NewThread, NewUser, SqliteForumStore, Thread, User,
};

pub async fn memory_store() -> SqliteForumStore {
    SqliteForumStore::new_in_memory().await.unwrap()
}

pub async fn add_user(store: &dyn ForumStore, nickname: &str) -> User {
    store
        .create_user(NewUser {
            nickname: nickname.to_string(),
            fullname: format!("{} Tester", nickname),
            email: format!("{}@example.com", nickname.to_lowercase()),
            about: String::new(),
        })
        .await
        .unwrap()
}

pub async fn add_forum(store: &dyn ForumStore, slug: &str, owner: &str) {
    store
        .create_forum(NewForum {
            slug: slug.to_string(),
            title: format!("All about {}", slug),
            user: owner.to_string(),
        })
        .await
        .unwrap();
}

pub async fn add_thread(
    store: &dyn ForumStore,
    forum: &str,
    author: &str,
    slug: Option<&str>,
) -> Thread {
    store
        .create_thread(
            forum,
            NewThread {
                title: "A thread".to_string(),
                author: author.to_string(),
                message: "Opening message".to_string(),
                slug: slug.map(str::to_string),
                created: None,
            },
        )
        .await
        .unwrap()
}

/// One forum "rust" owned by alice, with a thread opened by alice.
pub async fn seeded(store: &dyn ForumStore) -> Thread {
    add_user(store, "alice").await;
    add_forum(store, "rust", "alice").await;
    add_thread(store, "rust", "alice", Some("welcome")).await
}

pub fn post(parent: i64, author: &str, message: &str) -> NewPost {
    NewPost {
        parent,
        author: author.to_string(),
        message: message.to_string(),
    }
}

pub fn ids<T, F: Fn(&T) -> i64>(items: &[T], id: F) -> Vec<i64> {
    items.iter().map(id).collect()
}
