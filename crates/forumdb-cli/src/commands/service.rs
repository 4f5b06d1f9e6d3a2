//! Service commands: status and clear

use anyhow::{Context, Result};
use forumdb_store::{ForumStore, Status};
use tracing::warn;

pub async fn status(store: &dyn ForumStore) -> Result<Status> {
    store.status().await.context("Failed to read store status")
}

/// Delete every row. Refuses to run unless `confirmed`.
pub async fn clear(store: &dyn ForumStore, confirmed: bool) -> Result<Status> {
    if !confirmed {
        anyhow::bail!("clear deletes every user, forum, thread and post; pass --yes to confirm");
    }

    warn!("Clearing forum store");
    store.clear().await.context("Failed to clear store")?;
    status(store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use forumdb_store::{NewUser, SqliteForumStore};

    #[tokio::test]
    async fn test_clear_requires_confirmation() {
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

        assert!(clear(&store, false).await.is_err());
        assert_eq!(status(&store).await.unwrap().user, 1);

        let after = clear(&store, true).await.unwrap();
        assert_eq!(after, Status::default());
    }
}
