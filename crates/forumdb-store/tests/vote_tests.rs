//! Integration tests for the vote ledger and the thread vote counter.

mod common;

use common::*;
use forumdb_store::{ForumError, ForumStore, SqliteForumStore, ThreadRef, Voice};
use std::sync::Arc;

#[tokio::test]
async fn test_repeat_vote_is_idempotent() {
    let store = memory_store().await;
    let thread = seeded(&store).await;

    let first = store.apply_vote(thread.id, "alice", Voice::Up).await.unwrap();
    assert_eq!(first.delta, 1);
    assert_eq!(first.thread.votes, 1);

    let second = store.apply_vote(thread.id, "alice", Voice::Up).await.unwrap();
    assert_eq!(second.delta, 0);
    assert_eq!(second.thread.votes, 1);
}

#[tokio::test]
async fn test_flip_moves_total_by_two() {
    let store = memory_store().await;
    let thread = seeded(&store).await;

    let down = store
        .apply_vote(thread.id, "alice", Voice::Down)
        .await
        .unwrap();
    let up = store.apply_vote(thread.id, "alice", Voice::Up).await.unwrap();

    assert_eq!(down.delta + up.delta, 2);
    assert_eq!(up.thread.votes, 1);
}

#[tokio::test]
async fn test_vote_sequence_totals() {
    let store = memory_store().await;
    let thread = seeded(&store).await;

    let mut deltas = Vec::new();
    let mut totals = Vec::new();
    for voice in [Voice::Up, Voice::Up, Voice::Down] {
        let applied = store.apply_vote(thread.id, "ALICE", voice).await.unwrap();
        deltas.push(applied.delta);
        totals.push(applied.thread.votes);
    }

    assert_eq!(deltas, vec![1, 0, -2]);
    assert_eq!(totals, vec![1, 1, -1]);

    let stored = store.get_thread(&ThreadRef::Id(thread.id)).await.unwrap();
    assert_eq!(stored.votes, -1);
}

#[tokio::test]
async fn test_votes_from_several_users_add_up() {
    let store = memory_store().await;
    let thread = seeded(&store).await;
    add_user(&store, "bob").await;
    add_user(&store, "carol").await;

    store.apply_vote(thread.id, "alice", Voice::Up).await.unwrap();
    store.apply_vote(thread.id, "bob", Voice::Up).await.unwrap();
    let last = store
        .apply_vote(thread.id, "carol", Voice::Down)
        .await
        .unwrap();

    assert_eq!(last.thread.votes, 1);
}

#[tokio::test]
async fn test_vote_on_unknown_thread_or_user() {
    let store = memory_store().await;
    let thread = seeded(&store).await;

    assert!(matches!(
        store.apply_vote(9_999, "alice", Voice::Up).await,
        Err(ForumError::ThreadNotFound(_))
    ));
    assert!(matches!(
        store.apply_vote(thread.id, "mallory", Voice::Up).await,
        Err(ForumError::UserNotFound(ref who)) if who == "mallory"
    ));

    // Neither failure touched the counter.
    let stored = store.get_thread(&ThreadRef::Id(thread.id)).await.unwrap();
    assert_eq!(stored.votes, 0);
}

#[tokio::test]
async fn test_out_of_domain_voice_never_reaches_the_ledger() {
    assert!(matches!(Voice::try_from(0), Err(ForumError::InvalidVoice(0))));
    assert!(matches!(Voice::try_from(5), Err(ForumError::InvalidVoice(5))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_sum_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteForumStore::new(dir.path().join("votes.db")).await.unwrap());
    let thread = seeded(&*store).await;

    let voters: Vec<String> = (0..12).map(|i| format!("voter{}", i)).collect();
    for voter in &voters {
        add_user(&*store, voter).await;
    }

    let mut handles = Vec::new();
    for (i, voter) in voters.into_iter().enumerate() {
        let store = store.clone();
        let thread_id = thread.id;
        // Eight up votes, four down votes.
        let voice = if i % 3 == 2 { Voice::Down } else { Voice::Up };
        handles.push(tokio::spawn(async move {
            store.apply_vote(thread_id, &voter, voice).await.unwrap()
        }));
    }

    let mut delta_sum = 0;
    for handle in handles {
        delta_sum += handle.await.unwrap().delta;
    }

    let stored = store.get_thread(&ThreadRef::Id(thread.id)).await.unwrap();
    assert_eq!(delta_sum, 4);
    assert_eq!(stored.votes, 4);
}
