mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{fast_config, FakeStore};
use overflow_core::changes::{ChangeKind, VoteChange};
use overflow_core::core::CoreError;
use overflow_core::identity::StaticIdentity;
use overflow_core::model::{AggregateState, VoteType};
use overflow_core::votes::VoteAggregator;

const ISSUE: &str = "is-0001";

type Aggregator = VoteAggregator<FakeStore, StaticIdentity>;

async fn mount_as(store: &Arc<FakeStore>, user: &str) -> Aggregator {
    VoteAggregator::mount(
        Arc::clone(store),
        StaticIdentity::signed_in(user),
        ISSUE,
        fast_config(),
    )
    .await
}

async fn next_change(aggregator: &mut Aggregator) -> AggregateState {
    tokio::time::timeout(Duration::from_secs(1), aggregator.next_change())
        .await
        .expect("change should arrive")
        .unwrap()
}

fn state(up: u64, down: u64, own: Option<VoteType>) -> AggregateState {
    AggregateState {
        upvote_count: up,
        downvote_count: down,
        own_vote: own,
    }
}

#[tokio::test]
async fn mount_reads_existing_votes() {
    let store = FakeStore::new();
    store.seed(ISSUE, "u1", "upvote");
    store.seed(ISSUE, "u2", "upvote");
    store.seed(ISSUE, "u3", "downvote");
    store.seed("is-0002", "u1", "downvote");

    let aggregator = mount_as(&store, "u3").await;

    assert_eq!(aggregator.state(), state(2, 1, Some(VoteType::Downvote)));
    assert!(aggregator.is_subscribed());
}

#[tokio::test]
async fn up_then_down_then_down() {
    let store = FakeStore::new();
    let mut aggregator = mount_as(&store, "u1").await;
    assert_eq!(aggregator.state(), state(0, 0, None));

    let after_up = aggregator.upvote().await.unwrap();
    assert_eq!(after_up, state(1, 0, Some(VoteType::Upvote)));

    let after_swap = aggregator.downvote().await.unwrap();
    assert_eq!(after_swap, state(0, 1, Some(VoteType::Downvote)));
    assert_eq!(store.rows_for(ISSUE)[0].vote_type, "downvote");

    let after_toggle = aggregator.downvote().await.unwrap();
    assert_eq!(after_toggle, state(0, 0, None));
    assert!(store.rows_for(ISSUE).is_empty());

    assert_eq!(aggregator.reconcile().await.unwrap(), after_toggle);
}

#[tokio::test]
async fn anonymous_click_is_rejected_without_side_effects() {
    let store = FakeStore::new();
    store.seed(ISSUE, "u1", "upvote");
    let mut aggregator = VoteAggregator::mount(
        Arc::clone(&store),
        StaticIdentity::anonymous(),
        ISSUE,
        fast_config(),
    )
    .await;
    let mut watcher = aggregator.watch();

    let err = aggregator.upvote().await.unwrap_err();

    assert!(matches!(err, CoreError::Unauthorized));
    assert_eq!(aggregator.state(), state(1, 0, None));
    assert_eq!(store.vote_writes.load(Ordering::SeqCst), 0);
    assert!(!watcher.has_changed().unwrap());
}

#[tokio::test]
async fn two_viewers_converge() {
    let store = FakeStore::new();
    let mut alice = mount_as(&store, "u1").await;
    let mut bob = mount_as(&store, "u2").await;

    alice.upvote().await.unwrap();
    assert_eq!(next_change(&mut bob).await, state(1, 0, None));

    bob.upvote().await.unwrap();
    assert_eq!(bob.state(), state(2, 0, Some(VoteType::Upvote)));

    // Alice has her own write and Bob's queued; one recount covers both.
    assert_eq!(next_change(&mut alice).await, state(2, 0, Some(VoteType::Upvote)));
}

#[tokio::test]
async fn duplicate_and_stale_notifications_converge() {
    let store = FakeStore::new();
    store.seed(ISSUE, "u1", "upvote");
    let mut aggregator = mount_as(&store, "u9").await;

    store.vote_elsewhere(ISSUE, "u2", VoteType::Downvote);
    let stale = VoteChange::new(0, ISSUE, "u7", ChangeKind::Insert);
    store.send(stale.clone());
    store.send(stale);
    store.notify(ISSUE, "u2", ChangeKind::Insert);

    let converged = next_change(&mut aggregator).await;

    assert_eq!(converged, state(1, 1, None));
    assert_eq!(
        converged,
        AggregateState::derive(&store.rows_for(ISSUE), Some("u9"))
    );
}

#[tokio::test]
async fn notification_without_row_change_keeps_counts() {
    let store = FakeStore::new();
    store.seed(ISSUE, "u1", "downvote");
    let mut aggregator = mount_as(&store, "u1").await;
    let before = aggregator.state();

    store.notify(ISSUE, "u1", ChangeKind::Update);

    assert_eq!(next_change(&mut aggregator).await, before);
}

#[tokio::test]
async fn failed_write_rolls_back() {
    let store = FakeStore::new();
    store.seed(ISSUE, "u1", "upvote");
    let mut aggregator = mount_as(&store, "u1").await;
    let before = aggregator.state();
    store.fail_writes.store(true, Ordering::SeqCst);

    let err = aggregator.downvote().await.unwrap_err();

    assert!(matches!(err, CoreError::WriteFailed(_)));
    assert_eq!(aggregator.state(), before);
    assert_eq!(store.rows_for(ISSUE)[0].vote_type, "upvote");
}

#[tokio::test]
async fn abandoned_click_rolls_back() {
    let store = FakeStore::new();
    let mut aggregator = mount_as(&store, "u1").await;
    let mut watcher = aggregator.watch();
    store.stall_writes.store(true, Ordering::SeqCst);

    let optimistic = tokio::select! {
        _ = aggregator.upvote() => panic!("stalled write should not finish"),
        seen = async { watcher.changed().await.map(|()| *watcher.borrow_and_update()) } => seen.unwrap(),
    };

    assert_eq!(optimistic, state(1, 0, Some(VoteType::Upvote)));
    assert_eq!(aggregator.state(), state(0, 0, None));
    assert_eq!(*watcher.borrow_and_update(), state(0, 0, None));
    assert!(store.rows_for(ISSUE).is_empty());
}

#[tokio::test]
async fn optimistic_value_is_published_before_write() {
    let store = FakeStore::new();
    let mut aggregator = mount_as(&store, "u1").await;
    let mut watcher = aggregator.watch();

    aggregator.upvote().await.unwrap();

    assert!(watcher.has_changed().unwrap());
    assert_eq!(*watcher.borrow_and_update(), state(1, 0, Some(VoteType::Upvote)));
}

#[tokio::test]
async fn ended_stream_is_resubscribed() {
    let store = FakeStore::new();
    let mut aggregator = mount_as(&store, "u1").await;

    store.disconnect_all();
    // Nobody is listening when this lands; the resubscribe recount must catch it.
    store.vote_elsewhere(ISSUE, "u2", VoteType::Upvote);

    assert_eq!(next_change(&mut aggregator).await, state(1, 0, None));
    assert_eq!(store.subscribes.load(Ordering::SeqCst), 2);
    assert!(aggregator.is_subscribed());

    store.vote_elsewhere(ISSUE, "u3", VoteType::Downvote);
    assert_eq!(next_change(&mut aggregator).await, state(1, 1, None));
}

#[tokio::test]
async fn resubscribe_gives_up_then_recovers() {
    let store = FakeStore::new();
    store.seed(ISSUE, "u2", "upvote");
    let mut aggregator = mount_as(&store, "u1").await;
    let before = aggregator.state();

    store.disconnect_all();
    store.fail_subscribes.store(100, Ordering::SeqCst);

    let err = aggregator.next_change().await.unwrap_err();
    assert!(matches!(err, CoreError::SubscriptionLost { .. }));
    assert_eq!(aggregator.state(), before);
    assert!(!aggregator.is_subscribed());

    store.fail_subscribes.store(0, Ordering::SeqCst);
    store.vote_elsewhere(ISSUE, "u3", VoteType::Upvote);

    assert_eq!(next_change(&mut aggregator).await, state(2, 0, None));
    assert!(aggregator.is_subscribed());
}

#[tokio::test]
async fn mount_survives_failed_reads() {
    let store = FakeStore::new();
    store.seed(ISSUE, "u1", "upvote");
    store.fail_reads.store(true, Ordering::SeqCst);

    let mut aggregator = mount_as(&store, "u1").await;

    assert_eq!(aggregator.state(), state(0, 0, None));
    assert_eq!(store.vote_reads.load(Ordering::SeqCst), 3);
    assert!(aggregator.is_subscribed());

    store.fail_reads.store(false, Ordering::SeqCst);
    store.vote_elsewhere(ISSUE, "u2", VoteType::Downvote);

    assert_eq!(
        next_change(&mut aggregator).await,
        state(1, 1, Some(VoteType::Upvote))
    );
}

#[tokio::test]
async fn failed_reconcile_keeps_last_state() {
    let store = FakeStore::new();
    store.seed(ISSUE, "u1", "upvote");
    let mut aggregator = mount_as(&store, "u1").await;
    store.fail_reads.store(true, Ordering::SeqCst);

    let err = aggregator.reconcile().await.unwrap_err();

    assert!(matches!(err, CoreError::ReadFailed(_)));
    assert_eq!(aggregator.state(), state(1, 0, Some(VoteType::Upvote)));
}

#[tokio::test]
async fn unknown_vote_types_are_skipped() {
    let store = FakeStore::new();
    store.seed(ISSUE, "u1", "upvote");
    store.seed(ISSUE, "u2", "meh");

    let aggregator = mount_as(&store, "u2").await;

    assert_eq!(aggregator.state(), state(1, 0, None));
}

#[tokio::test]
async fn unmount_releases_subscription() {
    let store = FakeStore::new();
    let aggregator = mount_as(&store, "u1").await;
    assert_eq!(store.open_subscriptions(), 1);

    aggregator.unmount();

    assert_eq!(store.open_subscriptions(), 0);
}

#[tokio::test]
async fn dropping_aggregator_releases_subscription() {
    let store = FakeStore::new();
    {
        let _aggregator = mount_as(&store, "u1").await;
        assert_eq!(store.open_subscriptions(), 1);
    }
    assert_eq!(store.open_subscriptions(), 0);
}
