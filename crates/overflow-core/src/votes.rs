//! Per-issue vote aggregation.
//!
//! A [`VoteAggregator`] is mounted for each issue on screen. It keeps the vote
//! totals and the viewer's own vote, applies clicks optimistically, and
//! re-derives everything from a fresh read whenever the store reports a change
//! to any vote row on the issue.
//!
//! Notifications are never trusted for their content: they may arrive late,
//! twice, or out of order. Each one only triggers a full recount of whatever
//! the store holds at that moment, so the view converges no matter how the
//! events were delivered.

#![allow(clippy::missing_errors_doc)]

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::core::{CoreError, CoreResult};
use crate::identity::Identity;
use crate::model::{AggregateState, VoteType};
use crate::store::{Subscription, VoteStore};

/// Live vote state for one issue, as seen by one viewer.
///
/// Dropping the aggregator (or calling [`unmount`](Self::unmount)) releases its
/// change-stream subscription.
pub struct VoteAggregator<S: VoteStore + ?Sized, I: Identity> {
    store: Arc<S>,
    identity: I,
    issue_id: String,
    config: CoreConfig,
    state: watch::Sender<AggregateState>,
    subscription: Option<Subscription>,
}

impl<S: VoteStore + ?Sized, I: Identity> VoteAggregator<S, I> {
    /// Subscribe to the issue's vote changes and load the initial counts.
    ///
    /// The subscription is opened before the first read so that no change can
    /// slip between the snapshot and the stream. Failures here are not fatal:
    /// a failed read leaves the counts at zero and a failed subscribe is
    /// retried on the next [`next_change`](Self::next_change).
    pub async fn mount(store: Arc<S>, identity: I, issue_id: impl Into<String>, config: CoreConfig) -> Self {
        let (state, _) = watch::channel(AggregateState::default());
        let mut aggregator = Self {
            store,
            identity,
            issue_id: issue_id.into(),
            config,
            state,
            subscription: None,
        };

        match aggregator.subscribe().await {
            Ok(subscription) => aggregator.subscription = Some(subscription),
            Err(err) => warn!(
                issue_id = %aggregator.issue_id,
                error = %err,
                "could not subscribe to vote changes; will retry"
            ),
        }

        match aggregator.read_with_retry().await {
            Some(initial) => {
                aggregator.state.send_replace(initial);
            }
            None => warn!(
                issue_id = %aggregator.issue_id,
                "vote counts unavailable; showing zero until the next change"
            ),
        }

        aggregator
    }

    #[must_use]
    pub fn issue_id(&self) -> &str {
        &self.issue_id
    }

    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Current counts and own vote, including any unconfirmed click.
    #[must_use]
    pub fn state(&self) -> AggregateState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change, optimistic or reconciled.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AggregateState> {
        self.state.subscribe()
    }

    /// Whether a change-stream subscription is currently held.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Click the upvote button.
    pub async fn upvote(&mut self) -> CoreResult<AggregateState> {
        self.click(VoteType::Upvote).await
    }

    /// Click the downvote button.
    pub async fn downvote(&mut self) -> CoreResult<AggregateState> {
        self.click(VoteType::Downvote).await
    }

    /// Apply a click optimistically, then write it through to the store.
    ///
    /// Clicking the active direction removes the vote; clicking the other
    /// direction replaces it. If the write fails the state from before the
    /// click is restored and `WriteFailed` is returned. If this future is
    /// dropped before the write resolves, the click is rolled back as well.
    pub async fn click(&mut self, vote: VoteType) -> CoreResult<AggregateState> {
        let user_id = self
            .identity
            .current_user_id()
            .ok_or(CoreError::Unauthorized)?;

        let previous = self.state();
        let next = previous.after_click(vote);
        let pending = Optimistic::apply(&self.state, previous, next);

        let written = match next.own_vote {
            Some(vote_type) => {
                self.config
                    .bounded(self.store.upsert_vote(&self.issue_id, &user_id, vote_type))
                    .await
            }
            None => {
                self.config
                    .bounded(self.store.delete_vote(&self.issue_id, &user_id))
                    .await
            }
        };

        match written {
            Ok(()) => {
                pending.confirm();
                debug!(issue_id = %self.issue_id, %vote, ?next, "vote written");
                Ok(next)
            }
            Err(err) => {
                drop(pending);
                warn!(issue_id = %self.issue_id, %vote, error = %err, "vote write failed; rolled back");
                Err(CoreError::WriteFailed(err))
            }
        }
    }

    /// Throw away local state and recount from a fresh read of the store.
    pub async fn reconcile(&mut self) -> CoreResult<AggregateState> {
        let fresh = self.read_snapshot().await.map_err(CoreError::ReadFailed)?;
        let stale = self.state.send_replace(fresh);
        if stale != fresh {
            debug!(issue_id = %self.issue_id, ?stale, ?fresh, "reconciled vote state");
        }
        Ok(fresh)
    }

    /// Wait for the next change to the issue's votes and reconcile.
    ///
    /// Notifications already queued behind the first one are absorbed by the
    /// same recount. If the stream has ended, a new subscription is acquired
    /// (with backoff) and the state is reconciled to cover anything missed;
    /// `SubscriptionLost` is returned only when resubscribing keeps failing,
    /// in which case the last known state stays in place.
    pub async fn next_change(&mut self) -> CoreResult<AggregateState> {
        let Some(subscription) = self.subscription.as_mut() else {
            self.resubscribe().await?;
            return self.reconcile().await;
        };

        if let Some(change) = subscription.next().await {
            let absorbed = subscription.drain_ready();
            debug!(
                issue_id = %self.issue_id,
                seq = change.seq,
                kind = %change.kind,
                user_id = %change.user_id,
                absorbed,
                "vote change received"
            );
            return self.reconcile().await;
        }

        warn!(issue_id = %self.issue_id, "vote change stream ended; resubscribing");
        self.subscription = None;
        self.resubscribe().await?;
        self.reconcile().await
    }

    /// Release the change-stream subscription and discard local state.
    pub fn unmount(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        debug!(issue_id = %self.issue_id, "vote aggregator unmounted");
    }

    async fn subscribe(&self) -> anyhow::Result<Subscription> {
        self.config
            .bounded(self.store.subscribe_vote_changes(&self.issue_id))
            .await
    }

    async fn resubscribe(&mut self) -> CoreResult<()> {
        for attempt in 0..=self.config.read_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.backoff(attempt - 1)).await;
            }
            match self.subscribe().await {
                Ok(subscription) => {
                    info!(issue_id = %self.issue_id, attempt, "resubscribed to vote changes");
                    self.subscription = Some(subscription);
                    return Ok(());
                }
                Err(err) => warn!(
                    issue_id = %self.issue_id,
                    attempt,
                    error = %err,
                    "resubscribe failed"
                ),
            }
        }

        Err(CoreError::SubscriptionLost {
            issue_id: self.issue_id.clone(),
        })
    }

    async fn read_snapshot(&self) -> anyhow::Result<AggregateState> {
        let rows = self
            .config
            .bounded(self.store.read_votes(&self.issue_id))
            .await?;
        let viewer = self.identity.current_user_id();
        Ok(AggregateState::derive(&rows, viewer.as_deref()))
    }

    async fn read_with_retry(&self) -> Option<AggregateState> {
        for attempt in 0..=self.config.read_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.backoff(attempt - 1)).await;
            }
            match self.read_snapshot().await {
                Ok(state) => return Some(state),
                Err(err) => warn!(
                    issue_id = %self.issue_id,
                    attempt,
                    error = %err,
                    "vote snapshot read failed"
                ),
            }
        }
        None
    }
}

/// An optimistic state change awaiting its store write.
///
/// Restores the previous state on drop unless confirmed, which covers both
/// a failed write and a caller that abandons the write midway.
struct Optimistic<'a> {
    state: &'a watch::Sender<AggregateState>,
    previous: AggregateState,
    confirmed: bool,
}

impl<'a> Optimistic<'a> {
    fn apply(
        state: &'a watch::Sender<AggregateState>,
        previous: AggregateState,
        next: AggregateState,
    ) -> Self {
        state.send_replace(next);
        Self {
            state,
            previous,
            confirmed: false,
        }
    }

    fn confirm(mut self) {
        self.confirmed = true;
    }
}

impl Drop for Optimistic<'_> {
    fn drop(&mut self) {
        if !self.confirmed {
            self.state.send_replace(self.previous);
        }
    }
}
