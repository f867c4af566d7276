//! Store interfaces consumed by the core, and the SQLite implementation.
//!
//! The vote aggregator and author resolver only ever talk to these traits.
//! Implementations return `anyhow::Result`; the engine and service layer map
//! failures into [`CoreError`](crate::core::CoreError) variants.

pub mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::changes::VoteChange;
use crate::model::{Comment, Issue, Profile, RawVoteRow, VoteType};

/// Vote rows keyed by `(issue_id, user_id)`, plus their change stream.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Full snapshot of every vote row on the issue.
    async fn read_votes(&self, issue_id: &str) -> Result<Vec<RawVoteRow>>;

    /// Insert the user's vote, or replace the vote type if a row already exists.
    async fn upsert_vote(&self, issue_id: &str, user_id: &str, vote_type: VoteType)
        -> Result<()>;

    /// Remove the user's vote. Removing a missing row is not an error.
    async fn delete_vote(&self, issue_id: &str, user_id: &str) -> Result<()>;

    /// Start receiving notifications for every vote row change on the issue.
    async fn subscribe_vote_changes(&self, issue_id: &str) -> Result<Subscription>;
}

/// Batched profile lookups.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Profiles for whichever of `user_ids` exist. Missing ids are simply absent.
    async fn read_profiles_by_ids(&self, user_ids: &[String]) -> Result<HashMap<String, Profile>>;
}

/// An insert hit a row that already holds the generated id.
///
/// Callers can draw a fresh id and try again.
#[derive(Debug, thiserror::Error)]
#[error("id {id} is already taken")]
pub struct IdTaken {
    pub id: String,
}

/// Issues, comments, and profile writes.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fails with [`IdTaken`] if an issue with the same id exists.
    async fn insert_issue(&self, issue: &Issue) -> Result<()>;

    async fn get_issue(&self, issue_id: &str) -> Result<Option<Issue>>;

    /// All issues, newest first.
    async fn list_issues(&self) -> Result<Vec<Issue>>;

    /// Fails with [`IdTaken`] if a comment with the same id exists.
    async fn insert_comment(&self, comment: &Comment) -> Result<()>;

    /// Comments on an issue, oldest first.
    async fn list_comments(&self, issue_id: &str) -> Result<Vec<Comment>>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<()>;
}

/// A live subscription to one issue's vote changes.
///
/// Dropping the subscription releases it: any background feed task is
/// aborted and no further notifications are produced.
#[derive(Debug)]
pub struct Subscription {
    issue_id: String,
    rx: mpsc::Receiver<VoteChange>,
    feed: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a receiver fed by `feed`, which is aborted when the subscription drops.
    pub fn new(
        issue_id: impl Into<String>,
        rx: mpsc::Receiver<VoteChange>,
        feed: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            issue_id: issue_id.into(),
            rx,
            feed,
        }
    }

    /// Wrap a receiver whose sender lives elsewhere (no task to manage).
    pub fn from_channel(issue_id: impl Into<String>, rx: mpsc::Receiver<VoteChange>) -> Self {
        Self::new(issue_id, rx, None)
    }

    #[must_use]
    pub fn issue_id(&self) -> &str {
        &self.issue_id
    }

    /// Wait for the next notification.
    ///
    /// Returns `None` once the stream has ended; the subscription is then dead
    /// and a new one must be acquired.
    pub async fn next(&mut self) -> Option<VoteChange> {
        self.rx.recv().await
    }

    /// Discard notifications that are already queued, returning how many.
    pub fn drain_ready(&mut self) -> usize {
        let mut drained = 0;
        while self.rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }

    /// Release the subscription explicitly.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}
