//! In-memory store for exercising the aggregator and resolver without SQLite.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use overflow_core::changes::{ChangeKind, VoteChange};
use overflow_core::config::CoreConfig;
use overflow_core::model::{Profile, RawVoteRow, VoteType};
use overflow_core::store::{ProfileStore, Subscription, VoteStore};
use tokio::sync::mpsc;

/// Config with short delays so retry paths finish quickly.
pub fn fast_config() -> CoreConfig {
    CoreConfig {
        store_timeout: Duration::from_secs(2),
        read_retries: 2,
        retry_base_delay: Duration::from_millis(1),
        poll_interval: Duration::from_millis(10),
    }
}

#[derive(Default)]
pub struct FakeStore {
    rows: Mutex<Vec<RawVoteRow>>,
    profiles: Mutex<HashMap<String, Profile>>,
    subscribers: Mutex<Vec<(String, mpsc::Sender<VoteChange>)>>,
    seq: AtomicI64,

    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_profiles: AtomicBool,
    /// Subscribe attempts left to reject.
    pub fail_subscribes: AtomicU32,
    /// Writes never resolve while set.
    pub stall_writes: AtomicBool,

    pub vote_reads: AtomicUsize,
    pub vote_writes: AtomicUsize,
    pub subscribes: AtomicUsize,
    pub profile_lookups: AtomicUsize,
    pub last_lookup: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_profile(self: &Arc<Self>, id: &str, full_name: Option<&str>) -> &Arc<Self> {
        self.profiles.lock().unwrap().insert(
            id.to_string(),
            Profile {
                id: id.to_string(),
                username: None,
                full_name: full_name.map(String::from),
            },
        );
        self
    }

    /// Seed a row without notifying anyone.
    pub fn seed(&self, issue_id: &str, user_id: &str, vote_type: &str) {
        self.rows
            .lock()
            .unwrap()
            .push(RawVoteRow::new(issue_id, user_id, vote_type));
    }

    /// Another client votes: the row changes and subscribers hear about it.
    pub fn vote_elsewhere(&self, issue_id: &str, user_id: &str, vote_type: VoteType) {
        let kind = self.put_row(issue_id, user_id, vote_type);
        self.notify(issue_id, user_id, kind);
    }

    /// Another client removes its vote.
    pub fn unvote_elsewhere(&self, issue_id: &str, user_id: &str) {
        if self.take_row(issue_id, user_id) {
            self.notify(issue_id, user_id, ChangeKind::Delete);
        }
    }

    /// Deliver a notification with no matching row change.
    pub fn notify(&self, issue_id: &str, user_id: &str, kind: ChangeKind) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(VoteChange::new(seq, issue_id, user_id, kind));
    }

    /// Deliver an already-built notification, e.g. a duplicate or a stale one.
    pub fn send(&self, change: VoteChange) {
        let subscribers = self.subscribers.lock().unwrap();
        for (_, tx) in subscribers
            .iter()
            .filter(|(issue_id, _)| *issue_id == change.issue_id)
        {
            let _ = tx.try_send(change.clone());
        }
    }

    /// End every open change stream.
    pub fn disconnect_all(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    pub fn open_subscriptions(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    pub fn rows_for(&self, issue_id: &str) -> Vec<RawVoteRow> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.issue_id == issue_id)
            .cloned()
            .collect()
    }

    fn put_row(&self, issue_id: &str, user_id: &str, vote_type: VoteType) -> ChangeKind {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|row| row.issue_id == issue_id && row.user_id == user_id)
        {
            row.vote_type = vote_type.as_str().to_string();
            ChangeKind::Update
        } else {
            rows.push(RawVoteRow::new(issue_id, user_id, vote_type.as_str()));
            ChangeKind::Insert
        }
    }

    fn take_row(&self, issue_id: &str, user_id: &str) -> bool {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| !(row.issue_id == issue_id && row.user_id == user_id));
        rows.len() != before
    }

    async fn before_write(&self) -> Result<()> {
        self.vote_writes.fetch_add(1, Ordering::SeqCst);
        if self.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("write rejected");
        }
        Ok(())
    }
}

#[async_trait]
impl VoteStore for FakeStore {
    async fn read_votes(&self, issue_id: &str) -> Result<Vec<RawVoteRow>> {
        self.vote_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("read unavailable");
        }
        Ok(self.rows_for(issue_id))
    }

    async fn upsert_vote(&self, issue_id: &str, user_id: &str, vote_type: VoteType) -> Result<()> {
        self.before_write().await?;
        self.vote_elsewhere(issue_id, user_id, vote_type);
        Ok(())
    }

    async fn delete_vote(&self, issue_id: &str, user_id: &str) -> Result<()> {
        self.before_write().await?;
        self.unvote_elsewhere(issue_id, user_id);
        Ok(())
    }

    async fn subscribe_vote_changes(&self, issue_id: &str) -> Result<Subscription> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let rejected = self
            .fail_subscribes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if rejected {
            bail!("realtime unavailable");
        }

        let (tx, rx) = mpsc::channel(64);
        self.subscribers
            .lock()
            .unwrap()
            .push((issue_id.to_string(), tx));
        Ok(Subscription::from_channel(issue_id, rx))
    }
}

#[async_trait]
impl ProfileStore for FakeStore {
    async fn read_profiles_by_ids(&self, user_ids: &[String]) -> Result<HashMap<String, Profile>> {
        self.profile_lookups.fetch_add(1, Ordering::SeqCst);
        *self.last_lookup.lock().unwrap() = user_ids.to_vec();
        if self.fail_profiles.load(Ordering::SeqCst) {
            bail!("profiles unavailable");
        }
        let profiles = self.profiles.lock().unwrap();
        Ok(user_ids
            .iter()
            .filter_map(|id| profiles.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}
