//! SQLite-backed store.
//!
//! Every write to `issue_votes` is mirrored into the `vote_changes` feed table
//! by triggers, so any process sharing the database file sees the change.
//! Subscriptions poll that feed past a sequence cursor. Vote writes prune feed
//! rows older than the retention window.
//!
//! Connection work runs on tokio's blocking pool, so a locked database stalls
//! only the call that hit it and a caller's timeout can still fire.

#![allow(clippy::missing_errors_doc)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{ContentStore, IdTaken, ProfileStore, Subscription, VoteStore};
use crate::changes::VoteChange;
use crate::model::{Comment, Issue, Profile, RawVoteRow, VoteType};

/// Notifications buffered per subscription before the feed waits on the reader.
const CHANGE_BUFFER: usize = 64;

/// Default polling period for change-feed subscriptions.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default age after which change-feed rows are pruned.
pub const DEFAULT_CHANGE_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Timestamp layout of `vote_changes.changed_at`, as written by the schema default.
const FEED_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Store for issues, comments, profiles, and votes.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    poll_interval: Duration,
    change_retention: Duration,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directories: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .context("Failed to configure connection")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            change_retention: DEFAULT_CHANGE_RETENTION,
        })
    }

    /// Set how often subscriptions poll the change feed.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set how long change-feed rows are kept before vote writes prune them.
    ///
    /// Keep this well above the poll interval: a subscriber that falls
    /// further behind misses the pruned notifications.
    #[must_use]
    pub fn with_change_retention(mut self, retention: Duration) -> Self {
        self.change_retention = retention;
        self
    }

    /// Initialize the database schema.
    ///
    /// Creates all tables, indexes, and triggers if they don't exist.
    /// Runs on the calling thread.
    pub fn init_schema(&self) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize schema")
    }

    /// Sequence number of the newest change in the feed (0 when empty).
    pub async fn latest_change_seq(&self) -> Result<i64> {
        self.with_conn(latest_change_seq).await
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        run_blocking(Arc::clone(&self.conn), f).await
    }

    /// Oldest `changed_at` a vote write keeps in the feed.
    fn feed_cutoff(&self) -> Result<String> {
        let retention = chrono::Duration::from_std(self.change_retention)
            .context("Change retention out of range")?;
        Ok((Utc::now() - retention).format(FEED_TS_FORMAT).to_string())
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| anyhow!("database connection lock poisoned"))
}

async fn run_blocking<T, F>(conn: Arc<Mutex<Connection>>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = lock(&conn)?;
        f(&conn)
    })
    .await
    .context("Database task failed")?
}

fn is_primary_key_clash(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

// ============================================================================
// Votes
// ============================================================================

#[async_trait]
impl VoteStore for SqliteStore {
    async fn read_votes(&self, issue_id: &str) -> Result<Vec<RawVoteRow>> {
        let issue_id = issue_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT issue_id, user_id, vote_type FROM issue_votes
                 WHERE issue_id = ? ORDER BY voted_at, user_id",
            )?;
            let rows = stmt
                .query_map(params![issue_id], |row| {
                    Ok(RawVoteRow {
                        issue_id: row.get(0)?,
                        user_id: row.get(1)?,
                        vote_type: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .with_context(|| format!("Failed to read votes for {issue_id}"))?;
            Ok(rows)
        })
        .await
    }

    async fn upsert_vote(
        &self,
        issue_id: &str,
        user_id: &str,
        vote_type: VoteType,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let cutoff = self.feed_cutoff()?;
        let (issue_id, user_id) = (issue_id.to_string(), user_id.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO issue_votes (issue_id, user_id, vote_type, voted_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (issue_id, user_id) DO UPDATE SET
                     vote_type = excluded.vote_type,
                     voted_at = excluded.voted_at",
                params![issue_id, user_id, vote_type.as_str(), now],
            )
            .with_context(|| format!("Failed to record {vote_type} on {issue_id}"))?;
            prune_changes(conn, &cutoff);
            Ok(())
        })
        .await
    }

    async fn delete_vote(&self, issue_id: &str, user_id: &str) -> Result<()> {
        let cutoff = self.feed_cutoff()?;
        let (issue_id, user_id) = (issue_id.to_string(), user_id.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM issue_votes WHERE issue_id = ? AND user_id = ?",
                params![issue_id, user_id],
            )
            .with_context(|| format!("Failed to remove vote on {issue_id}"))?;
            prune_changes(conn, &cutoff);
            Ok(())
        })
        .await
    }

    async fn subscribe_vote_changes(&self, issue_id: &str) -> Result<Subscription> {
        let cursor = self.latest_change_seq().await?;
        let (tx, rx) = mpsc::channel(CHANGE_BUFFER);

        let feed = tokio::spawn(feed_changes(
            Arc::clone(&self.conn),
            issue_id.to_string(),
            cursor,
            self.poll_interval,
            tx,
        ));

        debug!(issue_id, cursor, "subscribed to vote changes");
        Ok(Subscription::new(issue_id, rx, Some(feed)))
    }
}

/// Poll the change feed for one issue and forward new rows until the
/// subscriber goes away or the database fails.
async fn feed_changes(
    conn: Arc<Mutex<Connection>>,
    issue_id: String,
    mut cursor: i64,
    every: Duration,
    tx: mpsc::Sender<VoteChange>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            return;
        }

        let polled = {
            let issue_id = issue_id.clone();
            run_blocking(Arc::clone(&conn), move |conn| {
                changes_since(conn, &issue_id, cursor)
            })
            .await
        };
        let batch = match polled {
            Ok(batch) => batch,
            Err(err) => {
                warn!(issue_id = %issue_id, error = %err, "vote change feed failed");
                return;
            }
        };

        for change in batch {
            cursor = change.seq;
            if tx.send(change).await.is_err() {
                return;
            }
        }
    }
}

fn changes_since(conn: &Connection, issue_id: &str, cursor: i64) -> Result<Vec<VoteChange>> {
    let mut stmt = conn.prepare(
        "SELECT seq, issue_id, user_id, kind, changed_at FROM vote_changes
         WHERE issue_id = ? AND seq > ? ORDER BY seq",
    )?;
    let raw = stmt
        .query_map(params![issue_id, cursor], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read vote change feed")?;

    raw.into_iter()
        .map(|(seq, issue_id, user_id, kind, changed_at)| {
            let ts = DateTime::parse_from_rfc3339(&changed_at)
                .with_context(|| format!("Bad timestamp in vote change {seq}: {changed_at}"))?
                .with_timezone(&Utc);
            Ok(VoteChange {
                seq,
                issue_id,
                user_id,
                kind: kind.parse()?,
                ts,
            })
        })
        .collect()
}

fn latest_change_seq(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM vote_changes", [], |row| {
        row.get(0)
    })
    .context("Failed to query vote change feed head")
}

/// Drop feed rows written before `cutoff`. The vote write already committed,
/// so a failure here is logged and otherwise ignored.
fn prune_changes(conn: &Connection, cutoff: &str) {
    match conn.execute(
        "DELETE FROM vote_changes WHERE changed_at < ?",
        params![cutoff],
    ) {
        Ok(0) => {}
        Ok(pruned) => debug!(pruned, cutoff, "pruned vote change feed"),
        Err(err) => warn!(error = %err, "failed to prune vote change feed"),
    }
}

// ============================================================================
// Profiles
// ============================================================================

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn read_profiles_by_ids(&self, user_ids: &[String]) -> Result<HashMap<String, Profile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let user_ids = user_ids.to_vec();
        self.with_conn(move |conn| {
            let placeholders = vec!["?"; user_ids.len()].join(", ");
            let sql = format!(
                "SELECT id, username, full_name FROM profiles WHERE id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql)?;
            let profiles = stmt
                .query_map(params_from_iter(user_ids.iter()), |row| {
                    Ok(Profile {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        full_name: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to read profiles")?;

            Ok(profiles.into_iter().map(|p| (p.id.clone(), p)).collect())
        })
        .await
    }
}

// ============================================================================
// Issues, comments
// ============================================================================

#[async_trait]
impl ContentStore for SqliteStore {
    async fn insert_issue(&self, issue: &Issue) -> Result<()> {
        let issue = issue.clone();
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO issues (
                    id, title, description, error_code, screenshot_url, author_id, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    issue.id,
                    issue.title,
                    issue.description,
                    issue.error_code,
                    issue.screenshot_url,
                    issue.author_id,
                    issue.created_at,
                ],
            );
            match inserted {
                Ok(_) => Ok(()),
                Err(err) if is_primary_key_clash(&err) => Err(IdTaken { id: issue.id }.into()),
                Err(err) => {
                    Err(err).with_context(|| format!("Failed to insert issue {}", issue.id))
                }
            }
        })
        .await
    }

    async fn get_issue(&self, issue_id: &str) -> Result<Option<Issue>> {
        let issue_id = issue_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{ISSUE_COLUMNS} WHERE id = ?"),
                params![issue_id],
                issue_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to read issue {issue_id}"))
        })
        .await
    }

    async fn list_issues(&self) -> Result<Vec<Issue>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ISSUE_COLUMNS} ORDER BY created_at DESC, id DESC"
            ))?;
            let issues = stmt
                .query_map([], issue_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to list issues")?;
            Ok(issues)
        })
        .await
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        let comment = comment.clone();
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO comments (id, issue_id, author_id, content, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    comment.id,
                    comment.issue_id,
                    comment.author_id,
                    comment.content,
                    comment.created_at,
                ],
            );
            match inserted {
                Ok(_) => Ok(()),
                Err(err) if is_primary_key_clash(&err) => Err(IdTaken { id: comment.id }.into()),
                Err(err) => {
                    Err(err).with_context(|| format!("Failed to insert comment {}", comment.id))
                }
            }
        })
        .await
    }

    async fn list_comments(&self, issue_id: &str) -> Result<Vec<Comment>> {
        let issue_id = issue_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, issue_id, author_id, content, created_at FROM comments
                 WHERE issue_id = ? ORDER BY created_at, id",
            )?;
            let comments = stmt
                .query_map(params![issue_id], |row| {
                    Ok(Comment {
                        id: row.get(0)?,
                        issue_id: row.get(1)?,
                        author_id: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .with_context(|| format!("Failed to list comments for {issue_id}"))?;
            Ok(comments)
        })
        .await
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let profile = profile.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO profiles (id, username, full_name, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (id) DO UPDATE SET
                     username = excluded.username,
                     full_name = excluded.full_name,
                     updated_at = excluded.updated_at",
                params![profile.id, profile.username, profile.full_name, now],
            )
            .with_context(|| format!("Failed to save profile {}", profile.id))?;
            Ok(())
        })
        .await
    }
}

const ISSUE_COLUMNS: &str = "SELECT id, title, description, error_code, screenshot_url, \
                             author_id, created_at FROM issues";

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        error_code: row.get(3)?,
        screenshot_url: row.get(4)?,
        author_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

// ============================================================================
// Schema SQL
// ============================================================================

const SCHEMA_SQL: &str = r"
-- PROFILES
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    username TEXT,
    full_name TEXT,
    updated_at TEXT NOT NULL
);

-- ISSUES
CREATE TABLE IF NOT EXISTS issues (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    error_code TEXT NOT NULL,
    screenshot_url TEXT,
    author_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_issues_created_at ON issues(created_at);
CREATE INDEX IF NOT EXISTS idx_issues_author ON issues(author_id);

-- COMMENTS
CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY,
    issue_id TEXT NOT NULL REFERENCES issues(id),
    author_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_issue_id ON comments(issue_id);

-- ISSUE VOTES
-- vote_type is free text here; readers validate it.
CREATE TABLE IF NOT EXISTS issue_votes (
    issue_id TEXT NOT NULL REFERENCES issues(id),
    user_id TEXT NOT NULL,
    vote_type TEXT NOT NULL,
    voted_at TEXT NOT NULL,
    PRIMARY KEY (issue_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_votes_issue ON issue_votes(issue_id);

-- VOTE CHANGE FEED
CREATE TABLE IF NOT EXISTS vote_changes (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('insert', 'update', 'delete')),
    changed_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_vote_changes_issue_seq ON vote_changes(issue_id, seq);

CREATE TRIGGER IF NOT EXISTS trg_issue_votes_insert AFTER INSERT ON issue_votes
BEGIN
    INSERT INTO vote_changes (issue_id, user_id, kind)
    VALUES (NEW.issue_id, NEW.user_id, 'insert');
END;

CREATE TRIGGER IF NOT EXISTS trg_issue_votes_update AFTER UPDATE ON issue_votes
BEGIN
    INSERT INTO vote_changes (issue_id, user_id, kind)
    VALUES (NEW.issue_id, NEW.user_id, 'update');
END;

CREATE TRIGGER IF NOT EXISTS trg_issue_votes_delete AFTER DELETE ON issue_votes
BEGIN
    INSERT INTO vote_changes (issue_id, user_id, kind)
    VALUES (OLD.issue_id, OLD.user_id, 'delete');
END;
";

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeKind;
    use tempfile::tempdir;

    fn make_issue(id: &str, created_at: &str) -> Issue {
        Issue {
            id: id.to_string(),
            title: format!("Issue {id} with a long enough title"),
            description: "d".repeat(60),
            error_code: "AIERR-0001".to_string(),
            screenshot_url: None,
            author_id: "u1".to_string(),
            created_at: created_at.to_string(),
        }
    }

    async fn store_with_issue(issue_id: &str) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
            .insert_issue(&make_issue(issue_id, "2026-01-01T00:00:00Z"))
            .await
            .unwrap();
        store
    }

    fn feed_kinds(store: &SqliteStore, issue_id: &str) -> Vec<ChangeKind> {
        let conn = lock(&store.conn).unwrap();
        changes_since(&conn, issue_id, 0)
            .unwrap()
            .into_iter()
            .map(|c| c.kind)
            .collect()
    }

    #[tokio::test]
    async fn test_open_and_init_schema_on_disk() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("board.db");

        let store = SqliteStore::open(&db_path).unwrap();
        store.init_schema().unwrap();
        // Idempotent
        store.init_schema().unwrap();

        assert!(db_path.exists());
        assert_eq!(store.latest_change_seq().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_vote() {
        let store = store_with_issue("is-0001").await;

        store
            .upsert_vote("is-0001", "u1", VoteType::Upvote)
            .await
            .unwrap();
        store
            .upsert_vote("is-0001", "u1", VoteType::Downvote)
            .await
            .unwrap();

        let rows = store.read_votes("is-0001").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].vote_type, "downvote");
    }

    #[tokio::test]
    async fn test_triggers_record_every_change() {
        let store = store_with_issue("is-0001").await;

        store
            .upsert_vote("is-0001", "u1", VoteType::Upvote)
            .await
            .unwrap();
        store
            .upsert_vote("is-0001", "u1", VoteType::Downvote)
            .await
            .unwrap();
        store.delete_vote("is-0001", "u1").await.unwrap();

        assert_eq!(
            feed_kinds(&store, "is-0001"),
            vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]
        );
        assert_eq!(store.latest_change_seq().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_missing_vote_is_noop() {
        let store = store_with_issue("is-0001").await;
        store.delete_vote("is-0001", "nobody").await.unwrap();
        assert!(feed_kinds(&store, "is-0001").is_empty());
    }

    #[tokio::test]
    async fn test_vote_on_missing_issue_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();

        let result = store.upsert_vote("is-nope", "u1", VoteType::Upvote).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subscription_receives_changes_for_its_issue_only() {
        let store = store_with_issue("is-0001")
            .await
            .with_poll_interval(Duration::from_millis(5));
        store
            .insert_issue(&make_issue("is-0002", "2026-01-02T00:00:00Z"))
            .await
            .unwrap();

        // Changes before subscribing are not replayed
        store
            .upsert_vote("is-0001", "u9", VoteType::Upvote)
            .await
            .unwrap();

        let mut sub = store.subscribe_vote_changes("is-0001").await.unwrap();

        store
            .upsert_vote("is-0002", "u1", VoteType::Upvote)
            .await
            .unwrap();
        store
            .upsert_vote("is-0001", "u2", VoteType::Downvote)
            .await
            .unwrap();

        let change = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.issue_id, "is-0001");
        assert_eq!(change.user_id, "u2");
        assert_eq!(change.kind, ChangeKind::Insert);
    }

    #[tokio::test]
    async fn test_profiles_batch_lookup() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
            .upsert_profile(&Profile {
                id: "u1".to_string(),
                username: Some("alice".to_string()),
                full_name: Some("Alice".to_string()),
            })
            .await
            .unwrap();

        let ids = vec!["u1".to_string(), "u2".to_string()];
        let profiles = store.read_profiles_by_ids(&ids).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles["u1"].display_name(), Some("Alice"));

        assert!(store.read_profiles_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_issue_and_comment_ordering() {
        let store = store_with_issue("is-0001").await;
        store
            .insert_issue(&make_issue("is-0002", "2026-02-01T00:00:00Z"))
            .await
            .unwrap();

        let issues = store.list_issues().await.unwrap();
        let ids: Vec<&str> = issues.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["is-0002", "is-0001"]);

        for (id, ts) in [("cm-0002", "2026-03-02T00:00:00Z"), ("cm-0001", "2026-03-01T00:00:00Z")] {
            store
                .insert_comment(&Comment {
                    id: id.to_string(),
                    issue_id: "is-0001".to_string(),
                    author_id: "u2".to_string(),
                    content: "same here".to_string(),
                    created_at: ts.to_string(),
                })
                .await
                .unwrap();
        }

        let comments = store.list_comments("is-0001").await.unwrap();
        let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["cm-0001", "cm-0002"]);

        assert!(store.get_issue("is-0002").await.unwrap().is_some());
        assert!(store.get_issue("is-zzzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_ids_report_id_taken() {
        let store = store_with_issue("is-0001").await;

        let err = store
            .insert_issue(&make_issue("is-0001", "2026-01-05T00:00:00Z"))
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<IdTaken>().unwrap().id, "is-0001");

        let comment = Comment {
            id: "cm-0001".to_string(),
            issue_id: "is-0001".to_string(),
            author_id: "u2".to_string(),
            content: "same here".to_string(),
            created_at: "2026-03-01T00:00:00Z".to_string(),
        };
        store.insert_comment(&comment).await.unwrap();
        let err = store.insert_comment(&comment).await.unwrap_err();
        assert!(err.is::<IdTaken>());

        // Foreign key failures are not id clashes
        let orphan = Comment {
            id: "cm-0002".to_string(),
            issue_id: "is-nope".to_string(),
            ..comment
        };
        let err = store.insert_comment(&orphan).await.unwrap_err();
        assert!(!err.is::<IdTaken>());
    }

    #[tokio::test]
    async fn test_vote_writes_prune_expired_feed_rows() {
        let store = store_with_issue("is-0001").await;
        store
            .upsert_vote("is-0001", "u1", VoteType::Upvote)
            .await
            .unwrap();
        lock(&store.conn)
            .unwrap()
            .execute(
                "UPDATE vote_changes SET changed_at = '2000-01-01T00:00:00.000Z'",
                [],
            )
            .unwrap();

        store.delete_vote("is-0001", "u1").await.unwrap();

        assert_eq!(feed_kinds(&store, "is-0001"), vec![ChangeKind::Delete]);
        // Sequence numbers keep climbing past pruned rows
        assert_eq!(store.latest_change_seq().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_recent_feed_rows_survive_pruning() {
        let store = store_with_issue("is-0001").await;
        for user in ["u1", "u2", "u3"] {
            store
                .upsert_vote("is-0001", user, VoteType::Downvote)
                .await
                .unwrap();
        }
        assert_eq!(feed_kinds(&store, "is-0001").len(), 3);
    }

    #[tokio::test]
    async fn test_locked_database_does_not_stall_the_caller() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("board.db");
        let store = SqliteStore::open(&db_path).unwrap();
        store.init_schema().unwrap();
        store
            .insert_issue(&make_issue("is-0001", "2026-01-01T00:00:00Z"))
            .await
            .unwrap();

        let locker = Connection::open(&db_path).unwrap();
        locker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let started = std::time::Instant::now();
        let write = tokio::time::timeout(
            Duration::from_millis(50),
            store.upsert_vote("is-0001", "u1", VoteType::Upvote),
        )
        .await;
        let elapsed = started.elapsed();

        assert!(write.is_err(), "write should still be waiting on the lock");
        assert!(elapsed < Duration::from_secs(2), "caller blocked for {elapsed:?}");

        locker.execute_batch("COMMIT").unwrap();
    }
}
