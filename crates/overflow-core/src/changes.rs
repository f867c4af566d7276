//! Change notifications for vote rows.
//!
//! The store emits one `VoteChange` for every insert, update, or delete of a
//! vote row. Notifications carry no counts: receivers re-read the issue's rows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to the vote row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => anyhow::bail!("unknown change kind '{other}'"),
        }
    }
}

/// A single row-level change to an issue's votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteChange {
    /// Position in the store's change feed. Monotonic per store, not per issue.
    pub seq: i64,
    pub issue_id: String,
    /// User whose vote row changed (not necessarily the viewer).
    pub user_id: String,
    pub kind: ChangeKind,
    pub ts: DateTime<Utc>,
}

impl VoteChange {
    pub fn new(
        seq: i64,
        issue_id: impl Into<String>,
        user_id: impl Into<String>,
        kind: ChangeKind,
    ) -> Self {
        Self {
            seq,
            issue_id: issue_id.into(),
            user_id: user_id.into(),
            kind,
            ts: Utc::now(),
        }
    }

    /// Serialize the change to a JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
