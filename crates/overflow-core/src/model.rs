//! Domain types shared by the store, the vote aggregator, and the author resolver.
//!
//! Rows coming back from a store are raw records; they are validated into the
//! typed shapes here before anything counts them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

// ============================================================================
// Votes
// ============================================================================

/// Direction of a single user's vote on an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    #[cfg_attr(feature = "clap", value(alias = "up"))]
    Upvote,
    #[cfg_attr(feature = "clap", value(alias = "down"))]
    Downvote,
}

impl VoteType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upvote => "upvote",
            Self::Downvote => "downvote",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vote type string outside the closed `upvote`/`downvote` set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown vote type '{0}'")]
pub struct UnknownVoteType(pub String);

impl FromStr for VoteType {
    type Err = UnknownVoteType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upvote" => Ok(Self::Upvote),
            "downvote" => Ok(Self::Downvote),
            other => Err(UnknownVoteType(other.to_string())),
        }
    }
}

/// A vote row exactly as the store returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVoteRow {
    pub issue_id: String,
    pub user_id: String,
    pub vote_type: String,
}

impl RawVoteRow {
    pub fn new(
        issue_id: impl Into<String>,
        user_id: impl Into<String>,
        vote_type: impl Into<String>,
    ) -> Self {
        Self {
            issue_id: issue_id.into(),
            user_id: user_id.into(),
            vote_type: vote_type.into(),
        }
    }
}

/// One user's current vote on one issue.
///
/// The store holds at most one of these per `(issue_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRow {
    pub issue_id: String,
    pub user_id: String,
    pub vote_type: VoteType,
}

impl TryFrom<RawVoteRow> for VoteRow {
    type Error = UnknownVoteType;

    fn try_from(raw: RawVoteRow) -> Result<Self, Self::Error> {
        let vote_type = raw.vote_type.parse()?;
        Ok(Self {
            issue_id: raw.issue_id,
            user_id: raw.user_id,
            vote_type,
        })
    }
}

impl From<VoteRow> for RawVoteRow {
    fn from(row: VoteRow) -> Self {
        Self {
            issue_id: row.issue_id,
            user_id: row.user_id,
            vote_type: row.vote_type.as_str().to_string(),
        }
    }
}

/// Vote totals for one issue plus the viewing user's own vote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateState {
    pub upvote_count: u64,
    pub downvote_count: u64,
    /// `None` when the viewer has no vote on the issue (or nobody is signed in).
    pub own_vote: Option<VoteType>,
}

impl AggregateState {
    /// Count a full snapshot of an issue's vote rows.
    ///
    /// Rows with a vote type outside the closed set are logged and skipped.
    /// The result depends only on the rows and the viewer, never on how the
    /// previous state was reached.
    pub fn derive<'a, I>(rows: I, viewer: Option<&str>) -> Self
    where
        I: IntoIterator<Item = &'a RawVoteRow>,
    {
        let mut state = Self::default();
        for raw in rows {
            let vote_type = match raw.vote_type.parse::<VoteType>() {
                Ok(vote_type) => vote_type,
                Err(err) => {
                    warn!(
                        issue_id = %raw.issue_id,
                        user_id = %raw.user_id,
                        error = %err,
                        "ignoring vote row during recount"
                    );
                    continue;
                }
            };

            state.increment(vote_type);
            if viewer == Some(raw.user_id.as_str()) {
                state.own_vote = Some(vote_type);
            }
        }
        state
    }

    /// The state after the viewer clicks the `click` button.
    ///
    /// Clicking the active direction toggles the vote off; clicking the other
    /// direction swaps it. Counters saturate at zero so a stale view can never
    /// go negative.
    #[must_use]
    pub fn after_click(self, click: VoteType) -> Self {
        let mut next = self;
        match self.own_vote {
            Some(current) if current == click => {
                next.decrement(click);
                next.own_vote = None;
            }
            Some(current) => {
                next.decrement(current);
                next.increment(click);
                next.own_vote = Some(click);
            }
            None => {
                next.increment(click);
                next.own_vote = Some(click);
            }
        }
        next
    }

    /// Total number of votes, either direction.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.upvote_count + self.downvote_count
    }

    /// Upvotes minus downvotes.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn score(&self) -> i64 {
        self.upvote_count as i64 - self.downvote_count as i64
    }

    fn increment(&mut self, vote_type: VoteType) {
        match vote_type {
            VoteType::Upvote => self.upvote_count += 1,
            VoteType::Downvote => self.downvote_count += 1,
        }
    }

    fn decrement(&mut self, vote_type: VoteType) {
        match vote_type {
            VoteType::Upvote => self.upvote_count = self.upvote_count.saturating_sub(1),
            VoteType::Downvote => self.downvote_count = self.downvote_count.saturating_sub(1),
        }
    }
}

// ============================================================================
// Content rows
// ============================================================================

/// Anything displayed with an author name next to it.
pub trait ContentRow {
    fn author_id(&self) -> &str;
}

/// A posted question or bug report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    pub author_id: String,
    pub created_at: String,
}

impl ContentRow for Issue {
    fn author_id(&self) -> &str {
        &self.author_id
    }
}

/// Fields a user fills in when posting an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
    pub error_code: String,
    pub screenshot_url: Option<String>,
}

/// A reply on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub issue_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: String,
}

impl ContentRow for Comment {
    fn author_id(&self) -> &str {
        &self.author_id
    }
}

/// Public profile of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl Profile {
    /// Name to show next to this user's content.
    ///
    /// Prefers the full name, then the username; blank values count as absent.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        [self.full_name.as_deref(), self.username.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }
}
