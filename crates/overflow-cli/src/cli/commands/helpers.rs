//! Shared helpers for CLI commands.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};

use overflow_core::authors::AuthorMap;
use overflow_core::core::{default_db_path, BoardServices, CoreContext, CoreError};
use overflow_core::model::{AggregateState, Comment, Issue, VoteType};

/// Board database to use: `--db` if given, else `.overflow/board.db` under the cwd.
pub fn resolve_db_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().context("Failed to determine current directory")?;
    Ok(default_db_path(&cwd))
}

/// Open an initialized board and build the service facade on it.
pub fn open_services(db_path: &Path) -> Result<BoardServices> {
    let ctx = CoreContext::new(db_path)?;
    Ok(ctx.services()?)
}

/// Error for a missing issue, with a pointer at how to find valid ids.
pub fn issue_not_found_error(issue_id: &str) -> anyhow::Error {
    anyhow!("Issue not found: {issue_id}\n  To fix: overflow issues list")
}

/// Convert a core error, giving a missing issue the actionable message.
pub fn cli_error(err: CoreError) -> anyhow::Error {
    match err {
        CoreError::IssueNotFound { issue_id } => issue_not_found_error(&issue_id),
        other => other.into(),
    }
}

/// One issue as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct IssueView<'a> {
    pub issue_id: &'a str,
    pub title: &'a str,
    pub error_code: &'a str,
    pub author: &'a str,
    pub created_at: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<&'a str>,
}

impl<'a> IssueView<'a> {
    /// Summary line: no description.
    pub fn summary(issue: &'a Issue, authors: &'a AuthorMap) -> Self {
        Self {
            issue_id: &issue.id,
            title: &issue.title,
            error_code: &issue.error_code,
            author: authors.name_of(&issue.author_id),
            created_at: &issue.created_at,
            description: None,
            screenshot_url: None,
        }
    }

    /// Everything about the issue.
    pub fn full(issue: &'a Issue, authors: &'a AuthorMap) -> Self {
        Self {
            description: Some(&issue.description),
            screenshot_url: issue.screenshot_url.as_deref(),
            ..Self::summary(issue, authors)
        }
    }
}

/// One comment as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct CommentView<'a> {
    pub comment_id: &'a str,
    pub author: &'a str,
    pub content: &'a str,
    pub created_at: &'a str,
}

impl<'a> CommentView<'a> {
    pub fn new(comment: &'a Comment, authors: &'a AuthorMap) -> Self {
        Self {
            comment_id: &comment.id,
            author: authors.name_of(&comment.author_id),
            content: &comment.content,
            created_at: &comment.created_at,
        }
    }
}

/// Vote counts for one issue as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct VotesView<'a> {
    pub issue_id: &'a str,
    pub upvotes: u64,
    pub downvotes: u64,
    pub score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_vote: Option<VoteType>,
}

impl<'a> VotesView<'a> {
    pub const fn new(issue_id: &'a str, state: AggregateState) -> Self {
        Self {
            issue_id,
            upvotes: state.upvote_count,
            downvotes: state.downvote_count,
            score: state.score(),
            own_vote: state.own_vote,
        }
    }
}
