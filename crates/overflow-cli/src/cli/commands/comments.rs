//! Implementation of `overflow comments` subcommands.

use anyhow::Result;
use std::path::Path;

use overflow_core::identity::Identity;

use crate::cli::commands::helpers::{cli_error, open_services, CommentView};
use crate::output::{Formatter, OutputFormat};

/// Add a comment to an issue.
#[tracing::instrument(skip(db_path, message, identity, format))]
pub async fn run_comments_add(
    db_path: &Path,
    issue_id: &str,
    message: &str,
    identity: &dyn Identity,
    format: OutputFormat,
) -> Result<()> {
    let services = open_services(db_path)?;
    let comment = services
        .comments()
        .add(issue_id, message, identity)
        .await
        .map_err(cli_error)?;
    let authors = services
        .authors()
        .resolve(std::slice::from_ref(&comment))
        .await;

    let output = serde_json::json!({
        "comment_id": comment.id,
        "issue_id": comment.issue_id,
        "author": authors.name_of(&comment.author_id),
        "content": comment.content,
    });
    Formatter::new(format).print(&output)
}

/// List comments on an issue, oldest first.
#[tracing::instrument(skip(db_path, format))]
pub async fn run_comments_list(db_path: &Path, issue_id: &str, format: OutputFormat) -> Result<()> {
    let services = open_services(db_path)?;
    let (comments, authors) = services
        .comments()
        .list_with_authors(issue_id)
        .await
        .map_err(cli_error)?;

    let views: Vec<CommentView<'_>> = comments
        .iter()
        .map(|comment| CommentView::new(comment, &authors))
        .collect();
    Formatter::new(format).print_list(&views, "No comments yet.", "comments")
}
