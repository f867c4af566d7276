//! Implementation of `overflow issues` subcommands.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use overflow_core::identity::Identity;
use overflow_core::model::IssueDraft;

use crate::cli::commands::helpers::{cli_error, open_services, CommentView, IssueView, VotesView};
use crate::output::{Formatter, OutputFormat};

/// Post a new issue.
#[tracing::instrument(skip(db_path, draft, identity, format), fields(title = %draft.title))]
pub async fn run_issues_create(
    db_path: &Path,
    draft: IssueDraft,
    identity: &dyn Identity,
    format: OutputFormat,
) -> Result<()> {
    let services = open_services(db_path)?;
    let issue = services.issues().create(draft, identity).await?;
    let authors = services
        .authors()
        .resolve(std::slice::from_ref(&issue))
        .await;

    Formatter::new(format).print(&IssueView::summary(&issue, &authors))
}

/// List issues, newest first, with author names.
#[tracing::instrument(skip(db_path, format))]
pub async fn run_issues_list(db_path: &Path, format: OutputFormat) -> Result<()> {
    let services = open_services(db_path)?;
    let (issues, authors) = services.issues().list_with_authors().await?;

    let views: Vec<IssueView<'_>> = issues
        .iter()
        .map(|issue| IssueView::summary(issue, &authors))
        .collect();
    Formatter::new(format).print_list(&views, "No issues yet.", "issues")
}

#[derive(Serialize)]
struct IssueDetail<'a> {
    #[serde(flatten)]
    issue: IssueView<'a>,
    votes: VotesView<'a>,
    comments: Vec<CommentView<'a>>,
}

/// Show an issue with its vote counts and comments.
#[tracing::instrument(skip(db_path, identity, format))]
pub async fn run_issues_show(
    db_path: &Path,
    issue_id: &str,
    identity: &dyn Identity,
    format: OutputFormat,
) -> Result<()> {
    let services = open_services(db_path)?;
    let issue = services.issues().get(issue_id).await.map_err(cli_error)?;
    let issue_author = services
        .authors()
        .resolve(std::slice::from_ref(&issue))
        .await;
    let (comments, comment_authors) = services
        .comments()
        .list_with_authors(issue_id)
        .await
        .map_err(cli_error)?;

    let votes = services
        .mount_votes(issue_id, identity)
        .await
        .map_err(cli_error)?;
    let state = votes.state();
    votes.unmount();

    let detail = IssueDetail {
        issue: IssueView::full(&issue, &issue_author),
        votes: VotesView::new(&issue.id, state),
        comments: comments
            .iter()
            .map(|comment| CommentView::new(comment, &comment_authors))
            .collect(),
    };
    Formatter::new(format).print(&detail)
}
