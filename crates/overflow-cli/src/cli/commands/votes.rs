//! Implementation of `overflow vote`.

use anyhow::Result;
use std::path::Path;

use overflow_core::identity::Identity;
use overflow_core::model::VoteType;

use crate::cli::commands::helpers::{cli_error, open_services, VotesView};
use crate::output::{Formatter, OutputFormat};

/// Click the upvote or downvote button on an issue.
///
/// Clicking the direction already voted removes the vote.
#[tracing::instrument(skip(db_path, identity, format))]
pub async fn run_vote(
    db_path: &Path,
    issue_id: &str,
    direction: VoteType,
    identity: &dyn Identity,
    format: OutputFormat,
) -> Result<()> {
    let services = open_services(db_path)?;
    let mut votes = services
        .mount_votes(issue_id, identity)
        .await
        .map_err(cli_error)?;
    let state = votes.click(direction).await;
    votes.unmount();

    Formatter::new(format).print(&VotesView::new(issue_id, state?))
}
