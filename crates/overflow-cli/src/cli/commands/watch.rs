//! Implementation of `overflow watch`.

use anyhow::{Context, Result};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use tracing::warn;

use overflow_core::identity::Identity;
use overflow_core::model::AggregateState;
use overflow_core::store::VoteStore;
use overflow_core::votes::VoteAggregator;

use crate::cli::commands::helpers::{cli_error, open_services, VotesView};
use crate::output::{Formatter, OutputFormat};

#[derive(Serialize)]
struct WatchLine<'a> {
    #[serde(flatten)]
    votes: VotesView<'a>,
    at: String,
}

impl<'a> WatchLine<'a> {
    fn now(issue_id: &'a str, state: AggregateState) -> Self {
        Self {
            votes: VotesView::new(issue_id, state),
            at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Print an issue's vote counts, then a new line on every change until Ctrl-C.
#[tracing::instrument(skip(db_path, identity, format))]
pub async fn run_watch(
    db_path: &Path,
    issue_id: &str,
    identity: &dyn Identity,
    format: OutputFormat,
) -> Result<()> {
    let services = open_services(db_path)?;
    let mut votes = services
        .mount_votes(issue_id, identity)
        .await
        .map_err(cli_error)?;

    let ctrl_c = async { tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C") };
    let result = follow(&mut votes, &Formatter::new(format), ctrl_c).await;
    votes.unmount();
    result.map(|_| ())
}

/// Print every distinct state until `shutdown` resolves; returns the last one printed.
///
/// A lost change stream is retried with backoff, keeping the last counts on screen.
async fn follow<S, I, F>(
    votes: &mut VoteAggregator<S, I>,
    formatter: &Formatter,
    shutdown: F,
) -> Result<AggregateState>
where
    S: VoteStore + ?Sized,
    I: Identity,
    F: Future<Output = Result<()>>,
{
    let issue_id = votes.issue_id().to_string();
    let retry = *votes.config();
    let mut last = votes.state();
    formatter.print_line(&WatchLine::now(&issue_id, last))?;

    tokio::pin!(shutdown);
    let mut failures = 0;
    loop {
        tokio::select! {
            stopped = &mut shutdown => {
                stopped?;
                break;
            }
            change = votes.next_change() => match change {
                Ok(state) => {
                    failures = 0;
                    if state != last {
                        last = state;
                        formatter.print_line(&WatchLine::now(&issue_id, last))?;
                    }
                }
                Err(err) => {
                    warn!(issue_id = %issue_id, failures, error = %err, "vote updates interrupted");
                    let delay = retry.backoff(failures);
                    failures += 1;
                    tokio::select! {
                        stopped = &mut shutdown => {
                            stopped?;
                            break;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    Ok(last)
}
