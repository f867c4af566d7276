//! overflow - community Q&A board for AI errors

mod cli;
mod output;
mod telemetry;

use anyhow::{anyhow, Result};
use clap::Parser;

use overflow_core::identity::EnvIdentity;
use overflow_core::model::IssueDraft;

use cli::commands::{
    helpers::resolve_db_path, run_comments_add, run_comments_list, run_init, run_issues_create,
    run_issues_list, run_issues_show, run_profiles_set, run_profiles_show, run_vote, run_watch,
};
use cli::{Cli, Commands, CommentsCommands, IssuesCommands, ProfilesCommands};
use output::OutputFormat;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    restore_sigpipe();
    let _telemetry = telemetry::init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db.as_deref())?;
    let identity = EnvIdentity::new(cli.user.as_deref());

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Commands::Init => {
            run_init(&db_path, format)?;
        }

        Commands::Issues(cmd) => match cmd {
            IssuesCommands::Create {
                title,
                description,
                error_code,
                screenshot_url,
            } => {
                let draft = IssueDraft {
                    title,
                    description,
                    error_code,
                    screenshot_url,
                };
                run_issues_create(&db_path, draft, &identity, format).await?;
            }
            IssuesCommands::List => {
                run_issues_list(&db_path, format).await?;
            }
            IssuesCommands::Show { issue_id } => {
                run_issues_show(&db_path, &issue_id, &identity, format).await?;
            }
        },

        Commands::Comments(cmd) => match cmd {
            CommentsCommands::Add {
                issue_id,
                message,
                message_positional,
            } => {
                // Support both --message and positional argument
                let msg = message.or(message_positional).ok_or_else(|| {
                    anyhow!("Message is required (use --message or provide as argument)")
                })?;
                run_comments_add(&db_path, &issue_id, &msg, &identity, format).await?;
            }
            CommentsCommands::List { issue_id } => {
                run_comments_list(&db_path, &issue_id, format).await?;
            }
        },

        Commands::Vote {
            direction,
            issue_id,
        } => {
            run_vote(&db_path, &issue_id, direction, &identity, format).await?;
        }

        Commands::Watch { issue_id } => {
            run_watch(&db_path, &issue_id, &identity, format).await?;
        }

        Commands::Profiles(cmd) => match cmd {
            ProfilesCommands::Set {
                username,
                full_name,
            } => {
                run_profiles_set(
                    &db_path,
                    username.as_deref(),
                    full_name.as_deref(),
                    &identity,
                    format,
                )
                .await?;
            }
            ProfilesCommands::Show { user_id } => {
                run_profiles_show(&db_path, user_id.as_deref(), &identity, format).await?;
            }
        },
    }

    Ok(())
}

/// Exit quietly when stdout is closed early (e.g. piped into `head`).
fn restore_sigpipe() {
    use nix::sys::signal::{signal, SigHandler, Signal};

    // SAFETY: runs first in main, before any other thread exists; SIG_DFL
    // installs no Rust handler.
    if let Err(err) = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) } {
        eprintln!("warning: could not reset SIGPIPE: {err}");
    }
}
