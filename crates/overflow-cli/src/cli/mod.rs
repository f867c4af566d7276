//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use overflow_core::model::VoteType;

pub mod commands;

/// Community Q&A board for AI errors
#[derive(Parser, Debug)]
#[command(name = "overflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output JSON instead of concise text
    #[arg(long, global = true)]
    pub json: bool,

    /// Act as this user (default: $OVERFLOW_USER or $BOARD_USER)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Board database (default: ./.overflow/board.db)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the board database
    Init,

    /// Post and browse issues
    #[command(subcommand)]
    Issues(IssuesCommands),

    /// Reply to issues
    #[command(subcommand)]
    Comments(CommentsCommands),

    /// Vote on an issue (clicking your current vote again removes it)
    Vote {
        /// Direction to click
        #[arg(value_enum)]
        direction: VoteType,

        /// Issue ID
        issue_id: String,
    },

    /// Follow an issue's vote counts live until Ctrl-C
    Watch {
        /// Issue ID
        issue_id: String,
    },

    /// Manage your public profile
    #[command(subcommand)]
    Profiles(ProfilesCommands),
}

// ============================================================================
// Issues subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum IssuesCommands {
    /// Post a new issue
    Create {
        /// Short summary (15-150 characters)
        #[arg(long)]
        title: String,

        /// What happened and how to reproduce it (at least 50 characters)
        #[arg(long)]
        description: String,

        /// Error code, e.g. AIERR-1234
        #[arg(long)]
        error_code: String,

        /// Link to a screenshot
        #[arg(long)]
        screenshot_url: Option<String>,
    },

    /// List issues, newest first
    List,

    /// Show an issue with its votes and comments
    Show {
        /// Issue ID
        issue_id: String,
    },
}

// ============================================================================
// Comments subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum CommentsCommands {
    /// Add a comment to an issue
    Add {
        /// Issue ID
        issue_id: String,

        /// Comment message (positional or use --message)
        #[arg(long = "message", visible_alias = "msg")]
        message: Option<String>,

        /// Comment message (positional argument)
        #[arg(value_name = "MESSAGE")]
        message_positional: Option<String>,
    },

    /// List comments on an issue, oldest first
    List {
        /// Issue ID
        issue_id: String,
    },
}

// ============================================================================
// Profiles subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ProfilesCommands {
    /// Set your username and/or full name (empty string clears a field)
    Set {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        full_name: Option<String>,
    },

    /// Show a user's profile (default: yourself)
    Show {
        /// User ID
        user_id: Option<String>,
    },
}
