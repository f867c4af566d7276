//! Command implementations.

pub mod comments;
pub mod helpers;
pub mod init;
pub mod issues;
pub mod profiles;
pub mod votes;
pub mod watch;

pub use comments::{run_comments_add, run_comments_list};
pub use init::run_init;
pub use issues::{run_issues_create, run_issues_list, run_issues_show};
pub use profiles::{run_profiles_set, run_profiles_show};
pub use votes::run_vote;
pub use watch::run_watch;
