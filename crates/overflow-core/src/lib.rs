//! overflow-core: domain logic for the overflow issue board.
//!
//! This crate owns the issue, comment, profile, and vote models, the store
//! traits with their SQLite backend, live vote aggregation, author name
//! resolution, and the service layer the CLI drives.

pub mod authors;
pub mod changes;
pub mod config;
pub mod core;
pub mod identity;
pub mod ids;
pub mod model;
pub mod store;
pub mod votes;
