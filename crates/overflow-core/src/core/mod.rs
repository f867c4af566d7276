//! Service layer for overflow-core.
//!
//! Provides typed, high-level APIs for issues, comments, profiles, and votes.
//! The service layer owns the store handle and maps storage failures into
//! [`CoreError`] variants.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use overflow_core::core::CoreContext;
//!
//! # async fn demo() -> overflow_core::core::CoreResult<()> {
//! let ctx = CoreContext::new(Path::new("/board/.overflow/board.db"))?;
//! let services = ctx.services()?;
//! let issues = services.issues().list().await?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod comments;
pub mod errors;
pub mod issues;
pub mod profiles;

pub use errors::{CoreError, CoreResult};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::authors::AuthorResolver;
use crate::config::CoreConfig;
use crate::identity::Identity;
use crate::store::{ContentStore, SqliteStore};
use crate::votes::VoteAggregator;

/// Ids drawn for one insert before an id clash is reported as a failed write.
const ID_ATTEMPTS: usize = 3;

/// Source of fresh record ids.
pub(crate) type IdSource = fn() -> anyhow::Result<String>;

/// Directory holding the board database, relative to the board root.
pub const BOARD_DIR: &str = ".overflow";
/// Database file name inside [`BOARD_DIR`].
pub const DB_FILE: &str = "board.db";

/// Default database location for a board rooted at `root`.
#[must_use]
pub fn default_db_path(root: &Path) -> PathBuf {
    root.join(BOARD_DIR).join(DB_FILE)
}

/// Context for overflow-core services.
///
/// Holds the database location and runtime configuration.
#[derive(Debug, Clone)]
pub struct CoreContext {
    db_path: PathBuf,
    config: CoreConfig,
}

impl CoreContext {
    /// Create a context for an existing board database.
    ///
    /// Configuration comes from the `OVERFLOW_*` environment variables.
    pub fn new(db_path: &Path) -> CoreResult<Self> {
        Self::with_config(db_path, CoreConfig::from_env()?)
    }

    /// Create a context with explicit configuration.
    pub fn with_config(db_path: &Path, config: CoreConfig) -> CoreResult<Self> {
        if !db_path.exists() {
            return Err(CoreError::NotInitialized {
                path: db_path.display().to_string(),
            });
        }

        Ok(Self {
            db_path: db_path.to_path_buf(),
            config,
        })
    }

    /// Create the board database (and its directory) if needed.
    ///
    /// Safe to run on an existing board: the schema is only added where missing.
    pub fn init(db_path: &Path, config: CoreConfig) -> CoreResult<Self> {
        let store = SqliteStore::open(db_path)?;
        store.init_schema()?;
        Ok(Self {
            db_path: db_path.to_path_buf(),
            config,
        })
    }

    /// Path to the board database.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Open the database, make sure the schema exists, and build services on it.
    pub fn services(&self) -> CoreResult<BoardServices> {
        let store = SqliteStore::open(&self.db_path)?.with_poll_interval(self.config.poll_interval);
        store.init_schema()?;
        Ok(BoardServices::new(Arc::new(store), self.config))
    }
}

/// Facade providing all overflow service APIs.
pub struct BoardServices {
    store: Arc<SqliteStore>,
    config: CoreConfig,
}

impl BoardServices {
    #[must_use]
    pub const fn new(store: Arc<SqliteStore>, config: CoreConfig) -> Self {
        Self { store, config }
    }

    /// Access issue operations.
    #[must_use]
    pub fn issues(&self) -> issues::IssueService<'_> {
        issues::IssueService::new(&self.store, self.config)
    }

    /// Access comment operations.
    #[must_use]
    pub fn comments(&self) -> comments::CommentService<'_> {
        comments::CommentService::new(&self.store, self.config)
    }

    /// Access profile operations.
    #[must_use]
    pub fn profiles(&self) -> profiles::ProfileService<'_> {
        profiles::ProfileService::new(&self.store, self.config)
    }

    /// Author name resolution against this board's profiles.
    #[must_use]
    pub fn authors(&self) -> AuthorResolver<'_, SqliteStore> {
        AuthorResolver::new(self.store.as_ref(), self.config)
    }

    /// Mount a vote aggregator for an existing issue.
    pub async fn mount_votes<I: Identity>(
        &self,
        issue_id: &str,
        identity: I,
    ) -> CoreResult<VoteAggregator<SqliteStore, I>> {
        if self
            .config
            .bounded(self.store.get_issue(issue_id))
            .await
            .map_err(CoreError::ReadFailed)?
            .is_none()
        {
            return Err(CoreError::IssueNotFound {
                issue_id: issue_id.to_string(),
            });
        }

        Ok(VoteAggregator::mount(Arc::clone(&self.store), identity, issue_id, self.config).await)
    }

    /// Get a reference to the underlying store.
    ///
    /// Useful for advanced queries not covered by the service layer.
    #[must_use]
    pub const fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }
}
