//! Comment service: add, list.

use chrono::Utc;
use tracing::debug;

use crate::authors::{AuthorMap, AuthorResolver};
use crate::config::CoreConfig;
use crate::ids::new_comment_id;
use crate::identity::Identity;
use crate::model::Comment;
use crate::store::{ContentStore, IdTaken, SqliteStore};

use super::{CoreError, CoreResult, IdSource, ID_ATTEMPTS};

/// Service for comment operations.
pub struct CommentService<'a> {
    store: &'a SqliteStore,
    config: CoreConfig,
    next_id: IdSource,
}

impl<'a> CommentService<'a> {
    pub(crate) const fn new(store: &'a SqliteStore, config: CoreConfig) -> Self {
        Self {
            store,
            config,
            next_id: new_comment_id,
        }
    }

    #[cfg(test)]
    const fn with_id_source(mut self, next_id: IdSource) -> Self {
        self.next_id = next_id;
        self
    }

    /// Reply to an issue as the acting user.
    pub async fn add(
        &self,
        issue_id: &str,
        content: &str,
        identity: &dyn Identity,
    ) -> CoreResult<Comment> {
        let author_id = identity.current_user_id().ok_or(CoreError::Unauthorized)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::validation("content", "Comment cannot be empty"));
        }

        self.require_issue(issue_id).await?;

        let mut comment = Comment {
            id: (self.next_id)()?,
            issue_id: issue_id.to_string(),
            author_id,
            content: content.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let mut attempt = 1;
        loop {
            match self.config.bounded(self.store.insert_comment(&comment)).await {
                Ok(()) => return Ok(comment),
                Err(err) if err.is::<IdTaken>() && attempt < ID_ATTEMPTS => {
                    debug!(id = %comment.id, attempt, "comment id taken; drawing another");
                    comment.id = (self.next_id)()?;
                    attempt += 1;
                }
                Err(err) => return Err(CoreError::WriteFailed(err)),
            }
        }
    }

    /// Comments on an issue, oldest first.
    pub async fn list(&self, issue_id: &str) -> CoreResult<Vec<Comment>> {
        self.require_issue(issue_id).await?;
        self.config
            .bounded(self.store.list_comments(issue_id))
            .await
            .map_err(CoreError::ReadFailed)
    }

    /// Comments on an issue with their authors' display names.
    pub async fn list_with_authors(&self, issue_id: &str) -> CoreResult<(Vec<Comment>, AuthorMap)> {
        let comments = self.list(issue_id).await?;
        let authors = AuthorResolver::new(self.store, self.config)
            .resolve(&comments)
            .await;
        Ok((comments, authors))
    }

    async fn require_issue(&self, issue_id: &str) -> CoreResult<()> {
        let found = self
            .config
            .bounded(self.store.get_issue(issue_id))
            .await
            .map_err(CoreError::ReadFailed)?;
        if found.is_none() {
            return Err(CoreError::IssueNotFound {
                issue_id: issue_id.to_string(),
            });
        }
        Ok(())
    }
}
