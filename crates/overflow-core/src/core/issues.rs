//! Issue service: create, get, list.

use chrono::Utc;
use tracing::debug;

use crate::authors::{AuthorMap, AuthorResolver};
use crate::config::CoreConfig;
use crate::ids::new_issue_id;
use crate::identity::Identity;
use crate::model::{Issue, IssueDraft};
use crate::store::{ContentStore, IdTaken, SqliteStore};

use super::{CoreError, CoreResult, IdSource, ID_ATTEMPTS};

const TITLE_MIN: usize = 15;
const TITLE_MAX: usize = 150;
const DESCRIPTION_MIN: usize = 50;
const ERROR_CODE_PREFIX: &str = "AIERR-";
const ERROR_CODE_DIGITS: usize = 4;

/// Service for issue operations.
pub struct IssueService<'a> {
    store: &'a SqliteStore,
    config: CoreConfig,
    next_id: IdSource,
}

impl<'a> IssueService<'a> {
    pub(crate) const fn new(store: &'a SqliteStore, config: CoreConfig) -> Self {
        Self {
            store,
            config,
            next_id: new_issue_id,
        }
    }

    #[cfg(test)]
    const fn with_id_source(mut self, next_id: IdSource) -> Self {
        self.next_id = next_id;
        self
    }

    /// Post a new issue as the acting user.
    pub async fn create(&self, draft: IssueDraft, identity: &dyn Identity) -> CoreResult<Issue> {
        let author_id = identity.current_user_id().ok_or(CoreError::Unauthorized)?;
        validate_draft(&draft)?;

        let mut issue = Issue {
            id: (self.next_id)()?,
            title: draft.title,
            description: draft.description,
            error_code: draft.error_code,
            screenshot_url: draft.screenshot_url.filter(|url| !url.trim().is_empty()),
            author_id,
            created_at: Utc::now().to_rfc3339(),
        };

        let mut attempt = 1;
        loop {
            match self.config.bounded(self.store.insert_issue(&issue)).await {
                Ok(()) => return Ok(issue),
                Err(err) if err.is::<IdTaken>() && attempt < ID_ATTEMPTS => {
                    debug!(id = %issue.id, attempt, "issue id taken; drawing another");
                    issue.id = (self.next_id)()?;
                    attempt += 1;
                }
                Err(err) => return Err(CoreError::WriteFailed(err)),
            }
        }
    }

    /// Get a single issue.
    ///
    /// Returns `Err(CoreError::IssueNotFound)` if the issue does not exist.
    pub async fn get(&self, issue_id: &str) -> CoreResult<Issue> {
        self.get_optional(issue_id)
            .await?
            .ok_or_else(|| CoreError::IssueNotFound {
                issue_id: issue_id.to_string(),
            })
    }

    /// Get a single issue, returning `None` if not found.
    pub async fn get_optional(&self, issue_id: &str) -> CoreResult<Option<Issue>> {
        self.config
            .bounded(self.store.get_issue(issue_id))
            .await
            .map_err(CoreError::ReadFailed)
    }

    /// All issues, newest first.
    pub async fn list(&self) -> CoreResult<Vec<Issue>> {
        self.config
            .bounded(self.store.list_issues())
            .await
            .map_err(CoreError::ReadFailed)
    }

    /// All issues, newest first, with their authors' display names.
    pub async fn list_with_authors(&self) -> CoreResult<(Vec<Issue>, AuthorMap)> {
        let issues = self.list().await?;
        let authors = AuthorResolver::new(self.store, self.config)
            .resolve(&issues)
            .await;
        Ok((issues, authors))
    }
}

/// Check a draft against the posting rules.
pub fn validate_draft(draft: &IssueDraft) -> CoreResult<()> {
    let title_len = draft.title.chars().count();
    if title_len < TITLE_MIN {
        return Err(CoreError::validation(
            "title",
            format!("must be at least {TITLE_MIN} characters"),
        ));
    }
    if title_len > TITLE_MAX {
        return Err(CoreError::validation(
            "title",
            format!("must be at most {TITLE_MAX} characters"),
        ));
    }

    if draft.description.chars().count() < DESCRIPTION_MIN {
        return Err(CoreError::validation(
            "description",
            format!("must be at least {DESCRIPTION_MIN} characters"),
        ));
    }

    if !contains_error_code(&draft.error_code) {
        return Err(CoreError::validation(
            "error_code",
            format!("must look like {ERROR_CODE_PREFIX}1234"),
        ));
    }

    if let Some(url) = draft.screenshot_url.as_deref().map(str::trim) {
        if !url.is_empty() && !is_web_url(url) {
            return Err(CoreError::validation(
                "screenshot_url",
                "must be an http(s) URL",
            ));
        }
    }

    Ok(())
}

/// Whether `code` contains `AIERR-` followed by four digits.
fn contains_error_code(code: &str) -> bool {
    code.match_indices(ERROR_CODE_PREFIX).any(|(at, prefix)| {
        let digits = &code.as_bytes()[at + prefix.len()..];
        digits.len() >= ERROR_CODE_DIGITS
            && digits[..ERROR_CODE_DIGITS].iter().all(u8::is_ascii_digit)
    })
}

fn is_web_url(url: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        url.strip_prefix(scheme).is_some_and(|rest| {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !rest.contains(char::is_whitespace)
        })
    })
}
