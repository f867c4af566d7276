//! Author name resolution for lists of content rows.
//!
//! One batched profile lookup per list, however many rows share an author.
//! Author names are decoration: a failed lookup degrades every name to
//! [`ANONYMOUS`] instead of failing the list it decorates.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::model::ContentRow;
use crate::store::ProfileStore;

/// Name shown for authors without a usable profile.
pub const ANONYMOUS: &str = "Anonymous";

/// Display names for the authors of one batch of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AuthorMap {
    names: HashMap<String, String>,
}

impl AuthorMap {
    /// Display name for `user_id`; [`ANONYMOUS`] if the id was not resolved.
    #[must_use]
    pub fn name_of(&self, user_id: &str) -> &str {
        self.names.get(user_id).map_or(ANONYMOUS, String::as_str)
    }

    /// Whether `user_id` was part of the resolved batch.
    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.names.contains_key(user_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(id, name)| (id.as_str(), name.as_str()))
    }

    fn all_anonymous(ids: &BTreeSet<String>) -> Self {
        Self {
            names: ids
                .iter()
                .map(|id| (id.clone(), ANONYMOUS.to_string()))
                .collect(),
        }
    }
}

/// Resolves author ids to display names against a profile store.
pub struct AuthorResolver<'a, P: ProfileStore + ?Sized> {
    profiles: &'a P,
    config: CoreConfig,
}

impl<'a, P: ProfileStore + ?Sized> AuthorResolver<'a, P> {
    pub const fn new(profiles: &'a P, config: CoreConfig) -> Self {
        Self { profiles, config }
    }

    /// Map every distinct author in `rows` to a display name.
    ///
    /// Issues exactly one profile read (none for an empty batch). Every author
    /// id present in `rows` gets an entry; ids without a profile, or without a
    /// non-blank name, map to [`ANONYMOUS`].
    pub async fn resolve<R: ContentRow>(&self, rows: &[R]) -> AuthorMap {
        let ids: BTreeSet<String> = rows.iter().map(|row| row.author_id().to_string()).collect();
        if ids.is_empty() {
            return AuthorMap::default();
        }

        let lookup: Vec<String> = ids.iter().cloned().collect();
        let profiles = match self
            .config
            .bounded(self.profiles.read_profiles_by_ids(&lookup))
            .await
        {
            Ok(profiles) => profiles,
            Err(err) => {
                warn!(authors = ids.len(), error = %err, "profile lookup failed; showing authors as anonymous");
                return AuthorMap::all_anonymous(&ids);
            }
        };

        let names = ids
            .into_iter()
            .map(|id| {
                let name = profiles
                    .get(&id)
                    .and_then(|profile| profile.display_name())
                    .unwrap_or(ANONYMOUS)
                    .to_string();
                (id, name)
            })
            .collect::<HashMap<_, _>>();

        debug!(authors = names.len(), found = profiles.len(), "resolved author names");
        AuthorMap { names }
    }
}
