//! Profile service.

use crate::config::CoreConfig;
use crate::identity::Identity;
use crate::model::Profile;
use crate::store::{ContentStore, ProfileStore, SqliteStore};

use super::{CoreError, CoreResult};

/// Service for profile operations.
pub struct ProfileService<'a> {
    store: &'a SqliteStore,
    config: CoreConfig,
}

impl<'a> ProfileService<'a> {
    pub(crate) const fn new(store: &'a SqliteStore, config: CoreConfig) -> Self {
        Self { store, config }
    }

    /// Profile of `user_id`, if one was ever saved.
    pub async fn get(&self, user_id: &str) -> CoreResult<Option<Profile>> {
        let mut found = self
            .config
            .bounded(self.store.read_profiles_by_ids(&[user_id.to_string()]))
            .await
            .map_err(CoreError::ReadFailed)?;
        Ok(found.remove(user_id))
    }

    /// Update the acting user's profile.
    ///
    /// Fields passed as `None` keep their stored value; an empty string clears it.
    pub async fn set(
        &self,
        identity: &dyn Identity,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> CoreResult<Profile> {
        let user_id = identity.current_user_id().ok_or(CoreError::Unauthorized)?;
        let mut profile = self.get(&user_id).await?.unwrap_or_else(|| Profile {
            id: user_id.clone(),
            ..Profile::default()
        });

        if let Some(username) = username {
            profile.username = non_blank(username);
        }
        if let Some(full_name) = full_name {
            profile.full_name = non_blank(full_name);
        }

        self.config
            .bounded(self.store.upsert_profile(&profile))
            .await
            .map_err(CoreError::WriteFailed)?;
        Ok(profile)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
