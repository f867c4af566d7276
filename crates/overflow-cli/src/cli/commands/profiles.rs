//! Implementation of `overflow profiles` subcommands.

use anyhow::{anyhow, Result};
use std::path::Path;

use overflow_core::authors::ANONYMOUS;
use overflow_core::core::CoreError;
use overflow_core::identity::Identity;

use crate::cli::commands::helpers::open_services;
use crate::output::{Formatter, OutputFormat};

/// Set the acting user's username and/or full name.
#[tracing::instrument(skip(db_path, identity, format))]
pub async fn run_profiles_set(
    db_path: &Path,
    username: Option<&str>,
    full_name: Option<&str>,
    identity: &dyn Identity,
    format: OutputFormat,
) -> Result<()> {
    if username.is_none() && full_name.is_none() {
        return Err(anyhow!(
            "Nothing to change.\n  To fix: pass --username and/or --full-name"
        ));
    }

    let services = open_services(db_path)?;
    let profile = services
        .profiles()
        .set(identity, username, full_name)
        .await?;

    Formatter::new(format).print(&serde_json::json!({
        "id": profile.id,
        "username": profile.username,
        "full_name": profile.full_name,
        "display_name": profile.display_name().unwrap_or(ANONYMOUS),
    }))
}

/// Show a profile; defaults to the acting user's.
#[tracing::instrument(skip(db_path, identity, format))]
pub async fn run_profiles_show(
    db_path: &Path,
    user_id: Option<&str>,
    identity: &dyn Identity,
    format: OutputFormat,
) -> Result<()> {
    let user_id = match user_id {
        Some(id) => id.to_string(),
        None => identity.current_user_id().ok_or(CoreError::Unauthorized)?,
    };

    let services = open_services(db_path)?;
    let profile = services.profiles().get(&user_id).await?;
    let display_name = profile
        .as_ref()
        .and_then(|p| p.display_name())
        .unwrap_or(ANONYMOUS);

    Formatter::new(format).print(&serde_json::json!({
        "id": user_id,
        "username": profile.as_ref().and_then(|p| p.username.as_deref()),
        "full_name": profile.as_ref().and_then(|p| p.full_name.as_deref()),
        "display_name": display_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use overflow_core::config::CoreConfig;
    use overflow_core::core::{default_db_path, CoreContext};
    use overflow_core::identity::StaticIdentity;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_then_show() {
        let temp = TempDir::new().unwrap();
        let db_path = default_db_path(temp.path());
        CoreContext::init(&db_path, CoreConfig::default()).unwrap();
        let me = StaticIdentity::signed_in("u1");

        run_profiles_set(&db_path, Some("alice"), Some("Alice"), &me, OutputFormat::Json)
            .await
            .unwrap();
        run_profiles_show(&db_path, None, &me, OutputFormat::Text)
            .await
            .unwrap();

        let services = open_services(&db_path).unwrap();
        let profile = services.profiles().get("u1").await.unwrap().unwrap();
        assert_eq!(profile.display_name(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_set_requires_a_field() {
        let temp = TempDir::new().unwrap();
        let db_path = default_db_path(temp.path());
        CoreContext::init(&db_path, CoreConfig::default()).unwrap();

        let err = run_profiles_set(&db_path, None, None, &StaticIdentity::signed_in("u1"), OutputFormat::Text)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Nothing to change"));
    }

    #[tokio::test]
    async fn test_show_unknown_user_is_anonymous() {
        let temp = TempDir::new().unwrap();
        let db_path = default_db_path(temp.path());
        CoreContext::init(&db_path, CoreConfig::default()).unwrap();

        run_profiles_show(&db_path, Some("u404"), &StaticIdentity::anonymous(), OutputFormat::Json)
            .await
            .unwrap();
    }
}
