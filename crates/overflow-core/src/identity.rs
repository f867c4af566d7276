//! Acting-user resolution.
//!
//! The core never authenticates anyone; it only asks "who is acting, if
//! anyone". Mutations with no acting user are rejected before any side effect.

use std::env;

/// Environment variables checked for the acting user, in priority order.
const IDENTITY_VARS: &[&str] = &["OVERFLOW_USER", "BOARD_USER"];

/// Source of the acting user's id.
pub trait Identity: Send + Sync {
    /// The signed-in user's id, or `None` for an anonymous viewer.
    fn current_user_id(&self) -> Option<String>;
}

/// Identity taken from an explicit override or the environment.
///
/// Resolution order:
/// 1. Explicit override (`--user`)
/// 2. `OVERFLOW_USER` environment variable
/// 3. `BOARD_USER` environment variable
///
/// Blank values are treated as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvIdentity {
    explicit: Option<String>,
}

impl EnvIdentity {
    #[must_use]
    pub fn new(explicit: Option<&str>) -> Self {
        Self {
            explicit: explicit.map(str::to_string),
        }
    }
}

impl Identity for EnvIdentity {
    fn current_user_id(&self) -> Option<String> {
        if let Some(name) = self.explicit.as_deref().map(str::trim) {
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }

        IDENTITY_VARS
            .iter()
            .filter_map(|var| env::var(var).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }
}

/// Fixed identity, for embedding and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self(Some(user_id.into()))
    }

    #[must_use]
    pub const fn anonymous() -> Self {
        Self(None)
    }
}

impl Identity for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

impl<T: Identity + ?Sized> Identity for &T {
    fn current_user_id(&self) -> Option<String> {
        (**self).current_user_id()
    }
}
