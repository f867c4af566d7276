//! ID generation for issues and comments.
//!
//! Uses short, human-readable slugs: is-xxxxxxxx, cm-xxxxxxxx

use anyhow::{anyhow, Result};

/// Prefix for issue IDs
const ISSUE_PREFIX: &str = "is";
/// Prefix for comment IDs
const COMMENT_PREFIX: &str = "cm";

/// Length of the random suffix (in base36 chars)
const SUFFIX_LEN: usize = 8;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a base36 suffix from OS randomness.
fn base36_suffix(len: usize) -> Result<String> {
    let mut bytes = [0u8; 8];
    getrandom::fill(&mut bytes).map_err(|e| anyhow!("failed to read OS randomness: {e}"))?;

    let mut n = u64::from_le_bytes(bytes);
    let mut result = String::with_capacity(len);
    while result.len() < len {
        #[allow(clippy::cast_possible_truncation)]
        let idx = (n % 36) as usize;
        result.push(char::from(BASE36[idx]));
        n /= 36;
    }

    Ok(result)
}

/// Generate a new issue ID (e.g., "is-1d3fk82q")
pub fn new_issue_id() -> Result<String> {
    Ok(format!("{ISSUE_PREFIX}-{}", base36_suffix(SUFFIX_LEN)?))
}

/// Generate a new comment ID (e.g., "cm-99az0m4t")
pub fn new_comment_id() -> Result<String> {
    Ok(format!("{COMMENT_PREFIX}-{}", base36_suffix(SUFFIX_LEN)?))
}

fn has_slug_shape(s: &str, prefix: &str) -> bool {
    s.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|suffix| {
            suffix.len() == SUFFIX_LEN && suffix.bytes().all(|b| BASE36.contains(&b))
        })
}

/// Check if a string looks like a valid issue ID
#[must_use]
pub fn is_issue_id(s: &str) -> bool {
    has_slug_shape(s, ISSUE_PREFIX)
}

/// Check if a string looks like a valid comment ID
#[must_use]
pub fn is_comment_id(s: &str) -> bool {
    has_slug_shape(s, COMMENT_PREFIX)
}
