//! Implementation of `overflow init` command.

use anyhow::Result;
use serde_json::json;
use std::path::Path;

use overflow_core::config::CoreConfig;
use overflow_core::core::CoreContext;

use crate::output::{Formatter, OutputFormat};

/// Create the board database, or add any missing schema to an existing one.
#[tracing::instrument(skip(format))]
pub fn run_init(db_path: &Path, format: OutputFormat) -> Result<()> {
    let existed = db_path.exists();
    CoreContext::init(db_path, CoreConfig::from_env()?)?;

    let status = if existed { "already_initialized" } else { "initialized" };
    Formatter::new(format).print(&json!({
        "db": db_path.display().to_string(),
        "status": status,
    }))
}
