//! Command implementations for the xmlls CLI
//!
//! Each command module handles the CLI interface and delegates to the
//! library crates for the actual work.

use std::path::Path;

use anyhow::{Context, Result};

pub mod generate;
pub mod validate;

/// The `file:` URI of `path`, made absolute first.
pub fn file_uri(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("cannot resolve {}", path.display()))?;
    url::Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|()| anyhow::anyhow!("{} is not a valid file path", absolute.display()))
}
