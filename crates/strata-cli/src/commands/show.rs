//! `strata show`: print the merged configuration with secrets hidden.

use anyhow::{Context, Result};
use strata_config::{RedactMode, Redactor, SecretMatcher};

use super::SourceArgs;

/// Load the files and render them with every secret masked.
pub(crate) fn run(args: &SourceArgs, preserve: bool, secret_pattern: Option<&str>) -> Result<String> {
    let matcher = match secret_pattern {
        Some(pattern) => SecretMatcher::new(pattern)
            .with_context(|| format!("invalid secret pattern '{pattern}'"))?,
        None => SecretMatcher::default(),
    };
    let mode = if preserve {
        RedactMode::Preserve
    } else {
        RedactMode::Collapse
    };

    let config = args.load()?;
    Ok(config.to_string_redacted(&Redactor::new(matcher, mode))?)
}
