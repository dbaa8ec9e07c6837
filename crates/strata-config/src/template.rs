//! Text preprocessing applied to each source before it is parsed.

use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

/// Rewrites the raw text of a source before parsing.
pub trait Preprocess {
    /// Transform `text`, read from the source called `source_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Template`] if the text cannot be expanded.
    fn process(&self, source_name: &str, text: &str) -> ConfigResult<String>;
}

/// Leaves sources untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Preprocess for Passthrough {
    fn process(&self, _source_name: &str, text: &str) -> ConfigResult<String> {
        Ok(text.to_owned())
    }
}

/// Expands `${VAR}` references from a set of variables.
///
/// - `${VAR}` is replaced by the value of `VAR`. Unknown variables are left
///   as written and logged.
/// - `${VAR:?message}` is replaced by the value of `VAR`, and fails with
///   `message` when `VAR` is unset or empty.
///
/// An unterminated `${` is copied through unchanged.
#[derive(Debug, Clone, Default)]
pub struct EnvExpander {
    vars: HashMap<String, String>,
}

impl EnvExpander {
    /// Expand from the given variables.
    #[must_use]
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    /// Expand from the environment of the current process.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::vars().collect())
    }

    fn lookup(&self, source_name: &str, reference: &str) -> ConfigResult<Option<&str>> {
        let (name, required) = match reference.split_once(":?") {
            Some((name, message)) => (name, Some(message)),
            None => (reference, None),
        };
        let value = self.vars.get(name).map(String::as_str);

        match (value, required) {
            (Some(value), Some(_)) if !value.is_empty() => Ok(Some(value)),
            (_, Some(message)) => Err(ConfigError::Template {
                source_name: source_name.to_owned(),
                var: name.to_owned(),
                message: if message.is_empty() {
                    "required variable is not set".to_owned()
                } else {
                    message.to_owned()
                },
            }),
            (value, None) => Ok(value),
        }
    }
}

impl Preprocess for EnvExpander {
    fn process(&self, source_name: &str, text: &str) -> ConfigResult<String> {
        let mut result = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        let mut expanded: usize = 0;

        while let Some(ch) = chars.next() {
            if ch != '$' || chars.peek() != Some(&'{') {
                result.push(ch);
                continue;
            }
            chars.next();

            let mut reference = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                reference.push(ch);
            }

            if !closed || reference.is_empty() {
                result.push_str("${");
                result.push_str(&reference);
                if closed {
                    result.push('}');
                }
                continue;
            }

            match self.lookup(source_name, &reference)? {
                Some(value) => {
                    result.push_str(value);
                    expanded = expanded.saturating_add(1);
                },
                None => {
                    warn!(
                        source = source_name,
                        var = reference,
                        "unresolved variable reference"
                    );
                    let _ = write!(result, "${{{reference}}}");
                },
            }
        }

        debug!(source = source_name, expanded, "expanded variable references");
        Ok(result)
    }
}
