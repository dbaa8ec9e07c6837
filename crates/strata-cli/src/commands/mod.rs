//! Subcommand implementations. Each returns the text to print.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_yaml::Value;
use strata_config::{Config, EnvExpander, Loader, NodeRef};

pub(crate) mod check;
pub(crate) mod merge;
pub(crate) mod show;

/// Source selection shared by every subcommand.
pub(crate) struct SourceArgs {
    /// Files in load order.
    pub(crate) files: Vec<PathBuf>,
    /// Expand `${VAR}` references from the process environment.
    pub(crate) expand_env: bool,
}

impl SourceArgs {
    fn loader(&self) -> Loader<Value> {
        let loader = Loader::new().files(self.files.iter().cloned());
        if self.expand_env {
            loader.preprocessor(EnvExpander::from_env())
        } else {
            loader
        }
    }

    /// Load the files as an untyped YAML value.
    fn load(&self) -> Result<Config<Value>> {
        self.loader()
            .load()
            .with_context(|| format!("failed to load {}", self.describe()))
    }

    /// Overlay the files without decoding, keeping anchors and aliases.
    fn tree(&self) -> Result<NodeRef> {
        self.loader()
            .tree()
            .with_context(|| format!("failed to merge {}", self.describe()))
    }

    fn describe(&self) -> String {
        self.files
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::SourceArgs;

    /// Write `files` into a fresh directory and select them in order.
    pub(crate) fn sources(files: &[(&str, &str)]) -> (TempDir, SourceArgs) {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = files
            .iter()
            .map(|(name, text)| {
                let path = dir.path().join(name);
                fs::write(&path, text).unwrap();
                path
            })
            .collect();
        (
            dir,
            SourceArgs {
                files: paths,
                expand_env: false,
            },
        )
    }
}
