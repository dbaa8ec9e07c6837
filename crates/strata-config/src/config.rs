//! A loaded configuration value and its writers.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::codec::{self, Codec, YamlCodec};
use crate::error::{ConfigError, ConfigResult};
use crate::loader::{Loader, Source};
use crate::redact::Redactor;

const WRITER_NAME: &str = "<writer>";

/// A decoded configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config<T> {
    value: T,
}

impl<T> Config<T> {
    /// Wrap an already decoded value.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// The configuration value.
    #[must_use]
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Mutable access to the configuration value.
    #[must_use]
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Unwrap the configuration value.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: DeserializeOwned> Config<T> {
    /// Load from files, later files overlaying earlier ones.
    ///
    /// # Errors
    ///
    /// See [`Loader::load`].
    pub fn from_files<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> ConfigResult<Self> {
        Loader::new()
            .files(paths.into_iter().map(|path| path.as_ref().to_path_buf()))
            .load()
    }

    /// Load from readers, later readers overlaying earlier ones. Readers are
    /// named `reader #0`, `reader #1` and so on.
    ///
    /// # Errors
    ///
    /// See [`Loader::load`].
    pub fn from_readers<R: Read>(readers: impl IntoIterator<Item = R>) -> ConfigResult<Self> {
        let sources = readers
            .into_iter()
            .enumerate()
            .map(|(index, reader)| Source::from_reader(format!("reader #{index}"), reader))
            .collect::<ConfigResult<Vec<_>>>()?;
        Loader::new().sources(sources).load()
    }
}

impl<T: Serialize> Config<T> {
    /// Serialize the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EncodeError`] if the value cannot be encoded.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(&self.value).map_err(ConfigError::EncodeError)
    }

    /// Serialize the configuration with secrets masked by `redactor`.
    ///
    /// The value is re-encoded into a fresh tree, so the configuration
    /// itself is not touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    pub fn to_string_redacted(&self, redactor: &Redactor) -> ConfigResult<String> {
        let tree = codec::encode(&self.value)?;
        redactor.redact(&tree);
        YamlCodec.emit(&tree)
    }

    /// Write the serialized configuration to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an encode error or [`ConfigError::WriteError`].
    pub fn to_writer(&self, writer: impl Write) -> ConfigResult<()> {
        write_text(writer, &self.to_yaml()?, WRITER_NAME)
    }

    /// Write the configuration with secrets masked to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an encode error or [`ConfigError::WriteError`].
    pub fn to_writer_redacted(&self, writer: impl Write, redactor: &Redactor) -> ConfigResult<()> {
        write_text(writer, &self.to_string_redacted(redactor)?, WRITER_NAME)
    }

    /// Write the serialized configuration to a file, replacing it.
    ///
    /// # Errors
    ///
    /// Returns an encode error or [`ConfigError::WriteError`].
    pub fn to_file(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let text = self.to_yaml()?;
        let file = File::create(path).map_err(|source| ConfigError::WriteError {
            path: path.display().to_string(),
            source,
        })?;
        write_text(BufWriter::new(file), &text, &path.display().to_string())?;
        debug!(path = %path.display(), "wrote configuration");
        Ok(())
    }
}

impl<T: Serialize> fmt::Display for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_yaml().map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

fn write_text(mut writer: impl Write, text: &str, path: &str) -> ConfigResult<()> {
    writer
        .write_all(text.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(|source| ConfigError::WriteError {
            path: path.to_owned(),
            source,
        })
}
