//! Reading sources and loading them into a typed configuration.
//!
//! [`Loader::load`] runs the pipeline:
//! 1. Read every source (files are read at load time)
//! 2. Preprocess each text
//! 3. Reject blank sources
//! 4. Parse each source and fold them through the merge engine. A single
//!    source is used as parsed
//! 5. Decode the tree into the target type
//! 6. Validate
//!
//! [`Loader::tree`] stops after step 4.

use std::fmt;
use std::io::Read;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::codec::{self, Codec, YamlCodec};
use crate::config::Config;
use crate::error::{ConfigError, ConfigResult};
use crate::node::NodeRef;
use crate::overlay;
use crate::template::{Passthrough, Preprocess};
use crate::validate::{Validate, Validator};

/// Maximum size of a single source (1 MiB).
pub const MAX_SOURCE_SIZE: u64 = 1_048_576;

/// A named configuration text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    /// A source held in memory.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Read a source from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if reading fails and
    /// [`ConfigError::SourceTooLarge`] above [`MAX_SOURCE_SIZE`].
    pub fn from_reader(name: impl Into<String>, reader: impl Read) -> ConfigResult<Self> {
        let name = name.into();
        let mut text = String::new();
        reader
            .take(MAX_SOURCE_SIZE.saturating_add(1))
            .read_to_string(&mut text)
            .map_err(|source| ConfigError::ReadError {
                path: name.clone(),
                source,
            })?;

        check_size(&name, &text)?;
        Ok(Self { name, text })
    }

    /// Read a source from a file, named after its path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file cannot be read and
    /// [`ConfigError::SourceTooLarge`] above [`MAX_SOURCE_SIZE`].
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: name.clone(),
            source,
        })?;

        // Size is checked after reading to avoid racing a stat.
        check_size(&name, &text)?;
        debug!(path = %path.display(), bytes = text.len(), "read config source");
        Ok(Self { name, text })
    }

    /// Name used in errors and logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn check_size(name: &str, text: &str) -> ConfigResult<()> {
    let size = text.len() as u64;
    if size > MAX_SOURCE_SIZE {
        return Err(ConfigError::SourceTooLarge {
            path: name.to_owned(),
            size,
            limit: MAX_SOURCE_SIZE,
        });
    }
    Ok(())
}

enum Input {
    Loaded(Source),
    File(PathBuf),
}

impl Input {
    fn read(self) -> ConfigResult<Source> {
        match self {
            Self::Loaded(source) => Ok(source),
            Self::File(path) => Source::from_file(path),
        }
    }
}

/// Builder that loads a typed configuration from ordered sources.
///
/// Later sources overlay earlier ones.
pub struct Loader<T> {
    inputs: Vec<Input>,
    preprocessor: Box<dyn Preprocess>,
    codec: Box<dyn Codec>,
    validator: Option<Validator<T>>,
    _target: PhantomData<fn() -> T>,
}

impl<T> Default for Loader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Loader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("inputs", &self.inputs.len())
            .field("validated", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> Loader<T> {
    /// A loader without sources, using [`Passthrough`] and [`YamlCodec`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            preprocessor: Box::new(Passthrough),
            codec: Box::new(YamlCodec),
            validator: None,
            _target: PhantomData,
        }
    }

    /// Add an in-memory source.
    #[must_use]
    pub fn source(mut self, source: Source) -> Self {
        self.inputs.push(Input::Loaded(source));
        self
    }

    /// Add several in-memory sources.
    #[must_use]
    pub fn sources(mut self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.inputs.extend(sources.into_iter().map(Input::Loaded));
        self
    }

    /// Add a file, read when loading.
    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(Input::File(path.into()));
        self
    }

    /// Add several files, read when loading.
    #[must_use]
    pub fn files<P: Into<PathBuf>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.inputs
            .extend(paths.into_iter().map(|path| Input::File(path.into())));
        self
    }

    /// Preprocess every source with `preprocessor`.
    #[must_use]
    pub fn preprocessor(mut self, preprocessor: impl Preprocess + 'static) -> Self {
        self.preprocessor = Box::new(preprocessor);
        self
    }

    /// Parse sources with `codec`.
    #[must_use]
    pub fn codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Run `check` on the decoded value.
    #[must_use]
    pub fn validate_with(mut self, check: impl Fn(&T) -> ConfigResult<()> + 'static) -> Self {
        self.validator = Some(Box::new(check));
        self
    }

    /// Run [`Validate::validate`] on the decoded value.
    #[must_use]
    pub fn validated(self) -> Self
    where
        T: Validate + 'static,
    {
        self.validate_with(T::validate)
    }

    /// Read, preprocess, parse and fold the sources without decoding.
    ///
    /// A single source is returned as parsed and never goes through the
    /// merge engine.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoSources`] without sources, a read, template
    /// or parse error for the offending source, [`ConfigError::EmptySource`]
    /// for a blank source, or [`ConfigError::Merge`] if the sources cannot
    /// be overlaid.
    pub fn tree(self) -> ConfigResult<NodeRef> {
        overlay_inputs(self.inputs, self.preprocessor.as_ref(), self.codec.as_ref())
            .map(|(tree, _)| tree)
    }
}

impl<T: DeserializeOwned> Loader<T> {
    /// Read, overlay, decode and validate the sources.
    ///
    /// # Errors
    ///
    /// Everything [`Loader::tree`] returns, [`ConfigError::DecodeError`] if
    /// the result does not fit `T`, or the validator's error.
    pub fn load(self) -> ConfigResult<Config<T>> {
        let Self {
            inputs,
            preprocessor,
            codec,
            validator,
            ..
        } = self;

        let (tree, count) = overlay_inputs(inputs, preprocessor.as_ref(), codec.as_ref())?;
        let value: T =
            serde_yaml::from_value(codec::to_value(&tree)?).map_err(ConfigError::DecodeError)?;

        if let Some(validator) = &validator {
            validator(&value)?;
        }

        info!(sources = count, "loaded configuration");
        Ok(Config::new(value))
    }
}

/// Steps 1 to 4 of the pipeline. Also returns the number of sources.
fn overlay_inputs(
    inputs: Vec<Input>,
    preprocessor: &dyn Preprocess,
    codec: &dyn Codec,
) -> ConfigResult<(NodeRef, usize)> {
    if inputs.is_empty() {
        return Err(ConfigError::NoSources);
    }

    let mut texts = Vec::with_capacity(inputs.len());
    for input in inputs {
        let source = input.read()?;
        let text = preprocessor.process(&source.name, &source.text)?;
        if codec::is_blank(&text) {
            return Err(ConfigError::EmptySource { name: source.name });
        }
        texts.push((source.name, text));
    }

    let mut trees = Vec::with_capacity(texts.len());
    for (name, text) in &texts {
        trees.push((name.as_str(), codec.parse(name, text)?));
    }
    if let [(name, _)] = trees.as_slice() {
        debug!(source = %name, "single source, nothing to overlay");
    }
    Ok((overlay::fold(trees)?, texts.len()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;

    use super::*;
    use crate::node::Node;
    use crate::template::EnvExpander;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Server {
        host: String,
        #[serde(default)]
        ports: Vec<u16>,
        #[serde(default)]
        tls: bool,
    }

    impl Validate for Server {
        fn validate(&self) -> ConfigResult<()> {
            if self.host.is_empty() {
                return Err(ConfigError::Validation {
                    message: "host must not be empty".to_owned(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_load_requires_sources() {
        let result = Loader::<Server>::new().load();
        assert!(matches!(result, Err(ConfigError::NoSources)));
    }

    #[test]
    fn test_load_single_source() {
        let config = Loader::<Server>::new()
            .source(Source::new("base", "host: a\nports: [1, 2]\n"))
            .load()
            .unwrap();
        assert_eq!(
            config.get(),
            &Server {
                host: "a".to_owned(),
                ports: vec![1, 2],
                tls: false,
            }
        );
    }

    #[test]
    fn test_load_overlays_in_order() {
        let config = Loader::<Server>::new()
            .sources([
                Source::new("base", "host: a\nports: [1]\n"),
                Source::new("prod", "host: b\nports: [2]\ntls: true\n"),
            ])
            .load()
            .unwrap();
        assert_eq!(
            config.into_inner(),
            Server {
                host: "b".to_owned(),
                ports: vec![1, 2],
                tls: true,
            }
        );
    }

    #[test]
    fn test_single_and_overlaid_decode_alike() {
        let text = "host: a\nports: [1, 2]\ntls: true\n";
        let single = Loader::<Server>::new()
            .source(Source::new("one", text))
            .load()
            .unwrap();
        let overlaid = Loader::<Server>::new()
            .sources([Source::new("one", text), Source::new("two", "tls: true\n")])
            .load()
            .unwrap();
        assert_eq!(single.get(), overlaid.get());
    }

    #[test]
    fn test_blank_source_rejected_on_both_paths() {
        let single = Loader::<Server>::new()
            .source(Source::new("blank", "# nothing here\n"))
            .load();
        assert!(matches!(single, Err(ConfigError::EmptySource { ref name }) if name == "blank"));

        let overlaid = Loader::<Server>::new()
            .sources([Source::new("base", "host: a\n"), Source::new("blank", "\n")])
            .load();
        assert!(matches!(overlaid, Err(ConfigError::EmptySource { ref name }) if name == "blank"));
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Tagged {
        port: serde_yaml::Value,
    }

    #[test]
    fn test_custom_tag_decodes_alike_on_both_paths() {
        let single = Loader::<Tagged>::new()
            .source(Source::new("one", "port: !port 5\n"))
            .load()
            .unwrap();
        let overlaid = Loader::<Tagged>::new()
            .sources([
                Source::new("one", "port: !port 4\n"),
                Source::new("two", "port: !port 5\n"),
            ])
            .load()
            .unwrap();
        assert_eq!(single.get(), overlaid.get());

        let serde_yaml::Value::Tagged(port) = &single.get().port else {
            panic!("expected tagged port, got {:?}", single.get().port);
        };
        assert_eq!(port.value, serde_yaml::Value::from(5));
    }

    /// Ignores the text and always yields the same tree.
    struct CannedCodec;

    impl Codec for CannedCodec {
        fn parse(&self, _source_name: &str, _text: &str) -> ConfigResult<NodeRef> {
            Ok(Node::document(Node::entries([
                ("host", Node::string("canned")),
                ("ports", Node::sequence([Node::int(7)])),
            ])))
        }

        fn emit(&self, node: &NodeRef) -> ConfigResult<String> {
            YamlCodec.emit(node)
        }
    }

    #[test]
    fn test_custom_codec_used_for_single_source() {
        let config = Loader::<Server>::new()
            .source(Source::new("base", "host: a\n"))
            .codec(CannedCodec)
            .load()
            .unwrap();
        assert_eq!(config.get().host, "canned");
        assert_eq!(config.get().ports, vec![7]);
    }

    #[test]
    fn test_custom_codec_used_for_overlays() {
        let config = Loader::<Server>::new()
            .sources([Source::new("base", "host: a\n"), Source::new("next", "host: b\n")])
            .codec(CannedCodec)
            .load()
            .unwrap();
        assert_eq!(config.get().host, "canned");
        assert_eq!(config.get().ports, vec![7, 7]);
    }

    #[test]
    fn test_tree_keeps_aliases() {
        let tree = Loader::<Server>::new()
            .sources([
                Source::new("base", "a: &ref {a: 3}\nb: *ref\n"),
                Source::new("next", "a: {a: 4}\n"),
            ])
            .tree()
            .unwrap();
        assert_eq!(tree.borrow().to_string(), "{a: &ref {a: 4}, b: *ref}");
    }

    #[test]
    fn test_tree_single_source_is_as_parsed() {
        let tree = Loader::<Server>::new()
            .source(Source::new("base", "b: 1\na: [x]\n"))
            .tree()
            .unwrap();
        assert_eq!(tree.borrow().to_string(), "{b: 1, a: [x]}");
    }

    #[test]
    fn test_parse_error_names_source() {
        let result = Loader::<Server>::new()
            .sources([
                Source::new("base", "host: a\n"),
                Source::new("broken", "host: [unclosed\n"),
            ])
            .load();
        assert!(matches!(
            result,
            Err(ConfigError::ParseError { ref source_name, .. }) if source_name == "broken"
        ));
    }

    #[test]
    fn test_decode_error() {
        let result = Loader::<Server>::new()
            .source(Source::new("base", "host: a\nports: [http]\n"))
            .load();
        assert!(matches!(result, Err(ConfigError::DecodeError(_))));
    }

    #[test]
    fn test_merge_error_names_source() {
        let result = Loader::<Server>::new()
            .sources([
                Source::new("base", "host: a\nports: [1]\n"),
                Source::new("clash", "ports: {http: 80}\n"),
            ])
            .load();
        assert!(matches!(
            result,
            Err(ConfigError::Merge { ref source_name, index: 1, .. }) if source_name == "clash"
        ));
    }

    #[test]
    fn test_validation_runs_after_decode() {
        let result = Loader::<Server>::new()
            .source(Source::new("base", "host: ''\n"))
            .validated()
            .load();
        assert!(matches!(result, Err(ConfigError::Validation { .. })));

        let undecodable = Loader::<Server>::new()
            .source(Source::new("base", "ports: [1]\n"))
            .validated()
            .load();
        assert!(matches!(undecodable, Err(ConfigError::DecodeError(_))));
    }

    #[test]
    fn test_validate_with_closure() {
        let result = Loader::<Server>::new()
            .source(Source::new("base", "host: a\nports: [1]\n"))
            .validate_with(|server| {
                if server.tls {
                    Ok(())
                } else {
                    Err(ConfigError::Validation {
                        message: "tls required".to_owned(),
                    })
                }
            })
            .load();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref message }) if message == "tls required"
        ));
    }

    #[test]
    fn test_preprocessor_applies_to_every_source() {
        let vars = HashMap::from([("HOST".to_owned(), "db".to_owned())]);
        let config = Loader::<Server>::new()
            .sources([
                Source::new("base", "host: ${HOST}\n"),
                Source::new("extra", "ports: [5432]\n"),
            ])
            .preprocessor(EnvExpander::new(vars))
            .load()
            .unwrap();
        assert_eq!(config.get().host, "db");
        assert_eq!(config.get().ports, vec![5432]);
    }

    #[test]
    fn test_source_from_reader_limits_size() {
        let big = "a".repeat(1_048_577);
        let result = Source::from_reader("big", big.as_bytes());
        assert!(matches!(result, Err(ConfigError::SourceTooLarge { .. })));

        let small = Source::from_reader("small", "a: 1\n".as_bytes()).unwrap();
        assert_eq!(small.name(), "small");
        assert_eq!(small.text(), "a: 1\n");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = Loader::<Server>::new()
            .file("/nonexistent/strata/config.yaml")
            .load();
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
