#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered YAML configuration for Strata.
//!
//! Configuration is loaded from one or more sources. Every source after the
//! first is an overlay: it is merged onto the sources before it with a
//! kind-aware tree merge, and the result is decoded into a typed value.
//! Values can be written back out with secrets masked.
//!
//! # Usage
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use strata_config::{Loader, Redactor, Source};
//!
//! #[derive(Debug, Deserialize, serde::Serialize)]
//! struct App {
//!     listen: String,
//!     api_key: String,
//! }
//!
//! let config = Loader::<App>::new()
//!     .file("config/base.yaml")
//!     .source(Source::new("override", "listen: 0.0.0.0:8080\n"))
//!     .load()
//!     .unwrap();
//! println!("{}", config.to_string_redacted(&Redactor::default()).unwrap());
//! ```
//!
//! # Merge rules
//!
//! - Mappings merge per key; new keys are appended in overlay order.
//! - Sequences concatenate.
//! - Scalars are replaced by the overlay.
//! - Aliases are followed, and aliases in the result keep pointing at the
//!   (merged) node carrying their anchor.
//! - Differing kinds at the same place are an error.

/// Alias dereferencing.
pub mod alias;
/// YAML parsing and the `serde_yaml` bridge.
pub mod codec;
/// Typed configuration values and writers.
pub mod config;
/// Error types.
pub mod error;
/// Source reading and typed loading.
pub mod loader;
/// Kind-aware tree merge.
pub mod merge;
/// Generic document tree.
pub mod node;
/// Folding sources through the merge engine.
pub mod overlay;
/// Secret masking.
pub mod redact;
/// Source text preprocessing.
pub mod template;
/// Post-decode validation.
pub mod validate;

pub use codec::{Codec, YamlCodec};
pub use config::Config;
pub use error::{ConfigError, ConfigResult, NodeError, NodeResult};
pub use loader::{Loader, MAX_SOURCE_SIZE, Source};
pub use merge::{MAX_MERGE_DEPTH, merge};
pub use node::{Content, Node, NodeKind, NodeRef, ScalarTag};
pub use redact::{DEFAULT_SECRET_PATTERN, RedactMode, Redactor, SecretMatcher};
pub use template::{EnvExpander, Passthrough, Preprocess};
pub use validate::Validate;
